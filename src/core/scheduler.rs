use crate::core::workflows::{Trigger, TriggerHandler};
use crate::utils::error::{RemindError, Result};
use chrono::{DateTime, Datelike, Days, FixedOffset, TimeZone, Timelike, Utc};
use std::fmt;
use std::time::Duration;

/// 最多往後搜尋一年多，足以涵蓋任何每月日期組合
const LOOKAHEAD_DAYS: u64 = 400;

/// Fires at `hour:minute` on each listed day of the month.
///
/// Days that do not exist in a given month (e.g. 31 in April) are skipped for
/// that month.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarRule {
    pub days: Vec<u32>,
    pub hour: u32,
    pub minute: u32,
}

impl CalendarRule {
    pub fn monthly(days: &[u32], hour: u32, minute: u32) -> Self {
        Self {
            days: days.to_vec(),
            hour,
            minute,
        }
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.days.is_empty() {
            return Err("at least one day of month is required".to_string());
        }
        if let Some(day) = self.days.iter().find(|d| !(1..=31).contains(*d)) {
            return Err(format!("day {} is outside 1..=31", day));
        }
        if self.hour > 23 {
            return Err(format!("hour {} is outside 0..=23", self.hour));
        }
        if self.minute > 59 {
            return Err(format!("minute {} is outside 0..=59", self.minute));
        }
        Ok(())
    }

    /// True when `time` falls in the rule's firing minute.
    pub fn matches(&self, time: &DateTime<FixedOffset>) -> bool {
        self.days.contains(&time.day()) && time.hour() == self.hour && time.minute() == self.minute
    }

    /// The first firing instant strictly after `now`.
    pub fn next_after(&self, now: DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
        let offset = *now.offset();
        let start = now.date_naive();
        (0..=LOOKAHEAD_DAYS)
            .filter_map(|n| start.checked_add_days(Days::new(n)))
            .filter(|date| self.days.contains(&date.day()))
            .filter_map(|date| date.and_hms_opt(self.hour, self.minute, 0))
            .filter_map(|naive| offset.from_local_datetime(&naive).single())
            .find(|candidate| *candidate > now)
    }

    fn overlaps(&self, other: &CalendarRule) -> bool {
        self.hour == other.hour
            && self.minute == other.minute
            && self.days.iter().any(|d| other.days.contains(d))
    }
}

impl fmt::Display for CalendarRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let days: Vec<String> = self.days.iter().map(u32::to_string).collect();
        write!(f, "{:02}:{:02} on day {}", self.hour, self.minute, days.join(","))
    }
}

#[derive(Debug, Clone)]
struct ScheduleEntry {
    trigger: Trigger,
    rule: CalendarRule,
}

/// Single scheduling authority for all reminder triggers.
pub struct Scheduler<H: TriggerHandler> {
    handler: H,
    offset: FixedOffset,
    entries: Vec<ScheduleEntry>,
}

impl<H: TriggerHandler> Scheduler<H> {
    pub fn new(handler: H, offset: FixedOffset) -> Self {
        Self {
            handler,
            offset,
            entries: Vec::new(),
        }
    }

    /// Rejects invalid rules, a trigger registered twice and rules that would
    /// fire in the same minute as an existing one.
    pub fn register(&mut self, trigger: Trigger, rule: CalendarRule) -> Result<()> {
        let registration_error = |reason: String| RemindError::ScheduleRegistration {
            rule: format!("{} ({})", trigger, rule),
            reason,
        };

        rule.validate().map_err(registration_error)?;

        if self.entries.iter().any(|e| e.trigger == trigger) {
            return Err(registration_error("trigger is already registered".to_string()));
        }
        if let Some(clash) = self.entries.iter().find(|e| e.rule.overlaps(&rule)) {
            return Err(registration_error(format!(
                "fires in the same minute as '{}'",
                clash.trigger
            )));
        }

        tracing::info!("⏰ Registered '{}' at {}", trigger, rule);
        self.entries.push(ScheduleEntry { trigger, rule });
        Ok(())
    }

    pub fn register_all(&mut self, rules: Vec<(Trigger, CalendarRule)>) -> Result<()> {
        for (trigger, rule) in rules {
            self.register(trigger, rule)?;
        }
        Ok(())
    }

    /// Earliest upcoming instant and the triggers due then.
    pub fn next_fire(&self, now: DateTime<FixedOffset>) -> Option<(DateTime<FixedOffset>, Vec<Trigger>)> {
        let upcoming: Vec<(DateTime<FixedOffset>, Trigger)> = self
            .entries
            .iter()
            .filter_map(|e| e.rule.next_after(now).map(|at| (at, e.trigger)))
            .collect();

        let earliest = upcoming.iter().map(|(at, _)| *at).min()?;
        let due = upcoming
            .into_iter()
            .filter(|(at, _)| *at == earliest)
            .map(|(_, trigger)| trigger)
            .collect();
        Some((earliest, due))
    }

    /// Runs every trigger whose rule matches `now`. Failures are logged and
    /// returned, never propagated.
    pub async fn fire_due(&self, now: DateTime<FixedOffset>) -> Vec<(Trigger, Result<usize>)> {
        let mut outcomes = Vec::new();
        for entry in self.entries.iter().filter(|e| e.rule.matches(&now)) {
            tracing::info!("🚀 Firing '{}' at {}", entry.trigger, now);
            let result = self.handler.handle(entry.trigger, now).await;
            match &result {
                Ok(sent) => tracing::info!("✅ '{}' finished, {} messages sent", entry.trigger, sent),
                Err(e) => {
                    tracing::error!(
                        "❌ '{}' failed: {} (Severity: {:?})",
                        entry.trigger,
                        e,
                        e.severity()
                    );
                    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
                }
            }
            outcomes.push((entry.trigger, result));
        }
        outcomes
    }

    /// One scheduling step: waits for the next instant after both `now` and
    /// `last_fired`, then fires it. Returns the fired instant.
    ///
    /// The sleep uses the monotonic clock while `now` comes from the wall
    /// clock; anchoring on `last_fired` keeps a wall clock that reads slightly
    /// behind from firing the same instant twice.
    pub async fn step(
        &self,
        now: DateTime<FixedOffset>,
        last_fired: Option<DateTime<FixedOffset>>,
    ) -> Option<DateTime<FixedOffset>> {
        let from = last_fired.map_or(now, |last| last.max(now));
        let (at, due) = self.next_fire(from)?;
        let names: Vec<&str> = due.iter().map(|t| t.name()).collect();
        tracing::info!("💤 Next firing at {} for {:?}", at, names);

        let wait = (at - now).to_std().unwrap_or(Duration::ZERO);
        tokio::time::sleep(wait).await;
        self.fire_due(at).await;
        Some(at)
    }

    /// Sleeps until each firing instant and runs the due triggers, forever.
    pub async fn run(&self) {
        let mut last_fired = None;
        loop {
            let now = Utc::now().with_timezone(&self.offset);
            match self.step(now, last_fired).await {
                Some(at) => last_fired = Some(at),
                None => {
                    tracing::warn!("No triggers registered, scheduler stops");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(8 * 3600)
            .unwrap()
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
    }

    #[derive(Clone, Default)]
    struct RecordingHandler {
        fired: Arc<Mutex<Vec<Trigger>>>,
        failing: Option<Trigger>,
    }

    #[async_trait]
    impl TriggerHandler for RecordingHandler {
        async fn handle(&self, trigger: Trigger, _now: DateTime<FixedOffset>) -> Result<usize> {
            self.fired.lock().unwrap().push(trigger);
            if self.failing == Some(trigger) {
                return Err(RemindError::SendFailure {
                    target: "chat oc_group".to_string(),
                    reason: "connection reset".to_string(),
                });
            }
            Ok(1)
        }
    }

    fn standard_scheduler(handler: RecordingHandler) -> Scheduler<RecordingHandler> {
        let mut scheduler = Scheduler::new(handler, FixedOffset::east_opt(8 * 3600).unwrap());
        scheduler
            .register_all(vec![
                (Trigger::FirstDay, CalendarRule::monthly(&[1], 10, 0)),
                (Trigger::ProgressCheck, CalendarRule::monthly(&[15, 23], 10, 0)),
                (Trigger::MonthlyReport, CalendarRule::monthly(&[1], 0, 0)),
            ])
            .unwrap();
        scheduler
    }

    #[test]
    fn test_next_after_same_day_and_rollover() {
        let rule = CalendarRule::monthly(&[15, 23], 10, 0);
        assert_eq!(rule.next_after(at(2024, 3, 15, 9, 59)), Some(at(2024, 3, 15, 10, 0)));
        assert_eq!(rule.next_after(at(2024, 3, 15, 10, 0)), Some(at(2024, 3, 23, 10, 0)));
        assert_eq!(rule.next_after(at(2024, 12, 24, 0, 0)), Some(at(2025, 1, 15, 10, 0)));
    }

    #[test]
    fn test_next_after_skips_months_without_the_day() {
        let rule = CalendarRule::monthly(&[31], 0, 0);
        assert_eq!(rule.next_after(at(2024, 4, 1, 0, 0)), Some(at(2024, 5, 31, 0, 0)));
    }

    #[test]
    fn test_invalid_rule_fails_registration() {
        let mut scheduler = Scheduler::new(RecordingHandler::default(), FixedOffset::east_opt(0).unwrap());
        let err = scheduler
            .register(Trigger::ProgressCheck, CalendarRule::monthly(&[15], 24, 0))
            .unwrap_err();
        assert!(matches!(err, RemindError::ScheduleRegistration { .. }));

        let err = scheduler
            .register(Trigger::ProgressCheck, CalendarRule::monthly(&[], 10, 0))
            .unwrap_err();
        assert!(matches!(err, RemindError::ScheduleRegistration { .. }));
    }

    #[test]
    fn test_duplicate_and_clashing_registrations_are_rejected() {
        let mut scheduler = standard_scheduler(RecordingHandler::default());
        assert!(scheduler
            .register(Trigger::FirstDay, CalendarRule::monthly(&[2], 10, 0))
            .is_err());

        let mut scheduler = Scheduler::new(RecordingHandler::default(), FixedOffset::east_opt(0).unwrap());
        scheduler
            .register(Trigger::FirstDay, CalendarRule::monthly(&[1], 10, 0))
            .unwrap();
        let err = scheduler
            .register(Trigger::MonthlyReport, CalendarRule::monthly(&[1, 2], 10, 0))
            .unwrap_err();
        assert!(err.to_string().contains("same minute"));
    }

    #[test]
    fn test_next_fire_picks_earliest_trigger() {
        let scheduler = standard_scheduler(RecordingHandler::default());
        let (when, due) = scheduler.next_fire(at(2024, 3, 31, 12, 0)).unwrap();
        assert_eq!(when, at(2024, 4, 1, 0, 0));
        assert_eq!(due, vec![Trigger::MonthlyReport]);

        let (when, due) = scheduler.next_fire(at(2024, 4, 1, 0, 0)).unwrap();
        assert_eq!(when, at(2024, 4, 1, 10, 0));
        assert_eq!(due, vec![Trigger::FirstDay]);
    }

    #[tokio::test]
    async fn test_fire_due_runs_only_matching_triggers() {
        let handler = RecordingHandler::default();
        let fired = handler.fired.clone();
        let scheduler = standard_scheduler(handler);

        assert!(scheduler.fire_due(at(2024, 3, 14, 10, 0)).await.is_empty());

        let outcomes = scheduler.fire_due(at(2024, 3, 23, 10, 0)).await;
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].0, Trigger::ProgressCheck);
        assert_eq!(*fired.lock().unwrap(), vec![Trigger::ProgressCheck]);
    }

    #[test]
    fn test_failed_trigger_does_not_stop_scheduler() {
        let handler = RecordingHandler {
            failing: Some(Trigger::MonthlyReport),
            ..Default::default()
        };
        let fired = handler.fired.clone();
        let scheduler = standard_scheduler(handler);

        let outcomes = tokio_test::block_on(scheduler.fire_due(at(2024, 5, 1, 0, 0)));
        assert!(matches!(outcomes[0].1, Err(RemindError::SendFailure { .. })));

        let outcomes = tokio_test::block_on(scheduler.fire_due(at(2024, 5, 1, 10, 0)));
        assert!(matches!(outcomes[0].1, Ok(1)));
        assert_eq!(
            *fired.lock().unwrap(),
            vec![Trigger::MonthlyReport, Trigger::FirstDay]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_never_refires_when_wall_clock_lags() {
        let handler = RecordingHandler::default();
        let fired = handler.fired.clone();
        let scheduler = standard_scheduler(handler);

        let first = at(2024, 3, 15, 10, 0);
        let before = first - chrono::Duration::minutes(1);
        assert_eq!(scheduler.step(before, None).await, Some(first));

        // 牆上時鐘被 NTP 往回調了兩秒，單看時鐘會再排到同一刻
        let lagging = first - chrono::Duration::seconds(2);
        assert_eq!(scheduler.next_fire(lagging).unwrap().0, first);

        let next = scheduler.step(lagging, Some(first)).await;
        assert_eq!(next, Some(at(2024, 3, 23, 10, 0)));
        assert_eq!(
            *fired.lock().unwrap(),
            vec![Trigger::ProgressCheck, Trigger::ProgressCheck]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_follows_clock_when_it_is_ahead() {
        let scheduler = standard_scheduler(RecordingHandler::default());
        let first = at(2024, 3, 15, 10, 0);

        let next = scheduler.step(at(2024, 3, 31, 12, 0), Some(first)).await;
        assert_eq!(next, Some(at(2024, 4, 1, 0, 0)));
    }
}
