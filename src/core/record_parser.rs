//! Decoding of raw bitable rows into typed [`Record`]s.
//!
//! Every field goes through the same three-way branch: absent (or null) gives
//! the zero value, well-formed gives the value, present but malformed gives the
//! zero value plus a [`RemindError::ParseField`] diagnostic. A malformed
//! sub-element (one maintainer, one text run) only drops that element.

use crate::domain::model::{Link, Maintainer, Record};
use crate::domain::ports::RawRow;
use crate::utils::error::RemindError;
use serde_json::{Map, Value};

pub const FIELD_MULTI_LINE_TEXT: &str = "多行文本";
pub const FIELD_MAINTAINERS: &str = "维护人";
pub const FIELD_ONE_LINE_INTRODUCTION: &str = "一句话介绍";
pub const FIELD_NODE_LINK: &str = "维护节点链接";
pub const FIELD_CREATED_TIME: &str = "创建时间";
pub const FIELD_LIKE_COUNT: &str = "👍";

/// A decoded row together with the diagnostics collected on the way.
#[derive(Debug)]
pub struct ParsedRow {
    pub record: Record,
    pub issues: Vec<RemindError>,
}

/// Parses a row, logging each diagnostic as a warning.
pub fn parse_record(row: &RawRow) -> Record {
    let ParsedRow { record, issues } = decode_record(row);
    for issue in &issues {
        tracing::warn!("⚠️ Skipped malformed value while parsing record: {}", issue);
    }
    record
}

pub fn decode_record(row: &RawRow) -> ParsedRow {
    let mut decoder = FieldDecoder::new(row);

    let record = Record {
        multi_line_text: decoder.rich_text(FIELD_MULTI_LINE_TEXT),
        maintainers: decoder.maintainers(FIELD_MAINTAINERS),
        one_line_introduction: decoder.rich_text(FIELD_ONE_LINE_INTRODUCTION),
        node_link: decoder.links(FIELD_NODE_LINK),
        timestamp: decoder.integer(FIELD_CREATED_TIME),
        like_count: decoder.integer(FIELD_LIKE_COUNT),
    };

    ParsedRow {
        record,
        issues: decoder.issues,
    }
}

/// Concatenates the `text` of every run, in order. Runs without text add nothing.
pub fn flatten_rich_text(runs: &[Value]) -> (String, Vec<RemindError>) {
    let mut issues = Vec::new();
    let text = flatten_runs("rich_text", runs, &mut issues);
    (text, issues)
}

/// Keeps only the runs carrying a `link` attribute, in order. A link run
/// missing any of link/token/text/mentionType is dropped with a diagnostic.
pub fn extract_links(runs: &[Value]) -> (Vec<Link>, Vec<RemindError>) {
    let mut issues = Vec::new();
    let links = links_from_runs("rich_text", runs, &mut issues);
    (links, issues)
}

struct FieldDecoder<'a> {
    row: &'a RawRow,
    issues: Vec<RemindError>,
}

impl<'a> FieldDecoder<'a> {
    fn new(row: &'a RawRow) -> Self {
        Self {
            row,
            issues: Vec::new(),
        }
    }

    fn present(&self, field: &str) -> Option<&'a Value> {
        match self.row.get(field) {
            None | Some(Value::Null) => None,
            Some(value) => Some(value),
        }
    }

    fn array(&mut self, field: &str) -> Option<&'a Vec<Value>> {
        let value = self.present(field)?;
        match value.as_array() {
            Some(items) => Some(items),
            None => {
                self.issues.push(RemindError::parse_field(
                    field,
                    format!("expected a list, found {}", type_name(value)),
                ));
                None
            }
        }
    }

    fn rich_text(&mut self, field: &str) -> String {
        match self.array(field) {
            Some(runs) => flatten_runs(field, runs, &mut self.issues),
            None => String::new(),
        }
    }

    fn links(&mut self, field: &str) -> Vec<Link> {
        match self.array(field) {
            Some(runs) => links_from_runs(field, runs, &mut self.issues),
            None => Vec::new(),
        }
    }

    fn maintainers(&mut self, field: &str) -> Vec<Maintainer> {
        let Some(entries) = self.array(field) else {
            return Vec::new();
        };

        let mut maintainers = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            let Some(person) = entry.as_object() else {
                self.issues.push(RemindError::parse_field(
                    field,
                    format!("entry {} is {}, not a person", index, type_name(entry)),
                ));
                continue;
            };
            match person.get("id").and_then(Value::as_str) {
                Some(id) => {
                    let name = match person.get("name") {
                        None | Some(Value::Null) => String::new(),
                        Some(Value::String(name)) => name.clone(),
                        Some(other) => {
                            self.issues.push(RemindError::parse_field(
                                field,
                                format!(
                                    "entry {} has non-string name ({})",
                                    index,
                                    type_name(other)
                                ),
                            ));
                            String::new()
                        }
                    };
                    maintainers.push(Maintainer {
                        id: id.to_string(),
                        name,
                    });
                }
                None => self.issues.push(RemindError::parse_field(
                    field,
                    format!("entry {} has no string id", index),
                )),
            }
        }
        maintainers
    }

    /// 飛書的數字欄位可能以整數或浮點數回傳
    fn integer(&mut self, field: &str) -> i64 {
        let Some(value) = self.present(field) else {
            return 0;
        };
        if let Some(n) = value.as_i64() {
            return n;
        }
        if let Some(f) = value.as_f64() {
            return f as i64;
        }
        self.issues.push(RemindError::parse_field(
            field,
            format!("expected a number, found {}", type_name(value)),
        ));
        0
    }
}

fn flatten_runs(field: &str, runs: &[Value], issues: &mut Vec<RemindError>) -> String {
    let mut text = String::new();
    for (index, run) in runs.iter().enumerate() {
        let Some(run) = run.as_object() else {
            issues.push(RemindError::parse_field(
                field,
                format!("run {} is {}, not a text run", index, type_name(run)),
            ));
            continue;
        };
        match run.get("text") {
            None | Some(Value::Null) => {}
            Some(Value::String(s)) => text.push_str(s),
            Some(other) => issues.push(RemindError::parse_field(
                field,
                format!("run {} has non-string text ({})", index, type_name(other)),
            )),
        }
    }
    text
}

fn links_from_runs(field: &str, runs: &[Value], issues: &mut Vec<RemindError>) -> Vec<Link> {
    let mut links = Vec::new();
    for (index, run) in runs.iter().enumerate() {
        let Some(run) = run.as_object() else {
            issues.push(RemindError::parse_field(
                field,
                format!("run {} is {}, not a text run", index, type_name(run)),
            ));
            continue;
        };
        if !run.contains_key("link") {
            continue;
        }

        let parts = (
            string_attr(run, "link"),
            string_attr(run, "token"),
            string_attr(run, "text"),
            string_attr(run, "mentionType"),
        );
        match parts {
            (Some(url), Some(token), Some(text), Some(mention_type)) => links.push(Link {
                url,
                token,
                text,
                mention_type,
            }),
            _ => issues.push(RemindError::parse_field(
                field,
                format!(
                    "link run {} lacks one of link/token/text/mentionType",
                    index
                ),
            )),
        }
    }
    links
}

fn string_attr(object: &Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).map(str::to_string)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
