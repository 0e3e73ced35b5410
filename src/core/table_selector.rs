use crate::core::record_parser::parse_record;
use crate::domain::model::{Period, Record, Table};
use crate::domain::ports::DocumentStore;
use crate::utils::error::Result;
use chrono::FixedOffset;

/// Finds the bitable table backing a reporting period.
///
/// Absence is not an error: an empty document or a period without rows yields
/// `None`.
pub struct TableSelector<'a, D: DocumentStore + ?Sized> {
    store: &'a D,
    offset: FixedOffset,
}

impl<'a, D: DocumentStore + ?Sized> TableSelector<'a, D> {
    pub fn new(store: &'a D, offset: FixedOffset) -> Self {
        Self { store, offset }
    }

    /// 由知識庫節點解析出文件，再列出其中所有表格 (新的在前)
    pub async fn tables(&self, node_token: &str) -> Result<Vec<Table>> {
        let document_id = self.store.resolve_document_id(node_token).await?;
        tracing::debug!("Node {} resolved to document {}", node_token, document_id);
        let tables = self.store.list_tables(&document_id).await?;
        tracing::debug!("Document {} has {} tables", document_id, tables.len());
        Ok(tables)
    }

    /// Trusts the store's newest-first ordering.
    pub async fn latest_table(&self, node_token: &str) -> Result<Option<Table>> {
        let tables = self.tables(node_token).await?;
        Ok(latest(&tables).cloned())
    }

    pub async fn table_for_period(&self, node_token: &str, period: Period) -> Result<Option<Table>> {
        for table in self.tables(node_token).await? {
            let records = self.records(&table).await?;
            if contains_period(&records, period, self.offset) {
                tracing::debug!("Table {} holds records for {}", table.table_id, period);
                return Ok(Some(table));
            }
        }
        tracing::info!("No table holds records for {}", period);
        Ok(None)
    }

    pub async fn records(&self, table: &Table) -> Result<Vec<Record>> {
        let rows = self.store.list_records(table).await?;
        Ok(rows.iter().map(parse_record).collect())
    }
}

pub fn latest(tables: &[Table]) -> Option<&Table> {
    tables.first()
}

pub fn contains_period(records: &[Record], period: Period, offset: FixedOffset) -> bool {
    records
        .iter()
        .any(|record| record.period(offset) == Some(period))
}
