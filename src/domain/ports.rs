use crate::domain::model::{GroupMember, Table};
use crate::utils::error::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

/// A raw bitable row: field name to loosely-typed value.
pub type RawRow = Map<String, Value>;

#[async_trait]
pub trait GroupDirectory: Send + Sync {
    async fn list_group_members(&self, group_id: &str) -> Result<Vec<GroupMember>>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn resolve_document_id(&self, node_token: &str) -> Result<String>;
    /// Newest table first.
    async fn list_tables(&self, document_id: &str) -> Result<Vec<Table>>;
    async fn list_records(&self, table: &Table) -> Result<Vec<RawRow>>;
}

#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_direct_message(&self, user_id: &str, text: &str) -> Result<()>;
    async fn send_group_message(&self, group_id: &str, text: &str) -> Result<()>;
}

pub trait ConfigProvider: Send + Sync {
    fn group_id(&self) -> &str;
    fn person_in_charge_id(&self) -> &str;
    fn node_token(&self) -> &str;
    fn knowledge_tree_url(&self) -> &str;
    fn white_list(&self) -> &[String];
}

#[async_trait]
impl<T: GroupDirectory + ?Sized> GroupDirectory for Arc<T> {
    async fn list_group_members(&self, group_id: &str) -> Result<Vec<GroupMember>> {
        (**self).list_group_members(group_id).await
    }
}

#[async_trait]
impl<T: DocumentStore + ?Sized> DocumentStore for Arc<T> {
    async fn resolve_document_id(&self, node_token: &str) -> Result<String> {
        (**self).resolve_document_id(node_token).await
    }

    async fn list_tables(&self, document_id: &str) -> Result<Vec<Table>> {
        (**self).list_tables(document_id).await
    }

    async fn list_records(&self, table: &Table) -> Result<Vec<RawRow>> {
        (**self).list_records(table).await
    }
}

#[async_trait]
impl<T: Messenger + ?Sized> Messenger for Arc<T> {
    async fn send_direct_message(&self, user_id: &str, text: &str) -> Result<()> {
        (**self).send_direct_message(user_id, text).await
    }

    async fn send_group_message(&self, group_id: &str, text: &str) -> Result<()> {
        (**self).send_group_message(group_id, text).await
    }
}
