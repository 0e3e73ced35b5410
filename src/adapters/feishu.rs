//! Feishu Open API client implementing the engine's ports.

use crate::config::FeishuConfig;
use crate::domain::model::{GroupMember, Table};
use crate::domain::ports::{DocumentStore, GroupDirectory, Messenger, RawRow};
use crate::utils::error::{RemindError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// docx 區塊類型：多維表格
const BLOCK_TYPE_BITABLE: i64 = 18;
/// 權杖到期前提早刷新
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

const MEMBERS_PAGE_SIZE: &str = "100";
const BLOCKS_PAGE_SIZE: &str = "500";
const TABLES_PAGE_SIZE: &str = "100";
const RECORDS_PAGE_SIZE: &str = "500";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    msg: String,
    data: Option<T>,
}

impl<T> Envelope<T> {
    fn ensure_ok(&self) -> Result<()> {
        if self.code != 0 {
            return Err(RemindError::FeishuApi {
                code: self.code,
                msg: self.msg.clone(),
            });
        }
        Ok(())
    }

    fn into_data(self) -> Result<T> {
        self.ensure_ok()?;
        self.data.ok_or_else(|| RemindError::FeishuApi {
            code: 0,
            msg: "response carries no data".to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    items: Option<Vec<T>>,
    #[serde(default)]
    has_more: bool,
    page_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    app_id: &'a str,
    app_secret: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    tenant_access_token: String,
    #[serde(default)]
    expire: u64,
}

#[derive(Debug, Deserialize)]
struct ChatMember {
    member_id: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct NodeData {
    node: WikiNode,
}

#[derive(Debug, Deserialize)]
struct WikiNode {
    obj_token: String,
}

#[derive(Debug, Deserialize)]
struct Block {
    block_type: i64,
    #[serde(default)]
    bitable: Option<BitableBlock>,
}

#[derive(Debug, Deserialize)]
struct BitableBlock {
    token: String,
}

#[derive(Debug, Deserialize)]
struct TableItem {
    table_id: String,
}

#[derive(Debug, Deserialize)]
struct RecordItem {
    #[serde(default)]
    fields: RawRow,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    receive_id: &'a str,
    msg_type: &'static str,
    content: String,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

pub struct FeishuClient {
    client: Client,
    base_url: String,
    app_id: String,
    app_secret: String,
    member_id_type: String,
    direct_message_id_type: String,
    token: Mutex<Option<CachedToken>>,
}

impl FeishuClient {
    pub fn new(config: &FeishuConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            app_id: config.app_id.clone(),
            app_secret: config.app_secret.clone(),
            member_id_type: config.member_id_type.clone(),
            direct_message_id_type: config.direct_message_id_type().to_string(),
            token: Mutex::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Tenant access token, cached until shortly before it expires.
    async fn tenant_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() + TOKEN_REFRESH_MARGIN < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        tracing::debug!("Requesting tenant access token for app {}", self.app_id);
        let response: TokenResponse = self
            .client
            .post(self.url("/open-apis/auth/v3/tenant_access_token/internal"))
            .json(&TokenRequest {
                app_id: &self.app_id,
                app_secret: &self.app_secret,
            })
            .send()
            .await?
            .json()
            .await?;

        if response.code != 0 {
            return Err(RemindError::FeishuApi {
                code: response.code,
                msg: response.msg,
            });
        }

        let token = CachedToken {
            value: response.tenant_access_token,
            expires_at: Instant::now() + Duration::from_secs(response.expire),
        };
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let token = self.tenant_token().await?;
        tracing::debug!("GET {} {:?}", path, query);
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;
        Self::decode::<T>(response).await?.into_data()
    }

    /// Follows `page_token` until `has_more` is false.
    async fn get_all<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut params = query.to_vec();
            if let Some(token) = page_token.as_deref() {
                params.push(("page_token", token));
            }
            let page: Page<T> = self.get(path, &params).await?;
            items.extend(page.items.unwrap_or_default());

            match page.page_token {
                Some(next) if page.has_more && !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }
        Ok(items)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<Envelope<T>> {
        let status = response.status();
        let body = response.text().await?;
        match serde_json::from_str::<Envelope<T>>(&body) {
            Ok(envelope) => Ok(envelope),
            Err(_) if !status.is_success() => Err(RemindError::FeishuApi {
                code: i64::from(status.as_u16()),
                msg: body,
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn send_text(&self, receive_id_type: &str, receive_id: &str, text: &str) -> Result<()> {
        let token = self.tenant_token().await?;
        let request = SendMessageRequest {
            receive_id,
            msg_type: "text",
            content: serde_json::json!({ "text": text }).to_string(),
        };

        let response = self
            .client
            .post(self.url("/open-apis/im/v1/messages"))
            .bearer_auth(token)
            .query(&[("receive_id_type", receive_id_type)])
            .json(&request)
            .send()
            .await?;
        Self::decode::<serde_json::Value>(response).await?.ensure_ok()
    }

    async fn send_or_fail(&self, receive_id_type: &str, receive_id: &str, text: &str) -> Result<()> {
        self.send_text(receive_id_type, receive_id, text)
            .await
            .map_err(|e| RemindError::SendFailure {
                target: format!("{} {}", receive_id_type, receive_id),
                reason: e.to_string(),
            })
    }
}

/// `{app_token}_{table_id}` in a docx bitable block; only the app token is needed.
fn app_token_of(block_token: &str) -> &str {
    block_token
        .split_once('_')
        .map(|(app, _)| app)
        .unwrap_or(block_token)
}

#[async_trait]
impl GroupDirectory for FeishuClient {
    async fn list_group_members(&self, group_id: &str) -> Result<Vec<GroupMember>> {
        let path = format!("/open-apis/im/v1/chats/{}/members", group_id);
        let members: Vec<ChatMember> = self
            .get_all(
                &path,
                &[
                    ("member_id_type", self.member_id_type.as_str()),
                    ("page_size", MEMBERS_PAGE_SIZE),
                ],
            )
            .await?;

        Ok(members
            .into_iter()
            .map(|m| GroupMember::new(m.member_id, m.name))
            .collect())
    }
}

#[async_trait]
impl DocumentStore for FeishuClient {
    async fn resolve_document_id(&self, node_token: &str) -> Result<String> {
        let data: NodeData = self
            .get("/open-apis/wiki/v2/spaces/get_node", &[("token", node_token)])
            .await?;
        Ok(data.node.obj_token)
    }

    async fn list_tables(&self, document_id: &str) -> Result<Vec<Table>> {
        let path = format!("/open-apis/docx/v1/documents/{}/blocks", document_id);
        let blocks: Vec<Block> = self
            .get_all(&path, &[("page_size", BLOCKS_PAGE_SIZE)])
            .await?;

        let mut app_tokens: Vec<String> = Vec::new();
        for block in blocks
            .into_iter()
            .filter(|b| b.block_type == BLOCK_TYPE_BITABLE)
        {
            if let Some(bitable) = block.bitable {
                let app_token = app_token_of(&bitable.token).to_string();
                if !app_tokens.contains(&app_token) {
                    app_tokens.push(app_token);
                }
            }
        }
        tracing::debug!("Document {} embeds bitables {:?}", document_id, app_tokens);

        let mut tables = Vec::new();
        for app_token in app_tokens {
            let path = format!("/open-apis/bitable/v1/apps/{}/tables", app_token);
            let items: Vec<TableItem> = self
                .get_all(&path, &[("page_size", TABLES_PAGE_SIZE)])
                .await?;
            tables.extend(items.into_iter().map(|item| Table {
                app_token: app_token.clone(),
                table_id: item.table_id,
            }));
        }
        Ok(tables)
    }

    async fn list_records(&self, table: &Table) -> Result<Vec<RawRow>> {
        let path = format!(
            "/open-apis/bitable/v1/apps/{}/tables/{}/records",
            table.app_token, table.table_id
        );
        let items: Vec<RecordItem> = self
            .get_all(&path, &[("page_size", RECORDS_PAGE_SIZE)])
            .await?;
        Ok(items.into_iter().map(|item| item.fields).collect())
    }
}

#[async_trait]
impl Messenger for FeishuClient {
    async fn send_direct_message(&self, user_id: &str, text: &str) -> Result<()> {
        self.send_or_fail(&self.direct_message_id_type, user_id, text).await
    }

    async fn send_group_message(&self, group_id: &str, text: &str) -> Result<()> {
        self.send_or_fail("chat_id", group_id, text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_token_of_block_token() {
        assert_eq!(app_token_of("bascnAbc_tblXyz"), "bascnAbc");
        assert_eq!(app_token_of("bascnAbc"), "bascnAbc");
    }

    #[test]
    fn test_envelope_error_code() {
        let envelope: Envelope<serde_json::Value> =
            serde_json::from_str(r#"{"code": 99991663, "msg": "invalid token"}"#).unwrap();
        assert!(matches!(
            envelope.into_data(),
            Err(RemindError::FeishuApi { code: 99991663, .. })
        ));
    }

    #[test]
    fn test_page_with_null_items() {
        let page: Page<TableItem> =
            serde_json::from_str(r#"{"items": null, "has_more": false}"#).unwrap();
        assert!(page.items.unwrap_or_default().is_empty());
    }
}
