use httpmock::prelude::*;
use ktree_remind::config::FeishuConfig;
use ktree_remind::domain::model::Table;
use ktree_remind::domain::ports::{DocumentStore, GroupDirectory, Messenger};
use ktree_remind::{FeishuClient, RemindError};
use serde_json::json;

const TOKEN_PATH: &str = "/open-apis/auth/v3/tenant_access_token/internal";

fn config_for(server: &MockServer) -> FeishuConfig {
    FeishuConfig {
        app_id: "cli_test".to_string(),
        app_secret: "secret".to_string(),
        base_url: server.base_url(),
        timeout_seconds: Some(5),
        member_id_type: "open_id".to_string(),
        person_in_charge_id_type: None,
    }
}

fn client_for(server: &MockServer) -> FeishuClient {
    FeishuClient::new(&config_for(server)).unwrap()
}

fn mock_token(server: &MockServer) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(POST)
            .path(TOKEN_PATH)
            .json_body(json!({"app_id": "cli_test", "app_secret": "secret"}));
        then.status(200).json_body(json!({
            "code": 0,
            "msg": "ok",
            "tenant_access_token": "t-test-token",
            "expire": 7200
        }));
    })
}

#[tokio::test]
async fn test_list_group_members_follows_pages_and_caches_token() {
    let server = MockServer::start();
    let token_mock = mock_token(&server);

    let second_page = server.mock(|when, then| {
        when.method(GET)
            .path("/open-apis/im/v1/chats/oc_group/members")
            .query_param("page_token", "p2")
            .header("authorization", "Bearer t-test-token");
        then.status(200).json_body(json!({
            "code": 0,
            "msg": "success",
            "data": {
                "items": [{"member_id_type": "open_id", "member_id": "ou_3", "name": "Carol"}],
                "has_more": false,
                "page_token": ""
            }
        }));
    });
    let first_page = server.mock(|when, then| {
        when.method(GET)
            .path("/open-apis/im/v1/chats/oc_group/members")
            .query_param("member_id_type", "open_id")
            .header("authorization", "Bearer t-test-token");
        then.status(200).json_body(json!({
            "code": 0,
            "msg": "success",
            "data": {
                "items": [
                    {"member_id_type": "open_id", "member_id": "ou_1", "name": "Alice"},
                    {"member_id_type": "open_id", "member_id": "ou_2", "name": "Bob"}
                ],
                "has_more": true,
                "page_token": "p2"
            }
        }));
    });

    let client = client_for(&server);
    let members = client.list_group_members("oc_group").await.unwrap();

    let ids: Vec<&str> = members.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["ou_1", "ou_2", "ou_3"]);
    assert_eq!(members[2].name, "Carol");

    first_page.assert_hits(1);
    second_page.assert_hits(1);
    token_mock.assert_hits(1);
}

#[tokio::test]
async fn test_document_tables_and_records() {
    let server = MockServer::start();
    mock_token(&server);

    let node_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/open-apis/wiki/v2/spaces/get_node")
            .query_param("token", "wikcn_node");
        then.status(200).json_body(json!({
            "code": 0,
            "data": {"node": {"obj_token": "doxcn_doc", "obj_type": "docx"}}
        }));
    });
    server.mock(|when, then| {
        when.method(GET).path("/open-apis/docx/v1/documents/doxcn_doc/blocks");
        then.status(200).json_body(json!({
            "code": 0,
            "data": {
                "items": [
                    {"block_id": "doxcn_doc", "block_type": 1},
                    {"block_id": "b1", "block_type": 18, "bitable": {"token": "bascnApp_tblMar", "view_type": 1}},
                    {"block_id": "b2", "block_type": 2, "text": {}}
                ],
                "has_more": false
            }
        }));
    });
    server.mock(|when, then| {
        when.method(GET).path("/open-apis/bitable/v1/apps/bascnApp/tables");
        then.status(200).json_body(json!({
            "code": 0,
            "data": {
                "items": [
                    {"table_id": "tblMar", "name": "2024-03", "revision": 3},
                    {"table_id": "tblFeb", "name": "2024-02", "revision": 9}
                ],
                "has_more": false
            }
        }));
    });
    server.mock(|when, then| {
        when.method(GET)
            .path("/open-apis/bitable/v1/apps/bascnApp/tables/tblMar/records");
        then.status(200).json_body(json!({
            "code": 0,
            "data": {
                "items": [
                    {"record_id": "rec1", "fields": {"维护人": [{"id": "ou_1", "name": "Alice"}]}},
                    {"record_id": "rec2"}
                ],
                "has_more": false,
                "total": 2
            }
        }));
    });

    let client = client_for(&server);
    let document_id = client.resolve_document_id("wikcn_node").await.unwrap();
    assert_eq!(document_id, "doxcn_doc");
    node_mock.assert();

    let tables = client.list_tables(&document_id).await.unwrap();
    assert_eq!(
        tables,
        vec![
            Table {
                app_token: "bascnApp".to_string(),
                table_id: "tblMar".to_string()
            },
            Table {
                app_token: "bascnApp".to_string(),
                table_id: "tblFeb".to_string()
            },
        ]
    );

    let rows = client.list_records(&tables[0]).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows[0].contains_key("维护人"));
    assert!(rows[1].is_empty());
}

#[tokio::test]
async fn test_send_group_message_posts_text_content() {
    let server = MockServer::start();
    mock_token(&server);

    let send_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/open-apis/im/v1/messages")
            .query_param("receive_id_type", "chat_id")
            .header("authorization", "Bearer t-test-token")
            .json_body(json!({
                "receive_id": "oc_group",
                "msg_type": "text",
                "content": "{\"text\":\"滴滴！本月知识树文档已全部完成。\\n\"}"
            }));
        then.status(200)
            .json_body(json!({"code": 0, "msg": "success", "data": {"message_id": "om_1"}}));
    });

    let client = client_for(&server);
    client
        .send_group_message("oc_group", "滴滴！本月知识树文档已全部完成。\n")
        .await
        .unwrap();
    send_mock.assert();
}

#[tokio::test]
async fn test_direct_message_uses_member_id_type() {
    let server = MockServer::start();
    mock_token(&server);

    let send_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/open-apis/im/v1/messages")
            .query_param("receive_id_type", "open_id");
        then.status(200).json_body(json!({"code": 0, "msg": "success", "data": {}}));
    });

    let client = client_for(&server);
    client
        .send_direct_message("ou_owner", "请及时创建本月的维护记录")
        .await
        .unwrap();
    send_mock.assert();
}

#[tokio::test]
async fn test_direct_message_uses_person_in_charge_id_type() {
    let server = MockServer::start();
    mock_token(&server);

    let members_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/open-apis/im/v1/chats/oc_group/members")
            .query_param("member_id_type", "open_id");
        then.status(200).json_body(json!({
            "code": 0,
            "data": {"items": [{"member_id": "ou_1", "name": "Alice"}], "has_more": false}
        }));
    });
    let send_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/open-apis/im/v1/messages")
            .query_param("receive_id_type", "user_id")
            .json_body_partial(r#"{"receive_id": "owner01"}"#);
        then.status(200).json_body(json!({"code": 0, "msg": "success", "data": {}}));
    });

    let config = FeishuConfig {
        person_in_charge_id_type: Some("user_id".to_string()),
        ..config_for(&server)
    };
    let client = FeishuClient::new(&config).unwrap();

    client.list_group_members("oc_group").await.unwrap();
    client
        .send_direct_message("owner01", "请及时创建本月的维护记录")
        .await
        .unwrap();
    members_mock.assert();
    send_mock.assert();
}

#[tokio::test]
async fn test_send_rejected_by_api_is_send_failure() {
    let server = MockServer::start();
    mock_token(&server);

    server.mock(|when, then| {
        when.method(POST).path("/open-apis/im/v1/messages");
        then.status(400).json_body(json!({
            "code": 230002,
            "msg": "Bot/User can NOT be out of the chat."
        }));
    });

    let client = client_for(&server);
    let err = client
        .send_group_message("oc_group", "hello")
        .await
        .unwrap_err();

    match err {
        RemindError::SendFailure { target, reason } => {
            assert_eq!(target, "chat_id oc_group");
            assert!(reason.contains("230002"));
        }
        other => panic!("expected SendFailure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_token_failure_surfaces_feishu_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path(TOKEN_PATH);
        then.status(200)
            .json_body(json!({"code": 10003, "msg": "invalid param"}));
    });

    let client = client_for(&server);
    let result = client.list_group_members("oc_group").await;
    assert!(matches!(result, Err(RemindError::FeishuApi { code: 10003, .. })));
}
