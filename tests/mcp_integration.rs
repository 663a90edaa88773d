//! Protocol-level integration tests: lifecycle, routing, capability
//! gating, and error isolation, driven over an in-memory transport.

mod common;

use serde_json::json;

use common::TestClient;
use journal_mcp::mcp::registry::{ServerRegistry, ToolDescriptor, ToolResult};
use journal_mcp::schema::ObjectSchema;
use journal_mcp::store::NewEntry;

fn tools_only_registry() -> ServerRegistry {
    let mut registry = ServerRegistry::new();
    registry
        .tools
        .register(ToolDescriptor::new(
            "noop",
            "does nothing",
            ObjectSchema::new(),
            |_ctx, _args| async { Ok(ToolResult::text("ok")) },
        ))
        .unwrap();
    registry
}

#[tokio::test]
async fn initialize_advertises_registered_capabilities() {
    let mut client = TestClient::start();
    let result = client.initialize_basic().await;

    assert_eq!(result["protocolVersion"], "2025-03-26");
    assert_eq!(result["serverInfo"]["name"], "journal-mcp");

    let caps = &result["capabilities"];
    assert!(caps["tools"].is_object());
    assert_eq!(caps["resources"]["listChanged"], true);
    assert!(caps["prompts"].is_object());
    assert!(caps["completions"].is_object());
}

#[tokio::test]
async fn capabilities_omit_unregistered_groups() {
    let mut client = TestClient::start_with(tools_only_registry());
    let result = client.initialize_basic().await;

    let caps = result["capabilities"].as_object().unwrap();
    assert!(caps.contains_key("tools"));
    assert!(!caps.contains_key("resources"));
    assert!(!caps.contains_key("prompts"));
    assert!(!caps.contains_key("completions"));
}

#[tokio::test]
async fn requests_before_initialisation_are_rejected() {
    let mut client = TestClient::start();

    let response = client.request("tools/list", json!({})).await;
    assert_eq!(response["error"]["code"], -32600);
    assert_eq!(response["error"]["message"], "Server not initialised");
}

#[tokio::test]
async fn initialize_twice_is_an_error() {
    let mut client = TestClient::start();
    client.initialize_basic().await;

    let response = client
        .request(
            "initialize",
            json!({"protocolVersion": "2025-03-26", "capabilities": {}}),
        )
        .await;
    assert_eq!(response["error"]["code"], -32600);
    assert_eq!(response["error"]["message"], "Server already initialised");
}

#[tokio::test]
async fn ping_returns_an_empty_object() {
    let mut client = TestClient::start();
    client.initialize_basic().await;

    let response = client.request("ping", json!({})).await;
    assert_eq!(response["result"], json!({}));
}

#[tokio::test]
async fn unknown_method_yields_method_not_found() {
    let mut client = TestClient::start();
    client.initialize_basic().await;

    let response = client.request("bogus/method", json!({})).await;
    assert_eq!(response["error"]["code"], -32601);
}

#[tokio::test]
async fn malformed_json_yields_parse_error() {
    let mut client = TestClient::start();
    client.send_raw("this is not json");

    let response = client.recv().await;
    assert_eq!(response["error"]["code"], -32700);
    assert!(response.get("id").is_none());
}

#[tokio::test]
async fn tools_list_is_idempotent() {
    let mut client = TestClient::start();
    client.initialize_basic().await;

    let first = client.request("tools/list", json!({})).await;
    let second = client.request("tools/list", json!({})).await;
    assert_eq!(first["result"], second["result"]);

    let tools = first["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 11);
    assert!(tools.iter().all(|t| t["inputSchema"]["type"] == "object"));
    assert!(tools.iter().any(|t| t["name"] == "create_entry"));
}

#[tokio::test]
async fn missing_required_argument_is_a_protocol_error() {
    let mut client = TestClient::start();
    client.initialize_basic().await;

    // "content" is required; the handler must not run.
    let response = client
        .request(
            "tools/call",
            json!({"name": "create_entry", "arguments": {"title": "No body"}}),
        )
        .await;
    assert_eq!(response["error"]["code"], -32602);
    assert!(client.store.list_entries(None).unwrap().is_empty());
}

#[tokio::test]
async fn unknown_tool_is_a_tool_level_error() {
    let mut client = TestClient::start();
    client.initialize_basic().await;

    let result = client.call_tool("bogus_tool", json!({})).await;
    assert_eq!(result["isError"], true);
    assert_eq!(TestClient::first_text(&result), "Unknown tool: bogus_tool");
}

#[tokio::test]
async fn undeclared_capability_groups_are_gated() {
    let mut client = TestClient::start_with(tools_only_registry());
    client.initialize_basic().await;

    let response = client.request("prompts/list", json!({})).await;
    assert_eq!(response["error"]["code"], -32001);
    assert!(response["error"]["message"]
        .as_str()
        .unwrap()
        .contains("prompts"));

    let response = client
        .request(
            "completion/complete",
            json!({
                "ref": {"type": "ref/prompt", "name": "anything"},
                "argument": {"name": "x", "value": ""}
            }),
        )
        .await;
    assert_eq!(response["error"]["code"], -32001);
}

#[tokio::test]
async fn declared_groups_are_reachable() {
    let mut client = TestClient::start();
    client.initialize_basic().await;

    let response = client.request("prompts/list", json!({})).await;
    let prompts = response["result"]["prompts"].as_array().unwrap();
    assert_eq!(prompts[0]["name"], "suggest_tags");
    assert_eq!(prompts[0]["arguments"][0]["name"], "entryId");
    assert_eq!(prompts[0]["arguments"][0]["required"], true);
}

#[tokio::test]
async fn handler_failures_do_not_poison_the_session() {
    let mut client = TestClient::start();
    client.initialize_basic().await;

    let result = client.call_tool("get_entry", json!({"id": 99})).await;
    assert_eq!(result["isError"], true);
    assert_eq!(
        TestClient::first_text(&result),
        "Entry with ID \"99\" not found"
    );

    // The session keeps working after a tool-level failure.
    let result = client
        .call_tool(
            "create_entry",
            json!({"title": "After failure", "content": "Still alive"}),
        )
        .await;
    assert!(result.get("isError").is_none());
}

#[tokio::test]
async fn resources_read_of_unknown_uri_is_not_found() {
    let mut client = TestClient::start();
    client.initialize_basic().await;

    let response = client
        .request("resources/read", json!({"uri": "journal://nope"}))
        .await;
    assert_eq!(response["error"]["code"], -32002);
    assert_eq!(
        response["error"]["message"],
        "Resource not found: journal://nope"
    );
}

#[tokio::test]
async fn templates_list_reports_patterns() {
    let mut client = TestClient::start();
    client.initialize_basic().await;

    let response = client.request("resources/templates/list", json!({})).await;
    let templates = response["result"]["resourceTemplates"].as_array().unwrap();
    let patterns: Vec<&str> = templates
        .iter()
        .map(|t| t["uriTemplate"].as_str().unwrap())
        .collect();
    assert_eq!(
        patterns,
        vec!["journal://tags/{id}", "journal://entries/{id}"]
    );
}

#[tokio::test]
async fn completion_truncation_reports_has_more() {
    let mut client = TestClient::start();
    client.initialize_basic().await;

    // One more candidate than the reply can carry.
    for i in 0..101 {
        client
            .store
            .create_entry(&NewEntry {
                title: format!("Entry {i}"),
                content: "body".to_string(),
                ..NewEntry::default()
            })
            .unwrap();
    }

    let response = client
        .request(
            "completion/complete",
            json!({
                "ref": {"type": "ref/resource", "uri": "journal://entries/{id}"},
                "argument": {"name": "id", "value": ""}
            }),
        )
        .await;
    let completion = &response["result"]["completion"];
    assert_eq!(completion["values"].as_array().unwrap().len(), 100);
    assert_eq!(completion["total"], 101);
    assert_eq!(completion["hasMore"], true);
}

#[tokio::test]
async fn completion_for_unknown_template_is_invalid_params() {
    let mut client = TestClient::start();
    client.initialize_basic().await;

    let response = client
        .request(
            "completion/complete",
            json!({
                "ref": {"type": "ref/resource", "uri": "journal://nope/{id}"},
                "argument": {"name": "id", "value": ""}
            }),
        )
        .await;
    assert_eq!(response["error"]["code"], -32602);
}
