//! Document and search tools driven through full chat turns.

mod common;

use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use rc_domain::stream::StreamEvent;
use rc_store::{Document, DocumentKind};

use common::{chat_body, chunk_types, done, sse_chunks, tool_output, usage, Script, TestApp};

fn seed_document(app: &TestApp, user_id: &str, content: &str) -> Uuid {
    let id = Uuid::new_v4();
    app.state
        .store
        .documents
        .save_document(Document {
            id,
            created_at: Utc::now(),
            title: "Essay".into(),
            content: Some(content.into()),
            kind: DocumentKind::Text,
            user_id: user_id.into(),
        })
        .unwrap();
    id
}

/// Script one step that calls `tool` with `args`.
fn push_tool_call(app: &TestApp, tool: &str, args: Value) {
    app.provider.push(Script::Events(vec![
        StreamEvent::ToolCallFinished {
            call_id: "call_1".into(),
            tool_name: tool.into(),
            arguments: args,
        },
        done(Some(usage(10, 2))),
    ]));
}

async fn run_turn(app: &TestApp, token: &str, body: Value) -> Vec<Value> {
    let resp = app.post_chat(Some(token), body).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let (chunks, finished) = sse_chunks(resp).await;
    assert!(finished);
    chunks
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// updateDocument
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn update_document_saves_new_version() {
    let app = TestApp::new();
    let (token, user_id) = app.guest().await;
    let doc_id = seed_document(&app, &user_id, "First draft");

    push_tool_call(
        &app,
        "updateDocument",
        json!({ "id": doc_id, "description": "Make it shorter" }),
    );
    app.provider.push_text(&["Short", " draft"], usage(5, 2));
    app.provider.push_text(&["Updated."], usage(12, 1));

    let chunks = run_turn(&app, &token, chat_body(Uuid::new_v4(), "Shorten it")).await;
    let types = chunk_types(&chunks);
    for expected in ["data-clear", "data-textDelta", "data-finish"] {
        assert!(types.iter().any(|t| t == expected), "missing {expected}: {types:?}");
    }
    let output = tool_output(&chunks);
    assert_eq!(output["id"], doc_id.to_string());
    assert_eq!(output["content"], "The document has been updated successfully.");

    let versions = app.state.store.documents.get_documents_by_id(doc_id);
    assert_eq!(versions.len(), 2);
    let latest = app.state.store.documents.get_document_by_id(doc_id).unwrap();
    assert_eq!(latest.content.as_deref(), Some("Short draft"));
    assert_eq!(latest.user_id, user_id);

    // The artifact model saw the current content in its system prompt.
    let requests = app.provider.stream_requests();
    assert!(requests[1].messages[0]
        .content
        .text()
        .is_some_and(|s| s.contains("First draft")));
}

#[tokio::test]
async fn update_document_with_unknown_id_reports_not_found() {
    let app = TestApp::new();
    let (token, _) = app.guest().await;

    push_tool_call(
        &app,
        "updateDocument",
        json!({ "id": Uuid::new_v4(), "description": "Anything" }),
    );
    app.provider.push_text(&["It does not exist."], usage(12, 1));

    let chunks = run_turn(&app, &token, chat_body(Uuid::new_v4(), "Edit it")).await;
    assert_eq!(tool_output(&chunks)["error"], "Document not found");
    assert!(!chunk_types(&chunks).iter().any(|t| t == "data-clear"));
}

#[tokio::test]
async fn update_document_of_another_user_is_not_found() {
    let app = TestApp::new();
    let (_, owner) = app.guest().await;
    let (token, _) = app.guest().await;
    let doc_id = seed_document(&app, &owner, "Private notes");

    push_tool_call(
        &app,
        "updateDocument",
        json!({ "id": doc_id, "description": "Replace everything" }),
    );
    app.provider.push_text(&["Done."], usage(12, 1));

    let chunks = run_turn(&app, &token, chat_body(Uuid::new_v4(), "Overwrite it")).await;
    assert_eq!(tool_output(&chunks)["error"], "Document not found");

    let versions = app.state.store.documents.get_documents_by_id(doc_id);
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].content.as_deref(), Some("Private notes"));
    assert_eq!(versions[0].user_id, owner);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// requestSuggestions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn request_suggestions_streams_and_saves() {
    let app = TestApp::new();
    let (token, user_id) = app.guest().await;
    let doc_id = seed_document(&app, &user_id, "Their going home. It was good.");

    push_tool_call(&app, "requestSuggestions", json!({ "documentId": doc_id }));
    app.provider.push_json_reply(json!({
        "suggestions": [
            {
                "originalSentence": "Their going home.",
                "suggestedSentence": "They're going home.",
                "description": "Use the contraction"
            },
            {
                "originalSentence": "It was good.",
                "suggestedSentence": "It was excellent."
            }
        ]
    }));
    app.provider.push_text(&["Suggestions added."], usage(12, 1));

    let chunks = run_turn(&app, &token, chat_body(Uuid::new_v4(), "Review it")).await;
    let streamed: Vec<&Value> = chunks
        .iter()
        .filter(|c| c["type"] == "data-suggestion")
        .collect();
    assert_eq!(streamed.len(), 2);
    assert_eq!(streamed[0]["transient"], true);

    let output = tool_output(&chunks);
    assert_eq!(output["id"], doc_id.to_string());
    assert_eq!(output["message"], "Suggestions have been added to the document");

    let saved = app
        .state
        .store
        .documents
        .get_suggestions_by_document_id(doc_id);
    assert_eq!(saved.len(), 2);
    assert!(saved.iter().all(|s| s.user_id == user_id && !s.is_resolved));
    assert!(saved
        .iter()
        .any(|s| s.suggested_text == "They're going home."
            && s.description.as_deref() == Some("Use the contraction")));
}

#[tokio::test]
async fn request_suggestions_on_another_users_document_is_not_found() {
    let app = TestApp::new();
    let (_, owner) = app.guest().await;
    let (token, _) = app.guest().await;
    let doc_id = seed_document(&app, &owner, "Private notes.");

    push_tool_call(&app, "requestSuggestions", json!({ "documentId": doc_id }));
    app.provider.push_json_reply(json!({
        "suggestions": [
            { "originalSentence": "Private notes.", "suggestedSentence": "Public notes." }
        ]
    }));
    app.provider.push_text(&["Nothing to do."], usage(12, 1));

    let chunks = run_turn(&app, &token, chat_body(Uuid::new_v4(), "Review it")).await;
    assert_eq!(tool_output(&chunks)["error"], "Document not found");
    assert!(app
        .state
        .store
        .documents
        .get_suggestions_by_document_id(doc_id)
        .is_empty());
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// valyuSearch
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Serve `/deepsearch` on a local port with a fixed status and body.
/// Returns the base URL.
async fn spawn_search_server(status: StatusCode, reply: Value) -> String {
    let app = Router::new().route(
        "/deepsearch",
        post(move |Json(body): Json<Value>| {
            let reply = reply.clone();
            async move {
                assert!(body["query"].is_string());
                (status, Json(reply))
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn search_app(base_url: String, key_env: &str) -> TestApp {
    let key_env = key_env.to_string();
    TestApp::with_config(move |config| {
        config.search.base_url = base_url;
        config.search.api_key_env = key_env;
    })
}

fn search_body(text: &str) -> Value {
    let mut body = chat_body(Uuid::new_v4(), text);
    body["enableValyuSearch"] = json!(true);
    body
}

#[tokio::test]
async fn search_returns_results_with_summary() {
    let base_url = spawn_search_server(
        StatusCode::OK,
        json!({
            "success": true,
            "results": [
                { "title": "A", "source": "web", "content": "one two three" },
                { "title": "B", "source": "valyu/valyu-arxiv", "content": "four five" }
            ],
            "total_deduction_dollars": 0.02
        }),
    )
    .await;
    std::env::set_var("RC_TEST_SEARCH_KEY_OK", "secret");
    let app = search_app(base_url, "RC_TEST_SEARCH_KEY_OK");
    let (token, _) = app.guest().await;

    push_tool_call(
        &app,
        "valyuSearch",
        json!({ "query": "latest rust release", "category": "general" }),
    );
    app.provider.push_text(&["Here is what I found."], usage(40, 5));

    let chunks = run_turn(&app, &token, search_body("latest rust release")).await;
    let output = tool_output(&chunks);
    assert_eq!(output["success"], true);
    assert_eq!(output["query"], "latest rust release");
    assert_eq!(output["source"], "Valyu DeepSearch API");
    assert_eq!(output["summary"]["resultCount"], 2);
    assert_eq!(output["summary"]["uniqueSources"], 2);
    assert_eq!(output["summary"]["totalWords"], 5);
    assert_eq!(output["summary"]["searchCostUSD"], 0.02);
}

#[tokio::test]
async fn search_service_error_is_a_tool_result() {
    let base_url = spawn_search_server(
        StatusCode::UNAUTHORIZED,
        json!({ "success": false, "error": "Invalid API key" }),
    )
    .await;
    std::env::set_var("RC_TEST_SEARCH_KEY_BAD", "wrong");
    let app = search_app(base_url, "RC_TEST_SEARCH_KEY_BAD");
    let (token, _) = app.guest().await;

    push_tool_call(&app, "valyuSearch", json!({ "query": "tsla earnings" }));
    app.provider.push_text(&["The search failed."], usage(40, 5));

    let chunks = run_turn(&app, &token, search_body("tsla earnings")).await;
    let output = tool_output(&chunks);
    let error = output["error"].as_str().unwrap();
    assert!(error.starts_with("Failed to perform Valyu search"), "{error}");
    assert!(error.contains("Invalid API key"), "{error}");

    // The turn itself carries on to the next step.
    let last = chunks.last().unwrap();
    assert_eq!(last["type"], "finish");
}

#[tokio::test]
async fn search_without_api_key_reports_configuration() {
    let app = search_app("http://127.0.0.1:9".into(), "RC_TEST_SEARCH_KEY_UNSET");
    let (token, _) = app.guest().await;

    push_tool_call(&app, "valyuSearch", json!({ "query": "weather" }));
    app.provider.push_text(&["No key."], usage(40, 5));

    let chunks = run_turn(&app, &token, search_body("weather")).await;
    let error = tool_output(&chunks)["error"].as_str().unwrap().to_string();
    assert!(error.contains("RC_TEST_SEARCH_KEY_UNSET"), "{error}");
}
