//! End-to-end tests of the chat API against a scripted model provider.
//!
//! Each test builds its own app on a temporary store; no network access.

mod common;

use std::time::Duration;

use axum::http::{header, StatusCode};
use serde_json::json;
use uuid::Uuid;

use rc_domain::message::{MessagePart, UiRole};
use rc_domain::stream::StreamEvent;
use rc_domain::tool::Role;
use rc_gateway::runtime::ui_stream::UI_STREAM_HEADER;

use common::{
    chat_body, chunk_types, done, json_body, sse_chunks, usage, Script, TestApp,
};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sessions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn guest_session_is_issued_and_readable() {
    let app = TestApp::new();

    let resp = app.request("POST", "/api/auth/guest", None, None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let cookie = resp
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("rc_session="));
    let body = json_body(resp).await;
    assert_eq!(body["user"]["type"], "guest");
    let token = body["token"].as_str().unwrap();

    let resp = app.request("GET", "/api/auth/session", Some(token), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["isGuest"], true);

    let resp = app.request("GET", "/api/auth/session", None, None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(resp).await["code"], "unauthorized:auth");
}

#[tokio::test]
async fn guest_flow_can_be_disabled() {
    let app = TestApp::with_config(|c| c.auth.guest_enabled = false);
    let resp = app.request("POST", "/api/auth/guest", None, None).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(resp).await["code"], "forbidden:auth");
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /api/chat
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn text_turn_streams_and_persists() {
    let app = TestApp::new();
    let token = app.guest_token().await;
    app.provider.push_text(&["Hello", " world"], usage(10, 5));

    let chat_id = Uuid::new_v4();
    let resp = app.post_chat(Some(&token), chat_body(chat_id, "Hi there")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get(UI_STREAM_HEADER).unwrap(), "v1");

    let (chunks, finished) = sse_chunks(resp).await;
    assert!(finished, "stream must end with [DONE]");
    let types = chunk_types(&chunks);
    assert_eq!(types.first().map(String::as_str), Some("start"));
    assert_eq!(types.last().map(String::as_str), Some("finish"));
    assert_eq!(types.iter().filter(|t| *t == "text-delta").count(), 2);

    let usage_chunk = chunks.iter().find(|c| c["type"] == "data-usage").unwrap();
    assert_eq!(usage_chunk["data"]["inputTokens"], 10);
    assert_eq!(usage_chunk["data"]["outputTokens"], 5);
    assert_eq!(usage_chunk["data"]["totalTokens"], 15);

    // User message plus assistant message.
    let stored = app
        .state
        .store
        .messages
        .get_messages_by_chat_id(chat_id)
        .unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].role, UiRole::User);
    assert_eq!(stored[1].role, UiRole::Assistant);
    assert!(stored[1]
        .parts
        .iter()
        .any(|p| matches!(p, MessagePart::Text { text } if text == "Hello world")));
    assert!(stored[1]
        .parts
        .iter()
        .any(|p| matches!(p, MessagePart::Data { name, .. } if name == "usage")));

    let chat = app.state.store.chats.get_chat_by_id(chat_id).unwrap();
    let context = chat.last_context.unwrap();
    assert_eq!(context.total_tokens, 15);
    assert_eq!(context.model_id.as_deref(), Some("anthropic/claude-opus-4.5"));

    // The model saw the system prompt first and the user text last.
    let req = &app.provider.stream_requests()[0];
    assert_eq!(req.messages.first().unwrap().role, Role::System);
    assert_eq!(req.messages.last().unwrap().role, Role::User);
    assert!(!req.tools.is_empty());
}

#[tokio::test]
async fn follow_up_message_sends_history() {
    let app = TestApp::new();
    let token = app.guest_token().await;
    let chat_id = Uuid::new_v4();

    app.provider.push_text(&["First answer"], usage(3, 2));
    let resp = app.post_chat(Some(&token), chat_body(chat_id, "one")).await;
    sse_chunks(resp).await;

    app.provider.push_text(&["Second answer"], usage(6, 2));
    let resp = app.post_chat(Some(&token), chat_body(chat_id, "two")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    sse_chunks(resp).await;

    let requests = app.provider.stream_requests();
    let second = &requests[1];
    // system, user, assistant, user
    assert_eq!(second.messages.len(), 4);
    assert_eq!(second.messages[2].role, Role::Assistant);

    let stored = app
        .state
        .store
        .messages
        .get_messages_by_chat_id(chat_id)
        .unwrap();
    assert_eq!(stored.len(), 4);
}

#[tokio::test]
async fn invalid_body_is_rejected_before_auth() {
    let app = TestApp::new();

    let resp = app.post_chat(None, chat_body(Uuid::new_v4(), "")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["code"], "bad_request:api");

    let resp = app
        .request("POST", "/api/chat", None, Some(json!({ "nope": true })))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app.post_chat(None, chat_body(Uuid::new_v4(), "hello")).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(resp).await["code"], "unauthorized:chat");
}

#[tokio::test]
async fn daily_allowance_is_enforced() {
    let app = TestApp::with_config(|c| c.entitlements.guest.max_messages_per_day = 0);
    let token = app.guest_token().await;

    let resp = app.post_chat(Some(&token), chat_body(Uuid::new_v4(), "one")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    sse_chunks(resp).await;

    let resp = app.post_chat(Some(&token), chat_body(Uuid::new_v4(), "two")).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json_body(resp).await["code"], "rate_limit:chat");
}

#[tokio::test]
async fn other_users_chat_is_forbidden_until_public() {
    let app = TestApp::new();
    let owner = app.guest_token().await;
    let stranger = app.guest_token().await;
    let chat_id = Uuid::new_v4();

    let resp = app.post_chat(Some(&owner), chat_body(chat_id, "mine")).await;
    sse_chunks(resp).await;

    let resp = app.post_chat(Some(&stranger), chat_body(chat_id, "ours?")).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(resp).await["code"], "forbidden:chat");

    let uri = format!("/api/chat/{chat_id}");
    let resp = app.request("GET", &uri, Some(&stranger), None).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = app
        .request(
            "PATCH",
            &format!("/api/chat/{chat_id}/visibility"),
            Some(&owner),
            Some(json!({ "visibility": "public" })),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["visibility"], "public");

    let resp = app.request("GET", &uri, Some(&stranger), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["messages"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn gateway_billing_error_has_its_own_code() {
    let app = TestApp::new();
    let token = app.guest_token().await;

    app.provider.push(Script::Fail(
        "AI Gateway requires a valid credit card on file to service requests".into(),
    ));
    let resp = app.post_chat(Some(&token), chat_body(Uuid::new_v4(), "hi")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["code"], "bad_request:activate_gateway");

    app.provider.push(Script::Fail("upstream exploded".into()));
    let resp = app.post_chat(Some(&token), chat_body(Uuid::new_v4(), "hi")).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(resp).await["code"], "offline:chat");
}

#[tokio::test]
async fn mid_stream_failure_ends_with_error_part() {
    let app = TestApp::new();
    let token = app.guest_token().await;
    app.provider.push(Script::Events(vec![
        StreamEvent::Token {
            text: "partial".into(),
        },
        StreamEvent::Error {
            message: "connection reset".into(),
        },
    ]));

    let chat_id = Uuid::new_v4();
    let resp = app.post_chat(Some(&token), chat_body(chat_id, "hi")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let (chunks, finished) = sse_chunks(resp).await;
    assert!(finished);
    let last = chunks.last().unwrap();
    assert_eq!(last["type"], "error");
    assert_eq!(last["errorText"], "Oops, an error occurred!");

    // The text the client saw is kept alongside the user message.
    let stored = app
        .state
        .store
        .messages
        .get_messages_by_chat_id(chat_id)
        .unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[1].role, UiRole::Assistant);
    assert!(stored[1]
        .parts
        .iter()
        .any(|p| matches!(p, MessagePart::Text { text } if text == "partial")));
}

#[tokio::test]
async fn failure_after_tool_step_keeps_tool_result() {
    let app = TestApp::new();
    let token = app.guest_token().await;

    app.provider.push(Script::Events(vec![
        StreamEvent::ToolCallFinished {
            call_id: "call_1".into(),
            tool_name: "createDocument".into(),
            arguments: json!({ "title": "Notes", "kind": "text" }),
        },
        done(Some(usage(20, 4))),
    ]));
    app.provider.push_text(&["Some notes"], usage(5, 2));
    // The follow-up step cannot be opened.
    app.provider.push(Script::Fail("upstream exploded".into()));

    let chat_id = Uuid::new_v4();
    let resp = app
        .post_chat(Some(&token), chat_body(chat_id, "Take notes"))
        .await;
    let (chunks, finished) = sse_chunks(resp).await;
    assert!(finished);
    assert_eq!(chunks.last().unwrap()["type"], "error");

    let stored = app
        .state
        .store
        .messages
        .get_messages_by_chat_id(chat_id)
        .unwrap();
    assert_eq!(stored.len(), 2);
    let assistant = &stored[1];
    assert_eq!(assistant.role, UiRole::Assistant);
    assert!(assistant
        .parts
        .iter()
        .any(|p| matches!(p, MessagePart::Tool(t) if t.tool_name == "createDocument")));
    let usage_part = assistant
        .parts
        .iter()
        .find_map(|p| match p {
            MessagePart::Data { name, data } if name == "usage" => Some(data),
            _ => None,
        })
        .unwrap();
    assert_eq!(usage_part["inputTokens"], 20);

    let chat = app.state.store.chats.get_chat_by_id(chat_id).unwrap();
    assert!(chat.last_context.is_some());
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tools
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn create_document_tool_streams_and_saves_artifact() {
    let app = TestApp::new();
    let token = app.guest_token().await;

    // Step 1: the model asks for a document.
    app.provider.push(Script::Events(vec![
        StreamEvent::ToolCallStarted {
            call_id: "call_1".into(),
            tool_name: "createDocument".into(),
        },
        StreamEvent::ToolCallFinished {
            call_id: "call_1".into(),
            tool_name: "createDocument".into(),
            arguments: json!({ "title": "Spring haiku", "kind": "text" }),
        },
        done(Some(usage(20, 4))),
    ]));
    // The artifact model writes the content.
    app.provider.push_text(&["Blossoms", " drift"], usage(5, 2));
    // Step 2: the model wraps up.
    app.provider.push_text(&["Done!"], usage(30, 2));

    let chat_id = Uuid::new_v4();
    let resp = app
        .post_chat(Some(&token), chat_body(chat_id, "Write a haiku"))
        .await;
    let (chunks, finished) = sse_chunks(resp).await;
    assert!(finished);

    let types = chunk_types(&chunks);
    for expected in [
        "tool-input-start",
        "tool-input-available",
        "data-kind",
        "data-id",
        "data-title",
        "data-clear",
        "data-textDelta",
        "data-finish",
        "tool-output-available",
        "data-usage",
    ] {
        assert!(types.iter().any(|t| t == expected), "missing {expected}: {types:?}");
    }
    let text_delta = chunks.iter().find(|c| c["type"] == "data-textDelta").unwrap();
    assert_eq!(text_delta["transient"], true);
    assert_eq!(types.iter().filter(|t| *t == "start-step").count(), 2);

    let output = &chunks
        .iter()
        .find(|c| c["type"] == "tool-output-available")
        .unwrap()["output"];
    assert_eq!(output["title"], "Spring haiku");
    assert_eq!(output["kind"], "text");
    let doc_id: Uuid = output["id"].as_str().unwrap().parse().unwrap();

    let doc = app.state.store.documents.get_document_by_id(doc_id).unwrap();
    assert_eq!(doc.content.as_deref(), Some("Blossoms drift"));

    let resp = app
        .request("GET", &format!("/api/document?id={doc_id}"), Some(&token), None)
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await.as_array().unwrap().len(), 1);

    // Usage adds up over both chat steps, not the artifact call.
    let usage_chunk = chunks.iter().find(|c| c["type"] == "data-usage").unwrap();
    assert_eq!(usage_chunk["data"]["inputTokens"], 50);

    // The second step saw the tool result.
    let requests = app.provider.stream_requests();
    assert_eq!(requests.len(), 3);
    assert!(requests[2].messages.iter().any(|m| m.role == Role::Tool));
}

#[tokio::test]
async fn reasoning_model_runs_without_tools() {
    let app = TestApp::new();
    let token = app.guest_token().await;
    app.provider.push(Script::Events(vec![
        StreamEvent::Thinking {
            text: "Let me think".into(),
        },
        StreamEvent::Token {
            text: "Answer".into(),
        },
        done(None),
    ]));

    let mut body = chat_body(Uuid::new_v4(), "why?");
    body["selectedChatModel"] = json!("chat-model-grok");
    let resp = app.post_chat(Some(&token), body).await;
    let (chunks, _) = sse_chunks(resp).await;

    let types = chunk_types(&chunks);
    assert!(types.iter().any(|t| t == "reasoning-delta"));
    assert!(app.provider.stream_requests()[0].tools.is_empty());
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Titles, resume, history, delete
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn new_chat_gets_generated_title() {
    let app = TestApp::new();
    let token = app.guest_token().await;
    let chat_id = Uuid::new_v4();

    let resp = app
        .post_chat(Some(&token), chat_body(chat_id, "What's the weather in Paris?"))
        .await;
    sse_chunks(resp).await;

    let mut title = String::new();
    for _ in 0..50 {
        title = app.state.store.chats.get_chat_by_id(chat_id).unwrap().title;
        if title != "New Chat" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(title, "Weather in Paris");
}

#[tokio::test]
async fn finished_stream_can_be_resumed() {
    let app = TestApp::new();
    let token = app.guest_token().await;
    app.provider.push_text(&["Resumable"], usage(1, 1));

    let chat_id = Uuid::new_v4();
    let resp = app.post_chat(Some(&token), chat_body(chat_id, "hi")).await;
    let (original, _) = sse_chunks(resp).await;

    let uri = format!("/api/chat/{chat_id}/stream");
    let resp = app.request("GET", &uri, Some(&token), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let (replayed, finished) = sse_chunks(resp).await;
    assert!(finished);
    assert_eq!(replayed, original);

    let resp = app.request("GET", &uri, None, None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let missing = format!("/api/chat/{}/stream", Uuid::new_v4());
    let resp = app.request("GET", &missing, Some(&token), None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn resume_without_recorded_stream_is_no_content() {
    let app = TestApp::with_config(|c| c.streams.resumable = false);
    let token = app.guest_token().await;
    let chat_id = Uuid::new_v4();

    let resp = app.post_chat(Some(&token), chat_body(chat_id, "hi")).await;
    sse_chunks(resp).await;

    let resp = app
        .request("GET", &format!("/api/chat/{chat_id}/stream"), Some(&token), None)
        .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn history_lists_and_deletes_chats() {
    let app = TestApp::new();
    let token = app.guest_token().await;
    for text in ["one", "two", "three"] {
        let resp = app.post_chat(Some(&token), chat_body(Uuid::new_v4(), text)).await;
        sse_chunks(resp).await;
    }

    let resp = app.request("GET", "/api/history?limit=2", Some(&token), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let page = json_body(resp).await;
    assert_eq!(page["chats"].as_array().unwrap().len(), 2);
    assert_eq!(page["hasMore"], true);

    let resp = app
        .request(
            "GET",
            &format!(
                "/api/history?starting_after={}&ending_before={}",
                Uuid::new_v4(),
                Uuid::new_v4()
            ),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app.request("DELETE", "/api/history", Some(&token), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["deletedCount"], 3);

    let resp = app.request("GET", "/api/history", Some(&token), None).await;
    assert_eq!(json_body(resp).await["chats"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn deleted_chat_is_gone() {
    let app = TestApp::new();
    let token = app.guest_token().await;
    let stranger = app.guest_token().await;
    let chat_id = Uuid::new_v4();

    let resp = app.post_chat(Some(&token), chat_body(chat_id, "bye")).await;
    sse_chunks(resp).await;

    let uri = format!("/api/chat?id={chat_id}");
    let resp = app.request("DELETE", &uri, Some(&stranger), None).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = app.request("DELETE", &uri, Some(&token), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["id"], chat_id.to_string());

    let resp = app
        .request("GET", &format!("/api/chat/{chat_id}"), Some(&token), None)
        .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(resp).await["code"], "not_found:chat");

    let resp = app.request("DELETE", "/api/chat", Some(&token), None).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn models_and_health_are_public() {
    let app = TestApp::new();

    let resp = app.request("GET", "/api/models", None, None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["default"], "chat-model");
    assert_eq!(body["models"].as_array().unwrap().len(), 4);

    let resp = app.request("GET", "/health", None, None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["status"], "ok");
}
