mod harness;

use harness::config::ConfigBuilder;
use harness::mock::MockUpstream;
use harness::server::TestServer;

fn chat_body(prompt: &str) -> serde_json::Value {
    serde_json::json!({ "prompt": prompt })
}

#[tokio::test]
async fn health_endpoint_responds() {
    let groq = MockUpstream::openai("hi").await.unwrap();
    let config = ConfigBuilder::new().with_groq("groq", &groq.base_url()).build();
    let server = TestServer::start(config).await.unwrap();

    let resp = server.client().get(server.url("/api/health")).send().await.unwrap();
    assert_eq!(resp.status(), 200);

    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn chat_requires_identity() {
    let groq = MockUpstream::openai("hi").await.unwrap();
    let config = ConfigBuilder::new().with_groq("groq", &groq.base_url()).build();
    let server = TestServer::start(config).await.unwrap();

    let resp = server
        .client()
        .post(server.url("/api/chat"))
        .json(&chat_body("hello"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 401);
    assert_eq!(groq.hits(), 0);
}

#[tokio::test]
async fn chat_round_trip_returns_model_info() {
    let groq = MockUpstream::openai("the answer").await.unwrap();
    let config = ConfigBuilder::new().with_groq("groq", &groq.base_url()).build();
    let server = TestServer::start(config).await.unwrap();

    let resp = server
        .client()
        .post(server.url("/api/chat"))
        .header("x-user-id", "user-42")
        .json(&chat_body("explain closures"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["message"], "the answer");
    assert_eq!(json["model"], "groq");
    assert_eq!(json["modelInfo"]["switched"], false);
    assert!(json["sessionId"].as_str().is_some_and(|s| !s.is_empty()));
}

#[tokio::test]
async fn empty_prompt_is_a_bad_request() {
    let groq = MockUpstream::openai("hi").await.unwrap();
    let config = ConfigBuilder::new().with_groq("groq", &groq.base_url()).build();
    let server = TestServer::start(config).await.unwrap();

    let resp = server
        .client()
        .post(server.url("/api/chat"))
        .header("x-user-id", "user-42")
        .json(&chat_body("   "))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn status_endpoint_projects_ledger_state() {
    let groq = MockUpstream::openai("hi").await.unwrap();
    let gemini = MockUpstream::gemini("hi").await.unwrap();
    let config = ConfigBuilder::new()
        .with_groq("groq", &groq.base_url())
        .with_gemini("gemini", &gemini.base_url())
        .build();
    let server = TestServer::start(config).await.unwrap();

    let resp = server
        .client()
        .get(server.url("/api/ai/status"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["currentModel"], "groq");
    let models: Vec<&str> = json["availableModels"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert_eq!(models, ["groq", "gemini"]);
    assert_eq!(json["providers"][0]["requests_made"], 0);
}

#[tokio::test]
async fn switch_model_validates_and_moves_the_pointer() {
    let groq = MockUpstream::openai("hi").await.unwrap();
    let gemini = MockUpstream::gemini("hi").await.unwrap();
    let config = ConfigBuilder::new()
        .with_groq("groq", &groq.base_url())
        .with_gemini("gemini", &gemini.base_url())
        .build();
    let server = TestServer::start(config).await.unwrap();

    let resp = server
        .client()
        .post(server.url("/api/ai/switch-model"))
        .header("x-user-id", "user-42")
        .json(&serde_json::json!({ "targetModel": "nope" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = server
        .client()
        .post(server.url("/api/ai/switch-model"))
        .header("x-user-id", "user-42")
        .json(&serde_json::json!({ "targetModel": "gemini" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let status: serde_json::Value = server
        .client()
        .get(server.url("/api/ai/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["currentModel"], "gemini");
}

#[tokio::test]
async fn stream_replays_the_turn_as_events() {
    let groq = MockUpstream::openai("ok!").await.unwrap();
    let config = ConfigBuilder::new().with_groq("groq", &groq.base_url()).build();
    let server = TestServer::start(config).await.unwrap();

    let resp = server
        .client()
        .post(server.url("/api/stream"))
        .header("x-user-id", "user-42")
        .json(&chat_body("short please"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let content_type = resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    assert!(content_type.starts_with("text/event-stream"));

    let body = resp.text().await.unwrap();
    assert!(body.contains("ok!"));
    assert!(body.contains("metadata"));
    assert!(body.contains("[DONE]"));
}
