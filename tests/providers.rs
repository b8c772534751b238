//! Integration tests for the HTTP providers
//!
//! Validates request and response shapes against mock servers

mod common;

use futures::StreamExt;
use serde_json::json;
use wiremock::{
    matchers::{body_partial_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use common::http_config;
use troupe::cli::commands;
use troupe::core::Message;
use troupe::llm::{AnthropicProvider, OpenAIProvider};
use troupe::{Agent, LLMProvider, ModelClient, ProviderKind, Tool, TroupeError};

fn add() -> Tool {
    Tool::builder("add")
        .description("Add two integers")
        .param::<i64>("a")
        .param::<i64>("b")
        .handler(|args| Ok(json!(args.get::<i64>("a")? + args.get::<i64>("b")?)))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_openai_tool_cycle_over_http() {
    let server = MockServer::start().await;

    // First call: the model asks for the tool
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({"tools": [{"type": "function"}]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "gpt-4o",
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "add", "arguments": "{\"a\":2,\"b\":3}"}
                    }]
                }
            }]
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    // Second call carries the tool result; tools stay listed but may not be called
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "tool_choice": "none",
            "tools": [{"function": {"name": "add"}}],
            "messages": [{}, {}, {"role": "assistant"}, {"role": "tool", "tool_call_id": "call_1", "content": "5"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "gpt-4o",
            "choices": [{"message": {"role": "assistant", "content": "2 + 3 = 5"}}],
            "usage": {"prompt_tokens": 30, "completion_tokens": 6, "total_tokens": 36}
        })))
        .mount(&server)
        .await;

    let client =
        ModelClient::from_config(http_config(ProviderKind::OpenAI, &server.uri())).unwrap();
    let agent = Agent::builder().tool(add()).build(client).unwrap();

    assert_eq!(agent.chat("What is 2+3?").await.unwrap(), "2 + 3 = 5");
}

#[tokio::test]
async fn test_anthropic_request_shape() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({
            "system": "You are terse.",
            "max_tokens": 4096,
            "messages": [{"role": "user", "content": "hi"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "claude-3-5-sonnet-20241022",
            "content": [{"type": "text", "text": "Hello."}],
            "usage": {"input_tokens": 8, "output_tokens": 2}
        })))
        .mount(&server)
        .await;

    let config = http_config(ProviderKind::Claude, &server.uri());
    let provider = AnthropicProvider::from_config(&config).unwrap();
    let response = provider
        .chat(
            "claude-3-5-sonnet-20241022",
            &[Message::system("You are terse."), Message::user("hi")],
            None,
        )
        .await
        .unwrap();

    assert_eq!(response.content, "Hello.");
    assert_eq!(response.usage.unwrap().total_tokens, 10);
}

#[tokio::test]
async fn test_anthropic_tool_cycle_over_http() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(body_partial_json(json!({"tools": [{"name": "add"}]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "claude-3-5-sonnet-20241022",
            "content": [
                {"type": "tool_use", "id": "tu_1", "name": "add", "input": {"a": 2, "b": 3}}
            ],
            "usage": {"input_tokens": 20, "output_tokens": 10}
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    // tool_use/tool_result blocks are only accepted alongside the tool list
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(body_partial_json(json!({
            "tools": [{"name": "add"}],
            "tool_choice": {"type": "none"},
            "messages": [
                {"role": "user"},
                {"role": "assistant", "content": [{"type": "tool_use", "id": "tu_1"}]},
                {"role": "user", "content": [{"type": "tool_result", "tool_use_id": "tu_1", "content": "5"}]}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "claude-3-5-sonnet-20241022",
            "content": [{"type": "text", "text": "2 + 3 = 5"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client =
        ModelClient::from_config(http_config(ProviderKind::Claude, &server.uri())).unwrap();
    let agent = Agent::builder().tool(add()).build(client).unwrap();

    assert_eq!(agent.chat("What is 2+3?").await.unwrap(), "2 + 3 = 5");
    assert_eq!(agent.memory_stats().entries, 1);
}

#[tokio::test]
async fn test_openai_stream_over_http() {
    let server = MockServer::start().await;

    let body = concat!(
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\"}}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hel\"}}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"lo.\"}}]}\n\n",
        "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let client =
        ModelClient::from_config(http_config(ProviderKind::OpenAI, &server.uri())).unwrap();

    let chunks: Vec<String> = client
        .stream(&[Message::user("hi")], None, None)
        .await
        .unwrap()
        .map(|chunk| chunk.unwrap())
        .collect()
        .await;
    assert_eq!(chunks, vec!["Hel", "lo."]);

    let mut out = Vec::new();
    let reply = commands::chat_stream(&client, Some("Be brief."), "hi", &mut out)
        .await
        .unwrap();
    assert_eq!(reply, "Hello.");
    assert_eq!(String::from_utf8(out).unwrap(), "Hello.\n");
}

#[tokio::test]
async fn test_anthropic_stream_over_http() {
    let server = MockServer::start().await;

    let body = concat!(
        "event: message_start\n",
        "data: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_1\"}}\n\n",
        "event: content_block_delta\n",
        "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hi \"}}\n\n",
        "event: content_block_delta\n",
        "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"there\"}}\n\n",
        "event: message_stop\n",
        "data: {\"type\":\"message_stop\"}\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let client =
        ModelClient::from_config(http_config(ProviderKind::Claude, &server.uri())).unwrap();
    let chunks: Vec<String> = client
        .stream(&[Message::user("hi")], None, None)
        .await
        .unwrap()
        .map(|chunk| chunk.unwrap())
        .collect()
        .await;
    assert_eq!(chunks, vec!["Hi ", "there"]);
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "recovered"}}]
        })))
        .mount(&server)
        .await;

    let mut config = http_config(ProviderKind::OpenAI, &server.uri());
    config.provider.max_retries = 2;
    let provider = OpenAIProvider::from_config(&config).unwrap();

    let response = provider
        .chat("gpt-4o", &[Message::user("ping")], None)
        .await
        .unwrap();
    assert_eq!(response.content, "recovered");
}

#[tokio::test]
async fn test_auth_failure_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = http_config(ProviderKind::OpenAI, &server.uri());
    config.provider.max_retries = 3;
    let provider = OpenAIProvider::from_config(&config).unwrap();

    let err = provider
        .chat("gpt-4o", &[Message::user("ping")], None)
        .await
        .unwrap_err();
    assert!(matches!(err, TroupeError::Api(_)));
    assert!(err.to_string().contains("authentication failed"));
}

#[tokio::test]
async fn test_transport_failure_becomes_a_failed_step() {
    let server = MockServer::start().await;

    // Planning succeeds, the step call fails
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"temperature": 0.3})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "[{\"step\": 1, \"agent\": \"Solo\", \"action\": \"Do it\", \"instructions\": \"now\"}]"}}]
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let client =
        ModelClient::from_config(http_config(ProviderKind::OpenAI, &server.uri())).unwrap();
    let solo = Agent::builder()
        .name("Solo")
        .build(client.clone())
        .unwrap();
    let collab = troupe::Collaboration::new(vec![solo], client).unwrap();

    let result = collab.execute("task").await.unwrap();
    assert_eq!(result.results.len(), 1);
    assert_eq!(result.results[0].status, troupe::StepStatus::Error);
    assert!(result.results[0].output.contains("500"));
    assert!(result.memory.is_empty());
}
