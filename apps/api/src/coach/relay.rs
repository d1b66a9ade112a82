//! Conversation relay: one coaching turn, one completion-service call.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::coach::prompts::build_system_prompt;
use crate::llm_client::{CompletionMessage, LlmClient, LlmError};
use crate::models::chat::{ChatContext, ChatResponse, ChatTurn, TokenUsage};

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("completion service credential is not configured")]
    NotConfigured,

    #[error("completion service returned status {status}")]
    Upstream { status: u16 },

    #[error("malformed completion response: {0}")]
    MalformedResponse(String),

    #[error("relay failure: {0}")]
    Internal(String),
}

impl RelayError {
    /// The fixed message shown to end users; never carries upstream detail.
    pub fn user_message(&self) -> &'static str {
        match self {
            RelayError::NotConfigured => "OpenAI API key not configured",
            RelayError::Upstream { .. } => "Failed to get response from AI",
            RelayError::MalformedResponse(_) => "Invalid response from AI",
            RelayError::Internal(_) => "Internal server error",
        }
    }
}

/// Anything that can answer a coaching turn. Used by `CoachSession`.
#[allow(dead_code)]
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(
        &self,
        history: &[ChatTurn],
        context: &ChatContext,
    ) -> Result<ChatResponse, RelayError>;
}

/// Relay to the completion service. Built once at startup; without a
/// credential it stays unconfigured and refuses every call up front.
#[derive(Clone)]
pub struct ChatRelay {
    llm: Option<LlmClient>,
}

impl ChatRelay {
    pub fn new(llm: Option<LlmClient>) -> Self {
        Self { llm }
    }

    pub fn is_configured(&self) -> bool {
        self.llm.is_some()
    }

    /// Prepends the system prompt to `history` and returns the first reply.
    pub async fn get_completion(
        &self,
        history: &[ChatTurn],
        context: &ChatContext,
    ) -> Result<ChatResponse, RelayError> {
        let llm = self.llm.as_ref().ok_or(RelayError::NotConfigured)?;

        let system_prompt = build_system_prompt(context);
        let messages: Vec<CompletionMessage<'_>> = std::iter::once(CompletionMessage {
            role: "system",
            content: &system_prompt,
        })
        .chain(history.iter().map(|turn| CompletionMessage {
            role: turn.role.as_str(),
            content: &turn.content,
        }))
        .collect();

        let response = llm.call(&messages).await.map_err(|e| match e {
            LlmError::Api { status, message } => {
                error!("Completion API error (status {status}): {message}");
                RelayError::Upstream { status }
            }
            other => {
                error!("Completion call failed: {other}");
                RelayError::Internal(other.to_string())
            }
        })?;

        if !response.has_choices() {
            error!("Completion API returned no choices: {}", response.raw);
            return Err(RelayError::MalformedResponse("no choices".to_string()));
        }

        let Some(message) = response.text() else {
            error!("Completion API returned no message content: {}", response.raw);
            return Err(RelayError::MalformedResponse(
                "no message content".to_string(),
            ));
        };

        let usage = response.usage.and_then(|u| {
            Some(TokenUsage {
                prompt_tokens: u.prompt_tokens?,
                completion_tokens: u.completion_tokens?,
                total_tokens: u.total_tokens?,
            })
        });
        if usage.is_none() {
            warn!("Completion API response carried no complete usage counts");
        }
        info!(turns = history.len(), "Coaching reply relayed");

        Ok(ChatResponse {
            message: message.to_string(),
            usage,
        })
    }
}

#[async_trait]
impl CompletionBackend for ChatRelay {
    async fn complete(
        &self,
        history: &[ChatTurn],
        context: &ChatContext,
    ) -> Result<ChatResponse, RelayError> {
        self.get_completion(history, context).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::chat::Role;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };

    /// A stand-in completion service that answers every request with a
    /// fixed status and body while recording what it received.
    pub(crate) struct FakeUpstream {
        pub url: String,
        pub hits: Arc<AtomicUsize>,
        pub last_request: Arc<Mutex<Option<Value>>>,
        pub last_auth: Arc<Mutex<Option<String>>>,
    }

    pub(crate) async fn spawn_upstream(status: StatusCode, body: Value) -> FakeUpstream {
        let hits = Arc::new(AtomicUsize::new(0));
        let last_request = Arc::new(Mutex::new(None));
        let last_auth = Arc::new(Mutex::new(None));

        let app = {
            let hits = hits.clone();
            let last_request = last_request.clone();
            let last_auth = last_auth.clone();
            Router::new().route(
                "/v1/chat/completions",
                post(move |headers: axum::http::HeaderMap, Json(req): Json<Value>| {
                    let hits = hits.clone();
                    let last_request = last_request.clone();
                    let last_auth = last_auth.clone();
                    let body = body.clone();
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        *last_request.lock().unwrap() = Some(req);
                        *last_auth.lock().unwrap() = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .map(String::from);
                        (status, Json(body))
                    }
                }),
            )
        };

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        FakeUpstream {
            url: format!("http://{addr}/v1/chat/completions"),
            hits,
            last_request,
            last_auth,
        }
    }

    pub(crate) fn relay_for(upstream: &FakeUpstream) -> ChatRelay {
        let llm = LlmClient::new("sk-test".to_string(), upstream.url.clone()).unwrap();
        ChatRelay::new(Some(llm))
    }

    pub(crate) fn sample_context() -> ChatContext {
        ChatContext {
            job_description: "Backend Engineer".to_string(),
            resume: "5 years Go".to_string(),
            cover_letter: "I am excited...".to_string(),
        }
    }

    pub(crate) fn success_body() -> Value {
        json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1700000000,
            "model": "gpt-3.5-turbo",
            "choices": [{
                "index": 0,
                "finish_reason": "stop",
                "message": {"role": "assistant", "content": "Quantify your Go impact."}
            }],
            "usage": {"prompt_tokens": 120, "completion_tokens": 30, "total_tokens": 150}
        })
    }

    fn user_turn(content: &str) -> ChatTurn {
        ChatTurn {
            role: Role::User,
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn test_unconfigured_relay_fails_without_network() {
        let upstream = spawn_upstream(StatusCode::OK, success_body()).await;
        let relay = ChatRelay::new(None);

        let err = relay
            .get_completion(&[user_turn("hi")], &sample_context())
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::NotConfigured));
        assert!(!relay.is_configured());
        assert_eq!(upstream.hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_successful_round_trip() {
        let upstream = spawn_upstream(StatusCode::OK, success_body()).await;
        let relay = relay_for(&upstream);

        let resp = relay
            .get_completion(&[user_turn("How can I improve my resume?")], &sample_context())
            .await
            .unwrap();

        assert_eq!(resp.message, "Quantify your Go impact.");
        let usage = resp.usage.unwrap();
        assert_eq!(usage.total_tokens, usage.prompt_tokens + usage.completion_tokens);
        assert_eq!(upstream.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_request_prepends_system_prompt_and_keeps_order() {
        let upstream = spawn_upstream(StatusCode::OK, success_body()).await;
        let relay = relay_for(&upstream);
        let history = vec![
            ChatTurn {
                role: Role::Assistant,
                content: "Greeting".to_string(),
            },
            user_turn("First question"),
            ChatTurn {
                role: Role::Assistant,
                content: "First answer".to_string(),
            },
            user_turn("Second question"),
        ];

        relay.get_completion(&history, &sample_context()).await.unwrap();

        let sent = upstream.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(sent["model"], "gpt-3.5-turbo");
        assert_eq!(sent["max_tokens"], 2000);
        let messages = sent["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(
            messages[0]["content"],
            build_system_prompt(&sample_context()).as_str()
        );
        let contents: Vec<&str> = messages[1..]
            .iter()
            .map(|m| m["content"].as_str().unwrap())
            .collect();
        assert_eq!(
            contents,
            vec!["Greeting", "First question", "First answer", "Second question"]
        );
        assert_eq!(
            upstream.last_auth.lock().unwrap().as_deref(),
            Some("Bearer sk-test")
        );
    }

    #[tokio::test]
    async fn test_rate_limit_status_is_preserved() {
        let upstream = spawn_upstream(
            StatusCode::TOO_MANY_REQUESTS,
            json!({"error": {"message": "Rate limit reached", "type": "requests"}}),
        )
        .await;
        let relay = relay_for(&upstream);

        let err = relay
            .get_completion(&[user_turn("hi")], &sample_context())
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::Upstream { status: 429 }));
        assert_eq!(upstream.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_choices_is_malformed() {
        let upstream =
            spawn_upstream(StatusCode::OK, json!({"choices": [], "usage": null})).await;
        let relay = relay_for(&upstream);

        let err = relay
            .get_completion(&[user_turn("hi")], &sample_context())
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_missing_content_is_malformed() {
        let upstream = spawn_upstream(
            StatusCode::OK,
            json!({"choices": [{"index": 0, "message": {"role": "assistant"}}]}),
        )
        .await;
        let relay = relay_for(&upstream);

        let err = relay
            .get_completion(&[user_turn("hi")], &sample_context())
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_missing_usage_is_allowed() {
        let upstream = spawn_upstream(
            StatusCode::OK,
            json!({"choices": [{"message": {"content": "Reply"}}]}),
        )
        .await;
        let relay = relay_for(&upstream);

        let resp = relay
            .get_completion(&[user_turn("hi")], &sample_context())
            .await
            .unwrap();

        assert_eq!(resp.message, "Reply");
        assert!(resp.usage.is_none());
    }

    #[tokio::test]
    async fn test_partial_usage_keeps_reply() {
        let upstream = spawn_upstream(
            StatusCode::OK,
            json!({
                "choices": [{"message": {"content": "Reply"}}],
                "usage": {"prompt_tokens": 10, "completion_tokens": 5}
            }),
        )
        .await;
        let relay = relay_for(&upstream);

        let resp = relay
            .get_completion(&[user_turn("hi")], &sample_context())
            .await
            .unwrap();

        assert_eq!(resp.message, "Reply");
        assert!(resp.usage.is_none());
    }

    #[tokio::test]
    async fn test_client_keeps_raw_body_for_diagnostics() {
        let upstream = spawn_upstream(
            StatusCode::OK,
            json!({"choices": [], "system_fingerprint": "fp_44709d6fcb"}),
        )
        .await;
        let llm = LlmClient::new("sk-test".to_string(), upstream.url.clone()).unwrap();

        let response = llm
            .call(&[CompletionMessage {
                role: "user",
                content: "hi",
            }])
            .await
            .unwrap();

        assert!(!response.has_choices());
        assert!(response.raw.contains("fp_44709d6fcb"));
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_internal() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let llm = LlmClient::new(
            "sk-test".to_string(),
            format!("http://{addr}/v1/chat/completions"),
        )
        .unwrap();
        let relay = ChatRelay::new(Some(llm));

        let err = relay
            .get_completion(&[user_turn("hi")], &sample_context())
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::Internal(_)));
    }

    #[test]
    fn test_user_messages_are_fixed() {
        assert_eq!(
            RelayError::NotConfigured.user_message(),
            "OpenAI API key not configured"
        );
        assert_eq!(
            RelayError::Upstream { status: 503 }.user_message(),
            "Failed to get response from AI"
        );
        assert_eq!(
            RelayError::MalformedResponse("x".into()).user_message(),
            "Invalid response from AI"
        );
        assert_eq!(
            RelayError::Internal("boom".into()).user_message(),
            "Internal server error"
        );
    }
}
