use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument, warn};

use crate::agent::{Agent, AgentReply, AgentRequest};
use crate::error::AgentError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Agent reached over HTTP: `POST <base_url>/run` with an [`AgentRequest`]
/// body, answered by an [`AgentReply`].
pub struct HttpAgent {
    client: Client,
    run_url: String,
    timeout: Duration,
}

impl HttpAgent {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AgentError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .timeout(timeout)
            .build()
            .map_err(|e| AgentError::Transport(format!("build HTTP client: {e}")))?;
        Ok(Self {
            client,
            run_url: format!("{}/run", base_url.trim_end_matches('/')),
            timeout,
        })
    }

    pub fn run_url(&self) -> &str {
        &self.run_url
    }

    fn map_send_error(&self, e: reqwest::Error) -> AgentError {
        if e.is_timeout() {
            AgentError::Timeout(self.timeout.as_secs())
        } else {
            AgentError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl Agent for HttpAgent {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip_all, fields(session_id = %request.session_id, user_id = %request.user_id))]
    async fn run(&self, request: &AgentRequest) -> Result<AgentReply, AgentError> {
        let resp = self
            .client
            .post(&self.run_url)
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "agent call failed");
            return Err(AgentError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.bytes().await.map_err(|e| self.map_send_error(e))?;
        let reply: AgentReply =
            serde_json::from_slice(&body).map_err(|e| AgentError::Decode(e.to_string()))?;
        reply.display_text()?;
        debug!(has_parts = reply.parts.is_some(), "agent replied");
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn request() -> AgentRequest {
        AgentRequest {
            app_name: "test_adk_app".into(),
            user_id: "1234".into(),
            session_id: "987".into(),
            content: "Weather in Oslo?".into(),
        }
    }

    #[tokio::test]
    async fn posts_request_and_decodes_reply() {
        let router = Router::new().route(
            "/run",
            post(|Json(body): Json<Value>| async move {
                Json(json!({
                    "text": format!("{} for {}", body["content"].as_str().unwrap_or(""), body["user_id"].as_str().unwrap_or("")),
                    "parts": [{"type": "text", "text": "ok"}]
                }))
            }),
        );
        let base = serve(router).await;
        let agent = HttpAgent::new(&format!("{base}/"), Duration::from_secs(5)).unwrap();
        assert_eq!(agent.run_url(), format!("{base}/run"));

        let reply = agent.run(&request()).await.unwrap();
        assert_eq!(reply.text.as_deref(), Some("Weather in Oslo? for 1234"));
        assert!(reply.parts.is_some());
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let router = Router::new().route(
            "/run",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "tool crashed") }),
        );
        let agent = HttpAgent::new(&serve(router).await, Duration::from_secs(5)).unwrap();
        match agent.run(&request()).await {
            Err(AgentError::Status { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "tool crashed");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn undecodable_body_is_decode_error() {
        let router = Router::new().route("/run", post(|| async { "not json" }));
        let agent = HttpAgent::new(&serve(router).await, Duration::from_secs(5)).unwrap();
        assert!(matches!(agent.run(&request()).await, Err(AgentError::Decode(_))));
    }

    #[tokio::test]
    async fn reply_without_content_is_empty() {
        let router = Router::new().route("/run", post(|| async { Json(json!({})) }));
        let agent = HttpAgent::new(&serve(router).await, Duration::from_secs(5)).unwrap();
        assert!(matches!(agent.run(&request()).await, Err(AgentError::EmptyReply)));
    }

    #[tokio::test]
    async fn slow_agent_times_out() {
        let router = Router::new().route(
            "/run",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({"text": "late"}))
            }),
        );
        let agent = HttpAgent::new(&serve(router).await, Duration::from_millis(200)).unwrap();
        assert!(matches!(agent.run(&request()).await, Err(AgentError::Timeout(_))));
    }

    #[tokio::test]
    async fn unreachable_agent_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let agent = HttpAgent::new(&format!("http://{addr}"), Duration::from_secs(5)).unwrap();
        assert!(matches!(agent.run(&request()).await, Err(AgentError::Transport(_))));
    }
}
