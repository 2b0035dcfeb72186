//! Local stand-in for the widget chat backend. Speaks the same wire
//! protocol as production so the widget can be exercised offline.

use axum::{Json, Router, extract::State, http::{HeaderMap, StatusCode}, routing::{get, post}};
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::RwLock;
use tracing::info;

use crate::api::{API_KEY_HEADER, AgentInfo, ChatReply, ChatRequest, Envelope};
use crate::config::CHAT_PATH;

pub const STUB_AGENT_NAME: &str = "SmartPromptIQ Assistant";

#[derive(Clone)]
pub struct StubState {
    pub agent: AgentInfo,
    pub received: Arc<RwLock<Vec<ChatRequest>>>,
}

impl Default for StubState {
    fn default() -> Self {
        Self {
            agent: AgentInfo {
                name: STUB_AGENT_NAME.into(),
                welcome_message: Some("Welcome! Ask me anything about writing prompts.".into()),
                suggested_queries: vec![
                    "How do I write a better prompt?".into(),
                    "Show me a marketing template".into(),
                    "What is the Academy?".into(),
                ],
            },
            received: Arc::default(),
        }
    }
}

fn require_key(headers: &HeaderMap) -> Result<(), (StatusCode, Json<Envelope<()>>)> {
    let present = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| !v.trim().is_empty());
    if present {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, Json(Envelope::err("Missing API key"))))
    }
}

async fn agent(
    State(state): State<StubState>,
    headers: HeaderMap,
) -> Result<Json<Envelope<AgentInfo>>, (StatusCode, Json<Envelope<()>>)> {
    require_key(&headers)?;
    Ok(Json(Envelope::ok(state.agent.clone())))
}

async fn chat(
    State(state): State<StubState>,
    headers: HeaderMap,
    Json(req): Json<ChatRequest>,
) -> Result<Json<Envelope<ChatReply>>, (StatusCode, Json<Envelope<()>>)> {
    require_key(&headers)?;
    if req.message.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, Json(Envelope::err("Message is required"))));
    }
    let message = format!("You said: {}", req.message);
    state.received.write().await.push(req);
    Ok(Json(Envelope::ok(ChatReply { message })))
}

pub fn router(state: StubState) -> Router {
    Router::new()
        .route(&format!("{CHAT_PATH}/agent"), get(agent))
        .route(CHAT_PATH, post(chat))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: StubState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, path = CHAT_PATH, "stub chat backend listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ChatBackend, ChatContext, HttpChatBackend};
    use url::Url;

    #[tokio::test]
    async fn records_received_requests() {
        let state = StubState::default();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let served = state.clone();
        tokio::spawn(async move {
            axum::serve(listener, router(served)).await.unwrap();
        });

        let base = Url::parse(&format!("http://{addr}{CHAT_PATH}")).unwrap();
        let backend = HttpChatBackend::new(base, "k", None).unwrap();
        let req = ChatRequest {
            message: "ping".into(),
            session_id: "sess_1_aaaaaaaaa".into(),
            context: ChatContext { page_url: "https://example.com/pricing".into(), page_title: "Pricing".into(), referrer: String::new() },
        };
        backend.send(req.clone()).await.unwrap();
        assert!(matches!(
            backend.send(ChatRequest { message: "  ".into(), ..req.clone() }).await,
            Err(crate::error::ApiError::Rejected(_))
        ));

        let received = state.received.read().await;
        assert_eq!(received.as_slice(), &[req]);
    }
}
