use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::debug;
use url::Url;

use crate::error::ApiError;

pub const API_KEY_HEADER: &str = "X-API-Key";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AgentInfo {
    pub name: String,
    #[serde(default)]
    pub welcome_message: Option<String>,
    #[serde(default)]
    pub suggested_queries: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ChatContext {
    pub page_url: String,
    pub page_title: String,
    pub referrer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: String,
    pub context: ChatContext,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatReply {
    pub message: String,
}

/// `{ success, data?, error? }` wrapper used by every widget endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self { success: false, data: None, error: Some(error.into()) }
    }

    pub fn into_result(self) -> Result<T, ApiError> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            (true, None) => Err(ApiError::Decode("success without data".into())),
            (false, _) => Err(ApiError::Rejected(self.error.unwrap_or_else(|| "unknown error".into()))),
        }
    }
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn fetch_agent(&self) -> Result<AgentInfo, ApiError>;
    async fn send(&self, req: ChatRequest) -> Result<String, ApiError>;
}

#[derive(Clone)]
pub struct HttpChatBackend {
    base: Url,
    api_key: String,
    client: Client,
}

impl HttpChatBackend {
    /// `timeout` of `None` lets a request wait indefinitely.
    pub fn new(base: Url, api_key: impl Into<String>, timeout: Option<Duration>) -> Result<Self, ApiError> {
        let mut builder = Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        Ok(Self { base, api_key: api_key.into(), client: builder.build()? })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn agent_url(&self) -> String {
        format!("{}/agent", self.base.as_str().trim_end_matches('/'))
    }

    async fn read_envelope<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ApiError> {
        let status = resp.status();
        let text = resp.text().await?;
        match serde_json::from_str::<Envelope<T>>(&text) {
            Ok(env) if status.is_success() || !env.success => env.into_result(),
            Ok(_) => Err(ApiError::Status(status.as_u16())),
            Err(_) if !status.is_success() => Err(ApiError::Status(status.as_u16())),
            Err(e) => Err(ApiError::Decode(e.to_string())),
        }
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn fetch_agent(&self) -> Result<AgentInfo, ApiError> {
        let url = self.agent_url();
        debug!(%url, "fetching agent info");
        let resp = self
            .client
            .get(url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;
        Self::read_envelope(resp).await
    }

    async fn send(&self, req: ChatRequest) -> Result<String, ApiError> {
        debug!(url = %self.base, session = %req.session_id, "sending chat message");
        let resp = self
            .client
            .post(self.base.clone())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&req)
            .send()
            .await?;
        let reply: ChatReply = Self::read_envelope(resp).await?;
        Ok(reply.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub;

    async fn spawn_stub() -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, stub::router(stub::StubState::default())).await.unwrap();
        });
        Url::parse(&format!("http://{}{}", addr, crate::config::CHAT_PATH)).unwrap()
    }

    fn request(message: &str) -> ChatRequest {
        ChatRequest {
            message: message.into(),
            session_id: "sess_1_abcdefghi".into(),
            context: ChatContext { page_url: "https://example.com/".into(), ..Default::default() },
        }
    }

    #[test]
    fn envelope_decoding() {
        let ok: Envelope<ChatReply> = serde_json::from_str(r#"{"success":true,"data":{"message":"Hi there"}}"#).unwrap();
        assert_eq!(ok.into_result().unwrap().message, "Hi there");

        let rejected: Envelope<ChatReply> = serde_json::from_str(r#"{"success":false,"error":"quota exceeded"}"#).unwrap();
        assert!(matches!(rejected.into_result(), Err(ApiError::Rejected(e)) if e == "quota exceeded"));

        let empty: Envelope<ChatReply> = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert!(matches!(empty.into_result(), Err(ApiError::Decode(_))));
    }

    #[test]
    fn agent_info_tolerates_missing_optional_fields() {
        let info: AgentInfo = serde_json::from_str(r#"{"name":"Demo"}"#).unwrap();
        assert_eq!(info.name, "Demo");
        assert!(info.welcome_message.is_none());
        assert!(info.suggested_queries.is_empty());
    }

    #[tokio::test]
    async fn http_backend_round_trip_against_stub() {
        let base = spawn_stub().await;
        let backend = HttpChatBackend::new(base, "test-key", Some(Duration::from_secs(5))).unwrap();
        let agent = backend.fetch_agent().await.unwrap();
        assert_eq!(agent.name, stub::STUB_AGENT_NAME);
        assert!(!agent.suggested_queries.is_empty());
        let reply = backend.send(request("Hello")).await.unwrap();
        assert_eq!(reply, "You said: Hello");
    }

    #[tokio::test]
    async fn missing_key_is_rejected() {
        let base = spawn_stub().await;
        let backend = HttpChatBackend::new(base, "", None).unwrap();
        let err = backend.send(request("Hello")).await.unwrap_err();
        assert!(matches!(err, ApiError::Rejected(ref e) if e.contains("API key")), "got {err:?}");
    }

    #[tokio::test]
    async fn unknown_route_maps_to_status() {
        let base = spawn_stub().await;
        let wrong = base.join("/nowhere").unwrap();
        let backend = HttpChatBackend::new(wrong, "k", None).unwrap();
        let err = backend.send(request("Hello")).await.unwrap_err();
        assert!(matches!(err, ApiError::Status(404)), "got {err:?}");
    }

    #[tokio::test]
    async fn unreachable_backend_is_transport_error() {
        let base = Url::parse("http://127.0.0.1:9/api/widget/chat").unwrap();
        let backend = HttpChatBackend::new(base, "k", Some(Duration::from_secs(2))).unwrap();
        assert!(matches!(backend.fetch_agent().await, Err(ApiError::Transport(_))));
    }
}
