// src/apps/http.rs
// The `http` app adapter (spec §3 `type ∈ {in-process, mcp, http}`): forwards
// an `AppMessage` as a JSON POST to the app's configured endpoint. The wire
// protocol on the *inbound* edge (spec §1) is out of scope; this is purely
// the outbound half the loop's `respond`/tool-result traffic needs to leave
// the process for an externally hosted app.

use async_trait::async_trait;
use tracing::warn;

use crate::error::{Result, SynapseError};

use super::{App, AppMessage};

pub struct HttpApp {
    app_id: String,
    endpoint: String,
    client: reqwest::Client,
}

impl HttpApp {
    pub fn new(app_id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self { app_id: app_id.into(), endpoint: endpoint.into(), client: reqwest::Client::new() }
    }
}

#[async_trait]
impl App for HttpApp {
    fn app_id(&self) -> &str {
        &self.app_id
    }

    async fn receive_message(&self, msg: AppMessage) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&msg.content)
            .send()
            .await
            .map_err(|e| SynapseError::Transient(e.to_string()))?;

        if let Err(e) = response.error_for_status_ref() {
            warn!("[http-app] {} returned an error status: {}", self.app_id, e);
            return Err(SynapseError::Transient(e.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    async fn respond_once(listener: TcpListener, status_line: &'static str) {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 1024];
        let _ = socket.read(&mut buf).await.unwrap();
        socket.write_all(format!("{status_line}\r\nContent-Length: 0\r\n\r\n").as_bytes()).await.unwrap();
    }

    #[tokio::test]
    async fn posts_message_content_to_the_configured_endpoint() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(respond_once(listener, "HTTP/1.1 200 OK"));

        let app = HttpApp::new("webhook-app", format!("http://{addr}/hook"));
        let msg = AppMessage { from: "loop".into(), to: "webhook-app".into(), content: json!({"hello": "world"}) };

        app.receive_message(msg).await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn server_error_status_surfaces_as_a_transient_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(respond_once(listener, "HTTP/1.1 503 Service Unavailable"));

        let app = HttpApp::new("webhook-app", format!("http://{addr}/hook"));
        let msg = AppMessage { from: "loop".into(), to: "webhook-app".into(), content: json!({}) };

        let err = app.receive_message(msg).await.unwrap_err();
        assert!(matches!(err, SynapseError::Transient(_)));
        server.await.unwrap();
    }
}
