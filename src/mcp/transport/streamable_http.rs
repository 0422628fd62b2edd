//! The streamable HTTP transport: JSON-RPC over POST, with responses
//! returned either directly as JSON or as a single-response event stream.

use crate::mcp::error::McpTransportError;
use crate::mcp::protocol::{self, client_details};
use crate::mcp::transport::event_stream::{is_event_stream_content_type, next_sse_server_message};
use crate::mcp::transport::{ConnectFailure, McpTransport, McpTransportKind};
use async_trait::async_trait;
use rust_mcp_schema::schema_utils::{
    ClientMessage, FromMessage, MessageFromClient, NotificationFromClient, RequestFromClient,
    ServerMessage,
};
use rust_mcp_schema::{InitializeResult, RequestId};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

pub(crate) const MCP_JSON_CONTENT_TYPE: &str = "application/json";
pub(crate) const MCP_JSON_AND_SSE_ACCEPT: &str = "application/json, text/event-stream";
pub(crate) const MCP_PROTOCOL_VERSION_HEADER: &str = "MCP-Protocol-Version";
pub(crate) const MCP_SESSION_ID_HEADER: &str = "mcp-session-id";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub(crate) fn apply_client_post_headers(request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    request
        .header("Content-Type", MCP_JSON_CONTENT_TYPE)
        .header("Accept", MCP_JSON_AND_SSE_ACCEPT)
}

pub(crate) fn apply_custom_headers(
    mut request: reqwest::RequestBuilder,
    headers: &[(String, String)],
) -> reqwest::RequestBuilder {
    for (key, value) in headers {
        request = request.header(key, value);
    }
    request
}

pub struct StreamableHttpTransport {
    client: reqwest::Client,
    url: reqwest::Url,
    headers: Vec<(String, String)>,
    session_id: Mutex<Option<String>>,
    negotiated_protocol_version: Mutex<Option<String>>,
    request_id: AtomicI64,
}

impl StreamableHttpTransport {
    /// Run the initialize handshake over streamable HTTP. Failures are left
    /// unnormalized so the connector can judge fallback eligibility.
    pub(crate) async fn connect(
        client: reqwest::Client,
        url: reqwest::Url,
        headers: Vec<(String, String)>,
    ) -> Result<(Self, InitializeResult), ConnectFailure> {
        let transport = Self {
            client,
            url,
            headers,
            session_id: Mutex::new(None),
            negotiated_protocol_version: Mutex::new(None),
            request_id: AtomicI64::new(0),
        };

        let request = RequestFromClient::InitializeRequest(client_details());
        let message = transport.post_request(request).await?;

        let initialize = match message {
            ServerMessage::Error(error) => {
                return Err(ConnectFailure::Rpc(McpTransportError::from_rpc_error(
                    &error.error,
                )));
            }
            message => protocol::parse_initialize_result(message)
                .map_err(|err| ConnectFailure::Transport(err.to_string()))?,
        };

        *lock(&transport.negotiated_protocol_version) =
            Some(initialize.protocol_version.clone());

        transport
            .post_notification(NotificationFromClient::InitializedNotification(None))
            .await?;

        debug!(url = %transport.url, "MCP streamable HTTP session established");
        Ok((transport, initialize))
    }

    async fn post_request(
        &self,
        request: RequestFromClient,
    ) -> Result<ServerMessage, ConnectFailure> {
        let request_id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let message = ClientMessage::from_message(
            MessageFromClient::RequestFromClient(request),
            Some(RequestId::Integer(request_id)),
        )
        .map_err(|err| ConnectFailure::Transport(err.to_string()))?;

        let response = self.send_payload(&message).await?;
        let session_id = header_value(&response, MCP_SESSION_ID_HEADER);
        let content_type = header_value(&response, "content-type").unwrap_or_default();

        let server_message = if is_event_stream_content_type(&content_type) {
            next_sse_server_message(response)
                .await
                .map_err(|err| ConnectFailure::Transport(err.to_string()))?
        } else if content_type
            .split(';')
            .next()
            .map(str::trim)
            .is_some_and(|value| value.eq_ignore_ascii_case(MCP_JSON_CONTENT_TYPE))
        {
            let body = response
                .bytes()
                .await
                .map_err(|err| ConnectFailure::Transport(err.to_string()))?;
            serde_json::from_slice::<ServerMessage>(&body)
                .map_err(|err| ConnectFailure::Transport(err.to_string()))?
        } else {
            return Err(ConnectFailure::Http {
                status: None,
                message: format!("Unexpected MCP response content type: {content_type}"),
            });
        };

        if let Some(session_id) = session_id {
            *lock(&self.session_id) = Some(session_id);
        }
        Ok(server_message)
    }

    async fn post_notification(
        &self,
        notification: NotificationFromClient,
    ) -> Result<(), ConnectFailure> {
        let message =
            ClientMessage::from_message(MessageFromClient::NotificationFromClient(notification), None)
                .map_err(|err| ConnectFailure::Transport(err.to_string()))?;
        let response = self.send_payload(&message).await?;
        if let Some(session_id) = header_value(&response, MCP_SESSION_ID_HEADER) {
            *lock(&self.session_id) = Some(session_id);
        }
        Ok(())
    }

    async fn send_payload(
        &self,
        message: &ClientMessage,
    ) -> Result<reqwest::Response, ConnectFailure> {
        let payload = serde_json::to_string(message)
            .map_err(|err| ConnectFailure::Transport(err.to_string()))?;

        let protocol_version = protocol::effective_protocol_version(
            lock(&self.negotiated_protocol_version).as_deref(),
        );
        let mut request = apply_custom_headers(
            apply_client_post_headers(self.client.post(self.url.clone())),
            &self.headers,
        )
        .header(MCP_PROTOCOL_VERSION_HEADER, protocol_version)
        .body(payload);

        if let Some(session_id) = lock(&self.session_id).clone() {
            request = request.header(MCP_SESSION_ID_HEADER, session_id);
        }

        debug!(url = %self.url, "Sending MCP HTTP request");
        let response = request.send().await.map_err(classify_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConnectFailure::Http {
                status: Some(status.as_u16()),
                message: format!("MCP server returned HTTP {status}"),
            });
        }
        Ok(response)
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> ConnectFailure {
    if err.is_timeout() {
        ConnectFailure::Timeout
    } else if let Some(status) = err.status() {
        ConnectFailure::Http {
            status: Some(status.as_u16()),
            message: err.to_string(),
        }
    } else {
        ConnectFailure::Transport(err.to_string())
    }
}

fn header_value(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

#[async_trait]
impl McpTransport for StreamableHttpTransport {
    fn kind(&self) -> McpTransportKind {
        McpTransportKind::StreamableHttp
    }

    async fn send_request(
        &self,
        request: RequestFromClient,
    ) -> Result<ServerMessage, McpTransportError> {
        self.post_request(request)
            .await
            .map_err(ConnectFailure::into_error)
    }

    async fn close(&self) {
        let Some(session_id) = lock(&self.session_id).clone() else {
            return;
        };

        let request = apply_custom_headers(self.client.delete(self.url.clone()), &self.headers)
            .header(MCP_SESSION_ID_HEADER, session_id);
        if let Err(err) = request.send().await {
            debug!(url = %self.url, error = %err, "MCP session delete failed");
        }
    }
}
