//! The fallback HTTP+SSE transport.
//!
//! A GET opens the server's event stream; the first `endpoint` event names
//! the URL that requests are POSTed to, and responses come back over the
//! stream, paired to their requests by id through a background reader task.

use crate::mcp::error::McpTransportError;
use crate::mcp::protocol::{self, client_details};
use crate::mcp::transport::event_stream::{
    is_event_stream_content_type, sse_data_payload, sse_event_name, SseLineBuffer,
};
use crate::mcp::transport::streamable_http::apply_custom_headers;
use crate::mcp::transport::{McpTransport, McpTransportKind};
use async_trait::async_trait;
use futures_util::StreamExt;
use rust_mcp_schema::schema_utils::{
    ClientMessage, FromMessage, MessageFromClient, NotificationFromClient, RequestFromClient,
    ServerMessage,
};
use rust_mcp_schema::{InitializeResult, RequestId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;
use tracing::debug;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

type PendingResponses = Arc<Mutex<HashMap<i64, oneshot::Sender<ServerMessage>>>>;

pub struct SseTransport {
    client: reqwest::Client,
    endpoint: reqwest::Url,
    headers: Vec<(String, String)>,
    pending: PendingResponses,
    reader: tokio::task::JoinHandle<()>,
    request_id: AtomicI64,
}

impl SseTransport {
    pub(crate) async fn connect(
        client: reqwest::Client,
        url: reqwest::Url,
        headers: Vec<(String, String)>,
    ) -> Result<(Self, InitializeResult), McpTransportError> {
        let request = apply_custom_headers(
            client.get(url.clone()).header("Accept", "text/event-stream"),
            &headers,
        );
        let response = request
            .send()
            .await
            .map_err(|err| from_reqwest("SSE connect failed", err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(McpTransportError::from_http_status(
                Some(status.as_u16()),
                format!("MCP server returned HTTP {status}"),
            ));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("");
        if !is_event_stream_content_type(content_type) {
            return Err(McpTransportError::other(
                "SSE connect failed",
                &format!("unexpected content type: {content_type}"),
            ));
        }

        let mut stream = response.bytes_stream();
        let mut buffer = SseLineBuffer::default();
        let mut current_event = String::from("message");
        let mut endpoint = None;

        'endpoint: while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|err| McpTransportError::wrap("SSE connect failed", err))?;
            for line in buffer.push(&chunk) {
                if let Some(event) = sse_event_name(&line) {
                    current_event = event.to_string();
                    continue;
                }
                let Some(payload) = sse_data_payload(&line) else {
                    continue;
                };
                if current_event == "endpoint" && !payload.is_empty() {
                    endpoint = Some(url.join(payload).map_err(|_| {
                        McpTransportError::other(
                            "SSE connect failed",
                            &format!("invalid endpoint: {payload}"),
                        )
                    })?);
                    break 'endpoint;
                }
            }
        }

        let Some(endpoint) = endpoint else {
            return Err(McpTransportError::other(
                "SSE connect failed",
                "stream ended before the endpoint event",
            ));
        };
        debug!(url = %url, endpoint = %endpoint, "MCP SSE endpoint received");

        let pending: PendingResponses = Arc::new(Mutex::new(HashMap::new()));
        let reader_pending = pending.clone();
        let reader = tokio::spawn(async move {
            let mut current_event = String::from("message");
            while let Some(chunk) = stream.next().await {
                let Ok(chunk) = chunk else {
                    break;
                };
                for line in buffer.push(&chunk) {
                    if let Some(event) = sse_event_name(&line) {
                        current_event = event.to_string();
                        continue;
                    }
                    let Some(payload) = sse_data_payload(&line) else {
                        continue;
                    };
                    if payload.is_empty() || current_event != "message" {
                        continue;
                    }
                    let Ok(message) = serde_json::from_str::<ServerMessage>(payload) else {
                        continue;
                    };
                    let request_id = match &message {
                        ServerMessage::Response(response) => integer_request_id(&response.id),
                        ServerMessage::Error(error) => error.id.as_ref().and_then(integer_request_id),
                        _ => None,
                    };
                    if let Some(request_id) = request_id {
                        if let Some(sender) = lock(&reader_pending).remove(&request_id) {
                            let _ = sender.send(message);
                        }
                    }
                }
            }
            // Dropping the senders wakes any calls still waiting.
            lock(&reader_pending).clear();
        });

        let transport = Self {
            client,
            endpoint,
            headers,
            pending,
            reader,
            request_id: AtomicI64::new(0),
        };

        let initialize = match transport
            .request(RequestFromClient::InitializeRequest(client_details()))
            .await
            .and_then(protocol::parse_initialize_result)
        {
            Ok(initialize) => initialize,
            Err(err) => {
                transport.close().await;
                return Err(err);
            }
        };

        if let Err(err) = transport
            .notify(NotificationFromClient::InitializedNotification(None))
            .await
        {
            transport.close().await;
            return Err(err);
        }

        Ok((transport, initialize))
    }

    async fn request(
        &self,
        request: RequestFromClient,
    ) -> Result<ServerMessage, McpTransportError> {
        let request_id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let message = ClientMessage::from_message(
            MessageFromClient::RequestFromClient(request),
            Some(RequestId::Integer(request_id)),
        )
        .map_err(|err| McpTransportError::other("MCP request failed", &err.to_string()))?;

        let (sender, receiver) = oneshot::channel();
        lock(&self.pending).insert(request_id, sender);

        if let Err(err) = self.post(&message).await {
            lock(&self.pending).remove(&request_id);
            return Err(err);
        }

        receiver.await.map_err(|_| {
            McpTransportError::other(
                "MCP connection closed",
                "event stream ended before the response arrived",
            )
        })
    }

    async fn notify(&self, notification: NotificationFromClient) -> Result<(), McpTransportError> {
        let message =
            ClientMessage::from_message(MessageFromClient::NotificationFromClient(notification), None)
                .map_err(|err| McpTransportError::other("MCP request failed", &err.to_string()))?;
        self.post(&message).await
    }

    async fn post(&self, message: &ClientMessage) -> Result<(), McpTransportError> {
        let payload = serde_json::to_string(message)
            .map_err(|err| McpTransportError::wrap("MCP request failed", err))?;
        let request = apply_custom_headers(
            self.client
                .post(self.endpoint.clone())
                .header("Content-Type", "application/json"),
            &self.headers,
        )
        .body(payload);

        let response = request
            .send()
            .await
            .map_err(|err| from_reqwest("MCP request failed", err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(McpTransportError::from_http_status(
                Some(status.as_u16()),
                format!("MCP server returned HTTP {status}"),
            ));
        }
        Ok(())
    }
}

fn integer_request_id(id: &RequestId) -> Option<i64> {
    match id {
        RequestId::Integer(value) => Some(*value),
        _ => None,
    }
}

fn from_reqwest(context: &str, err: reqwest::Error) -> McpTransportError {
    if err.is_timeout() {
        McpTransportError::connect_timeout("MCP request timed out.")
    } else if let Some(status) = err.status() {
        McpTransportError::from_http_status(Some(status.as_u16()), err.to_string())
    } else {
        McpTransportError::wrap(context, err)
    }
}

#[async_trait]
impl McpTransport for SseTransport {
    fn kind(&self) -> McpTransportKind {
        McpTransportKind::Sse
    }

    async fn send_request(
        &self,
        request: RequestFromClient,
    ) -> Result<ServerMessage, McpTransportError> {
        self.request(request).await
    }

    async fn close(&self) {
        self.reader.abort();
        lock(&self.pending).clear();
    }
}
