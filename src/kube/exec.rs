//! Exec stream transport over the Kubernetes WebSocket subprotocol.
//!
//! The exec subresource multiplexes the remote process streams over a single
//! WebSocket connection using the `v4.channel.k8s.io` framing: every binary
//! frame starts with a channel byte (1 = stdout, 2 = stderr, 3 = status) and
//! the status channel carries a JSON `Status` object once the process exits.

use futures_util::StreamExt;
use serde::Deserialize;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::{AUTHORIZATION, SEC_WEBSOCKET_PROTOCOL};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{Connector, connect_async_tls_with_config};

use super::error::KubeError;

const STREAM_PROTOCOL: &str = "v4.channel.k8s.io";

const STDOUT_CHANNEL: u8 = 1;
const STDERR_CHANNEL: u8 = 2;
const STATUS_CHANNEL: u8 = 3;

/// Terminal status reported on the exec error channel.
#[derive(Debug, Deserialize)]
struct StreamStatus {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

/// Byte sinks for the demultiplexed exec channels.
#[derive(Debug, Default)]
pub(super) struct StreamSinks {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    status: Vec<u8>,
}

impl StreamSinks {
    /// Routes one framed payload into the sink selected by its channel byte.
    ///
    /// Frames on unknown channels (resize, stdin echo) are dropped.
    pub(super) fn absorb(&mut self, frame: &[u8]) {
        if let Some((channel, payload)) = frame.split_first() {
            match *channel {
                STDOUT_CHANNEL => self.stdout.extend_from_slice(payload),
                STDERR_CHANNEL => self.stderr.extend_from_slice(payload),
                STATUS_CHANNEL => self.status.extend_from_slice(payload),
                _ => {}
            }
        }
    }

    /// Applies the completion rules once the stream has closed cleanly.
    ///
    /// A `Failure` status frame is a transport-level failure, mirroring how
    /// the control plane reports non-zero exit codes. After that, any stderr
    /// output fails the call even though the stream itself succeeded: the
    /// wrapped backup tool reports progress and errors there alike.
    pub(super) fn finish(self) -> Result<String, KubeError> {
        if !self.status.is_empty() {
            let status: StreamStatus =
                serde_json::from_slice(&self.status).map_err(|err| KubeError::Transport {
                    message: format!("malformed exec status frame: {err}"),
                })?;
            if status.status != "Success" {
                let detail = status
                    .message
                    .or(status.reason)
                    .unwrap_or_else(|| String::from("no detail provided"));
                return Err(KubeError::Transport {
                    message: format!("remote command did not complete: {detail}"),
                });
            }
        }

        if !self.stderr.is_empty() {
            return Err(KubeError::RemoteCommand {
                stderr: String::from_utf8_lossy(&self.stderr).into_owned(),
            });
        }

        Ok(String::from_utf8_lossy(&self.stdout).into_owned())
    }
}

/// Opens the exec WebSocket and drains it until the remote command finishes.
///
/// Blocks the calling task for the lifetime of the remote process; there is
/// no deadline at this layer.
pub(super) async fn stream_exec(
    ws_url: &str,
    bearer_token: &str,
    insecure: bool,
) -> Result<String, KubeError> {
    let mut request = ws_url.into_client_request()?;
    let auth_value = HeaderValue::from_str(&format!("Bearer {bearer_token}")).map_err(|err| {
        KubeError::Client {
            message: format!("bearer token is not a valid header value: {err}"),
        }
    })?;
    request.headers_mut().insert(AUTHORIZATION, auth_value);
    request.headers_mut().insert(
        SEC_WEBSOCKET_PROTOCOL,
        HeaderValue::from_static(STREAM_PROTOCOL),
    );

    let tls = native_tls::TlsConnector::builder()
        .danger_accept_invalid_certs(insecure)
        .build()
        .map_err(|err| KubeError::Client {
            message: format!("failed to build TLS connector: {err}"),
        })?;

    let (mut stream, _response) =
        connect_async_tls_with_config(request, None, false, Some(Connector::NativeTls(tls)))
            .await?;

    let mut sinks = StreamSinks::default();
    while let Some(frame) = stream.next().await {
        match frame? {
            Message::Binary(data) => sinks.absorb(&data),
            Message::Close(_) => break,
            // Pings are answered by the stream itself; text frames do not
            // occur under the binary subprotocol.
            _ => {}
        }
    }

    sinks.finish()
}
