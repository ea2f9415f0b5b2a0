//! Stream transport - wires a byte stream to a `RemoteInvoker`
//!
//! Outbound messages go through a [`StreamChannel`]; a reader task parses
//! inbound lines and routes responses. On EOF or read failure the invoker
//! is closed, failing everything outstanding with `ChannelClosed`.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{RelayError, Result};

use super::channel::StreamChannel;
use super::invoker::RemoteInvoker;
use super::protocol::WireMessage;

/// A live duplex connection
pub struct Connection {
    invoker: Arc<RemoteInvoker>,
    reader: JoinHandle<()>,
}

impl Connection {
    /// Shared invoker; clone it into as many runners as needed
    pub fn invoker(&self) -> Arc<RemoteInvoker> {
        Arc::clone(&self.invoker)
    }

    /// Whether the reader task has stopped
    pub fn is_finished(&self) -> bool {
        self.reader.is_finished()
    }

    /// Stop reading and fail outstanding invocations
    pub fn shutdown(self) {
        self.reader.abort();
        self.invoker.close();
    }
}

/// Start a connection over any reader/writer pair
///
/// Must be called inside a tokio runtime.
pub fn connect_stream<R, W>(reader: R, writer: W, default_timeout: Duration) -> Connection
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let channel = Arc::new(StreamChannel::new(writer));
    let invoker = Arc::new(RemoteInvoker::new(channel).with_default_timeout(default_timeout));
    let reader = tokio::spawn(read_loop(reader, Arc::clone(&invoker)));
    Connection { invoker, reader }
}

/// Connect to a `host:port` duplex endpoint
pub async fn connect_tcp(address: &str, default_timeout: Duration) -> Result<Connection> {
    let stream = TcpStream::connect(address)
        .await
        .map_err(|e| RelayError::SendFailed {
            reason: format!("connect to {address}: {e}"),
        })?;
    info!(address, "connected to duplex endpoint");
    let (read_half, write_half) = stream.into_split();
    Ok(connect_stream(read_half, write_half, default_timeout))
}

async fn read_loop<R: AsyncRead + Unpin>(reader: R, invoker: Arc<RemoteInvoker>) {
    let mut lines = BufReader::new(reader).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match WireMessage::from_line(line) {
                    Ok(message) => {
                        invoker.handle_message(message);
                    }
                    Err(e) => warn!(error = %e, "dropping malformed message"),
                }
            }
            Ok(None) => {
                debug!("duplex channel reached EOF");
                break;
            }
            Err(e) => {
                warn!(error = %e, "duplex channel read failed");
                break;
            }
        }
    }

    invoker.close();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::protocol::ProviderResponse;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn routes_responses_from_stream() {
        let (client, server) = tokio::io::duplex(4096);
        let (client_read, client_write) = tokio::io::split(client);
        let conn = connect_stream(client_read, client_write, Duration::from_secs(5));

        let (server_read, mut server_write) = tokio::io::split(server);
        tokio::spawn(async move {
            let mut lines = BufReader::new(server_read).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let Ok(WireMessage::Request(req)) = WireMessage::from_line(&line) else {
                    continue;
                };
                // Noise first: blank and malformed lines are skipped
                server_write.write_all(b"\nnot json\n").await.unwrap();
                let reply = WireMessage::Response(ProviderResponse::content(
                    req.correlation_id,
                    req.provider_id,
                    req.payload.to_uppercase(),
                ));
                server_write
                    .write_all(reply.to_line().unwrap().as_bytes())
                    .await
                    .unwrap();
            }
        });

        let out = conn.invoker().invoke_default("p", "ping").await.unwrap();
        assert_eq!(out, "PING");
    }

    #[tokio::test]
    async fn eof_closes_invoker() {
        let (client, server) = tokio::io::duplex(1024);
        let (client_read, client_write) = tokio::io::split(client);
        let conn = connect_stream(client_read, client_write, Duration::from_secs(5));
        let invoker = conn.invoker();

        let call = {
            let invoker = Arc::clone(&invoker);
            tokio::spawn(async move { invoker.invoke_default("p", "x").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(server);

        assert!(matches!(call.await.unwrap(), Err(RelayError::ChannelClosed)));
        assert!(invoker.is_closed());
    }

    #[tokio::test]
    async fn connect_tcp_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = connect_tcp(&addr, Duration::from_secs(1)).await.err().unwrap();
        assert_eq!(err.code(), "RELAY-033");
    }
}
