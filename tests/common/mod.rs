//! Shared test harness: a scripted provider on the far side of a duplex pipe

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use dagrelay::remote::{connect_stream, Connection, ProviderRequest, ProviderResponse, WireMessage};

/// What the fake provider does with one request
pub enum Reply {
    Content(String),
    Error(String),
    /// Never answer
    Silent,
    /// Answer without echoing the correlation id
    Legacy(String),
}

pub fn content(text: impl Into<String>) -> Reply {
    Reply::Content(text.into())
}

/// Every request the provider has seen, in arrival order
#[derive(Clone, Default)]
pub struct Recorded(Arc<Mutex<Vec<ProviderRequest>>>);

impl Recorded {
    pub fn all(&self) -> Vec<ProviderRequest> {
        self.0.lock().clone()
    }

    pub fn payloads(&self) -> Vec<String> {
        self.0.lock().iter().map(|r| r.payload.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }
}

/// Start a provider driven by `responder` and connect an invoker to it
pub fn fake_provider<F>(mut responder: F) -> (Connection, Recorded)
where
    F: FnMut(&ProviderRequest) -> Reply + Send + 'static,
{
    let (client, server) = tokio::io::duplex(64 * 1024);
    let (client_read, client_write) = tokio::io::split(client);
    let connection = connect_stream(client_read, client_write, Duration::from_secs(5));

    let recorded = Recorded::default();
    let log = recorded.clone();
    let (server_read, mut server_write) = tokio::io::split(server);

    tokio::spawn(async move {
        let mut lines = BufReader::new(server_read).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let Ok(WireMessage::Request(request)) = WireMessage::from_line(&line) else {
                continue;
            };
            log.0.lock().push(request.clone());

            let response = match responder(&request) {
                Reply::Content(text) => {
                    ProviderResponse::content(request.correlation_id, request.provider_id, text)
                }
                Reply::Error(message) => {
                    ProviderResponse::error(request.correlation_id, request.provider_id, message)
                }
                Reply::Legacy(text) => ProviderResponse {
                    correlation_id: None,
                    provider_id: request.provider_id,
                    content: Some(text),
                    error: None,
                },
                Reply::Silent => continue,
            };

            let line = WireMessage::Response(response).to_line().unwrap();
            if server_write.write_all(line.as_bytes()).await.is_err() {
                break;
            }
        }
    });

    (connection, recorded)
}

/// Provider that echoes payloads back
pub fn echo_provider() -> (Connection, Recorded) {
    fake_provider(|req| Reply::Content(req.payload.clone()))
}
