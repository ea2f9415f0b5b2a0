//! RemoteInvoker - correlated request/response with timeout
//!
//! Each `invoke` registers a one-shot listener keyed by a fresh correlation
//! id *before* the request is sent, so a fast response can never arrive
//! ahead of its listener. The listener is removed on first match, giving at
//! most one resolution per invocation. A drop guard removes it on every
//! other exit path (timeout, send failure, caller dropping the future).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::oneshot;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::error::{RelayError, Result};

use super::channel::Channel;
use super::protocol::{ProviderRequest, ProviderResponse, WireMessage};

/// Reference default when no timeout is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(120_000);

struct Pending {
    provider_id: String,
    started: Instant,
    tx: oneshot::Sender<ProviderResponse>,
}

pub struct RemoteInvoker {
    channel: Arc<dyn Channel>,
    /// correlation id → listener
    pending: Mutex<FxHashMap<String, Pending>>,
    closed: AtomicBool,
    default_timeout: Duration,
}

impl RemoteInvoker {
    pub fn new(channel: Arc<dyn Channel>) -> Self {
        Self {
            channel,
            pending: Mutex::new(FxHashMap::default()),
            closed: AtomicBool::new(false),
            default_timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Send `payload` to a provider and wait for its response content
    ///
    /// Errors: `Timeout`, `ChannelClosed`, `SendFailed`, `ProviderError`
    /// (provider answered with `error`), `InvocationCancelled`.
    #[instrument(skip(self, payload), fields(payload_len = payload.len()))]
    pub async fn invoke(&self, provider_id: &str, payload: &str, timeout: Duration) -> Result<String> {
        let correlation_id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();

        {
            let mut pending = self.pending.lock();
            // Checked under the lock: `close` drains after setting the flag
            if self.closed.load(Ordering::SeqCst) {
                return Err(RelayError::ChannelClosed);
            }
            pending.insert(
                correlation_id.clone(),
                Pending {
                    provider_id: provider_id.to_string(),
                    started: Instant::now(),
                    tx,
                },
            );
        }
        let _guard = PendingGuard {
            invoker: self,
            correlation_id: correlation_id.clone(),
        };

        let request = WireMessage::Request(ProviderRequest {
            correlation_id: correlation_id.clone(),
            provider_id: provider_id.to_string(),
            payload: payload.to_string(),
        });

        // The deadline covers the write too: a peer that stops reading must
        // not stall the caller
        let exchange = async {
            self.channel.send(&request).await?;
            debug!(%correlation_id, "request sent");
            match rx.await {
                Ok(response) => response.into_result(),
                Err(_) if self.is_closed() => Err(RelayError::ChannelClosed),
                Err(_) => Err(RelayError::InvocationCancelled {
                    correlation_id: correlation_id.clone(),
                }),
            }
        };

        match tokio::time::timeout(timeout, exchange).await {
            Ok(result) => result,
            Err(_) => {
                warn!(%correlation_id, timeout_ms = timeout.as_millis() as u64, "provider timed out");
                Err(RelayError::Timeout {
                    provider_id: provider_id.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Invoke with the invoker's default timeout
    pub async fn invoke_default(&self, provider_id: &str, payload: &str) -> Result<String> {
        self.invoke(provider_id, payload, self.default_timeout).await
    }

    /// Route an inbound message; requests from the peer are ignored
    pub fn handle_message(&self, message: WireMessage) -> bool {
        match message {
            WireMessage::Response(response) => self.handle_response(response),
            WireMessage::Request(request) => {
                warn!(correlation_id = %request.correlation_id, "ignoring inbound request");
                false
            }
        }
    }

    /// Resolve the listener a response belongs to
    ///
    /// Matching: by `correlationId`; a response without one matches by
    /// `providerId` only when exactly one invocation to that provider is
    /// outstanding. Returns false for unknown, late, duplicate or ambiguous
    /// responses.
    pub fn handle_response(&self, response: ProviderResponse) -> bool {
        let entry = {
            let mut pending = self.pending.lock();
            let key = match &response.correlation_id {
                Some(id) => Some(id.clone()),
                None => {
                    let mut candidates = pending
                        .iter()
                        .filter(|(_, p)| p.provider_id == response.provider_id)
                        .map(|(id, _)| id);
                    match (candidates.next(), candidates.next()) {
                        (Some(id), None) => Some(id.clone()),
                        (Some(_), Some(_)) => {
                            warn!(provider_id = %response.provider_id, "ambiguous legacy response dropped");
                            None
                        }
                        (None, _) => None,
                    }
                }
            };
            key.and_then(|id| pending.remove(&id).map(|p| (id, p)))
        };

        let Some((correlation_id, pending)) = entry else {
            debug!(
                correlation_id = ?response.correlation_id,
                provider_id = %response.provider_id,
                "no listener for response"
            );
            return false;
        };

        debug!(
            %correlation_id,
            elapsed_ms = pending.started.elapsed().as_millis() as u64,
            "response matched"
        );
        // Receiver may already be gone if the caller gave up
        pending.tx.send(response).is_ok()
    }

    /// Abandon one outstanding invocation; its caller gets `InvocationCancelled`
    pub fn cancel(&self, correlation_id: &str) -> bool {
        self.pending.lock().remove(correlation_id).is_some()
    }

    /// Abandon every outstanding invocation to a provider
    pub fn cancel_provider(&self, provider_id: &str) -> usize {
        let mut pending = self.pending.lock();
        let before = pending.len();
        pending.retain(|_, p| p.provider_id != provider_id);
        before - pending.len()
    }

    /// Mark the channel closed and fail everything outstanding
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let drained = {
            let mut pending = self.pending.lock();
            let n = pending.len();
            pending.clear();
            n
        };
        if drained > 0 {
            warn!(outstanding = drained, "channel closed with invocations outstanding");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Correlation ids currently awaiting a response
    pub fn pending_ids(&self) -> Vec<String> {
        self.pending.lock().keys().cloned().collect()
    }
}

impl std::fmt::Debug for RemoteInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteInvoker")
            .field("pending", &self.pending_count())
            .field("closed", &self.is_closed())
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}

/// Deregisters a listener on every exit path
struct PendingGuard<'a> {
    invoker: &'a RemoteInvoker,
    correlation_id: String,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.invoker.pending.lock().remove(&self.correlation_id);
    }
}
