//! Outbound half of the duplex channel

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;

use crate::error::{RelayError, Result};

use super::protocol::WireMessage;

/// Anything that can deliver a wire message to the provider side
#[async_trait]
pub trait Channel: Send + Sync {
    async fn send(&self, message: &WireMessage) -> Result<()>;
}

/// Line-delimited JSON over any async writer
///
/// Writes are serialized by an async mutex so concurrent invocations never
/// interleave bytes of different messages.
pub struct StreamChannel<W> {
    writer: Mutex<BufWriter<W>>,
}

impl<W: AsyncWrite + Unpin + Send> StreamChannel<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
        }
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> Channel for StreamChannel<W> {
    async fn send(&self, message: &WireMessage) -> Result<()> {
        let line = message.to_line()?;
        let mut writer = self.writer.lock().await;
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| RelayError::SendFailed {
                reason: e.to_string(),
            })?;
        writer.flush().await.map_err(|e| RelayError::SendFailed {
            reason: e.to_string(),
        })
    }
}
