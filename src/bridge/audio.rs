//! Upstream-bound audio relay.
//!
//! Client audio frames are queued by `SessionBridge::send_audio` and drained
//! here in FIFO order. The loop polls the queue with a short timeout so the
//! running flag is observed promptly on shutdown; a poll timeout is not a
//! failure, it just re-polls.
//!
//! The downstream direction (Voice Live → client) has no queue at all: the
//! event dispatcher forwards `response.audio.delta` payloads straight to the
//! client transport.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::upstream::UpstreamHandle;

/// How long one queue poll waits before re-checking the running flag.
pub const QUEUE_POLL: Duration = Duration::from_secs(1);

/// Drain the audio queue into the Voice Live input buffer.
///
/// Frames are forwarded in exactly the order they were enqueued; nothing is
/// forwarded after the running flag clears. Returns when the queue closes,
/// the session stops running, or an upstream send fails.
pub async fn run_sender(
    mut queue: mpsc::Receiver<Bytes>,
    upstream: UpstreamHandle,
    running: Arc<AtomicBool>,
    poll: Duration,
) {
    while running.load(Ordering::SeqCst) {
        let frame = match timeout(poll, queue.recv()).await {
            // Timeout just bounds how quickly shutdown is observed
            Err(_) => continue,
            Ok(None) => break,
            Ok(Some(frame)) => frame,
        };

        if !running.load(Ordering::SeqCst) {
            break;
        }

        if let Err(e) = upstream.append_audio(&frame).await {
            tracing::error!("Audio sender error: {}", e);
            break;
        }
    }
    tracing::debug!("Audio sender ended");
}
