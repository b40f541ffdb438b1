//! Shared transfer state
//!
//! The only state touched by both a session and its transfer worker. Every
//! access goes through one mutex that is never held across network or file
//! I/O; `Notify` wakes the worker when a handle is installed or a cancel is
//! requested.

use std::fmt;
use tokio::fs::File;
use tokio::io::AsyncRead;
use tokio::sync::{Mutex, Notify};

/// What a transfer moves and in which direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    SendFile,
    ReceiveFile,
    SendListing,
}

/// Byte source or sink of a transfer.
pub enum TransferIo {
    Source(Box<dyn AsyncRead + Send + Unpin>),
    Sink(File),
}

/// Descriptor of one data transfer, created by LIST/RETR/STOR.
pub struct TransferHandle {
    direction: Direction,
    io: Option<TransferIo>,
}

impl TransferHandle {
    pub fn send_file(file: File) -> Self {
        Self {
            direction: Direction::SendFile,
            io: Some(TransferIo::Source(Box::new(file))),
        }
    }

    pub fn send_listing(listing: Vec<u8>) -> Self {
        Self {
            direction: Direction::SendListing,
            io: Some(TransferIo::Source(Box::new(std::io::Cursor::new(listing)))),
        }
    }

    pub fn receive_file(file: File) -> Self {
        Self {
            direction: Direction::ReceiveFile,
            io: Some(TransferIo::Sink(file)),
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }
}

impl fmt::Debug for TransferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferHandle")
            .field("direction", &self.direction)
            .field("io_taken", &self.io.is_none())
            .finish()
    }
}

/// Per-session totals of completed transfers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    pub files: u64,
    pub bytes: u64,
}

#[derive(Default)]
struct TransferState {
    handle: Option<TransferHandle>,
    cancelled: bool,
    /// Set while a worker is serving this slot
    armed: bool,
    stats: TransferStats,
}

/// Transfer slot shared between a session and its worker.
#[derive(Default)]
pub struct SharedTransfer {
    state: Mutex<TransferState>,
    wake: Notify,
}

impl SharedTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a transfer handle is currently set.
    pub async fn in_progress(&self) -> bool {
        self.state.lock().await.handle.is_some()
    }

    /// Install a handle and wake the waiting worker.
    pub async fn install(&self, handle: TransferHandle) {
        self.state.lock().await.handle = Some(handle);
        self.wake.notify_waiters();
    }

    /// Request cancellation of the current worker.
    pub async fn cancel(&self) {
        self.state.lock().await.cancelled = true;
        self.wake.notify_waiters();
    }

    /// Prepare the slot for a freshly spawned worker.
    pub async fn rearm(&self) {
        let mut state = self.state.lock().await;
        state.cancelled = false;
        state.handle = None;
        state.armed = true;
    }

    /// Whether a worker still serves the slot.
    pub async fn is_armed(&self) -> bool {
        self.state.lock().await.armed
    }

    pub async fn is_cancelled(&self) -> bool {
        self.state.lock().await.cancelled
    }

    /// Resolves once cancellation has been requested.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.wake.notified();
            if self.is_cancelled().await {
                return;
            }
            notified.await;
        }
    }

    /// Wait until a handle is installed and take its source/sink out.
    ///
    /// The handle itself stays in place so the session keeps seeing the
    /// transfer as in progress. Returns `None` if cancelled first.
    pub async fn wait_for_transfer(&self) -> Option<(Direction, TransferIo)> {
        loop {
            let notified = self.wake.notified();
            {
                let mut state = self.state.lock().await;
                if state.cancelled {
                    return None;
                }
                if let Some(handle) = state.handle.as_mut() {
                    if let Some(io) = handle.io.take() {
                        return Some((handle.direction, io));
                    }
                }
            }
            notified.await;
        }
    }

    /// Clear the handle and retire the worker; the session may accept a new
    /// data command after this. Returns whether cancellation was requested
    /// before the worker retired.
    pub async fn finish(&self) -> bool {
        let mut state = self.state.lock().await;
        state.handle = None;
        state.armed = false;
        state.cancelled
    }

    pub async fn record_completed(&self, bytes: u64) {
        let mut state = self.state.lock().await;
        state.stats.files += 1;
        state.stats.bytes += bytes;
    }

    pub async fn stats(&self) -> TransferStats {
        self.state.lock().await.stats
    }
}
