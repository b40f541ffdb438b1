//! Transfer worker
//!
//! One background task per PORT/PASV. It waits for the session to install a
//! transfer handle, opens the data connection, pumps blocks between the data
//! connection and the file or listing, reports the outcome on the control
//! connection and clears the handle together with its final reply.

use log::{debug, error, info, warn};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::protocol::ReplyWriter;
use crate::protocol::responses::{CANT_OPEN_DATA, LOCAL_ERROR, TRANSFER_COMPLETE};
use crate::transfer::data_channel::DataEndpoint;
use crate::transfer::handle::{Direction, SharedTransfer, TransferIo};

/// Knobs the worker takes from the server configuration.
#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    pub buffer_size: usize,
    pub connection_timeout: Duration,
}

enum PumpOutcome {
    Complete(u64),
    Failed(io::Error),
    Cancelled,
}

/// Body of the transfer worker task.
pub async fn run_transfer_worker(
    endpoint: DataEndpoint,
    shared: Arc<SharedTransfer>,
    replies: ReplyWriter,
    settings: WorkerSettings,
) {
    let Some((direction, io)) = shared.wait_for_transfer().await else {
        debug!("Transfer worker cancelled before a transfer started");
        shared.finish().await;
        return;
    };

    let establish = endpoint.establish(settings.connection_timeout);
    let stream = tokio::select! {
        result = establish => result,
        _ = shared.cancelled() => {
            debug!("Transfer worker cancelled while establishing data connection");
            shared.finish().await;
            return;
        }
    };

    let stream = match stream {
        Ok(stream) => stream,
        Err(e) => {
            error!("Data connection for {:?} failed: {}", direction, e);
            retire(&shared, &replies, Some((CANT_OPEN_DATA, "Cannot establish data connection.")))
                .await;
            return;
        }
    };

    let outcome = pump(direction, io, stream, &shared, settings.buffer_size).await;

    let reply = match outcome {
        PumpOutcome::Complete(bytes) => {
            info!("Transfer {:?} complete ({} bytes)", direction, bytes);
            shared.record_completed(bytes).await;
            Some((TRANSFER_COMPLETE, "Transfer complete."))
        }
        PumpOutcome::Failed(e) => {
            error!("Transfer {:?} aborted by I/O error: {}", direction, e);
            Some((LOCAL_ERROR, "Transfer aborted by internal I/O error."))
        }
        PumpOutcome::Cancelled => {
            info!("Transfer {:?} cancelled", direction);
            None
        }
    };

    retire(&shared, &replies, reply).await;
    debug!("Transfer worker terminated");
}

/// Release the transfer slot and send the final reply while holding the
/// control connection, so no session reply can slip in between. A cancel
/// that reached the slot first suppresses the reply.
async fn retire(shared: &SharedTransfer, replies: &ReplyWriter, reply: Option<(u16, &str)>) {
    let mut control = replies.lock().await;
    let cancelled = shared.finish().await;

    match reply {
        Some((code, message)) if !cancelled => {
            if let Err(e) = control.send_reply(code, message).await {
                warn!("Failed to send transfer result {}: {}", code, e);
            }
        }
        Some((code, _)) => debug!("Dropping {} reply of a cancelled transfer", code),
        None => {}
    }
}

async fn pump(
    direction: Direction,
    io: TransferIo,
    mut stream: TcpStream,
    shared: &SharedTransfer,
    buffer_size: usize,
) -> PumpOutcome {
    match io {
        TransferIo::Source(mut source) => {
            let outcome = copy_blocks(&mut source, &mut stream, shared, buffer_size).await;
            finish_sink(outcome, &mut stream).await
        }
        TransferIo::Sink(mut file) => {
            debug_assert_eq!(direction, Direction::ReceiveFile);
            let outcome = copy_blocks(&mut stream, &mut file, shared, buffer_size).await;
            finish_sink(outcome, &mut file).await
        }
    }
}

/// Flush and close the sink after a complete copy.
async fn finish_sink<W: AsyncWrite + Unpin>(outcome: PumpOutcome, sink: &mut W) -> PumpOutcome {
    match outcome {
        PumpOutcome::Complete(bytes) => match sink.shutdown().await {
            Ok(()) => PumpOutcome::Complete(bytes),
            Err(e) => PumpOutcome::Failed(e),
        },
        other => other,
    }
}

/// Move fixed-size blocks until end of data, an I/O error or cancellation.
async fn copy_blocks<R, W>(
    reader: &mut R,
    writer: &mut W,
    shared: &SharedTransfer,
    buffer_size: usize,
) -> PumpOutcome
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buffer = vec![0u8; buffer_size];
    let mut total = 0u64;

    loop {
        if shared.is_cancelled().await {
            return PumpOutcome::Cancelled;
        }

        let n = tokio::select! {
            read = reader.read(&mut buffer) => match read {
                Ok(0) => return PumpOutcome::Complete(total),
                Ok(n) => n,
                Err(e) => return PumpOutcome::Failed(e),
            },
            _ = shared.cancelled() => return PumpOutcome::Cancelled,
        };

        tokio::select! {
            written = writer.write_all(&buffer[..n]) => {
                if let Err(e) = written {
                    return PumpOutcome::Failed(e);
                }
            }
            _ = shared.cancelled() => return PumpOutcome::Cancelled,
        }

        total += n as u64;
    }
}
