//! Control connection transport
//!
//! `LineReader` pulls command lines off the control connection and
//! `ReplyWriter` frames replies onto it. The writer is shared between a
//! session and its transfer worker; its lock keeps whole replies together.

use log::{debug, warn};
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{Mutex, MutexGuard};

use crate::protocol::responses::format_response;

/// Outcome of reading one control line.
#[derive(Debug, PartialEq, Eq)]
pub enum ReadLine {
    Line(String),
    /// The line exceeded the limit; holds the kept prefix.
    TooLong(String),
    EndOfStream,
}

/// Buffered line reader over the read half of a control connection.
pub struct LineReader<R> {
    reader: BufReader<R>,
    limit: usize,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(inner: R, limit: usize) -> Self {
        Self {
            reader: BufReader::new(inner),
            limit,
        }
    }

    /// Read the next LF-terminated line, dropping one preceding CR.
    ///
    /// Bytes past the limit are discarded up to the next terminator and the
    /// line is reported as `TooLong`. A read error counts as end of stream.
    pub async fn read_command_line(&mut self) -> ReadLine {
        let mut line: Vec<u8> = Vec::new();
        // One extra byte leaves room for a CR that is stripped below.
        let capacity = self.limit + 1;
        let mut overflow = false;

        loop {
            let (consumed, terminated) = {
                let available = match self.reader.fill_buf().await {
                    Ok(buf) => buf,
                    Err(e) => {
                        warn!("Control connection read failed: {}", e);
                        return ReadLine::EndOfStream;
                    }
                };
                if available.is_empty() {
                    if line.is_empty() {
                        debug!("Control connection closed");
                        return ReadLine::EndOfStream;
                    }
                    break;
                }

                let (chunk, terminated) = match available.iter().position(|&b| b == b'\n') {
                    Some(pos) => (&available[..pos], true),
                    None => (available, false),
                };
                let room = capacity.saturating_sub(line.len());
                let take = chunk.len().min(room);
                line.extend_from_slice(&chunk[..take]);
                overflow |= take < chunk.len();

                (chunk.len() + usize::from(terminated), terminated)
            };
            self.reader.consume(consumed);
            if terminated {
                break;
            }
        }

        if line.last() == Some(&b'\r') {
            line.pop();
        }
        if line.len() > self.limit {
            line.truncate(self.limit);
            overflow = true;
        }

        let text = String::from_utf8_lossy(&line).into_owned();
        if overflow {
            ReadLine::TooLong(text)
        } else {
            ReadLine::Line(text)
        }
    }
}

type BoxedWriter = Pin<Box<dyn AsyncWrite + Send>>;

/// Serialized reply sink for one control connection.
#[derive(Clone)]
pub struct ReplyWriter {
    inner: Arc<Mutex<BoxedWriter>>,
}

impl ReplyWriter {
    pub fn new<W: AsyncWrite + Send + 'static>(writer: W) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::pin(writer))),
        }
    }

    /// Send a complete (possibly multi-line) reply and flush it.
    pub async fn send_reply(&self, code: u16, message: &str) -> io::Result<()> {
        self.lock().await.send_reply(code, message).await
    }

    /// Take exclusive use of the control connection. Other replies wait until
    /// the guard is dropped.
    pub async fn lock(&self) -> ReplyGuard<'_> {
        ReplyGuard {
            writer: self.inner.lock().await,
        }
    }

    /// Close the write side of the control connection.
    pub async fn shutdown(&self) -> io::Result<()> {
        self.inner.lock().await.shutdown().await
    }
}

/// Exclusive hold on a `ReplyWriter`.
pub struct ReplyGuard<'a> {
    writer: MutexGuard<'a, BoxedWriter>,
}

impl ReplyGuard<'_> {
    pub async fn send_reply(&mut self, code: u16, message: &str) -> io::Result<()> {
        let framed = format_response(code, message);
        self.writer.write_all(framed.as_bytes()).await?;
        self.writer.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, duplex};

    async fn reader_over(input: &[u8], limit: usize) -> LineReader<tokio::io::DuplexStream> {
        let (mut client, server) = duplex(4096);
        client.write_all(input).await.unwrap();
        drop(client);
        LineReader::new(server, limit)
    }

    #[tokio::test]
    async fn reads_crlf_and_lf_lines() {
        let mut reader = reader_over(b"USER anonymous\r\nPWD\nQUIT", 1023).await;
        assert_eq!(reader.read_command_line().await, ReadLine::Line("USER anonymous".into()));
        assert_eq!(reader.read_command_line().await, ReadLine::Line("PWD".into()));
        assert_eq!(reader.read_command_line().await, ReadLine::Line("QUIT".into()));
        assert_eq!(reader.read_command_line().await, ReadLine::EndOfStream);
    }

    #[tokio::test]
    async fn truncates_long_lines_and_resynchronizes() {
        let mut input = vec![b'A'; 40];
        input.extend_from_slice(b"\r\nNOOP\r\n");
        let mut reader = reader_over(&input, 16).await;

        assert_eq!(reader.read_command_line().await, ReadLine::TooLong("A".repeat(16)));
        assert_eq!(reader.read_command_line().await, ReadLine::Line("NOOP".into()));
    }

    #[tokio::test]
    async fn line_of_exactly_the_limit_is_kept() {
        let mut reader = reader_over(b"ABCD\r\nABCDE\r\n", 4).await;
        assert_eq!(reader.read_command_line().await, ReadLine::Line("ABCD".into()));
        assert_eq!(reader.read_command_line().await, ReadLine::TooLong("ABCD".into()));
    }

    #[tokio::test]
    async fn replies_are_framed_and_flushed() {
        let (client, mut server) = duplex(4096);
        let writer = ReplyWriter::new(client);
        writer.send_reply(220, "Hello\nWorld").await.unwrap();
        writer.send_reply(221, "Bye").await.unwrap();
        drop(writer);

        let mut received = String::new();
        server.read_to_string(&mut received).await.unwrap();
        assert_eq!(received, "220-Hello\r\n220 World\r\n221 Bye\r\n");
    }

    #[tokio::test]
    async fn guard_holds_back_other_replies() {
        let (client, mut server) = duplex(4096);
        let writer = ReplyWriter::new(client);

        let mut guard = writer.lock().await;
        let queued = {
            let writer = writer.clone();
            tokio::spawn(async move { writer.send_reply(225, "Second").await.unwrap() })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        guard.send_reply(226, "First").await.unwrap();
        drop(guard);

        queued.await.unwrap();
        drop(writer);
        let mut received = String::new();
        server.read_to_string(&mut received).await.unwrap();
        assert_eq!(received, "226 First\r\n225 Second\r\n");
    }
}
