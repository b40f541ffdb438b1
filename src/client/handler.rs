use log::{debug, error, info, warn};
use std::io;
use std::net::SocketAddr;
use tokio::net::TcpStream;

use crate::client::Session;
use crate::middleware::logging::log_command;
use crate::protocol::responses::{READY, SYNTAX_ERROR};
use crate::protocol::{
    CommandStatus, LineReader, ReadLine, ReplyWriter, handle_command, parse_command,
};
use crate::server::ServerContext;

/// Handles one FTP control connection using Tokio async runtime.
///
/// - Greets the client, then reads command lines with a bounded `LineReader`.
/// - Dispatches commands using `handle_command` and sends exactly one reply
///   for each, except for data commands ignored during a transfer.
/// - Hands opened transfers to the worker only after their 150 reply is out.
pub async fn handle_client(
    cmd_stream: TcpStream,
    client_addr: SocketAddr,
    context: ServerContext,
) -> io::Result<()> {
    let local_addr = cmd_stream.local_addr()?;
    let (read_half, write_half) = cmd_stream.into_split();
    let replies = ReplyWriter::new(write_half);
    let mut reader = LineReader::new(read_half, context.config.max_command_length);

    replies.send_reply(READY, &context.config.greeting).await?;

    let mut session = Session::new(client_addr, local_addr, replies.clone(), context);

    loop {
        let line = match reader.read_command_line().await {
            ReadLine::Line(line) => line,
            ReadLine::TooLong(prefix) => {
                warn!(
                    "Client {} sent an oversized command line starting with {:?}",
                    client_addr,
                    prefix.chars().take(16).collect::<String>()
                );
                if replies
                    .send_reply(SYNTAX_ERROR, "Command line too long.")
                    .await
                    .is_err()
                {
                    break;
                }
                continue;
            }
            ReadLine::EndOfStream => {
                info!("Connection closed by client {}", client_addr);
                break;
            }
        };

        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(e) => {
                warn!("Unparseable command from {}: {}", client_addr, e);
                if replies
                    .send_reply(e.ftp_code(), "Syntax error, command unrecognized.")
                    .await
                    .is_err()
                {
                    break;
                }
                continue;
            }
        };

        log_command(&client_addr, &command);
        let result = handle_command(&mut session, &command).await;

        if let Some(reply) = &result.reply {
            debug!("Sending response to client {}: {} {}", client_addr, reply.code, reply.message);
            if let Err(e) = replies.send_reply(reply.code, &reply.message).await {
                error!("Failed to write reply to {}: {}", client_addr, e);
                break;
            }
        }

        if let Some(transfer) = result.transfer {
            session.begin_transfer(transfer).await;
        }

        match result.status {
            CommandStatus::Success => {}
            CommandStatus::Failure(reason) => {
                info!("{} failed for client {}: {}", command.verb(), client_addr, reason);
            }
            CommandStatus::CloseConnection => {
                info!("Closing control connection of {}", client_addr);
                break;
            }
        }
    }

    session.close().await;
    if let Err(e) = replies.shutdown().await {
        debug!("Control connection of {} already closed: {}", client_addr, e);
    }
    info!("Client {} disconnected", client_addr);
    Ok(())
}
