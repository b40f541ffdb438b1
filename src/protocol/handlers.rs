//! Command handlers module for the RAX FTP daemon.
//!
//! This module defines one handler per FTP command. Handlers mutate the
//! session state and describe their reply through a `CommandResult`; the
//! session loop sends the reply and, for data commands, hands the opened
//! source or sink to the transfer worker afterwards.

use log::{error, info, warn};

use crate::auth::{anonymous_identity, is_anonymous, validate_user};
use crate::client::{AuthStage, Session};
use crate::error::handlers::log_storage_error;
use crate::error::{AuthError, StorageError};
use crate::navigate::{change_directory, working_dir_after_remove, working_dir_after_rename};
use crate::protocol::responses::*;
use crate::protocol::{Command, CommandResult};
use crate::storage::operations::{
    delete_file, list_directory, make_directory, open_for_download, open_for_upload,
    remove_directory, rename_path,
};
use crate::storage::{PathKind, VirtualPath, path_exists};
use crate::transfer::{
    DataEndpoint, DataMode, TransferHandle, encode_host_port, setup_active_mode,
    setup_passive_mode,
};

/// Dispatches a received FTP command to its corresponding handler.
pub async fn handle_command(session: &mut Session, command: &Command) -> CommandResult {
    if command.requires_login() && !session.client().is_logged_in() {
        return CommandResult::failure(AUTH_FAILED, "Please login with USER and PASS.");
    }

    match command {
        Command::USER(username) => handle_cmd_user(session, username).await,
        Command::PASS(password) => handle_cmd_pass(session, password).await,
        Command::SYST => CommandResult::success(SYSTEM_TYPE, "UNIX Type: L8"),
        Command::TYPE(kind) => handle_cmd_type(kind),
        Command::NOOP => CommandResult::success(OK, "NOOP ok."),
        Command::PORT(addr) => handle_cmd_port(session, addr).await,
        Command::PASV => handle_cmd_pasv(session).await,
        Command::CWD(path) => handle_cmd_cwd(session, path).await,
        Command::CDUP => handle_cmd_cwd(session, "..").await,
        Command::PWD => handle_cmd_pwd(session),
        Command::MKD(path) => handle_cmd_mkd(session, path).await,
        Command::RMD(path) => handle_cmd_rmd(session, path).await,
        Command::DELE(path) => handle_cmd_dele(session, path).await,
        Command::RNFR(path) => handle_cmd_rnfr(session, path).await,
        Command::RNTO(path) => handle_cmd_rnto(session, path).await,
        Command::LIST(arg) => handle_cmd_list(session, arg).await,
        Command::RETR(path) => handle_cmd_retr(session, path).await,
        Command::STOR(path) => handle_cmd_stor(session, path).await,
        Command::ABOR => handle_cmd_abor(session).await,
        Command::QUIT => handle_cmd_quit(session).await,
        Command::UNKNOWN(verb) => {
            CommandResult::success(UNKNOWN_COMMAND, format!("Unknown command \"{}\".", verb))
        }
    }
}

/// Reply for an authentication error, delayed when it is a login failure.
async fn auth_failure(session: &Session, err: AuthError) -> CommandResult {
    let code = err.ftp_code();
    warn!("Authentication error for {}: {}", session.client().client_addr(), err);
    if code == AUTH_FAILED {
        tokio::time::sleep(session.context().config.auth_failure_delay()).await;
    }
    let message = match err {
        AuthError::LoginIncorrect(_) => "Login incorrect.".to_string(),
        AuthError::PasswordTooLong => "Password too long.".to_string(),
        AuthError::AnonymousDisabled => "Anonymous access is disabled.".to_string(),
        AuthError::AlreadyLoggedIn => "Already logged in.".to_string(),
        AuthError::UserRequired => "Specify your username first.".to_string(),
        other => format!("{}.", other),
    };
    CommandResult::failure(code, message)
}

/// Handles the USER command: stores the username and waits for PASS.
async fn handle_cmd_user(session: &mut Session, username: &str) -> CommandResult {
    if session.client().is_logged_in() {
        return auth_failure(session, AuthError::AlreadyLoggedIn).await;
    }
    if let Err(e) = validate_user(username, &session.context().config) {
        return auth_failure(session, e).await;
    }

    if is_anonymous(username) {
        session.client_mut().begin_login(None);
        CommandResult::success(
            PASSWORD_REQUIRED,
            "Logging in anonymously. Send your complete e-mail address as password.",
        )
    } else {
        session.client_mut().begin_login(Some(username.to_string()));
        CommandResult::success(PASSWORD_REQUIRED, format!("Password required for {}.", username))
    }
}

/// Handles the PASS command: completes an anonymous or named login.
async fn handle_cmd_pass(session: &mut Session, password: &str) -> CommandResult {
    if session.client().auth_stage() != AuthStage::AwaitingPassword {
        return auth_failure(session, AuthError::UserRequired).await;
    }

    let identity = match session.client().username() {
        None => anonymous_identity(password, &session.context().config),
        Some(username) => {
            if session.context().authenticator.authenticate(username, password) {
                Ok(username.to_string())
            } else {
                Err(AuthError::LoginIncorrect(username.to_string()))
            }
        }
    };

    match identity {
        Ok(identity) => {
            info!("Client {} logged in as {}", session.client().client_addr(), identity);
            let message = format!("Logged in. Welcome, {}.", identity);
            session.client_mut().complete_login(identity);
            CommandResult::success(LOGIN_SUCCESS, message)
        }
        Err(e) => {
            session.client_mut().reset_login();
            auth_failure(session, e).await
        }
    }
}

/// Handles the TYPE command: only binary (image) mode is supported.
fn handle_cmd_type(kind: &str) -> CommandResult {
    if kind.trim().eq_ignore_ascii_case("I") {
        CommandResult::success(OK, "Type set to I.")
    } else {
        CommandResult::failure(PARAMETER_NOT_IMPLEMENTED, "Only binary mode is supported.")
    }
}

/// Handles the PORT command: the worker will connect to the given address.
async fn handle_cmd_port(session: &mut Session, addr: &str) -> CommandResult {
    session.reap_worker().await;
    if session.transfer_in_progress().await {
        return CommandResult::failure(BAD_SEQUENCE, "Transfer in progress.");
    }

    match setup_active_mode(session.client().client_addr(), addr) {
        Ok(data_socket) => {
            session
                .start_worker(DataEndpoint::Active(data_socket), DataMode::Active(data_socket))
                .await;
            CommandResult::success(OK, "PORT command successful.")
        }
        Err(e) => {
            warn!("PORT from {} rejected: {}", session.client().client_addr(), e);
            CommandResult::failure(e.ftp_code(), "Illegal PORT command.")
        }
    }
}

/// Handles the PASV command: opens an ephemeral listener for the worker.
///
/// The previous data channel is torn down first, so a failure here leaves
/// the session without a consistent data mode and closes it.
async fn handle_cmd_pasv(session: &mut Session) -> CommandResult {
    session.reap_worker().await;
    if session.transfer_in_progress().await {
        return CommandResult::failure(BAD_SEQUENCE, "Transfer in progress.");
    }
    session.stop_worker().await;

    match setup_passive_mode(session.local_addr(), session.client().client_addr()).await {
        Ok(passive) => {
            let announce = encode_host_port(&passive.data_socket);
            session.start_worker(passive.endpoint, DataMode::Passive).await;
            CommandResult::success(
                ENTERING_PASSIVE,
                format!("Entering Passive Mode ({}).", announce),
            )
        }
        Err(e) => {
            error!(
                "PASV setup failed for {}: {}",
                session.client().client_addr(),
                e
            );
            CommandResult::close(e.ftp_code(), "Cannot enter passive mode, closing control connection.")
        }
    }
}

/// Handles the CWD and CDUP commands.
async fn handle_cmd_cwd(session: &mut Session, path: &str) -> CommandResult {
    match change_directory(session.server_root(), session.client().working_directory(), path).await
    {
        Ok(new_path) => {
            info!(
                "Client {} changed directory to {}",
                session.client().client_addr(),
                new_path
            );
            let message = format!("Directory changed to {}.", new_path);
            session.client_mut().set_working_directory(new_path);
            CommandResult::success(FILE_ACTION_OK, message)
        }
        Err(e) => {
            warn!("CWD refused for {}: {}", session.client().client_addr(), e);
            CommandResult::failure(e.ftp_code(), "Directory not found.")
        }
    }
}

/// Handles the PWD command.
fn handle_cmd_pwd(session: &Session) -> CommandResult {
    CommandResult::success(
        PATH_CREATED,
        format!(
            "\"{}\" is the current directory.",
            session.client().working_directory()
        ),
    )
}

fn resolve(session: &Session, path: &str) -> Result<VirtualPath, StorageError> {
    session.client().working_directory().resolve(path)
}

fn storage_failure(session: &Session, command: &str, err: &StorageError, creating: bool) -> CommandResult {
    log_storage_error(&session.client().client_addr(), command, err);
    let code = if creating {
        err.ftp_code_for_create()
    } else {
        err.ftp_code()
    };
    let message = match err {
        StorageError::PathRejected(_) => "File name not allowed.",
        StorageError::FileNotFound(_) | StorageError::NotFound(_) => "No such file or directory.",
        StorageError::RootNotAllowed => "Operation not permitted on the root directory.",
        StorageError::IoError(_) => "Requested action not taken.",
    };
    CommandResult::failure(code, message)
}

/// Handles the MKD command.
async fn handle_cmd_mkd(session: &mut Session, path: &str) -> CommandResult {
    let target = match resolve(session, path) {
        Ok(target) => target,
        Err(e) => return storage_failure(session, "MKD", &e, true),
    };
    match make_directory(session.server_root(), &target).await {
        Ok(()) => CommandResult::success(FILE_ACTION_OK, format!("\"{}\" created.", target)),
        Err(e) => storage_failure(session, "MKD", &e, true),
    }
}

/// Handles the RMD command; removing the working directory moves the
/// session to its parent.
async fn handle_cmd_rmd(session: &mut Session, path: &str) -> CommandResult {
    let target = match resolve(session, path) {
        Ok(target) => target,
        Err(e) => return storage_failure(session, "RMD", &e, false),
    };
    if let Err(e) = remove_directory(session.server_root(), &target).await {
        return storage_failure(session, "RMD", &e, false);
    }

    let next = working_dir_after_remove(session.client().working_directory(), &target);
    session.client_mut().set_working_directory(next);
    CommandResult::success(FILE_ACTION_OK, "Directory removed.")
}

/// Handles the DELE command.
async fn handle_cmd_dele(session: &mut Session, path: &str) -> CommandResult {
    let target = match resolve(session, path) {
        Ok(target) => target,
        Err(e) => return storage_failure(session, "DELE", &e, false),
    };
    match delete_file(session.server_root(), &target).await {
        Ok(()) => CommandResult::success(FILE_ACTION_OK, "File deleted."),
        Err(e) => storage_failure(session, "DELE", &e, false),
    }
}

/// Handles the RNFR command: stages an existing path for RNTO. Any earlier
/// staged path is dropped, even when this RNFR fails.
async fn handle_cmd_rnfr(session: &mut Session, path: &str) -> CommandResult {
    if let Some(stale) = session.client_mut().take_rename_source() {
        info!("Dropping staged rename source {}", stale);
    }

    let source = match resolve(session, path) {
        Ok(source) if source.is_root() => {
            return storage_failure(session, "RNFR", &StorageError::RootNotAllowed, false);
        }
        Ok(source) => source,
        Err(e) => return storage_failure(session, "RNFR", &e, false),
    };
    if !path_exists(session.server_root(), &source, PathKind::Any).await {
        return storage_failure(session, "RNFR", &StorageError::NotFound(source.to_string()), false);
    }

    session.client_mut().stage_rename(source);
    CommandResult::success(FILE_ACTION_OK, "Ready for RNTO.")
}

/// Handles the RNTO command; a working directory inside the renamed path
/// follows it.
async fn handle_cmd_rnto(session: &mut Session, path: &str) -> CommandResult {
    let Some(source) = session.client_mut().take_rename_source() else {
        return CommandResult::failure(BAD_SEQUENCE, "RNFR required first.");
    };
    let target = match resolve(session, path) {
        Ok(target) => target,
        Err(e) => return storage_failure(session, "RNTO", &e, true),
    };
    if let Err(e) = rename_path(session.server_root(), &source, &target).await {
        return storage_failure(session, "RNTO", &e, true);
    }

    let next = working_dir_after_rename(session.client().working_directory(), &source, &target);
    session.client_mut().set_working_directory(next);
    CommandResult::success(FILE_ACTION_OK, "Rename successful.")
}

/// Common gate of LIST/RETR/STOR: a command issued while a transfer is in
/// flight is ignored without a reply.
async fn data_command_gate(session: &mut Session) -> Option<CommandResult> {
    session.reap_worker().await;
    if session.transfer_in_progress().await {
        info!(
            "Ignoring data command from {} while a transfer is in progress",
            session.client().client_addr()
        );
        return Some(CommandResult::ignored());
    }
    if session.client().data_mode() == DataMode::None {
        return Some(CommandResult::failure(CANT_OPEN_DATA, "Use PORT or PASV first."));
    }
    None
}

/// Handles the LIST command: lists the working directory or the given path.
async fn handle_cmd_list(session: &mut Session, arg: &str) -> CommandResult {
    if let Some(result) = data_command_gate(session).await {
        return result;
    }

    let target = if arg.is_empty() || arg.starts_with('-') {
        session.client().working_directory().clone()
    } else {
        match resolve(session, arg) {
            Ok(target) => target,
            Err(e) => return storage_failure(session, "LIST", &e, false),
        }
    };

    let producer = session.context().listing_producer.clone();
    match list_directory(session.server_root(), &target, producer).await {
        Ok(listing) => CommandResult::start_transfer(
            "Here comes the directory listing.",
            TransferHandle::send_listing(listing),
        ),
        Err(e) => storage_failure(session, "LIST", &e, false),
    }
}

/// Handles the RETR command: sends a regular file.
async fn handle_cmd_retr(session: &mut Session, path: &str) -> CommandResult {
    if let Some(result) = data_command_gate(session).await {
        return result;
    }

    let target = match resolve(session, path) {
        Ok(target) => target,
        Err(e) => return storage_failure(session, "RETR", &e, false),
    };
    match open_for_download(session.server_root(), &target).await {
        Ok(file) => {
            info!(
                "Client {} retrieving {}",
                session.client().client_addr(),
                target
            );
            CommandResult::start_transfer(
                format!("Opening BINARY mode data connection for {}.", target),
                TransferHandle::send_file(file),
            )
        }
        Err(e) => storage_failure(session, "RETR", &e, false),
    }
}

/// Handles the STOR command: receives into a new or truncated file.
async fn handle_cmd_stor(session: &mut Session, path: &str) -> CommandResult {
    if let Some(result) = data_command_gate(session).await {
        return result;
    }

    let target = match resolve(session, path) {
        Ok(target) => target,
        Err(e) => return storage_failure(session, "STOR", &e, true),
    };
    match open_for_upload(session.server_root(), &target).await {
        Ok(file) => {
            info!("Client {} storing {}", session.client().client_addr(), target);
            CommandResult::start_transfer(
                format!("Ok to send data for {}.", target),
                TransferHandle::receive_file(file),
            )
        }
        Err(e) => storage_failure(session, "STOR", &e, true),
    }
}

/// Handles the ABOR command: cancels and joins an active transfer.
async fn handle_cmd_abor(session: &mut Session) -> CommandResult {
    if session.transfer_in_progress().await {
        session.stop_worker().await;
        info!("Client {} aborted its transfer", session.client().client_addr());
        CommandResult::success(TRANSFER_COMPLETE, "Transfer aborted.")
    } else {
        CommandResult::success(NO_TRANSFER, "No transfer in progress.")
    }
}

/// Handles the QUIT command: stops the worker and signals connection close.
async fn handle_cmd_quit(session: &mut Session) -> CommandResult {
    session.stop_worker().await;
    CommandResult::close(GOODBYE, "Goodbye.")
}
