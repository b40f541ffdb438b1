use std::net::{SocketAddr, SocketAddrV4};
use std::path::Path;
use std::time::{Duration, Instant};

use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use rax_ftpd::{Server, ServerConfig};

const WAIT: Duration = Duration::from_secs(5);

// Start a server on an ephemeral port with the given root
async fn start_server(root: &Path, tweak: impl FnOnce(&mut ServerConfig)) -> SocketAddr {
    let mut config = ServerConfig {
        bind_address: "127.0.0.1".to_string(),
        control_port: 0,
        server_root: root.to_string_lossy().into_owned(),
        connection_timeout_secs: 5,
        auth_failure_delay_ms: 0,
        ..ServerConfig::default()
    };
    tweak(&mut config);

    let server = Server::bind(config).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.start());
    addr
}

struct FtpClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl FtpClient {
    async fn connect(addr: SocketAddr) -> (Self, u16, String) {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, writer) = stream.into_split();
        let mut client = Self {
            reader: BufReader::new(read_half),
            writer,
        };
        let (code, text) = client.reply().await;
        (client, code, text)
    }

    // Read one possibly multi-line reply; interior lines are joined with '\n'
    async fn reply(&mut self) -> (u16, String) {
        let mut lines = Vec::new();
        loop {
            let mut line = String::new();
            let n = timeout(WAIT, self.reader.read_line(&mut line))
                .await
                .expect("timed out waiting for a reply")
                .unwrap();
            assert!(n > 0, "control connection closed while waiting for a reply");
            assert!(line.ends_with("\r\n"), "reply line not CRLF terminated: {line:?}");

            let line = line.trim_end_matches("\r\n").to_string();
            let code: u16 = line[..3].parse().unwrap();
            let last = line.as_bytes()[3] == b' ';
            lines.push(line[4..].to_string());
            if last {
                return (code, lines.join("\n"));
            }
        }
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{}\r\n", line).as_bytes())
            .await
            .unwrap();
    }

    async fn cmd(&mut self, line: &str) -> (u16, String) {
        self.send(line).await;
        self.reply().await
    }

    async fn login_anonymous(&mut self) {
        assert_eq!(self.cmd("USER anonymous").await.0, 331);
        assert_eq!(self.cmd("PASS guest@example.com").await.0, 230);
    }

    async fn pasv(&mut self) -> SocketAddrV4 {
        let (code, text) = self.cmd("PASV").await;
        assert_eq!(code, 227, "{text}");
        parse_227(&text)
    }

    async fn closed(&mut self) -> bool {
        let mut rest = Vec::new();
        matches!(
            timeout(WAIT, self.reader.read_to_end(&mut rest)).await,
            Ok(Ok(0))
        )
    }
}

fn parse_227(text: &str) -> SocketAddrV4 {
    let open = text.find('(').unwrap();
    let close = text.find(')').unwrap();
    let n: Vec<u16> = text[open + 1..close]
        .split(',')
        .map(|p| p.parse().unwrap())
        .collect();
    SocketAddrV4::new(
        std::net::Ipv4Addr::new(n[0] as u8, n[1] as u8, n[2] as u8, n[3] as u8),
        n[4] * 256 + n[5],
    )
}

fn port_argument(addr: SocketAddr) -> String {
    let port = addr.port();
    format!("127,0,0,1,{},{}", port / 256, port % 256)
}

async fn read_all(mut stream: TcpStream) -> Vec<u8> {
    let mut data = Vec::new();
    timeout(WAIT, stream.read_to_end(&mut data))
        .await
        .unwrap()
        .unwrap();
    data
}

#[tokio::test(flavor = "multi_thread")]
async fn anonymous_session_end_to_end() {
    let root = TempDir::new().unwrap();
    std::fs::write(root.path().join("hello.txt"), b"hello world\n").unwrap();
    let addr = start_server(root.path(), |_| {}).await;

    let (mut client, code, _) = FtpClient::connect(addr).await;
    assert_eq!(code, 220);

    client.login_anonymous().await;
    assert_eq!(client.cmd("SYST").await, (215, "UNIX Type: L8".to_string()));
    assert_eq!(client.cmd("TYPE I").await.0, 200);
    assert_eq!(
        client.cmd("PWD").await,
        (257, "\"/\" is the current directory.".to_string())
    );

    // LIST over a passive connection
    let data_addr = client.pasv().await;
    let data = TcpStream::connect(data_addr).await.unwrap();
    assert_eq!(client.cmd("LIST").await.0, 150);
    let listing = String::from_utf8(read_all(data).await).unwrap();
    assert_eq!(client.reply().await.0, 226);
    assert!(listing.contains("hello.txt"), "{listing}");
    assert!(listing.ends_with("\r\n"));

    // RETR over a passive connection
    let data_addr = client.pasv().await;
    let data = TcpStream::connect(data_addr).await.unwrap();
    assert_eq!(client.cmd("RETR hello.txt").await.0, 150);
    assert_eq!(read_all(data).await, b"hello world\n");
    assert_eq!(client.reply().await, (226, "Transfer complete.".to_string()));

    // STOR over a passive connection
    let payload: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
    let data_addr = client.pasv().await;
    let mut data = TcpStream::connect(data_addr).await.unwrap();
    assert_eq!(client.cmd("STOR upload.bin").await.0, 150);
    data.write_all(&payload).await.unwrap();
    data.shutdown().await.unwrap();
    drop(data);
    assert_eq!(client.reply().await.0, 226);
    assert_eq!(std::fs::read(root.path().join("upload.bin")).unwrap(), payload);

    assert_eq!(client.cmd("QUIT").await.0, 221);
    assert!(client.closed().await);
}

#[tokio::test(flavor = "multi_thread")]
async fn active_mode_retrieve_and_store() {
    let root = TempDir::new().unwrap();
    std::fs::write(root.path().join("a.txt"), b"active bytes").unwrap();
    let addr = start_server(root.path(), |_| {}).await;
    let (mut client, _, _) = FtpClient::connect(addr).await;
    client.login_anonymous().await;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = port_argument(listener.local_addr().unwrap());
    assert_eq!(client.cmd(&format!("PORT {}", port)).await.0, 200);
    assert_eq!(client.cmd("RETR a.txt").await.0, 150);
    let (data, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
    assert_eq!(read_all(data).await, b"active bytes");
    assert_eq!(client.reply().await.0, 226);

    assert_eq!(client.cmd(&format!("PORT {}", port)).await.0, 200);
    assert_eq!(client.cmd("STOR b.txt").await.0, 150);
    let (mut data, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
    data.write_all(b"uploaded").await.unwrap();
    data.shutdown().await.unwrap();
    drop(data);
    assert_eq!(client.reply().await.0, 226);
    assert_eq!(std::fs::read(root.path().join("b.txt")).unwrap(), b"uploaded");
}

#[tokio::test(flavor = "multi_thread")]
async fn data_mode_is_consumed_by_a_transfer() {
    let root = TempDir::new().unwrap();
    let addr = start_server(root.path(), |_| {}).await;
    let (mut client, _, _) = FtpClient::connect(addr).await;
    client.login_anonymous().await;

    assert_eq!(client.cmd("LIST").await.0, 425);

    let data_addr = client.pasv().await;
    let data = TcpStream::connect(data_addr).await.unwrap();
    assert_eq!(client.cmd("LIST").await.0, 150);
    read_all(data).await;
    assert_eq!(client.reply().await.0, 226);

    assert_eq!(client.cmd("LIST").await.0, 425);
}

#[tokio::test(flavor = "multi_thread")]
async fn login_is_required_and_sequenced() {
    let root = TempDir::new().unwrap();
    let addr = start_server(root.path(), |config| {
        config.users.insert("alice".to_string(), "wonderland".to_string());
    })
    .await;
    let (mut client, _, _) = FtpClient::connect(addr).await;

    assert_eq!(client.cmd("RETR x").await.0, 530);
    assert_eq!(client.cmd("PWD").await.0, 530);
    assert_eq!(client.cmd("PASS nobody").await.0, 503);

    assert_eq!(client.cmd("USER alice").await.0, 331);
    assert_eq!(client.cmd("PASS wrong").await.0, 530);
    // A failed PASS starts over
    assert_eq!(client.cmd("PASS wonderland").await.0, 503);

    assert_eq!(client.cmd("USER alice").await.0, 331);
    assert_eq!(client.cmd("PASS wonderland").await.0, 230);
    assert_eq!(client.cmd("USER bob").await.0, 503);
    assert_eq!(client.cmd("PWD").await.0, 257);
}

#[tokio::test(flavor = "multi_thread")]
async fn anonymous_login_can_be_disabled() {
    let root = TempDir::new().unwrap();
    let addr = start_server(root.path(), |config| config.allow_anonymous = false).await;
    let (mut client, _, _) = FtpClient::connect(addr).await;

    assert_eq!(client.cmd("USER anonymous").await.0, 530);
    assert_eq!(client.cmd("PASS x@y").await.0, 503);
}

#[tokio::test(flavor = "multi_thread")]
async fn data_command_during_transfer_is_ignored() {
    let root = TempDir::new().unwrap();
    let addr = start_server(root.path(), |_| {}).await;
    let (mut client, _, _) = FtpClient::connect(addr).await;
    client.login_anonymous().await;

    let data_addr = client.pasv().await;
    assert_eq!(client.cmd("STOR slow.bin").await.0, 150);

    // No reply for the second data command; the next reply belongs to NOOP
    client.send("LIST").await;
    assert_eq!(client.cmd("NOOP").await.0, 200);
    assert_eq!(client.cmd("PASV").await.0, 503);

    let mut data = TcpStream::connect(data_addr).await.unwrap();
    data.write_all(b"late data").await.unwrap();
    data.shutdown().await.unwrap();
    drop(data);
    assert_eq!(client.reply().await.0, 226);
    assert_eq!(std::fs::read(root.path().join("slow.bin")).unwrap(), b"late data");
}

#[tokio::test(flavor = "multi_thread")]
async fn abort_replies_depend_on_transfer_state() {
    let root = TempDir::new().unwrap();
    let addr = start_server(root.path(), |_| {}).await;
    let (mut client, _, _) = FtpClient::connect(addr).await;
    client.login_anonymous().await;

    assert_eq!(client.cmd("ABOR").await.0, 225);

    client.pasv().await;
    assert_eq!(client.cmd("STOR never.bin").await.0, 150);
    assert_eq!(client.cmd("ABOR").await.0, 226);

    // The aborted worker sends nothing more; a new data mode is needed
    assert_eq!(client.cmd("NOOP").await.0, 200);
    assert_eq!(client.cmd("LIST").await.0, 425);
    client.pasv().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn directory_commands_keep_working_directory_consistent() {
    let root = TempDir::new().unwrap();
    let addr = start_server(root.path(), |_| {}).await;
    let (mut client, _, _) = FtpClient::connect(addr).await;
    client.login_anonymous().await;

    assert_eq!(client.cmd("MKD a").await.0, 250);
    assert_eq!(client.cmd("CWD a").await.0, 250);
    assert_eq!(client.cmd("MKD b").await.0, 250);
    assert_eq!(client.cmd("CWD b").await.0, 250);
    assert!(root.path().join("a/b").is_dir());

    // Renaming an ancestor moves the working directory with it
    assert_eq!(client.cmd("RNFR /a").await.0, 250);
    assert_eq!(client.cmd("RNTO /c").await.0, 250);
    assert_eq!(client.cmd("PWD").await.1, "\"/c/b\" is the current directory.");

    // Removing the working directory moves to its parent
    assert_eq!(client.cmd("RMD /c/b").await.0, 250);
    assert_eq!(client.cmd("PWD").await.1, "\"/c\" is the current directory.");

    assert_eq!(client.cmd("CDUP").await.0, 250);
    assert_eq!(client.cmd("CWD ../../..").await.0, 250);
    assert_eq!(client.cmd("PWD").await.1, "\"/\" is the current directory.");

    assert_eq!(client.cmd("CWD missing").await.0, 550);
    assert_eq!(client.cmd("RNTO /d").await.0, 503);
    assert_eq!(client.cmd("RNFR missing").await.0, 550);
    assert_eq!(client.cmd("RMD /").await.0, 550);
}

#[tokio::test(flavor = "multi_thread")]
async fn file_commands_report_errors() {
    let root = TempDir::new().unwrap();
    std::fs::write(root.path().join("gone.txt"), b"x").unwrap();
    let addr = start_server(root.path(), |_| {}).await;
    let (mut client, _, _) = FtpClient::connect(addr).await;
    client.login_anonymous().await;

    assert_eq!(client.cmd("DELE gone.txt").await.0, 250);
    assert!(!root.path().join("gone.txt").exists());
    assert_eq!(client.cmd("DELE gone.txt").await.0, 550);

    assert_eq!(client.cmd("MKD bad name").await.0, 553);
    assert_eq!(client.cmd("CWD bad*").await.0, 550);

    client.pasv().await;
    assert_eq!(client.cmd("RETR missing.txt").await.0, 550);
    assert_eq!(client.cmd("STOR no space.txt").await.0, 553);
}

#[tokio::test(flavor = "multi_thread")]
async fn control_line_errors() {
    let root = TempDir::new().unwrap();
    let addr = start_server(root.path(), |_| {}).await;
    let (mut client, _, _) = FtpClient::connect(addr).await;

    assert_eq!(
        client.cmd("FEAT").await,
        (202, "Unknown command \"FEAT\".".to_string())
    );
    assert_eq!(client.cmd("USER1 x").await.0, 500);
    assert_eq!(client.cmd("").await.0, 500);

    let long = format!("USER {}", "a".repeat(2000));
    assert_eq!(client.cmd(&long).await.0, 500);
    // The session survives an oversized line
    assert_eq!(client.cmd("NOOP").await.0, 200);

    assert_eq!(client.cmd("TYPE A").await.0, 504);
    client.login_anonymous().await;
    assert_eq!(client.cmd("PORT 1,2,3").await.0, 501);
    assert_eq!(client.cmd("PORT 127,0,0,1,300,1").await.0, 501);
}

#[tokio::test(flavor = "multi_thread")]
async fn multi_line_greeting() {
    let root = TempDir::new().unwrap();
    let addr = start_server(root.path(), |config| {
        config.greeting = "Welcome\nto rax".to_string();
    })
    .await;
    let (_, code, text) = FtpClient::connect(addr).await;
    assert_eq!(code, 220);
    assert_eq!(text, "Welcome\nto rax");
}

#[tokio::test(flavor = "multi_thread")]
async fn disconnect_mid_transfer_closes_session() {
    let root = TempDir::new().unwrap();
    let addr = start_server(root.path(), |_| {}).await;
    let (mut client, _, _) = FtpClient::connect(addr).await;
    client.login_anonymous().await;
    client.pasv().await;
    assert_eq!(client.cmd("STOR orphan.bin").await.0, 150);
    drop(client);

    // The server keeps accepting new sessions
    let (mut other, code, _) = FtpClient::connect(addr).await;
    assert_eq!(code, 220);
    assert_eq!(other.cmd("NOOP").await.0, 200);
}

// Large enough that the worker is still streaming while the client stalls
const LARGE_FILE: usize = 32 * 1024 * 1024;

#[tokio::test(flavor = "multi_thread")]
async fn abort_cancels_a_streaming_download() {
    let root = TempDir::new().unwrap();
    std::fs::write(root.path().join("large.bin"), vec![7u8; LARGE_FILE]).unwrap();
    let addr = start_server(root.path(), |_| {}).await;
    let (mut client, _, _) = FtpClient::connect(addr).await;
    client.login_anonymous().await;

    let data_addr = client.pasv().await;
    let mut data = TcpStream::connect(data_addr).await.unwrap();
    assert_eq!(client.cmd("RETR large.bin").await.0, 150);

    let mut block = [0u8; 1024];
    timeout(WAIT, data.read_exact(&mut block)).await.unwrap().unwrap();
    assert_eq!(block, [7u8; 1024]);

    assert_eq!(client.cmd("ABOR").await, (226, "Transfer aborted.".to_string()));
    // The cancelled worker adds no 226 of its own
    assert_eq!(client.cmd("NOOP").await.0, 200);
    client.pasv().await;
    drop(data);
}

#[tokio::test(flavor = "multi_thread")]
async fn closed_data_connection_reports_local_error() {
    let root = TempDir::new().unwrap();
    std::fs::write(root.path().join("large.bin"), vec![7u8; LARGE_FILE]).unwrap();
    let addr = start_server(root.path(), |_| {}).await;
    let (mut client, _, _) = FtpClient::connect(addr).await;
    client.login_anonymous().await;

    let data_addr = client.pasv().await;
    let mut data = TcpStream::connect(data_addr).await.unwrap();
    assert_eq!(client.cmd("RETR large.bin").await.0, 150);

    let mut block = [0u8; 1024];
    timeout(WAIT, data.read_exact(&mut block)).await.unwrap().unwrap();
    // Dropping with unread data resets the connection
    drop(data);

    assert_eq!(
        client.reply().await,
        (451, "Transfer aborted by internal I/O error.".to_string())
    );
    assert_eq!(client.cmd("LIST").await.0, 425);
}

#[tokio::test(flavor = "multi_thread")]
async fn login_failures_are_delayed() {
    let root = TempDir::new().unwrap();
    let addr = start_server(root.path(), |config| {
        config.auth_failure_delay_ms = 200;
        config.users.insert("alice".to_string(), "wonderland".to_string());
    })
    .await;
    let (mut client, _, _) = FtpClient::connect(addr).await;
    let delay = Duration::from_millis(200);

    let started = Instant::now();
    assert_eq!(client.cmd("PASS early").await.0, 503);
    assert!(started.elapsed() < delay, "503 was delayed: {:?}", started.elapsed());

    let started = Instant::now();
    assert_eq!(client.cmd(&format!("USER {}", "u".repeat(100))).await.0, 501);
    assert!(started.elapsed() < delay, "501 was delayed: {:?}", started.elapsed());

    assert_eq!(client.cmd("USER alice").await.0, 331);
    let started = Instant::now();
    assert_eq!(client.cmd("PASS wrong").await.0, 530);
    assert!(started.elapsed() >= delay, "530 came after {:?}", started.elapsed());

    assert_eq!(client.cmd("USER alice").await.0, 331);
    assert_eq!(client.cmd("PASS wonderland").await.0, 230);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_rename_from_drops_the_staged_source() {
    let root = TempDir::new().unwrap();
    std::fs::write(root.path().join("keep.txt"), b"x").unwrap();
    let addr = start_server(root.path(), |_| {}).await;
    let (mut client, _, _) = FtpClient::connect(addr).await;
    client.login_anonymous().await;

    assert_eq!(client.cmd("RNFR keep.txt").await.0, 250);
    assert_eq!(client.cmd("RNFR missing.txt").await.0, 550);
    assert_eq!(client.cmd("RNTO moved.txt").await.0, 503);
    assert!(root.path().join("keep.txt").exists());
    assert!(!root.path().join("moved.txt").exists());
}
