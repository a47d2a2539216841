//! Test helpers for SMTP integration tests.
//!
//! Provides TestClient, TestServer, and helper functions for end-to-end
//! testing against an in-memory store and database.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use junkmail::config::SmtpConfig;
use junkmail::{
    Database, MemoryStore, Retention, RetentionPolicy, SessionSettings, SmtpServer, StorageEngine,
};

/// Default timeout for test operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Domain the test server announces.
pub const TEST_DOMAIN: &str = "junk.test";

/// Test client speaking SMTP to the server.
pub struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    /// Connect to the server at the given address.
    pub async fn connect(addr: SocketAddr) -> Result<Self, std::io::Error> {
        let stream = TcpStream::connect(addr).await?;
        let (read, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read),
            writer,
        })
    }

    /// Send raw bytes to the server.
    pub async fn send_raw(&mut self, data: &[u8]) -> Result<(), std::io::Error> {
        self.writer.write_all(data).await?;
        self.writer.flush().await
    }

    /// Send a line (with CRLF) to the server.
    pub async fn send_line(&mut self, line: &str) -> Result<(), std::io::Error> {
        self.send_raw(format!("{line}\r\n").as_bytes()).await
    }

    /// Receive one complete reply, following continuation lines.
    pub async fn recv_reply(&mut self) -> Result<String, std::io::Error> {
        let mut reply = String::new();
        loop {
            let mut line = String::new();
            let n = timeout(DEFAULT_TIMEOUT, self.reader.read_line(&mut line))
                .await
                .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "no reply"))??;
            if n == 0 {
                return Ok(reply);
            }
            reply.push_str(&line);
            if line.len() < 4 || line.as_bytes()[3] != b'-' {
                return Ok(reply);
            }
        }
    }

    /// Send a command and return the reply.
    pub async fn command(&mut self, line: &str) -> Result<String, std::io::Error> {
        self.send_line(line).await?;
        self.recv_reply().await
    }

    /// Read the banner and greet the server.
    pub async fn greet(&mut self) -> Result<String, std::io::Error> {
        let banner = self.recv_reply().await?;
        self.command("EHLO client.test").await?;
        Ok(banner)
    }

    /// Run a full transaction and return the final reply.
    pub async fn send_message(
        &mut self,
        from: &str,
        rcpts: &[&str],
        message: &str,
    ) -> Result<String, std::io::Error> {
        self.command(&format!("MAIL FROM:<{from}>")).await?;
        for rcpt in rcpts {
            self.command(&format!("RCPT TO:<{rcpt}>")).await?;
        }
        let go_ahead = self.command("DATA").await?;
        assert!(go_ahead.starts_with("354"), "unexpected DATA reply: {go_ahead}");

        let mut body = String::new();
        for line in message.lines() {
            if line.starts_with('.') {
                body.push('.');
            }
            body.push_str(line);
            body.push_str("\r\n");
        }
        body.push_str(".\r\n");
        self.send_raw(body.as_bytes()).await?;
        self.recv_reply().await
    }

    /// Close the connection from the client side.
    pub async fn close(mut self) {
        let _ = self.writer.shutdown().await;
    }
}

/// A running SMTP server backed by in-memory storage.
pub struct TestServer {
    pub addr: SocketAddr,
    pub engine: Arc<StorageEngine<MemoryStore>>,
    handle: JoinHandle<junkmail::Result<()>>,
}

impl TestServer {
    /// Start a server with default limits.
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    /// Start a server after adjusting the SMTP configuration.
    pub async fn start_with(adjust: impl FnOnce(&mut SmtpConfig)) -> Self {
        let mut config = SmtpConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            domain: TEST_DOMAIN.to_string(),
            read_timeout_secs: 5,
            ..SmtpConfig::default()
        };
        adjust(&mut config);

        let engine = Arc::new(create_engine(3600).await);
        let server = SmtpServer::bind(&config).await.unwrap();
        let addr = server.local_addr().unwrap();
        let handle = tokio::spawn(server.serve(engine.clone(), SessionSettings::from_config(&config)));

        Self {
            addr,
            engine,
            handle,
        }
    }

    /// Connect a new client.
    pub async fn connect(&self) -> TestClient {
        TestClient::connect(self.addr).await.unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Create a storage engine over an in-memory store and database.
pub async fn create_engine(retention_secs: u64) -> StorageEngine<MemoryStore> {
    let db = Database::open_in_memory().await.unwrap();
    let retention = RetentionPolicy::load(db.clone(), Retention::new(retention_secs).unwrap())
        .await
        .unwrap();
    StorageEngine::new(MemoryStore::new(), db, Arc::new(retention), true)
}

/// A plain-text message to the given recipients.
pub fn simple_message(to: &[&str], subject: &str, body: &str) -> String {
    format!(
        "From: Sender <sender@example.com>\nTo: {}\nSubject: {subject}\n\n{body}\n",
        to.join(", ")
    )
}

/// Extract the queued id from a `250 ... queued as <id>` reply.
pub fn queued_id(reply: &str) -> String {
    reply
        .trim_end()
        .rsplit(' ')
        .next()
        .unwrap_or_default()
        .to_string()
}
