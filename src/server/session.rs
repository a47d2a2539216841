//! SMTP session handling.
//!
//! One session serves one connection. Bytes read from the socket are fed
//! through `smtp-proto` receivers: a request receiver while waiting for
//! commands, a data receiver (which strips the terminator and undoes dot
//! stuffing) during DATA, and dummy receivers that discard an oversized
//! message or command line. Transactions run strictly one after another.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use smtp_proto::request::receiver::{
    DataReceiver, DummyDataReceiver, DummyLineReceiver, RequestReceiver,
};
use smtp_proto::{Error as ProtoError, Request};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::reply::Reply;
use crate::config::SmtpConfig;
use crate::mail::decode_message;
use crate::storage::StorageEngine;
use crate::store::EphemeralStore;
use crate::{JunkmailError, Result};

/// Bytes requested from the socket per read.
pub const READ_BUFFER_SIZE: usize = 8192;

/// Per-connection limits and identity.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Domain announced in the banner and EHLO reply.
    pub domain: String,
    /// Time allowed for each socket read.
    pub read_timeout: Duration,
    /// Largest accepted message in bytes.
    pub max_message_size: usize,
}

impl SessionSettings {
    /// Build settings from the SMTP configuration.
    pub fn from_config(config: &SmtpConfig) -> Self {
        Self {
            domain: config.domain.clone(),
            read_timeout: Duration::from_secs(config.read_timeout_secs),
            max_message_size: config.max_message_size,
        }
    }
}

/// Sender of the transaction in progress and how many recipients it named.
///
/// Envelope recipients are accepted but never used for delivery, which goes
/// by the message's own `To` header, so only their number is kept.
#[derive(Debug, Default)]
struct Envelope {
    mail_from: Option<String>,
    recipients: usize,
}

impl Envelope {
    fn reset(&mut self) {
        *self = Self::default();
    }
}

enum State {
    Request(RequestReceiver),
    Data(DataReceiver),
    DataTooLarge(DummyDataReceiver),
    RequestTooLarge(DummyLineReceiver),
}

impl Default for State {
    fn default() -> Self {
        State::Request(RequestReceiver::default())
    }
}

enum Flow {
    Continue,
    Close,
}

/// What a command asks of the receive loop.
enum Next {
    Command,
    Data,
    Close,
}

/// An SMTP session for one connected client.
pub struct SmtpSession<S> {
    id: Uuid,
    peer_addr: SocketAddr,
    engine: Arc<StorageEngine<S>>,
    settings: Arc<SessionSettings>,
    greeted: bool,
    envelope: Envelope,
    state: State,
    message: Vec<u8>,
}

impl<S: EphemeralStore> SmtpSession<S> {
    /// Create a session for a newly accepted client.
    pub fn new(
        engine: Arc<StorageEngine<S>>,
        settings: Arc<SessionSettings>,
        peer_addr: SocketAddr,
    ) -> Self {
        let id = Uuid::new_v4();
        debug!("Created SMTP session {} for {}", id, peer_addr);

        Self {
            id,
            peer_addr,
            engine,
            settings,
            greeted: false,
            envelope: Envelope::default(),
            state: State::default(),
            message: Vec::new(),
        }
    }

    /// Session identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Remote peer address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Serve the connection until the client quits, disconnects or times out.
    pub async fn run<T>(mut self, mut stream: T) -> Result<()>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let banner = Reply::new(220, format!("{} ESMTP Junk-Mail", self.settings.domain));
        send(&mut stream, &banner).await?;

        let mut buf = vec![0; READ_BUFFER_SIZE];
        loop {
            let read = match timeout(self.settings.read_timeout, stream.read(&mut buf)).await {
                Ok(read) => read?,
                Err(_) => {
                    self.timed_out(&mut stream).await?;
                    break;
                }
            };

            if read == 0 {
                if matches!(self.state, State::Data(_) | State::DataTooLarge(_)) {
                    debug!("SMTP session {}: client left during DATA", self.id);
                }
                break;
            }

            if let Flow::Close = self.ingest(&buf[..read], &mut stream).await? {
                break;
            }
        }

        debug!("SMTP session {} for {} ended", self.id, self.peer_addr);
        Ok(())
    }

    /// Feed one read's worth of bytes through the current receiver, replying
    /// to every complete command or message it yields.
    async fn ingest<W>(&mut self, bytes: &[u8], writer: &mut W) -> Result<Flow>
    where
        W: AsyncWrite + Unpin,
    {
        let mut iter = bytes.iter();
        let mut state = std::mem::take(&mut self.state);

        let flow = loop {
            match &mut state {
                State::Request(receiver) => match receiver.ingest(&mut iter).map(Request::into_owned) {
                    Ok(request) => match self.handle(request, writer).await? {
                        Next::Command => {}
                        Next::Data => {
                            self.message.clear();
                            state = State::Data(DataReceiver::new());
                        }
                        Next::Close => break Flow::Close,
                    },
                    Err(ProtoError::NeedsMoreData { .. }) => break Flow::Continue,
                    Err(ProtoError::ResponseTooLong) => {
                        state = State::RequestTooLarge(DummyLineReceiver::default());
                    }
                    Err(err) => send(writer, &rejection(err)).await?,
                },
                State::Data(receiver) => {
                    let complete = receiver.ingest(&mut iter, &mut self.message);
                    if self.message.len() > self.settings.max_message_size {
                        self.message = Vec::new();
                        if complete {
                            self.refuse_oversized(writer).await?;
                            state = State::default();
                        } else {
                            state = State::DataTooLarge(DummyDataReceiver::new_data(receiver));
                        }
                    } else if complete {
                        let reply = self.deliver().await;
                        self.message = Vec::new();
                        self.envelope.reset();
                        send(writer, &reply).await?;
                        state = State::default();
                    } else {
                        break Flow::Continue;
                    }
                }
                State::DataTooLarge(receiver) => {
                    if receiver.ingest(&mut iter) {
                        self.refuse_oversized(writer).await?;
                        state = State::default();
                    } else {
                        break Flow::Continue;
                    }
                }
                State::RequestTooLarge(receiver) => {
                    if receiver.ingest(&mut iter) {
                        send(writer, &Reply::new(500, "5.5.2 Error: line too long")).await?;
                        state = State::default();
                    } else {
                        break Flow::Continue;
                    }
                }
            }
        };

        self.state = state;
        Ok(flow)
    }

    async fn handle<W>(&mut self, request: Request<String>, writer: &mut W) -> Result<Next>
    where
        W: AsyncWrite + Unpin,
    {
        let reply = match request {
            Request::Helo { host } => {
                debug!("SMTP session {}: HELO {}", self.id, host);
                self.greeted = true;
                self.envelope.reset();
                Reply::new(250, self.settings.domain.clone())
            }
            Request::Ehlo { host } => {
                debug!("SMTP session {}: EHLO {}", self.id, host);
                self.greeted = true;
                self.envelope.reset();
                Reply::multiline(
                    250,
                    vec![
                        self.settings.domain.clone(),
                        format!("SIZE {}", self.settings.max_message_size),
                        "8BITMIME".to_string(),
                        "PIPELINING".to_string(),
                    ],
                )
            }
            Request::Mail { from } => self.mail_from(from.address, from.size),
            Request::Rcpt { to } => self.rcpt_to(&to.address),
            Request::Data => match self.data_refusal() {
                Some(reply) => reply,
                None => {
                    send(writer, &Reply::new(354, "End data with <CR><LF>.<CR><LF>")).await?;
                    return Ok(Next::Data);
                }
            },
            Request::Rset => {
                self.envelope.reset();
                Reply::new(250, "2.0.0 Ok")
            }
            Request::Noop { .. } => Reply::new(250, "2.0.0 Ok"),
            Request::Vrfy { .. } => {
                Reply::new(252, "2.0.0 Cannot VRFY user, but will accept message")
            }
            Request::Help { .. } => Reply::new(
                214,
                "2.0.0 Commands: HELO EHLO MAIL RCPT DATA RSET NOOP VRFY HELP QUIT",
            ),
            Request::Quit => {
                send(writer, &Reply::new(221, "2.0.0 Bye")).await?;
                return Ok(Next::Close);
            }
            _ => Reply::new(502, "5.5.1 Error: command not implemented"),
        };

        send(writer, &reply).await?;
        Ok(Next::Command)
    }

    fn mail_from(&mut self, from: String, size: usize) -> Reply {
        if !self.greeted {
            return Reply::new(503, "5.5.1 Error: send HELO/EHLO first");
        }
        if self.envelope.mail_from.is_some() {
            return Reply::new(503, "5.5.1 Error: nested MAIL command");
        }
        if size > self.settings.max_message_size {
            return Reply::new(552, "5.3.4 Message size exceeds fixed limit");
        }

        info!("SMTP session {}: MAIL FROM: <{}>", self.id, from);
        self.envelope.mail_from = Some(from);
        Reply::new(250, "2.1.0 Ok")
    }

    fn rcpt_to(&mut self, to: &str) -> Reply {
        if self.envelope.mail_from.is_none() {
            return Reply::new(503, "5.5.1 Error: need MAIL command");
        }

        info!("SMTP session {}: RCPT TO: <{}>", self.id, to);
        self.envelope.recipients += 1;
        Reply::new(250, "2.1.5 Ok")
    }

    fn data_refusal(&self) -> Option<Reply> {
        if self.envelope.mail_from.is_none() {
            Some(Reply::new(503, "5.5.1 Error: need MAIL command"))
        } else if self.envelope.recipients == 0 {
            Some(Reply::new(503, "5.5.1 Error: need RCPT command"))
        } else {
            None
        }
    }

    async fn refuse_oversized<W: AsyncWrite + Unpin>(&mut self, writer: &mut W) -> Result<()> {
        warn!(
            "SMTP session {}: message over {} bytes rejected",
            self.id, self.settings.max_message_size
        );
        self.envelope.reset();
        send(writer, &Reply::new(552, "5.3.4 Message size exceeds fixed limit")).await
    }

    async fn deliver(&self) -> Reply {
        let stored = async {
            let email = decode_message(&self.message)?;
            self.engine.store_email(&email).await?;
            Ok::<_, JunkmailError>(email)
        }
        .await;

        match stored {
            Ok(email) => {
                let recipients: Vec<&str> = email.recipients().collect();
                info!(
                    "Email received: {} | From: {} | To: {}",
                    email.id,
                    email.from.address,
                    recipients.join(", ")
                );
                Reply::new(250, format!("2.0.0 Ok: queued as {}", email.id))
            }
            Err(e @ JunkmailError::Decode(_)) => {
                warn!("SMTP session {}: rejected message: {}", self.id, e);
                Reply::new(451, "4.3.0 Failed to process email")
            }
            Err(e) => {
                error!("SMTP session {}: failed to store message: {}", self.id, e);
                Reply::new(451, "4.3.0 Failed to process email")
            }
        }
    }

    async fn timed_out<W: AsyncWrite + Unpin>(&self, writer: &mut W) -> Result<()> {
        info!("SMTP session {} for {} timed out", self.id, self.peer_addr);
        let reply = Reply::new(
            421,
            format!("4.4.2 {} Error: timeout exceeded", self.settings.domain),
        );
        send(writer, &reply).await
    }
}

/// Reply for a command line the request parser refused.
fn rejection(err: ProtoError) -> Reply {
    match err {
        ProtoError::InvalidSenderAddress => Reply::new(501, "5.1.7 Bad sender address syntax"),
        ProtoError::InvalidRecipientAddress => {
            Reply::new(501, "5.1.3 Bad recipient address syntax")
        }
        ProtoError::SyntaxError { syntax } => Reply::new(501, format!("5.5.4 Syntax: {syntax}")),
        ProtoError::InvalidParameter { param } => {
            Reply::new(501, format!("5.5.4 Invalid parameter {param:?}"))
        }
        ProtoError::UnsupportedParameter { param } => {
            Reply::new(504, format!("5.5.4 Unsupported parameter {param:?}"))
        }
        _ => Reply::new(500, "5.5.2 Error: command not recognized"),
    }
}

async fn send<W: AsyncWrite + Unpin>(writer: &mut W, reply: &Reply) -> Result<()> {
    writer.write_all(reply.to_wire().as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}
