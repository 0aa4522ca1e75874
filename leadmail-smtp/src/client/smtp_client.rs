//! SMTP client connection with implicit TLS, STARTTLS and AUTH.

use base64::{Engine, engine::general_purpose::STANDARD};
use leadmail_common::{Security, incoming, outgoing, tls};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};

use super::{
    error::{ClientError, Result},
    response::Response,
};

/// Initial size of the read buffer for SMTP responses.
const BUFFER_SIZE: usize = 8192;

/// Maximum size of the read buffer to prevent unbounded growth (1MB).
const MAX_BUFFER_SIZE: usize = 1024 * 1024;

/// A connection that is either plain TCP or TLS-wrapped.
enum ClientConnection {
    Plain(TcpStream),
    Tls(Box<tokio_rustls::client::TlsStream<TcpStream>>),
}

impl ClientConnection {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        match self {
            Self::Plain(stream) => stream.write_all(data).await?,
            Self::Tls(stream) => stream.write_all(data).await?,
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        match self {
            Self::Plain(stream) => stream.flush().await?,
            Self::Tls(stream) => stream.flush().await?,
        }
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = match self {
            Self::Plain(stream) => stream.read(buf).await?,
            Self::Tls(stream) => stream.read(buf).await?,
        };
        if n == 0 {
            return Err(ClientError::ConnectionClosed);
        }
        Ok(n)
    }

    async fn wrap(stream: TcpStream, domain: &str, accept_invalid_certs: bool) -> Result<Self> {
        let connector = tls::connector(accept_invalid_certs).map_err(ClientError::TlsError)?;
        let server_name = tls::server_name(domain).map_err(ClientError::TlsError)?;

        let stream = connector
            .connect(server_name, stream)
            .await
            .map_err(|e| ClientError::TlsError(e.to_string()))?;

        Ok(Self::Tls(Box::new(stream)))
    }

    async fn upgrade_to_tls(self, domain: &str, accept_invalid_certs: bool) -> Result<Self> {
        match self {
            Self::Plain(stream) => Self::wrap(stream, domain, accept_invalid_certs).await,
            Self::Tls(_) => Err(ClientError::TlsError(
                "Connection is already TLS".to_string(),
            )),
        }
    }

    const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

/// An SMTP client for sending commands and receiving responses.
pub struct SmtpClient {
    connection: Option<ClientConnection>,
    buffer: Vec<u8>,
    buffer_pos: usize,
    server_domain: String,
    accept_invalid_certs: bool,
}

impl SmtpClient {
    /// Connects to `addr`, wrapping the socket in TLS straight away for
    /// [`Security::Implicit`].
    ///
    /// `server_domain` is the name presented for SNI and certificate checks.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP connection or the TLS handshake fails.
    pub async fn connect(addr: &str, server_domain: &str, security: Security) -> Result<Self> {
        Self::connect_with(addr, server_domain, security, false).await
    }

    /// As [`Self::connect`], optionally skipping certificate validation.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP connection or the TLS handshake fails.
    pub async fn connect_with(
        addr: &str,
        server_domain: &str,
        security: Security,
        accept_invalid_certs: bool,
    ) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;

        let connection = match security {
            Security::Implicit => {
                ClientConnection::wrap(stream, server_domain, accept_invalid_certs).await?
            }
            Security::StartTls | Security::None => ClientConnection::Plain(stream),
        };

        Ok(Self {
            connection: Some(connection),
            buffer: vec![0u8; BUFFER_SIZE],
            buffer_pos: 0,
            server_domain: server_domain.to_string(),
            accept_invalid_certs,
        })
    }

    /// Whether the connection is currently encrypted.
    #[must_use]
    pub fn is_tls(&self) -> bool {
        self.connection.as_ref().is_some_and(ClientConnection::is_tls)
    }

    /// Reads the initial server greeting (220 response).
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails or the greeting is malformed.
    pub async fn read_greeting(&mut self) -> Result<Response> {
        self.read_response().await
    }

    /// Sends a command line to the server.
    ///
    /// # Errors
    ///
    /// Returns an error if sending fails.
    pub async fn send_command(&mut self, command: &str) -> Result<()> {
        outgoing!("{}", redact(command));
        let data = format!("{command}\r\n");
        let connection = self
            .connection
            .as_mut()
            .ok_or(ClientError::ConnectionClosed)?;
        connection.send(data.as_bytes()).await?;
        connection.flush().await
    }

    /// Sends a raw command and reads the response.
    ///
    /// # Errors
    ///
    /// Returns an error if sending or reading fails.
    pub async fn command(&mut self, command: &str) -> Result<Response> {
        self.send_command(command).await?;
        self.read_response().await
    }

    /// Sends EHLO with the specified domain.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn ehlo(&mut self, domain: &str) -> Result<Response> {
        self.command(&format!("EHLO {domain}")).await
    }

    /// Sends STARTTLS and upgrades the connection when the server agrees.
    ///
    /// # Errors
    ///
    /// Returns an error if the server refuses or the handshake fails.
    pub async fn starttls(&mut self) -> Result<Response> {
        let response = self.command("STARTTLS").await?.into_result()?;

        let old = self
            .connection
            .take()
            .ok_or(ClientError::ConnectionClosed)?;
        self.connection = Some(
            old.upgrade_to_tls(&self.server_domain, self.accept_invalid_certs)
                .await?,
        );
        // Anything buffered before the handshake belongs to the plaintext session.
        self.buffer_pos = 0;

        Ok(response)
    }

    /// Authenticates with `AUTH PLAIN` (RFC 4616).
    ///
    /// # Errors
    ///
    /// [`ClientError::SmtpError`] if the credentials are rejected.
    pub async fn auth_plain(&mut self, username: &str, password: &str) -> Result<Response> {
        let token = STANDARD.encode(format!("\0{username}\0{password}"));
        self.command(&format!("AUTH PLAIN {token}"))
            .await?
            .into_result()
    }

    /// Authenticates with `AUTH LOGIN`.
    ///
    /// # Errors
    ///
    /// [`ClientError::SmtpError`] if the server rejects any step.
    pub async fn auth_login(&mut self, username: &str, password: &str) -> Result<Response> {
        self.command("AUTH LOGIN").await?.into_result()?;
        self.command(&STANDARD.encode(username)).await?.into_result()?;
        self.command(&STANDARD.encode(password)).await?.into_result()
    }

    /// Sends MAIL FROM.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn mail_from(&mut self, from: &str) -> Result<Response> {
        self.command(&format!("MAIL FROM:<{from}>")).await
    }

    /// Sends RCPT TO.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn rcpt_to(&mut self, to: &str) -> Result<Response> {
        self.command(&format!("RCPT TO:<{to}>")).await
    }

    /// Sends DATA.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn data(&mut self) -> Result<Response> {
        self.command("DATA").await
    }

    /// Sends the message content, dot-stuffed, followed by the end-of-data marker.
    ///
    /// # Errors
    ///
    /// Returns an error if sending or reading the final reply fails.
    pub async fn send_data(&mut self, data: &str) -> Result<Response> {
        let payload = dot_stuff(data);
        outgoing!("<{} bytes of message data>", payload.len());

        let connection = self
            .connection
            .as_mut()
            .ok_or(ClientError::ConnectionClosed)?;
        connection.send(payload.as_bytes()).await?;
        connection.send(b".\r\n").await?;
        connection.flush().await?;

        self.read_response().await
    }

    /// Sends QUIT.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn quit(&mut self) -> Result<Response> {
        self.command("QUIT").await
    }

    /// Reads a complete SMTP response from the server.
    async fn read_response(&mut self) -> Result<Response> {
        loop {
            if let Some((response, consumed)) =
                Response::parse_response(&self.buffer[..self.buffer_pos])?
            {
                self.buffer.copy_within(consumed..self.buffer_pos, 0);
                self.buffer_pos -= consumed;

                incoming!("{} {}", response.code, response.message());
                return Ok(response);
            }

            if self.buffer_pos >= self.buffer.len() {
                let new_size = self.buffer.len() * 2;
                if new_size > MAX_BUFFER_SIZE {
                    return Err(ClientError::ParseError(format!(
                        "Response too large (exceeds {MAX_BUFFER_SIZE} bytes)"
                    )));
                }
                self.buffer.resize(new_size, 0);
            }

            let connection = self
                .connection
                .as_mut()
                .ok_or(ClientError::ConnectionClosed)?;
            let n = connection.read(&mut self.buffer[self.buffer_pos..]).await?;
            self.buffer_pos += n;
        }
    }
}

/// Normalises line endings to CRLF, doubles leading dots (RFC 5321 4.5.2) and
/// guarantees a trailing CRLF.
fn dot_stuff(data: &str) -> String {
    let mut out = String::with_capacity(data.len() + 64);
    for line in data.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.starts_with('.') {
            out.push('.');
        }
        out.push_str(line);
        out.push_str("\r\n");
    }

    // `split` yields a trailing empty piece when `data` ends with a newline.
    if data.ends_with('\n') {
        out.truncate(out.len() - 2);
    }

    out
}

/// Keeps credentials out of the trace log.
fn redact(command: &str) -> &str {
    if command.starts_with("AUTH ") {
        "AUTH <redacted>"
    } else if command.contains(' ') || command.len() < 4 || command.contains(':') {
        command
    } else if command
        .chars()
        .all(|c| c.is_ascii_uppercase())
    {
        // Plain verbs like DATA, QUIT, STARTTLS.
        command
    } else {
        // Bare base64 lines during AUTH LOGIN.
        "<redacted>"
    }
}
