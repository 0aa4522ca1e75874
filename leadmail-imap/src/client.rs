//! A small IMAP4rev1 client: tagged commands, untagged data, quoted strings.

use leadmail_common::{Security, incoming, outgoing, tls};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader},
    net::TcpStream,
};

use crate::ImapError;

/// Longest response line accepted before the server is considered broken.
const MAX_LINE: usize = 64 * 1024;

trait ImapStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> ImapStream for T {}

/// The completion of one tagged command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedResponse {
    /// Untagged lines received before completion, without the leading `* `.
    pub untagged: Vec<String>,
    /// `OK`, `NO` or `BAD`.
    pub status: String,
    pub text: String,
}

impl TaggedResponse {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("OK")
    }
}

pub struct ImapClient {
    stream: BufReader<Box<dyn ImapStream>>,
    next_tag: u32,
}

impl ImapClient {
    /// Connects and reads the server greeting.
    ///
    /// # Errors
    ///
    /// Connection, TLS or greeting failures. A `* BYE` greeting is rejected.
    pub async fn connect(
        addr: &str,
        server_name: &str,
        security: Security,
        accept_invalid_certs: bool,
    ) -> Result<Self, ImapError> {
        let tcp = TcpStream::connect(addr).await?;

        let stream: Box<dyn ImapStream> = match security {
            Security::Implicit => {
                let connector = tls::connector(accept_invalid_certs).map_err(ImapError::Tls)?;
                let name = tls::server_name(server_name).map_err(ImapError::Tls)?;
                let tls = connector
                    .connect(name, tcp)
                    .await
                    .map_err(|e| ImapError::Tls(e.to_string()))?;
                Box::new(tls)
            }
            Security::None => Box::new(tcp),
            Security::StartTls => {
                return Err(ImapError::Protocol(
                    "STARTTLS is not supported for IMAP; use Implicit TLS".to_string(),
                ));
            }
        };

        let mut client = Self {
            stream: BufReader::new(stream),
            next_tag: 1,
        };

        let greeting = client.read_line().await?;
        if !greeting.starts_with("* OK") && !greeting.starts_with("* PREAUTH") {
            return Err(ImapError::Protocol(format!("unexpected greeting: {greeting}")));
        }

        Ok(client)
    }

    /// Sends `command` and collects everything up to its tagged completion.
    ///
    /// # Errors
    ///
    /// I/O failures and malformed responses. A `NO`/`BAD` completion is not an
    /// error here; see [`Self::expect_ok`].
    pub async fn command(&mut self, command: &str) -> Result<TaggedResponse, ImapError> {
        let tag = format!("A{:04}", self.next_tag);
        self.next_tag += 1;

        outgoing!("{tag} {}", redact(command));
        self.stream
            .write_all(format!("{tag} {command}\r\n").as_bytes())
            .await?;
        self.stream.flush().await?;

        let mut untagged = Vec::new();
        loop {
            let line = self.read_line().await?;

            if let Some(rest) = line.strip_prefix("* ") {
                untagged.push(rest.to_string());
            } else if let Some(rest) = line.strip_prefix(&tag) {
                let rest = rest.trim_start();
                let (status, text) = rest.split_once(' ').unwrap_or((rest, ""));
                return Ok(TaggedResponse {
                    untagged,
                    status: status.to_ascii_uppercase(),
                    text: text.to_string(),
                });
            } else if line.starts_with('+') {
                return Err(ImapError::Protocol(
                    "unexpected continuation request".to_string(),
                ));
            }
            // Anything else is ignorable noise.
        }
    }

    /// As [`Self::command`], turning `NO`/`BAD` into [`ImapError::Rejected`].
    ///
    /// # Errors
    ///
    /// As [`Self::command`], plus the rejection.
    pub async fn expect_ok(&mut self, command: &str) -> Result<TaggedResponse, ImapError> {
        let response = self.command(command).await?;
        if response.is_ok() {
            Ok(response)
        } else {
            let verb = command.split_whitespace().next().unwrap_or(command);
            Err(ImapError::Rejected {
                command: verb.to_string(),
                message: format!("{} {}", response.status, response.text),
            })
        }
    }

    /// # Errors
    ///
    /// [`ImapError::Rejected`] for bad credentials.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<(), ImapError> {
        self.expect_ok(&format!("LOGIN {} {}", quote(username), quote(password)))
            .await
            .map(|_| ())
    }

    /// Opens `mailbox` read-write.
    ///
    /// # Errors
    ///
    /// [`ImapError::Rejected`] if the mailbox does not exist.
    pub async fn select(&mut self, mailbox: &str) -> Result<(), ImapError> {
        self.expect_ok(&format!("SELECT {}", quote(mailbox)))
            .await
            .map(|_| ())
    }

    /// Sequence numbers of messages in the selected mailbox sent from `address`.
    ///
    /// # Errors
    ///
    /// [`ImapError::Rejected`] if the server refuses the search.
    pub async fn search_from(&mut self, address: &str) -> Result<Vec<u32>, ImapError> {
        let response = self
            .expect_ok(&format!("SEARCH FROM {}", quote(address)))
            .await?;

        Ok(response
            .untagged
            .iter()
            .filter_map(|line| {
                let (keyword, rest) = line.split_once(' ').unwrap_or((line.as_str(), ""));
                keyword.eq_ignore_ascii_case("SEARCH").then_some(rest)
            })
            .flat_map(str::split_whitespace)
            .filter_map(|n| n.parse().ok())
            .collect())
    }

    /// # Errors
    ///
    /// I/O failures while saying goodbye.
    pub async fn logout(&mut self) -> Result<(), ImapError> {
        self.command("LOGOUT").await.map(|_| ())
    }

    async fn read_line(&mut self) -> Result<String, ImapError> {
        let mut buf = Vec::new();
        let n = (&mut self.stream)
            .take(MAX_LINE as u64)
            .read_until(b'\n', &mut buf)
            .await?;
        if n == 0 {
            return Err(ImapError::ConnectionClosed);
        }
        if !buf.ends_with(b"\n") {
            return Err(ImapError::Protocol(format!(
                "response line exceeds {MAX_LINE} bytes"
            )));
        }

        let mut line = String::from_utf8_lossy(&buf).trim_end().to_string();

        // Literals ({n}) are inlined so callers only see whole lines.
        while let Some(len) = literal_length(&line) {
            let mut literal = vec![0u8; len];
            self.stream.read_exact(&mut literal).await?;
            line.push_str(&String::from_utf8_lossy(&literal));
            let mut rest = Vec::new();
            self.stream.read_until(b'\n', &mut rest).await?;
            line.push_str(String::from_utf8_lossy(&rest).trim_end());
        }

        incoming!("{line}");
        Ok(line)
    }
}

/// IMAP quoted string.
fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\') {
            out.push('\\');
        }
        if !matches!(c, '\r' | '\n') {
            out.push(c);
        }
    }
    out.push('"');
    out
}

fn literal_length(line: &str) -> Option<usize> {
    let open = line.strip_suffix('}')?.rfind('{')?;
    line[open + 1..line.len() - 1].parse().ok()
}

fn redact(command: &str) -> &str {
    if command.starts_with("LOGIN ") {
        "LOGIN <redacted>"
    } else {
        command
    }
}
