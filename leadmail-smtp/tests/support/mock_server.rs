//! Scriptable SMTP relay for delivery tests.
//!
//! Plaintext only; tests run the transport with `Security::None`.
#![allow(dead_code)]

use std::{
    fmt::Write,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    sync::RwLock,
    time::timeout,
};

/// A command seen by the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayCommand {
    Ehlo(String),
    Auth(String),
    AuthLine,
    MailFrom(String),
    RcptTo(String),
    Data,
    Message(String),
    Quit,
    StartTls,
    Other(String),
}

#[derive(Debug, Clone)]
struct Reply {
    code: u16,
    message: String,
}

impl Reply {
    fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        format!("{} {}\r\n", self.code, self.message).into_bytes()
    }
}

#[derive(Clone)]
struct RelayScript {
    greeting: Reply,
    capabilities: Vec<String>,
    auth: Reply,
    mail_from: Reply,
    rcpt_to: Reply,
    data: Reply,
    data_end: Reply,
    hang_on_command: Option<usize>,
}

impl Default for RelayScript {
    fn default() -> Self {
        Self {
            greeting: Reply::new(220, "Mock relay ready"),
            capabilities: vec!["mock.relay".to_string(), "AUTH PLAIN LOGIN".to_string()],
            auth: Reply::new(235, "Authentication successful"),
            mail_from: Reply::new(250, "OK"),
            rcpt_to: Reply::new(250, "OK"),
            data: Reply::new(354, "End data with <CR><LF>.<CR><LF>"),
            data_end: Reply::new(250, "OK: queued"),
            hang_on_command: None,
        }
    }
}

pub struct MockRelay {
    addr: SocketAddr,
    commands: Arc<RwLock<Vec<RelayCommand>>>,
    shutdown: Arc<AtomicBool>,
}

impl MockRelay {
    #[must_use]
    pub fn builder() -> MockRelayBuilder {
        MockRelayBuilder {
            script: RelayScript::default(),
        }
    }

    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn commands(&self) -> Vec<RelayCommand> {
        self.commands.read().await.clone()
    }

    /// Raw DATA payloads of every message accepted so far.
    pub async fn messages(&self) -> Vec<String> {
        self.commands
            .read()
            .await
            .iter()
            .filter_map(|c| match c {
                RelayCommand::Message(m) => Some(m.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    async fn handle_client(
        mut stream: TcpStream,
        script: Arc<RelayScript>,
        commands: Arc<RwLock<Vec<RelayCommand>>>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let (reader, mut writer) = stream.split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();
        let mut count = 0;
        let mut auth_login_lines = 0;

        writer.write_all(&script.greeting.to_bytes()).await?;
        writer.flush().await?;

        loop {
            line.clear();

            if script.hang_on_command == Some(count) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                return Ok(());
            }

            let read = timeout(Duration::from_secs(10), reader.read_line(&mut line)).await;
            let Ok(read) = read else {
                return Ok(());
            };
            if read? == 0 {
                return Ok(());
            }
            count += 1;

            let cmd_line = line.trim_end();

            if auth_login_lines > 0 {
                auth_login_lines -= 1;
                commands.write().await.push(RelayCommand::AuthLine);
                let reply = if auth_login_lines == 0 {
                    script.auth.to_bytes()
                } else {
                    Reply::new(334, "UGFzc3dvcmQ6").to_bytes()
                };
                writer.write_all(&reply).await?;
                writer.flush().await?;
                continue;
            }

            let (verb, rest) = cmd_line.split_once(' ').unwrap_or((cmd_line, ""));

            let (reply, command) = match verb.to_uppercase().as_str() {
                "EHLO" => {
                    let mut out = String::new();
                    let last = script.capabilities.len() - 1;
                    for (i, cap) in script.capabilities.iter().enumerate() {
                        let sep = if i == last { ' ' } else { '-' };
                        let _ = write!(out, "250{sep}{cap}\r\n");
                    }
                    (out.into_bytes(), RelayCommand::Ehlo(rest.to_string()))
                }
                "AUTH" if rest.eq_ignore_ascii_case("LOGIN") => {
                    auth_login_lines = 2;
                    (
                        Reply::new(334, "VXNlcm5hbWU6").to_bytes(),
                        RelayCommand::Auth(rest.to_string()),
                    )
                }
                "AUTH" => (
                    script.auth.to_bytes(),
                    RelayCommand::Auth(rest.to_string()),
                ),
                "MAIL" => (
                    script.mail_from.to_bytes(),
                    RelayCommand::MailFrom(rest.to_string()),
                ),
                "RCPT" => (
                    script.rcpt_to.to_bytes(),
                    RelayCommand::RcptTo(rest.to_string()),
                ),
                "DATA" => (script.data.to_bytes(), RelayCommand::Data),
                "STARTTLS" => (
                    Reply::new(502, "Command not implemented").to_bytes(),
                    RelayCommand::StartTls,
                ),
                "QUIT" => {
                    commands.write().await.push(RelayCommand::Quit);
                    writer.write_all(&Reply::new(221, "Bye").to_bytes()).await?;
                    writer.flush().await?;
                    return Ok(());
                }
                _ => (
                    Reply::new(500, "Unknown command").to_bytes(),
                    RelayCommand::Other(cmd_line.to_string()),
                ),
            };

            let is_data = command == RelayCommand::Data;
            commands.write().await.push(command);
            writer.write_all(&reply).await?;
            writer.flush().await?;

            if is_data && script.data.code == 354 {
                let mut content = String::new();
                loop {
                    line.clear();
                    if reader.read_line(&mut line).await? == 0 {
                        return Ok(());
                    }
                    if line.trim_end() == "." {
                        break;
                    }
                    content.push_str(&line);
                }
                commands.write().await.push(RelayCommand::Message(content));
                writer.write_all(&script.data_end.to_bytes()).await?;
                writer.flush().await?;
            }
        }
    }
}

pub struct MockRelayBuilder {
    script: RelayScript,
}

impl MockRelayBuilder {
    #[must_use]
    pub fn with_greeting(mut self, code: u16, message: &str) -> Self {
        self.script.greeting = Reply::new(code, message);
        self
    }

    /// EHLO lines; the first is the server name.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: &[&str]) -> Self {
        self.script.capabilities = capabilities.iter().map(ToString::to_string).collect();
        self
    }

    #[must_use]
    pub fn with_auth_response(mut self, code: u16, message: &str) -> Self {
        self.script.auth = Reply::new(code, message);
        self
    }

    #[must_use]
    pub fn with_mail_from_response(mut self, code: u16, message: &str) -> Self {
        self.script.mail_from = Reply::new(code, message);
        self
    }

    #[must_use]
    pub fn with_rcpt_to_response(mut self, code: u16, message: &str) -> Self {
        self.script.rcpt_to = Reply::new(code, message);
        self
    }

    #[must_use]
    pub fn with_data_end_response(mut self, code: u16, message: &str) -> Self {
        self.script.data_end = Reply::new(code, message);
        self
    }

    /// Stop answering before the Nth command (0-indexed).
    #[must_use]
    pub const fn with_hang_on_command(mut self, index: usize) -> Self {
        self.script.hang_on_command = Some(index);
        self
    }

    pub async fn build(self) -> Result<MockRelay, std::io::Error> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let script = Arc::new(self.script);
        let commands = Arc::new(RwLock::new(Vec::new()));
        let shutdown = Arc::new(AtomicBool::new(false));

        let task_commands = Arc::clone(&commands);
        let task_shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            while !task_shutdown.load(Ordering::Relaxed) {
                if let Ok(Ok((stream, _))) =
                    timeout(Duration::from_millis(100), listener.accept()).await
                {
                    let script = Arc::clone(&script);
                    let commands = Arc::clone(&task_commands);
                    tokio::spawn(async move {
                        let _ = MockRelay::handle_client(stream, script, commands).await;
                    });
                }
            }
        });

        Ok(MockRelay {
            addr,
            commands,
            shutdown,
        })
    }
}
