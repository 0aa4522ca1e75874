//! Plaintext IMAP server answering LOGIN, SELECT, SEARCH FROM and LOGOUT.
#![allow(dead_code)]

use std::{
    collections::HashMap,
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

#[derive(Clone, Default)]
struct Mailbox {
    password: String,
    /// Lower-cased sender address to message count.
    senders: HashMap<String, u32>,
    /// Addresses whose search answers `NO`.
    reject_search: Vec<String>,
    /// Addresses whose search drops the connection.
    drop_on: Vec<String>,
}

pub struct MockImapServer {
    addr: SocketAddr,
    commands: Arc<RwLock<Vec<String>>>,
    shutdown: Arc<AtomicBool>,
}

impl MockImapServer {
    #[must_use]
    pub fn builder(password: &str) -> MockImapServerBuilder {
        MockImapServerBuilder {
            mailbox: Mailbox {
                password: password.to_string(),
                ..Mailbox::default()
            },
        }
    }

    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn commands(&self) -> Vec<String> {
        self.commands.read().await.clone()
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    async fn handle_client(
        mut stream: TcpStream,
        mailbox: Arc<Mailbox>,
        commands: Arc<RwLock<Vec<String>>>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let (reader, mut writer) = stream.split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();

        writer.write_all(b"* OK [CAPABILITY IMAP4rev1] Mock IMAP ready\r\n").await?;

        loop {
            line.clear();
            let Ok(read) = timeout(Duration::from_secs(10), reader.read_line(&mut line)).await
            else {
                return Ok(());
            };
            if read? == 0 {
                return Ok(());
            }

            let cmd = line.trim_end().to_string();
            let mut parts = cmd.splitn(3, ' ');
            let tag = parts.next().unwrap_or("*").to_string();
            let verb = parts.next().unwrap_or("").to_uppercase();
            let args = parts.next().unwrap_or("").to_string();
            commands.write().await.push(format!("{verb} {args}").trim_end().to_string());

            let reply = match verb.as_str() {
                "LOGIN" => {
                    let expected = format!("\"{}\"", mailbox.password);
                    if args.ends_with(&expected) {
                        format!("{tag} OK LOGIN completed\r\n")
                    } else {
                        format!("{tag} NO [AUTHENTICATIONFAILED] Invalid credentials\r\n")
                    }
                }
                "SELECT" => format!(
                    "* 3 EXISTS\r\n* FLAGS (\\Seen)\r\n{tag} OK [READ-WRITE] SELECT completed\r\n"
                ),
                "SEARCH" => {
                    let address = args
                        .trim_start_matches("FROM ")
                        .trim_matches('"')
                        .to_lowercase();
                    if mailbox.drop_on.contains(&address) {
                        return Ok(());
                    }
                    if mailbox.reject_search.contains(&address) {
                        format!("{tag} NO SEARCH failed\r\n")
                    } else {
                        let count = mailbox.senders.get(&address).copied().unwrap_or(0);
                        let ids = (1..=count).map(|i| i.to_string()).collect::<Vec<_>>();
                        format!("* SEARCH {}\r\n{tag} OK SEARCH completed\r\n", ids.join(" "))
                            .replace("* SEARCH \r\n", "* SEARCH\r\n")
                    }
                }
                "LOGOUT" => {
                    writer
                        .write_all(format!("* BYE logging out\r\n{tag} OK LOGOUT completed\r\n").as_bytes())
                        .await?;
                    return Ok(());
                }
                _ => format!("{tag} BAD unknown command\r\n"),
            };

            writer.write_all(reply.as_bytes()).await?;
            writer.flush().await?;
        }
    }
}

pub struct MockImapServerBuilder {
    mailbox: Mailbox,
}

impl MockImapServerBuilder {
    #[must_use]
    pub fn with_messages_from(mut self, address: &str, count: u32) -> Self {
        self.mailbox.senders.insert(address.to_lowercase(), count);
        self
    }

    #[must_use]
    pub fn rejecting_search_for(mut self, address: &str) -> Self {
        self.mailbox.reject_search.push(address.to_lowercase());
        self
    }

    #[must_use]
    pub fn dropping_on(mut self, address: &str) -> Self {
        self.mailbox.drop_on.push(address.to_lowercase());
        self
    }

    pub async fn build(self) -> Result<MockImapServer, std::io::Error> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let mailbox = Arc::new(self.mailbox);
        let commands = Arc::new(RwLock::new(Vec::new()));
        let shutdown = Arc::new(AtomicBool::new(false));

        let task_commands = Arc::clone(&commands);
        let task_shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            while !task_shutdown.load(Ordering::Relaxed) {
                if let Ok(Ok((stream, _))) =
                    timeout(Duration::from_millis(100), listener.accept()).await
                {
                    let mailbox = Arc::clone(&mailbox);
                    let commands = Arc::clone(&task_commands);
                    tokio::spawn(async move {
                        let _ = MockImapServer::handle_client(stream, mailbox, commands).await;
                    });
                }
            }
        });

        Ok(MockImapServer {
            addr,
            commands,
            shutdown,
        })
    }
}
