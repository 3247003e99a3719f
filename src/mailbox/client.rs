//! IMAP connector over TCP with rustls, driven through the `imap` crate.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use tracing::{debug, warn};

use crate::config::ImapConfig;
use crate::error::MailboxError;
use crate::mailbox::{MailConnector, MailSession, RawMessage};

/// Socket read/write timeout.
const IO_TIMEOUT: Duration = Duration::from_secs(30);

/// UIDs per FETCH command.
const FETCH_CHUNK: usize = 500;

/// `PEEK` keeps the `\Seen` flag untouched.
const FETCH_QUERY: &str = "(UID BODY.PEEK[HEADER] BODY.PEEK[TEXT])";

type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

/// Byte stream under the IMAP client.
pub enum Transport {
    Plain(TcpStream),
    Tls(Box<TlsStream>),
}

impl Read for Transport {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Self::Plain(s) => s.read(buf),
            Self::Tls(s) => s.read(buf),
        }
    }
}

impl Write for Transport {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Self::Plain(s) => s.write(buf),
            Self::Tls(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Self::Plain(s) => s.flush(),
            Self::Tls(s) => s.flush(),
        }
    }
}

/// Production connector for a single IMAP account.
pub struct ImapConnector {
    config: ImapConfig,
    tls_config: Arc<rustls::ClientConfig>,
}

impl ImapConnector {
    pub fn new(config: ImapConfig) -> Result<Self, MailboxError> {
        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let tls_config = rustls::ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| MailboxError::Tls {
                host: config.host.clone(),
                reason: e.to_string(),
            })?
            .with_root_certificates(root_store)
            .with_no_client_auth();
        Ok(Self {
            config,
            tls_config: Arc::new(tls_config),
        })
    }

    fn connect(&self) -> Result<Transport, MailboxError> {
        let host = self.config.host.as_str();
        let port = self.config.port;
        let connect_err = |reason: String| MailboxError::Connect {
            host: host.to_string(),
            port,
            reason,
        };

        let tcp = TcpStream::connect((host, port)).map_err(|e| connect_err(e.to_string()))?;
        tcp.set_read_timeout(Some(IO_TIMEOUT))
            .map_err(|e| connect_err(e.to_string()))?;
        tcp.set_write_timeout(Some(IO_TIMEOUT))
            .map_err(|e| connect_err(e.to_string()))?;

        if !self.config.tls {
            warn!(host, "IMAP connection is not encrypted");
            return Ok(Transport::Plain(tcp));
        }

        let tls_err = |reason: String| MailboxError::Tls {
            host: host.to_string(),
            reason,
        };
        let server_name = rustls_pki_types::ServerName::try_from(host.to_string())
            .map_err(|e| tls_err(e.to_string()))?;
        let conn = rustls::ClientConnection::new(Arc::clone(&self.tls_config), server_name)
            .map_err(|e| tls_err(e.to_string()))?;
        Ok(Transport::Tls(Box::new(rustls::StreamOwned::new(conn, tcp))))
    }
}

impl MailConnector for ImapConnector {
    fn open(&self, mailbox: &str) -> Result<Box<dyn MailSession>, MailboxError> {
        let transport = self.connect()?;
        let mut client = imap::Client::new(transport);
        client.read_greeting().map_err(|e| MailboxError::Connect {
            host: self.config.host.clone(),
            port: self.config.port,
            reason: format!("no greeting: {e}"),
        })?;

        let mut session = client
            .login(&self.config.username, self.config.password.expose_secret())
            .map_err(|(e, _client)| MailboxError::AuthFailed {
                user: self.config.username.clone(),
                reason: e.to_string(),
            })?;

        let selected = session
            .select(encode_mailbox_name(mailbox))
            .map_err(|e| MailboxError::Select {
            mailbox: mailbox.to_string(),
            reason: e.to_string(),
        })?;
        debug!(mailbox, exists = selected.exists, "Mailbox selected");

        let supports_move = match session.capabilities() {
            Ok(caps) => caps.has_str("MOVE"),
            Err(e) => {
                warn!("CAPABILITY failed, assuming no MOVE support: {e}");
                false
            }
        };

        Ok(Box::new(ImapSession {
            session,
            supports_move,
        }))
    }
}

/// A logged-in session with a mailbox selected.
pub struct ImapSession {
    session: imap::Session<Transport>,
    supports_move: bool,
}

impl MailSession for ImapSession {
    fn search(&mut self, criteria: &str) -> Result<Vec<u32>, MailboxError> {
        let found = self
            .session
            .uid_search(criteria)
            .map_err(|e| MailboxError::Search(e.to_string()))?;
        let mut uids: Vec<u32> = found.into_iter().collect();
        uids.sort_unstable();
        Ok(uids)
    }

    fn fetch(&mut self, uids: &[u32]) -> Result<Vec<RawMessage>, MailboxError> {
        let mut messages = Vec::with_capacity(uids.len());

        for chunk in uids.chunks(FETCH_CHUNK) {
            let fetches = self
                .session
                .uid_fetch(uid_set(chunk), FETCH_QUERY)
                .map_err(|e| MailboxError::Fetch(e.to_string()))?;

            for fetch in fetches.iter() {
                let Some(uid) = fetch.uid else {
                    warn!(seq = fetch.message, "FETCH response without UID, skipping");
                    continue;
                };
                messages.push(RawMessage {
                    uid,
                    header: fetch.header().map(<[u8]>::to_vec).unwrap_or_default(),
                    text: fetch.text().map(<[u8]>::to_vec).unwrap_or_default(),
                });
            }
        }

        debug!("Done fetching {} message(s)", messages.len());
        Ok(messages)
    }

    fn move_message(&mut self, uid: u32, folder: &str) -> Result<(), MailboxError> {
        let move_err = |reason: String| MailboxError::Move {
            uid,
            folder: folder.to_string(),
            reason,
        };
        let set = uid.to_string();
        let encoded = encode_mailbox_name(folder);

        if self.supports_move {
            return self
                .session
                .uid_mv(&set, &encoded)
                .map_err(|e| move_err(e.to_string()));
        }

        // RFC 6851 fallback: COPY, flag, expunge.
        self.session
            .uid_copy(&set, &encoded)
            .map_err(|e| move_err(format!("copy: {e}")))?;
        self.session
            .uid_store(&set, "+FLAGS.SILENT (\\Deleted)")
            .map_err(|e| move_err(format!("store: {e}")))?;
        self.session
            .expunge()
            .map_err(|e| move_err(format!("expunge: {e}")))?;
        Ok(())
    }

    fn logout(&mut self) -> Result<(), MailboxError> {
        self.session
            .logout()
            .map_err(|e| MailboxError::Logout(e.to_string()))
    }
}

/// Mailbox names travel as modified UTF-7 (RFC 3501 5.1.3).
pub fn encode_mailbox_name(name: &str) -> String {
    utf7_imap::encode_utf7_imap(name.to_string())
}

/// Render UIDs as an IMAP sequence set (`1,2,5`).
pub fn uid_set(uids: &[u32]) -> String {
    uids.iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
