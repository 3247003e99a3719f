//! Mailbox access: an IMAP session on one selected mailbox.
//!
//! The traits here are blocking, like the IMAP protocol underneath them.
//! Async callers run them inside `tokio::task::spawn_blocking`.

pub mod client;
pub mod message;

pub use client::ImapConnector;
pub use message::{ParsedMessage, parse_raw};

use crate::error::MailboxError;

/// A message as fetched from the server: header and text sections, unparsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawMessage {
    pub uid: u32,
    pub header: Vec<u8>,
    pub text: Vec<u8>,
}

/// An authenticated session with a mailbox selected.
pub trait MailSession: Send {
    /// UIDs matching the IMAP search criteria, ascending.
    fn search(&mut self, criteria: &str) -> Result<Vec<u32>, MailboxError>;

    /// Fetch header and text of the given UIDs without setting `\Seen`.
    fn fetch(&mut self, uids: &[u32]) -> Result<Vec<RawMessage>, MailboxError>;

    /// Move one message into `folder`.
    fn move_message(&mut self, uid: u32, folder: &str) -> Result<(), MailboxError>;

    fn logout(&mut self) -> Result<(), MailboxError>;
}

/// Opens sessions. One connector serves every scheduled run.
pub trait MailConnector: Send + Sync {
    /// Connect, authenticate and select `mailbox`.
    fn open(&self, mailbox: &str) -> Result<Box<dyn MailSession>, MailboxError>;
}
