//! Inbox sorter — files IMAP mail into folders picked by a text classifier.

pub mod classify;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod mailbox;
pub mod pipeline;
