//! The organize pipeline and its schedule.
//!
//! Each run:
//! 1. Opens the mailbox and fetches every message matching the search
//! 2. Parses and cleans each into `Sender | Subject | Message` text
//! 3. Classifies in batches, all batches concurrently
//! 4. Moves each message to the folder named by its prediction

pub mod organizer;
pub mod scheduler;

pub use organizer::{FailedMove, MailOrganizer, RunSummary};
pub use scheduler::{next_fire, normalize_cron, spawn_organizer};
