//! Error types for inbox-sorter.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Mailbox error: {0}")]
    Mailbox(#[from] MailboxError),

    #[error("Classification error: {0}")]
    Classify(#[from] ClassifyError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// IMAP mailbox errors.
#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    #[error("Failed to connect to {host}:{port}: {reason}")]
    Connect {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("TLS setup failed for {host}: {reason}")]
    Tls { host: String, reason: String },

    #[error("Login failed for {user}: {reason}")]
    AuthFailed { user: String, reason: String },

    #[error("Error opening mailbox {mailbox}: {reason}")]
    Select { mailbox: String, reason: String },

    #[error("An error occurred while searching for mail: {0}")]
    Search(String),

    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Error moving message {uid} to {folder}: {reason}")]
    Move {
        uid: u32,
        folder: String,
        reason: String,
    },

    #[error("Logout failed: {0}")]
    Logout(String),
}

/// Classification API errors.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("Classifier {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Classifier {provider} returned HTTP {status}: {body}")]
    Api {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("Authentication failed for classifier {provider}")]
    AuthFailed { provider: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Classifier {provider} returned {got} classifications for {expected} inputs")]
    CountMismatch {
        provider: String,
        expected: usize,
        got: usize,
    },

    #[error("Batch of {got} inputs exceeds the limit of {max}")]
    TooManyInputs { got: usize, max: usize },
}

/// Pipeline-related errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Blocking mailbox task failed: {0}")]
    Join(String),

    #[error("Invalid schedule '{schedule}': {reason}")]
    Schedule { schedule: String, reason: String },

    #[error("Mailbox error: {0}")]
    Mailbox(#[from] MailboxError),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
