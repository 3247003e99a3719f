//! Configuration types, built from environment variables.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default IMAP port (implicit TLS).
pub const DEFAULT_IMAP_PORT: u16 = 993;

/// Hosted classify endpoint.
pub const DEFAULT_CLASSIFY_URL: &str = "https://api.cohere.ai/v1/classify";

/// Maximum number of inputs the classify endpoint accepts per request.
pub const CLASSIFY_MAX_INPUTS: usize = 96;

/// Every five minutes.
pub const DEFAULT_SCHEDULE: &str = "*/5 * * * *";

/// IMAP account settings.
#[derive(Debug, Clone)]
pub struct ImapConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    /// Wrap the connection in TLS right away (port 993 style).
    pub tls: bool,
}

/// Classification API settings.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub api_key: SecretString,
    pub endpoint: String,
    pub model: Option<String>,
    /// JSON file holding the labelled examples sent with each request.
    pub examples_path: PathBuf,
    pub max_inputs: usize,
}

/// What to organize and when.
#[derive(Debug, Clone)]
pub struct OrganizerConfig {
    pub mailbox: String,
    /// IMAP SEARCH criteria used to pick messages.
    pub search: String,
    /// Cron expression, 5 or 6 fields.
    pub schedule: String,
    pub run_on_start: bool,
}

impl Default for OrganizerConfig {
    fn default() -> Self {
        Self {
            mailbox: "INBOX".to_string(),
            search: "ALL".to_string(),
            schedule: DEFAULT_SCHEDULE.to_string(),
            run_on_start: false,
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub imap: ImapConfig,
    pub classifier: ClassifierConfig,
    pub organizer: OrganizerConfig,
}

impl AppConfig {
    /// Build config from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String, ConfigError> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
        };
        let optional = |key: &str| -> Option<String> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let imap = ImapConfig {
            host: required("EMAIL_HOST")?,
            port: match optional("EMAIL_PORT") {
                Some(raw) => parse_port("EMAIL_PORT", &raw)?,
                None => DEFAULT_IMAP_PORT,
            },
            username: required("EMAIL_ADDRESS")?,
            password: SecretString::from(required("EMAIL_PASSWORD")?),
            tls: match optional("EMAIL_TLS") {
                Some(raw) => parse_bool("EMAIL_TLS", &raw)?,
                None => true,
            },
        };

        let classifier = ClassifierConfig {
            api_key: SecretString::from(required("COHERE_API_KEY")?),
            endpoint: optional("COHERE_CLASSIFY_URL")
                .unwrap_or_else(|| DEFAULT_CLASSIFY_URL.to_string()),
            model: optional("COHERE_MODEL"),
            examples_path: optional("CLASSIFY_EXAMPLES_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/examples.json")),
            max_inputs: CLASSIFY_MAX_INPUTS,
        };

        let defaults = OrganizerConfig::default();
        let organizer = OrganizerConfig {
            mailbox: optional("ORGANIZER_MAILBOX").unwrap_or(defaults.mailbox),
            search: optional("ORGANIZER_SEARCH").unwrap_or(defaults.search),
            schedule: optional("ORGANIZER_SCHEDULE").unwrap_or(defaults.schedule),
            run_on_start: match optional("ORGANIZER_RUN_ON_START") {
                Some(raw) => parse_bool("ORGANIZER_RUN_ON_START", &raw)?,
                None => defaults.run_on_start,
            },
        };

        Ok(Self {
            imap,
            classifier,
            organizer,
        })
    }
}

fn parse_port(key: &str, raw: &str) -> Result<u16, ConfigError> {
    raw.parse().map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("'{raw}' is not a port number: {e}"),
    })
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{raw}' is not a boolean"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn minimal() -> Vec<(&'static str, &'static str)> {
        vec![
            ("EMAIL_HOST", "imap.example.com"),
            ("EMAIL_ADDRESS", "me@example.com"),
            ("EMAIL_PASSWORD", "hunter2"),
            ("COHERE_API_KEY", "co-key"),
        ]
    }

    #[test]
    fn defaults_applied() {
        let config = AppConfig::from_lookup(lookup_from(&minimal())).unwrap();
        assert_eq!(config.imap.port, 993);
        assert!(config.imap.tls);
        assert_eq!(config.imap.password.expose_secret(), "hunter2");
        assert_eq!(config.classifier.endpoint, DEFAULT_CLASSIFY_URL);
        assert_eq!(config.classifier.max_inputs, 96);
        assert!(config.classifier.model.is_none());
        assert_eq!(config.organizer.mailbox, "INBOX");
        assert_eq!(config.organizer.search, "ALL");
        assert_eq!(config.organizer.schedule, "*/5 * * * *");
        assert!(!config.organizer.run_on_start);
    }

    #[test]
    fn missing_host_is_reported() {
        let pairs: Vec<_> = minimal()
            .into_iter()
            .filter(|(k, _)| *k != "EMAIL_HOST")
            .collect();
        let err = AppConfig::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "EMAIL_HOST"));
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let mut pairs = minimal();
        pairs.retain(|(k, _)| *k != "COHERE_API_KEY");
        pairs.push(("COHERE_API_KEY", "   "));
        let err = AppConfig::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "COHERE_API_KEY"));
    }

    #[test]
    fn overrides_read() {
        let mut pairs = minimal();
        pairs.extend([
            ("EMAIL_PORT", "143"),
            ("EMAIL_TLS", "false"),
            ("COHERE_MODEL", "embed-english-v3.0"),
            ("ORGANIZER_MAILBOX", "Banking"),
            ("ORGANIZER_SEARCH", "UNSEEN"),
            ("ORGANIZER_RUN_ON_START", "yes"),
        ]);
        let config = AppConfig::from_lookup(lookup_from(&pairs)).unwrap();
        assert_eq!(config.imap.port, 143);
        assert!(!config.imap.tls);
        assert_eq!(config.classifier.model.as_deref(), Some("embed-english-v3.0"));
        assert_eq!(config.organizer.mailbox, "Banking");
        assert_eq!(config.organizer.search, "UNSEEN");
        assert!(config.organizer.run_on_start);
    }

    #[test]
    fn bad_port_rejected() {
        let mut pairs = minimal();
        pairs.push(("EMAIL_PORT", "imaps"));
        let err = AppConfig::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "EMAIL_PORT"));
    }

    #[test]
    fn bad_bool_rejected() {
        let mut pairs = minimal();
        pairs.push(("EMAIL_TLS", "maybe"));
        assert!(AppConfig::from_lookup(lookup_from(&pairs)).is_err());
    }

    #[test]
    fn debug_output_hides_secrets() {
        let config = AppConfig::from_lookup(lookup_from(&minimal())).unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("co-key"));
    }
}
