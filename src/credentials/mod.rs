//! Exchange credentials.
//!
//! Credentials come from a plain key file with one entry per line:
//!
//! ```text
//! # provider;api_key;api_secret[;extra]
//! kraken;KEY;BASE64SECRET
//! bitstamp;KEY;SECRET;123456
//! ```
//!
//! The `extra` field is provider specific (Bitstamp needs its customer id).

mod key_file;

pub use key_file::{parse_keys, KeyFile};

use secrecy::SecretString;

use crate::error::ConfigError;

/// Minimum number of `;`-separated fields in any entry.
pub const MIN_FIELDS: usize = 3;

/// One parsed key-file entry.
#[derive(Debug, Clone)]
pub struct Credential {
    pub provider_name: String,
    pub api_key: String,
    pub api_secret: SecretString,
    pub extra: Option<String>,
}

impl Credential {
    pub fn new(
        provider_name: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            provider_name: provider_name.into(),
            api_key: api_key.into(),
            api_secret: SecretString::from(api_secret.into()),
            extra: None,
        }
    }

    pub fn with_extra(mut self, extra: impl Into<String>) -> Self {
        self.extra = Some(extra.into());
        self
    }

    /// Build a credential from already-split fields.
    ///
    /// Fields past the fourth are ignored.
    pub fn from_fields(fields: &[&str]) -> Result<Self, ConfigError> {
        if fields.len() < MIN_FIELDS {
            return Err(ConfigError::MissingFields {
                provider: fields.first().copied().unwrap_or_default().to_string(),
                required: MIN_FIELDS,
                found: fields.len(),
            });
        }

        let mut credential = Self::new(fields[0], fields[1], fields[2]);
        if let Some(extra) = fields.get(3) {
            credential = credential.with_extra(*extra);
        }
        Ok(credential)
    }

    /// Number of fields this credential was given, as counted in the key file.
    pub fn field_count(&self) -> usize {
        MIN_FIELDS + usize::from(self.extra.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn from_fields_reads_optional_extra() {
        let plain = Credential::from_fields(&["kraken", "k", "s"]).unwrap();
        assert_eq!(plain.provider_name, "kraken");
        assert_eq!(plain.api_secret.expose_secret(), "s");
        assert_eq!(plain.extra, None);
        assert_eq!(plain.field_count(), 3);

        let extra = Credential::from_fields(&["bitstamp", "k", "s", "42", "ignored"]).unwrap();
        assert_eq!(extra.extra.as_deref(), Some("42"));
        assert_eq!(extra.field_count(), 4);
    }

    #[test]
    fn from_fields_rejects_short_entries() {
        let err = Credential::from_fields(&["binance", "k"]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingFields {
                provider: "binance".to_string(),
                required: 3,
                found: 2,
            }
        );
    }

    #[test]
    fn debug_output_hides_secret() {
        let credential = Credential::new("kraken", "key", "very-secret");
        let debug = format!("{credential:?}");
        assert!(!debug.contains("very-secret"));
    }
}
