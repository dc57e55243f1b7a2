use std::fmt;

use crate::core::error::{Error, Result};

/// Environment variable consulted when no key is passed explicitly.
pub const API_KEY_ENV_VAR: &str = "OPENROUTER_API_KEY";

/// Bearer credential for the gateway. Never printed in full.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(String);

impl Credential {
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Picks the explicit value first, then the environment value. Blank values count
    /// as absent.
    pub fn resolve(explicit: Option<String>, env_value: Option<String>) -> Result<Self> {
        normalize_key(explicit)
            .or_else(|| normalize_key(env_value))
            .map(Self)
            .ok_or_else(|| Error::MissingCredential {
                env_var: API_KEY_ENV_VAR.to_string(),
            })
    }

    /// Resolves against the live process environment.
    pub fn from_cli_or_env(explicit: Option<String>) -> Result<Self> {
        Self::resolve(explicit, std::env::var(API_KEY_ENV_VAR).ok())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

fn normalize_key(value: Option<String>) -> Option<String> {
    value.and_then(|candidate| {
        let trimmed = candidate.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
