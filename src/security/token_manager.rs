//! Secret handling: environment variable names, masking and truncation
//!
//! Secrets are carried as `secrecy::SecretString` and only exposed at the
//! point where they go on the wire. Anything echoed back to the operator goes
//! through the helpers here first.

use regex::Regex;
use secrecy::{ExposeSecret, SecretString};

use crate::core::config::Credentials;

pub const CLIENT_ID_VAR: &str = "SP_API_CLIENT_ID";
pub const CLIENT_SECRET_VAR: &str = "SP_API_CLIENT_SECRET";
pub const REFRESH_TOKEN_VAR: &str = "SP_API_REFRESH_TOKEN";
pub const REGION_VAR: &str = "SP_API_REGION";

/// Environment variables that must be set before a credential run
pub const REQUIRED_ENV_VARS: &[&str] = &[
    CLIENT_ID_VAR,
    CLIENT_SECRET_VAR,
    REFRESH_TOKEN_VAR,
    REGION_VAR,
];

/// Values shorter than this are never partially shown
const MIN_MASKABLE_LEN: usize = 10;

/// Keep a short prefix of a value and mark the cut
///
/// At most `visible` characters and never more than a third of the value
/// are kept. Values under 10 characters are fully masked.
///
/// # Examples
///
/// ```
/// use sp_preflight::security::token_manager::truncate_secret;
///
/// assert_eq!(truncate_secret("Atzr|IwEBIC48BHZ4", 5), "Atzr|...");
/// assert_eq!(truncate_secret("hunter2pass", 12), "hun...");
/// assert_eq!(truncate_secret("abc", 5), "****");
/// ```
pub fn truncate_secret(value: &str, visible: usize) -> String {
    let len = value.chars().count();
    if len < MIN_MASKABLE_LEN {
        return "****".to_string();
    }

    let prefix: String = value.chars().take(visible.min(len / 3)).collect();
    format!("{}...", prefix)
}

/// Masks registered secrets wherever they appear in text
///
/// # Examples
///
/// ```
/// use sp_preflight::security::SecureTokenManager;
///
/// let mut manager = SecureTokenManager::new();
/// manager.register("my-secret-token-value");
/// let masked = manager.mask_tokens_in_string("error: bad token my-secret-token-value");
/// assert_eq!(masked, "error: bad token my-...lue");
/// ```
#[derive(Default)]
pub struct SecureTokenManager {
    known: Vec<SecretString>,
}

impl SecureTokenManager {
    pub fn new() -> Self {
        Self { known: Vec::new() }
    }

    /// Manager that masks the client secret and refresh token
    pub fn for_credentials(credentials: &Credentials) -> Self {
        let mut manager = Self::new();
        manager.register(credentials.client_secret.expose_secret());
        manager.register(credentials.refresh_token.expose_secret());
        manager
    }

    /// Register a value to be masked
    pub fn register(&mut self, secret: &str) {
        if !secret.is_empty() {
            self.known.push(SecretString::from(secret.to_string()));
        }
    }

    /// Masks a token for safe logging
    ///
    /// Shows only the first 3 and last 3 characters for identification purposes.
    /// Tokens shorter than 10 characters are fully masked as "****".
    ///
    /// # Examples
    ///
    /// ```
    /// use sp_preflight::security::SecureTokenManager;
    ///
    /// let manager = SecureTokenManager::new();
    /// assert_eq!(manager.mask_token("abcdef123456"), "abc...456");
    /// assert_eq!(manager.mask_token("short"), "****");
    /// ```
    pub fn mask_token(&self, token: &str) -> String {
        let chars: Vec<char> = token.chars().collect();
        if chars.len() < 10 {
            return "****".to_string();
        }

        let prefix: String = chars[..3].iter().collect();
        let suffix: String = chars[chars.len() - 3..].iter().collect();
        format!("{}...{}", prefix, suffix)
    }

    /// Masks all registered secrets in a string
    pub fn mask_tokens_in_string(&self, text: &str) -> String {
        let mut masked = text.to_string();

        for secret in &self.known {
            let secret_str = secret.expose_secret();
            if let Ok(regex) = Regex::new(&regex::escape(secret_str)) {
                let masked_token = self.mask_token(secret_str);
                masked = regex
                    .replace_all(&masked, masked_token.as_str())
                    .to_string();
            }
        }

        masked
    }
}
