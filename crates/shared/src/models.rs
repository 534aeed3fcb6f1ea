//! Shared data models carried across the frame boundary.

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

// --- Authentication ---

/// Kind of identity a login or authorization query refers to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AuthType {
    Email,
    Phone,
    Wallet,
    Telegram,
}

impl AuthType {
    /// Whether a login of this kind needs a connected wallet provider on the host.
    pub fn requires_provider(&self) -> bool {
        matches!(self, AuthType::Wallet)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthType::Email => "Email",
            AuthType::Phone => "Phone",
            AuthType::Wallet => "Wallet",
            AuthType::Telegram => "Telegram",
        }
    }
}

impl std::fmt::Display for AuthType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Login request forwarded to the guest's `login` method.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(rename = "type")]
    pub kind: AuthType,
    pub account: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

/// Options for the guest's `logout` method.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LogoutOptions {
    /// Clear every cached authorization instead of only the current session.
    #[serde(default)]
    pub clear_all: bool,
}

// --- OAuth ---

/// OAuth providers the guest may ask the host to redirect to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Twitter,
    Discord,
    Google,
    Github,
    Telegram,
}

impl OAuthProvider {
    pub const ALL: [OAuthProvider; 5] = [
        OAuthProvider::Twitter,
        OAuthProvider::Discord,
        OAuthProvider::Google,
        OAuthProvider::Github,
        OAuthProvider::Telegram,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            OAuthProvider::Twitter => "twitter",
            OAuthProvider::Discord => "discord",
            OAuthProvider::Google => "google",
            OAuthProvider::Github => "github",
            OAuthProvider::Telegram => "telegram",
        }
    }

    /// Path on the OAuth tool that starts this provider's flow.
    pub fn path(&self) -> &'static str {
        match self {
            OAuthProvider::Twitter => "/twitter",
            OAuthProvider::Discord => "/discord",
            OAuthProvider::Google => "/google",
            OAuthProvider::Github => "/github",
            OAuthProvider::Telegram => "/telegram",
        }
    }
}

impl std::str::FromStr for OAuthProvider {
    type Err = BridgeError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.name() == name)
            .ok_or_else(|| BridgeError::InvalidProvider(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_request_serializes_four_fields() {
        let request = LoginRequest {
            kind: AuthType::Email,
            account: "a@b.com".to_string(),
            signature: Some("s".to_string()),
            timestamp: Some(1),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"type": "Email", "account": "a@b.com", "signature": "s", "timestamp": 1})
        );
    }

    #[test]
    fn unsigned_login_omits_signature_fields() {
        let request = LoginRequest {
            kind: AuthType::Wallet,
            account: "0xabc".to_string(),
            signature: None,
            timestamp: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value, serde_json::json!({"type": "Wallet", "account": "0xabc"}));
    }

    #[test]
    fn oauth_provider_parsing() {
        assert_eq!("twitter".parse::<OAuthProvider>(), Ok(OAuthProvider::Twitter));
        assert_eq!(OAuthProvider::Twitter.path(), "/twitter");
        assert_eq!(
            "myspace".parse::<OAuthProvider>(),
            Err(BridgeError::InvalidProvider("myspace".to_string()))
        );
        // Names are matched exactly.
        assert!("Twitter".parse::<OAuthProvider>().is_err());
    }

    #[test]
    fn only_wallet_login_requires_provider() {
        assert!(AuthType::Wallet.requires_provider());
        assert!(!AuthType::Email.requires_provider());
        assert!(!AuthType::Telegram.requires_provider());
    }
}
