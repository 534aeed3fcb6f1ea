//! Login signatures for integrators that authenticate server-side accounts.
//!
//! The signed payload is
//! `LOGIN\n{kind}\n{timestamp}\n{sha256hex(account)}` with the timestamp in
//! epoch milliseconds; keys and signatures travel as standard base64.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use framebridge_shared::{AuthType, BridgeError, LoginRequest};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LoginSecret {
    pub public_key: String,  // Base64
    pub private_key: String, // Base64
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedLogin {
    pub signature: String,
    pub timestamp: i64,
}

/// Produces `{signature, timestamp}` for a login.
pub trait LoginSigner {
    fn sign_login(
        &self,
        kind: AuthType,
        account: &str,
        secret: &str,
    ) -> Result<SignedLogin, BridgeError>;

    /// Build a ready-to-send login request.
    fn login_request(
        &self,
        kind: AuthType,
        account: &str,
        secret: &str,
    ) -> Result<LoginRequest, BridgeError> {
        let signed = self.sign_login(kind, account, secret)?;
        Ok(LoginRequest {
            kind,
            account: account.to_string(),
            signature: Some(signed.signature),
            timestamp: Some(signed.timestamp),
        })
    }
}

pub fn generate_secret() -> LoginSecret {
    let mut csprng = OsRng;
    let signing_key = SigningKey::generate(&mut csprng);
    let verifying_key = signing_key.verifying_key();

    LoginSecret {
        public_key: BASE64.encode(verifying_key.as_bytes()),
        private_key: BASE64.encode(signing_key.to_bytes()),
    }
}

fn canonical_login(kind: AuthType, account: &str, timestamp: i64) -> String {
    let account_hash = hex::encode(Sha256::digest(account.as_bytes()));
    format!("LOGIN\n{}\n{}\n{}", kind, timestamp, account_hash)
}

fn decode_key<const N: usize>(encoded: &str, what: &str) -> Result<[u8; N], BridgeError> {
    let bytes = BASE64
        .decode(encoded)
        .map_err(|e| BridgeError::Signing(format!("invalid {what}: {e}")))?;
    bytes
        .try_into()
        .map_err(|_| BridgeError::Signing(format!("invalid {what} length")))
}

/// Ed25519 signer; `secret` is the base64 private key.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Signer;

impl Ed25519Signer {
    /// Sign with an explicit timestamp.
    pub fn sign_at(
        &self,
        kind: AuthType,
        account: &str,
        secret: &str,
        timestamp: i64,
    ) -> Result<SignedLogin, BridgeError> {
        let signing_key = SigningKey::from_bytes(&decode_key::<32>(secret, "private key")?);
        let signature = signing_key.sign(canonical_login(kind, account, timestamp).as_bytes());

        Ok(SignedLogin {
            signature: BASE64.encode(signature.to_bytes()),
            timestamp,
        })
    }
}

impl LoginSigner for Ed25519Signer {
    fn sign_login(
        &self,
        kind: AuthType,
        account: &str,
        secret: &str,
    ) -> Result<SignedLogin, BridgeError> {
        self.sign_at(kind, account, secret, Utc::now().timestamp_millis())
    }
}

/// Check a login signature against a base64 public key.
pub fn verify_login(
    kind: AuthType,
    account: &str,
    signed: &SignedLogin,
    public_key: &str,
) -> Result<(), BridgeError> {
    let verifying_key = VerifyingKey::from_bytes(&decode_key::<32>(public_key, "public key")?)
        .map_err(|e| BridgeError::Signing(e.to_string()))?;
    let signature = Signature::from_bytes(&decode_key::<64>(&signed.signature, "signature")?);

    verifying_key
        .verify(
            canonical_login(kind, account, signed.timestamp).as_bytes(),
            &signature,
        )
        .map_err(|e| BridgeError::Signing(e.to_string()))
}
