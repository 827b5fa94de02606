//! Credential codec
//!
//! Encrypts the sensitive tenant attributes (`host`, `database`, `username`,
//! `password`) before they are written and decrypts them when read.
//!
//! Stored format: base64(nonce || ciphertext || tag)
//! - nonce: 12 bytes, random per value
//! - tag: 16 bytes (appended by AES-GCM)
//!
//! With the policy disabled both directions are the identity.

use crate::error::{DatabaseError, Result};
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::RngCore;
use serde::Deserialize;
use std::fmt;
use tenantable_models::{CredentialField, Tenant, TenantCredentials};

const NONCE_LEN: usize = 12;

/// Encryption policy
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EncryptionConfig {
    /// Encrypt credential fields at rest
    #[serde(default)]
    pub enabled: bool,
    /// Base64-encoded 32-byte AES-256 key
    #[serde(default)]
    pub key: Option<String>,
}

impl EncryptionConfig {
    /// Load the policy from environment variables
    ///
    /// - TENANTABLE_ENCRYPT: `true`/`1` to enable
    /// - TENANTABLE_ENCRYPTION_KEY: Base64-encoded 32-byte key
    ///
    /// Generate a key with: `tenantable key:generate`
    pub fn from_env() -> Self {
        Self {
            enabled: std::env::var("TENANTABLE_ENCRYPT")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(false),
            key: std::env::var("TENANTABLE_ENCRYPTION_KEY").ok(),
        }
    }
}

#[derive(Clone)]
pub struct CredentialCodec {
    cipher: Option<Aes256Gcm>,
}

impl fmt::Debug for CredentialCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialCodec")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl Default for CredentialCodec {
    fn default() -> Self {
        Self::disabled()
    }
}

impl CredentialCodec {
    /// Build a codec from the policy. An enabled policy requires a valid key.
    pub fn new(config: &EncryptionConfig) -> Result<Self> {
        if !config.enabled {
            return Ok(Self::disabled());
        }

        let key_b64 = config.key.as_ref().ok_or_else(|| {
            DatabaseError::InvalidKey(
                "Encryption enabled but no key configured. Set TENANTABLE_ENCRYPTION_KEY."
                    .to_string(),
            )
        })?;

        Self::with_key(key_b64)
    }

    /// Codec with encryption turned on, keyed by a base64 32-byte key.
    pub fn with_key(key_b64: &str) -> Result<Self> {
        let key_bytes = STANDARD
            .decode(key_b64.trim())
            .map_err(|e| DatabaseError::InvalidKey(format!("Invalid key format: {}", e)))?;

        if key_bytes.len() != 32 {
            return Err(DatabaseError::InvalidKey(format!(
                "Encryption key must be 32 bytes (256 bits), got {} bytes",
                key_bytes.len()
            )));
        }

        let cipher = Aes256Gcm::new_from_slice(&key_bytes)
            .map_err(|e| DatabaseError::InvalidKey(e.to_string()))?;

        Ok(Self {
            cipher: Some(cipher),
        })
    }

    /// Identity codec
    pub fn disabled() -> Self {
        Self { cipher: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.cipher.is_some()
    }

    /// Turn a plaintext attribute into its stored form.
    pub fn encode(&self, field: CredentialField, plaintext: &str) -> Result<String> {
        let Some(cipher) = &self.cipher else {
            return Ok(plaintext.to_string());
        };

        // Empty values are never encrypted
        if plaintext.is_empty() {
            return Ok(String::new());
        }

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| DatabaseError::Encryption {
                field,
                reason: e.to_string(),
            })?;

        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);

        Ok(STANDARD.encode(&combined))
    }

    /// Turn a stored attribute back into plaintext.
    pub fn decode(&self, field: CredentialField, stored: &str) -> Result<String> {
        let Some(cipher) = &self.cipher else {
            return Ok(stored.to_string());
        };

        if stored.is_empty() {
            return Ok(String::new());
        }

        let decryption_error = |reason: String| DatabaseError::Decryption { field, reason };

        let combined = STANDARD
            .decode(stored)
            .map_err(|e| decryption_error(format!("invalid encoding: {}", e)))?;

        if combined.len() < NONCE_LEN {
            return Err(decryption_error("encrypted data too short".to_string()));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| decryption_error("wrong key or corrupted ciphertext".to_string()))?;

        String::from_utf8(plaintext).map_err(|e| decryption_error(e.to_string()))
    }

    /// Fresh random key, base64-encoded.
    pub fn generate_key() -> String {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        STANDARD.encode(key)
    }
}

/// Codec-aware accessors for the encrypted tenant attributes.
pub trait EncryptedAttributes {
    fn host(&self, codec: &CredentialCodec) -> Result<String>;
    fn database(&self, codec: &CredentialCodec) -> Result<String>;
    fn username(&self, codec: &CredentialCodec) -> Result<String>;
    fn password(&self, codec: &CredentialCodec) -> Result<String>;

    /// All connection credentials, decrypted.
    fn credentials(&self, codec: &CredentialCodec) -> Result<TenantCredentials>;
}

impl EncryptedAttributes for Tenant {
    fn host(&self, codec: &CredentialCodec) -> Result<String> {
        codec.decode(CredentialField::Host, &self.host)
    }

    fn database(&self, codec: &CredentialCodec) -> Result<String> {
        codec.decode(CredentialField::Database, &self.database)
    }

    fn username(&self, codec: &CredentialCodec) -> Result<String> {
        codec.decode(CredentialField::Username, &self.username)
    }

    fn password(&self, codec: &CredentialCodec) -> Result<String> {
        codec.decode(CredentialField::Password, &self.password)
    }

    fn credentials(&self, codec: &CredentialCodec) -> Result<TenantCredentials> {
        Ok(TenantCredentials {
            driver: self.driver.clone(),
            host: EncryptedAttributes::host(self, codec)?,
            database: EncryptedAttributes::database(self, codec)?,
            username: EncryptedAttributes::username(self, codec)?,
            password: EncryptedAttributes::password(self, codec)?,
            prefix: self.prefix.clone(),
        })
    }
}
