//! ACP Crypto - Card-Network Gateway Message Protection
//!
//! Authenticates and protects payment messages exchanged with the ACP card-network
//! gateway. The library signs outgoing messages with the merchant's PKCS#12 key,
//! verifies incoming messages against the network's pinned certificate hierarchy,
//! encrypts sensitive fields for the network and inflates compressed payloads.
//!
//! # Overview
//!
//! ```text
//! Pinned root (trust anchor)
//!   └── Pinned intermediate
//!       ├── Gateway signing certificate   (supplied per message, verified)
//!       └── Gateway encryption certificate (pinned, used for field encryption)
//!
//! Merchant keystore (.pfx) ── signing key + merchant certificate (certId)
//! ```
//!
//! - **Pinned trust**: only the configured root is an anchor; system roots are never consulted
//! - **Identity policy**: signers must carry the network's signing identity in their CN
//! - **No oracle**: verification answers only `true` or `false`, whatever went wrong
//! - **Lazy loading**: certificates and the keystore are read on first use and kept
//!
//! # Quick Start
//!
//! ```no_run
//! use acp_crypto::configs::AppConfig;
//! use acp_crypto::AcpCrypto;
//! use anyhow::Result;
//!
//! fn main() -> Result<()> {
//!     let config = AppConfig::load()?;
//!     let acp = AcpCrypto::from_config(&config);
//!
//!     let request = "bizType=000201&merId=777290058110048&txnAmt=100";
//!     let signature = acp.sign(request)?;
//!     println!("certId={} signature={}", acp.certificate_id()?, signature);
//!
//!     let card_number = acp.encrypt("6216261000000000018")?;
//!     println!("encrypted with certificate {:?}", acp.encryption_certificate_id());
//!     # let _ = card_number;
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`trust_store`]: pinned root, intermediate and encryption certificates
//! - [`keystore`]: merchant PKCS#12 keystore and signing key
//! - [`chain`]: chain building against the pinned anchors and signer policy
//! - [`identity`]: identity token extraction from a certificate subject
//! - [`signature`]: SHA256withRSA over the hex digest, base64 at the boundary
//! - [`encryption`]: RSA PKCS#1 v1.5 field encryption and decryption
//! - [`inflate`]: raw DEFLATE payload decompression
//! - [`configs`]: TOML configuration and environment selection
//! - [`certificate_source`]: where the pinned certificate bytes come from
//!
//! # Error Handling
//!
//! Keystore, encryption and decompression failures return typed errors from
//! [`error`]. Verification never errors: an untrusted signer, a malformed
//! certificate and a wrong signature all give `false`, with the reason logged
//! through `tracing` at debug level.

pub mod certificate_source;
pub mod chain;
pub mod configs;
pub mod encryption;
pub mod error;
pub mod identity;
pub mod inflate;
pub mod keystore;
pub mod merchant_key;
pub mod signature;
pub mod trust_store;

#[cfg(test)]
mod test_pki;

use secrecy::SecretString;
use std::path::PathBuf;

use crate::certificate_source::{CertificateSource, FileCertificateSource};
use crate::configs::{AppConfig, Environment};
use crate::error::{DecryptionError, EncryptionError, InflateError, KeystoreError, SignatureError};
use crate::keystore::KeyStore;
use crate::trust_store::TrustStore;

/// Process-wide context: pinned certificates plus the merchant keystore.
///
/// Construct once at startup and share by reference (or `Arc`) with every
/// component that signs, verifies or encrypts gateway messages.
#[derive(Debug)]
pub struct AcpCrypto {
    trust_store: TrustStore,
    key_store: KeyStore,
    keystore_path: PathBuf,
    keystore_password: SecretString,
}

impl AcpCrypto {
    /// Create a context; certificates and keystore load lazily
    ///
    /// # Arguments
    /// * `environment` - Anchor set to trust
    /// * `source` - Provider of the pinned certificate bytes
    /// * `keystore_path` - Merchant PKCS#12 file
    /// * `keystore_password` - Password for `keystore_path`
    pub fn new(
        environment: Environment,
        source: impl CertificateSource + 'static,
        keystore_path: impl Into<PathBuf>,
        keystore_password: SecretString,
    ) -> Self {
        Self {
            trust_store: TrustStore::new(environment, source),
            key_store: KeyStore::new(),
            keystore_path: keystore_path.into(),
            keystore_password,
        }
    }

    /// Wire file-backed anchors and the configured keystore
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.environment,
            FileCertificateSource::from_config(config),
            config.keystore.path.clone(),
            config.keystore.password.clone(),
        )
    }

    pub fn trust_store(&self) -> &TrustStore {
        &self.trust_store
    }

    pub fn key_store(&self) -> &KeyStore {
        &self.key_store
    }

    /// Merchant certificate serial, sent as `certId` with every signed request
    pub fn certificate_id(&self) -> Result<String, KeystoreError> {
        self.key_store
            .certificate_serial(&self.keystore_path, &self.keystore_password)
    }

    pub fn encryption_certificate_id(&self) -> Option<String> {
        self.trust_store.encryption_certificate_serial()
    }

    pub fn sign(&self, data: &str) -> Result<String, SignatureError> {
        let key = self
            .key_store
            .private_key(&self.keystore_path, &self.keystore_password)?;
        signature::sign(&key, data)
    }

    pub fn verify(&self, data: &str, signature_base64: &str, signer_cert_pem: &str) -> bool {
        signature::verify(&self.trust_store, data, signature_base64, signer_cert_pem)
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, EncryptionError> {
        encryption::encrypt(&self.trust_store, plaintext)
    }

    pub fn decrypt(&self, ciphertext_base64: &str) -> Result<String, DecryptionError> {
        let key = self
            .key_store
            .private_key(&self.keystore_path, &self.keystore_password)?;
        encryption::decrypt(&key, ciphertext_base64)
    }

    pub fn inflate(&self, data: &str) -> Result<Vec<u8>, InflateError> {
        inflate::inflate(data)
    }
}
