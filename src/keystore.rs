//! Merchant PKCS#12 keystore
//!
//! The merchant's signing key and certificate ship as a password-protected
//! PKCS#12 (`.pfx`) file. [`KeyStore`] opens it on first demand and keeps the
//! selected key entry for the life of the process.
//!
//! # Credential handling
//!
//! Loading is single-assignment. Repeating a load with the same path and
//! password is a no-op; asking for a different path or password after a
//! successful load fails with [`KeystoreError::CredentialsMismatch`] instead
//! of silently serving the first keystore. A failed load caches nothing, so
//! a retry with corrected credentials succeeds.

use openssl::pkcs12::Pkcs12;
use openssl::x509::X509;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{info, warn};

use crate::error::KeystoreError;
use crate::merchant_key::MerchantKey;
use crate::trust_store::certificate_serial;

/// The key-bearing entry selected from a loaded keystore
struct KeyEntry {
    path: PathBuf,
    /// Resolved form of `path`, when it could be resolved at load time
    canonical_path: Option<PathBuf>,
    password_digest: [u8; 32],
    alias: Option<String>,
    private_key: MerchantKey,
    /// End-entity certificate first, followed by any CA certificates in the bag
    chain: Vec<X509>,
}

impl KeyEntry {
    fn open(path: &Path, password: &SecretString) -> Result<Self, KeystoreError> {
        let der = fs::read(path).map_err(|source| KeystoreError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;

        let pkcs12 = Pkcs12::from_der(&der).map_err(|source| KeystoreError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;

        let parsed = pkcs12
            .parse2(password.expose_secret())
            .map_err(|source| KeystoreError::BadPassword {
                path: path.to_path_buf(),
                source,
            })?;

        let pkey = parsed.pkey.ok_or_else(|| KeystoreError::NoKeyEntry {
            path: path.to_path_buf(),
        })?;
        let cert = parsed.cert.ok_or_else(|| KeystoreError::MissingCertificate {
            path: path.to_path_buf(),
        })?;

        // The entry is the key plus the certificate paired with it by localKeyID
        let key_matches = cert
            .public_key()
            .map(|public| public.public_eq(&pkey))
            .map_err(KeystoreError::KeyMaterial)?;
        if !key_matches {
            return Err(KeystoreError::KeyCertificateMismatch {
                path: path.to_path_buf(),
            });
        }

        let alias = cert
            .alias()
            .map(|raw| String::from_utf8_lossy(raw).into_owned());

        let mut chain = vec![cert];
        if let Some(ca) = parsed.ca {
            chain.extend(ca);
        }

        Ok(Self {
            path: path.to_path_buf(),
            canonical_path: fs::canonicalize(path).ok(),
            password_digest: password_digest(password),
            alias,
            private_key: MerchantKey::new(&pkey)?,
            chain,
        })
    }

    fn check_credentials(&self, path: &Path, password: &SecretString) -> Result<(), KeystoreError> {
        let same_password = openssl::memcmp::eq(&self.password_digest, &password_digest(password));
        if self.is_same_file(path) && same_password {
            return Ok(());
        }
        warn!(
            loaded = %self.path.display(),
            requested = %path.display(),
            "Keystore requested with different credentials"
        );
        Err(KeystoreError::CredentialsMismatch {
            loaded: self.path.clone(),
            requested: path.to_path_buf(),
        })
    }

    /// Lexically equal, or resolving to the same file on disk
    fn is_same_file(&self, path: &Path) -> bool {
        if self.path == path {
            return true;
        }
        match (&self.canonical_path, fs::canonicalize(path)) {
            (Some(loaded), Ok(requested)) => *loaded == requested,
            _ => false,
        }
    }

    fn leaf(&self) -> Result<&X509, KeystoreError> {
        self.chain
            .first()
            .ok_or_else(|| KeystoreError::MissingCertificate {
                path: self.path.clone(),
            })
    }
}

fn password_digest(password: &SecretString) -> [u8; 32] {
    Sha256::digest(password.expose_secret().as_bytes()).into()
}

#[derive(Default)]
pub struct KeyStore {
    entry: OnceLock<KeyEntry>,
}

impl KeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the keystore at `path` unless it is already loaded with the same credentials
    ///
    /// # Arguments
    /// * `path` - Path to the PKCS#12 (`.pfx`) file
    /// * `password` - Keystore password
    ///
    /// # Returns
    /// * `Result<(), KeystoreError>` - `CredentialsMismatch` if a different
    ///   keystore or password was loaded first
    pub fn load(&self, path: impl AsRef<Path>, password: &SecretString) -> Result<(), KeystoreError> {
        self.entry(path.as_ref(), password).map(|_| ())
    }

    /// Decimal serial number of the merchant certificate, the gateway's `certId`
    pub fn certificate_serial(
        &self,
        path: impl AsRef<Path>,
        password: &SecretString,
    ) -> Result<String, KeystoreError> {
        let entry = self.entry(path.as_ref(), password)?;
        Ok(certificate_serial(entry.leaf()?)?)
    }

    pub fn private_key(
        &self,
        path: impl AsRef<Path>,
        password: &SecretString,
    ) -> Result<MerchantKey, KeystoreError> {
        let entry = self.entry(path.as_ref(), password)?;
        Ok(entry.private_key.clone())
    }

    /// Friendly name of the selected key entry, once loaded
    pub fn alias(&self) -> Option<&str> {
        self.entry.get().and_then(|entry| entry.alias.as_deref())
    }

    pub fn is_loaded(&self) -> bool {
        self.entry.get().is_some()
    }

    fn entry(&self, path: &Path, password: &SecretString) -> Result<&KeyEntry, KeystoreError> {
        if let Some(entry) = self.entry.get() {
            entry.check_credentials(path, password)?;
            return Ok(entry);
        }

        let fresh = KeyEntry::open(path, password)?;
        info!(
            path = %path.display(),
            alias = fresh.alias.as_deref().unwrap_or("<none>"),
            chain_len = fresh.chain.len(),
            "Merchant keystore loaded"
        );
        // A concurrent loader may have won; its entry is kept and checked instead
        let entry = self.entry.get_or_init(|| fresh);
        entry.check_credentials(path, password)?;
        Ok(entry)
    }
}

impl fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("KeyStore");
        match self.entry.get() {
            Some(entry) => debug
                .field("path", &entry.path)
                .field("alias", &entry.alias)
                .field("private_key", &entry.private_key),
            None => debug.field("loaded", &false),
        };
        debug.finish()
    }
}
