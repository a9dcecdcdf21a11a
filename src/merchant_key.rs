//! Secure in-memory holder for the merchant signing key
//!
//! The key is kept as PKCS#8 DER inside a `secrecy` box so it is zeroized on
//! drop and never shows up in debug output. An openssl key object is rebuilt
//! only for the duration of a signing or decryption call.

use openssl::pkey::{PKey, Private};
use secrecy::{ExposeSecret, SecretBox};
use std::fmt;

use crate::error::KeystoreError;

pub struct MerchantKey {
    der_bytes: SecretBox<Vec<u8>>,
}

impl MerchantKey {
    pub fn new(key: &PKey<Private>) -> Result<Self, KeystoreError> {
        let der_bytes = key
            .private_key_to_pkcs8()
            .map_err(KeystoreError::KeyMaterial)?;

        Ok(Self {
            der_bytes: SecretBox::new(Box::new(der_bytes)),
        })
    }

    /// Rebuild the openssl key object from the protected DER bytes
    pub fn to_pkey(&self) -> Result<PKey<Private>, KeystoreError> {
        PKey::private_key_from_pkcs8(self.der_bytes.expose_secret())
            .map_err(KeystoreError::KeyMaterial)
    }
}

impl Clone for MerchantKey {
    fn clone(&self) -> Self {
        Self {
            der_bytes: SecretBox::new(Box::new(self.der_bytes.expose_secret().clone())),
        }
    }
}

impl fmt::Debug for MerchantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MerchantKey")
            .field("private_key", &"<securely stored>")
            .finish()
    }
}
