//! Error types for the gateway crypto pipeline.
//!
//! Keystore, encryption and decompression failures are operator-visible and
//! propagate as typed errors. Certificate and chain problems are folded into
//! a plain "not trusted" answer by the verification paths and only surface
//! here when a caller parses a certificate explicitly.

use std::path::PathBuf;

use openssl::error::ErrorStack;

/// Failure to open, decode or select an entry from the merchant PKCS#12 keystore.
#[derive(Debug, thiserror::Error)]
pub enum KeystoreError {
    #[error("Failed to read keystore file {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Keystore file {path} is not a PKCS#12 container: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: ErrorStack,
    },
    #[error("Failed to open keystore {path}: wrong password or corrupt MAC")]
    BadPassword {
        path: PathBuf,
        #[source]
        source: ErrorStack,
    },
    #[error("Keystore {path} contains no private key entry")]
    NoKeyEntry { path: PathBuf },
    #[error("Keystore {path} has a key entry but no certificate")]
    MissingCertificate { path: PathBuf },
    #[error("Keystore {path} pairs its private key with a certificate for another key")]
    KeyCertificateMismatch { path: PathBuf },
    #[error("Keystore already loaded from {loaded}; refusing different credentials for {requested}")]
    CredentialsMismatch { loaded: PathBuf, requested: PathBuf },
    #[error("Keystore key material could not be encoded: {0}")]
    KeyMaterial(#[source] ErrorStack),
    #[error("Keystore certificate could not be read: {0}")]
    Certificate(#[from] CertificateError),
}

/// A certificate or distinguished name that could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum CertificateError {
    #[error("Certificate bytes are not valid PEM or DER: {0}")]
    Malformed(#[source] ErrorStack),
    #[error("Certificate body is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Distinguished name entry {field} is not valid UTF-8")]
    UnparsableName { field: String },
    #[error("Certificate field could not be read: {0}")]
    Field(#[source] ErrorStack),
}

/// Failure to produce a signature with the merchant key.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error(transparent)]
    Keystore(#[from] KeystoreError),
    #[error("Failed to initialise SHA256withRSA signer: {0}")]
    Signer(#[source] ErrorStack),
    #[error("RSA signing failed: {0}")]
    Sign(#[source] ErrorStack),
}

#[derive(Debug, thiserror::Error)]
pub enum EncryptionError {
    #[error("Encryption certificate is unavailable")]
    CertificateUnavailable,
    #[error("Encryption certificate does not carry an RSA public key: {0}")]
    NotRsa(#[source] ErrorStack),
    #[error("Plaintext of {len} bytes exceeds the {max} byte PKCS#1 v1.5 limit")]
    PlaintextTooLong { len: usize, max: usize },
    #[error("RSA encryption failed: {0}")]
    Encrypt(#[source] ErrorStack),
}

#[derive(Debug, thiserror::Error)]
pub enum DecryptionError {
    #[error("Ciphertext is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error(transparent)]
    Keystore(#[from] KeystoreError),
    #[error("Private key is not an RSA key: {0}")]
    NotRsa(#[source] ErrorStack),
    #[error("RSA decryption failed (padding or key mismatch): {0}")]
    Decrypt(#[source] ErrorStack),
    #[error("Decrypted payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

#[derive(Debug, thiserror::Error)]
pub enum InflateError {
    #[error("Compressed payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Raw deflate stream is corrupt: {0}")]
    Corrupt(#[from] flate2::DecompressError),
}
