//! Sensitive field encryption
//!
//! Card numbers, CVN2 and similar fields travel to the gateway encrypted with
//! RSA PKCS#1 v1.5 under the network's pinned encryption certificate, and come
//! back encrypted under the merchant certificate. Ciphertext is base64 on the
//! wire. One RSA block per field; there is no hybrid scheme.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use openssl::rsa::Padding;
use openssl::x509::X509Ref;

use crate::error::{DecryptionError, EncryptionError};
use crate::merchant_key::MerchantKey;
use crate::trust_store::TrustStore;

/// Bytes of PKCS#1 v1.5 encryption padding (0x00 0x02, 8 random non-zero bytes, 0x00)
pub const PKCS1_PADDING_OVERHEAD: usize = 11;

const OPENSSL_3_2: i64 = 0x3020_0000;
const RSA_PKCS1_NO_IMPLICIT_REJECT_PADDING: i32 = 7;

/// Encrypt a sensitive field with the network's pinned encryption certificate
///
/// # Arguments
/// * `store` - Trust store holding the pinned encryption certificate
/// * `plaintext` - Field value; its UTF-8 bytes are encrypted
///
/// # Returns
/// * `Result<String, EncryptionError>` - Base64 ciphertext, or
///   `CertificateUnavailable` when the certificate cannot be loaded
pub fn encrypt(store: &TrustStore, plaintext: &str) -> Result<String, EncryptionError> {
    let cert = store
        .encryption_certificate()
        .ok_or(EncryptionError::CertificateUnavailable)?;
    encrypt_with(cert, plaintext)
}

/// RSA/PKCS#1 v1.5 encrypt the UTF-8 bytes of `plaintext` for `cert`, returning base64
pub fn encrypt_with(cert: &X509Ref, plaintext: &str) -> Result<String, EncryptionError> {
    let rsa = cert
        .public_key()
        .and_then(|key| key.rsa())
        .map_err(EncryptionError::NotRsa)?;

    let data = plaintext.as_bytes();
    let max = (rsa.size() as usize).saturating_sub(PKCS1_PADDING_OVERHEAD);
    if data.len() > max {
        return Err(EncryptionError::PlaintextTooLong {
            len: data.len(),
            max,
        });
    }

    // Padding bytes come from openssl's CSPRNG
    let mut ciphertext = vec![0u8; rsa.size() as usize];
    let len = rsa
        .public_encrypt(data, &mut ciphertext, Padding::PKCS1)
        .map_err(EncryptionError::Encrypt)?;
    ciphertext.truncate(len);

    Ok(BASE64.encode(ciphertext))
}

/// Largest plaintext, in bytes, that `cert` can encrypt in one block
pub fn max_plaintext_len(cert: &X509Ref) -> Result<usize, EncryptionError> {
    let rsa = cert
        .public_key()
        .and_then(|key| key.rsa())
        .map_err(EncryptionError::NotRsa)?;
    Ok((rsa.size() as usize).saturating_sub(PKCS1_PADDING_OVERHEAD))
}

/// Decrypt a base64 RSA/PKCS#1 v1.5 ciphertext with the merchant key
///
/// # Arguments
/// * `private_key` - Merchant key the ciphertext was produced for
/// * `ciphertext_base64` - Base64 of exactly one RSA block
///
/// # Returns
/// * `Result<String, DecryptionError>` - The UTF-8 plaintext, or `Decrypt`
///   when the block does not unpad under this key
pub fn decrypt(private_key: &MerchantKey, ciphertext_base64: &str) -> Result<String, DecryptionError> {
    let ciphertext = BASE64.decode(ciphertext_base64.trim())?;

    let pkey = private_key.to_pkey()?;
    let rsa = pkey.rsa().map_err(DecryptionError::NotRsa)?;

    let mut plaintext = vec![0u8; rsa.size() as usize];
    let len = rsa
        .private_decrypt(&ciphertext, &mut plaintext, decrypt_padding())
        .map_err(DecryptionError::Decrypt)?;
    plaintext.truncate(len);

    Ok(String::from_utf8(plaintext)?)
}

/// From 3.2 openssl answers a malformed PKCS#1 v1.5 block with synthetic
/// plaintext unless implicit rejection is switched off
fn decrypt_padding() -> Padding {
    if openssl::version::number() >= OPENSSL_3_2 {
        Padding::from_raw(RSA_PKCS1_NO_IMPLICIT_REJECT_PADDING)
    } else {
        Padding::PKCS1
    }
}
