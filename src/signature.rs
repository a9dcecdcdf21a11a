//! Message signing and verification
//!
//! The gateway signs the lowercase hex SHA-256 digest of a message rather
//! than the message itself, so the bytes handed to SHA256withRSA are the 64
//! ASCII characters of that digest. Both sides must reproduce this double
//! hash exactly; see [`signing_digest`].

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use openssl::hash::MessageDigest;
use openssl::sign::{Signer, Verifier};
use openssl::x509::X509;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::chain::{assess_signer, UntrustReason, Verdict};
use crate::error::{CertificateError, SignatureError};
use crate::merchant_key::MerchantKey;
use crate::trust_store::TrustStore;

const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const PEM_END: &str = "-----END CERTIFICATE-----";

/// UTF-8 bytes of the lowercase hex SHA-256 digest of `data`
pub fn signing_digest(data: &str) -> Vec<u8> {
    format!("{:x}", Sha256::digest(data.as_bytes())).into_bytes()
}

/// Sign `data` with the merchant key, returning base64
pub fn sign(private_key: &MerchantKey, data: &str) -> Result<String, SignatureError> {
    let pkey = private_key.to_pkey()?;
    let mut signer =
        Signer::new(MessageDigest::sha256(), &pkey).map_err(SignatureError::Signer)?;
    let signature = signer
        .sign_oneshot_to_vec(&signing_digest(data))
        .map_err(SignatureError::Sign)?;
    Ok(BASE64.encode(signature))
}

/// Check a counterparty signature over `data`.
///
/// `signer_cert_pem` must chain to the pinned anchors and carry an allowed
/// identity. Every failure, whether a malformed certificate, an untrusted
/// signer or a bad signature, yields the same `false`.
pub fn verify(store: &TrustStore, data: &str, signature_base64: &str, signer_cert_pem: &str) -> bool {
    Verdict::from_result(check_signature(store, data, signature_base64, signer_cert_pem))
        .is_trusted("verify")
}

fn check_signature(
    store: &TrustStore,
    data: &str,
    signature_base64: &str,
    signer_cert_pem: &str,
) -> Result<(), UntrustReason> {
    let digest = signing_digest(data);
    let signature = BASE64
        .decode(signature_base64.trim())
        .map_err(|_| UntrustReason::SignatureMismatch)?;

    let cert = parse_certificate(signer_cert_pem).ok_or(UntrustReason::CertificateUnparsable)?;
    if let Verdict::Untrusted(reason) = assess_signer(store, &cert) {
        return Err(reason);
    }

    let public_key = cert.public_key()?;
    let mut verifier = Verifier::new(MessageDigest::sha256(), &public_key)?;
    // A malformed signature surfaces as an error from openssl; treat it as a mismatch
    match verifier.verify_oneshot(&signature, &digest) {
        Ok(true) => Ok(()),
        Ok(false) | Err(_) => Err(UntrustReason::SignatureMismatch),
    }
}

/// Parse a `-----BEGIN CERTIFICATE-----` block, or bare base64 DER
pub fn parse_certificate(pem: &str) -> Option<X509> {
    try_parse_certificate(pem)
        .map_err(|e| debug!(error = %e, "Signer certificate rejected"))
        .ok()
}

fn try_parse_certificate(pem: &str) -> Result<X509, CertificateError> {
    let body: String = pem
        .replace(PEM_END, "")
        .replace(PEM_BEGIN, "")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let der = BASE64.decode(body)?;
    X509::from_der(&der).map_err(CertificateError::Malformed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_pki::{pki, rogue_pki};

    fn merchant_key(pki: &crate::test_pki::TestPki) -> MerchantKey {
        MerchantKey::new(&pki.signer_key).unwrap()
    }

    const MESSAGE: &str = "accessType=0&bizType=000201&merId=777290058110048&orderId=20240101000001&txnAmt=100";

    #[test]
    fn test_signing_digest_is_lowercase_hex() {
        assert_eq!(
            signing_digest("abc"),
            b"ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad".to_vec()
        );
        assert_eq!(signing_digest("").len(), 64);
    }

    #[test]
    fn test_sign_then_verify() {
        let signature = sign(&merchant_key(pki()), MESSAGE).unwrap();
        assert!(verify(&pki().trust_store(), MESSAGE, &signature, &pki().signer_pem()));
    }

    #[test]
    fn test_signature_covers_hex_digest_not_message() {
        let signature = BASE64
            .decode(sign(&merchant_key(pki()), MESSAGE).unwrap())
            .unwrap();
        let public_key = pki().signer_cert.public_key().unwrap();

        let mut verifier = Verifier::new(MessageDigest::sha256(), &public_key).unwrap();
        assert!(verifier.verify_oneshot(&signature, &signing_digest(MESSAGE)).unwrap());

        let mut verifier = Verifier::new(MessageDigest::sha256(), &public_key).unwrap();
        assert!(!verifier
            .verify_oneshot(&signature, MESSAGE.as_bytes())
            .unwrap_or(false));
    }

    #[test]
    fn test_mutated_message_fails() {
        let signature = sign(&merchant_key(pki()), MESSAGE).unwrap();
        let mutated = MESSAGE.replace("txnAmt=100", "txnAmt=101");
        assert!(!verify(&pki().trust_store(), &mutated, &signature, &pki().signer_pem()));
    }

    #[test]
    fn test_untrusted_signer_fails_even_with_valid_signature() {
        // Correctly signed by the rogue key, presented with the rogue certificate
        let signature = sign(&merchant_key(rogue_pki()), MESSAGE).unwrap();
        assert!(!verify(
            &pki().trust_store(),
            MESSAGE,
            &signature,
            &rogue_pki().signer_pem()
        ));
    }

    #[test]
    fn test_certificate_swap_fails() {
        // Signed by the rogue key but presented with the trusted certificate
        let signature = sign(&merchant_key(rogue_pki()), MESSAGE).unwrap();
        assert!(!verify(&pki().trust_store(), MESSAGE, &signature, &pki().signer_pem()));
    }

    #[test]
    fn test_garbage_inputs_fail_without_panicking() {
        let store = pki().trust_store();
        let signature = sign(&merchant_key(pki()), MESSAGE).unwrap();
        assert!(!verify(&store, MESSAGE, "!!not base64!!", &pki().signer_pem()));
        assert!(!verify(&store, MESSAGE, "AAAA", &pki().signer_pem()));
        assert!(!verify(&store, MESSAGE, &signature, "not a certificate"));
        assert!(!verify(&store, MESSAGE, &signature, ""));
    }

    #[test]
    fn test_parse_certificate_accepts_pem_and_bare_base64() {
        let pem = pki().signer_pem();
        let parsed = parse_certificate(&pem).unwrap();
        assert_eq!(parsed.to_der().unwrap(), pki().signer_cert.to_der().unwrap());

        let bare = BASE64.encode(pki().signer_cert.to_der().unwrap());
        assert!(parse_certificate(&bare).is_some());
    }

    #[test]
    fn test_parse_certificate_rejects_other_labels() {
        let pem = pki()
            .signer_pem()
            .replace("BEGIN CERTIFICATE", "BEGIN X509 CERTIFICATE")
            .replace("END CERTIFICATE", "END X509 CERTIFICATE");
        assert!(parse_certificate(&pem).is_none());
        assert!(parse_certificate("-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----").is_none());
    }
}
