//! Signer identity extraction
//!
//! The network encodes a signer's role in the subject common name as
//! `CN=<merchant>@<institution>@<identity>[@<sequence>]`. Only the third
//! `@`-separated field matters for policy, and it must equal one of two
//! literals. This is not a general DN parser.

use openssl::x509::{X509NameRef, X509Ref};
use tracing::debug;

use crate::error::CertificateError;

/// Registered legal-entity name of the network operator
pub const REGISTERED_LEGAL_NAME: &str = "中国银联股份有限公司";

/// Identity token carried by the gateway's signing certificates
pub const SIGNING_TERMINAL_ID: &str = "00040000:SIGN";

const CN_PREFIX: &str = "CN=";
const RDN_SEPARATOR: char = ',';
const IDENTITY_SEPARATOR: char = '@';
const IDENTITY_FIELD: usize = 2;

/// Render a name as `C=CN, O=..., CN=...` in encoded order
pub fn distinguished_name(name: &X509NameRef) -> Result<String, CertificateError> {
    let mut parts = Vec::new();
    for entry in name.entries() {
        let object = entry.object();
        let field = match object.nid().short_name() {
            Ok(short) => short.to_string(),
            Err(_) => object.to_string(),
        };
        let data = entry.data();
        let value = data
            .as_utf8()
            .map_err(|_| CertificateError::UnparsableName {
                field: field.clone(),
            })?;
        if is_truncated(data.as_slice(), &value) {
            return Err(CertificateError::UnparsableName { field });
        }
        parts.push(format!("{}={}", field, &*value));
    }
    Ok(parts.join(", "))
}

/// `as_utf8` stops at the first NUL. A value it cut short is either a raw
/// prefix of the encoded bytes, or has fewer characters than any ASN.1
/// string type could encode in that many bytes.
fn is_truncated(raw: &[u8], rendered: &str) -> bool {
    let cut_prefix = raw.len() > rendered.len() && raw.starts_with(rendered.as_bytes());
    let too_few_chars = rendered.chars().count() * 4 < raw.len();
    cut_prefix || too_few_chars
}

/// Third `@` field of the CN value in `dn`, or empty when absent
pub fn identity_from_dn(dn: &str) -> String {
    let Some(start) = dn.find(CN_PREFIX) else {
        return String::new();
    };
    let cn = &dn[start + CN_PREFIX.len()..];
    let cn = match cn.find(RDN_SEPARATOR) {
        Some(end) => &cn[..end],
        None => cn,
    };
    cn.split(IDENTITY_SEPARATOR)
        .nth(IDENTITY_FIELD)
        .map(str::to_string)
        .unwrap_or_default()
}

/// Identity token from a certificate's subject. Unreadable subjects yield
/// an empty token, which no policy accepts.
pub fn extract_identity(cert: &X509Ref) -> String {
    match distinguished_name(cert.subject_name()) {
        Ok(dn) => identity_from_dn(&dn),
        Err(e) => {
            debug!(error = %e, "Certificate subject not readable");
            String::new()
        }
    }
}

pub fn is_allowed_identity(identity: &str) -> bool {
    identity == REGISTERED_LEGAL_NAME || identity == SIGNING_TERMINAL_ID
}
