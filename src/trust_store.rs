//! Pinned certificate cache
//!
//! Holds the gateway's root authority, intermediate authority and field
//! encryption certificates for one [`Environment`]. Each slot is populated on
//! first use from a [`CertificateSource`] and never replaced afterwards. A
//! failed load leaves the slot empty and the getter answers `None`; the next
//! call tries again.
//!
//! Concurrent first access is benign: every racer decodes the same bytes and
//! the single-assignment cell keeps whichever value landed first.

use openssl::x509::{X509, X509Ref};
use std::fmt;
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::certificate_source::{CertificateKind, CertificateSource};
use crate::configs::Environment;
use crate::error::CertificateError;

pub struct TrustStore {
    environment: Environment,
    source: Box<dyn CertificateSource>,
    root: OnceLock<X509>,
    intermediate: OnceLock<X509>,
    encryption: OnceLock<X509>,
}

impl TrustStore {
    /// Create an empty store; nothing is read until a certificate is requested
    ///
    /// # Arguments
    /// * `environment` - Which anchor set to request from `source`
    /// * `source` - Provider of raw certificate bytes
    pub fn new(environment: Environment, source: impl CertificateSource + 'static) -> Self {
        Self {
            environment,
            source: Box::new(source),
            root: OnceLock::new(),
            intermediate: OnceLock::new(),
            encryption: OnceLock::new(),
        }
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// The pinned root authority, the only trust anchor for signer chains
    pub fn root_certificate(&self) -> Option<&X509> {
        self.certificate(CertificateKind::Root)
    }

    pub fn intermediate_certificate(&self) -> Option<&X509> {
        self.certificate(CertificateKind::Intermediate)
    }

    /// The network's published certificate for encrypting sensitive fields
    pub fn encryption_certificate(&self) -> Option<&X509> {
        self.certificate(CertificateKind::Encryption)
    }

    /// Decimal serial number of the encryption certificate, sent alongside
    /// encrypted fields so the gateway knows which key to decrypt with
    pub fn encryption_certificate_serial(&self) -> Option<String> {
        let cert = self.encryption_certificate()?;
        certificate_serial(cert)
            .map_err(|e| warn!(error = %e, "Failed to read encryption certificate serial"))
            .ok()
    }

    fn slot(&self, kind: CertificateKind) -> &OnceLock<X509> {
        match kind {
            CertificateKind::Root => &self.root,
            CertificateKind::Intermediate => &self.intermediate,
            CertificateKind::Encryption => &self.encryption,
        }
    }

    fn certificate(&self, kind: CertificateKind) -> Option<&X509> {
        let slot = self.slot(kind);
        if let Some(cert) = slot.get() {
            return Some(cert);
        }

        let loaded = self
            .source
            .certificate_bytes(self.environment, kind)
            .and_then(|bytes| decode_certificate(&bytes).map_err(anyhow::Error::from));
        match loaded {
            Ok(cert) => {
                if slot.set(cert).is_err() {
                    debug!(%kind, "Pinned certificate populated concurrently");
                } else {
                    debug!(%kind, environment = %self.environment, "Pinned certificate loaded");
                }
                slot.get()
            }
            Err(e) => {
                warn!(%kind, environment = %self.environment, error = %e, "Pinned certificate unavailable");
                None
            }
        }
    }
}

impl fmt::Debug for TrustStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustStore")
            .field("environment", &self.environment)
            .field("root_loaded", &self.root.get().is_some())
            .field("intermediate_loaded", &self.intermediate.get().is_some())
            .field("encryption_loaded", &self.encryption.get().is_some())
            .finish()
    }
}

/// Decode a certificate supplied either as PEM or as raw DER
pub fn decode_certificate(bytes: &[u8]) -> Result<X509, CertificateError> {
    if bytes.starts_with(b"-----") {
        X509::from_pem(bytes).map_err(CertificateError::Malformed)
    } else {
        X509::from_der(bytes).map_err(CertificateError::Malformed)
    }
}

/// Serial number in decimal, the form the gateway uses for certificate ids
pub fn certificate_serial(cert: &X509Ref) -> Result<String, CertificateError> {
    let serial = cert
        .serial_number()
        .to_bn()
        .map_err(CertificateError::Field)?;
    let decimal = serial.to_dec_str().map_err(CertificateError::Field)?;
    Ok(decimal.to_string())
}
