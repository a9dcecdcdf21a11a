//! Raw certificate byte providers
//!
//! The pinned root, intermediate and encryption certificates reach this crate
//! as opaque byte buffers. Where those bytes come from (embedded resources,
//! files shipped with the deployment, a secrets service) is decided by a
//! [`CertificateSource`] implementation keyed by [`Environment`].

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fmt;
use std::fs;

use crate::configs::{Anchors, AppConfig, Environment};

/// Which pinned certificate slot is being requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CertificateKind {
    Root,
    Intermediate,
    Encryption,
}

impl fmt::Display for CertificateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CertificateKind::Root => f.write_str("root"),
            CertificateKind::Intermediate => f.write_str("intermediate"),
            CertificateKind::Encryption => f.write_str("encryption"),
        }
    }
}

/// Supplies the raw (PEM or DER) bytes of a pinned certificate.
pub trait CertificateSource: Send + Sync {
    fn certificate_bytes(&self, environment: Environment, kind: CertificateKind) -> Result<Vec<u8>>;
}

/// Reads pinned certificates from the file paths in [`AppConfig`].
#[derive(Debug, Clone)]
pub struct FileCertificateSource {
    anchors: Anchors,
}

impl FileCertificateSource {
    pub fn new(anchors: Anchors) -> Self {
        Self { anchors }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.anchors.clone())
    }
}

impl CertificateSource for FileCertificateSource {
    fn certificate_bytes(&self, environment: Environment, kind: CertificateKind) -> Result<Vec<u8>> {
        let paths = self.anchors.for_environment(environment);
        let path = match kind {
            CertificateKind::Root => &paths.root,
            CertificateKind::Intermediate => &paths.intermediate,
            CertificateKind::Encryption => &paths.encryption,
        };
        fs::read(path).with_context(|| {
            format!(
                "Failed to read {} {} certificate from {}",
                environment,
                kind,
                path.to_str().unwrap_or("<invalid path>")
            )
        })
    }
}

/// In-memory certificate bytes, e.g. compiled into the binary with `include_bytes!`.
#[derive(Debug, Clone, Default)]
pub struct StaticCertificateSource {
    entries: HashMap<(Environment, CertificateKind), Vec<u8>>,
}

impl StaticCertificateSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, environment: Environment, kind: CertificateKind, bytes: impl Into<Vec<u8>>) -> Self {
        self.entries.insert((environment, kind), bytes.into());
        self
    }
}

impl CertificateSource for StaticCertificateSource {
    fn certificate_bytes(&self, environment: Environment, kind: CertificateKind) -> Result<Vec<u8>> {
        self.entries
            .get(&(environment, kind))
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("No {} {} certificate registered", environment, kind))
    }
}
