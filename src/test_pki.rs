//! Throwaway certificate hierarchy for unit tests
//!
//! ```text
//! Root CA (self-signed, pathlen=1)
//!   └── Intermediate CA (pathlen=0)
//!       ├── Signing certificate   CN=041@Z12@00040000:SIGN@00000062
//!       └── Encryption certificate
//! ```

use anyhow::{anyhow, Result};
use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::x509::extension::{BasicConstraints, KeyUsage};
use openssl::x509::{X509Name, X509};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::certificate_source::{CertificateKind, StaticCertificateSource};
use crate::configs::Environment;
use crate::trust_store::TrustStore;

const X509_VERSION_3: i32 = 2; // X509 version 3 is represented by 2
const RSA_KEY_SIZE_TEST: u32 = 2048;
const ROOT_CA_PATH_LENGTH: u32 = 1;
const INTERMEDIATE_CA_PATH_LENGTH: u32 = 0;
const SECONDS_PER_DAY: i64 = 86_400;

pub(crate) const SIGNER_CN: &str = "041@Z12@00040000:SIGN@00000062";
pub(crate) const KEYSTORE_PASSWORD: &str = "000000";

#[derive(Debug, Clone, Copy)]
pub(crate) enum CertificateDataType {
    RootCA,
    IntermediateCA,
    UserCert,
}

#[derive(Debug, Clone)]
pub(crate) struct CertificateData {
    pub subject_common_name: String,
    pub organization: String,
    pub organizational_unit: String,
    pub country: String,
    /// Offset of notBefore from now, in days
    pub not_before_days: i64,
    /// Offset of notAfter from now, in days
    pub not_after_days: i64,
    pub cert_type: CertificateDataType,
}

impl CertificateData {
    pub(crate) fn new(common_name: &str, cert_type: CertificateDataType) -> Self {
        Self {
            subject_common_name: common_name.to_string(),
            organization: "China Financial Certification Authority".to_string(),
            organizational_unit: "ACP Test".to_string(),
            country: "CN".to_string(),
            not_before_days: -1,
            not_after_days: 365,
            cert_type,
        }
    }

    pub(crate) fn validity(mut self, not_before_days: i64, not_after_days: i64) -> Self {
        self.not_before_days = not_before_days;
        self.not_after_days = not_after_days;
        self
    }
}

fn asn1_days_from_now(days: i64) -> Result<Asn1Time> {
    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as i64;
    Asn1Time::from_unix((now + days * SECONDS_PER_DAY) as _)
        .map_err(|e| anyhow!("Failed to create validity time: {}", e))
}

fn generate_rsa_key() -> Result<PKey<Private>> {
    let rsa = Rsa::generate(RSA_KEY_SIZE_TEST)
        .map_err(|e| anyhow!("Failed to generate RSA keypair: {}", e))?;
    PKey::from_rsa(rsa).map_err(|e| anyhow!("Failed to create private key: {}", e))
}

/// Issue a certificate for a fresh key. Passing `None` as issuer self-signs.
pub(crate) fn issue(
    cert_data: &CertificateData,
    issuer: Option<(&PKey<Private>, &X509)>,
) -> Result<(PKey<Private>, X509)> {
    let private_key = generate_rsa_key()?;

    let mut builder =
        X509::builder().map_err(|e| anyhow!("Failed to create X509 builder: {}", e))?;
    builder.set_version(X509_VERSION_3)?;

    // Random 64-bit serial keeps the decimal form short in assertions
    let mut serial = BigNum::new()?;
    serial.rand(64, MsbOption::MAYBE_ZERO, false)?;
    let serial = serial.to_asn1_integer()?;
    builder.set_serial_number(&serial)?;

    let mut name_builder = X509Name::builder()?;
    name_builder
        .append_entry_by_nid(Nid::COMMONNAME, &cert_data.subject_common_name)
        .map_err(|e| anyhow!("Failed to set CN: {}", e))?;
    name_builder.append_entry_by_nid(Nid::ORGANIZATIONNAME, &cert_data.organization)?;
    name_builder
        .append_entry_by_nid(Nid::ORGANIZATIONALUNITNAME, &cert_data.organizational_unit)?;
    name_builder.append_entry_by_nid(Nid::COUNTRYNAME, &cert_data.country)?;
    let name = name_builder.build();
    builder.set_subject_name(&name)?;
    match issuer {
        Some((_, issuer_cert)) => builder.set_issuer_name(issuer_cert.subject_name())?,
        None => builder.set_issuer_name(&name)?,
    }

    let not_before = asn1_days_from_now(cert_data.not_before_days)?;
    let not_after = asn1_days_from_now(cert_data.not_after_days)?;
    builder.set_not_before(&not_before)?;
    builder.set_not_after(&not_after)?;
    builder.set_pubkey(&private_key)?;

    let mut bc = BasicConstraints::new();
    let mut ku = KeyUsage::new();
    ku.critical();
    match cert_data.cert_type {
        CertificateDataType::RootCA => {
            bc.critical().ca().pathlen(ROOT_CA_PATH_LENGTH);
            ku.key_cert_sign().crl_sign().digital_signature();
        }
        CertificateDataType::IntermediateCA => {
            bc.critical().ca().pathlen(INTERMEDIATE_CA_PATH_LENGTH);
            ku.key_cert_sign().crl_sign().digital_signature();
        }
        CertificateDataType::UserCert => {
            bc.critical();
            ku.digital_signature()
                .non_repudiation()
                .key_encipherment()
                .data_encipherment();
        }
    }
    builder.append_extension(bc.build()?)?;
    builder.append_extension(ku.build()?)?;

    let signing_key = issuer.map(|(key, _)| key).unwrap_or(&private_key);
    builder
        .sign(signing_key, MessageDigest::sha256())
        .map_err(|e| anyhow!("Failed to sign certificate: {}", e))?;

    Ok((private_key, builder.build()))
}

/// Bundle a key and its certificate into a password-protected PKCS#12 container
pub(crate) fn pkcs12_der(
    alias: &str,
    key: &PKey<Private>,
    cert: &X509,
    password: &str,
) -> Result<Vec<u8>> {
    let pkcs12 = Pkcs12::builder()
        .name(alias)
        .pkey(key)
        .cert(cert)
        .build2(password)
        .map_err(|e| anyhow!("Failed to build PKCS#12: {}", e))?;
    Ok(pkcs12.to_der()?)
}

pub(crate) struct TestPki {
    pub root_cert: X509,
    pub intermediate_key: PKey<Private>,
    pub intermediate_cert: X509,
    pub signer_key: PKey<Private>,
    pub signer_cert: X509,
    pub encryption_key: PKey<Private>,
    pub encryption_cert: X509,
}

impl TestPki {
    fn generate() -> Result<Self> {
        let (root_key, root_cert) = issue(
            &CertificateData::new("CFCA ACP TEST OCA1", CertificateDataType::RootCA)
                .validity(-1, 3650),
            None,
        )?;
        let (intermediate_key, intermediate_cert) = issue(
            &CertificateData::new("CFCA ACP TEST OCA31", CertificateDataType::IntermediateCA)
                .validity(-1, 1825),
            Some((&root_key, &root_cert)),
        )?;
        let (signer_key, signer_cert) = issue(
            &CertificateData::new(SIGNER_CN, CertificateDataType::UserCert),
            Some((&intermediate_key, &intermediate_cert)),
        )?;
        let (encryption_key, encryption_cert) = issue(
            &CertificateData::new("041@Z12@00040000:ENC@00000063", CertificateDataType::UserCert),
            Some((&intermediate_key, &intermediate_cert)),
        )?;
        Ok(Self {
            root_cert,
            intermediate_key,
            intermediate_cert,
            signer_key,
            signer_cert,
            encryption_key,
            encryption_cert,
        })
    }

    /// Issue a leaf under this hierarchy's intermediate CA
    pub(crate) fn issue_leaf(&self, cert_data: &CertificateData) -> (PKey<Private>, X509) {
        issue(cert_data, Some((&self.intermediate_key, &self.intermediate_cert))).unwrap()
    }

    /// Pinned-anchor source for the test environment, root and intermediate in PEM,
    /// encryption certificate in DER
    pub(crate) fn source(&self) -> StaticCertificateSource {
        StaticCertificateSource::new()
            .with(
                Environment::Test,
                CertificateKind::Root,
                self.root_cert.to_pem().unwrap(),
            )
            .with(
                Environment::Test,
                CertificateKind::Intermediate,
                self.intermediate_cert.to_pem().unwrap(),
            )
            .with(
                Environment::Test,
                CertificateKind::Encryption,
                self.encryption_cert.to_der().unwrap(),
            )
    }

    pub(crate) fn trust_store(&self) -> TrustStore {
        TrustStore::new(Environment::Test, self.source())
    }

    pub(crate) fn signer_pem(&self) -> String {
        String::from_utf8(self.signer_cert.to_pem().unwrap()).unwrap()
    }
}

/// Shared hierarchy; RSA generation dominates test time so it is built once
pub(crate) fn pki() -> &'static TestPki {
    static PKI: OnceLock<TestPki> = OnceLock::new();
    PKI.get_or_init(|| TestPki::generate().unwrap())
}

/// A second, unrelated hierarchy used to forge signers
pub(crate) fn rogue_pki() -> &'static TestPki {
    static PKI: OnceLock<TestPki> = OnceLock::new();
    PKI.get_or_init(|| TestPki::generate().unwrap())
}
