//! Signer chain validation and trust policy
//!
//! A counterparty signer is trusted when all of the following hold:
//!
//! 1. the current time lies inside its validity window,
//! 2. a path can be built from it through the pinned intermediate to the
//!    pinned root, with the root as the only trust anchor,
//! 3. its subject identity equals [`REGISTERED_LEGAL_NAME`] or
//!    [`SIGNING_TERMINAL_ID`].
//!
//! Revocation is not checked. Internally every decision is a [`Verdict`]
//! carrying the reason for rejection, which is logged at debug level. The
//! public functions collapse it to `bool` so callers cannot distinguish a
//! malformed chain from a wrong identity.
//!
//! [`REGISTERED_LEGAL_NAME`]: crate::identity::REGISTERED_LEGAL_NAME
//! [`SIGNING_TERMINAL_ID`]: crate::identity::SIGNING_TERMINAL_ID

use openssl::asn1::{Asn1Time, Asn1TimeRef};
use openssl::error::ErrorStack;
use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::{X509Ref, X509StoreContext, X509};
use std::fmt;
use tracing::debug;

use crate::certificate_source::CertificateKind;
use crate::identity::{extract_identity, is_allowed_identity};
use crate::trust_store::TrustStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum UntrustReason {
    AnchorUnavailable(CertificateKind),
    NotYetValid,
    Expired,
    /// Path building ran but rejected the chain
    ChainRejected(&'static str),
    /// Path building could not run at all
    Verifier(String),
    IdentityMismatch(String),
    CertificateUnparsable,
    SignatureMismatch,
}

impl fmt::Display for UntrustReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UntrustReason::AnchorUnavailable(kind) => write!(f, "pinned {} certificate unavailable", kind),
            UntrustReason::NotYetValid => f.write_str("signer certificate not yet valid"),
            UntrustReason::Expired => f.write_str("signer certificate expired"),
            UntrustReason::ChainRejected(why) => write!(f, "chain rejected: {}", why),
            UntrustReason::Verifier(why) => write!(f, "path builder failed: {}", why),
            UntrustReason::IdentityMismatch(id) => write!(f, "identity {:?} not allowed", id),
            UntrustReason::CertificateUnparsable => f.write_str("signer certificate unparsable"),
            UntrustReason::SignatureMismatch => f.write_str("signature mismatch"),
        }
    }
}

impl From<ErrorStack> for UntrustReason {
    fn from(e: ErrorStack) -> Self {
        UntrustReason::Verifier(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Verdict {
    Trusted,
    Untrusted(UntrustReason),
}

impl Verdict {
    pub(crate) fn from_result(result: Result<(), UntrustReason>) -> Self {
        match result {
            Ok(()) => Verdict::Trusted,
            Err(reason) => Verdict::Untrusted(reason),
        }
    }

    /// Log the rejection reason, then forget it
    pub(crate) fn is_trusted(&self, operation: &str) -> bool {
        match self {
            Verdict::Trusted => true,
            Verdict::Untrusted(reason) => {
                debug!(operation, %reason, "Verification failed");
                false
            }
        }
    }
}

/// True when a trust path from `signer` to the pinned root can be built
pub fn is_valid_chain(store: &TrustStore, signer: &X509Ref) -> bool {
    Verdict::from_result(check_chain(store, signer)).is_trusted("chain")
}

/// Validity window, chain and identity policy combined
pub fn is_trusted_signer(store: &TrustStore, signer: &X509Ref) -> bool {
    assess_signer(store, signer).is_trusted("signer")
}

pub(crate) fn assess_signer(store: &TrustStore, signer: &X509Ref) -> Verdict {
    Verdict::from_result(
        check_validity(signer)
            .and_then(|_| check_chain(store, signer))
            .and_then(|_| check_identity(signer)),
    )
}

fn check_validity(cert: &X509Ref) -> Result<(), UntrustReason> {
    let now = Asn1Time::days_from_now(0)?;
    if is_before(&now, cert.not_before())? {
        return Err(UntrustReason::NotYetValid);
    }
    if is_before(cert.not_after(), &now)? {
        return Err(UntrustReason::Expired);
    }
    Ok(())
}

/// Strictly earlier, per `ASN1_TIME_diff`
fn is_before(earlier: &Asn1TimeRef, later: &Asn1TimeRef) -> Result<bool, ErrorStack> {
    let diff = earlier.diff(later)?;
    Ok(diff.days > 0 || diff.secs > 0)
}

fn check_chain(store: &TrustStore, signer: &X509Ref) -> Result<(), UntrustReason> {
    let root = store
        .root_certificate()
        .ok_or(UntrustReason::AnchorUnavailable(CertificateKind::Root))?;
    let intermediate = store
        .intermediate_certificate()
        .ok_or(UntrustReason::AnchorUnavailable(CertificateKind::Intermediate))?;

    // Root is the only anchor; no system roots are consulted
    let mut anchors = X509StoreBuilder::new()?;
    anchors.add_cert(root.clone())?;
    let anchors = anchors.build();

    // Candidate pool for path building
    let mut pool: Stack<X509> = Stack::new()?;
    pool.push(root.clone())?;
    pool.push(intermediate.clone())?;
    pool.push(signer.to_owned())?;

    let mut context = X509StoreContext::new()?;
    let (verified, error) = context.init(&anchors, signer, &pool, |ctx| {
        let verified = ctx.verify_cert()?;
        Ok((verified, ctx.error()))
    })?;

    if verified {
        Ok(())
    } else {
        Err(UntrustReason::ChainRejected(error.error_string()))
    }
}

fn check_identity(signer: &X509Ref) -> Result<(), UntrustReason> {
    let identity = extract_identity(signer);
    if is_allowed_identity(&identity) {
        Ok(())
    } else {
        Err(UntrustReason::IdentityMismatch(identity))
    }
}
