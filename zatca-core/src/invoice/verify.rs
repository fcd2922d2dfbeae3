//! Verification of signed invoices.
use super::hash::{CanonicalHasher, hex_digest_base64};
use super::sign::{SigningError, signed_properties_text};
use super::xml::constants::{
    CERT_DIGEST_PATH, CERTIFICATE_PATH, INVOICE_DIGEST_PATH, ISSUER_NAME_PATH,
    PROPERTIES_DIGEST_PATH, SERIAL_NUMBER_PATH, SIGNATURE_VALUE_PATH, SIGNING_TIME_PATH,
};
use super::xml::dom;
use crate::certificate::CertificateInfo;
use base64ct::{Base64, Encoding};
use ecdsa::signature::Verifier;
use k256::ecdsa::{Signature, VerifyingKey};
use libxml::tree::Document;

/// Check a signed invoice against `key`.
///
/// Returns `Ok(false)` when a digest or the signature does not match, and an
/// error when the document is missing parts of the signature block.
pub fn verify_signed_invoice(xml: &str, key: &VerifyingKey) -> Result<bool, SigningError> {
    let doc = dom::parse(xml)?;
    verify_document(&doc, key)
}

/// Like [`verify_signed_invoice`] with the key taken from the embedded
/// `X509Certificate`.
pub fn verify_with_embedded_certificate(xml: &str) -> Result<bool, SigningError> {
    let doc = dom::parse(xml)?;
    let ctx = dom::context(&doc)?;
    let certificate = CertificateInfo::from_base64(&dom::required_text(&ctx, CERTIFICATE_PATH)?)?;
    verify_document(&doc, &certificate.verifying_key()?)
}

fn verify_document(doc: &Document, key: &VerifyingKey) -> Result<bool, SigningError> {
    let ctx = dom::context(doc)?;
    let stored_hash = dom::required_text(&ctx, INVOICE_DIGEST_PATH)?;
    let stored_props_hash = dom::required_text(&ctx, PROPERTIES_DIGEST_PATH)?;
    let signature_value = dom::required_text(&ctx, SIGNATURE_VALUE_PATH)?;

    let actual_hash = CanonicalHasher::default().hash_document(doc)?;
    if actual_hash != stored_hash {
        tracing::debug!(%stored_hash, %actual_hash, "invoice digest differs");
        return Ok(false);
    }

    let props_text = signed_properties_text(
        &dom::required_text(&ctx, SIGNING_TIME_PATH)?,
        &dom::required_text(&ctx, CERT_DIGEST_PATH)?,
        &dom::required_text(&ctx, ISSUER_NAME_PATH)?,
        &dom::required_text(&ctx, SERIAL_NUMBER_PATH)?,
    )?;
    if hex_digest_base64(props_text.as_bytes()) != stored_props_hash {
        tracing::debug!("signed properties digest differs");
        return Ok(false);
    }

    let hash = Base64::decode_vec(&stored_hash).map_err(|e| SigningError::InvalidHash(e.to_string()))?;
    let compact: String = signature_value.split_whitespace().collect();
    let Ok(der) = Base64::decode_vec(&compact) else {
        return Ok(false);
    };
    let Ok(signature) = Signature::from_der(&der) else {
        return Ok(false);
    };
    Ok(key.verify(&hash, &signature).is_ok())
}
