//! XAdES signature assembly.
//!
//! Signing hashes the unsigned document, signs the raw hash bytes, fills the
//! signature block and the QR reference, then hashes the output again to make
//! sure nothing inside the hashed region moved.
use super::hash::{CanonicalHasher, hex_digest_base64};
use super::qr::{CodecError, QrPayload};
use super::xml::constants::{
    CERT_DIGEST_PATH, CERTIFICATE_PATH, EXTENSION_CONTENT_PATH, INVOICE_DIGEST_PATH,
    ISSUER_NAME_PATH, PROPERTIES_DIGEST_PATH, SERIAL_NUMBER_PATH, SIGNATURE_BLOCK_TEMPLATE,
    SIGNATURE_VALUE_PATH, SIGNED_PROPERTIES_HASH_TEMPLATE, SIGNING_TIME_PATH,
};
use super::xml::{InvoiceXmlError, ToXml, dom};
use super::{FinalizedInvoice, SignedInvoice};
use crate::certificate::{CertificateError, CertificateInfo, parse_signing_key};
use crate::config::Config;
use base64ct::{Base64, Encoding};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use k256::ecdsa::signature::Signer;
use k256::ecdsa::{Signature, SigningKey};
use libxml::tree::Document;
use libxml::xpath::Context;
use std::fmt;
use thiserror::Error;

const SIGNING_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const EXISTING_SIGNATURES_PATH: &str =
    "/ubl:Invoice/ext:UBLExtensions/ext:UBLExtension/ext:ExtensionContent/sig:UBLDocumentSignatures";

#[derive(Debug, Error)]
pub enum SigningError {
    #[error("invoice xml error: {0}")]
    Xml(#[from] InvoiceXmlError),
    #[error("canonicalization failed: {0}")]
    Canonicalization(String),
    #[error("invoice hash is not valid base64: {0}")]
    InvalidHash(String),
    #[error("ecdsa signing failed: {0}")]
    Signature(String),
    #[error("signed document hashes to {actual}, expected {expected}")]
    DigestMismatch { expected: String, actual: String },
    #[error("signed properties template: {0}")]
    Template(String),
    #[error(transparent)]
    Certificate(#[from] CertificateError),
    #[error("qr payload: {0}")]
    Qr(#[from] CodecError),
}

/// Values placed in the signature block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedProperties {
    invoice_hash: String,
    signature: String,
    public_key: String,
    issuer: String,
    serial: String,
    cert_digest: String,
    signed_props_hash: String,
    signing_time: DateTime<Utc>,
}

impl SignedProperties {
    /// Base64 SHA-256 of the canonical document.
    pub fn invoice_hash(&self) -> &str {
        &self.invoice_hash
    }

    /// Base64 DER ECDSA signature.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Base64 SubjectPublicKeyInfo.
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn cert_digest(&self) -> &str {
        &self.cert_digest
    }

    pub fn signed_props_hash(&self) -> &str {
        &self.signed_props_hash
    }

    pub fn signing_time(&self) -> DateTime<Utc> {
        self.signing_time
    }
}

/// Signs invoices with one CSID.
///
/// # Examples
/// ```rust
/// use zatca_core::invoice::sign::InvoiceSigner;
///
/// let signer = InvoiceSigner::from_pem(
///     include_str!("../../tests/fixtures/certs/signing-cert.pem"),
///     include_str!("../../tests/fixtures/certs/signing-key.pem"),
/// )?;
/// assert_eq!(
///     signer.certificate().issuer_name(),
///     "DC=local, DC=gov, DC=extgazt, CN=TSZEINVOICE-SubCA-1"
/// );
/// # Ok::<(), zatca_core::CertificateError>(())
/// ```
#[derive(Clone)]
pub struct InvoiceSigner {
    signing_key: SigningKey,
    certificate: CertificateInfo,
    hasher: CanonicalHasher,
    signing_time: Option<DateTime<Utc>>,
}

impl fmt::Debug for InvoiceSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvoiceSigner")
            .field("issuer", &self.certificate.issuer_name())
            .field("serial", &self.certificate.serial_number())
            .field("signing_time", &self.signing_time)
            .finish_non_exhaustive()
    }
}

impl InvoiceSigner {
    /// # Errors
    /// [`CertificateError::KeyMismatch`] when the key does not belong to the
    /// certificate.
    pub fn new(certificate: CertificateInfo, signing_key: SigningKey) -> Result<Self, CertificateError> {
        certificate.ensure_matches(&signing_key)?;
        Ok(Self {
            signing_key,
            certificate,
            hasher: CanonicalHasher::default(),
            signing_time: None,
        })
    }

    pub fn from_pem(cert_pem: &str, private_key: &str) -> Result<Self, CertificateError> {
        Self::new(
            CertificateInfo::from_pem(cert_pem)?,
            parse_signing_key(private_key)?,
        )
    }

    pub fn with_config(mut self, config: &Config) -> Self {
        self.hasher = CanonicalHasher::with_config(config);
        self
    }

    /// Fix the XAdES signing time instead of using the issue date and time.
    pub fn with_signing_time(mut self, signing_time: DateTime<Utc>) -> Self {
        self.signing_time = Some(signing_time);
        self
    }

    pub fn certificate(&self) -> &CertificateInfo {
        &self.certificate
    }

    pub(crate) fn sign(&self, invoice: FinalizedInvoice) -> Result<SignedInvoice, SigningError> {
        let xml = invoice.to_xml()?;
        let mut doc = dom::parse(&xml)?;
        let (properties, qr) = self.sign_document(&mut doc)?;
        let signed_xml = self.self_check(&doc, &properties)?;
        Ok(invoice.into_signed(properties, qr, signed_xml))
    }

    /// Sign an already rendered invoice. Missing extension, QR and
    /// signature placeholders are added first.
    pub fn sign_xml(&self, xml: &str) -> Result<String, SigningError> {
        let mut doc = dom::parse(xml)?;
        let (properties, _) = self.sign_document(&mut doc)?;
        self.self_check(&doc, &properties)
    }

    fn sign_document(&self, doc: &mut Document) -> Result<(SignedProperties, String), SigningError> {
        dom::ensure_signature_structure(doc)?;

        let invoice_hash = self.hasher.hash_document(doc)?;
        let signature = sign_hash(&self.signing_key, &invoice_hash)?;
        let signing_time = match self.signing_time {
            Some(time) => time,
            None => signing_time_from_document(doc)?,
        };

        let cert = &self.certificate;
        let props_text = signed_properties_text(
            &format_signing_time(&signing_time),
            cert.digest(),
            cert.issuer_name(),
            cert.serial_number(),
        )?;
        let signed_props_hash = hex_digest_base64(props_text.as_bytes());
        tracing::debug!(%signed_props_hash, "computed signed properties digest");

        let properties = SignedProperties {
            invoice_hash,
            signature,
            public_key: Base64::encode_string(cert.public_key_der()),
            issuer: cert.issuer_name().to_string(),
            serial: cert.serial_number().to_string(),
            cert_digest: cert.digest().to_string(),
            signed_props_hash,
            signing_time,
        };

        insert_signature_block(doc)?;
        let ctx = dom::context(doc)?;
        fill_signature_block(&ctx, &properties, cert)?;

        let qr = qr_from_document(&ctx, &properties, cert)?.encode();
        tracing::debug!(qr_len = qr.len(), "encoded qr payload");
        dom::set_qr(doc, &qr)?;
        Ok((properties, qr))
    }

    /// Serialize and re-hash the signed document.
    fn self_check(&self, doc: &Document, properties: &SignedProperties) -> Result<String, SigningError> {
        let signed_xml = doc.to_string();
        let actual = self.hasher.hash_xml(&signed_xml)?;
        if actual != properties.invoice_hash {
            return Err(SigningError::DigestMismatch {
                expected: properties.invoice_hash.clone(),
                actual,
            });
        }
        Ok(signed_xml)
    }
}

/// ECDSA over the decoded hash bytes, returned as base64 DER.
pub(crate) fn sign_hash(key: &SigningKey, hash_b64: &str) -> Result<String, SigningError> {
    let hash = Base64::decode_vec(hash_b64).map_err(|e| SigningError::InvalidHash(e.to_string()))?;
    let signature: Signature = key
        .try_sign(&hash)
        .map_err(|e| SigningError::Signature(e.to_string()))?;
    Ok(Base64::encode_string(signature.to_der().as_bytes()))
}

/// Fill the signed-properties text whose digest the `#xadesSignedProperties`
/// reference carries. Values are escaped the way they appear in the document.
pub fn signed_properties_text(
    signing_time: &str,
    cert_digest: &str,
    issuer: &str,
    serial: &str,
) -> Result<String, SigningError> {
    let fields = [
        ("{SIGNING_TIME}", signing_time),
        ("{CERT_DIGEST}", cert_digest),
        ("{ISSUER_NAME}", issuer),
        ("{SERIAL_NUMBER}", serial),
    ];
    let mut filled = [false; 4];
    let mut text = String::with_capacity(SIGNED_PROPERTIES_HASH_TEMPLATE.len() + 256);
    let mut rest = SIGNED_PROPERTIES_HASH_TEMPLATE;
    // One walk over the template, so substituted values are never rescanned.
    while let Some(open) = rest.find('{') {
        text.push_str(&rest[..open]);
        let tail = &rest[open..];
        match fields
            .iter()
            .position(|(placeholder, _)| tail.starts_with(placeholder))
        {
            Some(index) => {
                let (placeholder, value) = fields[index];
                text.push_str(&quick_xml::escape::escape(value));
                filled[index] = true;
                rest = &tail[placeholder.len()..];
            }
            None => {
                text.push('{');
                rest = &tail[1..];
            }
        }
    }
    text.push_str(rest);
    if let Some(index) = filled.iter().position(|done| !done) {
        return Err(SigningError::Template(format!("missing {}", fields[index].0)));
    }
    Ok(text)
}

fn format_signing_time(time: &DateTime<Utc>) -> String {
    time.format(SIGNING_TIME_FORMAT).to_string()
}

fn signing_time_from_document(doc: &Document) -> Result<DateTime<Utc>, SigningError> {
    let ctx = dom::context(doc)?;
    let issue_date = dom::required_text(&ctx, "/ubl:Invoice/cbc:IssueDate")?;
    let issue_time = dom::required_text(&ctx, "/ubl:Invoice/cbc:IssueTime")?;
    let date = NaiveDate::parse_from_str(&issue_date, "%Y-%m-%d")
        .map_err(|e| SigningError::Template(format!("invalid issue date '{issue_date}': {e}")))?;
    let time = NaiveTime::parse_from_str(issue_time.trim_end_matches('Z'), "%H:%M:%S")
        .map_err(|e| SigningError::Template(format!("invalid issue time '{issue_time}': {e}")))?;
    Ok(NaiveDateTime::new(date, time).and_utc())
}

fn insert_signature_block(doc: &mut Document) -> Result<(), InvoiceXmlError> {
    let ctx = dom::context(doc)?;
    for mut stale in dom::nodes(&ctx, EXISTING_SIGNATURES_PATH)? {
        stale.unlink();
    }
    let mut content = dom::nodes(&ctx, EXTENSION_CONTENT_PATH)?
        .into_iter()
        .next()
        .ok_or_else(|| InvoiceXmlError::MissingNode(EXTENSION_CONTENT_PATH.to_string()))?;
    let mut block = dom::import_fragment(doc, SIGNATURE_BLOCK_TEMPLATE)?;
    content
        .add_child(&mut block)
        .map_err(|e| InvoiceXmlError::Mutation(e.to_string()))
}

fn fill_signature_block(
    ctx: &Context,
    properties: &SignedProperties,
    cert: &CertificateInfo,
) -> Result<(), InvoiceXmlError> {
    let values = [
        (INVOICE_DIGEST_PATH, properties.invoice_hash.clone()),
        (PROPERTIES_DIGEST_PATH, properties.signed_props_hash.clone()),
        (SIGNATURE_VALUE_PATH, properties.signature.clone()),
        (CERTIFICATE_PATH, cert.der_base64()),
        (SIGNING_TIME_PATH, format_signing_time(&properties.signing_time)),
        (CERT_DIGEST_PATH, properties.cert_digest.clone()),
        (ISSUER_NAME_PATH, properties.issuer.clone()),
        (SERIAL_NUMBER_PATH, properties.serial.clone()),
    ];
    for (path, value) in &values {
        dom::set_text(ctx, path, value)?;
    }
    Ok(())
}

fn qr_from_document(
    ctx: &Context,
    properties: &SignedProperties,
    cert: &CertificateInfo,
) -> Result<QrPayload, InvoiceXmlError> {
    let seller_name = dom::required_text(
        ctx,
        "/ubl:Invoice/cac:AccountingSupplierParty//cac:PartyLegalEntity/cbc:RegistrationName",
    )?;
    let vat_number = dom::required_text(
        ctx,
        "/ubl:Invoice/cac:AccountingSupplierParty//cac:PartyTaxScheme/cbc:CompanyID",
    )?;
    let issue_date = dom::required_text(ctx, "/ubl:Invoice/cbc:IssueDate")?;
    let issue_time = dom::required_text(ctx, "/ubl:Invoice/cbc:IssueTime")?;
    let total_with_vat = dom::required_text(
        ctx,
        "/ubl:Invoice/cac:LegalMonetaryTotal/cbc:TaxInclusiveAmount",
    )?;
    let vat_total = dom::required_text(ctx, "/ubl:Invoice/cac:TaxTotal/cbc:TaxAmount")?;

    Ok(QrPayload::new(
        seller_name,
        vat_number,
        format!("{issue_date}T{issue_time}"),
        total_with_vat,
        vat_total,
    )
    .with_signature_parts(
        &properties.invoice_hash,
        &properties.signature,
        cert.public_key_der().to_vec(),
        cert.signature_bytes().to_vec(),
    ))
}
