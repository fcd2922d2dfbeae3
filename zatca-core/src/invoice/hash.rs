//! Canonical invoice hash.
//!
//! The extension block, the signature placeholder and the QR reference are
//! stripped, the rest is canonicalized with C14N 1.1 (no comments) and the
//! SHA-256 digest is base64 encoded.
use super::sign::SigningError;
use super::xml::{InvoiceXmlError, dom};
use crate::config::Config;
use base64ct::{Base64, Encoding};
use libxml::tree::{Document, c14n};
use sha2::{Digest, Sha256};

const EXCLUDED_SUBTREES: [&str; 3] = [
    "/*[local-name()='Invoice']//*[local-name()='UBLExtensions']",
    "//*[local-name()='AdditionalDocumentReference'][cbc:ID[normalize-space(text())='QR']]",
    "/*[local-name()='Invoice']//*[local-name()='Signature']",
];

/// Computes the invoice hash of rendered documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct CanonicalHasher {
    trace_canonical: bool,
}

impl CanonicalHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: &Config) -> Self {
        Self {
            trace_canonical: config.debug.trace_canonical,
        }
    }

    /// Hash invoice XML text.
    ///
    /// # Errors
    /// Returns [`SigningError::Xml`] when the text does not parse and
    /// [`SigningError::Canonicalization`] when C14N fails.
    pub fn hash_xml(&self, xml: &str) -> Result<String, SigningError> {
        let doc = dom::parse(xml)?;
        self.hash_document(&doc)
    }

    pub(crate) fn hash_document(&self, doc: &Document) -> Result<String, SigningError> {
        let canonical = self.canonical_document(doc)?;
        let hash = Base64::encode_string(&Sha256::digest(canonical.as_bytes()));
        tracing::debug!(invoice_hash = %hash, canonical_len = canonical.len(), "computed invoice hash");
        Ok(hash)
    }

    /// Canonical form that gets hashed, for diagnostics.
    pub fn canonical_form(&self, xml: &str) -> Result<String, SigningError> {
        let doc = dom::parse(xml)?;
        self.canonical_document(&doc)
    }

    fn canonical_document(&self, doc: &Document) -> Result<String, SigningError> {
        let copy = doc
            .dup()
            .map_err(|_| SigningError::Canonicalization("failed to duplicate document".into()))?;
        remove_excluded_subtrees(&copy)?;

        let options = c14n::CanonicalizationOptions {
            mode: c14n::CanonicalizationMode::Canonical1_1,
            inclusive_ns_prefixes: vec![],
            with_comments: false,
        };
        let canonical = copy
            .canonicalize(options, None)
            .map_err(|_| SigningError::Canonicalization("C14N 1.1 failed".into()))?;
        if self.trace_canonical {
            tracing::trace!(canonical = %canonical, "canonical invoice");
        }
        Ok(canonical)
    }
}

fn remove_excluded_subtrees(doc: &Document) -> Result<(), InvoiceXmlError> {
    let ctx = dom::context(doc)?;
    for path in EXCLUDED_SUBTREES {
        for mut node in dom::nodes(&ctx, path)? {
            node.unlink();
        }
    }
    Ok(())
}

/// Hash `xml` with default settings.
///
/// # Examples
/// ```rust
/// let xml = r#"<Invoice xmlns="urn:oasis:names:specification:ubl:schema:xsd:Invoice-2"><ID>1</ID></Invoice>"#;
/// let hash = zatca_core::invoice::hash::invoice_hash(xml)?;
/// assert_eq!(hash.len(), 44);
/// # Ok::<(), zatca_core::SigningError>(())
/// ```
pub fn invoice_hash(xml: &str) -> Result<String, SigningError> {
    CanonicalHasher::default().hash_xml(xml)
}

/// Lower-case hex of `sha256(bytes)`, base64 encoded.
///
/// Certificate and signed-properties digests use this double encoding.
pub(crate) fn hex_digest_base64(bytes: &[u8]) -> String {
    Base64::encode_string(hex::encode(Sha256::digest(bytes)).as_bytes())
}
