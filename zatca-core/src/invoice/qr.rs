//! QR payload: nine TLV fields, base64 wrapped.
pub mod tlv;

use super::is_well_formed_vat;
use base64ct::{Base64, Encoding};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::str::FromStr;
use thiserror::Error;

pub const TAG_SELLER_NAME: u8 = 1;
pub const TAG_VAT_NUMBER: u8 = 2;
pub const TAG_TIMESTAMP: u8 = 3;
pub const TAG_TOTAL_WITH_VAT: u8 = 4;
pub const TAG_VAT_TOTAL: u8 = 5;
pub const TAG_INVOICE_HASH: u8 = 6;
pub const TAG_SIGNATURE: u8 = 7;
pub const TAG_PUBLIC_KEY: u8 = 8;
pub const TAG_CERTIFICATE_SIGNATURE: u8 = 9;

const REQUIRED_TAGS: std::ops::RangeInclusive<u8> = TAG_SELLER_NAME..=TAG_CERTIFICATE_SIGNATURE;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Malformed QR payloads.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("qr payload is not valid base64")]
    Base64,
    #[error("length field truncated at offset {offset}")]
    TruncatedLength { offset: usize },
    #[error("tag {tag} declares {expected} bytes but only {available} remain")]
    TruncatedValue {
        tag: u8,
        expected: usize,
        available: usize,
    },
    #[error("indefinite length at offset {offset}")]
    IndefiniteLength { offset: usize },
    #[error("length at offset {offset} does not fit in four bytes")]
    LengthOverflow { offset: usize },
    #[error("tag {0} appears more than once")]
    DuplicateTag(u8),
    #[error("tag {0} is missing")]
    MissingTag(u8),
    #[error("tag {tag} is not valid utf-8")]
    InvalidUtf8 { tag: u8 },
}

/// Problem reported by [`QrPayload::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QrIssue {
    #[error("tag {0} is missing")]
    MissingTag(u8),
    #[error("tag {0} is not valid utf-8")]
    InvalidUtf8(u8),
    #[error("vat number must be 15 digits starting and ending with 3")]
    InvalidVatNumber,
    #[error("tag {tag} is not an amount with two decimals")]
    InvalidAmount { tag: u8 },
    #[error("timestamp does not parse")]
    InvalidTimestamp,
}

/// The nine QR values keyed by tag.
///
/// # Examples
/// ```rust
/// use zatca_core::invoice::QrPayload;
///
/// let payload = QrPayload::new("Acme", "399999999900003", "2024-01-01T12:30:00", "230.00", "30.00")
///     .with_signature_parts("aGFzaA==", "c2ln", vec![0x30, 0x56], vec![0x30, 0x45]);
/// let decoded = QrPayload::decode(&payload.encode())?;
/// assert_eq!(decoded.seller_name()?, "Acme");
/// assert!(decoded.validate().is_empty());
/// # Ok::<(), zatca_core::CodecError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QrPayload {
    fields: BTreeMap<u8, Vec<u8>>,
}

impl QrPayload {
    /// Text fields known before signing. Amounts are expected pre-formatted.
    pub fn new(
        seller_name: impl Into<String>,
        vat_number: impl Into<String>,
        timestamp: impl Into<String>,
        total_with_vat: impl Into<String>,
        vat_total: impl Into<String>,
    ) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(TAG_SELLER_NAME, seller_name.into().into_bytes());
        fields.insert(TAG_VAT_NUMBER, vat_number.into().into_bytes());
        fields.insert(TAG_TIMESTAMP, timestamp.into().into_bytes());
        fields.insert(TAG_TOTAL_WITH_VAT, total_with_vat.into().into_bytes());
        fields.insert(TAG_VAT_TOTAL, vat_total.into().into_bytes());
        Self { fields }
    }

    /// Tags 6 to 9. The hash and signature are kept as their base64 text.
    pub fn with_signature_parts(
        mut self,
        invoice_hash: &str,
        signature: &str,
        public_key_der: Vec<u8>,
        certificate_signature: Vec<u8>,
    ) -> Self {
        self.fields
            .insert(TAG_INVOICE_HASH, invoice_hash.as_bytes().to_vec());
        self.fields
            .insert(TAG_SIGNATURE, signature.as_bytes().to_vec());
        self.fields.insert(TAG_PUBLIC_KEY, public_key_der);
        self.fields
            .insert(TAG_CERTIFICATE_SIGNATURE, certificate_signature);
        self
    }

    /// Raw bytes of `tag`.
    pub fn value(&self, tag: u8) -> Option<&[u8]> {
        self.fields.get(&tag).map(Vec::as_slice)
    }

    pub fn text(&self, tag: u8) -> Result<&str, CodecError> {
        let bytes = self.value(tag).ok_or(CodecError::MissingTag(tag))?;
        std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8 { tag })
    }

    pub fn seller_name(&self) -> Result<&str, CodecError> {
        self.text(TAG_SELLER_NAME)
    }

    pub fn vat_number(&self) -> Result<&str, CodecError> {
        self.text(TAG_VAT_NUMBER)
    }

    pub fn timestamp(&self) -> Result<&str, CodecError> {
        self.text(TAG_TIMESTAMP)
    }

    pub fn total_with_vat(&self) -> Result<&str, CodecError> {
        self.text(TAG_TOTAL_WITH_VAT)
    }

    pub fn vat_total(&self) -> Result<&str, CodecError> {
        self.text(TAG_VAT_TOTAL)
    }

    /// Base64 invoice hash as carried in tag 6.
    pub fn invoice_hash(&self) -> Result<&str, CodecError> {
        self.text(TAG_INVOICE_HASH)
    }

    pub fn signature(&self) -> Result<&str, CodecError> {
        self.text(TAG_SIGNATURE)
    }

    /// SubjectPublicKeyInfo DER.
    pub fn public_key(&self) -> Result<&[u8], CodecError> {
        self.value(TAG_PUBLIC_KEY)
            .ok_or(CodecError::MissingTag(TAG_PUBLIC_KEY))
    }

    pub fn certificate_signature(&self) -> Result<&[u8], CodecError> {
        self.value(TAG_CERTIFICATE_SIGNATURE)
            .ok_or(CodecError::MissingTag(TAG_CERTIFICATE_SIGNATURE))
    }

    pub fn tags(&self) -> impl Iterator<Item = u8> + '_ {
        self.fields.keys().copied()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        tlv::encode(&self.fields)
    }

    /// Base64 of the TLV bytes, the text placed in the invoice.
    pub fn encode(&self) -> String {
        Base64::encode_string(&self.to_bytes())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            fields: tlv::decode(bytes)?,
        })
    }

    /// Parse base64 QR text. Field contents are checked by [`QrPayload::validate`].
    pub fn decode(text: &str) -> Result<Self, CodecError> {
        let compact: String = text.split_whitespace().collect();
        let bytes = Base64::decode_vec(&compact).map_err(|_| CodecError::Base64)?;
        Self::from_bytes(&bytes)
    }

    /// Every problem with the payload, empty when it is acceptable.
    pub fn validate(&self) -> Vec<QrIssue> {
        let mut issues: Vec<QrIssue> = REQUIRED_TAGS
            .filter(|tag| !self.fields.contains_key(tag))
            .map(QrIssue::MissingTag)
            .collect();

        for tag in TAG_SELLER_NAME..=TAG_VAT_TOTAL {
            if let Err(CodecError::InvalidUtf8 { tag }) = self.text(tag) {
                issues.push(QrIssue::InvalidUtf8(tag));
            }
        }

        if let Ok(vat) = self.vat_number() {
            if !is_well_formed_vat(vat) {
                issues.push(QrIssue::InvalidVatNumber);
            }
        }
        if let Ok(timestamp) = self.timestamp() {
            let trimmed = timestamp.strip_suffix('Z').unwrap_or(timestamp);
            if NaiveDateTime::parse_from_str(trimmed, TIMESTAMP_FORMAT).is_err() {
                issues.push(QrIssue::InvalidTimestamp);
            }
        }
        for tag in [TAG_TOTAL_WITH_VAT, TAG_VAT_TOTAL] {
            if let Ok(amount) = self.text(tag) {
                if !is_two_decimal_amount(amount) {
                    issues.push(QrIssue::InvalidAmount { tag });
                }
            }
        }
        issues
    }
}

fn is_two_decimal_amount(text: &str) -> bool {
    let Some((_, fraction)) = text.split_once('.') else {
        return false;
    };
    fraction.len() == 2 && Decimal::from_str(text).is_ok()
}
