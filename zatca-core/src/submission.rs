//! Submission payloads and the results returned by the platform.
//!
//! Transport is left to a [`SubmissionClient`] implementation; this module
//! only builds the request body, routes invoices and interprets responses.
use crate::invoice::SignedInvoice;
use crate::invoice::xml::{InvoiceXmlError, extract_qr};
use base64ct::{Base64, Encoding};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("submission rejected with {} error(s)", .0.validation_results().error_messages().len())]
    Rejected(Box<ValidationResponse>),
    #[error("failed to decode cleared invoice: {0}")]
    Decode(String),
    #[error(transparent)]
    Xml(#[from] InvoiceXmlError),
}

/// Request body shared by compliance, reporting and clearance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    #[serde(rename = "invoiceHash")]
    invoice_hash: String,
    uuid: String,
    /// Base64 of the signed XML.
    invoice: String,
}

impl Submission {
    pub fn from_signed(invoice: &SignedInvoice) -> Self {
        Self {
            invoice_hash: invoice.invoice_hash().to_string(),
            uuid: invoice.uuid(),
            invoice: invoice.to_xml_base64(),
        }
    }

    pub fn invoice_hash(&self) -> &str {
        &self.invoice_hash
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn invoice(&self) -> &str {
        &self.invoice
    }
}

/// API validation response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidationResponse {
    #[serde(rename = "validationResults")]
    validation_results: ValidationResults,
    #[serde(rename = "reportingStatus", default)]
    reporting_status: Option<String>,
    #[serde(rename = "clearanceStatus", default)]
    clearance_status: Option<String>,
    #[serde(rename = "clearedInvoice", default)]
    cleared_invoice: Option<String>,
}

impl ValidationResponse {
    pub fn validation_results(&self) -> &ValidationResults {
        &self.validation_results
    }

    pub fn reporting_status(&self) -> Option<&str> {
        self.reporting_status.as_deref()
    }

    pub fn clearance_status(&self) -> Option<&str> {
        self.clearance_status.as_deref()
    }

    /// Base64 stamped invoice returned by clearance.
    pub fn cleared_invoice(&self) -> Option<&str> {
        self.cleared_invoice.as_deref()
    }

    pub fn has_errors(&self) -> bool {
        !self.validation_results.error_messages.is_empty()
    }
}

/// Validation results container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidationResults {
    #[serde(rename = "infoMessages", default)]
    info_messages: MessageList,
    #[serde(rename = "warningMessages", default)]
    warning_messages: Vec<ValidationMessage>,
    #[serde(rename = "errorMessages", default)]
    error_messages: Vec<ValidationMessage>,
    #[serde(default)]
    status: Option<String>,
}

impl ValidationResults {
    pub fn info_messages(&self) -> &MessageList {
        &self.info_messages
    }

    pub fn warning_messages(&self) -> &[ValidationMessage] {
        &self.warning_messages
    }

    pub fn error_messages(&self) -> &[ValidationMessage] {
        &self.error_messages
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidationMessage {
    #[serde(rename = "type", default)]
    message_type: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

impl ValidationMessage {
    pub fn message_type(&self) -> Option<&str> {
        self.message_type.as_deref()
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }
}

/// The platform sends either a single message or a list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum MessageList {
    One(ValidationMessage),
    Many(Vec<ValidationMessage>),
    #[default]
    Empty,
}

impl MessageList {
    pub fn as_slice(&self) -> &[ValidationMessage] {
        match self {
            MessageList::One(message) => std::slice::from_ref(message),
            MessageList::Many(messages) => messages,
            MessageList::Empty => &[],
        }
    }
}

/// Transport to the e-invoicing platform.
pub trait SubmissionClient {
    fn check_compliance(&self, submission: &Submission) -> Result<ValidationResponse, SubmissionError>;

    /// Report a simplified invoice.
    fn report(&self, submission: &Submission) -> Result<ValidationResponse, SubmissionError>;

    /// Clear a standard invoice. The response carries the stamped copy.
    fn clear(&self, submission: &Submission) -> Result<ValidationResponse, SubmissionError>;
}

/// Stamped invoice returned by clearance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearedInvoice {
    pub xml: String,
    pub qr: Option<String>,
}

/// Decode a cleared invoice and read the QR the platform embedded.
pub fn apply_clearance(cleared_invoice_b64: &str) -> Result<ClearedInvoice, SubmissionError> {
    let compact: String = cleared_invoice_b64.split_whitespace().collect();
    let bytes = Base64::decode_vec(&compact).map_err(|e| SubmissionError::Decode(e.to_string()))?;
    let xml = String::from_utf8(bytes).map_err(|e| SubmissionError::Decode(e.to_string()))?;
    let qr = extract_qr(&xml)?;
    Ok(ClearedInvoice { xml, qr })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionOutcome {
    pub response: ValidationResponse,
    pub cleared: Option<ClearedInvoice>,
}

/// Report simplified invoices and clear standard ones.
///
/// # Errors
/// [`SubmissionError::Rejected`] when the response carries error messages.
pub fn submit_signed<C: SubmissionClient + ?Sized>(
    client: &C,
    invoice: &SignedInvoice,
) -> Result<SubmissionOutcome, SubmissionError> {
    let submission = Submission::from_signed(invoice);
    let simplified = invoice.data().sub_type().is_simplified();
    let response = if simplified {
        client.report(&submission)?
    } else {
        client.clear(&submission)?
    };
    if response.has_errors() {
        return Err(SubmissionError::Rejected(Box::new(response)));
    }

    let cleared = match response.cleared_invoice() {
        Some(stamped) if !simplified => Some(apply_clearance(stamped)?),
        _ => None,
    };
    tracing::debug!(
        uuid = submission.uuid(),
        simplified,
        warnings = response.validation_results().warning_messages().len(),
        "submission accepted"
    );
    Ok(SubmissionOutcome { response, cleared })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_parses_single_and_list_info_messages() {
        let single = r#"{"validationResults":{"infoMessages":{"type":"INFO","code":"XSD_ZATCA_VALID","category":"XSD validation","message":"Complied with UBL 2.1 standards","status":"PASS"},"warningMessages":[],"errorMessages":[],"status":"PASS"},"reportingStatus":"REPORTED"}"#;
        let response: ValidationResponse = serde_json::from_str(single).expect("parse");
        assert_eq!(response.reporting_status(), Some("REPORTED"));
        assert_eq!(response.validation_results().info_messages().as_slice().len(), 1);
        assert!(!response.has_errors());

        let list = r#"{"validationResults":{"infoMessages":[],"warningMessages":[],"errorMessages":[{"type":"ERROR","code":"BR-KSA-37","message":"bad","status":"ERROR"}],"status":"ERROR"},"clearanceStatus":"NOT_CLEARED"}"#;
        let response: ValidationResponse = serde_json::from_str(list).expect("parse");
        assert!(response.has_errors());
        assert_eq!(
            response.validation_results().error_messages()[0].code(),
            Some("BR-KSA-37")
        );
    }

    #[test]
    fn clearance_with_bad_base64_is_a_decode_error() {
        assert!(matches!(apply_clearance("@@@"), Err(SubmissionError::Decode(_))));
    }

    #[test]
    fn clearance_extracts_embedded_qr() {
        let xml = r#"<Invoice xmlns="urn:oasis:names:specification:ubl:schema:xsd:Invoice-2" xmlns:cac="urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2" xmlns:cbc="urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2"><cac:AdditionalDocumentReference><cbc:ID>QR</cbc:ID><cac:Attachment><cbc:EmbeddedDocumentBinaryObject mimeCode="text/plain">AQRBY21l</cbc:EmbeddedDocumentBinaryObject></cac:Attachment></cac:AdditionalDocumentReference></Invoice>"#;
        let cleared = apply_clearance(&Base64::encode_string(xml.as_bytes())).expect("clearance");
        assert_eq!(cleared.qr.as_deref(), Some("AQRBY21l"));
        assert_eq!(cleared.xml, xml);
    }
}
