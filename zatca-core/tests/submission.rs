mod common;

use base64ct::{Base64, Encoding};
use std::cell::RefCell;
use zatca_core::invoice::xml::inject_qr;
use zatca_core::invoice::{ChainLink, SignedInvoice};
use zatca_core::ledger::GENESIS_PREVIOUS_HASH;
use zatca_core::submission::{
    Submission, SubmissionClient, SubmissionError, ValidationResponse, submit_signed,
};

const PLATFORM_QR: &str = "AQZTdGFtcGVk";

#[derive(Default)]
struct MockPlatform {
    calls: RefCell<Vec<(&'static str, Submission)>>,
    errors: bool,
}

impl MockPlatform {
    fn response(&self, status: &str, cleared: Option<String>) -> ValidationResponse {
        let errors = if self.errors {
            r#"[{"type":"ERROR","code":"BR-KSA-44","message":"bad seller","status":"ERROR"}]"#
        } else {
            "[]"
        };
        let mut body = serde_json::json!({
            "validationResults": serde_json::from_str::<serde_json::Value>(&format!(
                r#"{{"infoMessages":[],"warningMessages":[],"errorMessages":{errors},"status":"PASS"}}"#
            )).expect("results"),
        });
        body[status] = serde_json::Value::from(if self.errors { "NOT_OK" } else { "OK" });
        if let Some(cleared) = cleared {
            body["clearedInvoice"] = serde_json::Value::from(cleared);
        }
        serde_json::from_value(body).expect("response")
    }
}

impl SubmissionClient for MockPlatform {
    fn check_compliance(&self, submission: &Submission) -> Result<ValidationResponse, SubmissionError> {
        self.calls.borrow_mut().push(("compliance", submission.clone()));
        Ok(self.response("reportingStatus", None))
    }

    fn report(&self, submission: &Submission) -> Result<ValidationResponse, SubmissionError> {
        self.calls.borrow_mut().push(("report", submission.clone()));
        Ok(self.response("reportingStatus", None))
    }

    fn clear(&self, submission: &Submission) -> Result<ValidationResponse, SubmissionError> {
        self.calls.borrow_mut().push(("clear", submission.clone()));
        let xml = Base64::decode_vec(submission.invoice()).expect("invoice base64");
        let xml = String::from_utf8(xml).expect("utf-8");
        let stamped = inject_qr(&xml, PLATFORM_QR).expect("stamp");
        Ok(self.response(
            "clearanceStatus",
            Some(Base64::encode_string(stamped.as_bytes())),
        ))
    }
}

fn sign(invoice: zatca_core::invoice::FinalizedInvoice) -> SignedInvoice {
    invoice
        .with_chain(ChainLink::new(1, GENESIS_PREVIOUS_HASH))
        .sign(&common::signer())
        .expect("sign")
}

#[test]
fn simplified_invoices_are_reported() {
    let platform = MockPlatform::default();
    let invoice = sign(common::simplified_invoice("INV-400"));
    let outcome = submit_signed(&platform, &invoice).expect("submit");

    assert!(outcome.cleared.is_none());
    assert_eq!(outcome.response.reporting_status(), Some("OK"));
    let calls = platform.calls.borrow();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "report");
    assert_eq!(calls[0].1.invoice_hash(), invoice.invoice_hash());
    assert_eq!(calls[0].1.uuid(), invoice.uuid());
}

#[test]
fn standard_invoices_are_cleared_and_stamped() {
    let platform = MockPlatform::default();
    let invoice = sign(common::standard_invoice("INV-401"));
    let outcome = submit_signed(&platform, &invoice).expect("submit");

    assert_eq!(platform.calls.borrow()[0].0, "clear");
    let cleared = outcome.cleared.expect("cleared invoice");
    assert_eq!(cleared.qr.as_deref(), Some(PLATFORM_QR));
    assert!(cleared.xml.contains("INV-401"));
}

#[test]
fn error_messages_reject_the_submission() {
    let platform = MockPlatform {
        errors: true,
        ..MockPlatform::default()
    };
    let invoice = sign(common::simplified_invoice("INV-402"));
    match submit_signed(&platform, &invoice) {
        Err(SubmissionError::Rejected(response)) => {
            let errors = response.validation_results().error_messages();
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].code(), Some("BR-KSA-44"));
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[test]
fn submission_body_uses_platform_field_names() {
    let invoice = sign(common::simplified_invoice("INV-403"));
    let body = serde_json::to_value(Submission::from_signed(&invoice)).expect("json");
    assert_eq!(body["invoiceHash"], invoice.invoice_hash());
    assert_eq!(body["uuid"], invoice.uuid());
    let decoded = Base64::decode_vec(body["invoice"].as_str().expect("invoice")).expect("base64");
    assert_eq!(decoded, invoice.xml().as_bytes());
}
