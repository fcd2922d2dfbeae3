mod common;

use base64ct::{Base64, Encoding};
use common::{fixture, signer, simplified_invoice};
use zatca_core::certificate::{CertificateInfo, parse_signing_key};
use zatca_core::invoice::hash::invoice_hash;
use zatca_core::invoice::verify::{verify_signed_invoice, verify_with_embedded_certificate};
use zatca_core::invoice::xml::{ToXml, extract_qr, inject_qr};
use zatca_core::invoice::{ChainLink, QrPayload, SignedInvoice};
use zatca_core::ledger::GENESIS_PREVIOUS_HASH;

fn signed(id: &str) -> SignedInvoice {
    simplified_invoice(id)
        .with_chain(ChainLink::new(1, GENESIS_PREVIOUS_HASH))
        .sign(&signer())
        .expect("sign")
}

fn between<'a>(xml: &'a str, open: &str, close: &str) -> &'a str {
    let start = xml.find(open).expect("open tag") + open.len();
    let end = start + xml[start..].find(close).expect("close tag");
    &xml[start..end]
}

#[test]
fn signed_invoice_verifies_with_certificate_key() {
    let invoice = signed("INV-200");
    let key = CertificateInfo::from_pem(&fixture("signing-cert.pem"))
        .expect("cert")
        .verifying_key()
        .expect("key");
    assert!(verify_signed_invoice(invoice.xml(), &key).expect("verify"));
    assert!(verify_with_embedded_certificate(invoice.xml()).expect("verify"));
}

#[test]
fn signature_from_another_key_is_rejected() {
    let invoice = signed("INV-201");
    let other = *parse_signing_key(&fixture("other-key.pem"))
        .expect("key")
        .verifying_key();
    assert!(!verify_signed_invoice(invoice.xml(), &other).expect("verify"));
}

#[test]
fn flipped_signature_byte_fails_verification() {
    let invoice = signed("INV-202");
    let xml = invoice.xml();
    let value = between(xml, "<ds:SignatureValue>", "</ds:SignatureValue>");
    let mut der = Base64::decode_vec(value).expect("signature base64");
    let last = der.len() - 1;
    der[last] ^= 0x01;
    let tampered = xml.replace(value, &Base64::encode_string(&der));
    assert!(!verify_with_embedded_certificate(&tampered).expect("verify"));
}

#[test]
fn stored_hash_matches_recomputed_hash() {
    let invoice = signed("INV-203");
    assert_eq!(invoice_hash(invoice.xml()).expect("hash"), invoice.invoice_hash());
    assert_eq!(invoice.to_xml().expect("xml"), invoice.xml());
}

#[test]
fn hash_ignores_extensions_qr_and_signature() {
    let invoice = signed("INV-204");
    let original = invoice_hash(invoice.xml()).expect("hash");

    let new_qr = inject_qr(invoice.xml(), "AQNBQkM=").expect("inject");
    assert_eq!(extract_qr(&new_qr).expect("qr").as_deref(), Some("AQNBQkM="));
    assert_eq!(invoice_hash(&new_qr).expect("hash"), original);

    let value = between(invoice.xml(), "<ds:SignatureValue>", "</ds:SignatureValue>");
    let resigned = invoice.xml().replace(value, "AAAA");
    assert_eq!(invoice_hash(&resigned).expect("hash"), original);

    let body = invoice.xml().replace("INV-204", "INV-205");
    assert_ne!(invoice_hash(&body).expect("hash"), original);
}

#[test]
fn qr_carries_all_nine_tags() {
    let invoice = signed("INV-206");
    let certificate = CertificateInfo::from_pem(&fixture("signing-cert.pem")).expect("cert");
    let qr = QrPayload::decode(invoice.qr_code()).expect("decode");

    assert!(qr.validate().is_empty(), "{:?}", qr.validate());
    assert_eq!(qr.tags().collect::<Vec<_>>(), (1..=9).collect::<Vec<u8>>());
    assert_eq!(qr.seller_name().expect("seller"), "Acme Widgets LTD");
    assert_eq!(qr.vat_number().expect("vat"), "399999999900003");
    assert!(qr.timestamp().expect("timestamp").starts_with("2024-01-14T10:26:49"));
    assert_eq!(qr.total_with_vat().expect("total"), "248.98");
    assert_eq!(qr.vat_total().expect("vat total"), "32.48");
    assert_eq!(qr.invoice_hash().expect("hash"), invoice.invoice_hash());
    assert_eq!(qr.signature().expect("signature"), invoice.signature());
    assert_eq!(qr.public_key().expect("public key"), certificate.public_key_der());
    assert_eq!(
        qr.certificate_signature().expect("cert signature"),
        certificate.signature_bytes()
    );
    assert_eq!(extract_qr(invoice.xml()).expect("qr").as_deref(), Some(invoice.qr_code()));
}

#[test]
fn signed_properties_reflect_certificate() {
    let invoice = signed("INV-207");
    let props = invoice.signed_properties();
    assert_eq!(props.issuer(), "DC=local, DC=gov, DC=extgazt, CN=TSZEINVOICE-SubCA-1");
    assert_eq!(props.serial(), "605153021713473408034560330772915874920451276874");
    assert_eq!(
        props.cert_digest(),
        "NTA1ZGYzYTczYjY1NWVkNWJkNTliNjQwNTcwYWMzZjM2NzRmNGI3ZmNhYzllNGFkZDBiYmNiZjBhNmQ1NzI4MQ=="
    );
    assert_eq!(
        props.signing_time().format("%Y-%m-%dT%H:%M:%S").to_string(),
        "2024-01-14T10:26:49"
    );
    assert!(invoice.xml().contains(&format!("<cbc:UUID>{}</cbc:UUID>", invoice.uuid())));
}

#[test]
fn rendering_without_chain_link_fails_to_sign() {
    assert!(simplified_invoice("INV-208").sign(&signer()).is_err());
}
