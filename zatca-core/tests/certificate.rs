mod common;

use base64ct::{Base64, Encoding};
use chrono::{Duration, TimeZone, Utc};
use common::fixture;
use secrecy::ExposeSecret;
use zatca_core::CertificateError;
use zatca_core::certificate::{
    CertificateInfo, CertificateKind, CertificateProvider, CertificateRecord, CertificateStore,
    MemoryCertificateStore,
};

#[test]
fn signing_certificate_values() {
    let info = CertificateInfo::from_pem(&fixture("signing-cert.pem")).expect("cert");
    assert_eq!(
        info.issuer_name(),
        "DC=local, DC=gov, DC=extgazt, CN=TSZEINVOICE-SubCA-1"
    );
    assert_eq!(
        info.serial_number(),
        "605153021713473408034560330772915874920451276874"
    );
    assert_eq!(
        info.digest(),
        "NTA1ZGYzYTczYjY1NWVkNWJkNTliNjQwNTcwYWMzZjM2NzRmNGI3ZmNhYzllNGFkZDBiYmNiZjBhNmQ1NzI4MQ=="
    );
    assert_eq!(
        Base64::encode_string(info.public_key_der()),
        "MFYwEAYHKoZIzj0CAQYFK4EEAAoDQgAElHX23/oKrOp7hNAhCJ3BKkBqvx2ss65CXSjO6EkolZuDnFEZ4J5T/Rcz07BnHwL6lncGg2aOGtYl8CCP1Jo9KA=="
    );
    assert!(!info.signature_bytes().is_empty());

    let again = CertificateInfo::from_base64(&info.der_base64()).expect("base64 der");
    assert_eq!(again.digest(), info.digest());
}

#[test]
fn expired_certificate_is_detected() {
    let info = CertificateInfo::from_pem(&fixture("expired-cert.pem")).expect("cert");
    assert_eq!(info.issuer_name(), "C=SA, O=Expired Test, CN=expired.example");
    assert_eq!(info.serial_number(), "7");
    assert!(info.is_expired_at(Utc::now()));
    assert!(!info.is_expired_at(Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).single().expect("date")));
}

#[test]
fn record_rejects_key_from_another_pair() {
    let err = CertificateRecord::new(
        CertificateKind::Production,
        fixture("signing-cert.pem"),
        fixture("other-key.pem"),
        "secret",
    )
    .expect_err("mismatched key");
    assert!(matches!(err, CertificateError::KeyMismatch));
}

#[test]
fn provider_returns_active_certificate_until_it_expires() {
    let store = MemoryCertificateStore::default();
    let now = Utc::now();
    assert!(matches!(
        store.active_certificate(CertificateKind::Production, now),
        Err(CertificateError::NoActiveCertificate(CertificateKind::Production))
    ));

    let record = CertificateRecord::new(
        CertificateKind::Production,
        fixture("signing-cert.pem"),
        fixture("signing-key.pem"),
        "api-secret",
    )
    .expect("record")
    .with_request_id("1234567890123");
    store.rotate(record);

    let active = store
        .active_certificate(CertificateKind::Production, now)
        .expect("active");
    assert_eq!(active.request_id(), Some("1234567890123"));
    assert_eq!(active.api_secret().expose_secret(), "api-secret");
    assert!(!format!("{active:?}").contains("api-secret"));
    assert!(active.signer().is_ok());

    let far_future = active.expires_at() + Duration::days(1);
    assert!(matches!(
        store.active_certificate(CertificateKind::Production, far_future),
        Err(CertificateError::Expired { .. })
    ));
    assert!(matches!(
        store.active_certificate(CertificateKind::Compliance, now),
        Err(CertificateError::NoActiveCertificate(_))
    ));
}
