use proptest::collection::{btree_map, vec};
use proptest::prelude::*;
use std::collections::BTreeMap;
use zatca_core::CodecError;
use zatca_core::invoice::QrPayload;
use zatca_core::invoice::qr::tlv;

proptest! {
    #[test]
    fn tlv_decodes_what_it_encodes(fields in btree_map(1u8..=20, vec(any::<u8>(), 0..=600), 1..9)) {
        let bytes = tlv::encode(&fields);
        prop_assert_eq!(tlv::decode(&bytes), Ok(fields));
    }

    #[test]
    fn truncated_field_is_rejected(tag in 1u8..=9, value in vec(any::<u8>(), 1..=600), cut in any::<usize>()) {
        let bytes = tlv::encode(&BTreeMap::from([(tag, value)]));
        let keep = 1 + cut % (bytes.len() - 1);
        prop_assert!(tlv::decode(&bytes[..keep]).is_err());
    }
}

#[test]
fn long_values_use_multi_byte_lengths() {
    let mut fields = BTreeMap::new();
    fields.insert(8u8, vec![0xAB; 200]);
    let bytes = tlv::encode(&fields);
    assert_eq!(&bytes[..3], &[8, 0x81, 200]);

    fields.insert(9u8, vec![0xCD; 300]);
    let bytes = tlv::encode(&fields);
    let offset = 3 + 200;
    assert_eq!(&bytes[offset..offset + 4], &[9, 0x82, 0x01, 0x2C]);
}

#[test]
fn short_form_boundary() {
    let mut fields = BTreeMap::new();
    fields.insert(1u8, vec![b'x'; 127]);
    assert_eq!(&tlv::encode(&fields)[..2], &[1, 127]);
    fields.insert(1u8, vec![b'x'; 128]);
    assert_eq!(&tlv::encode(&fields)[..3], &[1, 0x81, 128]);
}

#[test]
fn bad_base64_and_duplicate_tags_are_rejected() {
    assert!(matches!(QrPayload::decode("not base64!"), Err(CodecError::Base64)));
    assert!(matches!(
        QrPayload::from_bytes(&[1, 1, b'a', 1, 1, b'b']),
        Err(CodecError::DuplicateTag(1))
    ));
}

#[test]
fn simplified_payload_reports_missing_signature_tags() {
    let qr = QrPayload::new(
        "Acme Widgets LTD",
        "399999999900003",
        "2024-01-14T10:26:49",
        "248.98",
        "32.48",
    );
    let decoded = QrPayload::decode(&qr.encode()).expect("decode");
    assert_eq!(decoded, qr);
    let issues = decoded.validate();
    assert_eq!(issues.len(), 4);
}
