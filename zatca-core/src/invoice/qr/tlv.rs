//! Tag-length-value framing with BER definite lengths.
use super::CodecError;
use std::collections::BTreeMap;

/// Long-form lengths longer than this many bytes are rejected.
const MAX_LENGTH_BYTES: usize = 4;

/// Concatenate `tag | length | value` triples in ascending tag order.
pub fn encode(fields: &BTreeMap<u8, Vec<u8>>) -> Vec<u8> {
    let mut out = Vec::with_capacity(fields.values().map(|v| v.len() + 4).sum());
    for (tag, value) in fields {
        out.push(*tag);
        encode_length(value.len(), &mut out);
        out.extend_from_slice(value);
    }
    out
}

/// Inverse of [`encode`]. Repeated tags are an error.
pub fn decode(bytes: &[u8]) -> Result<BTreeMap<u8, Vec<u8>>, CodecError> {
    let mut fields = BTreeMap::new();
    let mut offset = 0;
    while offset < bytes.len() {
        let tag = bytes[offset];
        offset += 1;
        let (len, consumed) = decode_length(bytes, offset)?;
        offset += consumed;

        let available = bytes.len() - offset;
        if len > available {
            return Err(CodecError::TruncatedValue {
                tag,
                expected: len,
                available,
            });
        }
        let value = bytes[offset..offset + len].to_vec();
        offset += len;

        if fields.insert(tag, value).is_some() {
            return Err(CodecError::DuplicateTag(tag));
        }
    }
    Ok(fields)
}

pub(crate) fn encode_length(len: usize, out: &mut Vec<u8>) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let be = len.to_be_bytes();
    let skip = be.iter().take_while(|b| **b == 0).count();
    let significant = &be[skip..];
    out.push(0x80 | significant.len() as u8);
    out.extend_from_slice(significant);
}

/// Returns the length and how many bytes encoded it.
pub(crate) fn decode_length(bytes: &[u8], offset: usize) -> Result<(usize, usize), CodecError> {
    let first = *bytes
        .get(offset)
        .ok_or(CodecError::TruncatedLength { offset })?;
    if first & 0x80 == 0 {
        return Ok((usize::from(first), 1));
    }

    let count = usize::from(first & 0x7F);
    if count == 0 {
        return Err(CodecError::IndefiniteLength { offset });
    }
    if count > MAX_LENGTH_BYTES {
        return Err(CodecError::LengthOverflow { offset });
    }
    let digits = bytes
        .get(offset + 1..offset + 1 + count)
        .ok_or(CodecError::TruncatedLength { offset })?;
    let len = digits
        .iter()
        .fold(0usize, |acc, byte| (acc << 8) | usize::from(*byte));
    Ok((len, 1 + count))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn length_bytes(len: usize) -> Vec<u8> {
        let mut out = Vec::new();
        encode_length(len, &mut out);
        out
    }

    #[test]
    fn short_and_long_form_lengths() {
        assert_eq!(length_bytes(0), vec![0x00]);
        assert_eq!(length_bytes(127), vec![0x7F]);
        assert_eq!(length_bytes(128), vec![0x81, 0x80]);
        assert_eq!(length_bytes(255), vec![0x81, 0xFF]);
        assert_eq!(length_bytes(256), vec![0x82, 0x01, 0x00]);
        assert_eq!(length_bytes(600), vec![0x82, 0x02, 0x58]);

        assert_eq!(decode_length(&[0x82, 0x02, 0x58], 0).expect("len"), (600, 3));
        assert_eq!(decode_length(&[0x00, 0x7F], 1).expect("len"), (127, 1));
    }

    #[test]
    fn malformed_lengths() {
        assert!(matches!(
            decode_length(&[0x80], 0),
            Err(CodecError::IndefiniteLength { offset: 0 })
        ));
        assert!(matches!(
            decode_length(&[0x85, 1, 1, 1, 1, 1], 0),
            Err(CodecError::LengthOverflow { offset: 0 })
        ));
        assert!(matches!(
            decode_length(&[0x82, 0x01], 0),
            Err(CodecError::TruncatedLength { offset: 0 })
        ));
        assert!(matches!(
            decode_length(&[], 0),
            Err(CodecError::TruncatedLength { offset: 0 })
        ));
    }

    #[test]
    fn decode_skips_over_long_values() {
        let mut fields = BTreeMap::new();
        fields.insert(1, b"Acme".to_vec());
        fields.insert(8, vec![0xAB; 200]);
        fields.insert(9, vec![0x01]);
        let bytes = encode(&fields);
        assert_eq!(&bytes[..6], &[1, 4, b'A', b'c', b'm', b'e']);
        assert_eq!(&bytes[6..9], &[8, 0x81, 200]);
        assert_eq!(decode(&bytes).expect("decode"), fields);
    }

    #[test]
    fn truncated_and_repeated_input() {
        assert!(matches!(
            decode(&[1, 5, b'a', b'b']),
            Err(CodecError::TruncatedValue {
                tag: 1,
                expected: 5,
                available: 2
            })
        ));
        assert!(matches!(
            decode(&[1]),
            Err(CodecError::TruncatedLength { offset: 1 })
        ));
        assert!(matches!(
            decode(&[2, 1, b'a', 2, 1, b'b']),
            Err(CodecError::DuplicateTag(2))
        ));
        assert!(decode(&[]).expect("empty").is_empty());
    }
}
