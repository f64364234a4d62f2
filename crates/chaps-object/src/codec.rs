//! Flat attribute-list encoding used for object blobs.
//!
//! Format, repeated once per attribute in ascending type order:
//! ```text
//! [4 bytes: attribute type (little-endian u32)]
//! [4 bytes: value length (little-endian u32)]
//! [N bytes: value]
//! ```
//! Integral attribute values are `CK_ULONG`s in native byte order. Their
//! width depends on the platform that wrote them, so [`parse_attributes`]
//! re-encodes them to the native width of the reading platform.

use std::ffi::c_ulong;

use chaps_types::attributes::is_integral_attribute;
use chaps_types::AttributeType;

use crate::error::{ObjectError, ObjectResult};
use crate::object::AttributeMap;

/// Header size: 4 bytes type + 4 bytes length.
const HEADER_SIZE: usize = 8;

/// Width of a native `CK_ULONG` in bytes.
pub const ULONG_SIZE: usize = std::mem::size_of::<c_ulong>();

/// Serialize an attribute map into the flat list format.
pub fn serialize_attributes(attributes: &AttributeMap) -> ObjectResult<Vec<u8>> {
    let total: usize = attributes.values().map(|v| HEADER_SIZE + v.len()).sum();
    let mut out = Vec::with_capacity(total);
    for (&attribute, value) in attributes {
        let len = u32::try_from(value.len()).map_err(|_| ObjectError::ValueTooLarge {
            attribute,
            len: value.len(),
        })?;
        out.extend_from_slice(&attribute.to_le_bytes());
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(value);
    }
    Ok(out)
}

/// Parse a flat attribute list, normalizing integral attributes.
pub fn parse_attributes(data: &[u8]) -> ObjectResult<AttributeMap> {
    let mut attributes = AttributeMap::new();
    let mut offset = 0;

    while offset < data.len() {
        let header = take(data, offset, HEADER_SIZE)?;
        let attribute = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
        offset += HEADER_SIZE;

        let raw = take(data, offset, len)?;
        offset += len;

        let value = if is_integral_attribute(attribute) {
            normalize_integral(attribute, raw)?
        } else {
            raw.to_vec()
        };
        if attributes.insert(attribute, value).is_some() {
            return Err(ObjectError::DuplicateAttribute(attribute));
        }
    }

    Ok(attributes)
}

/// Encode a `CK_ULONG` at native width and byte order.
///
/// Values outside the native range saturate.
pub fn encode_ulong(value: u64) -> Vec<u8> {
    let native = c_ulong::try_from(value).unwrap_or(c_ulong::MAX);
    native.to_ne_bytes().to_vec()
}

/// Decode an integer of width 1, 2, 4 or 8 in native byte order.
pub fn decode_ulong(raw: &[u8]) -> Option<u64> {
    match raw.len() {
        1 => Some(u64::from(raw[0])),
        2 => Some(u64::from(u16::from_ne_bytes([raw[0], raw[1]]))),
        4 => Some(u64::from(u32::from_ne_bytes([raw[0], raw[1], raw[2], raw[3]]))),
        8 => {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(raw);
            Some(u64::from_ne_bytes(buf))
        }
        _ => None,
    }
}

fn normalize_integral(attribute: AttributeType, raw: &[u8]) -> ObjectResult<Vec<u8>> {
    if raw.len() == ULONG_SIZE {
        return Ok(raw.to_vec());
    }
    let value = decode_ulong(raw).ok_or(ObjectError::IntegralWidth {
        attribute,
        len: raw.len(),
    })?;
    if c_ulong::try_from(value).is_err() {
        return Err(ObjectError::IntegralOverflow { attribute, value });
    }
    Ok(encode_ulong(value))
}

fn take(data: &[u8], offset: usize, len: usize) -> ObjectResult<&[u8]> {
    let available = data.len() - offset;
    if len > available {
        return Err(ObjectError::Truncated {
            offset,
            needed: len,
            available,
        });
    }
    Ok(&data[offset..offset + len])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chaps_types::attributes::{CKA_CLASS, CKA_ID, CKA_LABEL, CKA_MODULUS_BITS, CKA_PRIVATE};
    use proptest::prelude::*;

    fn record(attribute: u32, value: &[u8]) -> Vec<u8> {
        let mut out = attribute.to_le_bytes().to_vec();
        out.extend_from_slice(&(value.len() as u32).to_le_bytes());
        out.extend_from_slice(value);
        out
    }

    #[test]
    fn empty_map_is_empty_list() {
        let map = AttributeMap::new();
        assert!(serialize_attributes(&map).unwrap().is_empty());
        assert!(parse_attributes(&[]).unwrap().is_empty());
    }

    #[test]
    fn layout_is_type_length_value() {
        let mut map = AttributeMap::new();
        map.insert(CKA_ID, b"value".to_vec());
        let bytes = serialize_attributes(&map).unwrap();
        assert_eq!(bytes, record(CKA_ID, b"value"));
    }

    #[test]
    fn records_are_ordered_by_type() {
        let mut map = AttributeMap::new();
        map.insert(CKA_LABEL, b"l".to_vec());
        map.insert(CKA_PRIVATE, vec![1]);
        let bytes = serialize_attributes(&map).unwrap();
        let mut expected = record(CKA_PRIVATE, &[1]);
        expected.extend(record(CKA_LABEL, b"l"));
        assert_eq!(bytes, expected);
    }

    #[test]
    fn narrow_integral_is_widened() {
        let data = record(CKA_MODULUS_BITS, &2048u32.to_ne_bytes());
        let map = parse_attributes(&data).unwrap();
        let value = &map[&CKA_MODULUS_BITS];
        assert_eq!(value.len(), ULONG_SIZE);
        assert_eq!(decode_ulong(value), Some(2048));
    }

    #[test]
    fn wide_integral_is_kept_or_narrowed() {
        let data = record(CKA_CLASS, &3u64.to_ne_bytes());
        let map = parse_attributes(&data).unwrap();
        assert_eq!(map[&CKA_CLASS].len(), ULONG_SIZE);
        assert_eq!(decode_ulong(&map[&CKA_CLASS]), Some(3));
    }

    #[test]
    fn integral_with_odd_width_is_rejected() {
        let data = record(CKA_CLASS, &[1, 2, 3]);
        assert_eq!(
            parse_attributes(&data),
            Err(ObjectError::IntegralWidth { attribute: CKA_CLASS, len: 3 })
        );
    }

    #[test]
    fn non_integral_values_are_untouched() {
        let data = record(CKA_ID, &[1, 2, 3]);
        assert_eq!(parse_attributes(&data).unwrap()[&CKA_ID], vec![1, 2, 3]);
    }

    #[test]
    fn truncated_header_is_rejected() {
        let mut data = record(CKA_ID, b"x");
        data.extend_from_slice(&[0, 0, 0]);
        assert!(matches!(
            parse_attributes(&data),
            Err(ObjectError::Truncated { needed: 8, available: 3, .. })
        ));
    }

    #[test]
    fn truncated_value_is_rejected() {
        let mut data = record(CKA_ID, b"abcdef");
        data.truncate(data.len() - 2);
        assert!(matches!(
            parse_attributes(&data),
            Err(ObjectError::Truncated { offset: 8, needed: 6, available: 4 })
        ));
    }

    #[test]
    fn duplicate_attribute_is_rejected() {
        let mut data = record(CKA_ID, b"a");
        data.extend(record(CKA_ID, b"b"));
        assert_eq!(parse_attributes(&data), Err(ObjectError::DuplicateAttribute(CKA_ID)));
    }

    proptest! {
        #[test]
        fn roundtrip_opaque_attributes(
            map in proptest::collection::btree_map(
                0x1000u32..0x2000,
                proptest::collection::vec(any::<u8>(), 0..64),
                0..16,
            )
        ) {
            let bytes = serialize_attributes(&map).unwrap();
            prop_assert_eq!(parse_attributes(&bytes).unwrap(), map);
        }
    }
}
