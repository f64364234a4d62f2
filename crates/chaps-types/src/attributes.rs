//! PKCS#11 attribute types and object classes used by the object store.
//!
//! Only the attributes the store itself interprets, or that show up in
//! diagnostics, are listed here. Any other 32-bit attribute type is carried
//! through opaquely.

/// A PKCS#11 attribute type (`CK_ATTRIBUTE_TYPE`), 32 bits on the wire.
pub type AttributeType = u32;

/// A PKCS#11 object class (`CK_OBJECT_CLASS`).
pub type ObjectClass = u64;

pub const CKA_CLASS: AttributeType = 0x0000;
pub const CKA_TOKEN: AttributeType = 0x0001;
pub const CKA_PRIVATE: AttributeType = 0x0002;
pub const CKA_LABEL: AttributeType = 0x0003;
pub const CKA_APPLICATION: AttributeType = 0x0010;
pub const CKA_VALUE: AttributeType = 0x0011;
pub const CKA_OBJECT_ID: AttributeType = 0x0012;
pub const CKA_CERTIFICATE_TYPE: AttributeType = 0x0080;
pub const CKA_ISSUER: AttributeType = 0x0081;
pub const CKA_SERIAL_NUMBER: AttributeType = 0x0082;
pub const CKA_CERTIFICATE_CATEGORY: AttributeType = 0x0087;
pub const CKA_KEY_TYPE: AttributeType = 0x0100;
pub const CKA_SUBJECT: AttributeType = 0x0101;
pub const CKA_ID: AttributeType = 0x0102;
pub const CKA_SENSITIVE: AttributeType = 0x0103;
pub const CKA_ENCRYPT: AttributeType = 0x0104;
pub const CKA_DECRYPT: AttributeType = 0x0105;
pub const CKA_WRAP: AttributeType = 0x0106;
pub const CKA_UNWRAP: AttributeType = 0x0107;
pub const CKA_SIGN: AttributeType = 0x0108;
pub const CKA_VERIFY: AttributeType = 0x010A;
pub const CKA_MODULUS: AttributeType = 0x0120;
pub const CKA_MODULUS_BITS: AttributeType = 0x0121;
pub const CKA_PUBLIC_EXPONENT: AttributeType = 0x0122;
pub const CKA_PRIME_BITS: AttributeType = 0x0133;
pub const CKA_SUBPRIME_BITS: AttributeType = 0x0134;
pub const CKA_VALUE_BITS: AttributeType = 0x0160;
pub const CKA_VALUE_LEN: AttributeType = 0x0161;
pub const CKA_EXTRACTABLE: AttributeType = 0x0162;
pub const CKA_LOCAL: AttributeType = 0x0163;
pub const CKA_NEVER_EXTRACTABLE: AttributeType = 0x0164;
pub const CKA_ALWAYS_SENSITIVE: AttributeType = 0x0165;
pub const CKA_KEY_GEN_MECHANISM: AttributeType = 0x0166;
pub const CKA_MODIFIABLE: AttributeType = 0x0170;
pub const CKA_HW_FEATURE_TYPE: AttributeType = 0x0300;
pub const CKA_PIXEL_X: AttributeType = 0x0400;
pub const CKA_PIXEL_Y: AttributeType = 0x0401;
pub const CKA_RESOLUTION: AttributeType = 0x0402;
pub const CKA_CHAR_ROWS: AttributeType = 0x0403;
pub const CKA_CHAR_COLUMNS: AttributeType = 0x0404;
pub const CKA_BITS_PER_PIXEL: AttributeType = 0x0408;
pub const CKA_MECHANISM_TYPE: AttributeType = 0x0500;
pub const CKA_VENDOR_DEFINED: AttributeType = 0x8000_0000;

/// Vendor attribute holding a hardware-wrapped key blob.
pub const KEY_BLOB_ATTRIBUTE: AttributeType = CKA_VENDOR_DEFINED + 1;
/// Vendor attribute holding the authorization data for a wrapped key.
pub const AUTH_DATA_ATTRIBUTE: AttributeType = CKA_VENDOR_DEFINED + 2;
/// Vendor attribute marking objects imported from a legacy token.
pub const LEGACY_ATTRIBUTE: AttributeType = CKA_VENDOR_DEFINED + 3;

pub const CKO_DATA: ObjectClass = 0;
pub const CKO_CERTIFICATE: ObjectClass = 1;
pub const CKO_PUBLIC_KEY: ObjectClass = 2;
pub const CKO_PRIVATE_KEY: ObjectClass = 3;
pub const CKO_SECRET_KEY: ObjectClass = 4;

/// Returns `true` for attributes whose value is a `CK_ULONG`.
///
/// The width of a `CK_ULONG` differs between platforms, so these values are
/// re-encoded to the native width whenever a blob is parsed.
pub fn is_integral_attribute(attribute: AttributeType) -> bool {
    matches!(
        attribute,
        CKA_CLASS
            | CKA_KEY_TYPE
            | CKA_MODULUS_BITS
            | CKA_VALUE_BITS
            | CKA_VALUE_LEN
            | CKA_CERTIFICATE_TYPE
            | CKA_CERTIFICATE_CATEGORY
            | CKA_PRIME_BITS
            | CKA_SUBPRIME_BITS
            | CKA_KEY_GEN_MECHANISM
            | CKA_HW_FEATURE_TYPE
            | CKA_MECHANISM_TYPE
            | CKA_PIXEL_X
            | CKA_PIXEL_Y
            | CKA_RESOLUTION
            | CKA_CHAR_ROWS
            | CKA_CHAR_COLUMNS
            | CKA_BITS_PER_PIXEL
    )
}

/// Human-readable attribute name for logs and the admin tool.
pub fn attribute_name(attribute: AttributeType) -> String {
    let name = match attribute {
        CKA_CLASS => "CKA_CLASS",
        CKA_TOKEN => "CKA_TOKEN",
        CKA_PRIVATE => "CKA_PRIVATE",
        CKA_LABEL => "CKA_LABEL",
        CKA_APPLICATION => "CKA_APPLICATION",
        CKA_VALUE => "CKA_VALUE",
        CKA_OBJECT_ID => "CKA_OBJECT_ID",
        CKA_CERTIFICATE_TYPE => "CKA_CERTIFICATE_TYPE",
        CKA_ISSUER => "CKA_ISSUER",
        CKA_SERIAL_NUMBER => "CKA_SERIAL_NUMBER",
        CKA_CERTIFICATE_CATEGORY => "CKA_CERTIFICATE_CATEGORY",
        CKA_KEY_TYPE => "CKA_KEY_TYPE",
        CKA_SUBJECT => "CKA_SUBJECT",
        CKA_ID => "CKA_ID",
        CKA_SENSITIVE => "CKA_SENSITIVE",
        CKA_ENCRYPT => "CKA_ENCRYPT",
        CKA_DECRYPT => "CKA_DECRYPT",
        CKA_WRAP => "CKA_WRAP",
        CKA_UNWRAP => "CKA_UNWRAP",
        CKA_SIGN => "CKA_SIGN",
        CKA_VERIFY => "CKA_VERIFY",
        CKA_MODULUS => "CKA_MODULUS",
        CKA_MODULUS_BITS => "CKA_MODULUS_BITS",
        CKA_PUBLIC_EXPONENT => "CKA_PUBLIC_EXPONENT",
        CKA_PRIME_BITS => "CKA_PRIME_BITS",
        CKA_SUBPRIME_BITS => "CKA_SUBPRIME_BITS",
        CKA_VALUE_BITS => "CKA_VALUE_BITS",
        CKA_VALUE_LEN => "CKA_VALUE_LEN",
        CKA_EXTRACTABLE => "CKA_EXTRACTABLE",
        CKA_LOCAL => "CKA_LOCAL",
        CKA_NEVER_EXTRACTABLE => "CKA_NEVER_EXTRACTABLE",
        CKA_ALWAYS_SENSITIVE => "CKA_ALWAYS_SENSITIVE",
        CKA_KEY_GEN_MECHANISM => "CKA_KEY_GEN_MECHANISM",
        CKA_MODIFIABLE => "CKA_MODIFIABLE",
        CKA_HW_FEATURE_TYPE => "CKA_HW_FEATURE_TYPE",
        CKA_PIXEL_X => "CKA_PIXEL_X",
        CKA_PIXEL_Y => "CKA_PIXEL_Y",
        CKA_RESOLUTION => "CKA_RESOLUTION",
        CKA_CHAR_ROWS => "CKA_CHAR_ROWS",
        CKA_CHAR_COLUMNS => "CKA_CHAR_COLUMNS",
        CKA_BITS_PER_PIXEL => "CKA_BITS_PER_PIXEL",
        CKA_MECHANISM_TYPE => "CKA_MECHANISM_TYPE",
        KEY_BLOB_ATTRIBUTE => "kKeyBlobAttribute",
        AUTH_DATA_ATTRIBUTE => "kAuthDataAttribute",
        LEGACY_ATTRIBUTE => "kLegacyAttribute",
        other => return format!("0x{other:08x}"),
    };
    name.to_string()
}
