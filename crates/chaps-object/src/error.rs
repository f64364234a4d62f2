use chaps_types::AttributeType;

/// Errors from attribute encoding and decoding.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ObjectError {
    /// The serialized attribute list ends in the middle of a record.
    #[error("truncated attribute list at offset {offset}: need {needed} bytes, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// The same attribute type appears twice in one list.
    #[error("duplicate attribute 0x{0:08x}")]
    DuplicateAttribute(AttributeType),

    /// An attribute value does not fit the 32-bit length field.
    #[error("attribute 0x{attribute:08x} value too large: {len} bytes")]
    ValueTooLarge { attribute: AttributeType, len: usize },

    /// An integral attribute has a width that cannot hold a `CK_ULONG`.
    #[error("integral attribute 0x{attribute:08x} has invalid width {len}")]
    IntegralWidth { attribute: AttributeType, len: usize },

    /// An integral value does not fit the native `CK_ULONG`.
    #[error("integral attribute 0x{attribute:08x} value {value} overflows native width")]
    IntegralOverflow { attribute: AttributeType, value: u64 },
}

/// Result alias for object operations.
pub type ObjectResult<T> = Result<T, ObjectError>;
