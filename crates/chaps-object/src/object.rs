use std::collections::BTreeMap;
use std::fmt;

use chaps_types::attributes::{attribute_name, CKA_CLASS, CKA_PRIVATE, CKO_DATA};
use chaps_types::{AttributeType, Handle, ObjectClass, StoreId};

use crate::codec::{decode_ulong, encode_ulong, parse_attributes, serialize_attributes};
use crate::error::ObjectResult;

/// Attribute values keyed by attribute type, in ascending type order.
pub type AttributeMap = BTreeMap<AttributeType, Vec<u8>>;

/// A PKCS#11 token object: key, certificate, or opaque data.
///
/// The handle is [`Handle::INVALID`] until a pool catalogues the object, and
/// the store id is `None` until its blob is persisted.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Object {
    attributes: AttributeMap,
    handle: Handle,
    store_id: Option<StoreId>,
}

impl Object {
    /// Create an empty object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an object holding the given attributes.
    pub fn with_attributes(attributes: AttributeMap) -> Self {
        Self {
            attributes,
            ..Self::default()
        }
    }

    /// Whether the object is private. `CKA_PRIVATE` defaults to true.
    pub fn is_private(&self) -> bool {
        self.get_attribute_bool(CKA_PRIVATE, true)
    }

    /// The object's `CKA_CLASS`, or `CKO_DATA` if absent.
    pub fn get_object_class(&self) -> ObjectClass {
        self.get_attribute_int(CKA_CLASS, CKO_DATA)
    }

    pub fn is_attribute_present(&self, attribute: AttributeType) -> bool {
        self.attributes.contains_key(&attribute)
    }

    pub fn get_attribute_bytes(&self, attribute: AttributeType) -> Option<&[u8]> {
        self.attributes.get(&attribute).map(Vec::as_slice)
    }

    /// The attribute as UTF-8 text; `None` if absent or not valid UTF-8.
    pub fn get_attribute_string(&self, attribute: AttributeType) -> Option<String> {
        self.get_attribute_bytes(attribute)
            .and_then(|raw| String::from_utf8(raw.to_vec()).ok())
    }

    /// The attribute as an integer, or `default` if absent or malformed.
    pub fn get_attribute_int(&self, attribute: AttributeType, default: u64) -> u64 {
        self.get_attribute_bytes(attribute)
            .and_then(decode_ulong)
            .unwrap_or(default)
    }

    /// The attribute as a `CK_BBOOL`, or `default` if absent or empty.
    pub fn get_attribute_bool(&self, attribute: AttributeType, default: bool) -> bool {
        match self.get_attribute_bytes(attribute) {
            Some([first, ..]) => *first != 0,
            _ => default,
        }
    }

    pub fn set_attribute_bytes(&mut self, attribute: AttributeType, value: impl Into<Vec<u8>>) {
        self.attributes.insert(attribute, value.into());
    }

    pub fn set_attribute_string(&mut self, attribute: AttributeType, value: &str) {
        self.set_attribute_bytes(attribute, value.as_bytes());
    }

    /// Store a `CK_ULONG` at native width.
    pub fn set_attribute_int(&mut self, attribute: AttributeType, value: u64) {
        self.set_attribute_bytes(attribute, encode_ulong(value));
    }

    pub fn set_attribute_bool(&mut self, attribute: AttributeType, value: bool) {
        self.set_attribute_bytes(attribute, vec![u8::from(value)]);
    }

    /// Remove an attribute, returning its previous value.
    pub fn remove_attribute(&mut self, attribute: AttributeType) -> Option<Vec<u8>> {
        self.attributes.remove(&attribute)
    }

    pub fn get_attribute_map(&self) -> &AttributeMap {
        &self.attributes
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn set_handle(&mut self, handle: Handle) {
        self.handle = handle;
    }

    pub fn store_id(&self) -> Option<StoreId> {
        self.store_id
    }

    pub fn set_store_id(&mut self, store_id: StoreId) {
        self.store_id = Some(store_id);
    }

    /// Serialize the attributes into a flat attribute list.
    pub fn serialize(&self) -> ObjectResult<Vec<u8>> {
        serialize_attributes(&self.attributes)
    }

    /// Replace the attributes with those parsed from a flat attribute list.
    ///
    /// Handle and store id are left untouched. On error the object is not
    /// modified.
    pub fn parse(&mut self, data: &[u8]) -> ObjectResult<()> {
        self.attributes = parse_attributes(data)?;
        Ok(())
    }

    /// Subset match: every attribute of `template` is present here with an
    /// identical value. An empty template matches every object.
    pub fn matches(&self, template: &Object) -> bool {
        template
            .attributes
            .iter()
            .all(|(attribute, value)| self.attributes.get(attribute) == Some(value))
    }
}

impl fmt::Debug for Object {
    // Attribute values may be key material; only names are printed.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.attributes.keys().map(|&a| attribute_name(a)).collect();
        f.debug_struct("Object")
            .field("handle", &self.handle)
            .field("store_id", &self.store_id)
            .field("attributes", &names)
            .finish()
    }
}
