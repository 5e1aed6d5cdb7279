//! XML document model and serialization
//!
//! [`XmlDocument`] is the parsed, read-only form shared by validation and
//! transformation. [`XmlWriter`] serializes the result trees produced by
//! transformations.

mod document;
mod encoding;
mod writer;

pub use document::{
    AttributeData, ElementData, NodeId, NodeKind, QName, XmlDocument, XML_NAMESPACE,
};
pub use encoding::decode_document;
pub use writer::{escape_attribute, escape_text, OutputElement, OutputNode, XmlWriter};
