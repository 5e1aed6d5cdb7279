//! Character encoding of documents read as bytes

use encoding_rs::{Encoding, UTF_8};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{Position, Result, XmlError};

/// Decode document bytes to text
///
/// A byte order mark wins over the XML declaration; without either the
/// document is UTF-8. Bytes that are invalid in the chosen encoding are an
/// error rather than being replaced.
pub fn decode_document(bytes: &[u8]) -> Result<String> {
    let encoding = match Encoding::for_bom(bytes) {
        Some((encoding, _)) => encoding,
        None => declared_encoding(bytes)?.unwrap_or(UTF_8),
    };
    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(XmlError::syntax(
            format!("document is not valid {}", used.name()),
            Position::new(1, 1),
        ));
    }
    Ok(text.into_owned())
}

/// Encoding named by the `<?xml ... encoding="..."?>` declaration
fn declared_encoding(bytes: &[u8]) -> Result<Option<&'static Encoding>> {
    if !bytes.starts_with(b"<?xml") {
        return Ok(None);
    }
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();
    let decl = match reader.read_event_into(&mut buf) {
        Ok(Event::Decl(decl)) => decl,
        _ => return Ok(None),
    };
    let label = match decl.encoding() {
        Some(Ok(label)) => label.into_owned(),
        Some(Err(e)) => return Err(XmlError::syntax(e.to_string(), Position::new(1, 1))),
        None => return Ok(None),
    };
    match Encoding::for_label(&label) {
        // A UTF-16 declaration in ASCII-compatible bytes has no BOM to back it
        Some(encoding) => Ok(Some(encoding.output_encoding())),
        None => Err(XmlError::syntax(
            format!("unsupported encoding '{}'", String::from_utf8_lossy(&label)),
            Position::new(1, 1),
        )),
    }
}
