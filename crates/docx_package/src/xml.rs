//! XML helpers shared by the package parts and the template parser

use quick_xml::events::BytesStart;
use quick_xml::Reader;

/// Create an XML reader over a string, trimming insignificant whitespace
pub fn reader_from_str(content: &str) -> Reader<&[u8]> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);
    reader
}

/// Get an attribute value from a start tag, unescaped
pub fn get_attribute(event: &BytesStart, name: &[u8]) -> Option<String> {
    event
        .attributes()
        .filter_map(|a| a.ok())
        .find(|a| a.key.as_ref() == name)
        .map(|a| match a.unescape_value() {
            Ok(value) => value.into_owned(),
            Err(_) => String::from_utf8_lossy(&a.value).into_owned(),
        })
}

/// Check if an element name matches with optional namespace prefix
pub fn matches_element(name: &[u8], expected: &str) -> bool {
    let name_str = std::str::from_utf8(name).unwrap_or("");
    name_str == expected
        || name_str
            .rsplit_once(':')
            .map(|(_, local)| local == expected)
            .unwrap_or(false)
}

/// Escape text for use in element content or attribute values
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
