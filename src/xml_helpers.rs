//! Shared XML attribute parsing utilities.
//!
//! These helpers are used by the streaming readers (relationships, shared
//! strings, content types) and by the tree builder. All of them handle
//! namespace-prefixed names and UTF-8 conversion without panicking.

use quick_xml::events::BytesStart;

use crate::error::Result;

/// Extract a string attribute value by key, unescaped.
///
/// Returns `None` if the attribute is missing or malformed.
pub fn attr_string(e: &BytesStart, key: &[u8]) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == key {
            return attr.unescape_value().ok().map(|v| v.into_owned());
        }
    }
    None
}

/// Extract a string attribute by local name (ignoring namespace prefix).
pub fn attr_string_local(e: &BytesStart, key: &[u8]) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.local_name().as_ref() == key {
            return attr.unescape_value().ok().map(|v| v.into_owned());
        }
    }
    None
}

/// Get the qualified (prefixed) element name, e.g. `c:ser`.
pub fn qualified_name_string(e: &BytesStart) -> Result<String> {
    Ok(std::str::from_utf8(e.name().as_ref())?.to_string())
}

/// Collect every attribute (including namespace declarations) in document
/// order with unescaped values.
pub fn collect_attributes(e: &BytesStart) -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    for attr in e.attributes() {
        let attr = attr?;
        let key = std::str::from_utf8(attr.key.as_ref())?.to_string();
        let value = attr.unescape_value()?.into_owned();
        out.push((key, value));
    }
    Ok(out)
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;

    fn make_start(xml: &str) -> BytesStart<'_> {
        // Strip < and > / /> to get just the tag content
        let content = xml
            .trim_start_matches('<')
            .trim_end_matches('>')
            .trim_end_matches('/')
            .trim_end();
        BytesStart::from_content(content, content.find(' ').unwrap_or(content.len()))
    }

    #[test]
    fn test_attr_string() {
        let e = make_start(r#"<foo name="a &amp; b" />"#);
        assert_eq!(attr_string(&e, b"name"), Some("a & b".to_string()));
        assert_eq!(attr_string(&e, b"missing"), None);
    }

    #[test]
    fn test_attr_string_local() {
        let e = make_start(r#"<c:externalData r:id="rId3" />"#);
        assert_eq!(attr_string_local(&e, b"id"), Some("rId3".to_string()));
        assert_eq!(attr_string(&e, b"id"), None);
    }

    #[test]
    fn test_qualified_name() {
        let e = make_start(r#"<c:ser>"#);
        assert_eq!(qualified_name_string(&e).unwrap(), "c:ser");
    }

    #[test]
    fn test_collect_attributes_keeps_order() {
        let e = make_start(r#"<row r="2" spans="1:3" x14ac:dyDescent="0.25">"#);
        let attrs = collect_attributes(&e).unwrap();
        let keys: Vec<_> = attrs.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["r", "spans", "x14ac:dyDescent"]);
    }
}
