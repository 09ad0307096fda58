//! Owned, mutable XML element tree.
//!
//! Chart parts and worksheet parts are small enough to hold in memory, and
//! edits (cache values, new cells) must land in place without disturbing the
//! rest of the part. Elements keep their qualified names (`c:ser`) and their
//! attributes in document order so a parse/serialize round trip preserves
//! namespace prefixes and declarations verbatim.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{ChartBindError, Result};
use crate::xml_helpers::{collect_attributes, qualified_name_string};

/// A node in the tree: an element or a run of character data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

/// An element with its qualified name, attributes, and children.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

/// A parsed part: optional XML declaration plus the root element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    pub standalone: Option<String>,
    pub root: XmlElement,
}

impl XmlDocument {
    /// Parse a complete XML part.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(bytes);
        reader.trim_text(false);

        let mut buf = Vec::new();
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut standalone = None;
        let mut root = None;

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Decl(ref d) => {
                    if let Some(value) = d.standalone() {
                        let value = value?;
                        standalone = Some(std::str::from_utf8(value.as_ref())?.to_string());
                    }
                }
                Event::Start(ref e) => {
                    stack.push(element_from_start(e)?);
                }
                Event::Empty(ref e) => {
                    let element = element_from_start(e)?;
                    attach(&mut stack, &mut root, element);
                }
                Event::End(_) => {
                    if let Some(mut element) = stack.pop() {
                        drop_indentation(&mut element);
                        attach(&mut stack, &mut root, element);
                    }
                }
                Event::Text(ref t) => {
                    if let Some(current) = stack.last_mut() {
                        current.children.push(XmlNode::Text(t.unescape()?.into_owned()));
                    }
                }
                Event::CData(ref c) => {
                    if let Some(current) = stack.last_mut() {
                        let text = std::str::from_utf8(c.as_ref())?;
                        current.children.push(XmlNode::Text(text.to_string()));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        let root = root.ok_or_else(|| ChartBindError::Parse("no root element".to_string()))?;
        Ok(Self { standalone, root })
    }

    /// Serialize the part, always emitting a UTF-8 declaration.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new(Vec::with_capacity(4096));
        writer.write_event(Event::Decl(BytesDecl::new(
            "1.0",
            Some("UTF-8"),
            self.standalone.as_deref(),
        )))?;
        writer.get_mut().extend_from_slice(b"\r\n");
        write_element(&mut writer, &self.root)?;
        Ok(writer.into_inner())
    }
}

fn element_from_start(e: &BytesStart) -> Result<XmlElement> {
    Ok(XmlElement {
        name: qualified_name_string(e)?,
        attributes: collect_attributes(e)?,
        children: Vec::new(),
    })
}

/// Whitespace-only text between child elements is indentation. In a leaf
/// element (`<a:t> </a:t>`, `<c:v> </c:v>`) it is the content and stays.
fn drop_indentation(element: &mut XmlElement) {
    let has_elements = element
        .children
        .iter()
        .any(|node| matches!(node, XmlNode::Element(_)));
    if has_elements {
        element.children.retain(|node| match node {
            XmlNode::Text(text) => !text.trim().is_empty(),
            XmlNode::Element(_) => true,
        });
    }
}

fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, element: XmlElement) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(XmlNode::Element(element));
    } else if root.is_none() {
        *root = Some(element);
    }
}

fn write_element<W: std::io::Write>(writer: &mut Writer<W>, element: &XmlElement) -> Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    for child in &element.children {
        match child {
            XmlNode::Element(el) => write_element(writer, el)?,
            XmlNode::Text(text) => writer.write_event(Event::Text(BytesText::new(text)))?,
        }
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;
    Ok(())
}

/// Strip a namespace prefix: `c:ser` -> `ser`.
#[inline]
pub fn local_part(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_attr(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.set_text(text);
        self
    }

    #[must_use]
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    pub fn local_name(&self) -> &str {
        local_part(&self.name)
    }

    /// Namespace prefix of this element, if any (`c` for `c:ser`).
    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(prefix, _)| prefix)
    }

    /// Build a sibling-style qualified name that reuses this element's prefix.
    pub fn qualify(&self, local: &str) -> String {
        match self.prefix() {
            Some(prefix) => format!("{prefix}:{local}"),
            None => local.to_string(),
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Attribute lookup ignoring the namespace prefix (`r:id` matches `id`).
    pub fn attr_local(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| !k.starts_with("xmlns") && local_part(k) == local)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(slot) = self.attributes.iter_mut().find(|(k, _)| k == key) {
            slot.1 = value;
        } else {
            self.attributes.push((key.to_string(), value));
        }
    }

    /// Iterate element children in document order.
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(el) => Some(el),
            XmlNode::Text(_) => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut XmlElement> {
        self.children.iter_mut().filter_map(|node| match node {
            XmlNode::Element(el) => Some(el),
            XmlNode::Text(_) => None,
        })
    }

    /// Element children with the given local name.
    pub fn children_named<'a>(&'a self, local: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.elements().filter(move |el| el.local_name() == local)
    }

    pub fn children_named_mut<'a>(
        &'a mut self,
        local: &'a str,
    ) -> impl Iterator<Item = &'a mut XmlElement> {
        self.elements_mut().filter(move |el| el.local_name() == local)
    }

    /// First element child with the given local name.
    pub fn child(&self, local: &str) -> Option<&XmlElement> {
        self.elements().find(|el| el.local_name() == local)
    }

    pub fn child_mut(&mut self, local: &str) -> Option<&mut XmlElement> {
        self.elements_mut().find(|el| el.local_name() == local)
    }

    /// Descend through first-match children by local name.
    pub fn descend(&self, path: &[&str]) -> Option<&XmlElement> {
        path.iter().try_fold(self, |el, local| el.child(local))
    }

    pub fn descend_mut(&mut self, path: &[&str]) -> Option<&mut XmlElement> {
        let mut current = self;
        for local in path {
            current = current.child_mut(local)?;
        }
        Some(current)
    }

    /// Depth-first search for the first descendant with the given local name.
    pub fn find(&self, local: &str) -> Option<&XmlElement> {
        for el in self.elements() {
            if el.local_name() == local {
                return Some(el);
            }
            if let Some(found) = el.find(local) {
                return Some(found);
            }
        }
        None
    }

    /// Concatenated direct character data.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            if let XmlNode::Text(t) = node {
                out.push_str(t);
            }
        }
        out
    }

    /// Text of the first child with the given local name.
    pub fn child_text(&self, local: &str) -> Option<String> {
        self.child(local).map(XmlElement::text)
    }

    /// Replace all children with a single text node.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children.clear();
        self.children.push(XmlNode::Text(text.into()));
    }

    pub fn push_element(&mut self, child: XmlElement) {
        self.children.push(XmlNode::Element(child));
    }

    /// Insert `child` after the last element child whose local name is in
    /// `after`, or at the front when none match. Keeps schema order for
    /// sequences like `c:ser` where element order is fixed.
    pub fn insert_after_any(&mut self, after: &[&str], child: XmlElement) {
        let pos = self
            .children
            .iter()
            .rposition(|node| match node {
                XmlNode::Element(el) => after.contains(&el.local_name()),
                XmlNode::Text(_) => false,
            })
            .map_or(0, |p| p + 1);
        self.children.insert(pos, XmlNode::Element(child));
    }

    /// The element at node position `pos` in `children`.
    pub fn element_at_mut(&mut self, pos: usize) -> Option<&mut XmlElement> {
        match self.children.get_mut(pos) {
            Some(XmlNode::Element(el)) => Some(el),
            _ => None,
        }
    }

    /// Insert `child` at node position `pos` (clamped to the end).
    pub fn insert_element(&mut self, pos: usize, child: XmlElement) -> Option<&mut XmlElement> {
        let pos = pos.min(self.children.len());
        self.children.insert(pos, XmlNode::Element(child));
        self.element_at_mut(pos)
    }

    /// Remove and return the `n`-th element child with the given local name.
    pub fn remove_nth_named(&mut self, local: &str, n: usize) -> Option<XmlElement> {
        let pos = self
            .children
            .iter()
            .enumerate()
            .filter(|(_, node)| matches!(node, XmlNode::Element(el) if el.local_name() == local))
            .nth(n)
            .map(|(pos, _)| pos)?;
        match self.children.remove(pos) {
            XmlNode::Element(el) => Some(el),
            XmlNode::Text(_) => None,
        }
    }

    /// Remove every element child with the given local name.
    pub fn remove_children_named(&mut self, local: &str) -> usize {
        let before = self.children.len();
        self.children.retain(|node| match node {
            XmlNode::Element(el) => el.local_name() != local,
            XmlNode::Text(_) => true,
        });
        before - self.children.len()
    }

    /// Get or create the first child with the given local name, appended at
    /// the end and sharing this element's prefix.
    pub fn ensure_child(&mut self, local: &str) -> &mut XmlElement {
        let pos = self.children.iter().position(|node| match node {
            XmlNode::Element(el) => el.local_name() == local,
            XmlNode::Text(_) => false,
        });
        let pos = match pos {
            Some(pos) => pos,
            None => {
                let name = self.qualify(local);
                self.children.push(XmlNode::Element(XmlElement::new(name)));
                self.children.len() - 1
            }
        };
        match self.children.get_mut(pos) {
            Some(XmlNode::Element(el)) => el,
            // Position was selected (or just pushed) as an element node
            _ => unreachable_element(),
        }
    }
}

#[allow(clippy::unreachable)]
fn unreachable_element() -> ! {
    unreachable!("child position always refers to an element node")
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

    const CHART: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<c:chartSpace xmlns:c="http://schemas.openxmlformats.org/drawingml/2006/chart">
  <c:chart>
    <c:plotArea>
      <c:barChart>
        <c:ser><c:idx val="0"/><c:tx><c:v>A &amp; B</c:v></c:tx></c:ser>
      </c:barChart>
    </c:plotArea>
  </c:chart>
</c:chartSpace>"#;

    #[test]
    fn test_parse_keeps_prefixes_and_unescapes() {
        let doc = XmlDocument::parse(CHART.as_bytes()).unwrap();
        assert_eq!(doc.root.name, "c:chartSpace");
        assert_eq!(doc.standalone.as_deref(), Some("yes"));
        let ser = doc
            .root
            .descend(&["chart", "plotArea", "barChart", "ser"])
            .unwrap();
        assert_eq!(ser.child("idx").unwrap().attr("val"), Some("0"));
        assert_eq!(
            ser.descend(&["tx", "v"]).map(XmlElement::text).as_deref(),
            Some("A & B")
        );
    }

    #[test]
    fn test_round_trip_escapes_text() {
        let doc = XmlDocument::parse(CHART.as_bytes()).unwrap();
        let bytes = doc.to_bytes().unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains("A &amp; B"));
        assert!(text.contains("xmlns:c="));
        let again = XmlDocument::parse(&bytes).unwrap();
        assert_eq!(again, doc);
    }

    #[test]
    fn test_whitespace_only_leaf_text_survives_round_trip() {
        let xml = r#"<a:p xmlns:a="a">
  <a:r><a:t>Quarterly</a:t></a:r>
  <a:r><a:t> </a:t></a:r>
  <a:r><a:t>Sales</a:t></a:r>
</a:p>"#;
        let doc = XmlDocument::parse(xml.as_bytes()).unwrap();
        assert_eq!(doc.root.elements().count(), 3);
        assert!(doc
            .root
            .children
            .iter()
            .all(|node| matches!(node, XmlNode::Element(_))));
        let spacer = doc.root.elements().nth(1).unwrap().child("t").unwrap();
        assert_eq!(spacer.text(), " ");

        let bytes = doc.to_bytes().unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains("<a:t> </a:t>"));
        assert_eq!(XmlDocument::parse(&bytes).unwrap(), doc);
    }

    #[test]
    fn test_insert_after_any_and_ensure_child() {
        let mut ser = XmlElement::new("c:ser")
            .with_child(XmlElement::new("c:idx"))
            .with_child(XmlElement::new("c:val"));
        ser.insert_after_any(&["idx", "order"], XmlElement::new("c:tx"));
        let names: Vec<_> = ser.elements().map(XmlElement::local_name).collect();
        assert_eq!(names, vec!["idx", "tx", "val"]);

        let smooth = ser.ensure_child("smooth");
        smooth.set_attr("val", "0");
        assert_eq!(ser.child("smooth").unwrap().name, "c:smooth");
        assert_eq!(ser.remove_children_named("smooth"), 1);
    }

    #[test]
    fn test_remove_nth_named() {
        let mut bar = XmlElement::new("c:barChart")
            .with_child(XmlElement::new("c:barDir"))
            .with_child(XmlElement::new("c:ser").with_attr("id", "a"))
            .with_child(XmlElement::new("c:ser").with_attr("id", "b"));
        let removed = bar.remove_nth_named("ser", 1).unwrap();
        assert_eq!(removed.attr("id"), Some("b"));
        assert!(bar.remove_nth_named("ser", 1).is_none());
        assert_eq!(bar.children_named("ser").count(), 1);
    }

    #[test]
    fn test_attr_local_ignores_prefix() {
        let el = XmlElement::new("c:externalData").with_attr("r:id", "rId2");
        assert_eq!(el.attr_local("id"), Some("rId2"));
        assert_eq!(el.attr("id"), None);
    }
}
