//! Mixed-content element tree.
//!
//! Bibliographic XML interleaves plain text and child elements inside one
//! parent, so every element carries both its leading `text` and the `tail`
//! text that follows its end tag within the parent. This mirrors the
//! text/tail model used by mainstream XML tree libraries and is the only
//! faithful way to round-trip mixed content.

use std::io::Cursor;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::XmlError;

/// One element of the document tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    /// Text before the first child (or the whole content when childless).
    pub text: Option<String>,
    pub children: Vec<Element>,
    /// Text between this element's end tag and the next sibling.
    pub tail: Option<String>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(existing) = self.attrs.iter_mut().find(|(n, _)| *n == name) {
            existing.1 = value;
        } else {
            self.attrs.push((name, value));
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Append a child and return a mutable borrow of it, so construction
    /// code can keep drilling down.
    pub fn push(&mut self, child: Element) -> &mut Element {
        self.children.push(child);
        self.children
            .last_mut()
            .unwrap_or_else(|| unreachable!("push guarantees a last child"))
    }

    /// Append `text` to this element's trailing text run: the last child's
    /// tail when children exist, otherwise the element's own text.
    pub fn append_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let slot = match self.children.last_mut() {
            Some(last) => &mut last.tail,
            None => &mut self.text,
        };
        match slot {
            Some(existing) => existing.push_str(text),
            None => *slot = Some(text.to_string()),
        }
    }

    /// True when nothing (text or children) has been written yet.
    pub fn is_content_empty(&self) -> bool {
        self.children.is_empty() && self.text.as_deref().unwrap_or_default().is_empty()
    }

    /// First element matching a slash-separated child path, e.g.
    /// `front/journal-meta/journal-id`.
    pub fn find(&self, path: &str) -> Option<&Element> {
        let mut current = self;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = current.children.iter().find(|c| c.name == segment)?;
        }
        Some(current)
    }

    pub fn find_mut(&mut self, path: &str) -> Option<&mut Element> {
        let mut current = self;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = current.children.iter_mut().find(|c| c.name == segment)?;
        }
        Some(current)
    }

    /// All elements matching a slash-separated child path. Intermediate
    /// segments may match multiple siblings; all branches are followed.
    pub fn find_all<'a>(&'a self, path: &str) -> Vec<&'a Element> {
        let mut current: Vec<&Element> = vec![self];
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = current
                .iter()
                .flat_map(|e| e.children.iter().filter(|c| c.name == segment))
                .collect();
        }
        if current.len() == 1 && std::ptr::eq(current[0], self) {
            return Vec::new();
        }
        current
    }

    /// Depth-first search for the first descendant with the given name.
    pub fn find_descendant(&self, name: &str) -> Option<&Element> {
        for child in &self.children {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.find_descendant(name) {
                return Some(found);
            }
        }
        None
    }

    pub fn find_descendant_mut(&mut self, name: &str) -> Option<&mut Element> {
        // Two passes keep the borrow checker satisfied without unsafe.
        if self.children.iter().any(|c| c.name == name) {
            return self.children.iter_mut().find(|c| c.name == name);
        }
        for child in &mut self.children {
            if let Some(found) = child.find_descendant_mut(name) {
                return Some(found);
            }
        }
        None
    }

    /// All descendants (any depth) with the given name, in document order.
    pub fn descendants_named<'a>(&'a self, name: &str) -> Vec<&'a Element> {
        let mut out = Vec::new();
        self.collect_named(name, &mut out);
        out
    }

    fn collect_named<'a>(&'a self, name: &str, out: &mut Vec<&'a Element>) {
        for child in &self.children {
            if child.name == name {
                out.push(child);
            }
            child.collect_named(name, out);
        }
    }

    /// Concatenated text and tail runs of this element's subtree, in
    /// document order. The element's own tail is excluded.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.gather_text(&mut out);
        out
    }

    fn gather_text(&self, out: &mut String) {
        if let Some(text) = &self.text {
            out.push_str(text);
        }
        for child in &self.children {
            child.gather_text(out);
            if let Some(tail) = &child.tail {
                out.push_str(tail);
            }
        }
    }
}

/// Serialize a tree to a standalone XML document: declaration, DOCTYPE,
/// then the element content. Text runs are entity-escaped on write.
pub fn serialize_document(root: &Element, doctype: &str) -> Result<String, XmlError> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Text(BytesText::from_escaped("\n")))?;
    if !doctype.is_empty() {
        writer.write_event(Event::DocType(BytesText::from_escaped(doctype)))?;
        writer.write_event(Event::Text(BytesText::from_escaped("\n")))?;
    }
    write_element(&mut writer, root)?;
    let bytes = writer.into_inner().into_inner();
    Ok(String::from_utf8(bytes)?)
}

fn write_element(writer: &mut Writer<Cursor<Vec<u8>>>, element: &Element) -> Result<(), XmlError> {
    let mut start = BytesStart::new(element.name.as_str());
    for (name, value) in &element.attrs {
        start.push_attribute((name.as_str(), value.as_str()));
    }
    writer.write_event(Event::Start(start))?;
    if let Some(text) = &element.text {
        writer.write_event(Event::Text(BytesText::new(text)))?;
    }
    for child in &element.children {
        write_element(writer, child)?;
        if let Some(tail) = &child.tail {
            writer.write_event(Event::Text(BytesText::new(tail)))?;
        }
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> Element {
        let mut root = Element::new("article");
        root.set_attr("dtd-version", "2.3");
        let front = root.push(Element::new("front"));
        let meta = front.push(Element::new("journal-meta"));
        meta.push(Element::with_text("journal-id", "JCAD"));
        root.push(Element::new("body"));
        root
    }

    #[test]
    fn find_walks_child_paths() {
        let root = sample_tree();
        let id = root.find("front/journal-meta/journal-id");
        assert_eq!(id.map(|e| e.text.as_deref()), Some(Some("JCAD")));
        assert!(root.find("front/missing").is_none());
    }

    #[test]
    fn find_all_follows_sibling_branches() {
        let mut root = Element::new("ref-list");
        root.push(Element::new("ref"));
        root.push(Element::new("ref"));
        assert_eq!(root.find_all("ref").len(), 2);
        assert!(root.find_all("missing").is_empty());
    }

    #[test]
    fn set_attr_replaces_existing() {
        let mut e = Element::new("x");
        e.set_attr("a", "1");
        e.set_attr("a", "2");
        assert_eq!(e.attr("a"), Some("2"));
        assert_eq!(e.attrs.len(), 1);
    }

    #[test]
    fn append_text_goes_to_last_tail() {
        let mut p = Element::with_text("p", "before ");
        p.push(Element::with_text("xref", "[1]"));
        p.append_text(" after");
        assert_eq!(p.children[0].tail.as_deref(), Some(" after"));
        p.append_text(".");
        assert_eq!(p.children[0].tail.as_deref(), Some(" after."));
    }

    #[test]
    fn text_content_interleaves_text_and_tails() {
        let mut p = Element::with_text("p", "a ");
        let x = p.push(Element::with_text("xref", "[1]"));
        x.tail = Some(" b".to_string());
        assert_eq!(p.text_content(), "a [1] b");
    }

    #[test]
    fn serialize_escapes_and_orders() {
        let mut root = Element::new("article");
        root.set_attr("article-type", "research-article");
        root.push(Element::with_text("title", "A & B < C"));
        let xml = serialize_document(&root, "").unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("A &amp; B &lt; C"));
        assert!(xml.contains("<article article-type=\"research-article\">"));
    }

    #[test]
    fn serialize_includes_doctype() {
        let root = Element::new("article");
        let xml = serialize_document(
            &root,
            "article PUBLIC \"-//NLM//DTD Journal Publishing DTD v2.3 20070202//EN\" \"journalpublishing.dtd\"",
        )
        .unwrap();
        assert!(xml.contains("<!DOCTYPE article PUBLIC"));
    }
}
