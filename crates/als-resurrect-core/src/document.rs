//! Owned XML tree behind the small set of operations the resolver needs:
//! find by tag, read and write attributes, create, append and clear nodes,
//! and serialize back to bytes.
//!
//! Elements live in one arena owned by the document; each element owns the
//! ordered list of its children. Text, comments and other non-element content
//! are kept verbatim. Start tags are written back exactly as read until one of
//! their attributes is changed, so an untouched document serializes to the
//! same bytes.

use crate::error::Error;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::{Reader, Writer};
use std::borrow::Cow;

/// Handle to an element of one [`XmlDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug)]
enum Child {
    Element(NodeId),
    Other(Event<'static>),
}

#[derive(Debug)]
struct Attr {
    key: String,
    value: String,
    /// Value as it appears between the quotes on output.
    escaped: String,
}

impl Attr {
    fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
            escaped: escape_attr(value),
        }
    }
}

#[derive(Debug)]
struct Element {
    tag: String,
    attrs: Vec<Attr>,
    /// The start tag as parsed; dropped once an attribute changes.
    source: Option<BytesStart<'static>>,
    children: Vec<Child>,
}

#[derive(Debug)]
pub struct XmlDocument {
    nodes: Vec<Element>,
    root: Option<NodeId>,
    prolog: Vec<Event<'static>>,
    epilog: Vec<Event<'static>>,
}

fn xml_err(err: impl std::fmt::Display) -> Error {
    Error::Xml(err.to_string())
}

fn decode_name(bytes: &[u8]) -> Result<String, Error> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|e| Error::Xml(format!("name is not valid UTF-8: {}", e)))
}

/// Escape an attribute value for a double-quoted attribute. Whitespace other
/// than the plain space is written as a character reference; a literal newline
/// or tab would be normalized to a space when the file is read again.
fn escape_attr(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\n' => escaped.push_str("&#10;"),
            '\r' => escaped.push_str("&#13;"),
            '\t' => escaped.push_str("&#9;"),
            c => escaped.push(c),
        }
    }
    escaped
}

impl XmlDocument {
    pub fn parse(bytes: &[u8]) -> Result<Self, Error> {
        let mut reader = Reader::from_reader(bytes);
        let mut buf = Vec::new();
        let mut doc = XmlDocument {
            nodes: Vec::new(),
            root: None,
            prolog: Vec::new(),
            epilog: Vec::new(),
        };
        let mut open: Vec<NodeId> = Vec::new();

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| Error::Xml(format!("at byte {}: {}", reader.buffer_position(), e)))?;
            match event {
                Event::Start(start) => {
                    let id = doc.push_element(start)?;
                    doc.attach(&open, id)?;
                    open.push(id);
                }
                Event::Empty(start) => {
                    let id = doc.push_element(start)?;
                    doc.attach(&open, id)?;
                }
                Event::End(_) => {
                    open.pop();
                }
                Event::Eof => break,
                other => doc.attach_other(&open, other.into_owned()),
            }
            buf.clear();
        }

        if let Some(unclosed) = open.last() {
            return Err(Error::Xml(format!(
                "unexpected end of document, <{}> is not closed",
                doc.tag(*unclosed)
            )));
        }
        if doc.root.is_none() {
            return Err(Error::Xml("document has no root element".to_string()));
        }
        Ok(doc)
    }

    fn push_element(&mut self, start: BytesStart) -> Result<NodeId, Error> {
        let tag = decode_name(start.name().as_ref())?;
        let mut attrs = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(xml_err)?;
            let key = decode_name(attr.key.as_ref())?;
            let value = attr.unescape_value().map_err(xml_err)?.into_owned();
            let escaped = match std::str::from_utf8(&attr.value) {
                // Single-quoted values may hold a bare '"'.
                Ok(raw) if !raw.contains('"') => raw.to_string(),
                _ => escape_attr(&value),
            };
            attrs.push(Attr {
                key,
                value,
                escaped,
            });
        }
        Ok(self.alloc(tag, attrs, Some(start.into_owned())))
    }

    fn alloc(
        &mut self,
        tag: String,
        attrs: Vec<Attr>,
        source: Option<BytesStart<'static>>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Element {
            tag,
            attrs,
            source,
            children: Vec::new(),
        });
        id
    }

    fn attach(&mut self, open: &[NodeId], id: NodeId) -> Result<(), Error> {
        match open.last() {
            Some(parent) => {
                self.nodes[parent.0].children.push(Child::Element(id));
                Ok(())
            }
            None if self.root.is_none() => {
                self.root = Some(id);
                Ok(())
            }
            None => Err(Error::Xml(format!(
                "second root element <{}>",
                self.tag(id)
            ))),
        }
    }

    fn attach_other(&mut self, open: &[NodeId], event: Event<'static>) {
        match open.last() {
            Some(parent) => self.nodes[parent.0].children.push(Child::Other(event)),
            None if self.root.is_none() => self.prolog.push(event),
            None => self.epilog.push(event),
        }
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn tag(&self, node: NodeId) -> &str {
        &self.nodes[node.0].tag
    }

    fn element_children(&self, node: NodeId) -> impl DoubleEndedIterator<Item = NodeId> + '_ {
        self.nodes[node.0].children.iter().filter_map(|child| match child {
            Child::Element(id) => Some(*id),
            Child::Other(_) => None,
        })
    }

    /// Element children of `node`, in document order.
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.element_children(node).collect()
    }

    /// Every element under `scope` (not `scope` itself), pre-order.
    fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut pending: Vec<NodeId> = self.element_children(scope).rev().collect();
        while let Some(id) = pending.pop() {
            out.push(id);
            pending.extend(self.element_children(id).rev());
        }
        out
    }

    /// All elements named `tag` in the attached tree, in document order.
    pub fn find_all(&self, tag: &str) -> Vec<NodeId> {
        let Some(root) = self.root else {
            return Vec::new();
        };
        let mut found = Vec::new();
        if self.tag(root) == tag {
            found.push(root);
        }
        found.extend(self.find_all_in(root, tag));
        found
    }

    /// All elements named `tag` below `scope`, in document order.
    pub fn find_all_in(&self, scope: NodeId, tag: &str) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|id| self.tag(*id) == tag)
            .collect()
    }

    /// First element named `tag` below `scope`.
    pub fn find_first_in(&self, scope: NodeId, tag: &str) -> Option<NodeId> {
        let mut pending: Vec<NodeId> = self.element_children(scope).rev().collect();
        while let Some(id) = pending.pop() {
            if self.tag(id) == tag {
                return Some(id);
            }
            pending.extend(self.element_children(id).rev());
        }
        None
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.nodes[node.0]
            .attrs
            .iter()
            .find(|attr| attr.key == name)
            .map(|attr| attr.value.as_str())
    }

    /// Overwrite `name` in place, or append it when absent.
    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        let element = &mut self.nodes[node.0];
        element.source = None;
        match element.attrs.iter_mut().find(|attr| attr.key == name) {
            Some(existing) => *existing = Attr::new(name, value),
            None => element.attrs.push(Attr::new(name, value)),
        }
    }

    /// Create a detached element. It becomes part of the tree once appended.
    pub fn create_node(&mut self, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let attrs = attrs
            .iter()
            .map(|(key, value)| Attr::new(key, value))
            .collect();
        self.alloc(tag.to_string(), attrs, None)
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent.0].children.push(Child::Element(child));
    }

    /// Drop every child of `node`, text included.
    pub fn clear(&mut self, node: NodeId) {
        self.nodes[node.0].children.clear();
    }

    pub fn serialize(&self) -> Result<Vec<u8>, Error> {
        let mut writer = Writer::new(Vec::new());
        for event in &self.prolog {
            writer.write_event(event.clone()).map_err(xml_err)?;
        }
        if let Some(root) = self.root {
            self.write_element(&mut writer, root)?;
        }
        for event in &self.epilog {
            writer.write_event(event.clone()).map_err(xml_err)?;
        }
        Ok(writer.into_inner())
    }

    fn write_element(&self, writer: &mut Writer<Vec<u8>>, node: NodeId) -> Result<(), Error> {
        let element = &self.nodes[node.0];
        let start = match &element.source {
            Some(source) => source.clone(),
            None => {
                let mut start = BytesStart::new(element.tag.as_str());
                for attr in &element.attrs {
                    // Already escaped; pushed as raw bytes.
                    start.push_attribute(Attribute {
                        key: QName(attr.key.as_bytes()),
                        value: Cow::Borrowed(attr.escaped.as_bytes()),
                    });
                }
                start
            }
        };

        if element.children.is_empty() {
            return writer.write_event(Event::Empty(start)).map_err(xml_err);
        }

        writer.write_event(Event::Start(start)).map_err(xml_err)?;
        for child in &element.children {
            match child {
                Child::Element(id) => self.write_element(writer, *id)?,
                Child::Other(event) => writer.write_event(event.clone()).map_err(xml_err)?,
            }
        }
        writer
            .write_event(Event::End(BytesEnd::new(element.tag.as_str())))
            .map_err(xml_err)
    }
}
