//! Minimal read-only element tree.
//!
//! Elements and attributes are addressed by local name; prefixes and
//! namespace declarations are dropped. Enough for the fixed-vocabulary
//! documents read here (hash chains, evidence records, manifests,
//! signatures).

use crate::errors::{missing_field, xml_error, Result};
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
    pub text: String,
}

fn local_name(qualified: &str) -> &str {
    qualified
        .rsplit_once(':')
        .map_or(qualified, |(_, local)| local)
}

fn utf8<'a>(op: &str, bytes: &'a [u8]) -> Result<&'a str> {
    std::str::from_utf8(bytes).map_err(|e| xml_error(op, e))
}

fn element_from(op: &str, start: &BytesStart<'_>) -> Result<XmlElement> {
    let mut element = XmlElement {
        name: local_name(utf8(op, start.name().as_ref())?).to_string(),
        ..XmlElement::default()
    };
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| xml_error(op, e))?;
        let key = utf8(op, attribute.key.as_ref())?;
        if key == "xmlns" || key.starts_with("xmlns:") {
            continue;
        }
        let value = unescape(utf8(op, &attribute.value)?).map_err(|e| xml_error(op, e))?;
        element
            .attributes
            .push((local_name(key).to_string(), value.into_owned()));
    }
    Ok(element)
}

impl XmlElement {
    /// Parse a document into its root element
    ///
    /// # Errors
    ///
    /// Fails on malformed XML or a document without a root element.
    pub fn parse(xml: &str) -> Result<Self> {
        const OP: &str = "parse_xml";
        let mut reader = Reader::from_str(xml);
        reader.config_mut().expand_empty_elements = true;

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root = None;
        loop {
            match reader.read_event().map_err(|e| xml_error(OP, e))? {
                Event::Start(start) => {
                    if root.is_some() {
                        return Err(xml_error(OP, "more than one root element"));
                    }
                    stack.push(element_from(OP, &start)?);
                }
                Event::Empty(start) => {
                    let element = element_from(OP, &start)?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(element),
                        None => root = Some(element),
                    }
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| xml_error(OP, "unexpected end tag"))?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(element),
                        None => root = Some(element),
                    }
                }
                Event::Text(text) => {
                    if let Some(current) = stack.last_mut() {
                        let value = unescape(utf8(OP, &text)?).map_err(|e| xml_error(OP, e))?;
                        current.text.push_str(&value);
                    }
                }
                Event::CData(data) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(utf8(OP, &data)?);
                    }
                }
                Event::Eof => break,
                Event::Decl(_) | Event::DocType(_) | Event::Comment(_) | Event::PI(_) => {}
            }
        }

        if !stack.is_empty() {
            return Err(xml_error(OP, "unexpected end of document"));
        }
        root.ok_or_else(|| xml_error(OP, "document has no root element"))
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// First descendant named `name`, depth first
    pub fn descendant(&self, name: &str) -> Option<&XmlElement> {
        self.children
            .iter()
            .find_map(|c| if c.name == name { Some(c) } else { c.descendant(name) })
    }

    /// All descendants named `name`, in document order
    pub fn descendants<'a>(&'a self, name: &str, found: &mut Vec<&'a XmlElement>) {
        for child in &self.children {
            if child.name == name {
                found.push(child);
            }
            child.descendants(name, found);
        }
    }

    /// Trimmed text content
    pub fn text(&self) -> &str {
        self.text.trim()
    }

    /// # Errors
    ///
    /// `MissingField` naming the child when absent.
    pub fn require_child(&self, op: &str, name: &str) -> Result<&XmlElement> {
        self.child(name).ok_or_else(|| missing_field(op, name))
    }

    /// # Errors
    ///
    /// `MissingField` naming the attribute when absent.
    pub fn require_attribute(&self, op: &str, name: &str) -> Result<&str> {
        self.attribute(name).ok_or_else(|| missing_field(op, name))
    }
}
