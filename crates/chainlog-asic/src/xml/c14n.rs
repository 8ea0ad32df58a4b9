//! Canonical XML 1.0, omitting comments.
//!
//! Covers what signed XML documents need: no DTD processing (documents with
//! a DOCTYPE are rejected), expanded empty elements, superfluous namespace
//! declarations removed, namespace declarations sorted by prefix ahead of
//! attributes sorted by (namespace URI, local name), normalized attribute
//! values and line endings, and the canonical escaping of text and
//! attribute values.

use crate::errors::{xml_error, Result};
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::BTreeMap;

pub const C14N_OMIT_COMMENTS_URI: &str = "http://www.w3.org/TR/2001/REC-xml-c14n-20010315";
/// Canonical XML 1.1; identical output for documents without `xml:id` or `xml:base`
pub const C14N_11_OMIT_COMMENTS_URI: &str = "http://www.w3.org/2006/12/xml-c14n11";

/// Is `uri` a canonicalization method this module implements
pub fn is_supported_method(uri: &str) -> bool {
    uri == C14N_OMIT_COMMENTS_URI || uri == C14N_11_OMIT_COMMENTS_URI
}

const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";
const OP: &str = "canonicalize";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    BeforeRoot,
    InRoot,
    AfterRoot,
}

/// Namespace bindings at one element
#[derive(Debug, Clone, Default)]
struct Scope {
    in_scope: BTreeMap<String, String>,
    rendered: BTreeMap<String, String>,
}

/// Element heading a canonicalized subtree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Apex<'a> {
    /// First element with this local name
    LocalName(&'a str),
    /// Element whose `Id` attribute has this value
    Id(&'a str),
}

impl Apex<'_> {
    fn matches(&self, name: &str, attributes: &[(String, String)]) -> bool {
        match self {
            Apex::LocalName(local) => name.rsplit(':').next() == Some(*local),
            Apex::Id(id) => attributes.iter().any(|(k, v)| k == "Id" && v == id),
        }
    }
}

struct Canonicalizer<'a> {
    out: String,
    scopes: Vec<Scope>,
    position: Position,
    apex: Option<Apex<'a>>,
    apex_depth: Option<usize>,
    apex_done: bool,
}

/// Canonicalize a complete XML document
///
/// # Errors
///
/// Fails on malformed XML, a DOCTYPE, unbound attribute prefixes,
/// undefined entities, or anything but whitespace outside the document
/// element.
pub fn canonicalize(xml: &str) -> Result<Vec<u8>> {
    run(xml, None)
}

/// Canonicalize the subtree headed by `apex`
///
/// The apex element renders every namespace declaration in scope, so the
/// result does not depend on where the subtree sits in the document.
/// Inherited `xml:*` attributes are not carried onto the apex.
///
/// # Errors
///
/// Fails like [`canonicalize`], and when no element matches `apex`.
pub fn canonicalize_subtree(xml: &str, apex: Apex<'_>) -> Result<Vec<u8>> {
    run(xml, Some(apex))
}

fn run(xml: &str, apex: Option<Apex<'_>>) -> Result<Vec<u8>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().expand_empty_elements = true;

    let mut c14n = Canonicalizer {
        out: String::with_capacity(xml.len()),
        scopes: Vec::new(),
        position: Position::BeforeRoot,
        apex,
        apex_depth: None,
        apex_done: false,
    };

    loop {
        match reader.read_event().map_err(|e| xml_error(OP, e))? {
            Event::Decl(_) | Event::Comment(_) => {}
            Event::DocType(_) => {
                return Err(xml_error(OP, "document type declarations are not supported"));
            }
            Event::Start(start) => c14n.open(&start)?,
            Event::Empty(start) => {
                c14n.open(&start)?;
                c14n.close(&utf8(start.name().as_ref())?)?;
            }
            Event::End(end) => c14n.close(&utf8(end.name().as_ref())?)?,
            Event::Text(text) => c14n.text(&utf8(&text)?)?,
            Event::CData(data) => c14n.cdata(&utf8(&data)?)?,
            Event::PI(pi) => c14n.processing_instruction(&utf8(&pi)?),
            Event::Eof => break,
        }
    }

    if c14n.position != Position::AfterRoot {
        return Err(xml_error(OP, "document has no complete root element"));
    }
    if let (Some(apex), false) = (apex, c14n.apex_done) {
        return Err(xml_error(OP, format!("no element matches {:?}", apex)));
    }
    Ok(c14n.out.into_bytes())
}

fn utf8(bytes: &[u8]) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| xml_error(OP, e))
}

impl Canonicalizer<'_> {
    fn emitting(&self) -> bool {
        self.apex.is_none() || self.apex_depth.is_some()
    }

    fn open(&mut self, start: &BytesStart<'_>) -> Result<()> {
        match self.position {
            Position::AfterRoot => return Err(xml_error(OP, "more than one root element")),
            Position::BeforeRoot => self.position = Position::InRoot,
            Position::InRoot => {}
        }

        let name = utf8(start.name().as_ref())?;
        let mut declarations = BTreeMap::new();
        let mut attributes = Vec::new();
        for attribute in start.attributes() {
            let attribute = attribute.map_err(|e| xml_error(OP, e))?;
            let key = utf8(attribute.key.as_ref())?;
            let value = attribute_value(&utf8(&attribute.value)?)?;
            if key == "xmlns" {
                declarations.insert(String::new(), value);
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                declarations.insert(prefix.to_string(), value);
            } else {
                attributes.push((key, value));
            }
        }

        let mut scope = self.scopes.last().cloned().unwrap_or_default();
        for (prefix, uri) in &declarations {
            scope.in_scope.insert(prefix.clone(), uri.clone());
        }

        let mut rendered_declarations = Vec::new();
        for (prefix, uri) in declarations {
            let current = scope.rendered.get(&prefix).map(String::as_str);
            let superfluous = if prefix.is_empty() {
                current.unwrap_or("") == uri
            } else {
                current == Some(uri.as_str())
            };
            if !superfluous {
                scope.rendered.insert(prefix.clone(), uri.clone());
                rendered_declarations.push((prefix, uri));
            }
        }

        let starts_apex = self.apex_depth.is_none()
            && !self.apex_done
            && self.apex.is_some_and(|apex| apex.matches(&name, &attributes));
        if starts_apex {
            scope.rendered = scope.in_scope.clone();
            scope.rendered.retain(|prefix, uri| !(prefix.is_empty() && uri.is_empty()));
            rendered_declarations = scope
                .rendered
                .iter()
                .map(|(prefix, uri)| (prefix.clone(), uri.clone()))
                .collect();
            self.apex_depth = Some(self.scopes.len());
        }

        let mut sorted_attributes = Vec::with_capacity(attributes.len());
        for (key, value) in attributes {
            let (namespace, local) = match key.split_once(':') {
                Some(("xml", local)) => (XML_NAMESPACE.to_string(), local.to_string()),
                Some((prefix, local)) => {
                    let namespace = scope.in_scope.get(prefix).ok_or_else(|| {
                        xml_error(OP, format!("unbound attribute prefix '{}'", prefix))
                    })?;
                    (namespace.clone(), local.to_string())
                }
                None => (String::new(), key.clone()),
            };
            sorted_attributes.push(((namespace, local), key, value));
        }
        sorted_attributes.sort_by(|a, b| a.0.cmp(&b.0));

        if !self.emitting() {
            self.scopes.push(scope);
            return Ok(());
        }

        self.out.push('<');
        self.out.push_str(&name);
        for (prefix, uri) in &rendered_declarations {
            if prefix.is_empty() {
                self.out.push_str(" xmlns=\"");
            } else {
                self.out.push_str(" xmlns:");
                self.out.push_str(prefix);
                self.out.push_str("=\"");
            }
            escape_attribute(&mut self.out, uri);
            self.out.push('"');
        }
        for (_, key, value) in &sorted_attributes {
            self.out.push(' ');
            self.out.push_str(key);
            self.out.push_str("=\"");
            escape_attribute(&mut self.out, value);
            self.out.push('"');
        }
        self.out.push('>');

        self.scopes.push(scope);
        Ok(())
    }

    fn close(&mut self, name: &str) -> Result<()> {
        if self.scopes.pop().is_none() {
            return Err(xml_error(OP, format!("unexpected end tag '{}'", name)));
        }
        if self.emitting() {
            self.out.push_str("</");
            self.out.push_str(name);
            self.out.push('>');
        }
        if self.apex_depth == Some(self.scopes.len()) {
            self.apex_depth = None;
            self.apex_done = true;
        }
        if self.scopes.is_empty() {
            self.position = Position::AfterRoot;
        }
        Ok(())
    }

    fn text(&mut self, raw: &str) -> Result<()> {
        if self.position != Position::InRoot {
            if raw.trim().is_empty() {
                return Ok(());
            }
            return Err(xml_error(OP, "text outside the root element"));
        }
        let normalized = normalize_line_endings(raw);
        let value = unescape(&normalized).map_err(|e| xml_error(OP, e))?;
        if self.emitting() {
            escape_text(&mut self.out, &value);
        }
        Ok(())
    }

    fn cdata(&mut self, raw: &str) -> Result<()> {
        if self.position != Position::InRoot {
            return Err(xml_error(OP, "CDATA outside the root element"));
        }
        if self.emitting() {
            escape_text(&mut self.out, &normalize_line_endings(raw));
        }
        Ok(())
    }

    fn processing_instruction(&mut self, raw: &str) {
        if self.apex.is_some() && (self.apex_depth.is_none() || self.position != Position::InRoot) {
            return;
        }
        let (target, data) = match raw.split_once(|c: char| c.is_ascii_whitespace()) {
            Some((target, data)) => (target, data.trim_start()),
            None => (raw, ""),
        };
        let mut pi = format!("<?{}", target);
        if !data.is_empty() {
            pi.push(' ');
            pi.push_str(data);
        }
        pi.push_str("?>");

        match self.position {
            Position::BeforeRoot => {
                self.out.push_str(&pi);
                self.out.push('\n');
            }
            Position::InRoot => self.out.push_str(&pi),
            Position::AfterRoot => {
                self.out.push('\n');
                self.out.push_str(&pi);
            }
        }
    }
}

fn normalize_line_endings(raw: &str) -> String {
    raw.replace("\r\n", "\n").replace('\r', "\n")
}

/// Attribute-value normalization for CDATA-typed attributes
fn attribute_value(raw: &str) -> Result<String> {
    let spaced: String = raw
        .replace("\r\n", " ")
        .chars()
        .map(|c| if matches!(c, '\t' | '\n' | '\r') { ' ' } else { c })
        .collect();
    unescape(&spaced)
        .map(|value| value.into_owned())
        .map_err(|e| xml_error(OP, e))
}

fn escape_text(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            c => out.push(c),
        }
    }
}

fn escape_attribute(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            c => out.push(c),
        }
    }
}
