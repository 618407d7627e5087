//! Read-only XML element trees
//!
//! Descriptors are parsed once into an [`XmlElement`] tree and then queried
//! by name during hydration. Parsing is strict: any malformed markup fails
//! the whole parse and no partial tree is returned.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while parsing or querying an element tree
#[derive(Debug, Error)]
pub enum ElementError {
    #[error("Malformed XML: {0}")]
    Malformed(String),

    #[error("Element <{element}> is missing required attribute '{attribute}'")]
    MissingAttribute { element: String, attribute: String },

    #[error("Element <{element}> has invalid value '{value}' for attribute '{attribute}'")]
    InvalidAttribute {
        element: String,
        attribute: String,
        value: String,
    },

    #[error("Element <{element}> has invalid content: {message}")]
    InvalidContent { element: String, message: String },

    #[error("Failed to read {path}: {message}")]
    Read { path: String, message: String },
}

/// Result type for element tree operations
pub type ElementResult<T> = Result<T, ElementError>;

/// A named XML element with attributes, children and text content
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlElement {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<XmlElement>,
    text: String,
}

impl XmlElement {
    /// Create an empty element
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add an attribute (builder style)
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Add a child element (builder style)
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(child);
        self
    }

    /// Set the text content (builder style)
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Set or replace an attribute
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl ToString) {
        let name = name.into();
        let value = value.to_string();
        match self.attributes.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    /// Append a child element
    pub fn push_child(&mut self, child: XmlElement) {
        self.children.push(child);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Trimmed text content
    pub fn text(&self) -> &str {
        self.text.trim()
    }

    /// Look up an attribute by name
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate over attributes in document order
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Look up an attribute that must be present
    pub fn required_attribute(&self, name: &str) -> ElementResult<&str> {
        self.attribute(name)
            .ok_or_else(|| ElementError::MissingAttribute {
                element: self.name.clone(),
                attribute: name.to_string(),
            })
    }

    /// Parse an optional attribute into `T`
    pub fn parse_attribute<T: FromStr>(&self, name: &str) -> ElementResult<Option<T>> {
        match self.attribute(name) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|_| self.invalid_attribute(name, raw)),
        }
    }

    /// Parse a required attribute into `T`
    pub fn parse_required_attribute<T: FromStr>(&self, name: &str) -> ElementResult<T> {
        let raw = self.required_attribute(name)?;
        raw.trim()
            .parse::<T>()
            .map_err(|_| self.invalid_attribute(name, raw))
    }

    /// Parse a boolean attribute, accepting `true/false` and `1/0`
    pub fn parse_bool_attribute(&self, name: &str) -> ElementResult<Option<bool>> {
        match self.attribute(name).map(str::trim) {
            None => Ok(None),
            Some("true") | Some("1") => Ok(Some(true)),
            Some("false") | Some("0") => Ok(Some(false)),
            Some(other) => Err(self.invalid_attribute(name, other)),
        }
    }

    /// Parse a whitespace separated list of numbers, e.g. `"0 31 0 31 0 0"`
    pub fn parse_list_attribute<T: FromStr>(&self, name: &str) -> ElementResult<Option<Vec<T>>> {
        match self.attribute(name) {
            None => Ok(None),
            Some(raw) => raw
                .split_whitespace()
                .map(|s| s.parse::<T>().map_err(|_| self.invalid_attribute(name, raw)))
                .collect::<ElementResult<Vec<T>>>()
                .map(Some),
        }
    }

    fn invalid_attribute(&self, name: &str, value: &str) -> ElementError {
        ElementError::InvalidAttribute {
            element: self.name.clone(),
            attribute: name.to_string(),
            value: value.to_string(),
        }
    }

    /// Iterate over direct children
    pub fn children(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter()
    }

    /// Number of direct children
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// First direct child with the given name
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All direct children with the given name
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// First descendant with the given name (depth-first, pre-order)
    ///
    /// The element itself is not considered.
    pub fn nested_element(&self, name: &str) -> Option<&XmlElement> {
        for child in &self.children {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.nested_element(name) {
                return Some(found);
            }
        }
        None
    }

    /// Serialize the element (and its subtree) to an indented XML string
    pub fn to_xml_string(&self) -> ElementResult<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", None, None)))
            .map_err(|e| ElementError::Malformed(e.to_string()))?;
        self.write_to(&mut writer)?;
        String::from_utf8(writer.into_inner()).map_err(|e| ElementError::Malformed(e.to_string()))
    }

    fn write_to(&self, writer: &mut Writer<Vec<u8>>) -> ElementResult<()> {
        let mut start = BytesStart::new(self.name.as_str());
        for (k, v) in &self.attributes {
            start.push_attribute((k.as_str(), v.as_str()));
        }

        let text = self.text();
        let result = if self.children.is_empty() && text.is_empty() {
            writer.write_event(Event::Empty(start))
        } else {
            writer.write_event(Event::Start(start)).and_then(|_| {
                if !text.is_empty() {
                    writer.write_event(Event::Text(BytesText::new(text)))?;
                }
                Ok(())
            })
        };
        result.map_err(|e| ElementError::Malformed(e.to_string()))?;

        if !self.children.is_empty() || !text.is_empty() {
            for child in &self.children {
                child.write_to(writer)?;
            }
            writer
                .write_event(Event::End(BytesEnd::new(self.name.as_str())))
                .map_err(|e| ElementError::Malformed(e.to_string()))?;
        }
        Ok(())
    }
}

/// Parse an XML document into its root element
pub fn parse_str(input: &str) -> ElementResult<XmlElement> {
    let mut reader = Reader::from_str(input);
    reader.check_end_names(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            ElementError::Malformed(format!(
                "{} at byte {}",
                e,
                reader.buffer_position()
            ))
        })?;

        match event {
            Event::Start(start) => {
                if root.is_some() {
                    return Err(ElementError::Malformed(
                        "content after the root element".to_string(),
                    ));
                }
                stack.push(element_from_start(&start)?);
            }
            Event::Empty(start) => {
                if root.is_some() {
                    return Err(ElementError::Malformed(
                        "content after the root element".to_string(),
                    ));
                }
                let element = element_from_start(&start)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            }
            Event::End(_) => {
                let element = stack.pop().ok_or_else(|| {
                    ElementError::Malformed("closing tag without an open element".to_string())
                })?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            }
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(|e| ElementError::Malformed(e.to_string()))?;
                match stack.last_mut() {
                    Some(current) => current.text.push_str(&text),
                    None if text.trim().is_empty() => {}
                    None => {
                        return Err(ElementError::Malformed(format!(
                            "text outside the root element: '{}'",
                            text.trim()
                        )))
                    }
                }
            }
            Event::CData(data) => {
                let data = data.into_inner();
                let text = std::str::from_utf8(&data)
                    .map_err(|e| ElementError::Malformed(e.to_string()))?;
                match stack.last_mut() {
                    Some(current) => current.text.push_str(text),
                    None => {
                        return Err(ElementError::Malformed(
                            "CDATA outside the root element".to_string(),
                        ))
                    }
                }
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions and doctypes carry no content
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(ElementError::Malformed(format!(
            "unexpected end of document inside <{}>",
            open.name
        )));
    }
    root.ok_or_else(|| ElementError::Malformed("document has no root element".to_string()))
}

/// Read and parse an XML file
pub fn parse_file(path: impl AsRef<Path>) -> ElementResult<XmlElement> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ElementError::Read {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    parse_str(&content)
}

fn element_from_start(start: &BytesStart<'_>) -> ElementResult<XmlElement> {
    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| ElementError::Malformed(e.to_string()))?
        .to_string();
    let mut element = XmlElement::new(name);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| ElementError::Malformed(e.to_string()))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| ElementError::Malformed(e.to_string()))?
            .to_string();
        if element.attribute(&key).is_some() {
            return Err(ElementError::Malformed(format!(
                "duplicate attribute '{}' on <{}>",
                key, element.name
            )));
        }
        let value = attr
            .unescape_value()
            .map_err(|e| ElementError::Malformed(e.to_string()))?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}
