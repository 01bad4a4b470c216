use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;
use thiserror::Error;

pub const ATOM_NS: &str = "http://www.w3.org/2005/Atom";

/// Errors that make a feed document unusable.
#[derive(Debug, Error)]
pub enum ParseError {
    /// XML parsing failed.
    #[error("XML parse error at byte {position}: {message}")]
    Xml { position: u64, message: String },

    /// The document contains no element at all.
    #[error("Feed document has no root element")]
    NoRootElement,
}

/// A parsed XML element with its direct text and child elements.
///
/// Only what item extraction needs is kept: the resolved namespace, the local
/// name, attributes, concatenated text/CDATA content and children in document
/// order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlElement {
    pub namespace: Option<String>,
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    /// First child with the given local name, in any namespace.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Children with the given local name and namespace, in document order.
    pub fn children_in<'a>(
        &'a self,
        namespace: Option<&'a str>,
        name: &'a str,
    ) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children
            .iter()
            .filter(move |c| c.name == name && c.namespace.as_deref() == namespace)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Parses a feed document and returns its raw items in document order.
///
/// RSS: the `item` children of the root's `channel`. When there is no
/// `channel`, the document is treated as Atom and the root's `entry` elements
/// in the Atom namespace are returned instead.
///
/// # Errors
///
/// Malformed XML is fatal; there is no partial recovery.
pub fn parse_items(bytes: &[u8]) -> Result<Vec<XmlElement>, ParseError> {
    let root = parse_document(bytes)?;

    if let Some(channel) = root.children_in(None, "channel").next() {
        return Ok(channel.children_in(None, "item").cloned().collect());
    }

    tracing::debug!(root = %root.name, "No RSS channel found, falling back to Atom entries");
    Ok(root.children_in(Some(ATOM_NS), "entry").cloned().collect())
}

/// Builds the element tree of a whole document and returns its root.
pub fn parse_document(bytes: &[u8]) -> Result<XmlElement, ParseError> {
    // SEC-002: quick-xml (0.37) never expands <!ENTITY> declarations, so
    // entity-based XXE payloads in a hostile feed fail to unescape instead.
    let mut reader = NsReader::from_reader(bytes);
    let mut buf = Vec::new();
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let (resolved, event) = match reader.read_resolved_event_into(&mut buf) {
            Ok(pair) => pair,
            Err(e) => return Err(xml_error(&reader, e)),
        };
        let namespace = namespace_of(&resolved);

        match event {
            Event::Start(e) => {
                let element = start_element(&reader, &e, namespace)?;
                stack.push(element);
            }
            Event::Empty(e) => {
                let element = start_element(&reader, &e, namespace)?;
                attach(&mut stack, &mut root, element, &reader)?;
            }
            Event::End(_) => {
                if let Some(element) = stack.pop() {
                    attach(&mut stack, &mut root, element, &reader)?;
                }
            }
            Event::Text(e) => {
                if let Some(current) = stack.last_mut() {
                    let text = e.unescape().map_err(|err| xml_error(&reader, err))?;
                    current.text.push_str(&text);
                }
            }
            Event::CData(e) => {
                if let Some(current) = stack.last_mut() {
                    let text = reader
                        .decoder()
                        .decode(&e)
                        .map_err(|err| xml_error(&reader, err))?;
                    current.text.push_str(&text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(ParseError::Xml {
            position: reader.buffer_position() as u64,
            message: format!("unclosed element <{}>", stack[stack.len() - 1].name),
        });
    }

    root.ok_or(ParseError::NoRootElement)
}

fn namespace_of(resolved: &ResolveResult<'_>) -> Option<String> {
    match resolved {
        ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.as_ref()).into_owned()),
        _ => None,
    }
}

fn start_element(
    reader: &NsReader<&[u8]>,
    e: &BytesStart<'_>,
    namespace: Option<String>,
) -> Result<XmlElement, ParseError> {
    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = match attr {
            Ok(attr) => attr,
            Err(err) => {
                tracing::warn!(error = %err, "Skipping malformed feed attribute");
                continue;
            }
        };
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .decode_and_unescape_value(reader.decoder())
            .map_err(|err| xml_error(reader, err))?;
        attributes.push((key, value.into_owned()));
    }

    Ok(XmlElement {
        namespace,
        name: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
        attributes,
        text: String::new(),
        children: Vec::new(),
    })
}

/// Hangs a finished element under its parent, or makes it the document root.
fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
    reader: &NsReader<&[u8]>,
) -> Result<(), ParseError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => {
            return Err(ParseError::Xml {
                position: reader.buffer_position() as u64,
                message: "junk after document element".to_string(),
            })
        }
    }
    Ok(())
}

fn xml_error(reader: &NsReader<&[u8]>, err: impl std::fmt::Display) -> ParseError {
    ParseError::Xml {
        position: reader.buffer_position() as u64,
        message: err.to_string(),
    }
}
