//! Small owned XML tree with the typed getters the web interface needs.
//!
//! Responses from the receiver are tiny, so the whole document is parsed into
//! an [`Element`] tree up front and fields are looked up by tag name.

use std::borrow::Cow;

use quick_xml::events::Event;
use quick_xml::Reader;

use e2_core::{Error, Result};

/// One XML element: its tag, concatenated text content and child elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    fn named(name: &[u8]) -> Self {
        Self {
            name: String::from_utf8_lossy(name).into_owned(),
            ..Self::default()
        }
    }

    /// Parse a document and return its root element.
    pub fn parse(xml: &str) -> Result<Element> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => stack.push(Element::named(e.name().as_ref())),
                Ok(Event::Empty(ref e)) => {
                    attach(&mut stack, &mut root, Element::named(e.name().as_ref()));
                }
                Ok(Event::Text(e)) => {
                    let raw = String::from_utf8_lossy(&e);
                    let text = quick_xml::escape::unescape(&raw)
                        .map(Cow::into_owned)
                        .unwrap_or_else(|_| raw.to_string());
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&text);
                    }
                }
                Ok(Event::CData(e)) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                    }
                }
                Ok(Event::End(_)) => {
                    if let Some(done) = stack.pop() {
                        attach(&mut stack, &mut root, done);
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(Error::parse(format!(
                        "XML error at position {}: {e}",
                        reader.buffer_position()
                    )))
                }
            }
        }

        if !stack.is_empty() {
            return Err(Error::parse("XML document ended inside an element"));
        }
        root.ok_or_else(|| Error::parse("XML document has no root element"))
    }

    /// First child with the given tag.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All children with the given tag, in document order.
    pub fn children<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Text of a child element. An empty element yields `Some("")`.
    pub fn get_string(&self, tag: &str) -> Option<String> {
        self.child(tag).map(|c| c.text.clone())
    }

    /// Leading integer of a child element's text, 0 when it has none.
    pub fn get_int(&self, tag: &str) -> Option<i64> {
        self.child(tag).map(|c| parse_int(&c.text))
    }

    /// Boolean value of a child element, `None` when missing or unrecognised.
    pub fn get_bool(&self, tag: &str) -> Option<bool> {
        self.child(tag).and_then(|c| parse_bool(&c.text))
    }
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

/// Parse the leading integer of `s` the way C's `atoi` does.
pub fn parse_int(s: &str) -> i64 {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let value = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, d| acc.saturating_mul(10).saturating_add(i64::from(d - b'0')));
    if negative {
        -value
    } else {
        value
    }
}

/// Parse the leading decimal number of `s`, 0.0 when it has none.
pub fn parse_float(s: &str) -> f64 {
    let s = s.trim_start();
    let end = s
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || (i == 0 && (c == '-' || c == '+'))))
        .map_or(s.len(), |(i, _)| i);
    s[..end].parse().unwrap_or(0.0)
}

/// Interpret the receiver's spellings of a boolean.
pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "off" | "no" | "disabled" | "false" | "0" => Some(false),
        "on" | "yes" | "enabled" | "true" => Some(true),
        _ => None,
    }
}
