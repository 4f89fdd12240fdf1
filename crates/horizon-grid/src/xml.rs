//! Small quick-xml helpers shared by the state documents.

use std::collections::HashMap;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};

use crate::error::{GridError, GridResult};

/// Collects the attributes of an element, unescaped.
pub(crate) fn attributes(start: &BytesStart<'_>) -> GridResult<HashMap<String, String>> {
    let mut attrs = HashMap::new();
    for attr in start.attributes() {
        let attr = attr.map_err(parse_error)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = attr.unescape_value().map_err(parse_error)?.to_string();
        attrs.insert(key, value);
    }
    Ok(attrs)
}

/// Local name of an element as an owned string.
pub(crate) fn element_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.name().as_ref()).to_string()
}

pub(crate) fn parse_error(e: impl std::fmt::Display) -> GridError {
    GridError::StateParse(e.to_string())
}

pub(crate) fn write_error(e: impl std::fmt::Display) -> GridError {
    GridError::StateWrite(e.to_string())
}

/// Looks up a required attribute.
pub(crate) fn required<'a>(attrs: &'a HashMap<String, String>, element: &str, key: &str) -> GridResult<&'a str> {
    attrs
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| GridError::StateParse(format!("<{element}> is missing `{key}`")))
}

/// Parses a `true`/`false` attribute.
pub(crate) fn parse_bool(value: &str) -> GridResult<bool> {
    match value {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(GridError::StateParse(format!("expected a boolean, found `{other}`"))),
    }
}

/// Pretty-printing element writer.
pub(crate) struct XmlOut {
    writer: Writer<Vec<u8>>,
}

impl XmlOut {
    pub(crate) fn new() -> GridResult<Self> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(write_error)?;
        Ok(Self { writer })
    }

    pub(crate) fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> GridResult<()> {
        let mut start = BytesStart::new(name);
        for &(key, value) in attrs {
            start.push_attribute((key, value));
        }
        self.writer.write_event(Event::Start(start)).map_err(write_error)
    }

    pub(crate) fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> GridResult<()> {
        let mut start = BytesStart::new(name);
        for &(key, value) in attrs {
            start.push_attribute((key, value));
        }
        self.writer.write_event(Event::Empty(start)).map_err(write_error)
    }

    pub(crate) fn end(&mut self, name: &str) -> GridResult<()> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(write_error)
    }

    pub(crate) fn finish(self) -> GridResult<String> {
        String::from_utf8(self.writer.into_inner()).map_err(write_error)
    }
}
