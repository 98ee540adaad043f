//! Representation formats and marshaling
//!
//! RESTCONF payloads travel as JSON, XML, or YAML. A data node is rendered as
//! a single named element: `{"namespace": "urn:x"}`, `<namespace>urn:x</namespace>`,
//! and so on; a group node (array value) repeats the element per member in
//! XML and becomes a sequence in JSON/YAML.

use serde_json::{Map, Value};

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

use crate::error::{RestconfError, Result};

/// Media types accepted in `Accept` and `Content-Type`, besides `*/*`.
pub const SUPPORTED_MEDIA_TYPES: [&str; 9] = [
    "text/json",
    "text/yaml",
    "text/xml",
    "application/xml",
    "application/json",
    "application/yaml",
    "application/yang-data+xml",
    "application/yang-data+json",
    "application/yang-data+yaml",
];

/// A serialization format for request and response payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Xml,
    Json,
    Yaml,
}

impl Format {
    /// Recognize a concrete media type by its format suffix. Parameters
    /// (`;charset=...`) are ignored; unknown types yield `None`.
    pub fn from_media_type(value: &str) -> Option<Self> {
        let essence = value.split(';').next().unwrap_or_default().trim();
        if !SUPPORTED_MEDIA_TYPES.contains(&essence) {
            return None;
        }
        if essence.ends_with("xml") {
            Some(Self::Xml)
        } else if essence.ends_with("json") {
            Some(Self::Json)
        } else if essence.ends_with("yaml") {
            Some(Self::Yaml)
        } else {
            None
        }
    }

    /// The vendor-specific yang-data media type for this format, used when
    /// the client did not name a concrete type itself.
    pub fn yang_data_media_type(self) -> &'static str {
        match self {
            Self::Xml => "application/yang-data+xml",
            Self::Json => "application/yang-data+json",
            Self::Yaml => "application/yang-data+yaml",
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Xml => f.write_str("xml"),
            Self::Json => f.write_str("json"),
            Self::Yaml => f.write_str("yaml"),
        }
    }
}

/// Marshal a named value in the given format.
pub fn marshal(name: &str, value: &Value, format: Format) -> Result<Vec<u8>> {
    match format {
        Format::Json => {
            let mut wrapped = Map::new();
            wrapped.insert(name.to_string(), value.clone());
            Ok(serde_json::to_vec_pretty(&Value::Object(wrapped))?)
        }
        Format::Yaml => {
            let mut wrapped = Map::new();
            wrapped.insert(name.to_string(), value.clone());
            Ok(serde_yaml::to_string(&Value::Object(wrapped))?.into_bytes())
        }
        Format::Xml => {
            let mut writer = Writer::new_with_indent(Vec::new(), b' ', 1);
            write_xml_element(&mut writer, name, value)?;
            Ok(writer.into_inner())
        }
    }
}

/// Unmarshal a payload in the given format into a value tree.
pub fn unmarshal(bytes: &[u8], format: Format) -> Result<Value> {
    match format {
        Format::Json => Ok(serde_json::from_slice(bytes)?),
        Format::Yaml => Ok(serde_yaml::from_slice(bytes)?),
        Format::Xml => xml_to_value(bytes),
    }
}

fn write_xml_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    name: &str,
    value: &Value,
) -> Result<()> {
    match value {
        // A group result repeats the element per member.
        Value::Array(members) => {
            for member in members {
                write_xml_element(writer, name, member)?;
            }
        }
        Value::Object(map) => {
            writer.write_event(Event::Start(BytesStart::new(name))).map_err(xml_err)?;
            for (child, sub) in map {
                write_xml_element(writer, child, sub)?;
            }
            writer.write_event(Event::End(BytesEnd::new(name))).map_err(xml_err)?;
        }
        Value::Null => {
            writer.write_event(Event::Empty(BytesStart::new(name))).map_err(xml_err)?;
        }
        scalar => {
            let text = match scalar {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            writer.write_event(Event::Start(BytesStart::new(name))).map_err(xml_err)?;
            writer.write_event(Event::Text(BytesText::new(&text))).map_err(xml_err)?;
            writer.write_event(Event::End(BytesEnd::new(name))).map_err(xml_err)?;
        }
    }
    Ok(())
}

fn xml_to_value(bytes: &[u8]) -> Result<Value> {
    let mut reader = Reader::from_reader(bytes);
    let config = reader.config_mut();
    config.trim_text(true);

    let mut root = Map::new();
    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(start) => {
                let name = element_name(&start);
                let child = read_element(&mut reader)?;
                insert_child(&mut root, name, child);
            }
            Event::Empty(start) => {
                let name = element_name(&start);
                insert_child(&mut root, name, Value::Null);
            }
            Event::Eof => break,
            Event::Decl(_) | Event::Comment(_) | Event::Text(_) | Event::PI(_) => {}
            other => {
                return Err(RestconfError::Xml(format!(
                    "unexpected XML event {:?}",
                    other
                )));
            }
        }
    }
    Ok(Value::Object(root))
}

/// Parse the content of an element whose Start event was just consumed.
fn read_element(reader: &mut Reader<&[u8]>) -> Result<Value> {
    let mut children = Map::new();
    let mut text = String::new();
    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(start) => {
                let name = element_name(&start);
                let child = read_element(reader)?;
                insert_child(&mut children, name, child);
            }
            Event::Empty(start) => {
                let name = element_name(&start);
                insert_child(&mut children, name, Value::Null);
            }
            Event::Text(t) => {
                text.push_str(&t.unescape().map_err(xml_err)?);
            }
            Event::End(_) => break,
            Event::Eof => {
                return Err(RestconfError::Xml("unexpected end of document".into()));
            }
            _ => {}
        }
    }
    if children.is_empty() {
        if text.is_empty() {
            Ok(Value::Null)
        } else {
            Ok(Value::String(text))
        }
    } else {
        Ok(Value::Object(children))
    }
}

/// Repeated sibling elements collapse into an array member list.
fn insert_child(map: &mut Map<String, Value>, name: String, value: Value) {
    match map.get_mut(&name) {
        Some(Value::Array(members)) => members.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            map.insert(name, value);
        }
    }
}

fn element_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.name().as_ref()).into_owned()
}

fn xml_err<E: std::fmt::Display>(err: E) -> RestconfError {
    RestconfError::Xml(err.to_string())
}
