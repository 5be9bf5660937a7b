//! Decoding of the XML documents returned by `read_data.xml`.
//!
//! A reply carries one element per tag, e.g.
//!
//! ```xml
//! <Req><PV_1>22.5 C</PV_1><CM_SP_1_Manual>22.0 C</CM_SP_1_Manual></Req>
//! ```
//!
//! Elements are visited depth-first in document order (the order their start tags appear in).
//! The `Req` request echo is skipped, tags unknown to the dictionary are reported and skipped.

use quick_xml::events::Event;
use tracing::{trace, warn};

use crate::record::StateRecord;
use crate::tags;
use crate::value::Value;

/// Name of the request echo element wrapping the reply.
const REQUEST_ECHO: &str = "Req";

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("the response is not well-formed XML")]
    Xml(#[source] quick_xml::Error),
    #[error("element name is not valid UTF-8")]
    ElementName(#[source] std::str::Utf8Error),
    #[error("the response does not contain any elements")]
    NoElements,
    #[error("the response ended before `{0}` was closed")]
    Unclosed(String),
}

struct Element {
    name: String,
    text: String,
}

/// Decode a reply body of chamber `chamber_id` into a [`StateRecord`].
pub fn decode_response(body: &str, chamber_id: u32) -> Result<StateRecord, DecodeError> {
    let elements = collect_elements(body)?;
    let mut record = StateRecord::new(chamber_id);
    for element in elements {
        if element.name == REQUEST_ECHO {
            continue;
        }
        let encoding = tags::classify(&element.name);
        let value = Value::decode(encoding, &element.text);
        let Some(parameter) = tags::normalize(&element.name) else {
            warn!(
                chamber_id,
                tag = %element.name,
                text = %element.text,
                "response contains a tag with no parameter name, skipping"
            );
            continue;
        };
        trace!(chamber_id, tag = %element.name, parameter, ?value, "decoded a tag");
        record.insert(parameter, value);
    }
    Ok(record)
}

/// Flatten the document into its elements in start-tag order, each with the text preceding its
/// first child (which, for the leaf elements the controller sends, is all of its text).
fn collect_elements(body: &str) -> Result<Vec<Element>, DecodeError> {
    let mut reader = quick_xml::Reader::from_str(body);
    let mut elements = Vec::<Element>::new();
    // Indices into `elements` of the currently open elements, and whether each has seen a child.
    let mut open = Vec::<(usize, bool)>::new();
    loop {
        match reader.read_event().map_err(DecodeError::Xml)? {
            Event::Start(start) => {
                let name = std::str::from_utf8(start.name().as_ref())
                    .map_err(DecodeError::ElementName)?
                    .to_string();
                if let Some((_, has_child)) = open.last_mut() {
                    *has_child = true;
                }
                open.push((elements.len(), false));
                elements.push(Element { name, text: String::new() });
            }
            Event::Empty(empty) => {
                let name = std::str::from_utf8(empty.name().as_ref())
                    .map_err(DecodeError::ElementName)?
                    .to_string();
                if let Some((_, has_child)) = open.last_mut() {
                    *has_child = true;
                }
                elements.push(Element { name, text: String::new() });
            }
            Event::Text(text) => {
                if let Some(&(index, false)) = open.last() {
                    let text = text.unescape().map_err(DecodeError::Xml)?;
                    elements[index].text.push_str(&text);
                }
            }
            Event::CData(cdata) => {
                if let Some(&(index, false)) = open.last() {
                    elements[index].text.push_str(&String::from_utf8_lossy(&cdata));
                }
            }
            Event::End(_) => {
                open.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }
    if let Some(&(index, _)) = open.last() {
        return Err(DecodeError::Unclosed(elements.swap_remove(index).name));
    }
    if elements.is_empty() {
        return Err(DecodeError::NoElements);
    }
    Ok(elements)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_the_request_echo() {
        let body = "<Req><PV_1>22.5 C</PV_1><CM_SP_1_Manual>22.0 C</CM_SP_1_Manual></Req>";
        let record = decode_response(body, 8).unwrap();
        assert_eq!(record.values.len(), 2);
        assert_eq!(record.get("temperature_actual"), Some(&Value::Float(22.5)));
        assert_eq!(record.get("temperature_target"), Some(&Value::Float(22.0)));
        assert_eq!(record.chamber_id, 8);
    }

    #[test]
    fn decodes_every_encoding() {
        let body = "<Req>\n\
            <EO_3_Dim>450 %</EO_3_Dim>\n\
            <EO_13_On_Off>On</EO_13_On_Off>\n\
            <CLC_Enable_Rh_1>Yes</CLC_Enable_Rh_1>\n\
            <CM_NON_RAMPING_MODE>nr_manual</CM_NON_RAMPING_MODE>\n\
            </Req>";
        let record = decode_response(body, 1).unwrap();
        let expected = [
            ("lighting_3", Value::Int(450)),
            ("door_state", Value::Bool(true)),
            ("humidification_enabled", Value::Bool(true)),
            ("operating_mode", Value::Text("nr_manual".into())),
        ];
        for (parameter, value) in expected {
            assert_eq!(record.get(parameter), Some(&value), "{parameter}");
        }
    }

    #[test]
    fn unknown_tags_are_skipped() {
        let body = "<Req><EO_16_On_Off>On</EO_16_On_Off><PV_2>45.1 %RH</PV_2></Req>";
        let record = decode_response(body, 2).unwrap();
        assert_eq!(record.values.len(), 1);
        assert_eq!(record.get("humidity_actual"), Some(&Value::Float(45.1)));
    }

    #[test]
    fn bookkeeping_holds_the_last_element() {
        let body = "<Req><PV_3>400 PPM</PV_3><EO_1_Dim>0</EO_1_Dim><SP_9>1</SP_9></Req>";
        let record = decode_response(body, 4).unwrap();
        assert_eq!(record.env_var.as_deref(), Some("lighting"));
        assert_eq!(record.env_val, Some(Value::Int(0)));
    }

    #[test]
    fn preserves_document_order() {
        let body = "<Req><PV_5>31 %WC</PV_5><PV_1>20 C</PV_1><PV_3>410</PV_3></Req>";
        let record = decode_response(body, 4).unwrap();
        let keys = record.values.keys().map(String::as_str).collect::<Vec<_>>();
        assert_eq!(keys, ["watering_actual", "temperature_actual", "co2_actual"]);
    }

    #[test]
    fn empty_elements_decode_from_empty_text() {
        let record = decode_response("<Req><EO_14_On_Off/></Req>", 4).unwrap();
        assert_eq!(record.get("air_diverter_state"), Some(&Value::Bool(false)));
    }

    #[test]
    fn malformed_documents_are_errors() {
        assert!(matches!(decode_response("", 1), Err(DecodeError::NoElements)));
        assert!(matches!(decode_response("<Req><PV_1>1</PV_2></Req>", 1), Err(DecodeError::Xml(_))));
        assert!(matches!(decode_response("<Req><PV_1>1</PV_1>", 1), Err(_)));
    }
}
