//! What a finished request recorded.
//!
//! An `Outcome` is produced once per `start()` and never changes afterwards.
//! On failure `response_object` and `response_string` are always `None`;
//! the response head and raw body are still kept whenever a response
//! arrived, so a rejected status can be inspected.

use serde_json::Value;

use crate::error::RequestError;
use crate::http::ResponseHead;

/// Decoded response body, shaped by the response serializer.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseObject {
    /// Raw bytes (`ResponseSerializerType::Http`).
    Data(Vec<u8>),
    /// Parsed JSON (`ResponseSerializerType::Json`).
    Json(Value),
    /// Parsed document root (`ResponseSerializerType::Xml`).
    Xml(XmlElement),
}

impl ResponseObject {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseObject::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_data(&self) -> Option<&[u8]> {
        match self {
            ResponseObject::Data(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_xml(&self) -> Option<&XmlElement> {
        match self {
            ResponseObject::Xml(element) => Some(element),
            _ => None,
        }
    }
}

/// An XML element with its attributes, text and child elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// First direct child named `name`.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|child| child.name == name)
    }
}

/// Everything recorded when a request finished.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub error: Option<RequestError>,
    pub response: Option<ResponseHead>,
    pub response_data: Option<Vec<u8>>,
    pub response_object: Option<ResponseObject>,
    pub response_string: Option<String>,
    /// Verdict of `network_bad_validator`; only ever true on failure.
    pub network_bad: bool,
}

impl Outcome {
    /// A failure before any response arrived.
    pub fn failed(error: RequestError) -> Self {
        Self {
            error: Some(error),
            response: None,
            response_data: None,
            response_object: None,
            response_string: None,
            network_bad: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Status of the received response, if any.
    pub fn status_code(&self) -> Option<u16> {
        self.response.as_ref().map(|head| head.status)
    }
}
