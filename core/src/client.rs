//! Request building and response interpretation.
//!
//! # Design
//! `build_request` turns a `RequestConfig` into an `HttpRequest` and
//! `parse_response` turns the transport's `HttpResponse` into an `Outcome`.
//! Neither touches the network; `Request` runs the transport between the two
//! halves, which keeps both deterministic and testable on their own.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::config::RequestConfig;
use crate::encoding::{charset_from_content_type, string_encoding, TextEncoding};
use crate::error::RequestError;
use crate::http::{find_header, HttpRequest, HttpResponse, ResponseHead};
use crate::multipart::MultipartForm;
use crate::outcome::{Outcome, ResponseObject, XmlElement};
use crate::types::{RequestSerializerType, ResponseSerializerType};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_CONTENT_TYPE: &str = "application/json";

/// Build the `HttpRequest` described by `config`.
pub fn build_request<C: RequestConfig + ?Sized>(config: &C) -> Result<HttpRequest, RequestError> {
    let method = config.request_method();
    let mut url = config.full_url()?;
    let params = config.params();

    let mut body = None;
    let mut content_type = None;

    if method.encodes_params_in_query() {
        if let Some(params) = &params {
            let query = encode_form(params)?;
            if !query.is_empty() {
                append_query(&mut url, &query);
            }
        }
    } else if let Some(block) = config.constructing_body_block() {
        let mut form = MultipartForm::new();
        if let Some(params) = &params {
            for (name, value) in form_fields(params)? {
                form.append_text(&name, &value);
            }
        }
        block(&mut form);
        content_type = Some(form.content_type());
        body = Some(form.encode());
    } else if let Some(params) = &params {
        match config.request_serializer_type() {
            RequestSerializerType::Http => {
                body = Some(encode_form(params)?.into_bytes());
                content_type = Some(FORM_CONTENT_TYPE.to_string());
            }
            RequestSerializerType::Json => {
                let json = serde_json::to_vec(params)
                    .map_err(|e| RequestError::Serialization(e.to_string()))?;
                body = Some(json);
                content_type = Some(JSON_CONTENT_TYPE.to_string());
            }
        }
    }

    let mut headers: Vec<(String, String)> = config.header_fields().into_iter().collect();
    if let Some(credentials) = config.authorization() {
        if find_header(&headers, "authorization").is_none() {
            let token = STANDARD.encode(format!("{}:{}", credentials.username, credentials.password));
            headers.push(("Authorization".to_string(), format!("Basic {token}")));
        }
    }
    if let Some(content_type) = content_type {
        if find_header(&headers, "content-type").is_none() {
            headers.push(("Content-Type".to_string(), content_type));
        }
    }

    let request = HttpRequest {
        method,
        url: url.to_string(),
        headers,
        body,
        timeout: config.request_timeout(),
        allows_cellular_access: config.allows_cellular_access(),
        priority: config.priority(),
    };
    debug!(
        method = %request.method,
        url = %request.url,
        body_len = request.body.as_ref().map_or(0, Vec::len),
        "built request"
    );
    Ok(request)
}

/// Interpret a response received for `config`.
pub fn parse_response<C: RequestConfig + ?Sized>(config: &C, response: HttpResponse) -> Outcome {
    let encoding = response
        .header("content-type")
        .and_then(charset_from_content_type)
        .unwrap_or_else(|| string_encoding(config));
    let (head, body) = response.into_parts();

    if !config.status_code_validator(head.status) {
        let status = head.status;
        return failed_with_response(config, RequestError::InvalidStatus { status }, head, body);
    }

    match decode_body(config.response_serializer_type(), &body, encoding) {
        Ok(object) => Outcome {
            error: None,
            response_string: encoding.decode(&body),
            response_object: object,
            response: Some(head),
            response_data: Some(body),
            network_bad: false,
        },
        Err(e) => failed_with_response(config, e, head, body),
    }
}

/// Outcome for a failure before any response arrived.
pub fn failed<C: RequestConfig + ?Sized>(config: &C, error: RequestError) -> Outcome {
    let network_bad = config.network_bad_validator(&error);
    Outcome {
        network_bad,
        ..Outcome::failed(error)
    }
}

fn failed_with_response<C: RequestConfig + ?Sized>(
    config: &C,
    error: RequestError,
    head: ResponseHead,
    body: Vec<u8>,
) -> Outcome {
    Outcome {
        response: Some(head),
        response_data: Some(body),
        ..failed(config, error)
    }
}

/// Decode `body` according to the response serializer. Empty JSON and XML
/// bodies decode to no object.
pub fn decode_body(
    response_type: ResponseSerializerType,
    body: &[u8],
    encoding: TextEncoding,
) -> Result<Option<ResponseObject>, RequestError> {
    match response_type {
        ResponseSerializerType::Http => Ok(Some(ResponseObject::Data(body.to_vec()))),
        _ if body.iter().all(u8::is_ascii_whitespace) => Ok(None),
        ResponseSerializerType::Json => serde_json::from_str(&decode_text(body, encoding)?)
            .map(|value| Some(ResponseObject::Json(value)))
            .map_err(|e| RequestError::Deserialization(e.to_string())),
        ResponseSerializerType::Xml => {
            parse_xml(&decode_text(body, encoding)?).map(|root| Some(ResponseObject::Xml(root)))
        }
    }
}

fn decode_text(body: &[u8], encoding: TextEncoding) -> Result<String, RequestError> {
    encoding.decode(body).ok_or_else(|| {
        RequestError::Deserialization(format!("body is not valid {}", encoding.label()))
    })
}

/// Parse an XML document into its root element.
pub fn parse_xml(text: &str) -> Result<XmlElement, RequestError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root = None;

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(start) => stack.push(element_from(&start)?),
            Event::Empty(start) => attach(&mut stack, &mut root, element_from(&start)?)?,
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| xml_error("unexpected closing tag"))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text.unescape().map_err(xml_error)?);
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(xml_error(format!("unclosed element <{}>", open.name)));
    }
    root.ok_or_else(|| xml_error("document has no root element"))
}

fn element_from(start: &BytesStart<'_>) -> Result<XmlElement, RequestError> {
    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(xml_error)?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute.unescape_value().map_err(xml_error)?.into_owned();
        attributes.push((key, value));
    }
    Ok(XmlElement {
        name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
        attributes,
        text: String::new(),
        children: Vec::new(),
    })
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), RequestError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_some() => return Err(xml_error("multiple root elements")),
        None => *root = Some(element),
    }
    Ok(())
}

fn xml_error(e: impl std::fmt::Display) -> RequestError {
    RequestError::Deserialization(format!("xml: {e}"))
}

/// Flatten a JSON object into form fields. Nested values are rejected.
fn form_fields(params: &Value) -> Result<Vec<(String, String)>, RequestError> {
    let object = params.as_object().ok_or_else(|| {
        RequestError::Serialization("form parameters must be a JSON object".to_string())
    })?;
    object
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Null => String::new(),
                Value::Array(_) | Value::Object(_) => {
                    return Err(RequestError::Serialization(format!(
                        "form parameter `{key}` is not a scalar"
                    )))
                }
            };
            Ok((key.clone(), value))
        })
        .collect()
}

fn encode_form(params: &Value) -> Result<String, RequestError> {
    serde_urlencoded::to_string(form_fields(params)?)
        .map_err(|e| RequestError::Serialization(e.to_string()))
}

fn append_query(url: &mut Url, query: &str) {
    let combined = match url.query() {
        Some(existing) if !existing.is_empty() => format!("{existing}&{query}"),
        _ => query.to_string(),
    };
    url.set_query(Some(&combined));
}
