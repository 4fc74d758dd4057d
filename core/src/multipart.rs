//! `multipart/form-data` body builder.
//!
//! A request that returns a constructing block from
//! `RequestConfig::constructing_body_block` gets a fresh `MultipartForm`
//! when the request is built. Parameters are appended as text fields first,
//! then the block appends its own parts.

use uuid::Uuid;

/// A single part of a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// Builder for a `multipart/form-data` body.
#[derive(Debug, Clone)]
pub struct MultipartForm {
    boundary: String,
    parts: Vec<Part>,
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::with_boundary(format!("reqkit-boundary-{}", Uuid::new_v4().simple()))
    }

    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            parts: Vec::new(),
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Append a plain form field.
    pub fn append_text(&mut self, name: &str, value: &str) -> &mut Self {
        self.append_data(value.as_bytes().to_vec(), name)
    }

    /// Append raw bytes as a form field without a file name.
    pub fn append_data(&mut self, data: Vec<u8>, name: &str) -> &mut Self {
        self.append_part(
            vec![(
                "Content-Disposition".to_string(),
                format!("form-data; name=\"{}\"", escape_quoted(name)),
            )],
            data,
        )
    }

    /// Append a file. When `mime_type` is `None` it is guessed from
    /// `file_name`, falling back to `application/octet-stream`.
    pub fn append_file_data(
        &mut self,
        data: Vec<u8>,
        name: &str,
        file_name: &str,
        mime_type: Option<&str>,
    ) -> &mut Self {
        let mime_type = match mime_type {
            Some(mime) => mime.to_string(),
            None => mime_guess::from_path(file_name)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
        };
        self.append_part(
            vec![
                (
                    "Content-Disposition".to_string(),
                    format!(
                        "form-data; name=\"{}\"; filename=\"{}\"",
                        escape_quoted(name),
                        escape_quoted(file_name)
                    ),
                ),
                ("Content-Type".to_string(), mime_type),
            ],
            data,
        )
    }

    /// Append a part with caller-supplied headers.
    pub fn append_part(&mut self, headers: Vec<(String, String)>, body: Vec<u8>) -> &mut Self {
        self.parts.push(Part { headers, body });
        self
    }

    /// Value for the request's `Content-Type` header.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Encode all parts into the request body.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for part in &self.parts {
            out.extend_from_slice(b"--");
            out.extend_from_slice(self.boundary.as_bytes());
            out.extend_from_slice(b"\r\n");
            for (name, value) in &part.headers {
                out.extend_from_slice(name.as_bytes());
                out.extend_from_slice(b": ");
                out.extend_from_slice(value.as_bytes());
                out.extend_from_slice(b"\r\n");
            }
            out.extend_from_slice(b"\r\n");
            out.extend_from_slice(&part.body);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"--");
        out.extend_from_slice(self.boundary.as_bytes());
        out.extend_from_slice(b"--\r\n");
        out
    }
}

fn escape_quoted(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace(['\r', '\n'], " ")
}
