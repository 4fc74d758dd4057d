//! Text encoding used to turn a raw response body into `response_string`.
//!
//! # Design
//! `resolve_encoding` is a pure function over the declared response
//! serializer and a header mapping. The charset named in `Content-Type`
//! wins, then the first entry of `Accept-Charset`, and otherwise UTF-8 is
//! used for every serializer type. Unrecognized charset names fall through
//! to the next source rather than failing.
//!
//! Labels are matched with the WHATWG Encoding Standard tables from
//! `encoding_rs`, so `iso-8859-1` and `us-ascii` both name `windows-1252`.

use std::collections::BTreeMap;

use encoding_rs::Encoding;

use crate::config::RequestConfig;
use crate::types::ResponseSerializerType;

/// A character encoding known to the response decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextEncoding(&'static Encoding);

impl TextEncoding {
    pub fn utf8() -> Self {
        TextEncoding(encoding_rs::UTF_8)
    }

    /// Look up an encoding by charset label, e.g. `"GBK"` or `"utf-16be"`.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().trim_matches('"');
        Encoding::for_label(label.as_bytes()).map(TextEncoding)
    }

    /// Canonical name, e.g. `"UTF-8"` or `"windows-1252"`.
    pub fn label(&self) -> &'static str {
        self.0.name()
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.0
    }

    /// Decode `bytes`, or `None` if they contain malformed sequences. A
    /// byte order mark overrides this encoding and is stripped.
    pub fn decode(&self, bytes: &[u8]) -> Option<String> {
        let (text, _, had_errors) = self.0.decode(bytes);
        if had_errors {
            None
        } else {
            Some(text.into_owned())
        }
    }
}

impl Default for TextEncoding {
    fn default() -> Self {
        TextEncoding::utf8()
    }
}

impl From<&'static Encoding> for TextEncoding {
    fn from(encoding: &'static Encoding) -> Self {
        TextEncoding(encoding)
    }
}

/// Extract the `charset` parameter from a `Content-Type` value.
pub fn charset_from_content_type(value: &str) -> Option<TextEncoding> {
    let media_type = value.parse::<mime::Mime>().ok()?;
    let charset = media_type.get_param(mime::CHARSET)?;
    TextEncoding::from_label(charset.as_str())
}

/// Resolve the encoding for decoding a response body to text.
pub fn resolve_encoding(
    response_type: ResponseSerializerType,
    headers: &BTreeMap<String, String>,
) -> TextEncoding {
    let header = |name: &str| {
        headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    };

    if let Some(encoding) = header("content-type").and_then(charset_from_content_type) {
        return encoding;
    }
    if let Some(encoding) = header("accept-charset")
        .and_then(|value| value.split(',').next())
        .and_then(|first| first.split(';').next())
        .and_then(TextEncoding::from_label)
    {
        return encoding;
    }

    default_encoding(response_type)
}

/// Per-serializer fallback. Every serializer currently defaults to UTF-8.
pub fn default_encoding(response_type: ResponseSerializerType) -> TextEncoding {
    match response_type {
        ResponseSerializerType::Http | ResponseSerializerType::Json | ResponseSerializerType::Xml => {
            TextEncoding::utf8()
        }
    }
}

/// The encoding a request declares for its response body.
pub fn string_encoding<C: RequestConfig + ?Sized>(config: &C) -> TextEncoding {
    resolve_encoding(config.response_serializer_type(), &config.header_fields())
}
