//! Request body representations and their encoders.
//!
//! # Design
//! A pending request carries at most one body. `Body` makes the three
//! representations mutually exclusive by construction: storing a new variant
//! drops whatever was there before.
//!
//! Key-value bodies are assembled eagerly when set, so encoding problems are
//! reported by the setter. Multipart bodies only record their fields; file
//! contents are read when the request is performed, and the wire form is
//! produced by `common-multipart-rfc7578`.

use std::fs::File;
use std::path::{Path, PathBuf};

use common_multipart_rfc7578::client::multipart::{self, BoundaryGenerator, Form};
use futures::StreamExt;
use uuid::Uuid;

use crate::config::MAX_FORM_FIELDS;
use crate::error::ErrorCode;

pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// The body of the pending request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Sent verbatim.
    Raw(String),
    /// `key=value&` pairs with percent-encoded values.
    Encoded(String),
    /// `multipart/form-data` fields, one-shot.
    Multipart(MultipartForm),
}

impl Body {
    pub fn is_multipart(&self) -> bool {
        matches!(self, Body::Multipart(_))
    }
}

/// Percent-encode a form value.
pub fn escape(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Assemble `key=value&key=value&...` with every value escaped.
///
/// Keys are copied verbatim. Each pair is followed by `&`, including the
/// last one.
pub fn encode_key_values<K, V>(pairs: &[(K, V)]) -> Result<String, ErrorCode>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    if pairs.len() > MAX_FORM_FIELDS {
        return Err(ErrorCode::INVALID_ARGUMENT);
    }

    let escaped: Vec<String> = pairs.iter().map(|(_, v)| escape(v.as_ref())).collect();
    let total = pairs
        .iter()
        .zip(&escaped)
        .try_fold(0usize, |acc, ((key, _), value)| {
            acc.checked_add(key.as_ref().len())?
                .checked_add(value.len())?
                .checked_add(2)
        })
        .ok_or(ErrorCode::ENCODING_OVERFLOW)?;

    let mut out = String::new();
    out.try_reserve_exact(total)
        .map_err(|_| ErrorCode::ENCODING_OVERFLOW)?;
    for ((key, _), value) in pairs.iter().zip(&escaped) {
        out.push_str(key.as_ref());
        out.push('=');
        out.push_str(value);
        out.push('&');
    }
    Ok(out)
}

/// One caller-supplied multipart entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormEntry {
    pub name: String,
    /// Field contents, or a file path when `is_file` is set.
    pub value: String,
    pub is_file: bool,
}

impl FormEntry {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            is_file: false,
        }
    }

    pub fn file(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: path.into(),
            is_file: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartContent {
    Text(String),
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub name: String,
    pub content: PartContent,
}

/// Validated multipart fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm {
    parts: Vec<Part>,
}

/// Wire form of a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedMultipart {
    pub content_type: String,
    pub data: Vec<u8>,
}

impl MultipartForm {
    /// Validate entries and copy them into a form.
    ///
    /// Fails with `InvalidArgument` when there are more than
    /// `MAX_FORM_FIELDS` entries or an entry has an empty name. File entries
    /// with an empty path are skipped.
    pub fn from_entries(entries: &[FormEntry]) -> Result<Self, ErrorCode> {
        if entries.len() > MAX_FORM_FIELDS {
            return Err(ErrorCode::INVALID_ARGUMENT);
        }
        let mut parts = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.name.is_empty() {
                return Err(ErrorCode::INVALID_ARGUMENT);
            }
            let content = if entry.is_file {
                if entry.value.is_empty() {
                    continue;
                }
                PartContent::File(PathBuf::from(&entry.value))
            } else {
                PartContent::Text(entry.value.clone())
            };
            parts.push(Part {
                name: entry.name.clone(),
                content,
            });
        }
        Ok(Self { parts })
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Serialize with a random boundary, reading file parts from disk.
    pub fn encode(&self) -> Result<EncodedMultipart, ErrorCode> {
        self.encode_with::<UuidBoundary>()
    }

    /// Serialize with the boundary produced by `G`.
    pub fn encode_with<G: BoundaryGenerator>(&self) -> Result<EncodedMultipart, ErrorCode> {
        let mut form = Form::new::<G>();
        for part in &self.parts {
            let name = disposition_value(&part.name);
            match &part.content {
                PartContent::Text(value) => form.add_text(name, value.clone()),
                PartContent::File(path) => {
                    let file = File::open(path).map_err(|err| {
                        tracing::warn!(path = %path.display(), error = %err, "cannot read multipart file");
                        ErrorCode::FileCouldntReadFile
                    })?;
                    form.add_reader_file(name, file, disposition_value(&file_name(path)));
                }
            }
        }

        let content_type = form.content_type();
        let mut body = Box::pin(multipart::Body::from(form));
        let data = futures::executor::block_on(async {
            let mut data = Vec::new();
            while let Some(chunk) = body.next().await {
                let chunk = chunk.map_err(|err| {
                    tracing::warn!(error = %err, "cannot assemble multipart body");
                    ErrorCode::FileCouldntReadFile
                })?;
                data.extend_from_slice(&chunk);
            }
            Ok::<_, ErrorCode>(data)
        })?;

        Ok(EncodedMultipart { content_type, data })
    }
}

/// `uuid`-based boundary, long enough never to collide with part contents.
pub struct UuidBoundary;

impl BoundaryGenerator for UuidBoundary {
    fn generate_boundary() -> String {
        format!("------------------------{}", Uuid::new_v4().simple())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Percent-encode `"`, CR and LF so a name or file name stays inside its
/// quoted `Content-Disposition` parameter (RFC 7578 section 4.2).
fn disposition_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' => out.push_str("%22"),
            '\r' => out.push_str("%0D"),
            '\n' => out.push_str("%0A"),
            _ => out.push(c),
        }
    }
    out
}
