//! Multipart form bodies built from `-F` arguments
//!
//! The body is encoded once into bytes so every request of the sweep can
//! reuse it without touching the file system again.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use bytes::{BufMut, Bytes, BytesMut};
use rand::distributions::Alphanumeric;
use rand::Rng;

const DEFAULT_FILE_TYPE: &str = "application/octet-stream";

/// One `-F` argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormPart {
    /// `name=value`
    Field { name: String, value: String },
    /// `name=@path[;type=mime]`
    File {
        name: String,
        path: PathBuf,
        content_type: String,
    },
}

impl FromStr for FormPart {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (name, value) = split_property(s)
            .ok_or_else(|| anyhow!("invalid multi part form data string {:?}", s))?;

        let Some(file) = value.strip_prefix('@') else {
            return Ok(Self::Field {
                name: name.to_string(),
                value: value.to_string(),
            });
        };

        let (path, content_type) = match file.split_once(';') {
            Some((path, option)) => match split_property(option) {
                Some((key, mime)) if key.eq_ignore_ascii_case("type") && !mime.is_empty() => {
                    (path.trim(), mime.to_string())
                }
                _ => bail!("invalid file type in multi part form data string {:?}", s),
            },
            None => (file.trim(), DEFAULT_FILE_TYPE.to_string()),
        };
        if path.is_empty() {
            bail!("missing file name in multi part form data string {:?}", s);
        }

        Ok(Self::File {
            name: name.to_string(),
            path: PathBuf::from(path),
            content_type,
        })
    }
}

/// Ordered collection of form parts
#[derive(Debug, Clone, Default)]
pub struct MultipartForm {
    parts: Vec<FormPart>,
}

impl MultipartForm {
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<Self> {
        let parts = args
            .iter()
            .map(|arg| arg.as_ref().parse())
            .collect::<Result<Vec<FormPart>>>()?;
        Ok(Self { parts })
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Random boundary that cannot be confused with typical payloads
    pub fn random_boundary() -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect()
    }

    /// Value for the `Content-Type` header of the encoded body
    pub fn content_type(boundary: &str) -> String {
        format!("multipart/form-data; boundary={}", boundary)
    }

    /// Encode all parts, reading referenced files
    pub fn encode(&self, boundary: &str) -> Result<Bytes> {
        let mut body = BytesMut::new();

        for part in &self.parts {
            body.put_slice(format!("--{}\r\n", boundary).as_bytes());
            match part {
                FormPart::Field { name, value } => {
                    body.put_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                            escape_quotes(name)
                        )
                        .as_bytes(),
                    );
                    body.put_slice(value.as_bytes());
                }
                FormPart::File {
                    name,
                    path,
                    content_type,
                } => {
                    let contents = std::fs::read(path)
                        .with_context(|| format!("reading form file {}", path.display()))?;
                    body.put_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                             Content-Type: {}\r\n\r\n",
                            escape_quotes(name),
                            escape_quotes(&file_name(path)),
                            content_type
                        )
                        .as_bytes(),
                    );
                    body.put_slice(&contents);
                }
            }
            body.put_slice(b"\r\n");
        }
        body.put_slice(format!("--{}--\r\n", boundary).as_bytes());

        Ok(body.freeze())
    }
}

/// `key=value` with both sides trimmed; `None` without a key
fn split_property(s: &str) -> Option<(&str, &str)> {
    let (key, value) = s.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key, value.trim()))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn escape_quotes(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
