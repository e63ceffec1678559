use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::path::Path;

/// A decoded `data:` URI image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl ImageData {
    /// Accepts `data:<mime>;base64,<payload>`. The media type is taken as
    /// declared; checking that it really is an image is the uploader's job.
    pub fn from_data_uri(uri: &str) -> Result<Self> {
        let rest = uri
            .trim()
            .strip_prefix("data:")
            .ok_or_else(|| anyhow!("image data must be a data URI"))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| anyhow!("data URI has no payload separator"))?;
        let mut fields = header.split(';');
        let mime = fields.next().unwrap_or_default().trim().to_lowercase();
        if !fields.any(|field| field.trim().eq_ignore_ascii_case("base64")) {
            return Err(anyhow!("data URI must be base64 encoded"));
        }
        if mime.is_empty() {
            return Err(anyhow!("data URI has no media type"));
        }
        let bytes = BASE64
            .decode(payload.trim())
            .with_context(|| "data URI payload is not valid base64")?;
        if bytes.is_empty() {
            return Err(anyhow!("data URI payload is empty"));
        }
        Ok(Self { mime, bytes })
    }

    /// Builds an image from raw bytes, sniffing the media type.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(anyhow!("image is empty"));
        }
        let kind = infer::get(&bytes).ok_or_else(|| anyhow!("unrecognized file type"))?;
        if kind.matcher_type() != infer::MatcherType::Image {
            return Err(anyhow!("expected an image, got {}", kind.mime_type()));
        }
        Ok(Self {
            mime: kind.mime_type().to_string(),
            bytes,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read image: {}", path.display()))?;
        Self::from_bytes(bytes).with_context(|| format!("unsupported image: {}", path.display()))
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime, self.to_base64())
    }
}

#[cfg(test)]
pub(crate) const PNG_HEADER: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52,
];
