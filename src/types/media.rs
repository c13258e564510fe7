//! Media items embedded in multimodal messages.

use std::path::PathBuf;

use base64::Engine;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Kind of embedded media.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MediaKind {
    Image,
    Audio,
}

/// Where a media item was found.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum MediaOrigin {
    /// Decoded from an inline `data:` URI.
    Inline,
    /// Read from a filesystem path.
    File(PathBuf),
    /// Resolved from a URL.
    Url(String),
    /// Produced directly by a tool as a decoded object.
    Tool,
}

/// A decoded image or audio clip.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaItem {
    pub kind: MediaKind,
    pub mime_type: String,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    pub origin: MediaOrigin,
}

impl MediaItem {
    /// Create an image item.
    pub fn image(data: Vec<u8>, mime_type: impl Into<String>, origin: MediaOrigin) -> Self {
        Self {
            kind: MediaKind::Image,
            mime_type: mime_type.into(),
            data,
            origin,
        }
    }

    /// Create an audio item.
    pub fn audio(data: Vec<u8>, mime_type: impl Into<String>, origin: MediaOrigin) -> Self {
        Self {
            kind: MediaKind::Audio,
            mime_type: mime_type.into(),
            data,
            origin,
        }
    }

    /// Encode the payload as standard base64.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }

    /// Render as a `data:` URI.
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }

    /// Convert into the attachment shape model clients consume.
    pub fn to_attachment(&self) -> Attachment {
        Attachment {
            kind: self.kind,
            mime_type: self.mime_type.clone(),
            data: self.to_base64(),
        }
    }
}

/// Model-compatible attachment (base64 payload plus MIME type).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    pub kind: MediaKind,
    pub mime_type: String,
    pub data: String,
}

/// Map a file extension to an image MIME type.
pub fn image_mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// Sniff an image MIME type from magic bytes.
pub fn sniff_image_mime(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if data.starts_with(b"BM") {
        Some("image/bmp")
    } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
