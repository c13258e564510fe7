//! Tool result classification.
//!
//! Tool outputs are plain strings most of the time, but tools that render
//! charts or take screenshots tend to report their media either inline as a
//! `data:` URI or as a path to a file they wrote. The classifier finds those
//! references, decodes them, and turns the output into a multimodal message
//! so the next model call can see the media.
//!
//! A path is only accepted when it names an existing regular file with a
//! supported image extension. Text that merely looks like a path stays
//! plain text. Image bytes must carry a known signature; a candidate that
//! does not is skipped with a warning.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use base64::Engine;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::error::ClassificationWarning;
use crate::types::{
    image_mime_for_extension, sniff_image_mime, Attachment, ContentPart, MediaItem, MediaOrigin,
    Message, ToolOutput, ToolResult, TOOLS_SOURCE,
};

fn data_uri_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"data:(?P<kind>image|audio)/(?P<format>[A-Za-z0-9.+-]+);base64,(?P<payload>[A-Za-z0-9+/]+={0,2})",
        )
        .expect("valid data uri regex")
    })
}

fn file_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"file://(?P<path>[^\s"'<>()\[\]]+?\.(?i:png|jpe?g|gif|bmp|webp))\b"#)
            .expect("valid file url regex")
    })
}

fn path_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?P<path>(?:\b[A-Za-z]:[\\/])?[~./\\\w-][^\s"'<>|*?()\[\]=:,;]*?\.(?i:png|jpe?g|gif|bmp|webp))\b"#,
        )
        .expect("valid image path regex")
    })
}

/// Media found in a piece of text, plus the candidates that failed.
#[derive(Debug, Default)]
pub struct Detection {
    pub media: Vec<MediaItem>,
    pub warnings: Vec<ClassificationWarning>,
}

/// Outcome of classifying one tool result.
#[derive(Debug, Clone)]
pub struct ClassifiedResult {
    /// Text or multimodal message attributed to the tools source.
    pub message: Message,
    /// Set when the tool returned a decoded media object.
    pub attachment: Option<Attachment>,
}

enum Candidate {
    Inline { kind: String, format: String, payload: String },
    Path(String),
    FileUrl { url: String, path: String },
}

/// Decides between text and multimodal messages for tool output.
#[derive(Debug, Clone, Default)]
pub struct ToolResultClassifier {
    base_dir: Option<PathBuf>,
}

impl ToolResultClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative paths against `dir` instead of the process cwd.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Classify one tool result.
    ///
    /// A decoded media payload is recorded as a multimodal message and also
    /// converted into an attachment for the next model call.
    pub async fn classify_result(&self, result: &ToolResult) -> ClassifiedResult {
        match &result.output {
            ToolOutput::Media(item) => ClassifiedResult {
                message: Message::multimodal(
                    TOOLS_SOURCE,
                    vec![
                        ContentPart::Text {
                            text: format!("Tool '{}' returned {} ({}).", result.name, item.kind, item.mime_type),
                        },
                        ContentPart::Media(item.clone()),
                    ],
                ),
                attachment: Some(item.to_attachment()),
            },
            _ => ClassifiedResult {
                message: self.classify(&result.output_text()).await,
                attachment: None,
            },
        }
    }

    /// Turn tool output text into a text or multimodal message.
    pub async fn classify(&self, text: &str) -> Message {
        let detection = self.detect(text).await;
        for warning in &detection.warnings {
            tracing::warn!(candidate = %warning.candidate, reason = %warning.reason, "skipping media candidate");
        }
        if detection.media.is_empty() {
            return Message::text(TOOLS_SOURCE, text);
        }
        let mut parts = Vec::with_capacity(detection.media.len() + 1);
        parts.push(ContentPart::Text {
            text: text.to_string(),
        });
        parts.extend(detection.media.into_iter().map(ContentPart::Media));
        Message::multimodal(TOOLS_SOURCE, parts)
    }

    /// Find and decode every media reference in `text`, in order of
    /// appearance. Identical payloads are reported once.
    pub async fn detect(&self, text: &str) -> Detection {
        let mut detection = Detection::default();
        let mut seen: HashSet<Vec<u8>> = HashSet::new();

        for candidate in collect_candidates(text) {
            let decoded = match &candidate {
                Candidate::Inline { kind, format, payload } => decode_inline(kind, format, payload),
                Candidate::Path(raw) => match self.resolve_path(raw).await {
                    Some(path) => read_image(&path, MediaOrigin::File(path.clone())).await,
                    None => continue,
                },
                Candidate::FileUrl { url, path } => match self.resolve_path(path).await {
                    Some(resolved) => read_image(&resolved, MediaOrigin::Url(url.clone())).await,
                    None => continue,
                },
            };
            match decoded {
                Ok(item) => {
                    if seen.insert(Sha256::digest(&item.data).to_vec()) {
                        detection.media.push(item);
                    }
                }
                Err(warning) => detection.warnings.push(warning),
            }
        }
        detection
    }

    async fn resolve_path(&self, raw: &str) -> Option<PathBuf> {
        let path = expand_home(raw);
        let path = match (&self.base_dir, path.is_relative()) {
            (Some(base), true) => base.join(path),
            _ => path,
        };
        image_mime_for_extension(path.extension()?.to_str()?)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Some(path),
            _ => {
                tracing::debug!(path = %path.display(), "image-like path does not resolve to a file");
                None
            }
        }
    }
}

fn collect_candidates(text: &str) -> Vec<Candidate> {
    let mut found: Vec<(usize, Candidate)> = Vec::new();
    let mut claimed: Vec<std::ops::Range<usize>> = Vec::new();

    for caps in data_uri_regex().captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        claimed.push(whole.range());
        found.push((
            whole.start(),
            Candidate::Inline {
                kind: caps["kind"].to_string(),
                format: caps["format"].to_string(),
                payload: caps["payload"].to_string(),
            },
        ));
    }
    for caps in file_url_regex().captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        claimed.push(whole.range());
        found.push((
            whole.start(),
            Candidate::FileUrl {
                url: whole.as_str().to_string(),
                path: caps["path"].to_string(),
            },
        ));
    }
    for caps in path_regex().captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let overlaps = claimed
            .iter()
            .any(|range| whole.start() < range.end && range.start < whole.end());
        if overlaps {
            continue;
        }
        found.push((whole.start(), Candidate::Path(caps["path"].to_string())));
    }

    found.sort_by_key(|(start, _)| *start);
    found.into_iter().map(|(_, candidate)| candidate).collect()
}

fn decode_inline(kind: &str, format: &str, payload: &str) -> Result<MediaItem, ClassificationWarning> {
    let data = base64::engine::general_purpose::STANDARD
        .decode(payload.as_bytes())
        .map_err(|e| ClassificationWarning::new(payload, format!("invalid base64: {e}")))?;
    if data.is_empty() {
        return Err(ClassificationWarning::new(payload, "empty payload"));
    }
    if kind == "audio" {
        let declared = format!("audio/{}", format.to_ascii_lowercase());
        return Ok(MediaItem::audio(data, declared, MediaOrigin::Inline));
    }
    let mime = sniff_image_mime(&data)
        .ok_or_else(|| ClassificationWarning::new(payload, "payload is not a recognized image"))?;
    Ok(MediaItem::image(data, mime, MediaOrigin::Inline))
}

async fn read_image(path: &Path, origin: MediaOrigin) -> Result<MediaItem, ClassificationWarning> {
    let display = path.display().to_string();
    let data = tokio::fs::read(path)
        .await
        .map_err(|e| ClassificationWarning::new(&display, e.to_string()))?;
    if data.is_empty() {
        return Err(ClassificationWarning::new(&display, "empty file"));
    }
    let mime = sniff_image_mime(&data)
        .ok_or_else(|| ClassificationWarning::new(&display, "file is not a recognized image"))?;
    Ok(MediaItem::image(data, mime, origin))
}

fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(dirs) = directories::UserDirs::new() {
            return dirs.home_dir().join(rest);
        }
    }
    PathBuf::from(raw)
}
