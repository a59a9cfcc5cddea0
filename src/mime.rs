//! Image media types
//!
//! [`MediaType`] only ever holds an `image/<subtype>` value, so anything
//! carrying one can be rendered directly.

use std::fmt;

const FALLBACK_MEDIA_TYPE: &str = "image/png";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaType(String);

impl MediaType {
    /// Parses a declared media type, dropping parameters such as `; charset=`.
    ///
    /// Returns `None` for anything that is not `image/<subtype>`.
    pub fn parse(raw: &str) -> Option<Self> {
        let essence = raw.split(';').next()?.trim().to_ascii_lowercase();
        let (top, subtype) = essence.split_once('/')?;
        if top != "image" || subtype.is_empty() || subtype.contains('/') {
            return None;
        }
        if !subtype
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        {
            return None;
        }
        Some(Self(essence))
    }

    /// Detects the media type from the leading magic bytes.
    pub fn sniff(bytes: &[u8]) -> Self {
        match image::guess_format(bytes) {
            Ok(format) => {
                Self::parse(format.to_mime_type()).unwrap_or_else(Self::fallback)
            }
            Err(_) => {
                tracing::warn!(
                    "Unrecognized image format (first 4 bytes: {:02X?}), falling back to {}",
                    &bytes[..bytes.len().min(4)],
                    FALLBACK_MEDIA_TYPE
                );
                Self::fallback()
            }
        }
    }

    /// Uses `declared` when it names an image type, otherwise sniffs `bytes`.
    pub fn resolve(declared: Option<&str>, bytes: &[u8]) -> Self {
        match declared {
            Some(raw) => Self::parse(raw).unwrap_or_else(|| {
                tracing::debug!("Declared media type {:?} is not an image type, sniffing", raw);
                Self::sniff(bytes)
            }),
            None => Self::sniff(bytes),
        }
    }

    pub fn fallback() -> Self {
        Self(FALLBACK_MEDIA_TYPE.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Subtype after `image/`, e.g. `svg+xml`.
    pub fn subtype(&self) -> &str {
        self.0.split_once('/').map(|(_, s)| s).unwrap_or_default()
    }

    /// File extension for saving: the subtype up to its first
    /// non-alphanumeric character.
    pub fn extension(&self) -> Option<&str> {
        let subtype = self.subtype();
        let end = subtype
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(subtype.len());
        let ext = &subtype[..end];
        (!ext.is_empty()).then_some(ext)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
