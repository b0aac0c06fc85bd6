use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fmt;
use std::path::Path;

/// A self-describing image payload: `data:<mime>;base64,<data>`.
///
/// The payload is kept in its encoded form so it can be handed to the model APIs as-is.
#[derive(Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime_type: String,
    pub data: String,
}

impl DataUri {
    pub fn new(mime_type: &str, data: &str) -> Self {
        Self {
            mime_type: mime_type.to_string(),
            data: data.to_string(),
        }
    }

    pub fn from_bytes(mime_type: &str, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.to_string(),
            data: STANDARD.encode(bytes),
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        let rest = s
            .trim()
            .strip_prefix("data:")
            .ok_or_else(|| anyhow!("Not a data URI"))?;
        let (header, data) = rest
            .split_once(',')
            .ok_or_else(|| anyhow!("Data URI has no payload"))?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| anyhow!("Only base64 data URIs are supported"))?;
        if mime_type.is_empty() {
            return Err(anyhow!("Data URI has no MIME type"));
        }
        Ok(Self::new(mime_type, data))
    }

    pub async fn from_file(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mime = mime_guess::from_path(path)
            .first()
            .ok_or_else(|| anyhow!("Cannot tell the image type of {}", path.display()))?;
        if mime.type_() != mime_guess::mime::IMAGE {
            return Err(anyhow!("{} is not an image ({})", path.display(), mime));
        }
        Ok(Self::from_bytes(mime.essence_str(), &bytes))
    }

    pub fn decode(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(self.data.as_bytes())
            .context("Invalid base64 payload")
    }

    /// File extension matching the MIME type, `bin` when unknown.
    pub fn extension(&self) -> &'static str {
        mime_guess::get_mime_extensions_str(&self.mime_type)
            .and_then(|exts| {
                // Prefer the short common form, e.g. "jpg" over "jpe".
                exts.iter().find(|e| **e == "jpg" || **e == "png").or(exts.first())
            })
            .copied()
            .unwrap_or("bin")
    }
}

impl fmt::Display for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{};base64,{}", self.mime_type, self.data)
    }
}

// Payloads are large; keep them out of debug logs.
impl fmt::Debug for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataUri({}, {} bytes)", self.mime_type, self.data.len())
    }
}
