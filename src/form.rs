//! Form inputs: the selected file and the class count field

use std::path::{Path, PathBuf};

use crate::error::{ClientError, Result};

/// A file chosen for upload. Content is read at submit time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    path: PathBuf,
    file_name: String,
}

impl SelectedFile {
    /// Pick a file from disk. Only checks that the path names a regular file.
    pub async fn pick(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await.map_err(|e| {
            ClientError::InvalidInput(format!("cannot open {}: {}", path.display(), e))
        })?;

        if !metadata.is_file() {
            return Err(ClientError::InvalidInput(format!(
                "{} is not a file",
                path.display()
            )));
        }

        Ok(Self::new(path.to_path_buf()))
    }

    pub fn new(path: PathBuf) -> Self {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.csv".to_string());

        Self { path, file_name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name sent in the multipart `filename` parameter
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub async fn read(&self) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(&self.path).await?)
    }
}

/// Raw text of the class count field together with its parsed value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassCount {
    raw: String,
    value: Option<i64>,
}

impl ClassCount {
    pub fn parse(text: &str) -> Self {
        Self {
            raw: text.to_string(),
            value: parse_leading_int(text),
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Parsed value, `None` when the text does not start with a number
    pub fn value(&self) -> Option<i64> {
        self.value
    }

    /// Positive value usable for a sort request
    pub fn positive(&self) -> Option<i64> {
        self.value.filter(|n| *n > 0)
    }
}

/// Base-10 integer prefix parse: optional leading whitespace and sign,
/// then digits up to the first non-digit ("12 classes" -> 12, "3.5" -> 3).
/// Digit runs too long for `i64` saturate instead of failing.
pub fn parse_leading_int(text: &str) -> Option<i64> {
    let trimmed = text.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let digits_len = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits_len == 0 {
        return None;
    }

    // Only digits remain, so the parse can fail on overflow alone
    let magnitude: i64 = rest[..digits_len].parse().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}
