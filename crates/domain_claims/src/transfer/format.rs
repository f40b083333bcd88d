//! File format selection

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use super::error::FormatError;

/// Supported transfer formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    /// Pipe-delimited text with a header row
    Csv,
    /// Array of objects
    Json,
}

impl FileFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Json => "json",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            FileFormat::Csv => "text/csv; charset=utf-8",
            FileFormat::Json => "application/json",
        }
    }

    /// Format implied by a filename's extension, if it names one
    pub fn from_filename(filename: &str) -> Option<Self> {
        let extension = Path::new(filename).extension()?.to_str()?;
        extension.parse().ok()
    }

    /// Guesses the format from content: a leading `[` or `{` means JSON
    pub fn sniff(bytes: &[u8]) -> Self {
        let first = bytes
            .strip_prefix(b"\xEF\xBB\xBF")
            .unwrap_or(bytes)
            .iter()
            .find(|b| !b.is_ascii_whitespace());
        match first {
            Some(b'[') | Some(b'{') => FileFormat::Json,
            _ => FileFormat::Csv,
        }
    }

    /// Picks the format of an uploaded file
    ///
    /// A declared format wins, but must agree with a recognised filename
    /// extension. Without one the extension decides, then the content.
    pub fn detect(
        declared: Option<FileFormat>,
        filename: Option<&str>,
        bytes: &[u8],
    ) -> Result<Self, FormatError> {
        let from_name = filename.and_then(Self::from_filename);
        match (declared, from_name) {
            (Some(declared), Some(named)) if declared != named => {
                Err(FormatError::FormatMismatch {
                    declared,
                    filename: filename.unwrap_or_default().to_string(),
                })
            }
            (Some(declared), _) => Ok(declared),
            (None, Some(named)) => Ok(named),
            (None, None) => Ok(Self::sniff(bytes)),
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for FileFormat {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(FileFormat::Csv),
            "json" => Ok(FileFormat::Json),
            other => Err(FormatError::UnknownFormat(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_format_must_match_extension() {
        let result = FileFormat::detect(Some(FileFormat::Json), Some("claims.csv"), b"id|x");
        assert!(matches!(result, Err(FormatError::FormatMismatch { .. })));

        let result = FileFormat::detect(Some(FileFormat::Csv), Some("claims.txt"), b"[]");
        assert_eq!(result, Ok(FileFormat::Csv));
    }

    #[test]
    fn test_extension_then_content() {
        assert_eq!(
            FileFormat::detect(None, Some("export.JSON"), b"id|"),
            Ok(FileFormat::Json)
        );
        assert_eq!(FileFormat::detect(None, None, b"  \n[{}]"), Ok(FileFormat::Json));
        assert_eq!(FileFormat::detect(None, None, b"# export_date"), Ok(FileFormat::Csv));
    }
}
