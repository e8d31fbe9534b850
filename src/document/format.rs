//! Document format detection
//!
//! The set of formats is closed. Detection is by file extension for local
//! files and URL paths; fetched pages without an extension fall back to the
//! response `Content-Type`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Declared format of a document, fixed at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentFormat {
    Pdf,
    Markdown,
    Html,
    Word,
    Plaintext,
    Code,
    StructuredApiSpec,
    Image,
}

impl DocumentFormat {
    /// Maps a file extension (without the dot, any case) to a format
    ///
    /// # Examples
    ///
    /// ```
    /// use docshop::DocumentFormat;
    ///
    /// assert_eq!(DocumentFormat::from_extension("MD"), Some(DocumentFormat::Markdown));
    /// assert_eq!(DocumentFormat::from_extension("kt"), Some(DocumentFormat::Code));
    /// assert_eq!(DocumentFormat::from_extension("xyz"), None);
    /// ```
    pub fn from_extension(ext: &str) -> Option<Self> {
        let format = match ext.to_ascii_lowercase().as_str() {
            "pdf" => Self::Pdf,
            "md" | "markdown" => Self::Markdown,
            "html" | "htm" => Self::Html,
            "docx" | "doc" => Self::Word,
            "txt" => Self::Plaintext,
            "swift" | "py" | "js" | "java" | "kt" | "cpp" | "c" | "h" => Self::Code,
            "yaml" | "yml" | "json" => Self::StructuredApiSpec,
            "png" | "jpg" | "jpeg" | "gif" | "bmp" | "tiff" => Self::Image,
            _ => return None,
        };
        Some(format)
    }

    /// Detects the format of a local path from its extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Detects the format from an HTTP `Content-Type` header value
    ///
    /// Parameters such as `; charset=utf-8` are ignored.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        let format = match mime.as_str() {
            "text/html" | "application/xhtml+xml" => Self::Html,
            "application/pdf" => Self::Pdf,
            "text/markdown" | "text/x-markdown" => Self::Markdown,
            "text/plain" => Self::Plaintext,
            "application/json" | "application/yaml" | "application/x-yaml" | "text/yaml"
            | "text/x-yaml" => Self::StructuredApiSpec,
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            | "application/msword" => Self::Word,
            m if m.starts_with("image/") => Self::Image,
            _ => return None,
        };
        Some(format)
    }

    /// Returns the stable string form used in graph properties
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::Word => "word",
            Self::Plaintext => "plaintext",
            Self::Code => "code",
            Self::StructuredApiSpec => "structured-api-spec",
            Self::Image => "image",
        }
    }

    /// Parses the string form produced by [`DocumentFormat::as_str`]
    pub fn parse(s: &str) -> Option<Self> {
        Self::all().into_iter().find(|f| f.as_str() == s)
    }

    /// Returns all formats
    pub fn all() -> Vec<Self> {
        vec![
            Self::Pdf,
            Self::Markdown,
            Self::Html,
            Self::Word,
            Self::Plaintext,
            Self::Code,
            Self::StructuredApiSpec,
            Self::Image,
        ]
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Language name for a source-code extension, used as a document tag
pub fn code_language(ext: &str) -> Option<&'static str> {
    let language = match ext.to_ascii_lowercase().as_str() {
        "swift" => "swift",
        "py" => "python",
        "js" => "javascript",
        "java" => "java",
        "kt" => "kotlin",
        "cpp" => "cpp",
        "c" | "h" => "c",
        _ => return None,
    };
    Some(language)
}
