//! Pre-extracted document snippets supplied alongside a question.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Coarse document type, derived from the MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentKind {
    Pdf,
    Docx,
    Csv,
    Txt,
    Image,
    Unknown,
}

impl DocumentKind {
    /// Classify a MIME type. CSV is checked before generic text.
    pub fn from_content_type(content_type: &str) -> Self {
        let ct = content_type.to_lowercase();
        if ct.contains("pdf") {
            DocumentKind::Pdf
        } else if ct.contains("word") || ct.contains("docx") {
            DocumentKind::Docx
        } else if ct.contains("csv") {
            DocumentKind::Csv
        } else if ct.contains("text") {
            DocumentKind::Txt
        } else if ct.contains("image") {
            DocumentKind::Image
        } else {
            DocumentKind::Unknown
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DocumentKind::Pdf => "PDF",
            DocumentKind::Docx => "DOCX",
            DocumentKind::Csv => "CSV",
            DocumentKind::Txt => "TXT",
            DocumentKind::Image => "IMAGE",
            DocumentKind::Unknown => "UNKNOWN",
        };
        write!(f, "{s}")
    }
}

/// Plain text extracted from an uploaded file by an external processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSnippet {
    /// Usually the file name.
    pub label: String,
    pub content_type: String,
    pub text: String,
}

impl DocumentSnippet {
    pub fn new(
        label: impl Into<String>,
        content_type: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            content_type: content_type.into(),
            text: text.into(),
        }
    }

    pub fn kind(&self) -> DocumentKind {
        DocumentKind::from_content_type(&self.content_type)
    }

    /// Read a UTF-8 text file as a snippet, guessing the MIME type from its extension.
    pub async fn from_text_file(path: &Path) -> std::io::Result<Self> {
        let text = tokio::fs::read_to_string(path).await?;
        let label = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let content_type = match path.extension().and_then(|e| e.to_str()) {
            Some("csv") => "text/csv",
            Some("md") => "text/markdown",
            _ => "text/plain",
        };
        Ok(Self::new(label, content_type, text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_content_type() {
        assert_eq!(
            DocumentKind::from_content_type("application/pdf"),
            DocumentKind::Pdf
        );
        assert_eq!(
            DocumentKind::from_content_type(
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            ),
            DocumentKind::Docx
        );
        assert_eq!(DocumentKind::from_content_type("text/csv"), DocumentKind::Csv);
        assert_eq!(DocumentKind::from_content_type("text/plain"), DocumentKind::Txt);
        assert_eq!(DocumentKind::from_content_type("image/png"), DocumentKind::Image);
        assert_eq!(
            DocumentKind::from_content_type("application/zip"),
            DocumentKind::Unknown
        );
    }

    #[tokio::test]
    async fn test_from_text_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "a,b\n1,2\n").unwrap();

        let snippet = DocumentSnippet::from_text_file(&path).await.unwrap();
        assert_eq!(snippet.label, "data.csv");
        assert_eq!(snippet.kind(), DocumentKind::Csv);
        assert_eq!(snippet.text, "a,b\n1,2\n");
    }
}
