//! The single pending file queued for the next send.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;
pub const MAX_CSV_BYTES: u64 = 5 * 1024 * 1024;

const IMAGE_EXTENSIONS: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("bmp", "image/bmp"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Csv,
}

impl AttachmentKind {
    /// Classify a file name by extension. `None` means unsupported.
    pub fn detect(file_name: &str) -> Option<Self> {
        if image_mime(file_name).is_some() {
            Some(AttachmentKind::Image)
        } else if file_name.to_lowercase().ends_with(".csv") {
            Some(AttachmentKind::Csv)
        } else {
            None
        }
    }

    pub fn max_bytes(&self) -> u64 {
        match self {
            AttachmentKind::Image => MAX_IMAGE_BYTES,
            AttachmentKind::Csv => MAX_CSV_BYTES,
        }
    }

    /// Status text shown once a file of this kind is queued.
    pub fn ready_message(&self) -> &'static str {
        match self {
            AttachmentKind::Image => "Image ready to send",
            AttachmentKind::Csv => "CSV file ready to analyze",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AttachmentKind::Image => "image",
            AttachmentKind::Csv => "csv",
        }
    }
}

/// MIME type for a supported image file name.
pub fn image_mime(file_name: &str) -> Option<&'static str> {
    let ext = Path::new(file_name).extension()?.to_str()?.to_lowercase();
    IMAGE_EXTENSIONS
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, mime)| *mime)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub kind: AttachmentKind,
}

impl Attachment {
    /// Build an attachment from its parts, enforcing the per-kind size limit.
    pub fn new(
        path: impl Into<PathBuf>,
        size: u64,
        kind: AttachmentKind,
    ) -> Result<Self, ValidationError> {
        let path = path.into();
        if size > kind.max_bytes() {
            return Err(match kind {
                AttachmentKind::Image => ValidationError::ImageTooLarge,
                AttachmentKind::Csv => ValidationError::CsvTooLarge,
            });
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self {
            path,
            name,
            size,
            kind,
        })
    }

    /// Inspect a file on disk, detect its kind and enforce the size limit.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ValidationError> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or(ValidationError::UnsupportedFile)?;
        let kind = AttachmentKind::detect(file_name).ok_or(ValidationError::UnsupportedFile)?;
        let metadata = std::fs::metadata(path)
            .map_err(|e| ValidationError::Unreadable(format!("{}: {}", path.display(), e)))?;
        if !metadata.is_file() {
            return Err(ValidationError::Unreadable(format!(
                "{} is not a file",
                path.display()
            )));
        }
        Self::new(path, metadata.len(), kind)
    }

    /// Like [`Attachment::from_path`] but the caller already chose the kind
    /// (the image and CSV pickers). The kind must still match the extension.
    pub fn from_path_as(
        path: impl AsRef<Path>,
        expected: AttachmentKind,
    ) -> Result<Self, ValidationError> {
        let attachment = Self::from_path(path)?;
        if attachment.kind != expected {
            return Err(ValidationError::UnsupportedFile);
        }
        Ok(attachment)
    }

    /// MIME type sent with the multipart file part.
    pub fn mime(&self) -> &'static str {
        match self.kind {
            AttachmentKind::Image => image_mime(&self.name).unwrap_or("application/octet-stream"),
            AttachmentKind::Csv => "text/csv",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn detects_kinds_by_extension() {
        assert_eq!(AttachmentKind::detect("photo.PNG"), Some(AttachmentKind::Image));
        assert_eq!(AttachmentKind::detect("cat.jpeg"), Some(AttachmentKind::Image));
        assert_eq!(AttachmentKind::detect("sales.CSV"), Some(AttachmentKind::Csv));
        assert_eq!(AttachmentKind::detect("notes.txt"), None);
        assert_eq!(AttachmentKind::detect("no_extension"), None);
    }

    #[test]
    fn size_limits_are_per_kind() {
        assert_eq!(
            Attachment::new("big.png", MAX_IMAGE_BYTES + 1, AttachmentKind::Image),
            Err(ValidationError::ImageTooLarge)
        );
        assert_eq!(
            Attachment::new("big.csv", MAX_CSV_BYTES + 1, AttachmentKind::Csv),
            Err(ValidationError::CsvTooLarge)
        );
        // An image of 6MB is fine even though it would be too large as a CSV
        assert!(Attachment::new("ok.png", 6 * 1024 * 1024, AttachmentKind::Image).is_ok());
    }

    #[test]
    fn from_path_reads_metadata() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "a,b\n1,2").unwrap();

        let attachment = Attachment::from_path(&path).unwrap();
        assert_eq!(attachment.name, "data.csv");
        assert_eq!(attachment.kind, AttachmentKind::Csv);
        assert_eq!(attachment.size, 8);
        assert_eq!(attachment.mime(), "text/csv");
    }

    #[test]
    fn from_path_as_rejects_mismatched_kind() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "a,b").unwrap();
        assert_eq!(
            Attachment::from_path_as(&path, AttachmentKind::Image),
            Err(ValidationError::UnsupportedFile)
        );
    }

    #[test]
    fn missing_file_is_unreadable() {
        let err = Attachment::from_path("/definitely/not/here.png").unwrap_err();
        assert!(matches!(err, ValidationError::Unreadable(_)));
    }
}
