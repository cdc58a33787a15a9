use base64::Engine;
use std::path::Path;

use crate::error::ChatError;

const IMAGE_TYPES: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
];

/// Turns attached files into something a request can carry.
pub trait ContextExtractor: Send + Sync {
    /// Extract the readable text of a document.
    fn extract_text(&self, path: &Path) -> Result<String, ChatError>;

    /// Base64-encode an image file.
    fn encode_image(&self, path: &Path) -> Result<String, ChatError>;
}

/// Reads straight from the filesystem. Documents are read as UTF-8 text,
/// invalid sequences replaced.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsExtractor;

impl ContextExtractor for FsExtractor {
    fn extract_text(&self, path: &Path) -> Result<String, ChatError> {
        let bytes = std::fs::read(path)
            .map_err(|e| ChatError::extraction(path.display().to_string(), e.to_string()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn encode_image(&self, path: &Path) -> Result<String, ChatError> {
        let bytes = std::fs::read(path)
            .map_err(|e| ChatError::extraction(path.display().to_string(), e.to_string()))?;
        Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}

pub fn media_type_for(path: &Path) -> Option<&'static str> {
    let ext = extension(path)?;
    IMAGE_TYPES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, mime)| *mime)
}

pub fn is_image_path(path: &Path) -> bool {
    media_type_for(path).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_image_detection_is_case_insensitive() {
        assert!(is_image_path(Path::new("photo.JPG")));
        assert_eq!(media_type_for(Path::new("a.jpeg")), Some("image/jpeg"));
        assert_eq!(media_type_for(Path::new("a.webp")), Some("image/webp"));
        assert!(!is_image_path(Path::new("notes.md")));
        assert!(!is_image_path(Path::new("Makefile")));
    }

    #[test]
    fn test_fs_extractor_reads_and_encodes() {
        let dir = TempDir::new().unwrap();
        let text_path = dir.path().join("a.txt");
        let image_path = dir.path().join("b.png");
        std::fs::write(&text_path, "hello").unwrap();
        std::fs::write(&image_path, [0u8, 1, 2]).unwrap();

        let extractor = FsExtractor;
        assert_eq!(extractor.extract_text(&text_path).unwrap(), "hello");
        assert_eq!(extractor.encode_image(&image_path).unwrap(), "AAEC");
    }

    #[test]
    fn test_missing_file_is_extraction_error() {
        let err = FsExtractor
            .extract_text(Path::new("/definitely/not/here.txt"))
            .unwrap_err();
        assert!(matches!(err, ChatError::Extraction { .. }));
    }
}
