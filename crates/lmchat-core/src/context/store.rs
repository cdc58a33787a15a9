use std::path::Path;

use crate::context::extract::{is_image_path, media_type_for, ContextExtractor};
use crate::error::ChatError;

/// An attached image, already base64 encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    pub media_type: String,
    pub data: String,
}

impl ImageAttachment {
    pub fn new(media_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            media_type: media_type.into(),
            data: data.into(),
        }
    }

    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data)
    }
}

/// Where an attachment ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attached {
    File,
    Image,
    /// An attachment with that name was already present.
    Duplicate,
}

/// Files and images attached to the active conversation.
///
/// Both maps keep insertion order and are keyed by attachment name. The first
/// attachment with a given name wins; later ones are ignored. Nothing here is
/// persisted with the conversation.
#[derive(Debug, Clone, Default)]
pub struct ContextStore {
    files: Vec<(String, String)>,
    images: Vec<(String, ImageAttachment)>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if a file with this name is already attached.
    pub fn add_file(&mut self, name: impl Into<String>, text: impl Into<String>) -> bool {
        let name = name.into();
        if self.files.iter().any(|(n, _)| *n == name) {
            return false;
        }
        self.files.push((name, text.into()));
        true
    }

    /// Returns false if an image with this name is already attached.
    pub fn add_image(&mut self, name: impl Into<String>, image: ImageAttachment) -> bool {
        let name = name.into();
        if self.images.iter().any(|(n, _)| *n == name) {
            return false;
        }
        self.images.push((name, image));
        true
    }

    /// Read a file from disk and attach it as text or as an image depending
    /// on its extension.
    pub fn attach_path(
        &mut self,
        extractor: &dyn ContextExtractor,
        path: &Path,
    ) -> Result<Attached, ChatError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ChatError::extraction(path.display().to_string(), "not a file"))?;

        if is_image_path(path) {
            if self.has_image(&name) {
                return Ok(Attached::Duplicate);
            }
            let data = extractor.encode_image(path)?;
            let media_type = media_type_for(path).unwrap_or("image/jpeg");
            self.add_image(name, ImageAttachment::new(media_type, data));
            Ok(Attached::Image)
        } else {
            if self.has_file(&name) {
                return Ok(Attached::Duplicate);
            }
            let text = extractor.extract_text(path)?;
            tracing::debug!("Attached {} ({} chars)", name, text.chars().count());
            self.add_file(name, text);
            Ok(Attached::File)
        }
    }

    pub fn has_file(&self, name: &str) -> bool {
        self.files.iter().any(|(n, _)| n == name)
    }

    pub fn has_image(&self, name: &str) -> bool {
        self.images.iter().any(|(n, _)| n == name)
    }

    pub fn remove_file(&mut self, name: &str) -> bool {
        let before = self.files.len();
        self.files.retain(|(n, _)| n != name);
        self.files.len() != before
    }

    pub fn remove_image(&mut self, name: &str) -> bool {
        let before = self.images.len();
        self.images.retain(|(n, _)| n != name);
        self.images.len() != before
    }

    pub fn files(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().map(|(n, t)| (n.as_str(), t.as_str()))
    }

    pub fn images(&self) -> impl Iterator<Item = (&str, &ImageAttachment)> {
        self.images.iter().map(|(n, i)| (n.as_str(), i))
    }

    pub fn has_files(&self) -> bool {
        !self.files.is_empty()
    }

    pub fn has_images(&self) -> bool {
        !self.images.is_empty()
    }

    /// Total number of attachments.
    pub fn len(&self) -> usize {
        self.files.len() + self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.images.is_empty()
    }

    pub fn clear(&mut self) {
        self.files.clear();
        self.images.clear();
    }

    /// One line per attachment, e.g. `notes.md (1204 chars)`.
    pub fn summary(&self) -> Vec<String> {
        self.files
            .iter()
            .map(|(name, text)| format!("{} ({} chars)", name, text.chars().count()))
            .chain(self.images.iter().map(|(name, image)| format!("{} ({})", name, image.media_type)))
            .collect()
    }
}
