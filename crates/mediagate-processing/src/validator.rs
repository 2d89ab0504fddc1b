/// Common validation errors for uploaded media
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: usize, max: usize },

    #[error("Invalid content type: {content_type} (allowed: {allowed:?})")]
    InvalidContentType {
        content_type: String,
        allowed: Vec<String>,
    },

    #[error("Empty file")]
    EmptyFile,
}

/// Media upload validator
///
/// Checks what can be checked before a payload is decoded: its size and, for
/// uploads that declare one, its MIME type. Allowed types are exact
/// (`image/png`) or wildcards over a top-level type (`image/*`).
#[derive(Debug, Clone)]
pub struct MediaValidator {
    max_file_size: usize,
    allowed_content_types: Vec<String>,
}

impl MediaValidator {
    pub fn new(max_file_size: usize, allowed_content_types: Vec<String>) -> Self {
        Self {
            max_file_size,
            allowed_content_types,
        }
    }

    /// Validator for photos and image documents.
    pub fn for_images(max_file_size: usize) -> Self {
        Self::new(max_file_size, vec!["image/*".to_string()])
    }

    /// Validator for audio attachments and voice notes.
    pub fn for_audio(max_file_size: usize) -> Self {
        Self::new(
            max_file_size,
            vec!["audio/*".to_string(), "application/ogg".to_string()],
        )
    }

    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    /// Validate file size
    pub fn validate_file_size(&self, size: usize) -> Result<(), ValidationError> {
        if size == 0 {
            return Err(ValidationError::EmptyFile);
        }

        if size > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size,
                max: self.max_file_size,
            });
        }

        Ok(())
    }

    /// Validate content type
    pub fn validate_content_type(&self, content_type: &str) -> Result<(), ValidationError> {
        // Drop parameters such as "; charset=binary"
        let normalized = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();

        let allowed = self
            .allowed_content_types
            .iter()
            .any(|ct| match ct.strip_suffix("/*") {
                Some(top_level) => normalized
                    .split_once('/')
                    .is_some_and(|(t, sub)| t == top_level && !sub.is_empty()),
                None => ct == &normalized,
            });

        if !allowed {
            return Err(ValidationError::InvalidContentType {
                content_type: content_type.to_string(),
                allowed: self.allowed_content_types.clone(),
            });
        }

        Ok(())
    }

    /// Validate size and, if declared, content type.
    pub fn validate(&self, size: usize, content_type: Option<&str>) -> Result<(), ValidationError> {
        if let Some(ct) = content_type {
            self.validate_content_type(ct)?;
        }
        self.validate_file_size(size)
    }
}
