#![forbid(unsafe_code)]

use certus_contracts::certificate::FILE_NAME_MAX_LEN;

pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png", "doc", "docx"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FileRuleViolation {
    #[error("file name must not be empty")]
    EmptyFileName,
    #[error("file name must be at most {max} characters")]
    FileNameTooLong { max: usize },
    #[error("file type '{0}' is not allowed; allowed: pdf, jpg, jpeg, png, doc, docx")]
    DisallowedExtension(String),
    #[error("file must not be empty")]
    EmptyFile,
    #[error("file is {got} bytes; the limit is {max} bytes")]
    TooLarge { max: u64, got: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadRulesConfig {
    pub max_upload_bytes: u64,
}

impl UploadRulesConfig {
    pub fn mvp_v1() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// Client file name reduced to its last path segment, plus the lowercase extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedFile {
    pub file_name: String,
    pub extension: String,
}

impl AcceptedFile {
    /// Content type implied by the extension. Used when the client sends none.
    pub fn implied_content_type(&self) -> &'static str {
        match self.extension.as_str() {
            "pdf" => "application/pdf",
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            "doc" => "application/msword",
            "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            _ => "application/octet-stream",
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadRules {
    config: UploadRulesConfig,
}

impl UploadRules {
    pub fn new(config: UploadRulesConfig) -> Self {
        Self { config }
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.config.max_upload_bytes
    }

    pub fn check(&self, raw_file_name: &str, size_bytes: u64) -> Result<AcceptedFile, FileRuleViolation> {
        let file_name = raw_file_name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        if file_name.is_empty() || file_name.chars().all(|c| c == '.') {
            return Err(FileRuleViolation::EmptyFileName);
        }
        if file_name.chars().count() > FILE_NAME_MAX_LEN {
            return Err(FileRuleViolation::FileNameTooLong {
                max: FILE_NAME_MAX_LEN,
            });
        }
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(FileRuleViolation::DisallowedExtension(extension));
        }
        if size_bytes == 0 {
            return Err(FileRuleViolation::EmptyFile);
        }
        if size_bytes > self.config.max_upload_bytes {
            return Err(FileRuleViolation::TooLarge {
                max: self.config.max_upload_bytes,
                got: size_bytes,
            });
        }
        Ok(AcceptedFile {
            file_name,
            extension,
        })
    }
}
