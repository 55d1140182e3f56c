use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde::{Serialize, Serializer};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use uuid::Uuid;

pub const MAX_PHOTO_BYTES: u64 = 5 * 1024 * 1024;
pub const ACCEPTED_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp"];

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("unable to read {name}: {reason}")]
    Read { name: String, reason: String },
    #[error("encoding task for {name} aborted: {reason}")]
    Aborted { name: String, reason: String },
}

/// Upload written to the spool directory; the file is removed with the last reference.
#[derive(Debug)]
pub struct SpooledPath(PathBuf);

impl SpooledPath {
    pub fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for SpooledPath {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

/// Where the raw bytes of a selected file live.
#[derive(Debug, Clone)]
pub enum FileSource {
    Memory(Arc<Vec<u8>>),
    Spooled(Arc<SpooledPath>),
}

/// A file picked by the seller, before any staging decision.
#[derive(Debug, Clone)]
pub struct PhotoFile {
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub source: FileSource,
}

impl PhotoFile {
    pub fn from_bytes(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size_bytes: bytes.len() as u64,
            source: FileSource::Memory(Arc::new(bytes)),
        }
    }

    /// Moves in-memory bytes to `dir` so the session only keeps a path until finalize.
    pub async fn spool(self, dir: &Path) -> std::io::Result<Self> {
        let bytes = match &self.source {
            FileSource::Memory(bytes) => Some(Arc::clone(bytes)),
            FileSource::Spooled(_) => None,
        };
        let Some(bytes) = bytes else {
            return Ok(self);
        };
        let path = dir.join(format!("{}.upload", Uuid::new_v4()));
        tokio::fs::write(&path, bytes.as_slice()).await?;
        Ok(Self {
            source: FileSource::Spooled(Arc::new(SpooledPath::new(path))),
            ..self
        })
    }

    /// Staging gate: accepted image types only, at most [`MAX_PHOTO_BYTES`].
    pub fn rejection_reason(&self) -> Option<String> {
        let mime = self.mime_type.trim().to_ascii_lowercase();
        if !ACCEPTED_MIME_TYPES.contains(&mime.as_str()) {
            return Some(format!(
                "{} is not an accepted image type (expected JPEG, PNG or WebP, got `{}`)",
                self.name, self.mime_type
            ));
        }
        if self.size_bytes > MAX_PHOTO_BYTES {
            return Some(format!(
                "{} is {:.1} MB, above the 5 MB limit",
                self.name,
                self.size_bytes as f64 / (1024.0 * 1024.0)
            ));
        }
        None
    }

    pub async fn read_bytes(&self) -> Result<Arc<Vec<u8>>, EncodeError> {
        match &self.source {
            FileSource::Memory(bytes) => Ok(Arc::clone(bytes)),
            FileSource::Spooled(spooled) => tokio::fs::read(spooled.path())
                .await
                .map(Arc::new)
                .map_err(|err| EncodeError::Read {
                    name: self.name.clone(),
                    reason: err.to_string(),
                }),
        }
    }
}

/// Transmission form of one photo slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoPayload {
    /// Previously uploaded photo, kept by reference.
    Remote(String),
    /// Self-contained `data:<mime>;base64,...` URI.
    DataUri(String),
    /// Local preview reference reused after the raw bytes could not be read.
    Fallback(String),
}

impl PhotoPayload {
    pub fn as_str(&self) -> &str {
        match self {
            PhotoPayload::Remote(value)
            | PhotoPayload::DataUri(value)
            | PhotoPayload::Fallback(value) => value,
        }
    }
}

impl Serialize for PhotoPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

pub fn data_uri(mime_type: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime_type.trim().to_ascii_lowercase(),
        BASE64.encode(bytes)
    )
}

pub async fn encode_file(file: &PhotoFile) -> Result<PhotoPayload, EncodeError> {
    let bytes = file.read_bytes().await?;
    Ok(PhotoPayload::DataUri(data_uri(&file.mime_type, &bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_file_encodes_to_data_uri() {
        let file = PhotoFile::from_bytes("a.png", "image/png", vec![1, 2, 3]);
        let payload = encode_file(&file).await.expect("encode");
        assert_eq!(payload, PhotoPayload::DataUri("data:image/png;base64,AQID".into()));
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            serde_json::json!("data:image/png;base64,AQID")
        );
    }

    #[test]
    fn rejects_wrong_type_and_oversized_files() {
        let pdf = PhotoFile::from_bytes("doc.pdf", "application/pdf", vec![0; 10]);
        assert!(pdf.rejection_reason().unwrap().contains("doc.pdf"));

        let mut big = PhotoFile::from_bytes("big.jpg", "image/jpeg", Vec::new());
        big.size_bytes = MAX_PHOTO_BYTES + 1;
        assert!(big.rejection_reason().unwrap().contains("5 MB"));

        let ok = PhotoFile::from_bytes("ok.webp", "IMAGE/WEBP", vec![0; 10]);
        assert!(ok.rejection_reason().is_none());
    }

    #[tokio::test]
    async fn missing_spool_file_reports_read_error() {
        let file = PhotoFile {
            name: "ghost.jpg".into(),
            mime_type: "image/jpeg".into(),
            size_bytes: 10,
            source: FileSource::Spooled(Arc::new(SpooledPath::new(PathBuf::from(
                "/nonexistent/ghost.jpg",
            )))),
        };
        let err = encode_file(&file).await.expect_err("should fail");
        assert!(matches!(err, EncodeError::Read { .. }));
    }

    #[tokio::test]
    async fn spooled_file_encodes_and_is_removed_on_drop() {
        let file = PhotoFile::from_bytes("a.png", "image/png", vec![1, 2, 3])
            .spool(&std::env::temp_dir())
            .await
            .expect("spool");
        let FileSource::Spooled(spooled) = &file.source else {
            panic!("expected a spooled file");
        };
        let path = spooled.path().to_path_buf();
        assert!(path.exists());

        let payload = encode_file(&file).await.expect("encode");
        assert_eq!(payload.as_str(), "data:image/png;base64,AQID");

        drop(file);
        assert!(!path.exists());
    }
}
