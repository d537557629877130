//! Upload pipeline: classify a raw file, send it to the backend's
//! upload/embed/search endpoint and hand back the normalized hits.
//!
//! No local embedding, resizing or retries happen here.

use std::{path::Path, sync::Arc};

use crate::{
    app::{SearchBackend, SearchError},
    results::ResultItem,
    session::Mode,
};

/// Image subtypes the embedding model accepts.
const SUPPORTED_IMAGE_SUBTYPES: &[&str] = &["bmp", "gif", "jpeg", "jpg", "png"];

/// Default ceiling for video uploads (the backend rejects anything larger).
pub const DEFAULT_MAX_VIDEO_BYTES: u64 = 20 * 1024 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn endpoint(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }

    pub fn mode(&self) -> Mode {
        match self {
            MediaKind::Image => Mode::Image,
            MediaKind::Video => Mode::Video,
        }
    }
}

/// A file picked or dropped by the user, with its declared content type.
#[derive(Clone)]
pub struct MediaFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for MediaFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaFile")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl MediaFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Read a file from disk. The content type comes from the extension and,
    /// failing that, from the file's magic bytes.
    pub fn from_path(path: &Path) -> Result<Self, SearchError> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload".to_string());

        let content_type = mime_guess::from_path(path)
            .first()
            .map(|mime| mime.essence_str().to_string())
            .or_else(|| infer::get(&bytes).map(|kind| kind.mime_type().to_string()))
            .unwrap_or_else(|| "application/octet-stream".to_string());

        Ok(Self::new(name, content_type, bytes))
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Successful pipeline run.
#[derive(Clone, Debug)]
pub struct UploadOutcome {
    pub kind: MediaKind,
    pub results: Vec<ResultItem>,
}

#[derive(Clone)]
pub struct UploadPipeline {
    backend: Arc<dyn SearchBackend>,
    max_video_bytes: u64,
}

impl UploadPipeline {
    pub fn new(backend: Arc<dyn SearchBackend>, max_video_bytes: u64) -> Self {
        Self {
            backend,
            max_video_bytes,
        }
    }

    /// Decide which endpoint a file goes to, or reject it before any network call.
    pub fn classify(&self, file: &MediaFile) -> Result<MediaKind, SearchError> {
        if file.is_empty() {
            return Err(SearchError::validation(format!("{} is empty.", file.name)));
        }

        let content_type = file.content_type.to_lowercase();
        let (top, sub) = content_type.split_once('/').unwrap_or((content_type.as_str(), ""));

        match top {
            "image" => {
                if !SUPPORTED_IMAGE_SUBTYPES.contains(&sub) {
                    return Err(SearchError::validation(
                        "We only support BMP, GIF, JPG, JPEG, and PNG for images. Please upload a valid image file.",
                    ));
                }
                Ok(MediaKind::Image)
            }
            "video" => {
                if file.len() > self.max_video_bytes {
                    return Err(SearchError::validation(format!(
                        "We don't support videos greater than {} MB. Please upload a smaller video.",
                        self.max_video_bytes / (1024 * 1024)
                    )));
                }
                Ok(MediaKind::Video)
            }
            _ => Err(SearchError::validation(
                "We only support images and videos. Please upload a valid file.",
            )),
        }
    }

    pub async fn run(&self, file: &MediaFile) -> Result<UploadOutcome, SearchError> {
        let kind = self.classify(file)?;
        log::debug!(
            "uploading {} ({}, {} bytes) as {kind:?}",
            file.name,
            file.content_type,
            file.len()
        );

        let results = self.backend.search_media(kind, file).await?;

        Ok(UploadOutcome { kind, results })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::mocks::MockBackend;
    use std::io::Write;

    fn pipeline(backend: Arc<MockBackend>) -> UploadPipeline {
        UploadPipeline::new(backend, DEFAULT_MAX_VIDEO_BYTES)
    }

    #[test]
    fn test_classify_by_content_type() {
        let p = pipeline(Arc::new(MockBackend::default()));

        let png = MediaFile::new("a.png", "image/png", vec![1]);
        let mp4 = MediaFile::new("a.mp4", "video/mp4", vec![1]);
        let jpeg = MediaFile::new("a.JPG", "IMAGE/JPEG", vec![1]);

        assert_eq!(p.classify(&png).unwrap(), MediaKind::Image);
        assert_eq!(p.classify(&mp4).unwrap(), MediaKind::Video);
        assert_eq!(p.classify(&jpeg).unwrap(), MediaKind::Image);
    }

    #[test]
    fn test_rejects_unsupported_types() {
        let p = pipeline(Arc::new(MockBackend::default()));

        let pdf = MediaFile::new("a.pdf", "application/pdf", vec![1]);
        let webp = MediaFile::new("a.webp", "image/webp", vec![1]);
        let empty = MediaFile::new("a.png", "image/png", vec![]);

        assert!(matches!(p.classify(&pdf), Err(SearchError::Validation(_))));
        assert!(matches!(p.classify(&webp), Err(SearchError::Validation(_))));
        assert!(matches!(p.classify(&empty), Err(SearchError::Validation(_))));
    }

    #[test]
    fn test_rejects_oversized_video() {
        let p = UploadPipeline::new(Arc::new(MockBackend::default()), 8);
        let big = MediaFile::new("a.mp4", "video/mp4", vec![0; 9]);

        let err = p.classify(&big).unwrap_err();
        assert!(err.user_message().contains("videos greater than"));
    }

    #[tokio::test]
    async fn test_validation_skips_network() {
        let backend = Arc::new(MockBackend::default());
        let p = pipeline(backend.clone());

        let txt = MediaFile::new("notes.txt", "text/plain", vec![1, 2, 3]);
        assert!(p.run(&txt).await.is_err());
        assert_eq!(backend.media_calls(), 0);
    }

    #[tokio::test]
    async fn test_run_dispatches_to_backend() {
        let backend = Arc::new(MockBackend::default());
        backend.push_media(Ok(vec![crate::tests::mocks::video_item("clip.mp4", 12.0)]));
        let p = pipeline(backend.clone());

        let mp4 = MediaFile::new("query.mp4", "video/mp4", vec![1, 2, 3]);
        let outcome = p.run(&mp4).await.unwrap();

        assert_eq!(outcome.kind, MediaKind::Video);
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(backend.media_calls(), 1);
    }

    #[test]
    fn test_from_path_guesses_content_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sock.png");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"\x89PNG\r\n\x1a\n0000")
            .unwrap();

        let file = MediaFile::from_path(&path).unwrap();
        assert_eq!(file.name, "sock.png");
        assert_eq!(file.content_type, "image/png");
    }

    #[test]
    fn test_from_path_sniffs_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sock");
        let mut png = b"\x89PNG\r\n\x1a\n".to_vec();
        png.extend_from_slice(&[0u8; 16]);
        std::fs::write(&path, &png).unwrap();

        let file = MediaFile::from_path(&path).unwrap();
        assert_eq!(file.content_type, "image/png");
    }
}
