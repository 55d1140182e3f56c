use crate::photos::{
    encode::{EncodeError, PhotoFile, PhotoPayload, encode_file},
    preview::{PreviewHandle, PreviewRegistry},
};
use serde::Serialize;
use std::{collections::HashMap, sync::Arc, time::Instant};
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, warn};
use uuid::Uuid;

pub const MAX_PHOTOS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhotoStatus {
    Staged,
    Encoding,
    Ready,
    Failed,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CapacityError {
    #[error("adding {requested} photo(s) to {current} would exceed the limit of {limit}")]
    TooMany {
        current: usize,
        requested: usize,
        limit: usize,
    },
    #[error("no photo at position {index} (have {len})")]
    OutOfRange { index: usize, len: usize },
}

#[derive(Debug)]
pub struct Photo {
    id: Uuid,
    file: Option<PhotoFile>,
    preview: Option<PreviewHandle>,
    payload: Option<PhotoPayload>,
    status: PhotoStatus,
    error: Option<String>,
}

impl Photo {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn status(&self) -> PhotoStatus {
        self.status
    }

    pub fn payload(&self) -> Option<&PhotoPayload> {
        self.payload.as_ref()
    }

    pub fn preview_url(&self) -> Option<&str> {
        self.preview.as_ref().map(PreviewHandle::url)
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn view(&self, index: usize) -> PhotoView {
        PhotoView {
            id: self.id(),
            index,
            is_cover: index == 0,
            name: self.file.as_ref().map(|file| file.name.clone()),
            status: self.status(),
            preview_url: self
                .preview_url()
                .map(str::to_string)
                .or_else(|| match self.payload() {
                    Some(PhotoPayload::Remote(url)) => Some(url.clone()),
                    _ => None,
                }),
            has_payload: self.payload().is_some(),
            error: self.error().map(str::to_string),
        }
    }
}

/// Serializable projection of one slot in the photo sequence.
#[derive(Debug, Clone, Serialize)]
pub struct PhotoView {
    pub id: Uuid,
    pub index: usize,
    pub is_cover: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub status: PhotoStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    pub has_payload: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RejectedFile {
    pub name: String,
    pub status: PhotoStatus,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AddReport {
    pub accepted: Vec<Uuid>,
    pub rejected: Vec<RejectedFile>,
}

/// Outcome of one encoding task, keyed by the photo it was started for.
#[derive(Debug)]
pub struct EncodeOutcome {
    photo_id: Uuid,
    result: Result<PhotoPayload, EncodeError>,
}

/// In-flight encodings detached from the stager so removals can proceed meanwhile.
pub struct FinalizeBatch {
    tasks: JoinSet<EncodeOutcome>,
    started: Instant,
}

impl FinalizeBatch {
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Waits until every photo in the batch is either encoded or failed.
    pub async fn settle(mut self) -> Vec<EncodeOutcome> {
        let mut outcomes = Vec::with_capacity(self.tasks.len());
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => warn!(target = "wizard.photos", error = %err, "encode_task_aborted"),
            }
        }
        crate::metrics::finalize_elapsed(self.started.elapsed());
        outcomes
    }
}

/// Bounded, ordered photo sequence. Position 0 is the cover image.
#[derive(Debug)]
pub struct PhotoStager {
    photos: Vec<Photo>,
    previews: Arc<PreviewRegistry>,
}

impl Default for PhotoStager {
    fn default() -> Self {
        Self::new(PreviewRegistry::new())
    }
}

impl PhotoStager {
    pub fn new(previews: Arc<PreviewRegistry>) -> Self {
        Self {
            photos: Vec::new(),
            previews,
        }
    }

    /// Seeds the stager with photos already stored remotely.
    pub fn from_remote(previews: Arc<PreviewRegistry>, urls: impl IntoIterator<Item = String>) -> Self {
        let photos = urls
            .into_iter()
            .filter(|url| !url.trim().is_empty())
            .take(MAX_PHOTOS)
            .map(|url| Photo {
                id: Uuid::new_v4(),
                file: None,
                preview: None,
                payload: Some(PhotoPayload::Remote(url)),
                status: PhotoStatus::Ready,
                error: None,
            })
            .collect();
        Self { photos, previews }
    }

    pub fn len(&self) -> usize {
        self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }

    pub fn photos(&self) -> &[Photo] {
        &self.photos
    }

    pub fn views(&self) -> Vec<PhotoView> {
        self.photos()
            .iter()
            .enumerate()
            .map(|(index, photo)| photo.view(index))
            .collect()
    }

    pub fn any_encoding(&self) -> bool {
        self.photos
            .iter()
            .any(|photo| photo.status() == PhotoStatus::Encoding)
    }

    /// Stages a batch. Unacceptable files are reported as failed and never inserted;
    /// the batch is refused whole when the acceptable files would overflow the limit.
    pub fn add(&mut self, files: Vec<PhotoFile>) -> Result<AddReport, CapacityError> {
        let mut report = AddReport::default();
        let mut acceptable = Vec::with_capacity(files.len());
        for file in files {
            match file.rejection_reason() {
                Some(reason) => report.rejected.push(RejectedFile {
                    name: file.name,
                    status: PhotoStatus::Failed,
                    reason,
                }),
                None => acceptable.push(file),
            }
        }

        if self.photos.len() + acceptable.len() > MAX_PHOTOS {
            return Err(CapacityError::TooMany {
                current: self.photos.len(),
                requested: acceptable.len(),
                limit: MAX_PHOTOS,
            });
        }

        for file in acceptable {
            let photo = Photo {
                id: Uuid::new_v4(),
                preview: Some(self.previews.acquire()),
                file: Some(file),
                payload: None,
                status: PhotoStatus::Staged,
                error: None,
            };
            report.accepted.push(photo.id);
            self.photos.push(photo);
        }
        debug!(
            target = "wizard.photos",
            accepted = report.accepted.len(),
            rejected = report.rejected.len(),
            total = self.photos.len(),
            "photos_staged"
        );
        Ok(report)
    }

    /// Stable removal; the preview handle is released as the record drops.
    pub fn remove(&mut self, index: usize) -> Result<Uuid, CapacityError> {
        if index >= self.photos.len() {
            return Err(CapacityError::OutOfRange {
                index,
                len: self.photos.len(),
            });
        }
        let photo = self.photos.remove(index);
        debug!(target = "wizard.photos", photo = %photo.id, index, "photo_removed");
        Ok(photo.id)
    }

    /// Releases every photo and its preview.
    pub fn clear(&mut self) {
        self.photos.clear();
    }

    /// Starts encoding every photo that has no payload yet.
    pub fn begin_finalize(&mut self) -> FinalizeBatch {
        let mut tasks = JoinSet::new();
        for photo in &mut self.photos {
            if photo.payload.is_some() || photo.status == PhotoStatus::Encoding {
                continue;
            }
            let Some(file) = photo.file.clone() else {
                continue;
            };
            photo.status = PhotoStatus::Encoding;
            let photo_id = photo.id;
            tasks.spawn(async move {
                let result = encode_file(&file).await;
                EncodeOutcome { photo_id, result }
            });
        }
        FinalizeBatch {
            tasks,
            started: Instant::now(),
        }
    }

    /// Attaches settled outcomes. Results for photos removed meanwhile are discarded,
    /// and a failed read falls back to the photo's preview reference.
    pub fn absorb(&mut self, outcomes: Vec<EncodeOutcome>) {
        let mut by_photo: HashMap<Uuid, Result<PhotoPayload, EncodeError>> = outcomes
            .into_iter()
            .map(|outcome| (outcome.photo_id, outcome.result))
            .collect();

        for photo in &mut self.photos {
            if photo.status != PhotoStatus::Encoding {
                continue;
            }
            let result = by_photo.remove(&photo.id).unwrap_or_else(|| {
                Err(EncodeError::Aborted {
                    name: photo
                        .file
                        .as_ref()
                        .map(|file| file.name.clone())
                        .unwrap_or_default(),
                    reason: "task did not report".into(),
                })
            });
            match result {
                Ok(payload) => {
                    photo.payload = Some(payload);
                    photo.status = PhotoStatus::Ready;
                    photo.error = None;
                }
                Err(err) => {
                    warn!(target = "wizard.photos", photo = %photo.id, error = %err, "encode_fallback");
                    photo.payload = photo
                        .preview_url()
                        .map(|url| PhotoPayload::Fallback(url.to_string()));
                    photo.status = PhotoStatus::Failed;
                    photo.error = Some(err.to_string());
                }
            }
        }

        for photo_id in by_photo.keys() {
            debug!(target = "wizard.photos", photo = %photo_id, "encode_result_discarded");
        }
    }

    /// Returns photos left in `Encoding` by an abandoned batch to `Staged`.
    pub fn reset_encoding(&mut self) -> usize {
        let mut reset = 0;
        for photo in &mut self.photos {
            if photo.status == PhotoStatus::Encoding {
                photo.status = PhotoStatus::Staged;
                reset += 1;
            }
        }
        reset
    }

    /// Encodes all pending photos and waits for every one to settle. Idempotent.
    pub async fn finalize(&mut self) {
        let batch = self.begin_finalize();
        if batch.is_empty() {
            return;
        }
        let outcomes = batch.settle().await;
        self.absorb(outcomes);
    }

    /// Ordered payload strings for transmission; photos without a payload are skipped.
    pub fn payloads(&self) -> Vec<String> {
        self.photos
            .iter()
            .filter_map(Photo::payload)
            .map(|payload| payload.as_str().to_string())
            .collect()
    }
}
