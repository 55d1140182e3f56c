use crate::{
    api::ListingReceipt,
    wizard::{ExistingListing, FieldErrors, Step, WizardView},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<FieldErrors>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OpenWizardRequest {
    #[serde(default)]
    pub existing: Option<ExistingListing>,
}

#[derive(Debug, Serialize)]
pub struct WizardEnvelope {
    pub id: Uuid,
    #[serde(flatten)]
    pub view: WizardView,
}

#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct CategoryOutcome {
    /// `true` once a leaf was selected and the wizard moved to DETAILS.
    pub advanced: bool,
    pub wizard: WizardEnvelope,
}

/// One selected file; `data` is base64, optionally as a full data URI.
#[derive(Debug, Deserialize)]
pub struct PhotoUpload {
    pub name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    pub data: String,
}

#[derive(Debug, Deserialize)]
pub struct PhotoBatchRequest {
    pub files: Vec<PhotoUpload>,
}

#[derive(Debug, Serialize)]
pub struct PhotoBatchResponse {
    pub report: crate::photos::AddReport,
    pub wizard: WizardEnvelope,
}

#[derive(Debug, Deserialize)]
pub struct JumpRequest {
    pub step: Step,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub receipt: ListingReceipt,
    /// Served from the idempotency cache without calling upstream.
    pub replayed: bool,
}

#[derive(Debug, Serialize)]
pub struct SchemaResponse {
    pub slug: String,
    pub has_dynamic_fields: bool,
    pub fields: &'static [crate::catalog::CategoryField],
}
