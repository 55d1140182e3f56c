use crate::{
    api::client::{authorize, build_client},
    config,
    wizard::draft::Condition,
};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;
use std::{collections::BTreeMap, future::Future};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ListingApiError {
    #[error("{0}")]
    Transport(String),
    #[error("{message}")]
    Rejected { status: u16, message: String },
    #[error("unexpected listing response: {0}")]
    Decode(String),
}

impl ListingApiError {
    /// Human-readable message surfaced to the seller.
    pub fn message(&self) -> String {
        match self {
            ListingApiError::Transport(message) => message.clone(),
            ListingApiError::Rejected { message, .. } => message.clone(),
            ListingApiError::Decode(_) => self.to_string(),
        }
    }
}

/// Body of the create/update call, assembled from a complete draft.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingSubmission {
    pub title: String,
    pub description: String,
    pub price: u64,
    pub is_negotiable: bool,
    pub condition: Condition,
    pub category_id: String,
    #[serde(rename = "extra_attributes")]
    pub attributes: BTreeMap<String, Value>,
    pub region: String,
    pub city: String,
    pub district: Option<String>,
    pub address: Option<String>,
    /// Cover first; each entry is a remote URL or a data URI.
    pub photos: Vec<String>,
    pub status: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingReceipt {
    #[serde(deserialize_with = "crate::api::string_or_number")]
    pub id: String,
    #[serde(default)]
    pub slug: Option<String>,
}

/// Contract of the external listing create/update endpoint.
pub trait ListingApi: Send + Sync {
    fn create(
        &self,
        submission: &ListingSubmission,
    ) -> impl Future<Output = Result<ListingReceipt, ListingApiError>> + Send;

    fn update(
        &self,
        listing_id: &str,
        submission: &ListingSubmission,
    ) -> impl Future<Output = Result<ListingReceipt, ListingApiError>> + Send;
}

#[derive(Debug, Clone)]
pub struct HttpListingApi {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpListingApi {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: build_client(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn from_env() -> Self {
        Self::new(config::LISTING_API_URL.as_str(), config::LISTING_API_TOKEN.clone())
    }

    async fn read_receipt(response: Response) -> Result<ListingReceipt, ListingApiError> {
        let status = response.status();
        if !status.is_success() {
            let body: Option<Value> = response.json().await.ok();
            let message = body
                .as_ref()
                .and_then(upstream_message)
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            return Err(ListingApiError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        response
            .json::<ListingReceipt>()
            .await
            .map_err(|err| ListingApiError::Decode(err.to_string()))
    }
}

fn upstream_message(body: &Value) -> Option<String> {
    ["message", "error", "detail"].iter().find_map(|key| {
        body.get(*key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|message| !message.is_empty())
            .map(str::to_string)
    })
}

impl ListingApi for HttpListingApi {
    async fn create(&self, submission: &ListingSubmission) -> Result<ListingReceipt, ListingApiError> {
        let url = format!("{}/listings", self.base_url);
        let body = ListingSubmission {
            status: Some("ACTIVE"),
            ..submission.clone()
        };
        info!(target = "wizard.api", photos = body.photos.len(), "listing_create");
        let response = authorize(self.client.post(url), self.token.as_deref())
            .json(&body)
            .send()
            .await
            .map_err(|err| ListingApiError::Transport(err.to_string()))?;
        Self::read_receipt(response).await.inspect_err(|err| {
            warn!(target = "wizard.api", error = %err, "listing_create_failed");
        })
    }

    async fn update(
        &self,
        listing_id: &str,
        submission: &ListingSubmission,
    ) -> Result<ListingReceipt, ListingApiError> {
        let url = format!(
            "{}/listings/{}",
            self.base_url,
            urlencoding::encode(listing_id)
        );
        info!(target = "wizard.api", listing_id, photos = submission.photos.len(), "listing_update");
        let response = authorize(self.client.patch(url), self.token.as_deref())
            .json(submission)
            .send()
            .await
            .map_err(|err| ListingApiError::Transport(err.to_string()))?;
        Self::read_receipt(response).await.inspect_err(|err| {
            warn!(target = "wizard.api", listing_id, error = %err, "listing_update_failed");
        })
    }
}
