pub mod categories;
pub mod client;
pub mod listings;

pub use categories::HttpCategorySource;
pub use listings::{HttpListingApi, ListingApi, ListingReceipt, ListingSubmission};

use serde::{Deserialize, Deserializer};

/// Identifier as the backend may send it: a string or a bare number.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum WireId {
    Text(String),
    Number(serde_json::Number),
}

impl WireId {
    pub(crate) fn into_string(self) -> String {
        match self {
            WireId::Text(text) => text,
            WireId::Number(number) => number.to_string(),
        }
    }
}

pub(crate) fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    WireId::deserialize(deserializer).map(WireId::into_string)
}

pub(crate) fn optional_string_or_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Option::<WireId>::deserialize(deserializer).map(|id| id.map(WireId::into_string))
}
