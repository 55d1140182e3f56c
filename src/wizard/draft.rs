use crate::{
    api::ListingReceipt,
    catalog::{CategoryNode, path_slug, resolve},
    photos::{PhotoStager, PhotoView, PreviewRegistry},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::BTreeMap, sync::Arc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Step {
    Category,
    Details,
    Photos,
    Location,
    Review,
}

impl Step {
    pub const ALL: [Step; 5] = [
        Step::Category,
        Step::Details,
        Step::Photos,
        Step::Location,
        Step::Review,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn next(self) -> Option<Step> {
        Step::ALL.get(self.index() + 1).copied()
    }

    pub fn prev(self) -> Option<Step> {
        self.index().checked_sub(1).map(|index| Step::ALL[index])
    }

    pub fn title(self) -> &'static str {
        match self {
            Step::Category => "Catégorie",
            Step::Details => "Détails",
            Step::Photos => "Photos",
            Step::Location => "Localisation",
            Step::Review => "Récapitulatif",
        }
    }

    /// Completion percentage shown by the progress bar.
    pub fn progress(self) -> u8 {
        ((self.index() + 1) * 100 / Step::ALL.len()) as u8
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Condition {
    #[serde(alias = "NEUF")]
    New,
    #[default]
    #[serde(alias = "OCCASION")]
    Used,
    #[serde(alias = "RECONDITIONNE")]
    Refurbished,
}

impl Condition {
    pub fn label(self) -> &'static str {
        match self {
            Condition::New => "Neuf",
            Condition::Used => "Occasion",
            Condition::Refurbished => "Reconditionné",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategorySlice {
    pub category_id: Option<String>,
    #[serde(default)]
    pub category_path: Vec<CategoryNode>,
}

impl CategorySlice {
    pub fn slug(&self) -> String {
        path_slug(&self.category_path)
    }

    pub fn breadcrumb(&self) -> Vec<String> {
        self.category_path
            .iter()
            .map(|node| node.name.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetailsSlice {
    pub title: String,
    pub description: String,
    /// Digits as typed; parsed only when the submission is assembled.
    pub price: String,
    pub price_negotiable: bool,
    pub condition: Condition,
    pub attributes: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationSlice {
    pub region: String,
    pub city: String,
    pub district: String,
    pub address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubmissionStatus {
    pub is_submitting: bool,
    pub last_error: Option<String>,
    /// Set once the listing call succeeded; the draft is final from then on.
    pub receipt: Option<ListingReceipt>,
}

/// Partial state emitted by a step panel on "next".
#[derive(Debug, Clone, PartialEq)]
pub enum DraftPatch {
    Category(CategorySlice),
    Details(DetailsSlice),
    Location(LocationSlice),
}

/// Listing as it exists upstream, used to open the wizard in edit mode.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExistingListing {
    #[serde(deserialize_with = "crate::api::string_or_number")]
    pub id: String,
    #[serde(deserialize_with = "crate::api::optional_string_or_number")]
    pub category_id: Option<String>,
    pub title: String,
    pub description: String,
    pub price: Option<u64>,
    #[serde(alias = "is_negotiable")]
    pub price_negotiable: bool,
    pub condition: Condition,
    #[serde(alias = "extra_attributes")]
    pub attributes: BTreeMap<String, Value>,
    pub region: String,
    pub city: String,
    pub district: Option<String>,
    pub address: Option<String>,
    pub photos: Vec<String>,
}

/// The in-progress listing. Only the wizard controller holds a mutable one.
#[derive(Debug)]
pub struct Draft {
    pub step: Step,
    pub category: CategorySlice,
    pub details: DetailsSlice,
    pub location: LocationSlice,
    pub photos: PhotoStager,
    pub submission: SubmissionStatus,
    pub existing_id: Option<String>,
}

impl Draft {
    pub fn new(previews: Arc<PreviewRegistry>) -> Self {
        Self {
            step: Step::Category,
            category: CategorySlice::default(),
            details: DetailsSlice::default(),
            location: LocationSlice::default(),
            photos: PhotoStager::new(previews),
            submission: SubmissionStatus::default(),
            existing_id: None,
        }
    }

    /// Pre-populated draft for an existing listing; the flow still starts at CATEGORY.
    pub fn from_existing(
        listing: ExistingListing,
        category_path: Vec<CategoryNode>,
        previews: Arc<PreviewRegistry>,
    ) -> Self {
        Self {
            step: Step::Category,
            category: CategorySlice {
                category_id: listing.category_id,
                category_path,
            },
            details: DetailsSlice {
                title: listing.title,
                description: listing.description,
                price: listing.price.map(|price| price.to_string()).unwrap_or_default(),
                price_negotiable: listing.price_negotiable,
                condition: listing.condition,
                attributes: listing.attributes,
            },
            location: LocationSlice {
                region: listing.region,
                city: listing.city,
                district: listing.district.unwrap_or_default(),
                address: listing.address.unwrap_or_default(),
            },
            photos: PhotoStager::from_remote(previews, listing.photos),
            submission: SubmissionStatus::default(),
            existing_id: Some(listing.id),
        }
    }

    pub fn is_editing(&self) -> bool {
        self.existing_id.is_some()
    }

    /// Merges a panel patch. Only the slice the patch names is touched, except that
    /// switching category drops attributes the new category does not declare.
    pub fn apply(&mut self, patch: DraftPatch) {
        match patch {
            DraftPatch::Category(slice) => {
                if slice.category_id != self.category.category_id {
                    let schema = resolve(&slice.slug());
                    self.details
                        .attributes
                        .retain(|name, _| schema.iter().any(|field| field.name == name.as_str()));
                }
                self.category = slice;
            }
            DraftPatch::Details(slice) => self.details = slice,
            DraftPatch::Location(slice) => self.location = slice,
        }
    }

    pub fn view(&self) -> DraftView {
        DraftView {
            category: self.category.clone(),
            breadcrumb: self.category.breadcrumb(),
            details: self.details.clone(),
            condition_label: self.details.condition.label(),
            location: self.location.clone(),
            photos: self.photos.views(),
            is_submitting: self.submission.is_submitting,
            last_error: self.submission.last_error.clone(),
            receipt: self.submission.receipt.clone(),
            is_editing: self.is_editing(),
            existing_id: self.existing_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DraftView {
    pub category: CategorySlice,
    pub breadcrumb: Vec<String>,
    pub details: DetailsSlice,
    pub condition_label: &'static str,
    pub location: LocationSlice,
    pub photos: Vec<PhotoView>,
    pub is_submitting: bool,
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<ListingReceipt>,
    pub is_editing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_id: Option<String>,
}
