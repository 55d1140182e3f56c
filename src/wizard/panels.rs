//! The five step panels. Each one takes a slice of the draft by value and
//! returns a validated patch; none of them touches the draft directly.

use crate::{
    catalog::{CategoryField, CategoryNode, CategoryTree, regions::cities_of},
    photos::{PhotoStager, PhotoView},
    wizard::{
        draft::{CategorySlice, Condition, DetailsSlice, Draft, DraftPatch, LocationSlice, Step},
        error::{FieldErrors, WizardError},
    },
};
use serde::Serialize;
use serde_json::Value;

pub const TITLE_MIN_CHARS: usize = 5;
pub const TITLE_MAX_CHARS: usize = 100;
pub const DESCRIPTION_MIN_CHARS: usize = 20;

/// Category browser: a trail of opened parents over the category tree.
#[derive(Debug, Clone, Default)]
pub struct CategoryPanel {
    trail: Vec<CategoryNode>,
}

impl CategoryPanel {
    /// Reopens the browser on the parent level of the current selection.
    pub fn rehydrate(slice: &CategorySlice) -> Self {
        let mut trail = slice.category_path.clone();
        trail.pop();
        Self { trail }
    }

    pub fn breadcrumb(&self) -> Vec<String> {
        self.trail.iter().map(|node| node.name.clone()).collect()
    }

    /// Categories offered at the current level.
    pub fn options<'a>(&self, tree: &'a CategoryTree) -> Vec<&'a CategoryNode> {
        match self.trail.last() {
            Some(parent) => tree.children_of(Some(parent.id.as_str())),
            None => tree.roots(),
        }
    }

    /// Descends into a parent, or selects a leaf and returns its patch.
    pub fn open(&mut self, tree: &CategoryTree, id: &str) -> Result<Option<DraftPatch>, WizardError> {
        let node = tree
            .get(id)
            .ok_or_else(|| WizardError::UnknownCategory(id.to_string()))?;
        let level = self.trail.last().map(|parent| parent.id.as_str());
        if node.parent_id.as_deref() != level {
            return Err(WizardError::NotOffered(id.to_string()));
        }
        if tree.is_leaf(id) {
            return select(tree, id).map(Some);
        }
        self.trail.push(node.clone());
        Ok(None)
    }

    pub fn up(&mut self) -> Option<CategoryNode> {
        self.trail.pop()
    }
}

/// Selects any leaf of the tree, recording its full root-to-leaf path.
pub fn select(tree: &CategoryTree, id: &str) -> Result<DraftPatch, WizardError> {
    let path = tree
        .path_to(id)
        .ok_or_else(|| WizardError::UnknownCategory(id.to_string()))?;
    if !tree.is_leaf(id) {
        return Err(WizardError::NotOffered(id.to_string()));
    }
    Ok(DraftPatch::Category(CategorySlice {
        category_id: Some(id.to_string()),
        category_path: path,
    }))
}

/// Keeps the current selection, as when an edit session re-walks the flow.
pub fn confirm_category(slice: CategorySlice) -> Result<DraftPatch, WizardError> {
    if slice.category_id.is_none() {
        return Err(WizardError::NoCategory);
    }
    Ok(DraftPatch::Category(slice))
}

/// Validates the Details form against the base rules and the category schema.
/// Attributes the schema does not declare are dropped from the patch.
pub fn validate_details(
    mut form: DetailsSlice,
    schema: &[CategoryField],
) -> Result<DraftPatch, FieldErrors> {
    let mut errors = FieldErrors::new();

    form.title = form.title.trim().to_string();
    let title_len = form.title.chars().count();
    if !(TITLE_MIN_CHARS..=TITLE_MAX_CHARS).contains(&title_len) {
        errors.add(
            "title",
            format!("Title must be between {TITLE_MIN_CHARS} and {TITLE_MAX_CHARS} characters"),
        );
    }

    if form.description.trim().chars().count() < DESCRIPTION_MIN_CHARS {
        errors.add(
            "description",
            format!("Description must be at least {DESCRIPTION_MIN_CHARS} characters"),
        );
    }

    form.price = form.price.trim().to_string();
    if let Err(message) = parse_price(&form.price) {
        errors.add("price", message);
    }

    form.attributes
        .retain(|name, _| schema.iter().any(|field| field.name == name.as_str()));
    for field in schema {
        if let Err(message) = field.check(form.attributes.get(field.name)) {
            errors.add(field.name, message);
        }
    }

    errors.into_result().map(|()| DraftPatch::Details(form))
}

/// Non-negative integer price, digits only.
pub fn parse_price(raw: &str) -> Result<u64, String> {
    if raw.is_empty() {
        return Err("Price is required".into());
    }
    if !raw.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err("Price must be a whole number without separators".into());
    }
    raw.parse::<u64>()
        .map_err(|_| "Price is too large".to_string())
}

pub fn check_photos(photos: &PhotoStager) -> Result<(), WizardError> {
    if photos.is_empty() {
        return Err(WizardError::NoPhotos);
    }
    if photos.any_encoding() {
        return Err(WizardError::PhotosEncoding);
    }
    Ok(())
}

/// Location form with the region/city cascade.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationForm {
    slice: LocationSlice,
}

impl LocationForm {
    pub fn rehydrate(slice: &LocationSlice) -> Self {
        Self {
            slice: slice.clone(),
        }
    }

    pub fn slice(&self) -> &LocationSlice {
        &self.slice
    }

    /// Any region change clears the city.
    pub fn set_region(&mut self, region: impl Into<String>) {
        self.slice.region = region.into();
        self.slice.city.clear();
    }

    pub fn set_city(&mut self, city: impl Into<String>) -> Result<(), WizardError> {
        let city = city.into();
        if self.slice.region.trim().is_empty() {
            return Err(WizardError::RegionRequired);
        }
        if !cities_of(&self.slice.region).contains(&city.as_str()) {
            return Err(WizardError::CityOutsideRegion {
                region: self.slice.region.clone(),
                city,
            });
        }
        self.slice.city = city;
        Ok(())
    }

    pub fn set_district(&mut self, district: impl Into<String>) {
        self.slice.district = district.into();
    }

    pub fn set_address(&mut self, address: impl Into<String>) {
        self.slice.address = address.into();
    }

    /// City options for the current region; empty (disabled) until one is chosen.
    pub fn city_options(&self) -> &'static [&'static str] {
        cities_of(&self.slice.region)
    }

    pub fn validate(self) -> Result<DraftPatch, FieldErrors> {
        let mut errors = FieldErrors::new();
        if self.slice.region.trim().is_empty() {
            errors.add("region", "Region is required");
        } else if self.city_options().is_empty() {
            errors.add("region", format!("Unknown region {}", self.slice.region));
        }
        if self.slice.city.trim().is_empty() {
            errors.add("city", "City is required");
        } else if !self.city_options().contains(&self.slice.city.as_str()) {
            errors.add(
                "city",
                format!("{} is not a city of {}", self.slice.city, self.slice.region),
            );
        }
        errors.into_result().map(|()| DraftPatch::Location(self.slice))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewAttribute {
    pub name: &'static str,
    pub label: &'static str,
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EditLink {
    pub step: Step,
    pub title: &'static str,
}

/// Read-only projection of the draft for the Review step.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewSummary {
    pub breadcrumb: Vec<String>,
    pub title: String,
    pub description: String,
    pub price: String,
    pub price_negotiable: bool,
    pub condition: Condition,
    pub condition_label: &'static str,
    pub attributes: Vec<ReviewAttribute>,
    pub region: String,
    pub city: String,
    pub district: String,
    pub address: String,
    pub photos: Vec<PhotoView>,
    pub edit_links: Vec<EditLink>,
}

impl ReviewSummary {
    /// Attribute values are passed through untouched, in schema order.
    pub fn project(draft: &Draft, schema: &[CategoryField]) -> Self {
        let attributes = schema
            .iter()
            .filter_map(|field| {
                let value = draft.details.attributes.get(field.name)?;
                Some(ReviewAttribute {
                    name: field.name,
                    label: field.label,
                    display: value.as_str().and_then(|raw| field.option_label(raw)),
                    value: value.clone(),
                    unit: field.unit,
                })
            })
            .collect();
        let edit_links = Step::ALL
            .iter()
            .copied()
            .filter(|step| *step != Step::Review)
            .map(|step| EditLink {
                step,
                title: step.title(),
            })
            .collect();

        Self {
            breadcrumb: draft.category.breadcrumb(),
            title: draft.details.title.clone(),
            description: draft.details.description.clone(),
            price: draft.details.price.clone(),
            price_negotiable: draft.details.price_negotiable,
            condition: draft.details.condition,
            condition_label: draft.details.condition.label(),
            attributes,
            region: draft.location.region.clone(),
            city: draft.location.city.clone(),
            district: draft.location.district.clone(),
            address: draft.location.address.clone(),
            photos: draft.photos.views(),
            edit_links,
        }
    }
}
