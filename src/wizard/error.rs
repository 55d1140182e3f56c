use crate::{photos::CapacityError, wizard::draft::Step};
use serde::Serialize;
use std::{collections::BTreeMap, fmt};
use thiserror::Error;

/// Per-field validation messages keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        let field = field.into();
        if !self.contains(&field) {
            self.0.insert(field, message.into());
        }
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }

    pub fn merge(&mut self, other: FieldErrors) {
        for (field, message) in other.0 {
            self.add(field, message);
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.0.keys().map(String::as_str).collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

impl std::error::Error for FieldErrors {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardErrorKind {
    InvalidInput,
    Conflict,
    NotFound,
    Upstream,
}

#[derive(Debug, Error)]
pub enum WizardError {
    #[error("{0}")]
    Fields(#[from] FieldErrors),
    #[error(transparent)]
    Capacity(#[from] CapacityError),
    #[error("operation belongs to the {expected:?} step, wizard is on {current:?}")]
    WrongStep { expected: Step, current: Step },
    #[error("cannot jump from {from:?} to {to:?}")]
    InvalidJump { from: Step, to: Step },
    #[error("already on the first step")]
    NoPreviousStep,
    #[error("unknown category `{0}`")]
    UnknownCategory(String),
    #[error("category `{0}` is not offered at this level")]
    NotOffered(String),
    #[error("no category selected yet")]
    NoCategory,
    #[error("at least one photo is required")]
    NoPhotos,
    #[error("photos are still being encoded")]
    PhotosEncoding,
    #[error("choose a region before the city")]
    RegionRequired,
    #[error("`{city}` is not a city of {region}")]
    CityOutsideRegion { region: String, city: String },
    #[error("a submission is already in progress")]
    AlreadySubmitting,
    #[error("the listing was already submitted")]
    AlreadySubmitted,
    #[error("{0}")]
    Submission(String),
}

impl WizardError {
    pub fn kind(&self) -> WizardErrorKind {
        match self {
            WizardError::WrongStep { .. }
            | WizardError::InvalidJump { .. }
            | WizardError::NoPreviousStep
            | WizardError::PhotosEncoding
            | WizardError::AlreadySubmitting
            | WizardError::AlreadySubmitted => WizardErrorKind::Conflict,
            WizardError::UnknownCategory(_) => WizardErrorKind::NotFound,
            WizardError::Submission(_) => WizardErrorKind::Upstream,
            _ => WizardErrorKind::InvalidInput,
        }
    }

    /// Stable machine-readable code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            WizardError::Fields(_) => "invalid_fields",
            WizardError::Capacity(CapacityError::TooMany { .. }) => "too_many_photos",
            WizardError::Capacity(CapacityError::OutOfRange { .. }) => "photo_not_found",
            WizardError::WrongStep { .. } => "wrong_step",
            WizardError::InvalidJump { .. } => "invalid_jump",
            WizardError::NoPreviousStep => "no_previous_step",
            WizardError::UnknownCategory(_) => "unknown_category",
            WizardError::NotOffered(_) => "category_not_offered",
            WizardError::NoCategory => "category_required",
            WizardError::NoPhotos => "photos_required",
            WizardError::PhotosEncoding => "photos_encoding",
            WizardError::RegionRequired => "region_required",
            WizardError::CityOutsideRegion { .. } => "city_outside_region",
            WizardError::AlreadySubmitting => "already_submitting",
            WizardError::AlreadySubmitted => "already_submitted",
            WizardError::Submission(_) => "submission_failed",
        }
    }

    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            WizardError::Fields(errors) => Some(errors),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_message_per_field_wins() {
        let mut errors = FieldErrors::new();
        errors.add("title", "too short");
        errors.add("title", "ignored");
        errors.add("price", "not a number");
        assert_eq!(
            serde_json::to_value(&errors).unwrap()["title"],
            "too short"
        );
        assert_eq!(errors.to_string(), "invalid fields: price, title");

        let err = WizardError::from(errors);
        assert_eq!(err.kind(), WizardErrorKind::InvalidInput);
        assert_eq!(err.field_errors().map(FieldErrors::len), Some(2));
    }

    #[test]
    fn kinds_follow_error_class() {
        assert_eq!(
            WizardError::Submission("network error".into()).kind(),
            WizardErrorKind::Upstream
        );
        assert_eq!(
            WizardError::UnknownCategory("x".into()).kind(),
            WizardErrorKind::NotFound
        );
        assert_eq!(WizardError::NoPreviousStep.kind(), WizardErrorKind::Conflict);
    }
}
