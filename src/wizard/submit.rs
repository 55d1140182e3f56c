use crate::{
    api::{ListingApi, ListingReceipt, ListingSubmission},
    catalog::CategoryField,
    wizard::{
        draft::Draft,
        error::{FieldErrors, WizardError},
        panels::{self, LocationForm},
    },
};
use std::time::Instant;
use tracing::{info, warn};

/// Re-validates every slice, as a Review-step confirmation may follow any edit.
fn validate_aggregate(draft: &Draft, schema: &[CategoryField]) -> Result<(), WizardError> {
    if draft.category.category_id.is_none() {
        return Err(WizardError::NoCategory);
    }
    let mut errors = FieldErrors::new();
    if let Err(details) = panels::validate_details(draft.details.clone(), schema) {
        errors.merge(details);
    }
    if let Err(location) = LocationForm::rehydrate(&draft.location).validate() {
        errors.merge(location);
    }
    if !errors.is_empty() {
        return Err(WizardError::Fields(errors));
    }
    panels::check_photos(&draft.photos)
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Builds the request body from a validated draft whose photos are finalized.
pub fn assemble(draft: &Draft, schema: &[CategoryField]) -> Result<ListingSubmission, WizardError> {
    let category_id = draft
        .category
        .category_id
        .clone()
        .ok_or(WizardError::NoCategory)?;
    let price = panels::parse_price(draft.details.price.trim()).map_err(|message| {
        let mut errors = FieldErrors::new();
        errors.add("price", message);
        WizardError::Fields(errors)
    })?;
    let attributes = draft
        .details
        .attributes
        .iter()
        .filter(|(name, _)| schema.iter().any(|field| field.name == name.as_str()))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();

    Ok(ListingSubmission {
        title: draft.details.title.trim().to_string(),
        description: draft.details.description.trim().to_string(),
        price,
        is_negotiable: draft.details.price_negotiable,
        condition: draft.details.condition,
        category_id,
        attributes,
        region: draft.location.region.clone(),
        city: draft.location.city.clone(),
        district: non_empty(&draft.location.district),
        address: non_empty(&draft.location.address),
        photos: draft.photos.payloads(),
        status: None,
    })
}

/// Keeps the draft marked as submitting for as long as it lives. Dropping it,
/// including when the submit future is abandoned, leaves the draft re-editable.
struct SubmittingGuard<'a> {
    draft: &'a mut Draft,
}

impl<'a> SubmittingGuard<'a> {
    fn begin(draft: &'a mut Draft) -> Self {
        draft.submission.is_submitting = true;
        draft.submission.last_error = None;
        Self { draft }
    }
}

impl Drop for SubmittingGuard<'_> {
    fn drop(&mut self) {
        self.draft.submission.is_submitting = false;
        let interrupted = self.draft.photos.reset_encoding();
        if interrupted > 0 {
            warn!(target = "wizard.submit", interrupted, "submission_abandoned");
        }
    }
}

/// Validates, finalizes photos, then issues exactly one create or update call.
/// A failure is recorded in `last_error` and leaves every slice as it was.
/// Once a call succeeded its receipt is returned again instead of calling twice.
pub async fn submit_draft<A: ListingApi>(
    draft: &mut Draft,
    schema: &[CategoryField],
    api: &A,
) -> Result<ListingReceipt, WizardError> {
    if let Some(receipt) = &draft.submission.receipt {
        return Ok(receipt.clone());
    }
    if draft.submission.is_submitting {
        return Err(WizardError::AlreadySubmitting);
    }
    validate_aggregate(draft, schema)?;

    let started = Instant::now();
    let outcome = {
        let mut guard = SubmittingGuard::begin(draft);
        guard.draft.photos.finalize().await;
        let submission = assemble(&*guard.draft, schema)?;
        match guard.draft.existing_id.as_deref() {
            Some(listing_id) => api.update(listing_id, &submission).await,
            None => api.create(&submission).await,
        }
    };

    let mode = if draft.is_editing() { "update" } else { "create" };
    crate::metrics::submission_outcome(mode, outcome.is_ok(), started.elapsed());
    match outcome {
        Ok(receipt) => {
            info!(target = "wizard.submit", mode, listing_id = %receipt.id, "listing_submitted");
            draft.submission.receipt = Some(receipt.clone());
            Ok(receipt)
        }
        Err(err) => {
            let message = err.message();
            warn!(target = "wizard.submit", mode, error = %message, "listing_submission_failed");
            draft.submission.last_error = Some(message.clone());
            Err(WizardError::Submission(message))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        api::{
            ListingApi, ListingReceipt, ListingSubmission,
            listings::{
                ListingApiError,
                testing::{Call, RecordingApi},
            },
        },
        catalog::categories::demo_tree,
        wizard::{
            controller::{
                ListingWizard,
                tests::{jpeg, wizard_at_review},
            },
            draft::{ExistingListing, Step},
            error::WizardError,
        },
    };
    use serde_json::json;
    use std::{sync::Arc, time::Duration};

    /// Listing endpoint that never answers.
    struct Unresponsive;

    impl ListingApi for Unresponsive {
        async fn create(&self, _: &ListingSubmission) -> Result<ListingReceipt, ListingApiError> {
            std::future::pending().await
        }

        async fn update(
            &self,
            _: &str,
            _: &ListingSubmission,
        ) -> Result<ListingReceipt, ListingApiError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn abandoned_submission_leaves_draft_editable() {
        let mut wizard = wizard_at_review();
        let outcome =
            tokio::time::timeout(Duration::from_millis(50), wizard.submit(&Unresponsive)).await;
        assert!(outcome.is_err());

        assert!(!wizard.draft().submission.is_submitting);
        assert!(!wizard.draft().photos.any_encoding());
        assert_eq!(wizard.back().unwrap(), Step::Location);
        assert_eq!(wizard.step(), Step::Location);
    }

    #[tokio::test]
    async fn successful_submission_is_final_and_replayed() {
        let mut wizard = wizard_at_review();
        let api = RecordingApi::default();
        let first = wizard.submit(&api).await.expect("submit");

        let again = wizard.submit(&api).await.expect("replay");
        assert_eq!(again, first);
        assert_eq!(api.calls().len(), 1);
        assert_eq!(wizard.receipt(), Some(&first));
        assert!(matches!(wizard.back(), Err(WizardError::AlreadySubmitted)));
        assert!(matches!(
            wizard.jump_to(Step::Details),
            Err(WizardError::AlreadySubmitted)
        ));
    }

    #[tokio::test]
    async fn failed_call_records_error_and_keeps_draft() {
        let mut wizard = wizard_at_review();
        let details = wizard.draft().details.clone();
        let location = wizard.draft().location.clone();
        let category = wizard.draft().category.clone();
        let photo_ids: Vec<_> = wizard.draft().photos.photos().iter().map(|p| p.id()).collect();

        let api = RecordingApi::failing("network error");
        let err = wizard.submit(&api).await.expect_err("upstream failure");

        assert!(matches!(err, WizardError::Submission(ref message) if message == "network error"));
        let draft = wizard.draft();
        assert!(!draft.submission.is_submitting);
        assert_eq!(draft.submission.last_error.as_deref(), Some("network error"));
        assert_eq!(draft.details, details);
        assert_eq!(draft.location, location);
        assert_eq!(draft.category, category);
        assert_eq!(
            draft.photos.photos().iter().map(|p| p.id()).collect::<Vec<_>>(),
            photo_ids
        );
        assert_eq!(wizard.step(), Step::Review);
        assert_eq!(api.calls().len(), 1);
    }

    #[tokio::test]
    async fn retry_reuses_encoded_photos_and_clears_error() {
        let mut wizard = wizard_at_review();
        let api = RecordingApi::failing("network error");
        wizard.submit(&api).await.expect_err("first attempt");
        let first_payloads = wizard.draft().photos.payloads();

        api.fail_with(None);
        wizard.submit(&api).await.expect("retry");

        assert!(wizard.draft().submission.last_error.is_none());
        assert_eq!(wizard.draft().photos.payloads(), first_payloads);
        let calls = api.calls();
        assert_eq!(calls.len(), 2);
        let (Call::Create(first), Call::Create(second)) = (&calls[0], &calls[1]) else {
            panic!("expected two create calls");
        };
        assert_eq!(first.photos, second.photos);
    }

    #[tokio::test]
    async fn edit_mode_updates_existing_listing() {
        let listing: ExistingListing = serde_json::from_value(json!({
            "id": 77,
            "category_id": "13",
            "title": "Lot de chaises",
            "description": "Six chaises en bois massif, très bon état",
            "price": 30000,
            "region": "Centre",
            "city": "Yaoundé",
            "photos": ["https://cdn.example/chaises.jpg"]
        }))
        .unwrap();
        let mut wizard = ListingWizard::edit(Arc::new(demo_tree()), listing);
        wizard.confirm_category().unwrap();
        wizard.submit_details(wizard.details_form()).unwrap();
        wizard.add_photos(vec![jpeg("detail.jpg")]).unwrap();
        wizard.photos_next().unwrap();
        wizard.submit_location(wizard.location_form().slice().clone()).unwrap();

        let api = RecordingApi::default();
        wizard.submit(&api).await.expect("update");

        let calls = api.calls();
        let [Call::Update(id, body)] = calls.as_slice() else {
            panic!("expected a single update call");
        };
        assert_eq!(id, "77");
        assert_eq!(body.photos[0], "https://cdn.example/chaises.jpg");
        assert!(body.photos[1].starts_with("data:image/jpeg"));
        assert_eq!(body.district, None);
    }

    #[tokio::test]
    async fn submit_is_only_offered_on_review() {
        let mut wizard = wizard_at_review();
        wizard.back().unwrap();
        let api = RecordingApi::default();
        assert!(matches!(
            wizard.submit(&api).await,
            Err(WizardError::WrongStep { .. })
        ));
        assert!(api.calls().is_empty());
    }
}
