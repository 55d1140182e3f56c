use crate::{
    api::{ListingApi, ListingReceipt},
    catalog::{CategoryField, CategoryNode, CategoryTree, has_dynamic_fields, resolve},
    photos::{AddReport, PhotoFile, PreviewRegistry},
    wizard::{
        draft::{DetailsSlice, Draft, DraftPatch, DraftView, ExistingListing, LocationSlice, Step},
        error::WizardError,
        panels::{self, CategoryPanel, LocationForm, ReviewSummary},
        submit,
    },
};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Owns the draft and the step pointer; every mutation goes through here.
#[derive(Debug)]
pub struct ListingWizard {
    tree: Arc<CategoryTree>,
    browser: CategoryPanel,
    draft: Draft,
    previews: Arc<PreviewRegistry>,
}

impl ListingWizard {
    pub fn new(tree: Arc<CategoryTree>) -> Self {
        let previews = PreviewRegistry::new();
        Self {
            tree,
            browser: CategoryPanel::default(),
            draft: Draft::new(previews.clone()),
            previews,
        }
    }

    /// Opens the wizard against an existing listing. The flow still starts at CATEGORY.
    pub fn edit(tree: Arc<CategoryTree>, listing: ExistingListing) -> Self {
        let previews = PreviewRegistry::new();
        let path = listing
            .category_id
            .as_deref()
            .and_then(|id| tree.path_to(id))
            .unwrap_or_default();
        let draft = Draft::from_existing(listing, path, previews.clone());
        Self {
            browser: CategoryPanel::rehydrate(&draft.category),
            tree,
            draft,
            previews,
        }
    }

    pub fn step(&self) -> Step {
        self.draft.step
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn tree(&self) -> &CategoryTree {
        &self.tree
    }

    /// Receipt of the successful submission, if any.
    pub fn receipt(&self) -> Option<&ListingReceipt> {
        self.draft.submission.receipt.as_ref()
    }

    pub fn live_previews(&self) -> usize {
        self.previews.live_count()
    }

    /// Attribute schema for the selected category.
    pub fn schema(&self) -> &'static [CategoryField] {
        resolve(&self.draft.category.slug())
    }

    pub fn details_form(&self) -> DetailsSlice {
        self.draft.details.clone()
    }

    pub fn location_form(&self) -> LocationForm {
        LocationForm::rehydrate(&self.draft.location)
    }

    fn ensure_editable(&self) -> Result<(), WizardError> {
        if self.draft.submission.is_submitting {
            return Err(WizardError::AlreadySubmitting);
        }
        if self.draft.submission.receipt.is_some() {
            return Err(WizardError::AlreadySubmitted);
        }
        Ok(())
    }

    fn expect_step(&self, expected: Step) -> Result<(), WizardError> {
        self.ensure_editable()?;
        if self.draft.step != expected {
            return Err(WizardError::WrongStep {
                expected,
                current: self.draft.step,
            });
        }
        Ok(())
    }

    fn go_to(&mut self, to: Step) {
        let from = self.draft.step;
        if to == Step::Category {
            self.browser = CategoryPanel::rehydrate(&self.draft.category);
        }
        self.draft.step = to;
        debug!(target = "wizard.flow", from = ?from, to = ?to, "step_transition");
    }

    fn merge_and_advance(&mut self, patch: DraftPatch) {
        self.draft.apply(patch);
        if let Some(next) = self.draft.step.next() {
            self.go_to(next);
        }
    }

    /// Opens a node of the category browser. Returns `true` when a leaf was
    /// selected and the wizard moved on to DETAILS.
    pub fn open_category(&mut self, id: &str) -> Result<bool, WizardError> {
        self.expect_step(Step::Category)?;
        match self.browser.open(&self.tree, id)? {
            Some(patch) => {
                self.merge_and_advance(patch);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn category_up(&mut self) -> Result<Option<CategoryNode>, WizardError> {
        self.expect_step(Step::Category)?;
        Ok(self.browser.up())
    }

    /// Selects any leaf directly and moves on to DETAILS.
    pub fn choose_category(&mut self, id: &str) -> Result<(), WizardError> {
        self.expect_step(Step::Category)?;
        let patch = panels::select(&self.tree, id)?;
        self.merge_and_advance(patch);
        Ok(())
    }

    pub fn confirm_category(&mut self) -> Result<(), WizardError> {
        self.expect_step(Step::Category)?;
        let patch = panels::confirm_category(self.draft.category.clone())?;
        self.merge_and_advance(patch);
        Ok(())
    }

    pub fn submit_details(&mut self, form: DetailsSlice) -> Result<(), WizardError> {
        self.expect_step(Step::Details)?;
        let patch = panels::validate_details(form, self.schema()).inspect_err(|errors| {
            debug!(target = "wizard.flow", invalid = errors.len(), "details_rejected");
        })?;
        self.merge_and_advance(patch);
        Ok(())
    }

    pub fn add_photos(&mut self, files: Vec<PhotoFile>) -> Result<AddReport, WizardError> {
        self.expect_step(Step::Photos)?;
        Ok(self.draft.photos.add(files)?)
    }

    pub fn remove_photo(&mut self, index: usize) -> Result<(), WizardError> {
        self.expect_step(Step::Photos)?;
        self.draft.photos.remove(index)?;
        Ok(())
    }

    pub fn photos_next(&mut self) -> Result<(), WizardError> {
        self.expect_step(Step::Photos)?;
        panels::check_photos(&self.draft.photos)?;
        self.go_to(Step::Location);
        Ok(())
    }

    pub fn submit_location(&mut self, location: LocationSlice) -> Result<(), WizardError> {
        self.expect_step(Step::Location)?;
        let mut form = self.location_form();
        form.set_region(location.region);
        if !location.city.trim().is_empty() {
            form.set_city(location.city)?;
        }
        form.set_district(location.district);
        form.set_address(location.address);
        debug!(
            target = "wizard.flow",
            region = %form.slice().region,
            city = %form.slice().city,
            "location_entered"
        );
        let patch = form.validate()?;
        self.merge_and_advance(patch);
        Ok(())
    }

    /// One step back; nothing entered on any step is discarded.
    pub fn back(&mut self) -> Result<Step, WizardError> {
        self.ensure_editable()?;
        let prev = self.draft.step.prev().ok_or(WizardError::NoPreviousStep)?;
        self.go_to(prev);
        Ok(prev)
    }

    /// Review-only shortcut back to an earlier step.
    pub fn jump_to(&mut self, target: Step) -> Result<(), WizardError> {
        self.expect_step(Step::Review)?;
        if target >= Step::Review {
            return Err(WizardError::InvalidJump {
                from: self.draft.step,
                to: target,
            });
        }
        self.go_to(target);
        Ok(())
    }

    pub fn review(&self) -> ReviewSummary {
        ReviewSummary::project(&self.draft, self.schema())
    }

    /// Confirms the Review step: finalize photos, then one create or update call.
    /// A wizard that already submitted answers with its recorded receipt.
    pub async fn submit<A: ListingApi>(&mut self, api: &A) -> Result<ListingReceipt, WizardError> {
        if let Some(receipt) = self.receipt() {
            return Ok(receipt.clone());
        }
        self.expect_step(Step::Review)?;
        let schema = self.schema();
        submit::submit_draft(&mut self.draft, schema, api).await
    }

    /// Releases every preview handle; the session is unusable afterwards.
    pub fn close(&mut self) {
        debug!(target = "wizard.flow", previews = self.live_previews(), "releasing_previews");
        self.draft.photos.clear();
    }

    pub fn view(&self) -> WizardView {
        let step = self.step();
        let slug = self.draft.category.slug();
        let location = self.location_form();
        WizardView {
            step,
            step_index: step.index(),
            step_title: step.title(),
            progress: step.progress(),
            steps: Step::ALL
                .iter()
                .map(|candidate| StepView {
                    step: *candidate,
                    title: candidate.title(),
                    done: *candidate < step,
                })
                .collect(),
            draft: self.draft().view(),
            category_trail: self.browser.breadcrumb(),
            category_options: (step == Step::Category).then(|| {
                self.browser
                    .options(&self.tree)
                    .into_iter()
                    .cloned()
                    .collect()
            }),
            schema: self.schema(),
            has_dynamic_fields: has_dynamic_fields(&slug),
            city_options: location.city_options(),
            review: (step == Step::Review).then(|| self.review()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StepView {
    pub step: Step,
    pub title: &'static str,
    pub done: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct WizardView {
    pub step: Step,
    pub step_index: usize,
    pub step_title: &'static str,
    pub progress: u8,
    pub steps: Vec<StepView>,
    pub draft: DraftView,
    pub category_trail: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_options: Option<Vec<CategoryNode>>,
    pub schema: &'static [CategoryField],
    pub has_dynamic_fields: bool,
    pub city_options: &'static [&'static str],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review: Option<ReviewSummary>,
}
