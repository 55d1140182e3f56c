pub mod controller;
pub mod draft;
pub mod error;
pub mod panels;
pub mod submit;

pub use controller::{ListingWizard, WizardView};
pub use draft::{DetailsSlice, ExistingListing, LocationSlice, Step};
pub use error::{FieldErrors, WizardError, WizardErrorKind};
