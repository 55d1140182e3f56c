pub mod encode;
pub mod preview;
pub mod stager;

pub use encode::PhotoFile;
pub use preview::PreviewRegistry;
pub use stager::{AddReport, CapacityError, PhotoStager, PhotoView};
