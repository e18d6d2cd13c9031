//! neuroscout-core: analysis drafts, the model builder and the wizard.
//!
//! Nothing in this crate performs I/O. The wizard asks for work through
//! [`wizard::Effect`]s and a driver (see `neuroscout-client`) feeds the
//! results back in.
//!
//! # Public API
//!
//! - [`AnalysisDraft`] -- the document a session edits
//! - [`build_model()`] -- derive the three-level model document
//! - [`reduce()`] -- apply one [`Action`] to a [`WizardState`]
//! - validators: [`validate_xform()`], [`validate_contrast()`]

pub mod contrast;
pub mod draft;
pub mod list;
pub mod model;
pub mod selection;
pub mod transform;
pub mod wizard;

pub use contrast::{generate_dummy_contrasts, validate_contrast};
pub use draft::{AnalysisDraft, EditableStatuses};
pub use model::build_model;
pub use transform::validate_xform;
pub use wizard::{reduce, Action, Effect, RuntimeEvent, Tab, WizardError, WizardState};
