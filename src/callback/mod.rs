//! Auth callback reconciliation
//!
//! [`params`] parses the redirect, [`reconciler`] drives the identity service
//! and [`outcome`] describes what the page should show.

pub mod outcome;
pub mod params;
pub mod reconciler;

pub use outcome::{OutcomeContent, OutcomeMessage, ReconciliationOutcome, SessionConfirmationStatus};
pub use params::{CallbackParameters, FlowType};
pub use reconciler::{CallbackReconciler, Reconciliation};
