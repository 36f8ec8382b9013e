//! Terminal front end for the declarative engine
//!
//! Rendering plans, confirming with the user and reporting results. The
//! planning and execution themselves live in the `declarative` crate.

pub mod differ;
pub mod executor;

pub use differ::display_plan;
pub use executor::{PromptConfirm, print_diagnostics, print_summary};
