//! # Declarative
//!
//! A framework for managing remote objects from declared configuration.
//!
//! A resource kind pairs a [`ModelAdapter`] (attribute tree to typed API
//! records and back) with a [`Capability`] (the remote create, read, update
//! and delete calls). [`ResourceEngine`] drives the lifecycle on top of the
//! two and always answers with the state the caller should record.
//!
//! ## Core Concepts
//!
//! - **AttributeTree**: The schema-shaped document for one instance, where
//!   every attribute may be null, unknown, or known
//! - **ResourceEngine**: Generic create/read/update/delete/import/plan
//! - **ExecutionPlan**: Planned changes for a set of addressed instances
//! - **Executor**: Applies a plan with bounded parallelism and cancellation
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{
//!     Address, AutoConfirm, CancelToken, ExecuteOptions, ExecutionPlan, NoProgress,
//!     ResourceEngine, SharedResource, execute,
//! };
//! use std::sync::Arc;
//!
//! let teams: SharedResource = Arc::new(ResourceEngine::new(TeamAdapter, TeamApi::new(client)));
//!
//! let mut plan = ExecutionPlan::new();
//! plan.add(Address::new("team", "platform"), teams, None, Some(desired));
//!
//! let report = execute(
//!     &plan,
//!     &ExecuteOptions::default(),
//!     &CancelToken::new(),
//!     &mut NoProgress,
//!     &mut AutoConfirm,
//! )?;
//! ```
//!
//! ## Provider Traits
//!
//! - [`ProgressCallback`]: Receives progress updates
//! - [`ConfirmCallback`]: Handles user confirmations
//!
//! This keeps the crate free of any particular UI framework.

pub mod adapter;
pub mod capability;
pub mod context;
pub mod diagnostics;
pub mod diff;
pub mod engine;
pub mod executor;
pub mod planner;
pub mod resource;
pub mod tree;
pub mod types;
pub mod value;

// Re-export main types at crate root
pub use adapter::{
    ImportResolver, ModelAdapter, PlanPreserver, PrimaryKey, PrimaryKeyed, parse_import_key,
};
pub use capability::{Capability, RemoteError, UpdateStrategy};
pub use context::{
    AutoConfirm, AutoDecline, CancelToken, ConfirmCallback, Interrupted, NoProgress,
    OperationContext, ProgressCallback,
};
pub use diagnostics::{Diagnostic, DiagnosticCategory, Diagnostics, Severity};
pub use diff::{Action, ChangeKind, DiffSummary, FieldChange, PlannedChange, diff_trees};
pub use engine::{ResourceEngine, Response};
pub use executor::{ExecuteReport, InstanceOutcome, RefreshTarget, execute, refresh};
pub use planner::{ExecutionPlan, PlannedInstance, Target};
pub use resource::{ManagedResource, SharedResource};
pub use tree::{
    AttributePath, AttributeTree, DecodeError, FromValue, IntoValue, PathStep, Reader, Writer,
};
pub use types::{Address, AddressError, ApplyResult, ExecuteOptions, ExecuteSummary};
pub use value::{Attr, Value};
