//! Execution planner - builds per-instance execution plans

use crate::diagnostics::Diagnostics;
use crate::diff::{Action, DiffSummary, PlannedChange};
use crate::resource::SharedResource;
use crate::tree::AttributeTree;
use crate::types::{Address, AddressError};
use std::str::FromStr;

/// One instance with its planned change
pub struct PlannedInstance {
    pub address: Address,
    pub resource: SharedResource,
    /// Recorded state, if the instance is tracked
    pub prior: Option<AttributeTree>,
    /// Desired state, if the instance is configured
    pub desired: Option<AttributeTree>,
    pub change: PlannedChange,
}

impl PlannedInstance {
    pub fn action(&self) -> Action {
        self.change.action
    }
}

/// An execution plan: every planned instance plus the ones that failed to plan
#[derive(Default)]
pub struct ExecutionPlan {
    pub instances: Vec<PlannedInstance>,
    /// Instances whose desired or recorded state did not decode
    pub errors: Vec<(Address, Diagnostics)>,
}

impl ExecutionPlan {
    /// Create a new empty plan
    pub fn new() -> Self {
        Self::default()
    }

    /// Plan one instance. Nothing is added when both sides are absent.
    pub fn add(
        &mut self,
        address: Address,
        resource: SharedResource,
        prior: Option<AttributeTree>,
        desired: Option<AttributeTree>,
    ) {
        if prior.is_none() && desired.is_none() {
            return;
        }
        match resource.plan(prior.as_ref(), desired.as_ref()) {
            Ok(change) => self.instances.push(PlannedInstance {
                address,
                resource,
                prior,
                desired,
                change,
            }),
            Err(diagnostics) => self.errors.push((address, diagnostics)),
        }
    }

    /// Instances that change something
    pub fn changes(&self) -> impl Iterator<Item = &PlannedInstance> {
        self.instances.iter().filter(|i| i.action().is_change())
    }

    pub fn summary(&self) -> DiffSummary {
        DiffSummary::from_actions(self.instances.iter().map(PlannedInstance::action))
    }

    /// Check if plan has no changes
    pub fn is_empty(&self) -> bool {
        self.changes().next().is_none()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Instance selector for `--target`: a whole kind, or one `kind.name`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Target {
    pub kind: Option<String>,
    pub name: Option<String>,
}

impl Target {
    /// Selects every instance
    pub fn all() -> Self {
        Self::default()
    }

    pub fn matches(&self, address: &Address) -> bool {
        self.kind.as_deref().is_none_or(|k| address.kind == k)
            && self.name.as_deref().is_none_or(|n| address.name == n)
    }
}

impl FromStr for Target {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.contains('.') {
            let address: Address = s.parse()?;
            return Ok(Self {
                kind: Some(address.kind),
                name: Some(address.name),
            });
        }
        if s.is_empty() {
            return Err(AddressError(s.to_string()));
        }
        Ok(Self {
            kind: Some(s.to_string()),
            name: None,
        })
    }
}
