//! Execution engine - applies planned instances in parallel
//!
//! Each instance sees exactly one operation at a time; independent instances
//! run concurrently on a bounded rayon pool.

use crate::context::{CancelToken, ConfirmCallback, OperationContext, ProgressCallback};
use crate::diagnostics::Diagnostics;
use crate::diff::Action;
use crate::planner::{ExecutionPlan, PlannedInstance};
use crate::resource::SharedResource;
use crate::tree::AttributeTree;
use crate::types::{Address, ApplyResult, ExecuteOptions, ExecuteSummary};
use anyhow::Result;
use rayon::prelude::*;
use std::time::Instant;

/// What happened to one instance
#[derive(Debug, Clone)]
pub struct InstanceOutcome {
    pub address: Address,
    pub result: ApplyResult,
    /// State to record; `None` drops the instance
    pub state: Option<AttributeTree>,
    pub diagnostics: Diagnostics,
}

/// Per-instance outcomes plus their summary
#[derive(Debug, Clone, Default)]
pub struct ExecuteReport {
    pub summary: ExecuteSummary,
    pub outcomes: Vec<InstanceOutcome>,
}

impl ExecuteReport {
    fn from_outcomes(outcomes: Vec<InstanceOutcome>) -> Self {
        let mut summary = ExecuteSummary::default();
        for outcome in &outcomes {
            summary.add_result(&outcome.result);
        }
        Self { summary, outcomes }
    }
}

/// A tracked instance to refresh
pub struct RefreshTarget {
    pub address: Address,
    pub resource: SharedResource,
    pub state: AttributeTree,
}

/// Execute a plan with the given options and callbacks
///
/// # Arguments
/// * `plan` - The execution plan to run
/// * `opts` - Execution options (dry_run, jobs, timeout)
/// * `cancel` - Cancels every in-flight and pending operation
/// * `progress` - Progress callback
/// * `confirm` - Confirmation callback
pub fn execute<P, C>(
    plan: &ExecutionPlan,
    opts: &ExecuteOptions,
    cancel: &CancelToken,
    progress: &mut P,
    confirm: &mut C,
) -> Result<ExecuteReport>
where
    P: ProgressCallback,
    C: ConfirmCallback,
{
    let changes: Vec<&PlannedInstance> = plan.changes().collect();
    if changes.is_empty() || opts.dry_run {
        return Ok(ExecuteReport::default());
    }

    let prompt = format!("Apply {} change(s)?", changes.len());
    if !confirm.confirm(&prompt)? {
        let outcomes = changes
            .iter()
            .map(|i| InstanceOutcome {
                address: i.address.clone(),
                result: ApplyResult::Skipped {
                    reason: "Declined".into(),
                },
                state: i.prior.clone(),
                diagnostics: Diagnostics::new(),
            })
            .collect();
        return Ok(ExecuteReport::from_outcomes(outcomes));
    }

    let ctx = operation_context(opts, cancel);
    progress.on_batch_start(changes.len());
    let outcomes = run_batch(
        &changes,
        |i| &i.address,
        opts.jobs,
        progress,
        |i| apply_instance(i, &ctx),
    )?;
    progress.on_batch_complete();

    Ok(ExecuteReport::from_outcomes(outcomes))
}

/// Re-read every target from the remote service
pub fn refresh<P: ProgressCallback>(
    targets: &[RefreshTarget],
    opts: &ExecuteOptions,
    cancel: &CancelToken,
    progress: &mut P,
) -> Result<ExecuteReport> {
    if targets.is_empty() {
        return Ok(ExecuteReport::default());
    }
    let ctx = operation_context(opts, cancel);
    progress.on_batch_start(targets.len());
    let outcomes = run_batch(
        targets,
        |t| &t.address,
        opts.jobs,
        progress,
        |t| refresh_target(t, &ctx),
    )?;
    progress.on_batch_complete();
    Ok(ExecuteReport::from_outcomes(outcomes))
}

fn operation_context(opts: &ExecuteOptions, cancel: &CancelToken) -> OperationContext {
    let ctx = OperationContext::new().with_cancel(cancel.clone());
    match opts.timeout {
        Some(timeout) => ctx.with_deadline(Instant::now() + timeout),
        None => ctx,
    }
}

/// Run `op` over every item, sequentially or on a pool of `jobs` threads
fn run_batch<T, P, F>(
    items: &[T],
    address: impl Fn(&T) -> &Address,
    jobs: usize,
    progress: &mut P,
    op: F,
) -> Result<Vec<InstanceOutcome>>
where
    T: Sync,
    P: ProgressCallback,
    F: Fn(&T) -> InstanceOutcome + Sync,
{
    if jobs <= 1 || items.len() == 1 {
        let mut outcomes = Vec::with_capacity(items.len());
        for item in items {
            progress.on_instance_start(address(item));
            let outcome = op(item);
            progress.on_instance_complete(&outcome.address, &outcome.result);
            outcomes.push(outcome);
        }
        return Ok(outcomes);
    }

    // Progress callbacks are not thread-safe; report after the batch.
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create thread pool: {}", e))?;

    let outcomes: Vec<InstanceOutcome> = pool.install(|| items.par_iter().map(&op).collect());

    for outcome in &outcomes {
        progress.on_instance_complete(&outcome.address, &outcome.result);
    }
    Ok(outcomes)
}

/// Apply a single planned instance
fn apply_instance(instance: &PlannedInstance, ctx: &OperationContext) -> InstanceOutcome {
    let resource = &instance.resource;
    let prior = instance.prior.as_ref();
    let desired = instance.desired.as_ref();

    let (success, state, diagnostics) = match (instance.action(), prior, desired) {
        (Action::Create, _, Some(desired)) => {
            let response = resource.create(ctx, desired);
            (ApplyResult::Created, response.state, response.diagnostics)
        }
        (Action::Update, Some(prior), Some(desired)) => {
            let response = resource.update(ctx, prior, desired);
            (ApplyResult::Updated, response.state, response.diagnostics)
        }
        (Action::Replace, Some(prior), Some(desired)) => {
            let response = resource.update(ctx, prior, desired);
            (ApplyResult::Replaced, response.state, response.diagnostics)
        }
        (Action::Delete, Some(prior), _) => {
            let diagnostics = resource.delete(ctx, prior);
            let state = diagnostics.has_error().then(|| prior.clone());
            (ApplyResult::Deleted, state, diagnostics)
        }
        _ => (ApplyResult::NoChange, instance.prior.clone(), Diagnostics::new()),
    };

    outcome(instance.address.clone(), success, state, diagnostics)
}

fn refresh_target(target: &RefreshTarget, ctx: &OperationContext) -> InstanceOutcome {
    let response = target.resource.read(ctx, &target.state);
    let success = match &response.state {
        None => ApplyResult::Dropped,
        Some(state) if *state == target.state => ApplyResult::NoChange,
        Some(_) => ApplyResult::Updated,
    };
    outcome(target.address.clone(), success, response.state, response.diagnostics)
}

fn outcome(
    address: Address,
    success: ApplyResult,
    state: Option<AttributeTree>,
    diagnostics: Diagnostics,
) -> InstanceOutcome {
    let result = match diagnostics.first_error() {
        Some(err) => {
            log::warn!("{address}: {err}");
            ApplyResult::Failed {
                error: err.to_string(),
            }
        }
        None => success,
    };
    InstanceOutcome {
        address,
        result,
        state,
        diagnostics,
    }
}
