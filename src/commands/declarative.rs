//! Declarative commands
//!
//! - `plan` - Show what apply would change
//! - `apply` - Make remote objects match the config
//! - `destroy` - Delete tracked objects
//! - `refresh` - Re-read tracked objects into state
//! - `import` - Start tracking an existing object

use anyhow::{Context as AnyhowContext, Result, bail};
use colored::Colorize;
use declarative::{
    Address, ApplyResult, AttributeTree, CancelToken, ConfirmCallback, ExecuteOptions,
    ExecuteReport, ExecutionPlan, OperationContext, ProgressCallback, RefreshTarget, Target,
};
use std::collections::BTreeSet;

use super::Workspace;
use crate::Context;
use crate::cli::{ApplyArgs, ImportArgs, RefreshArgs};
use crate::engine::{self, PromptConfirm};
use crate::progress::BarProgress;
use crate::schema;
use crate::ui;

// ============================================================================
// Commands
// ============================================================================

pub fn plan(ctx: &Context, target: Option<&str>) -> Result<()> {
    let ws = Workspace::open(ctx)?;
    let plan = build_plan(&ws, target)?;
    engine::display_plan(&plan);
    if plan.has_errors() {
        bail!("{} failed to plan", ui::plural(plan.errors.len(), "instance"));
    }
    Ok(())
}

pub fn apply(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    let mut ws = Workspace::open(ctx)?;
    let plan = build_plan(&ws, args.target.as_deref())?;
    run(ctx, &mut ws, &plan, args, "Apply")
}

pub fn destroy(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    let mut ws = Workspace::open(ctx)?;
    let plan = build_destroy_plan(&ws, args.target.as_deref())?;
    run(ctx, &mut ws, &plan, args, "Destroy")
}

pub fn refresh(ctx: &Context, args: &RefreshArgs) -> Result<()> {
    let mut ws = Workspace::open(ctx)?;
    let targets = refresh_targets(&ws, args.target.as_deref())?;
    if targets.is_empty() {
        ui::info("Nothing tracked; nothing to refresh");
        return Ok(());
    }

    let opts = options(args.jobs, args.timeout)?;
    let mut progress = bar(ctx, "Refreshing");
    let report = refresh_state(&mut ws, &targets, &opts, &ctx.cancel, &mut progress)?;

    for outcome in &report.outcomes {
        if ctx.verbose > 0 || matches!(outcome.result, ApplyResult::Updated | ApplyResult::Dropped) {
            println!(
                "  {} {} {}",
                ui::result_symbol(&outcome.result),
                outcome.address,
                format!("({})", outcome.result).dimmed()
            );
        }
    }
    engine::print_diagnostics(&report);
    engine::print_summary("Refresh", &report.summary);
    if !report.summary.is_success() {
        bail!("{} could not be refreshed", ui::plural(report.summary.failed, "instance"));
    }
    Ok(())
}

pub fn import(ctx: &Context, args: &ImportArgs) -> Result<()> {
    let mut ws = Workspace::open(ctx)?;
    let address: Address = args.address.parse()?;
    let id = &args.id;
    let op = operation(&ctx.cancel, args.timeout)?;
    import_instance(&mut ws, &address, id, &op)?;

    ui::success(&format!("Imported {address} from id {id}"));
    let configured = ws.config.desired()?.contains_key(&address);
    if !configured {
        ui::warn(&format!(
            "{address} is not in the config; the next apply will destroy it"
        ));
    }
    Ok(())
}

/// Shared tail of `apply` and `destroy`: show, confirm, execute, report.
fn run(
    ctx: &Context,
    ws: &mut Workspace,
    plan: &ExecutionPlan,
    args: &ApplyArgs,
    verb: &str,
) -> Result<()> {
    engine::display_plan(plan);
    if plan.has_errors() {
        bail!("Plan has errors; nothing was changed");
    }
    if plan.is_empty() {
        return Ok(());
    }
    if args.dry_run {
        println!();
        ui::info("Dry run - no changes made");
        return Ok(());
    }

    let opts = options(args.jobs, args.timeout)?;
    let mut progress = bar(ctx, "Applying");
    let mut confirm = PromptConfirm { yes: args.yes };
    println!();
    let report = execute_plan(ws, plan, &opts, &ctx.cancel, &mut progress, &mut confirm)?;

    let declined = report
        .outcomes
        .iter()
        .all(|o| matches!(o.result, ApplyResult::Skipped { .. }));
    if declined {
        ui::warn("Aborted; nothing was changed");
        return Ok(());
    }

    engine::print_diagnostics(&report);
    engine::print_summary(verb, &report.summary);
    if !report.summary.is_success() {
        bail!("{} failed", ui::plural(report.summary.failed, "instance"));
    }
    Ok(())
}

fn options(jobs: usize, timeout: Option<scalar::Duration>) -> Result<ExecuteOptions> {
    Ok(ExecuteOptions {
        dry_run: false,
        jobs: jobs.max(1),
        timeout: timeout
            .map(|t| schema::positive(t, "--timeout"))
            .transpose()?,
    })
}

/// Context for a single engine call, bounded by `--timeout`.
fn operation(cancel: &CancelToken, timeout: Option<scalar::Duration>) -> Result<OperationContext> {
    let op = OperationContext::new().with_cancel(cancel.clone());
    Ok(match timeout {
        Some(timeout) => op.with_timeout(schema::positive(timeout, "--timeout")?),
        None => op,
    })
}

fn bar(ctx: &Context, label: &'static str) -> BarProgress {
    if ctx.quiet {
        BarProgress::hidden(label)
    } else {
        BarProgress::new(label)
    }
}

// ============================================================================
// Planning
// ============================================================================

/// Parse `--target`, rejecting unknown kinds up front.
fn parse_target(ws: &Workspace, target: Option<&str>) -> Result<Target> {
    let Some(raw) = target else {
        return Ok(Target::all());
    };
    let target: Target = raw
        .parse()
        .with_context(|| format!("Invalid target '{raw}': expected <kind> or <kind>.<name>"))?;
    if let Some(kind) = &target.kind {
        ws.registry.resource(kind)?;
    }
    Ok(target)
}

/// Plan every configured or tracked instance toward the config.
pub fn build_plan(ws: &Workspace, target: Option<&str>) -> Result<ExecutionPlan> {
    let target = parse_target(ws, target)?;
    let desired = ws.config.desired()?;
    let addresses: BTreeSet<&Address> = desired
        .keys()
        .chain(ws.state.addresses(None))
        .filter(|a| target.matches(a))
        .collect();

    let mut plan = ExecutionPlan::new();
    for address in addresses {
        let resource = ws
            .registry
            .resource(&address.kind)
            .with_context(|| format!("State tracks {address}"))?;
        plan.add(
            address.clone(),
            resource.clone(),
            ws.state.get(address).cloned(),
            desired.get(address).cloned(),
        );
    }
    log::debug!(
        "Planned {} ({} with errors)",
        ui::plural(plan.instances.len(), "instance"),
        plan.errors.len()
    );
    Ok(plan)
}

/// Plan the deletion of every tracked instance.
pub fn build_destroy_plan(ws: &Workspace, target: Option<&str>) -> Result<ExecutionPlan> {
    let target = parse_target(ws, target)?;
    let mut plan = ExecutionPlan::new();
    for (address, prior) in &ws.state.instances {
        if !target.matches(address) {
            continue;
        }
        let resource = ws.registry.resource(&address.kind)?;
        plan.add(address.clone(), resource.clone(), Some(prior.clone()), None);
    }
    Ok(plan)
}

fn refresh_targets(ws: &Workspace, target: Option<&str>) -> Result<Vec<RefreshTarget>> {
    let target = parse_target(ws, target)?;
    ws.state
        .instances
        .iter()
        .filter(|(address, _)| target.matches(address))
        .map(|(address, state)| -> Result<RefreshTarget> {
            Ok(RefreshTarget {
                address: address.clone(),
                resource: ws.registry.resource(&address.kind)?.clone(),
                state: state.clone(),
            })
        })
        .collect()
}

// ============================================================================
// Execution
// ============================================================================

/// Execute `plan` and record what every instance left behind.
///
/// The state file is written only when a recorded instance changed.
pub fn execute_plan<P, C>(
    ws: &mut Workspace,
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
    let report = declarative::execute(plan, opts, cancel, progress, confirm)?;
    record(ws, &report)?;
    Ok(report)
}

pub fn refresh_state<P: ProgressCallback>(
    ws: &mut Workspace,
    targets: &[RefreshTarget],
    opts: &ExecuteOptions,
    cancel: &CancelToken,
    progress: &mut P,
) -> Result<ExecuteReport> {
    let report = declarative::refresh(targets, opts, cancel, progress)?;
    record(ws, &report)?;
    Ok(report)
}

fn record(ws: &mut Workspace, report: &ExecuteReport) -> Result<()> {
    let serial = ws.state.serial;
    for outcome in &report.outcomes {
        ws.state.record(outcome);
    }
    if ws.state.serial != serial {
        ws.save_state()?;
    }
    Ok(())
}

/// Import the object `id` under `address` and save the state.
pub fn import_instance(
    ws: &mut Workspace,
    address: &Address,
    id: &str,
    ctx: &OperationContext,
) -> Result<AttributeTree> {
    if ws.state.get(address).is_some() {
        bail!("{address} is already tracked; run `beacon state rm {address}` first");
    }
    let resource = ws.registry.resource(&address.kind)?;
    let Some(grammar) = resource.import_grammar() else {
        bail!("Resource kind '{}' cannot be imported", address.kind);
    };

    let response = resource.import(ctx, id);
    for warning in response.diagnostics.warnings() {
        log::warn!("{address}: {warning}");
    }
    if let Some(err) = response.diagnostics.first_error() {
        bail!("Import of {address} failed: {err} (import ids look like {grammar})");
    }
    let state = response
        .state
        .with_context(|| format!("Import of {address} returned no state"))?;

    ws.state.set(address.clone(), state.clone());
    ws.save_state()?;
    Ok(state)
}
