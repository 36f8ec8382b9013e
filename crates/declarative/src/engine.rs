//! The generic reconciliation engine.
//!
//! [`ResourceEngine`] drives one resource kind: it decodes attribute trees
//! through the kind's [`ModelAdapter`], calls its [`Capability`], and encodes
//! what the remote service returned back into a tree.
//!
//! Every operation returns the state the caller should record next:
//!
//! - `Some(tree)`: track this tree (on failure, the prior state or a stub
//!   that holds only the key of an object the service did create)
//! - `None`: the instance no longer exists and should be dropped
//!
//! The engine holds no mutable state and makes exactly one remote call per
//! operation (two for a replacing update). It never retries.

use crate::adapter::{ModelAdapter, PrimaryKey, PrimaryKeyed};
use crate::capability::{Capability, RemoteError, UpdateStrategy};
use crate::context::{Interrupted, OperationContext};
use crate::diagnostics::{Diagnostic, DiagnosticCategory, Diagnostics};
use crate::diff::{Action, PlannedChange, diff_trees};
use crate::tree::AttributeTree;
use log::debug;

/// Outcome of a create, read, update or import.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    /// State to record; `None` drops the instance.
    pub state: Option<AttributeTree>,
    pub diagnostics: Diagnostics,
}

impl Response {
    pub fn new(state: Option<AttributeTree>, diagnostics: Diagnostics) -> Self {
        Self { state, diagnostics }
    }

    fn failed(state: Option<AttributeTree>, diagnostics: impl Into<Diagnostics>) -> Self {
        Self::new(state, diagnostics.into())
    }

    pub fn has_error(&self) -> bool {
        self.diagnostics.has_error()
    }
}

/// Lifecycle controller for one resource kind.
pub struct ResourceEngine<A, C> {
    adapter: A,
    capability: C,
}

impl<A, C> ResourceEngine<A, C>
where
    A: ModelAdapter,
    C: Capability<Arg = A::Arg, Result = A::Result>,
{
    pub const fn new(adapter: A, capability: C) -> Self {
        Self {
            adapter,
            capability,
        }
    }

    pub const fn adapter(&self) -> &A {
        &self.adapter
    }

    pub const fn capability(&self) -> &C {
        &self.capability
    }

    pub fn type_name(&self) -> &'static str {
        self.adapter.type_name()
    }

    pub fn update_strategy(&self) -> UpdateStrategy {
        self.capability.update_strategy()
    }

    /// Create the object described by `desired`.
    pub fn create(&self, ctx: &OperationContext, desired: &AttributeTree) -> Response {
        let model = match self.adapter.get(desired) {
            Ok(model) => model,
            Err(diagnostics) => return Response::failed(None, diagnostics),
        };
        let arg = match self.argument(&model) {
            Ok(arg) => arg,
            Err(diagnostic) => return Response::failed(None, diagnostic),
        };
        self.create_from(ctx, &arg, &model)
    }

    fn create_from(&self, ctx: &OperationContext, arg: &A::Arg, plan: &A::Model) -> Response {
        if let Err(e) = ctx.check() {
            return Response::failed(None, self.interrupted("create", None, e));
        }
        debug!("{}: create", self.type_name());
        match self.capability.create(ctx, arg) {
            Ok(result) => self.settle("create", &result, Some(plan), None),
            Err(RemoteError::Undecodable {
                key: Some(key),
                message,
            }) => self.stranded("create", key, &message),
            Err(e) => Response::failed(None, self.remote("create", None, e)),
        }
    }

    /// Refresh `state` from the remote object.
    ///
    /// A missing object is not an error: the response carries no state and
    /// no diagnostics, and the caller drops the instance.
    pub fn read(&self, ctx: &OperationContext, state: &AttributeTree) -> Response {
        let keep = || Some(state.clone());
        let (prior, key) = match self.prior(state) {
            Ok(prior) => prior,
            Err(diagnostics) => return Response::failed(keep(), diagnostics),
        };
        if let Err(e) = ctx.check() {
            return Response::failed(keep(), self.interrupted("read", Some(key), e));
        }
        debug!("{}: read {key}", self.type_name());
        match self.capability.read(ctx, key) {
            Ok(result) => self.settle("read", &result, Some(&prior), Some(state)),
            Err(RemoteError::NotFound) => {
                debug!("{}: {key} no longer exists", self.type_name());
                Response::default()
            }
            Err(e) => Response::failed(keep(), self.remote("read", Some(key), e)),
        }
    }

    /// Move the object tracked by `prior` to `desired`.
    pub fn update(
        &self,
        ctx: &OperationContext,
        prior: &AttributeTree,
        desired: &AttributeTree,
    ) -> Response {
        let keep = || Some(prior.clone());
        let key = match self.prior(prior) {
            Ok((_, key)) => key,
            Err(diagnostics) => return Response::failed(keep(), diagnostics),
        };
        let model = match self.adapter.get(desired) {
            Ok(model) => model,
            Err(diagnostics) => return Response::failed(keep(), diagnostics),
        };
        let arg = match self.argument(&model) {
            Ok(arg) => arg,
            Err(diagnostic) => return Response::failed(keep(), diagnostic),
        };

        if self.update_strategy() == UpdateStrategy::Replace {
            return self.replace(ctx, key, &arg, &model, prior);
        }

        if let Err(e) = ctx.check() {
            return Response::failed(keep(), self.interrupted("update", Some(key), e));
        }
        debug!("{}: update {key}", self.type_name());
        match self.capability.update(ctx, key, &arg) {
            Ok(result) => self.settle("update", &result, Some(&model), Some(prior)),
            Err(e) => Response::failed(keep(), self.remote("update", Some(key), e)),
        }
    }

    /// Delete then create. If the create fails the old object is already
    /// gone, so no state is returned.
    fn replace(
        &self,
        ctx: &OperationContext,
        key: PrimaryKey,
        arg: &A::Arg,
        plan: &A::Model,
        prior: &AttributeTree,
    ) -> Response {
        if let Err(e) = ctx.check() {
            return Response::failed(Some(prior.clone()), self.interrupted("delete", Some(key), e));
        }
        debug!("{}: replace {key}", self.type_name());
        let mut diagnostics = Diagnostics::new();
        match self.capability.delete(ctx, key) {
            Ok(()) => {}
            Err(RemoteError::NotFound) => diagnostics.push(self.already_absent(key)),
            Err(e) => {
                return Response::failed(Some(prior.clone()), self.remote("delete", Some(key), e));
            }
        }
        let mut response = self.create_from(ctx, arg, plan);
        diagnostics.extend(response.diagnostics);
        response.diagnostics = diagnostics;
        response
    }

    /// Delete the object tracked by `state`.
    ///
    /// Deleting an object that is already gone succeeds with a warning.
    pub fn delete(&self, ctx: &OperationContext, state: &AttributeTree) -> Diagnostics {
        let key = match self.prior(state) {
            Ok((_, key)) => key,
            Err(diagnostics) => return diagnostics,
        };
        if let Err(e) = ctx.check() {
            return self.interrupted("delete", Some(key), e).into();
        }
        debug!("{}: delete {key}", self.type_name());
        match self.capability.delete(ctx, key) {
            Ok(()) => Diagnostics::new(),
            Err(RemoteError::NotFound) => self.already_absent(key).into(),
            Err(e) => self.remote("delete", Some(key), e).into(),
        }
    }

    /// Import an existing object by its import id.
    pub fn import(&self, ctx: &OperationContext, id: &str) -> Response {
        let Some(resolver) = self.adapter.import_resolver() else {
            return Response::failed(
                None,
                Diagnostic::error(
                    DiagnosticCategory::Validation,
                    "import not supported",
                    format!("{} objects cannot be imported", self.type_name()),
                ),
            );
        };
        let requested = match resolver.resolve_import(id) {
            Ok(model) => model,
            Err(diagnostics) => return Response::failed(None, diagnostics),
        };
        let key = match self.key_of(&requested) {
            Ok(key) => key,
            Err(diagnostic) => return Response::failed(None, diagnostic),
        };
        if let Err(e) = ctx.check() {
            return Response::failed(None, self.interrupted("import", Some(key), e));
        }
        debug!("{}: import {id:?} as {key}", self.type_name());
        let result = match self.capability.read(ctx, key) {
            Ok(result) => result,
            Err(RemoteError::NotFound) => {
                return Response::failed(
                    None,
                    Diagnostic::error(
                        DiagnosticCategory::Remote,
                        "cannot import non-existent object",
                        format!("{} {id:?} was not found", self.type_name()),
                    ),
                );
            }
            Err(e) => return Response::failed(None, self.remote("import", Some(key), e)),
        };
        let imported = match self.adapter.from_api_result(&result) {
            Ok(model) => self.preserve(model, Some(&requested)),
            Err(e) => return Response::failed(None, self.adapter_failure("decode import", &e)),
        };
        let diagnostics = resolver.verify_import(&requested, &imported);
        if diagnostics.has_error() {
            return Response::new(None, diagnostics);
        }
        Response::new(Some(self.adapter.encode(&imported)), diagnostics)
    }

    /// Decide what applying `desired` over `prior` would do. No I/O.
    ///
    /// An update is planned only when the arguments built from the two
    /// models differ, so unset optionals that resolve to their defaults
    /// never produce a change.
    pub fn plan(
        &self,
        prior: Option<&AttributeTree>,
        desired: Option<&AttributeTree>,
    ) -> Result<PlannedChange, Diagnostics> {
        match (prior, desired) {
            (None, None) => Ok(PlannedChange::no_op()),
            (None, Some(desired)) => {
                let model = self.adapter.get(desired)?;
                self.argument(&model)?;
                let planned = self.adapter.encode(&model);
                Ok(PlannedChange {
                    action: Action::Create,
                    changes: diff_trees(&AttributeTree::new(), &planned),
                })
            }
            (Some(prior), None) => {
                self.prior(prior)?;
                Ok(PlannedChange {
                    action: Action::Delete,
                    changes: diff_trees(prior, &AttributeTree::new()),
                })
            }
            (Some(prior), Some(desired)) => {
                let (prior_model, _) = self.prior(prior)?;
                let model = self.adapter.get(desired)?;
                let after = self.argument(&model)?;
                // A stub prior cannot build an argument; it always needs an update.
                let before = self.adapter.to_api_argument(&prior_model).ok();
                if before.as_ref() == Some(&after) {
                    return Ok(PlannedChange::no_op());
                }
                let action = match self.update_strategy() {
                    UpdateStrategy::InPlace => Action::Update,
                    UpdateStrategy::Replace => Action::Replace,
                };
                let planned = self.adapter.encode(&model);
                let changes = diff_trees(prior, &planned)
                    .into_iter()
                    .filter(|change| change.after.is_known())
                    .collect();
                Ok(PlannedChange { action, changes })
            }
        }
    }

    /// Decode recorded state and its key. A state that no longer decodes
    /// but still records a key is treated as a stub.
    fn prior(&self, state: &AttributeTree) -> Result<(A::Model, PrimaryKey), Diagnostics> {
        match self.adapter.get(state) {
            Ok(model) => {
                let key = self.key_of(&model)?;
                Ok((model, key))
            }
            Err(diagnostics) => match self.adapter.state_key(state) {
                Some(key) => {
                    debug!("{}: state for {key} is partial, using a stub", self.type_name());
                    Ok((self.adapter.stub_model(key), key))
                }
                None => Err(diagnostics),
            },
        }
    }

    fn argument(&self, model: &A::Model) -> Result<A::Arg, Diagnostic> {
        self.adapter
            .to_api_argument(model)
            .map_err(|e| self.adapter_failure("build request", &e))
    }

    fn key_of(&self, model: &A::Model) -> Result<PrimaryKey, Diagnostic> {
        self.adapter.model_key(model).ok_or_else(|| {
            Diagnostic::error(
                DiagnosticCategory::Decode,
                "missing id",
                format!("{} state does not carry an id", self.type_name()),
            )
        })
    }

    fn preserve(&self, observed: A::Model, plan: Option<&A::Model>) -> A::Model {
        match (self.adapter.plan_preserver(), plan) {
            (Some(preserver), Some(plan)) => preserver.preserve_plan_values(&observed, plan),
            _ => observed,
        }
    }

    /// Decode a successful result; if that fails keep `fallback`, or a stub
    /// holding the result's key.
    fn settle(
        &self,
        call: &str,
        result: &A::Result,
        plan: Option<&A::Model>,
        fallback: Option<&AttributeTree>,
    ) -> Response {
        match self.adapter.from_api_result(result) {
            Ok(observed) => {
                let model = self.preserve(observed, plan);
                Response::new(Some(self.adapter.encode(&model)), Diagnostics::new())
            }
            Err(e) => match fallback {
                Some(prior) => Response::failed(
                    Some(prior.clone()),
                    self.adapter_failure(&format!("decode {call} response"), &e),
                ),
                None => self.stranded(call, result.primary_key(), &format!("{e:#}")),
            },
        }
    }

    /// The service created an object we could not decode; track it by key.
    fn stranded(&self, call: &str, key: PrimaryKey, detail: &str) -> Response {
        log::warn!("{}: {call} returned undecodable object {key}", self.type_name());
        let stub = self.adapter.encode(&self.adapter.stub_model(key));
        Response::failed(
            Some(stub),
            Diagnostic::error(
                DiagnosticCategory::Adapter,
                format!("{call} {} {key} succeeded but its response could not be decoded", self.type_name()),
                format!("{detail}; the object is tracked by id only"),
            ),
        )
    }

    fn adapter_failure(&self, what: &str, err: &anyhow::Error) -> Diagnostic {
        Diagnostic::error(
            DiagnosticCategory::Adapter,
            format!("{}: failed to {what}", self.type_name()),
            format!("{err:#}"),
        )
    }

    fn already_absent(&self, key: PrimaryKey) -> Diagnostic {
        Diagnostic::warning(
            DiagnosticCategory::Remote,
            format!("{} {key} was already deleted", self.type_name()),
            "",
        )
    }

    fn interrupted(&self, call: &str, key: Option<PrimaryKey>, e: Interrupted) -> Diagnostic {
        self.remote(call, key, RemoteError::Interrupted(e))
    }

    fn remote(&self, call: &str, key: Option<PrimaryKey>, err: RemoteError) -> Diagnostic {
        let target = match key {
            Some(key) => format!("{} {key}", self.type_name()),
            None => self.type_name().to_string(),
        };
        match err {
            RemoteError::Interrupted(e) => Diagnostic::error(
                DiagnosticCategory::Cancelled,
                format!("{call} {target} interrupted"),
                e.to_string(),
            ),
            other => Diagnostic::error(
                DiagnosticCategory::Remote,
                format!("{call} {target} failed"),
                other.to_string(),
            ),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::context::CancelToken;
    use crate::value::{Attr, Value};

    fn ctx() -> OperationContext {
        OperationContext::new()
    }

    #[test]
    fn test_create_encodes_result_and_preserves_plan_values() {
        let engine = engine(WidgetService::default());
        let response = engine.create(&ctx(), &desired("gear"));
        assert!(response.diagnostics.is_empty(), "{}", response.diagnostics);

        let state = response.state.unwrap();
        assert_eq!(state.get("id"), &Value::string("100"));
        assert_eq!(state.get("label"), &Value::string("GEAR"));
        assert_eq!(state.get("size"), &Value::Int(1));
        assert_eq!(state.get("secret"), &Value::string("hunter2"));
        assert_eq!(engine.capability().calls(), 1);
    }

    #[test]
    fn test_create_then_read_is_consistent() {
        let engine = engine(WidgetService::default());
        let created = engine.create(&ctx(), &desired("gear")).state.unwrap();
        let read = engine.read(&ctx(), &created);
        assert!(!read.has_error());
        assert_eq!(read.state.unwrap(), created);
    }

    #[test]
    fn test_decode_failure_makes_no_remote_call() {
        let engine = engine(WidgetService::default());
        let mut tree = AttributeTree::new();
        tree.set("size", Value::Int(3));
        let response = engine.create(&ctx(), &tree);
        assert!(response.state.is_none());
        assert_eq!(
            response.diagnostics.first_error().unwrap().category,
            DiagnosticCategory::Decode
        );
        assert_eq!(engine.capability().calls(), 0);
    }

    #[test]
    fn test_remote_failure_names_the_call() {
        let engine = engine(WidgetService {
            reject_create: true,
            ..Default::default()
        });
        let response = engine.create(&ctx(), &desired("gear"));
        assert!(response.state.is_none());
        let err = response.diagnostics.first_error().unwrap();
        assert_eq!(err.category, DiagnosticCategory::Remote);
        assert_eq!(err.summary, "create widget failed");
        assert!(err.detail.contains("409"));
    }

    #[test]
    fn test_update_failure_keeps_prior_and_names_key() {
        let engine = engine(WidgetService::default());
        let mut prior = desired("gear");
        prior.set("id", Value::string("99"));
        let response = engine.update(&ctx(), &prior, &desired("cog"));
        assert_eq!(response.state.as_ref(), Some(&prior));
        assert_eq!(response.diagnostics.first_error().unwrap().summary, "update widget 99 failed");
    }

    #[test]
    fn test_undecodable_create_keeps_the_key() {
        let engine = engine(WidgetService {
            garble_create: true,
            ..Default::default()
        });
        let response = engine.create(&ctx(), &desired("gear"));
        assert!(response.has_error());
        let stub = response.state.unwrap();
        assert_eq!(stub.get("id"), &Value::string("100"));
        assert!(stub.get("name").is_null());
        assert_eq!(
            response.diagnostics.first_error().unwrap().category,
            DiagnosticCategory::Adapter
        );
    }

    #[test]
    fn test_result_conversion_failure_keeps_the_key() {
        let engine = engine(WidgetService::default());
        let response = engine.create(&ctx(), &desired("corrupt"));
        assert!(response.has_error());
        assert_eq!(response.state.unwrap().get("id"), &Value::string("100"));
    }

    #[test]
    fn test_stub_state_plans_an_update() {
        let engine = engine(WidgetService::default());
        let stub = engine.adapter().encode(&engine.adapter().stub_model(PrimaryKey::new(5)));
        let change = engine.plan(Some(&stub), Some(&desired("gear"))).unwrap();
        assert_eq!(change.action, Action::Update);
    }

    #[test]
    fn test_read_missing_object_drops_without_error() {
        let engine = engine(WidgetService::default());
        let state = engine.create(&ctx(), &desired("gear")).state.unwrap();

        assert!(engine.delete(&ctx(), &state).is_empty());
        let read = engine.read(&ctx(), &state);
        assert!(read.state.is_none());
        assert!(read.diagnostics.is_empty());
    }

    #[test]
    fn test_delete_already_absent_is_a_warning() {
        let engine = engine(WidgetService::default());
        let state = engine.create(&ctx(), &desired("gear")).state.unwrap();
        engine.delete(&ctx(), &state);

        let diags = engine.delete(&ctx(), &state);
        assert!(!diags.has_error());
        assert_eq!(diags.warnings().count(), 1);
    }

    #[test]
    fn test_update_in_place_keeps_key() {
        let engine = engine(WidgetService::default());
        let prior = engine.create(&ctx(), &desired("gear")).state.unwrap();
        let response = engine.update(&ctx(), &prior, &desired("cog"));
        let state = response.state.unwrap();
        assert_eq!(state.get("id"), prior.get("id"));
        assert_eq!(state.get("label"), &Value::string("COG"));
        assert_eq!(engine.capability().calls(), 2);
    }

    #[test]
    fn test_replace_changes_key() {
        let engine = engine(WidgetService {
            strategy: UpdateStrategy::Replace,
            ..Default::default()
        });
        let prior = engine.create(&ctx(), &desired("gear")).state.unwrap();
        let response = engine.update(&ctx(), &prior, &desired("cog"));
        let state = response.state.unwrap();
        assert_eq!(state.get("id"), &Value::string("101"));
        assert_eq!(engine.capability().objects.lock().unwrap().len(), 1);
        // create + delete + create
        assert_eq!(engine.capability().calls(), 3);
    }

    #[test]
    fn test_replace_failing_create_drops_state() {
        let service = WidgetService {
            strategy: UpdateStrategy::Replace,
            ..Default::default()
        };
        let engine = engine(service);
        let prior = engine.create(&ctx(), &desired("gear")).state.unwrap();

        let rejecting = ResourceEngine::new(
            WidgetAdapter,
            WidgetService {
                strategy: UpdateStrategy::Replace,
                reject_create: true,
                objects: std::sync::Mutex::new(engine.capability().objects.lock().unwrap().clone()),
                ..Default::default()
            },
        );
        let response = rejecting.update(&ctx(), &prior, &desired("cog"));
        assert!(response.state.is_none());
        assert!(response.has_error());
        assert!(rejecting.capability().objects.lock().unwrap().is_empty());
    }

    #[test]
    fn test_cancelled_context_makes_no_remote_call() {
        let engine = engine(WidgetService::default());
        let token = CancelToken::new();
        token.cancel();
        let ctx = OperationContext::new().with_cancel(token);

        let response = engine.create(&ctx, &desired("gear"));
        assert!(response.state.is_none());
        assert_eq!(
            response.diagnostics.first_error().unwrap().category,
            DiagnosticCategory::Cancelled
        );
        assert_eq!(engine.capability().calls(), 0);
    }

    #[test]
    fn test_preserver_is_idempotent() {
        let adapter = WidgetAdapter;
        let preserver = adapter.plan_preserver().unwrap();
        let plan = adapter.get(&desired("gear")).unwrap();
        let result = Widget {
            id: Attr::Known(PrimaryKey::new(1)),
            name: Attr::Known("gear".into()),
            size: Attr::Known(1),
            label: Attr::Known("GEAR".into()),
            secret: Attr::Null,
        };
        let once = preserver.preserve_plan_values(&result, &plan);
        let twice = preserver.preserve_plan_values(&once, &plan);
        assert_eq!(once, twice);
        assert_eq!(once.secret, Attr::Known("hunter2".into()));
    }

    #[test]
    fn test_default_resolves_to_no_diff() {
        let engine = engine(WidgetService::default());
        let desired = desired("gear");
        assert!(desired.get("size").is_null());
        let state = engine.create(&ctx(), &desired).state.unwrap();

        let change = engine.plan(Some(&state), Some(&desired)).unwrap();
        assert_eq!(change.action, Action::NoOp);

        // Same value written explicitly is still no diff.
        let mut explicit = desired.clone();
        explicit.set("size", Value::Int(1));
        assert_eq!(engine.plan(Some(&state), Some(&explicit)).unwrap().action, Action::NoOp);
    }

    #[test]
    fn test_plan_actions() {
        let engine = engine(WidgetService::default());
        let state = engine.create(&ctx(), &desired("gear")).state.unwrap();

        let create = engine.plan(None, Some(&desired("gear"))).unwrap();
        assert_eq!(create.action, Action::Create);

        let update = engine.plan(Some(&state), Some(&desired("cog"))).unwrap();
        assert_eq!(update.action, Action::Update);
        let paths: Vec<String> = update.changes.iter().map(|c| c.path.to_string()).collect();
        assert_eq!(paths, vec!["name"]);

        let delete = engine.plan(Some(&state), None).unwrap();
        assert_eq!(delete.action, Action::Delete);

        assert_eq!(engine.plan(None, None).unwrap().action, Action::NoOp);
        assert!(engine.plan(None, Some(&AttributeTree::new())).is_err());
    }

    #[test]
    fn test_plan_replace_strategy() {
        let engine = engine(WidgetService {
            strategy: UpdateStrategy::Replace,
            ..Default::default()
        });
        let state = engine.create(&ctx(), &desired("gear")).state.unwrap();
        let change = engine.plan(Some(&state), Some(&desired("cog"))).unwrap();
        assert_eq!(change.action, Action::Replace);
    }

    #[test]
    fn test_import_reads_by_key() {
        let engine = engine(WidgetService::default());
        engine.create(&ctx(), &desired("gear"));

        let response = engine.import(&ctx(), "100");
        assert!(!response.has_error());
        let state = response.state.unwrap();
        assert_eq!(state.get("name"), &Value::string("gear"));
        assert!(state.get("secret").is_null());

        let missing = engine.import(&ctx(), "7");
        assert!(missing.state.is_none());
        assert!(missing.has_error());

        let malformed = engine.import(&ctx(), "gear");
        assert_eq!(
            malformed.diagnostics.first_error().unwrap().category,
            DiagnosticCategory::Validation
        );
    }
}
