//! Type-erased resource kinds
//!
//! [`ManagedResource`] is the object-safe face of a [`ResourceEngine`], so a
//! registry can hold engines of different kinds side by side.

use crate::adapter::ModelAdapter;
use crate::capability::{Capability, UpdateStrategy};
use crate::context::OperationContext;
use crate::diagnostics::Diagnostics;
use crate::diff::PlannedChange;
use crate::engine::{ResourceEngine, Response};
use crate::tree::AttributeTree;
use std::sync::Arc;

/// One resource kind, as seen by planners and executors
pub trait ManagedResource: Send + Sync {
    /// Kind name, the first half of an address
    fn type_name(&self) -> &'static str;

    fn update_strategy(&self) -> UpdateStrategy;

    /// Import id grammar, or `None` if the kind cannot be imported
    fn import_grammar(&self) -> Option<&'static str>;

    fn plan(
        &self,
        prior: Option<&AttributeTree>,
        desired: Option<&AttributeTree>,
    ) -> Result<PlannedChange, Diagnostics>;

    fn create(&self, ctx: &OperationContext, desired: &AttributeTree) -> Response;

    fn read(&self, ctx: &OperationContext, state: &AttributeTree) -> Response;

    fn update(&self, ctx: &OperationContext, prior: &AttributeTree, desired: &AttributeTree)
    -> Response;

    fn delete(&self, ctx: &OperationContext, state: &AttributeTree) -> Diagnostics;

    fn import(&self, ctx: &OperationContext, id: &str) -> Response;
}

/// A shared resource kind for type-erased storage
pub type SharedResource = Arc<dyn ManagedResource>;

impl<A, C> ManagedResource for ResourceEngine<A, C>
where
    A: ModelAdapter,
    C: Capability<Arg = A::Arg, Result = A::Result>,
{
    fn type_name(&self) -> &'static str {
        ResourceEngine::type_name(self)
    }

    fn update_strategy(&self) -> UpdateStrategy {
        ResourceEngine::update_strategy(self)
    }

    fn import_grammar(&self) -> Option<&'static str> {
        self.adapter().import_resolver().map(|r| r.grammar())
    }

    fn plan(
        &self,
        prior: Option<&AttributeTree>,
        desired: Option<&AttributeTree>,
    ) -> Result<PlannedChange, Diagnostics> {
        ResourceEngine::plan(self, prior, desired)
    }

    fn create(&self, ctx: &OperationContext, desired: &AttributeTree) -> Response {
        ResourceEngine::create(self, ctx, desired)
    }

    fn read(&self, ctx: &OperationContext, state: &AttributeTree) -> Response {
        ResourceEngine::read(self, ctx, state)
    }

    fn update(
        &self,
        ctx: &OperationContext,
        prior: &AttributeTree,
        desired: &AttributeTree,
    ) -> Response {
        ResourceEngine::update(self, ctx, prior, desired)
    }

    fn delete(&self, ctx: &OperationContext, state: &AttributeTree) -> Diagnostics {
        ResourceEngine::delete(self, ctx, state)
    }

    fn import(&self, ctx: &OperationContext, id: &str) -> Response {
        ResourceEngine::import(self, ctx, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{WidgetService, desired, engine};

    #[test]
    fn test_engine_as_shared_resource() {
        let resource: SharedResource = Arc::new(engine(WidgetService::default()));
        assert_eq!(resource.type_name(), "widget");
        assert_eq!(resource.update_strategy(), UpdateStrategy::InPlace);
        assert_eq!(resource.import_grammar(), Some("<id>"));

        let ctx = OperationContext::new();
        let state = resource.create(&ctx, &desired("gear")).state.unwrap();
        assert!(resource.read(&ctx, &state).state.is_some());
    }
}
