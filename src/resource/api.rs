//! REST capability shared by every resource kind

use beaconapi::{CallOptions, Client, Error};
use declarative::{
    Capability, Interrupted, OperationContext, PrimaryKey, RemoteError, UpdateStrategy,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;

/// Create/read/update/delete over one API collection.
///
/// `A` is the request body, `R` the decoded response.
pub struct RestCapability<A, R> {
    client: Client,
    collection: &'static str,
    strategy: UpdateStrategy,
    _types: PhantomData<fn(&A) -> R>,
}

impl<A, R> RestCapability<A, R> {
    pub fn new(client: Client, collection: &'static str) -> Self {
        Self {
            client,
            collection,
            strategy: UpdateStrategy::InPlace,
            _types: PhantomData,
        }
    }

    /// Every update deletes the object and creates a new one.
    #[must_use]
    pub fn replacing(mut self) -> Self {
        self.strategy = UpdateStrategy::Replace;
        self
    }
}

fn call_options(ctx: &OperationContext) -> CallOptions<'_> {
    CallOptions::new()
        .with_deadline(ctx.deadline())
        .with_cancel(ctx.cancel_token().flag())
}

/// Map client errors onto the engine's remote error.
pub fn remote_error(err: Error) -> RemoteError {
    match err {
        Error::Cancelled => Interrupted::Cancelled.into(),
        Error::DeadlineExceeded => Interrupted::DeadlineExceeded.into(),
        Error::Decode { id, message } => RemoteError::Undecodable {
            key: id.map(PrimaryKey::new),
            message,
        },
        err if err.is_not_found() => RemoteError::NotFound,
        err => {
            let category = err.category();
            log::debug!("{}: {}", category.description(), category.advice());
            RemoteError::Failed {
                message: err.to_string(),
                status: err.status(),
            }
        }
    }
}

impl<A, R> Capability for RestCapability<A, R>
where
    A: Serialize + Send + Sync,
    R: DeserializeOwned + Send + Sync,
{
    type Arg = A;
    type Result = R;

    fn create(&self, ctx: &OperationContext, arg: &A) -> Result<R, RemoteError> {
        self.client
            .create(&call_options(ctx), self.collection, arg)
            .map_err(remote_error)
    }

    fn read(&self, ctx: &OperationContext, key: PrimaryKey) -> Result<R, RemoteError> {
        self.client
            .get(&call_options(ctx), self.collection, key.get())
            .map_err(remote_error)
    }

    fn update(&self, ctx: &OperationContext, key: PrimaryKey, arg: &A) -> Result<R, RemoteError> {
        self.client
            .update(&call_options(ctx), self.collection, key.get(), arg)
            .map_err(remote_error)
    }

    fn delete(&self, ctx: &OperationContext, key: PrimaryKey) -> Result<(), RemoteError> {
        self.client
            .delete(&call_options(ctx), self.collection, key.get())
            .map_err(remote_error)
    }

    fn update_strategy(&self) -> UpdateStrategy {
        self.strategy
    }
}
