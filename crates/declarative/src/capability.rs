//! Remote create/read/update/delete entry points for one kind.

use crate::adapter::PrimaryKey;
use crate::context::{Interrupted, OperationContext};
use std::fmt;

/// How an update reaches the remote object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateStrategy {
    /// Updated in place; the key is preserved.
    #[default]
    InPlace,
    /// Deleted and re-created; the key changes on every update.
    Replace,
}

impl fmt::Display for UpdateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InPlace => f.write_str("in-place"),
            Self::Replace => f.write_str("replace"),
        }
    }
}

/// Failure of a remote call.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// The object does not exist upstream.
    #[error("object not found")]
    NotFound,

    #[error(transparent)]
    Interrupted(#[from] Interrupted),

    /// The call succeeded but its response could not be decoded.
    #[error("undecodable response: {message}")]
    Undecodable {
        /// Key recovered from the raw response, if any.
        key: Option<PrimaryKey>,
        message: String,
    },

    #[error("{message}")]
    Failed {
        message: String,
        status: Option<u16>,
    },
}

impl RemoteError {
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

/// Remote operations for one kind.
///
/// Implementations own retries and must honour the context: stop when it is
/// cancelled and bound each request by its remaining time.
pub trait Capability: Send + Sync {
    type Arg;
    type Result;

    fn create(&self, ctx: &OperationContext, arg: &Self::Arg) -> Result<Self::Result, RemoteError>;

    fn read(&self, ctx: &OperationContext, key: PrimaryKey) -> Result<Self::Result, RemoteError>;

    fn update(
        &self,
        ctx: &OperationContext,
        key: PrimaryKey,
        arg: &Self::Arg,
    ) -> Result<Self::Result, RemoteError>;

    fn delete(&self, ctx: &OperationContext, key: PrimaryKey) -> Result<(), RemoteError>;

    fn update_strategy(&self) -> UpdateStrategy {
        UpdateStrategy::InPlace
    }
}
