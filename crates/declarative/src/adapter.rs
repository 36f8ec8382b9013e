//! The per-kind adapter contract.
//!
//! A [`ModelAdapter`] translates between an attribute tree and three typed
//! records: the `Model` (tree-shaped, every field an `Attr`), the `Arg` the
//! remote create/update call accepts, and the `Result` it returns. Mapping
//! is written field by field for each kind.

use crate::diagnostics::{Diagnostic, DiagnosticCategory, Diagnostics};
use crate::tree::{AttributeTree, DecodeError, FromValue, IntoValue};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity of a remote object, minted by create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrimaryKey(i64);

impl PrimaryKey {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PrimaryKey {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// Keys are stored as their decimal text; integers are accepted on input.
impl FromValue for PrimaryKey {
    fn from_value(value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::Int(i) => Ok(Self(*i)),
            Value::String(s) => s
                .parse()
                .map_err(|_| DecodeError::other(format!("{s:?} is not a numeric id"))),
            other => Err(DecodeError::wrong_kind("id", other)),
        }
    }
}

impl IntoValue for PrimaryKey {
    fn to_value(&self) -> Value {
        Value::String(self.to_string())
    }
}

/// Anything that carries its remote identity.
pub trait PrimaryKeyed {
    fn primary_key(&self) -> PrimaryKey;
}

/// Translation between attribute trees and typed API records for one kind.
pub trait ModelAdapter: Send + Sync {
    type Model: Clone + fmt::Debug + Send + Sync;
    /// Concrete create/update payload; equal args mean no update is needed.
    type Arg: PartialEq + fmt::Debug + Send + Sync;
    type Result: PrimaryKeyed + fmt::Debug + Send + Sync;

    /// Kind name used in addresses and diagnostics.
    fn type_name(&self) -> &'static str;

    /// Structural decode. Rejects trees missing required attributes.
    fn get(&self, tree: &AttributeTree) -> Result<Self::Model, Diagnostics>;

    /// Encode a model back into a tree, keeping null and unknown markers.
    fn encode(&self, model: &Self::Model) -> AttributeTree;

    fn model_key(&self, model: &Self::Model) -> Option<PrimaryKey>;

    /// Key recorded in a state tree, even one that no longer decodes
    /// (such as a stub left by a stranded create).
    fn state_key(&self, tree: &AttributeTree) -> Option<PrimaryKey> {
        PrimaryKey::from_value(tree.get("id")).ok()
    }

    /// Resolve every optional attribute to its default and build the payload.
    fn to_api_argument(&self, model: &Self::Model) -> anyhow::Result<Self::Arg>;

    /// Populate every attribute the schema declares from a remote result.
    fn from_api_result(&self, result: &Self::Result) -> anyhow::Result<Self::Model>;

    /// A model that holds only `key`, used to keep track of stranded objects.
    fn stub_model(&self, key: PrimaryKey) -> Self::Model;

    fn plan_preserver(&self) -> Option<&dyn PlanPreserver<Self::Model>> {
        None
    }

    fn import_resolver(&self) -> Option<&dyn ImportResolver<Self::Model>> {
        None
    }
}

/// Re-inject client-known values the server does not echo back.
///
/// Must be pure and idempotent:
/// `preserve(&preserve(r, p), p) == preserve(r, p)`.
pub trait PlanPreserver<M>: Send + Sync {
    fn preserve_plan_values(&self, result: &M, plan: &M) -> M;
}

/// Build the minimal model needed to read an object from an import id.
pub trait ImportResolver<M>: Send + Sync {
    /// Import id grammar, shown to users.
    fn grammar(&self) -> &'static str {
        "<id>"
    }

    fn resolve_import(&self, id: &str) -> Result<M, Diagnostics>;

    /// Check the imported object against what the id asked for.
    fn verify_import(&self, _requested: &M, _imported: &M) -> Diagnostics {
        Diagnostics::new()
    }
}

/// Parse the default import id grammar: the decimal primary key.
pub fn parse_import_key(id: &str) -> Result<PrimaryKey, Diagnostics> {
    id.trim().parse().map_err(|_| {
        Diagnostics::from(Diagnostic::error(
            DiagnosticCategory::Validation,
            "invalid import id",
            format!("{id:?} is not a numeric id"),
        ))
    })
}
