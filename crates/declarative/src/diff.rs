//! Diff computation between attribute trees

use crate::tree::{AttributePath, AttributeTree};
use crate::value::Value;
use std::collections::BTreeSet;
use std::fmt;

/// What happens to a single attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
}

/// A change to one attribute between two trees
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub path: AttributePath,
    pub kind: ChangeKind,
    pub before: Value,
    pub after: Value,
}

/// Compute field-level changes from `before` to `after`.
///
/// Nested objects are walked attribute by attribute; lists, sets and maps
/// are compared as whole values.
pub fn diff_trees(before: &AttributeTree, after: &AttributeTree) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    let names: BTreeSet<&String> = before
        .iter()
        .map(|(k, _)| k)
        .chain(after.iter().map(|(k, _)| k))
        .collect();
    for name in names {
        diff_value(
            AttributePath::root().attr(name.as_str()),
            before.get(name),
            after.get(name),
            &mut changes,
        );
    }
    changes
}

fn diff_value(path: AttributePath, before: &Value, after: &Value, out: &mut Vec<FieldChange>) {
    if before == after {
        return;
    }
    if let (Value::Object(b), Value::Object(a)) = (before, after) {
        let names: BTreeSet<&String> = b.keys().chain(a.keys()).collect();
        for name in names {
            diff_value(
                path.clone().attr(name.as_str()),
                b.get(name).unwrap_or(&Value::Null),
                a.get(name).unwrap_or(&Value::Null),
                out,
            );
        }
        return;
    }
    let kind = match (before.is_null(), after.is_null()) {
        (true, _) => ChangeKind::Added,
        (_, true) => ChangeKind::Removed,
        _ => ChangeKind::Modified,
    };
    out.push(FieldChange {
        path,
        kind,
        before: before.clone(),
        after: after.clone(),
    });
}

/// The action a plan takes for one instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    NoOp,
    Create,
    Update,
    /// Delete then create; the primary key changes
    Replace,
    Delete,
}

impl Action {
    /// Check if the action changes anything remotely
    pub fn is_change(self) -> bool {
        !matches!(self, Self::NoOp)
    }

    /// Plan symbol: `+`, `~`, `-/+`, `-`
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::NoOp => " ",
            Self::Create => "+",
            Self::Update => "~",
            Self::Replace => "-/+",
            Self::Delete => "-",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Self::NoOp => "no changes",
            Self::Create => "create",
            Self::Update => "update in-place",
            Self::Replace => "replace",
            Self::Delete => "destroy",
        };
        f.write_str(verb)
    }
}

/// A planned change for one instance
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedChange {
    pub action: Action,
    pub changes: Vec<FieldChange>,
}

impl PlannedChange {
    pub fn no_op() -> Self {
        Self {
            action: Action::NoOp,
            changes: Vec::new(),
        }
    }
}

/// Plan summary statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffSummary {
    /// Number of instances to create
    pub additions: usize,
    /// Number of instances to update in place
    pub modifications: usize,
    /// Number of instances to replace
    pub replacements: usize,
    /// Number of instances to destroy
    pub removals: usize,
}

impl DiffSummary {
    /// Create a summary from planned actions
    pub fn from_actions(actions: impl IntoIterator<Item = Action>) -> Self {
        let mut summary = Self::default();
        for action in actions {
            match action {
                Action::NoOp => {}
                Action::Create => summary.additions += 1,
                Action::Update => summary.modifications += 1,
                Action::Replace => summary.replacements += 1,
                Action::Delete => summary.removals += 1,
            }
        }
        summary
    }

    /// Total number of changes
    pub fn total(&self) -> usize {
        self.additions + self.modifications + self.replacements + self.removals
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn tree(pairs: &[(&str, Value)]) -> AttributeTree {
        pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect()
    }

    #[test]
    fn test_diff_trees_kinds() {
        let before = tree(&[("name", "a".into()), ("old", Value::Int(1)), ("same", Value::Bool(true))]);
        let after = tree(&[("name", "b".into()), ("new", Value::Int(2)), ("same", Value::Bool(true))]);

        let changes = diff_trees(&before, &after);
        let summary: Vec<(String, ChangeKind)> =
            changes.iter().map(|c| (c.path.to_string(), c.kind)).collect();
        assert_eq!(
            summary,
            vec![
                ("name".to_string(), ChangeKind::Modified),
                ("new".to_string(), ChangeKind::Added),
                ("old".to_string(), ChangeKind::Removed),
            ]
        );
    }

    #[test]
    fn test_diff_nested_objects() {
        let mut b = BTreeMap::new();
        b.insert("x".to_string(), Value::Int(1));
        b.insert("y".to_string(), Value::Int(1));
        let mut a = b.clone();
        a.insert("y".to_string(), Value::Int(2));

        let changes = diff_trees(
            &tree(&[("block", Value::Object(b))]),
            &tree(&[("block", Value::Object(a))]),
        );
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path.to_string(), "block.y");
    }

    #[test]
    fn test_identical_trees_have_no_changes() {
        let t = tree(&[("tags", Value::set(vec!["b".into(), "a".into()]))]);
        let reordered = tree(&[("tags", Value::Set(vec!["a".into(), "b".into()]))]);
        assert!(diff_trees(&t, &reordered).is_empty());
    }

    #[test]
    fn test_summary() {
        let summary = DiffSummary::from_actions([
            Action::Create,
            Action::NoOp,
            Action::Replace,
            Action::Delete,
            Action::Create,
        ]);
        assert_eq!(summary.additions, 2);
        assert_eq!(summary.replacements, 1);
        assert_eq!(summary.total(), 4);
        assert!(summary.has_changes());
        assert!(!DiffSummary::default().has_changes());
    }
}
