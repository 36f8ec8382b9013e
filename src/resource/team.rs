//! Team resource - a named group of people

use super::{RestCapability, known};
use beaconapi::Client;
use declarative::{
    Attr, AttributeTree, Diagnostics, ImportResolver, ModelAdapter, PrimaryKey, PrimaryKeyed,
    Reader, ResourceEngine, SharedResource, Writer, parse_import_key,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

pub const KIND: &str = "team";
const COLLECTION: &str = "teams";

#[derive(Debug, Clone, PartialEq)]
pub struct Team {
    pub id: Attr<PrimaryKey>,
    pub name: Attr<String>,
    pub description: Attr<String>,
    /// Member emails
    pub members: Attr<BTreeSet<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamArg {
    pub name: String,
    pub description: String,
    pub members: BTreeSet<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeamResult {
    pub id: PrimaryKey,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub members: BTreeSet<String>,
}

impl PrimaryKeyed for TeamResult {
    fn primary_key(&self) -> PrimaryKey {
        self.id
    }
}

pub struct TeamAdapter;

impl ModelAdapter for TeamAdapter {
    type Model = Team;
    type Arg = TeamArg;
    type Result = TeamResult;

    fn type_name(&self) -> &'static str {
        KIND
    }

    fn get(&self, tree: &AttributeTree) -> Result<Team, Diagnostics> {
        let mut r = Reader::new(tree);
        let model = Team {
            id: r.optional("id"),
            name: r.required("name"),
            description: r.optional("description"),
            members: r.optional("members"),
        };
        r.finish(model)
    }

    fn encode(&self, model: &Team) -> AttributeTree {
        let mut w = Writer::new();
        w.set("id", &model.id)
            .set("name", &model.name)
            .set("description", &model.description)
            .set("members", &model.members);
        w.finish()
    }

    fn model_key(&self, model: &Team) -> Option<PrimaryKey> {
        model.id.known().copied()
    }

    fn to_api_argument(&self, model: &Team) -> anyhow::Result<TeamArg> {
        Ok(TeamArg {
            name: known(&model.name, "name")?,
            description: model.description.value_or(String::new()),
            members: model.members.value_or(BTreeSet::new()),
        })
    }

    fn from_api_result(&self, result: &TeamResult) -> anyhow::Result<Team> {
        Ok(Team {
            id: Attr::Known(result.id),
            name: Attr::Known(result.name.clone()),
            description: Attr::Known(result.description.clone()),
            members: Attr::Known(result.members.clone()),
        })
    }

    fn stub_model(&self, key: PrimaryKey) -> Team {
        Team {
            id: Attr::Known(key),
            name: Attr::Null,
            description: Attr::Null,
            members: Attr::Null,
        }
    }

    fn import_resolver(&self) -> Option<&dyn ImportResolver<Team>> {
        Some(self)
    }
}

impl ImportResolver<Team> for TeamAdapter {
    fn resolve_import(&self, id: &str) -> Result<Team, Diagnostics> {
        Ok(self.stub_model(parse_import_key(id)?))
    }
}

pub fn resource(client: Client) -> SharedResource {
    Arc::new(ResourceEngine::new(
        TeamAdapter,
        RestCapability::<TeamArg, TeamResult>::new(client, COLLECTION),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::testing::{mock_client, tree};
    use beaconapi::MockBackend;
    use declarative::{Action, OperationContext, Value};
    use serde_json::json;

    fn desired() -> AttributeTree {
        tree(&[
            ("name", Value::string("Platform")),
            (
                "members",
                Value::List(vec!["b@example.com".into(), "a@example.com".into()]),
            ),
        ])
    }

    #[test]
    fn test_create_then_read() {
        let mock = MockBackend::new();
        let team = resource(mock_client(&mock));
        let ctx = OperationContext::new();

        let response = team.create(&ctx, &desired());
        assert!(response.diagnostics.is_empty(), "{}", response.diagnostics);
        let state = response.state.unwrap();
        assert_eq!(state.get("id"), &Value::string("1"));
        assert_eq!(state.get("description"), &Value::string(""));
        assert_eq!(
            state.get("members"),
            &Value::set(vec!["a@example.com".into(), "b@example.com".into()])
        );

        let read = team.read(&ctx, &state);
        assert_eq!(read.state.as_ref(), Some(&state));
        assert_eq!(mock.get("teams", 1).unwrap()["description"], json!(""));
    }

    #[test]
    fn test_default_description_plans_no_change() {
        let mock = MockBackend::new();
        let team = resource(mock_client(&mock));
        let state = team.create(&OperationContext::new(), &desired()).state.unwrap();

        let plan = team.plan(Some(&state), Some(&desired())).unwrap();
        assert_eq!(plan.action, Action::NoOp);

        let mut renamed = desired();
        renamed.set("name", Value::string("Infra"));
        let plan = team.plan(Some(&state), Some(&renamed)).unwrap();
        assert_eq!(plan.action, Action::Update);
        assert_eq!(plan.changes.len(), 1);
        assert_eq!(plan.changes[0].path.to_string(), "name");
    }

    #[test]
    fn test_member_order_is_irrelevant() {
        let mock = MockBackend::new();
        let team = resource(mock_client(&mock));
        let state = team.create(&OperationContext::new(), &desired()).state.unwrap();

        let mut reordered = desired();
        reordered.set(
            "members",
            Value::List(vec!["a@example.com".into(), "b@example.com".into()]),
        );
        assert_eq!(team.plan(Some(&state), Some(&reordered)).unwrap().action, Action::NoOp);
    }

    #[test]
    fn test_import_by_id() {
        let mock = MockBackend::new();
        let id = mock.insert("teams", json!({"name": "Ops", "members": ["x@example.com"]}));
        let team = resource(mock_client(&mock));

        let response = team.import(&OperationContext::new(), &id.to_string());
        let state = response.state.unwrap();
        assert_eq!(state.get("name"), &Value::string("Ops"));

        let response = team.import(&OperationContext::new(), "ops");
        assert!(response.has_error());
        assert!(response.state.is_none());
    }

    #[test]
    fn test_missing_name_is_rejected_without_a_call() {
        let mock = MockBackend::new();
        let team = resource(mock_client(&mock));
        let response = team.create(&OperationContext::new(), &tree(&[]));
        assert!(response.has_error());
        assert!(mock.requests().is_empty());
    }
}
