//! Escalation policy resource - who gets paged, and when
//!
//! Policies are immutable upstream: any change replaces the policy and it
//! gets a new id. Step targets are configured as team ids, but the API
//! answers with team names, so the configured ids are carried over from the
//! plan whenever a step still has the same number of targets.

use super::{RestCapability, known};
use anyhow::Context;
use beaconapi::Client;
use declarative::{
    Attr, AttributeTree, Diagnostics, ImportResolver, ModelAdapter, PlanPreserver, PrimaryKey,
    PrimaryKeyed, Reader, ResourceEngine, SharedResource, Writer, parse_import_key,
};
use scalar::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

pub const KIND: &str = "escalation_policy";
const COLLECTION: &str = "escalation_policies";

#[derive(Debug, Clone, PartialEq)]
pub struct EscalationPolicy {
    pub id: Attr<PrimaryKey>,
    pub name: Attr<String>,
    pub description: Attr<String>,
    /// Times the whole policy repeats after the last step
    pub repeat: Attr<i64>,
    pub steps: Attr<Vec<Step>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Wait before paging this step
    pub delay: Attr<Duration>,
    /// Team ids (or team names, as echoed by the API)
    pub targets: Attr<BTreeSet<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EscalationPolicyArg {
    pub name: String,
    pub description: String,
    pub repeat: i64,
    pub steps: Vec<StepArg>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepArg {
    pub delay: Duration,
    pub targets: Vec<PrimaryKey>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EscalationPolicyResult {
    pub id: PrimaryKey,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub repeat: i64,
    #[serde(default)]
    pub steps: Vec<StepResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StepResult {
    pub delay: Duration,
    #[serde(default)]
    pub targets: Vec<String>,
}

impl PrimaryKeyed for EscalationPolicyResult {
    fn primary_key(&self) -> PrimaryKey {
        self.id
    }
}

pub struct EscalationPolicyAdapter;

struct KeepTargetIds;

impl PlanPreserver<EscalationPolicy> for KeepTargetIds {
    fn preserve_plan_values(
        &self,
        result: &EscalationPolicy,
        plan: &EscalationPolicy,
    ) -> EscalationPolicy {
        let steps = match (&result.steps, &plan.steps) {
            (Attr::Known(observed), Attr::Known(planned)) if observed.len() == planned.len() => {
                Attr::Known(
                    observed
                        .iter()
                        .zip(planned)
                        .map(|(o, p)| Step {
                            targets: restore_targets(&o.targets, &p.targets),
                            ..o.clone()
                        })
                        .collect(),
                )
            }
            _ => result.steps.clone(),
        };
        EscalationPolicy {
            steps,
            ..result.clone()
        }
    }
}

fn restore_targets(
    observed: &Attr<BTreeSet<String>>,
    planned: &Attr<BTreeSet<String>>,
) -> Attr<BTreeSet<String>> {
    match (observed, planned) {
        (Attr::Known(o), Attr::Known(p)) if o.len() == p.len() => planned.clone(),
        _ => observed.clone(),
    }
}

impl ModelAdapter for EscalationPolicyAdapter {
    type Model = EscalationPolicy;
    type Arg = EscalationPolicyArg;
    type Result = EscalationPolicyResult;

    fn type_name(&self) -> &'static str {
        KIND
    }

    fn get(&self, tree: &AttributeTree) -> Result<EscalationPolicy, Diagnostics> {
        let mut r = Reader::new(tree);
        let model = EscalationPolicy {
            id: r.optional("id"),
            name: r.required("name"),
            description: r.optional("description"),
            repeat: r.optional("repeat"),
            steps: r.blocks("step", |b| Step {
                delay: b.required("delay"),
                targets: b.optional("targets"),
            }),
        };
        r.finish(model)
    }

    fn encode(&self, model: &EscalationPolicy) -> AttributeTree {
        let mut w = Writer::new();
        w.set("id", &model.id)
            .set("name", &model.name)
            .set("description", &model.description)
            .set("repeat", &model.repeat);
        w.blocks("step", &model.steps, |step, b| {
            b.set("delay", &step.delay).set("targets", &step.targets);
        });
        w.finish()
    }

    fn model_key(&self, model: &EscalationPolicy) -> Option<PrimaryKey> {
        model.id.known().copied()
    }

    fn to_api_argument(&self, model: &EscalationPolicy) -> anyhow::Result<EscalationPolicyArg> {
        let repeat = model.repeat.value_or(0);
        if repeat < 0 {
            anyhow::bail!("repeat must not be negative, got {repeat}");
        }
        let steps = model
            .steps
            .value_or(Vec::new())
            .iter()
            .enumerate()
            .map(|(i, step)| step_argument(step).with_context(|| format!("step[{i}]")))
            .collect::<anyhow::Result<_>>()?;
        Ok(EscalationPolicyArg {
            name: known(&model.name, "name")?,
            description: model.description.value_or(String::new()),
            repeat,
            steps,
        })
    }

    fn from_api_result(&self, result: &EscalationPolicyResult) -> anyhow::Result<EscalationPolicy> {
        let steps = result
            .steps
            .iter()
            .map(|step| Step {
                delay: Attr::Known(step.delay),
                targets: Attr::Known(step.targets.iter().cloned().collect()),
            })
            .collect();
        Ok(EscalationPolicy {
            id: Attr::Known(result.id),
            name: Attr::Known(result.name.clone()),
            description: Attr::Known(result.description.clone()),
            repeat: Attr::Known(result.repeat),
            steps: Attr::Known(steps),
        })
    }

    fn stub_model(&self, key: PrimaryKey) -> EscalationPolicy {
        EscalationPolicy {
            id: Attr::Known(key),
            name: Attr::Null,
            description: Attr::Null,
            repeat: Attr::Null,
            steps: Attr::Null,
        }
    }

    fn plan_preserver(&self) -> Option<&dyn PlanPreserver<EscalationPolicy>> {
        Some(&KeepTargetIds)
    }

    fn import_resolver(&self) -> Option<&dyn ImportResolver<EscalationPolicy>> {
        Some(self)
    }
}

fn step_argument(step: &Step) -> anyhow::Result<StepArg> {
    let delay = known(&step.delay, "delay")?;
    if delay.is_negative() {
        anyhow::bail!("delay must not be negative, got {delay}");
    }
    let mut targets = step
        .targets
        .value_or(BTreeSet::new())
        .iter()
        .map(|t| {
            t.parse::<PrimaryKey>()
                .with_context(|| format!("target {t:?} is not a team id"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    targets.sort();
    Ok(StepArg { delay, targets })
}

impl ImportResolver<EscalationPolicy> for EscalationPolicyAdapter {
    fn resolve_import(&self, id: &str) -> Result<EscalationPolicy, Diagnostics> {
        Ok(self.stub_model(parse_import_key(id)?))
    }
}

pub fn resource(client: Client) -> SharedResource {
    Arc::new(ResourceEngine::new(
        EscalationPolicyAdapter,
        RestCapability::<EscalationPolicyArg, EscalationPolicyResult>::new(client, COLLECTION)
            .replacing(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::testing::{mock_client, tree};
    use beaconapi::{Method, MockBackend};
    use declarative::{Action, OperationContext, Value};
    use serde_json::{Value as Json, json};
    use std::collections::BTreeMap;

    /// A backend that echoes step targets as team names.
    fn mock() -> MockBackend {
        let mock = MockBackend::new();
        mock.on_store(COLLECTION, |object| {
            if let Some(Json::Array(steps)) = object.get_mut("steps") {
                for step in steps {
                    if let Some(Json::Array(targets)) = step.get_mut("targets") {
                        for target in targets.iter_mut() {
                            if let Some(id) = target.as_i64() {
                                *target = json!(format!("team-{id}"));
                            }
                        }
                    }
                }
            }
        });
        mock
    }

    fn step(delay: &str, targets: &[&str]) -> Value {
        let mut entries = BTreeMap::new();
        entries.insert("delay".to_string(), Value::string(delay));
        entries.insert(
            "targets".to_string(),
            Value::List(targets.iter().map(|t| Value::from(*t)).collect()),
        );
        Value::Object(entries)
    }

    fn desired(first_delay: &str) -> AttributeTree {
        tree(&[
            ("name", Value::string("primary")),
            (
                "step",
                Value::List(vec![step(first_delay, &["7", "4"]), step("30m", &["9"])]),
            ),
        ])
    }

    fn targets(state: &AttributeTree, index: usize) -> Value {
        let steps = state.get("step").as_elements().unwrap();
        steps[index].as_entries().unwrap()["targets"].clone()
    }

    #[test]
    fn test_create_restores_target_ids() {
        let mock = mock();
        let policy = resource(mock_client(&mock));
        let ctx = OperationContext::new();

        let state = policy.create(&ctx, &desired("5m")).state.unwrap();
        assert_eq!(targets(&state, 0), Value::set(vec!["4".into(), "7".into()]));
        assert_eq!(state.get("repeat"), &Value::Int(0));

        let stored = mock.get(COLLECTION, 1).unwrap();
        assert_eq!(stored["steps"][0]["targets"], json!(["team-4", "team-7"]));
        assert_eq!(stored["steps"][0]["delay"], json!("5m0s"));

        let refreshed = policy.read(&ctx, &state).state.unwrap();
        assert_eq!(refreshed, state);
        assert_eq!(policy.plan(Some(&refreshed), Some(&desired("5m"))).unwrap().action, Action::NoOp);
    }

    #[test]
    fn test_change_replaces_policy() {
        let mock = mock();
        let policy = resource(mock_client(&mock));
        let ctx = OperationContext::new();
        let state = policy.create(&ctx, &desired("5m")).state.unwrap();

        let plan = policy.plan(Some(&state), Some(&desired("10m"))).unwrap();
        assert_eq!(plan.action, Action::Replace);
        assert_eq!(plan.changes[0].path.to_string(), "step");

        let response = policy.update(&ctx, &state, &desired("10m"));
        assert!(response.diagnostics.is_empty(), "{}", response.diagnostics);
        let replaced = response.state.unwrap();
        assert_eq!(replaced.get("id"), &Value::string("2"));
        assert!(mock.get(COLLECTION, 1).is_none());

        let methods: Vec<Method> = mock.requests().iter().map(|(m, _)| *m).collect();
        assert_eq!(methods, vec![Method::Post, Method::Delete, Method::Post]);
    }

    #[test]
    fn test_target_count_change_keeps_echoed_names() {
        let result = EscalationPolicy {
            id: Attr::Known(PrimaryKey::new(1)),
            name: Attr::Known("primary".to_string()),
            description: Attr::Known(String::new()),
            repeat: Attr::Known(0),
            steps: Attr::Known(vec![Step {
                delay: Attr::Known(Duration::from_secs(300)),
                targets: Attr::Known(["team-4".to_string()].into_iter().collect()),
            }]),
        };
        let plan = EscalationPolicyAdapter.get(&desired("5m")).unwrap();

        // Step counts differ: nothing to line up against.
        let kept = KeepTargetIds.preserve_plan_values(&result, &plan);
        assert_eq!(kept, result);
    }

    #[test]
    fn test_preserver_is_idempotent() {
        let plan = EscalationPolicyAdapter.get(&desired("5m")).unwrap();
        let mut result = plan.clone();
        result.steps = Attr::Known(vec![
            Step {
                delay: Attr::Known(Duration::from_secs(300)),
                targets: Attr::Known(["team-4", "team-7"].iter().map(ToString::to_string).collect()),
            },
            Step {
                delay: Attr::Known(Duration::from_secs(1800)),
                targets: Attr::Known(["team-9".to_string()].into_iter().collect()),
            },
        ]);
        let once = KeepTargetIds.preserve_plan_values(&result, &plan);
        let twice = KeepTargetIds.preserve_plan_values(&once, &plan);
        assert_eq!(once, twice);
        assert_eq!(once.steps, plan.steps);
    }

    #[test]
    fn test_non_numeric_target_rejected() {
        let policy = resource(mock_client(&mock()));
        let bad = tree(&[
            ("name", Value::string("primary")),
            ("step", Value::List(vec![step("5m", &["platform"])])),
        ]);
        let diags = policy.plan(None, Some(&bad)).unwrap_err();
        let detail = &diags.first_error().unwrap().detail;
        assert!(detail.contains("step[0]"));
        assert!(detail.contains("\"platform\" is not a team id"));
    }

    #[test]
    fn test_imported_policy_is_replaced_on_apply() {
        let mock = mock();
        let id = mock.insert(
            COLLECTION,
            json!({"name": "primary", "steps": [{"delay": "5m", "targets": [4, 7]}, {"delay": "30m", "targets": [9]}]}),
        );
        let policy = resource(mock_client(&mock));

        let state = policy.import(&OperationContext::new(), &id.to_string()).state.unwrap();
        assert_eq!(targets(&state, 1), Value::set(vec!["team-9".into()]));
        assert_eq!(policy.plan(Some(&state), Some(&desired("5m"))).unwrap().action, Action::Replace);
    }
}
