//! SLA resource - an availability target for one service
//!
//! Imported with `<service_id>/<sla_id>`; the import is rejected if the SLA
//! belongs to a different service.

use super::{RestCapability, known};
use beaconapi::Client;
use declarative::{
    Attr, AttributeTree, Diagnostic, DiagnosticCategory, Diagnostics, ImportResolver,
    ModelAdapter, PrimaryKey, PrimaryKeyed, Reader, ResourceEngine, SharedResource, Writer,
    parse_import_key,
};
use scalar::{Decimal, Duration, Ratio};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const KIND: &str = "sla";
const COLLECTION: &str = "slas";

/// Thirty days
const DEFAULT_WINDOW: Duration = Duration::from_hours(720);

#[derive(Debug, Clone, PartialEq)]
pub struct Sla {
    pub id: Attr<PrimaryKey>,
    pub service_id: Attr<PrimaryKey>,
    pub target: Attr<Ratio>,
    pub window: Attr<Duration>,
    /// Requests slower than this count as failures; unset disables the check
    pub latency_threshold: Attr<Duration>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlaArg {
    pub service_id: PrimaryKey,
    pub target: Ratio,
    pub window: Duration,
    /// Seconds; zero disables the check
    pub latency_threshold: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlaResult {
    pub id: PrimaryKey,
    pub service_id: PrimaryKey,
    pub target: Ratio,
    pub window: Duration,
    #[serde(default)]
    pub latency_threshold: Option<Decimal>,
}

impl PrimaryKeyed for SlaResult {
    fn primary_key(&self) -> PrimaryKey {
        self.id
    }
}

pub struct SlaAdapter;

impl ModelAdapter for SlaAdapter {
    type Model = Sla;
    type Arg = SlaArg;
    type Result = SlaResult;

    fn type_name(&self) -> &'static str {
        KIND
    }

    fn get(&self, tree: &AttributeTree) -> Result<Sla, Diagnostics> {
        let mut r = Reader::new(tree);
        let model = Sla {
            id: r.optional("id"),
            service_id: r.required("service_id"),
            target: r.required("target"),
            window: r.optional("window"),
            latency_threshold: r.optional("latency_threshold"),
        };
        r.finish(model)
    }

    fn encode(&self, model: &Sla) -> AttributeTree {
        let mut w = Writer::new();
        w.set("id", &model.id)
            .set("service_id", &model.service_id)
            .set("target", &model.target)
            .set("window", &model.window)
            .set("latency_threshold", &model.latency_threshold);
        w.finish()
    }

    fn model_key(&self, model: &Sla) -> Option<PrimaryKey> {
        model.id.known().copied()
    }

    fn to_api_argument(&self, model: &Sla) -> anyhow::Result<SlaArg> {
        let window = model.window.value_or(DEFAULT_WINDOW);
        if window.is_negative() || window.is_zero() {
            anyhow::bail!("window must be positive, got {window}");
        }
        let latency = model.latency_threshold.value_or(Duration::ZERO);
        if latency.is_negative() {
            anyhow::bail!("latency_threshold must not be negative, got {latency}");
        }
        Ok(SlaArg {
            service_id: known(&model.service_id, "service_id")?,
            target: known(&model.target, "target")?,
            window,
            latency_threshold: latency.as_seconds_decimal(),
        })
    }

    fn from_api_result(&self, result: &SlaResult) -> anyhow::Result<Sla> {
        let latency = match &result.latency_threshold {
            Some(seconds) => Duration::from_seconds_decimal(seconds)?,
            None => Duration::ZERO,
        };
        Ok(Sla {
            id: Attr::Known(result.id),
            service_id: Attr::Known(result.service_id),
            target: Attr::Known(result.target),
            window: Attr::Known(result.window),
            latency_threshold: if latency.is_zero() {
                Attr::Null
            } else {
                Attr::Known(latency)
            },
        })
    }

    fn stub_model(&self, key: PrimaryKey) -> Sla {
        Sla {
            id: Attr::Known(key),
            service_id: Attr::Null,
            target: Attr::Null,
            window: Attr::Null,
            latency_threshold: Attr::Null,
        }
    }

    fn import_resolver(&self) -> Option<&dyn ImportResolver<Sla>> {
        Some(self)
    }
}

impl ImportResolver<Sla> for SlaAdapter {
    fn grammar(&self) -> &'static str {
        "<service_id>/<sla_id>"
    }

    fn resolve_import(&self, id: &str) -> Result<Sla, Diagnostics> {
        let Some((service_id, sla_id)) = id.trim().split_once('/') else {
            return Err(Diagnostic::error(
                DiagnosticCategory::Validation,
                "invalid import id",
                format!("{id:?} does not match {}", self.grammar()),
            )
            .into());
        };
        Ok(Sla {
            service_id: Attr::Known(parse_import_key(service_id)?),
            ..self.stub_model(parse_import_key(sla_id)?)
        })
    }

    fn verify_import(&self, requested: &Sla, imported: &Sla) -> Diagnostics {
        if requested.service_id == imported.service_id {
            return Diagnostics::new();
        }
        let describe = |attr: &Attr<PrimaryKey>| match attr.known() {
            Some(key) => key.to_string(),
            None => "unknown".to_string(),
        };
        Diagnostic::error(
            DiagnosticCategory::Validation,
            "import id does not match",
            format!(
                "sla {} belongs to service {}, not service {}",
                describe(&imported.id),
                describe(&imported.service_id),
                describe(&requested.service_id)
            ),
        )
        .into()
    }
}

pub fn resource(client: Client) -> SharedResource {
    Arc::new(ResourceEngine::new(
        SlaAdapter,
        RestCapability::<SlaArg, SlaResult>::new(client, COLLECTION),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::testing::{mock_client, tree};
    use beaconapi::MockBackend;
    use declarative::{Action, OperationContext, Value};
    use serde_json::json;

    fn desired(target: &str) -> AttributeTree {
        tree(&[
            ("service_id", Value::Int(3)),
            ("target", Value::Number(Decimal::parse(target).unwrap())),
            ("latency_threshold", Value::string("250ms")),
        ])
    }

    fn seconds(value: &serde_json::Value) -> Decimal {
        match value {
            serde_json::Value::String(s) => Decimal::parse(s).unwrap(),
            other => Decimal::parse(&other.to_string()).unwrap(),
        }
    }

    #[test]
    fn test_create_encodes_scalars_canonically() {
        let mock = MockBackend::new();
        let sla = resource(mock_client(&mock));
        let state = sla.create(&OperationContext::new(), &desired("0.999")).state.unwrap();

        assert_eq!(state.get("target"), &Value::string("0.9990"));
        assert_eq!(state.get("window"), &Value::string("720h0m0s"));
        assert_eq!(state.get("latency_threshold"), &Value::string("250ms"));

        let stored = mock.get("slas", 1).unwrap();
        assert_eq!(stored["target"], json!("0.9990"));
        assert_eq!(seconds(&stored["latency_threshold"]), Decimal::parse("0.25").unwrap());
    }

    #[test]
    fn test_equivalent_durations_plan_no_change() {
        let mock = MockBackend::new();
        let sla = resource(mock_client(&mock));
        let state = sla.create(&OperationContext::new(), &desired("0.99")).state.unwrap();

        let mut spelled = desired("0.9900");
        spelled.set("window", Value::string("43200m"));
        spelled.set("latency_threshold", Value::string("0.25s"));
        assert_eq!(sla.plan(Some(&state), Some(&spelled)).unwrap().action, Action::NoOp);
    }

    #[test]
    fn test_zero_latency_means_disabled() {
        let mock = MockBackend::new();
        let sla = resource(mock_client(&mock));
        let mut zero = desired("0.99");
        zero.set("latency_threshold", Value::string("0s"));

        let state = sla.create(&OperationContext::new(), &zero).state.unwrap();
        assert_eq!(state.get("latency_threshold"), &Value::Null);
        assert_eq!(sla.plan(Some(&state), Some(&zero)).unwrap().action, Action::NoOp);

        let mut unset = zero.clone();
        unset.remove("latency_threshold");
        assert_eq!(sla.plan(Some(&state), Some(&unset)).unwrap().action, Action::NoOp);
    }

    #[test]
    fn test_target_precision() {
        let mock = MockBackend::new();
        let sla = resource(mock_client(&mock));
        assert!(sla.plan(None, Some(&desired("0.9999"))).is_ok());

        let diags = sla.plan(None, Some(&desired("0.99999"))).unwrap_err();
        let err = diags.first_error().unwrap();
        assert_eq!(err.category, DiagnosticCategory::Validation);
        assert_eq!(err.path.as_ref().unwrap().to_string(), "target");

        assert!(sla.plan(None, Some(&desired("1.5"))).is_err());
    }

    #[test]
    fn test_negative_window_rejected() {
        let mock = MockBackend::new();
        let sla = resource(mock_client(&mock));
        let mut bad = desired("0.99");
        bad.set("window", Value::string("-1h"));
        let response = sla.create(&OperationContext::new(), &bad);
        assert!(response.has_error());
        assert!(mock.requests().is_empty());
    }

    #[test]
    fn test_import_composite_id() {
        let mock = MockBackend::new();
        let id = mock.insert(
            "slas",
            json!({"service_id": 3, "target": 0.995, "window": "168h", "latency_threshold": 0}),
        );
        let sla = resource(mock_client(&mock));
        let ctx = OperationContext::new();

        let state = sla.import(&ctx, &format!("3/{id}")).state.unwrap();
        assert_eq!(state.get("target"), &Value::string("0.9950"));
        assert_eq!(state.get("window"), &Value::string("168h0m0s"));
        assert_eq!(state.get("latency_threshold"), &Value::Null);

        let wrong = sla.import(&ctx, &format!("4/{id}"));
        assert!(wrong.state.is_none());
        assert!(wrong.diagnostics.first_error().unwrap().detail.contains("belongs to service 3"));

        let malformed = sla.import(&ctx, &id.to_string());
        assert!(malformed.state.is_none());
        assert!(malformed.has_error());
    }
}
