//! Webhook resource - an outgoing HTTP notification
//!
//! The signing `secret` is write-only: the API accepts it but never returns
//! it, so the recorded state keeps the configured value.

use super::{RestCapability, known};
use beaconapi::Client;
use declarative::{
    Attr, AttributeTree, Diagnostics, ImportResolver, ModelAdapter, PlanPreserver, PrimaryKey,
    PrimaryKeyed, Reader, ResourceEngine, SharedResource, Writer, parse_import_key,
};
use scalar::{Duration, RawJson};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const KIND: &str = "webhook";
const COLLECTION: &str = "webhooks";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const NANOS_PER_MILLI: i64 = 1_000_000;

#[derive(Debug, Clone, PartialEq)]
pub struct Webhook {
    pub id: Attr<PrimaryKey>,
    pub name: Attr<String>,
    pub url: Attr<String>,
    pub headers: Attr<BTreeMap<String, String>>,
    pub payload_template: Attr<RawJson>,
    pub timeout: Attr<Duration>,
    pub secret: Attr<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookArg {
    pub name: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_template: Option<RawJson>,
    pub timeout_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookResult {
    pub id: PrimaryKey,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub payload_template: Option<RawJson>,
    pub timeout_ms: i64,
}

impl PrimaryKeyed for WebhookResult {
    fn primary_key(&self) -> PrimaryKey {
        self.id
    }
}

pub struct WebhookAdapter;

struct KeepPlanValues;

impl PlanPreserver<Webhook> for KeepPlanValues {
    fn preserve_plan_values(&self, result: &Webhook, plan: &Webhook) -> Webhook {
        let payload_template = match (&result.payload_template, &plan.payload_template) {
            (Attr::Known(observed), Attr::Known(planned)) if observed == planned => {
                plan.payload_template.clone()
            }
            _ => result.payload_template.clone(),
        };
        Webhook {
            secret: plan.secret.or(&result.secret),
            payload_template,
            ..result.clone()
        }
    }
}

impl ModelAdapter for WebhookAdapter {
    type Model = Webhook;
    type Arg = WebhookArg;
    type Result = WebhookResult;

    fn type_name(&self) -> &'static str {
        KIND
    }

    fn get(&self, tree: &AttributeTree) -> Result<Webhook, Diagnostics> {
        let mut r = Reader::new(tree);
        let model = Webhook {
            id: r.optional("id"),
            name: r.required("name"),
            url: r.required("url"),
            headers: r.optional("headers"),
            payload_template: r.optional("payload_template"),
            timeout: r.optional("timeout"),
            secret: r.optional("secret"),
        };
        r.finish(model)
    }

    fn encode(&self, model: &Webhook) -> AttributeTree {
        let mut w = Writer::new();
        w.set("id", &model.id)
            .set("name", &model.name)
            .set("url", &model.url)
            .set("headers", &model.headers)
            .set("payload_template", &model.payload_template)
            .set("timeout", &model.timeout)
            .set("secret", &model.secret);
        w.finish()
    }

    fn model_key(&self, model: &Webhook) -> Option<PrimaryKey> {
        model.id.known().copied()
    }

    fn to_api_argument(&self, model: &Webhook) -> anyhow::Result<WebhookArg> {
        let url = known(&model.url, "url")?;
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            anyhow::bail!("url must start with http:// or https://, got {url:?}");
        }
        let timeout = model.timeout.value_or(DEFAULT_TIMEOUT);
        if timeout.is_negative() || timeout.is_zero() {
            anyhow::bail!("timeout must be positive, got {timeout}");
        }
        // The API stores whole milliseconds.
        if timeout.as_nanos() % NANOS_PER_MILLI != 0 {
            anyhow::bail!("timeout must be a whole number of milliseconds, got {timeout}");
        }
        Ok(WebhookArg {
            name: known(&model.name, "name")?,
            url,
            headers: model.headers.value_or(BTreeMap::new()),
            payload_template: model.payload_template.known().cloned(),
            timeout_ms: timeout.as_nanos() / NANOS_PER_MILLI,
            secret: model.secret.known().cloned(),
        })
    }

    fn from_api_result(&self, result: &WebhookResult) -> anyhow::Result<Webhook> {
        Ok(Webhook {
            id: Attr::Known(result.id),
            name: Attr::Known(result.name.clone()),
            url: Attr::Known(result.url.clone()),
            headers: Attr::Known(result.headers.clone()),
            payload_template: Attr::from_option(result.payload_template.clone()),
            timeout: Attr::Known(Duration::from_millis(result.timeout_ms)),
            secret: Attr::Null,
        })
    }

    fn stub_model(&self, key: PrimaryKey) -> Webhook {
        Webhook {
            id: Attr::Known(key),
            name: Attr::Null,
            url: Attr::Null,
            headers: Attr::Null,
            payload_template: Attr::Null,
            timeout: Attr::Null,
            secret: Attr::Null,
        }
    }

    fn plan_preserver(&self) -> Option<&dyn PlanPreserver<Webhook>> {
        Some(&KeepPlanValues)
    }

    fn import_resolver(&self) -> Option<&dyn ImportResolver<Webhook>> {
        Some(self)
    }
}

impl ImportResolver<Webhook> for WebhookAdapter {
    fn resolve_import(&self, id: &str) -> Result<Webhook, Diagnostics> {
        Ok(self.stub_model(parse_import_key(id)?))
    }
}

pub fn resource(client: Client) -> SharedResource {
    Arc::new(ResourceEngine::new(
        WebhookAdapter,
        RestCapability::<WebhookArg, WebhookResult>::new(client, COLLECTION),
    ))
}
