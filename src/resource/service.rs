//! Service resource - a monitored service owned by a team

use super::{RestCapability, check_one_of, known};
use beaconapi::Client;
use declarative::{
    Attr, AttributeTree, Diagnostics, ImportResolver, ModelAdapter, PlanPreserver, PrimaryKey,
    PrimaryKeyed, Reader, ResourceEngine, SharedResource, Writer, parse_import_key,
};
use scalar::RawJson;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

pub const KIND: &str = "service";
const COLLECTION: &str = "services";

pub const TIERS: &[&str] = &["critical", "standard", "low"];
const DEFAULT_TIER: &str = "standard";

#[derive(Debug, Clone, PartialEq)]
pub struct Service {
    pub id: Attr<PrimaryKey>,
    pub name: Attr<String>,
    /// Owning team
    pub team_id: Attr<PrimaryKey>,
    pub tier: Attr<String>,
    pub tags: Attr<BTreeSet<String>>,
    /// Free-form document attached to the service
    pub metadata: Attr<RawJson>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceArg {
    pub name: String,
    pub team_id: PrimaryKey,
    pub tier: String,
    pub tags: BTreeSet<String>,
    pub metadata: RawJson,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceResult {
    pub id: PrimaryKey,
    pub name: String,
    pub team_id: PrimaryKey,
    pub tier: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default = "RawJson::empty_object")]
    pub metadata: RawJson,
}

impl PrimaryKeyed for ServiceResult {
    fn primary_key(&self) -> PrimaryKey {
        self.id
    }
}

pub struct ServiceAdapter;

/// The server re-renders metadata; keep the document as the user wrote it
/// while it means the same thing.
struct KeepMetadataText;

impl PlanPreserver<Service> for KeepMetadataText {
    fn preserve_plan_values(&self, result: &Service, plan: &Service) -> Service {
        let metadata = match (&result.metadata, &plan.metadata) {
            (Attr::Known(observed), Attr::Known(planned)) if observed == planned => {
                plan.metadata.clone()
            }
            _ => result.metadata.clone(),
        };
        Service {
            metadata,
            ..result.clone()
        }
    }
}

impl ModelAdapter for ServiceAdapter {
    type Model = Service;
    type Arg = ServiceArg;
    type Result = ServiceResult;

    fn type_name(&self) -> &'static str {
        KIND
    }

    fn get(&self, tree: &AttributeTree) -> Result<Service, Diagnostics> {
        let mut r = Reader::new(tree);
        let model = Service {
            id: r.optional("id"),
            name: r.required("name"),
            team_id: r.required("team_id"),
            tier: r.optional("tier"),
            tags: r.optional("tags"),
            metadata: r.optional("metadata"),
        };
        let model = r.finish(model)?;
        check_one_of(&model.tier, "tier", TIERS)?;
        Ok(model)
    }

    fn encode(&self, model: &Service) -> AttributeTree {
        let mut w = Writer::new();
        w.set("id", &model.id)
            .set("name", &model.name)
            .set("team_id", &model.team_id)
            .set("tier", &model.tier)
            .set("tags", &model.tags)
            .set("metadata", &model.metadata);
        w.finish()
    }

    fn model_key(&self, model: &Service) -> Option<PrimaryKey> {
        model.id.known().copied()
    }

    fn to_api_argument(&self, model: &Service) -> anyhow::Result<ServiceArg> {
        Ok(ServiceArg {
            name: known(&model.name, "name")?,
            team_id: known(&model.team_id, "team_id")?,
            tier: model.tier.value_or(DEFAULT_TIER.to_string()),
            tags: model.tags.value_or(BTreeSet::new()),
            metadata: model.metadata.value_or(RawJson::empty_object()),
        })
    }

    fn from_api_result(&self, result: &ServiceResult) -> anyhow::Result<Service> {
        if !TIERS.contains(&result.tier.as_str()) {
            anyhow::bail!("service returned unknown tier {:?}", result.tier);
        }
        Ok(Service {
            id: Attr::Known(result.id),
            name: Attr::Known(result.name.clone()),
            team_id: Attr::Known(result.team_id),
            tier: Attr::Known(result.tier.clone()),
            tags: Attr::Known(result.tags.clone()),
            metadata: Attr::Known(result.metadata.clone()),
        })
    }

    fn stub_model(&self, key: PrimaryKey) -> Service {
        Service {
            id: Attr::Known(key),
            name: Attr::Null,
            team_id: Attr::Null,
            tier: Attr::Null,
            tags: Attr::Null,
            metadata: Attr::Null,
        }
    }

    fn plan_preserver(&self) -> Option<&dyn PlanPreserver<Service>> {
        Some(&KeepMetadataText)
    }

    fn import_resolver(&self) -> Option<&dyn ImportResolver<Service>> {
        Some(self)
    }
}

impl ImportResolver<Service> for ServiceAdapter {
    fn resolve_import(&self, id: &str) -> Result<Service, Diagnostics> {
        Ok(self.stub_model(parse_import_key(id)?))
    }
}

pub fn resource(client: Client) -> SharedResource {
    Arc::new(ResourceEngine::new(
        ServiceAdapter,
        RestCapability::<ServiceArg, ServiceResult>::new(client, COLLECTION),
    ))
}
