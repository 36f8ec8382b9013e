//! Resource kinds managed by beacon
//!
//! Each kind is a [`ModelAdapter`](declarative::ModelAdapter) paired with a
//! [`RestCapability`] over its API collection, wrapped in a
//! [`ResourceEngine`](declarative::ResourceEngine).

pub mod api;
pub mod escalation_policy;
pub mod service;
pub mod sla;
pub mod team;
pub mod webhook;

pub use api::RestCapability;

use anyhow::{Context, Result};
use beaconapi::Client;
use declarative::{
    Attr, AttributePath, Diagnostic, DiagnosticCategory, Diagnostics, SharedResource,
};
use std::collections::BTreeMap;

/// Every resource kind, by name
pub struct Registry {
    kinds: BTreeMap<&'static str, SharedResource>,
}

impl Registry {
    /// Build every kind on top of `client`
    pub fn new(client: &Client) -> Self {
        let resources = [
            team::resource(client.clone()),
            service::resource(client.clone()),
            sla::resource(client.clone()),
            webhook::resource(client.clone()),
            escalation_policy::resource(client.clone()),
        ];
        let kinds = resources
            .into_iter()
            .map(|resource| (resource.type_name(), resource))
            .collect();
        Self { kinds }
    }

    pub fn get(&self, kind: &str) -> Option<&SharedResource> {
        self.kinds.get(kind)
    }

    /// Look up a kind, failing with the list of known kinds
    pub fn resource(&self, kind: &str) -> Result<&SharedResource> {
        self.get(kind).with_context(|| {
            format!(
                "Unknown resource kind '{}' (known kinds: {})",
                kind,
                self.names().join(", ")
            )
        })
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.kinds.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &SharedResource)> {
        self.kinds.iter().map(|(name, resource)| (*name, resource))
    }
}

/// A known value needed to build a request
pub fn known<T: Clone>(attr: &Attr<T>, name: &str) -> Result<T> {
    attr.known()
        .cloned()
        .with_context(|| format!("{name} is not known yet"))
}

/// Check that a string attribute is one of `allowed`
pub fn check_one_of(attr: &Attr<String>, name: &str, allowed: &[&str]) -> Result<(), Diagnostics> {
    match attr.known() {
        Some(value) if !allowed.contains(&value.as_str()) => Err(Diagnostic::error(
            DiagnosticCategory::Validation,
            format!("invalid {name}"),
            format!("{value:?} is not one of: {}", allowed.join(", ")),
        )
        .with_path(AttributePath::root().attr(name))
        .into()),
        _ => Ok(()),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Helpers for exercising kinds against an in-memory API.

    use beaconapi::{Client, ClientConfig, MockBackend, RetryConfig};
    use declarative::{AttributeTree, Value};
    use std::sync::Arc;

    pub fn mock_client(mock: &MockBackend) -> Client {
        Client::with_backend(
            Arc::new(mock.clone()),
            ClientConfig::new("mock://").with_retry(RetryConfig::no_retry()),
        )
    }

    pub fn tree(pairs: &[(&str, Value)]) -> AttributeTree {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::testing::mock_client;
    use beaconapi::MockBackend;
    use declarative::UpdateStrategy;

    #[test]
    fn test_registry_kinds() {
        let registry = Registry::new(&mock_client(&MockBackend::new()));
        assert_eq!(
            registry.names(),
            vec!["escalation_policy", "service", "sla", "team", "webhook"]
        );
        assert_eq!(
            registry.resource("escalation_policy").unwrap().update_strategy(),
            UpdateStrategy::Replace
        );
        assert_eq!(
            registry.resource("sla").unwrap().import_grammar(),
            Some("<service_id>/<sla_id>")
        );
        let err = registry.resource("widget").err().unwrap();
        assert!(err.to_string().contains("known kinds: escalation_policy"));
    }

    #[test]
    fn test_check_one_of() {
        let allowed = ["a", "b"];
        assert!(check_one_of(&Attr::Known("a".to_string()), "tier", &allowed).is_ok());
        assert!(check_one_of(&Attr::Null, "tier", &allowed).is_ok());
        let diags = check_one_of(&Attr::Known("c".to_string()), "tier", &allowed).unwrap_err();
        let err = diags.first_error().unwrap();
        assert_eq!(err.category, DiagnosticCategory::Validation);
        assert_eq!(err.path.as_ref().unwrap().to_string(), "tier");
    }

    #[test]
    fn test_known() {
        assert_eq!(known(&Attr::Known(3_i64), "n").unwrap(), 3);
        assert!(known(&Attr::<i64>::Unknown, "n").is_err());
    }
}
