use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use declarative::{Address, AttributeTree, InstanceOutcome};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// State file format version
pub const STATE_VERSION: u32 = 1;

// ============================================================================
// State Structures
// ============================================================================

/// Recorded state of every tracked instance
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BeaconState {
    /// File format version
    pub version: u32,

    /// Incremented on every write that changes an instance
    #[serde(default)]
    pub serial: u64,

    /// Last time the state was updated
    pub last_updated: DateTime<Utc>,

    /// Observed attributes, keyed by `<kind>.<name>`
    #[serde(default)]
    pub instances: BTreeMap<Address, AttributeTree>,
}

impl Default for BeaconState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            serial: 0,
            last_updated: Utc::now(),
            instances: BTreeMap::new(),
        }
    }
}

// ============================================================================
// BeaconState Implementation
// ============================================================================

impl BeaconState {
    /// Load state from disk, or return default if file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("State file does not exist, using default state");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;

        let state: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        if state.version > STATE_VERSION {
            bail!(
                "State file {} has version {}, this beacon understands up to {}",
                path.display(),
                state.version,
                STATE_VERSION
            );
        }

        log::debug!(
            "Loaded state from {} (serial {}, {} instances)",
            path.display(),
            state.serial,
            state.instances.len()
        );
        Ok(state)
    }

    /// Save state to disk. The file is replaced atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        let content =
            serde_json::to_string_pretty(&self).context("Failed to serialize state to JSON")?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content.as_bytes())
            .with_context(|| format!("Failed to write state file: {}", tmp.display()))?;
        fs::rename(&tmp, path)
            .with_context(|| format!("Failed to replace state file: {}", path.display()))?;

        log::debug!("Saved state to {}", path.display());
        Ok(())
    }

    pub fn get(&self, address: &Address) -> Option<&AttributeTree> {
        self.instances.get(address)
    }

    /// Track `tree` under `address`, returning whether anything changed.
    pub fn set(&mut self, address: Address, tree: AttributeTree) -> bool {
        if self.instances.get(&address) == Some(&tree) {
            return false;
        }
        self.instances.insert(address, tree);
        self.touch();
        true
    }

    /// Stop tracking `address`
    pub fn remove(&mut self, address: &Address) -> Option<AttributeTree> {
        let removed = self.instances.remove(address);
        if removed.is_some() {
            self.touch();
        }
        removed
    }

    /// Record what an executed instance left behind: its new state, or
    /// nothing when the instance is gone.
    pub fn record(&mut self, outcome: &InstanceOutcome) {
        match &outcome.state {
            Some(tree) => {
                self.set(outcome.address.clone(), tree.clone());
            }
            None => {
                self.remove(&outcome.address);
            }
        }
    }

    /// Tracked addresses, optionally filtered by kind
    pub fn addresses<'a>(&'a self, kind: Option<&'a str>) -> impl Iterator<Item = &'a Address> {
        self.instances
            .keys()
            .filter(move |a| kind.is_none_or(|k| a.kind == k))
    }

    fn touch(&mut self) {
        self.serial += 1;
        self.last_updated = Utc::now();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{ApplyResult, Diagnostics, Value};
    use tempfile::TempDir;

    fn tree(id: &str, name: &str) -> AttributeTree {
        let mut tree = AttributeTree::new();
        tree.set("id", Value::string(id));
        tree.set("name", Value::string(name));
        tree
    }

    fn outcome(address: &Address, state: Option<AttributeTree>) -> InstanceOutcome {
        InstanceOutcome {
            address: address.clone(),
            result: ApplyResult::Created,
            state,
            diagnostics: Diagnostics::new(),
        }
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let state = BeaconState::load(&dir.path().join("state.json")).unwrap();
        assert_eq!(state.serial, 0);
        assert!(state.instances.is_empty());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let mut state = BeaconState::default();
        let mut t = tree("4", "Platform");
        t.set("pending", Value::Unknown);
        state.set(Address::new("team", "platform"), t.clone());
        state.save(&path).unwrap();

        let loaded = BeaconState::load(&path).unwrap();
        assert_eq!(loaded.serial, 1);
        assert_eq!(loaded.get(&Address::new("team", "platform")), Some(&t));
        assert!(!path.with_extension("json.tmp").exists());

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"team.platform\""));
    }

    #[test]
    fn test_record_sets_and_drops() {
        let address = Address::new("team", "platform");
        let mut state = BeaconState::default();

        state.record(&outcome(&address, Some(tree("1", "a"))));
        assert!(state.get(&address).is_some());
        assert_eq!(state.serial, 1);

        // Same tree again does not bump the serial
        state.record(&outcome(&address, Some(tree("1", "a"))));
        assert_eq!(state.serial, 1);

        state.record(&outcome(&address, None));
        assert!(state.get(&address).is_none());
        assert_eq!(state.serial, 2);
    }

    #[test]
    fn test_addresses_by_kind() {
        let mut state = BeaconState::default();
        state.set(Address::new("team", "a"), tree("1", "a"));
        state.set(Address::new("team", "b"), tree("2", "b"));
        state.set(Address::new("service", "api"), tree("3", "api"));

        assert_eq!(state.addresses(None).count(), 3);
        let teams: Vec<String> = state.addresses(Some("team")).map(ToString::to_string).collect();
        assert_eq!(teams, vec!["team.a", "team.b"]);
    }

    #[test]
    fn test_newer_version_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(
            &path,
            r#"{"version": 99, "serial": 0, "last_updated": "2026-01-01T00:00:00Z", "instances": {}}"#,
        )
        .unwrap();
        let err = BeaconState::load(&path).unwrap_err();
        assert!(err.to_string().contains("version 99"));
    }

    #[test]
    fn test_corrupt_file_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "not json").unwrap();
        let err = BeaconState::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse state file"));
    }
}
