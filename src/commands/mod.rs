pub mod declarative;
pub mod kinds;
pub mod state;

use crate::Context;
use crate::paths;
use crate::resource::Registry;
use crate::schema::BeaconConfig;
use crate::state::BeaconState;
use anyhow::{Context as AnyhowContext, Result};
use beaconapi::Client;
use std::path::PathBuf;

/// Everything a command works against: config, state and the resource kinds.
pub struct Workspace {
    pub config: BeaconConfig,
    pub state: BeaconState,
    pub state_path: PathBuf,
    pub registry: Registry,
}

impl Workspace {
    /// Load config and state from the paths selected by `ctx`.
    pub fn open(ctx: &Context) -> Result<Self> {
        let config_path = paths::config_file(ctx.config.as_deref())?;
        let state_path = paths::state_file(ctx.state.as_deref())?;
        log::debug!(
            "Using config {} and state {}",
            config_path.display(),
            state_path.display()
        );

        let config = BeaconConfig::load(&config_path)?;
        let client = Client::new(
            config
                .provider
                .client_config()
                .context("Invalid [provider] settings")?,
        );
        Self::with_client(config, state_path, &client)
    }

    /// Build a workspace on top of an existing client.
    pub fn with_client(config: BeaconConfig, state_path: PathBuf, client: &Client) -> Result<Self> {
        let registry = Registry::new(client);
        config.validate(&registry.names())?;
        let state = BeaconState::load(&state_path)?;
        Ok(Self {
            config,
            state,
            state_path,
            registry,
        })
    }

    pub fn save_state(&self) -> Result<()> {
        self.state.save(&self.state_path)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use beaconapi::MockBackend;
    use tempfile::TempDir;

    /// A workspace over `config_toml` with its state file in `dir`.
    pub fn workspace(dir: &TempDir, config_toml: &str, mock: &MockBackend) -> Workspace {
        let config = BeaconConfig::parse(config_toml).unwrap();
        Workspace::with_client(
            config,
            dir.path().join("state.json"),
            &crate::resource::testing::mock_client(mock),
        )
        .unwrap()
    }
}
