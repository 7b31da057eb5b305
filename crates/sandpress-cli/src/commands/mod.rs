//! Subcommand implementations

use clap::Args;
use sandpress_core::locate::locate_project_root;
use sandpress_core::{IsolationConfig, SnapshotStore};
use std::path::PathBuf;

pub mod locate;
pub mod snapshot;

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Where to look for the project and its database
#[derive(Debug, Clone, Args)]
pub struct TargetArgs {
    /// Start the project-root search here instead of the working directory
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Database file, overriding config and the conventional locations
    #[arg(long)]
    pub database: Option<PathBuf>,
}

/// Resolved project root, configuration and snapshot store
pub struct Target {
    pub project_root: Option<PathBuf>,
    pub config: IsolationConfig,
    pub store: SnapshotStore,
}

impl TargetArgs {
    pub fn resolve(&self) -> Result<Target, Box<dyn std::error::Error>> {
        let cwd = std::env::current_dir()?;
        let start = match &self.root {
            Some(root) => cwd.join(root),
            None => cwd.clone(),
        };
        let project_root = locate_project_root(&start);
        let mut config = IsolationConfig::load(project_root.as_deref())?;
        if let Some(db) = &self.database {
            config.database = Some(cwd.join(db));
        }
        let store = SnapshotStore::discover(&start, &config)?;
        Ok(Target {
            project_root,
            config,
            store,
        })
    }
}
