//! Locates and reads the optional `bloodgroup.toml`.

use bloodgroup_core::PipelineConfig;
use directories_next::ProjectDirs;
use std::path::PathBuf;

pub const CONFIG_FILE_NAME: &str = "bloodgroup.toml";

/// Working directory first, then the per-user config directory.
pub fn config_candidates() -> Vec<PathBuf> {
    let mut candidates = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(dirs) = ProjectDirs::from("org", "bloodgroup", "BloodGroupPredictor") {
        candidates.push(dirs.config_dir().join(CONFIG_FILE_NAME));
    }
    candidates
}

/// First readable candidate wins; a broken file is logged and defaults are used.
pub fn load_config(candidates: &[PathBuf]) -> PipelineConfig {
    let Some(path) = candidates.iter().find(|p| p.is_file()) else {
        tracing::debug!("no {CONFIG_FILE_NAME} found, using defaults");
        return PipelineConfig::default();
    };
    match PipelineConfig::from_file(path) {
        Ok(cfg) => {
            tracing::info!("configuration loaded from {}", path.display());
            cfg
        }
        Err(e) => {
            tracing::warn!("ignoring {}: {e}", path.display());
            PipelineConfig::default()
        }
    }
}
