use std::path::{Path, PathBuf};

use crate::config::Config;
use color_eyre::Result;
use dirs::data_dir;
use stash_core::MemoryBackend;
use stash_storage::file_backend::FileBackend;
use stash_store::ReactiveStore;
use tracing::debug;

const PRIMARY_FILE: &str = "primary.json";

/// Resolve the default data directory for Stash.
pub fn default_data_dir() -> Result<PathBuf> {
    let base = data_dir().ok_or_else(|| color_eyre::eyre::eyre!("no data dir available"))?;
    Ok(base.join("stash"))
}

/// Build a store whose primary backend lives under `root` and whose ephemeral
/// backend lasts for this process only.
pub fn store_at(root: &Path, config: &Config) -> Result<ReactiveStore> {
    let path = root.join(PRIMARY_FILE);
    debug!(?path, "opening primary backend");
    let store = ReactiveStore::builder(FileBackend::new(path), MemoryBackend::new())
        .options(config.store.clone())
        .build()?;
    Ok(store)
}

/// Build a store using config overrides.
pub fn store_from_config(config: &Config) -> Result<ReactiveStore> {
    match &config.data_dir {
        Some(root) => store_at(root, config),
        None => store_at(&default_data_dir()?, config),
    }
}

#[cfg(test)]
mod tests {
    use stash_store::{OptionsPatch, Value};

    use super::*;

    #[test]
    fn config_options_are_applied() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config {
            data_dir: Some(dir.path().to_path_buf()),
            store: OptionsPatch::default().obfuscate(true),
        };

        let store = store_from_config(&config).expect("store");
        assert!(store.options().obfuscate);

        store.set("k", "v", None).expect("set");
        assert!(dir.path().join(PRIMARY_FILE).exists());
        assert_eq!(
            store_from_config(&config)
                .expect("reopen")
                .get("k", None)
                .expect("get"),
            Some(Value::Text("v".into()))
        );
    }
}
