//! Store backed by a single JSON file: `{ "<id>": <configuration>, ... }`.

use crate::Result;
use crate::spec::Configuration;
use crate::store::ConfigStore;

use anyhow::{Context, bail};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is an empty store.
    fn load(&self) -> Result<BTreeMap<String, Configuration>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "store file does not exist yet");
            return Ok(BTreeMap::new());
        }
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("read store file {}", self.path.display()))?;
        if text.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&text)
            .with_context(|| format!("parse store file {}", self.path.display()))
    }

    fn persist(&self, items: &BTreeMap<String, Configuration>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("create store directory {}", parent.display()))?;
        }
        let text = serde_json::to_string_pretty(items).context("serialize store")?;
        fs::write(&self.path, text)
            .with_context(|| format!("write store file {}", self.path.display()))?;
        debug!(path = %self.path.display(), items = items.len(), "store written");
        Ok(())
    }
}

impl ConfigStore for JsonFileStore {
    fn list(&self) -> Result<Vec<Configuration>> {
        Ok(self.load()?.into_values().collect())
    }

    fn get(&self, id: &str) -> Result<Option<Configuration>> {
        Ok(self.load()?.remove(id))
    }

    fn upsert(&mut self, config: Configuration) -> Result<()> {
        if config.id.trim().is_empty() {
            bail!("cannot store configuration {:?} without an identifier", config.name);
        }
        let mut items = self.load()?;
        items.insert(config.id.clone(), config);
        self.persist(&items)
    }

    fn delete(&mut self, id: &str) -> Result<bool> {
        let mut items = self.load()?;
        if items.remove(id).is_none() {
            return Ok(false);
        }
        self.persist(&items)?;
        Ok(true)
    }
}
