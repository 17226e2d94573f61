//! Persistence for saved configurations.
//!
//! The core never depends on a storage medium; it only sees `ConfigStore`.
//! `save` is the one write path the CLI uses: it refuses anything the
//! validator rejects and hands out identifiers on first save.

pub mod file;

pub use file::JsonFileStore;

use crate::Result;
use crate::spec::Configuration;
use crate::validate::validate;

use anyhow::bail;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use tracing::{info, warn};

/// Key-value store of configurations keyed by identifier.
pub trait ConfigStore {
    /// All saved configurations, ordered by identifier.
    fn list(&self) -> Result<Vec<Configuration>>;

    fn get(&self, id: &str) -> Result<Option<Configuration>>;

    /// Insert or replace the entry under `config.id` (which must be set).
    fn upsert(&mut self, config: Configuration) -> Result<()>;

    /// Returns false if nothing was stored under `id`.
    fn delete(&mut self, id: &str) -> Result<bool>;
}

/// Validate, assign an identifier if needed, and store.
///
/// Returns the snapshot as stored, so callers can keep editing the saved item.
pub fn save<S: ConfigStore + ?Sized>(store: &mut S, config: Configuration) -> Result<Configuration> {
    save_at(store, config, Utc::now())
}

fn save_at<S: ConfigStore + ?Sized>(
    store: &mut S,
    mut config: Configuration,
    now: DateTime<Utc>,
) -> Result<Configuration> {
    let report = validate(&config);
    if !report.is_exportable() {
        let fields: Vec<&str> = report.keys().map(|k| k.as_str()).collect();
        warn!(name = %config.name, fields = ?fields, "refusing to save invalid configuration");
        bail!(
            "configuration {:?} is not valid ({} problem(s): {})",
            config.name,
            report.len(),
            fields.join(", ")
        );
    }

    if config.id.trim().is_empty() {
        let taken: BTreeSet<String> = store.list()?.into_iter().map(|c| c.id).collect();
        config.id = new_id(&config.name, now, &taken);
        info!(id = %config.id, "assigned identifier");
    }

    store.upsert(config.clone())?;
    info!(id = %config.id, name = %config.name, "saved configuration");
    Ok(config)
}

/// `<name>-<millis since epoch, hex>`, with a numeric suffix on collision.
fn new_id(name: &str, now: DateTime<Utc>, taken: &BTreeSet<String>) -> String {
    let base = format!("{}-{:x}", name, now.timestamp_millis());
    let mut id = base.clone();
    let mut n = 1;
    while taken.contains(&id) {
        n += 1;
        id = format!("{}-{}", base, n);
    }
    id
}
