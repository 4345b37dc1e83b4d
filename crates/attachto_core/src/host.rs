use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Serialize;

/// Opaque handle to a host-side command record. The host keys records by
/// their registered name, so the handle carries nothing else.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct EntryHandle {
    name: String,
}

impl EntryHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Visibility {
    pub supported: bool,
    pub enabled: bool,
}

impl Visibility {
    pub const fn supported_and_enabled() -> Self {
        Self {
            supported: true,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StyleHint {
    PictAndText,
    TextOnly,
}

/// Everything the host needs to create one command record.
#[derive(Debug, Clone)]
pub struct EntrySpec {
    pub name: String,
    pub display_text: String,
    pub description: String,
    pub visibility: Visibility,
    pub style: StyleHint,
}

/// Typed result of a create request. "Name already registered" is an
/// expected condition, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(EntryHandle),
    AlreadyExists,
}

/// The host's command registry, reduced to the four operations
/// reconciliation needs. No ordering is assumed from `enumerate_existing`.
pub trait HostRegistry {
    fn enumerate_existing(&mut self) -> Result<Vec<String>>;
    fn create(&mut self, spec: &EntrySpec) -> Result<CreateOutcome>;
    fn delete(&mut self, handle: &EntryHandle) -> Result<()>;
    fn attach_to_menu(&mut self, handle: &EntryHandle, menu: &str, position: u32) -> Result<()>;
}

/// A mutation recorded by [`SnapshotRegistry`], in call order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "op")]
pub enum RegistryMutation {
    Create { name: String },
    Delete { name: String },
    AttachToMenu { name: String, menu: String, position: u32 },
}

/// In-memory registry seeded from a snapshot of registered command names.
/// Mutations update the in-memory set and are logged, never persisted, so
/// a reconciliation against it is a true dry run.
#[derive(Debug, Default)]
pub struct SnapshotRegistry {
    names: BTreeSet<String>,
    mutations: Vec<RegistryMutation>,
}

impl SnapshotRegistry {
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            mutations: Vec::new(),
        }
    }

    /// Load a snapshot from a JSON array of registered command names.
    /// A missing file means an empty registry (first activation).
    pub fn load(snapshot_path: &Path) -> Result<Self> {
        if !snapshot_path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(snapshot_path)
            .with_context(|| format!("failed to read {}", snapshot_path.display()))?;
        let names: Vec<String> = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse {}", snapshot_path.display()))?;
        Ok(Self::from_names(names))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn mutations(&self) -> &[RegistryMutation] {
        &self.mutations
    }
}

impl HostRegistry for SnapshotRegistry {
    fn enumerate_existing(&mut self) -> Result<Vec<String>> {
        Ok(self.names.iter().cloned().collect())
    }

    fn create(&mut self, spec: &EntrySpec) -> Result<CreateOutcome> {
        if self.names.contains(&spec.name) {
            return Ok(CreateOutcome::AlreadyExists);
        }
        self.names.insert(spec.name.clone());
        self.mutations.push(RegistryMutation::Create {
            name: spec.name.clone(),
        });
        Ok(CreateOutcome::Created(EntryHandle::new(spec.name.clone())))
    }

    fn delete(&mut self, handle: &EntryHandle) -> Result<()> {
        if !self.names.remove(handle.name()) {
            bail!("registry has no entry named '{}'", handle.name());
        }
        self.mutations.push(RegistryMutation::Delete {
            name: handle.name().to_string(),
        });
        Ok(())
    }

    fn attach_to_menu(&mut self, handle: &EntryHandle, menu: &str, position: u32) -> Result<()> {
        if !self.names.contains(handle.name()) {
            bail!(
                "cannot attach unregistered entry '{}' to menu",
                handle.name()
            );
        }
        self.mutations.push(RegistryMutation::AttachToMenu {
            name: handle.name().to_string(),
            menu: menu.to_string(),
            position,
        });
        Ok(())
    }
}
