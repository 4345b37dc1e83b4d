use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::command::{Catalog, CommandKey};
use crate::host::{CreateOutcome, EntryHandle, EntrySpec, HostRegistry, StyleHint, Visibility};

pub const TOOLS_MENU: &str = "Tools";

#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    pub display_in_menu: bool,
    pub menu: String,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            display_in_menu: false,
            menu: TOOLS_MENU.to_string(),
        }
    }
}

impl ReconcileOptions {
    pub fn with_menu(display_in_menu: bool) -> Self {
        Self {
            display_in_menu,
            ..Self::default()
        }
    }
}

/// Pairing of catalog commands with host registry entries. One slot per
/// logical command; `None` until reconciliation pairs or creates an entry.
/// Rebuilt from scratch on every activation.
#[derive(Debug, Clone, Default)]
pub struct CommandMap {
    slots: BTreeMap<String, Option<EntryHandle>>,
}

impl CommandMap {
    fn for_catalog(catalog: &Catalog) -> Self {
        let slots = catalog
            .commands()
            .iter()
            .map(|command| (command.key.full_name(), None))
            .collect();
        Self { slots }
    }

    fn pair(&mut self, full_name: &str, handle: EntryHandle) {
        if let Some(slot) = self.slots.get_mut(full_name) {
            *slot = Some(handle);
        }
    }

    pub fn declares(&self, full_name: &str) -> bool {
        self.slots.contains_key(full_name)
    }

    pub fn is_paired(&self, full_name: &str) -> bool {
        matches!(self.slots.get(full_name), Some(Some(_)))
    }

    pub fn handle(&self, full_name: &str) -> Option<&EntryHandle> {
        self.slots.get(full_name).and_then(Option::as_ref)
    }

    /// Handles of every registry entry this map currently tracks. This is
    /// the teardown set on session close.
    pub fn tracked_handles(&self) -> Vec<EntryHandle> {
        self.slots.values().filter_map(Clone::clone).collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EntryAction {
    pub name: String,
    pub action: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct ReconcileReport {
    pub matched: usize,
    pub created: usize,
    pub deleted_orphans: usize,
    pub ignored_foreign: usize,
    pub attached: usize,
    /// Full name of the command whose create collided with an existing
    /// registration, halting the rest of that pass. Repaired on the next
    /// activation.
    pub halted_on: Option<String>,
    pub entries: Vec<EntryAction>,
}

#[derive(Debug)]
pub struct ReconcileOutcome {
    pub map: CommandMap,
    pub report: ReconcileReport,
}

/// Align the host registry with the catalog: pair surviving entries, delete
/// orphans, create what's missing, and attach new entries to the menu in
/// catalog order. Matching is exact full-name equality only.
pub fn reconcile<R: HostRegistry + ?Sized>(
    catalog: &Catalog,
    registry: &mut R,
    options: &ReconcileOptions,
) -> Result<ReconcileOutcome> {
    let namespace = catalog.namespace();
    let mut map = CommandMap::for_catalog(catalog);
    let mut report = ReconcileReport::default();

    let existing = registry
        .enumerate_existing()
        .context("failed to enumerate host commands")?;
    tracing::debug!(
        existing = existing.len(),
        declared = catalog.len(),
        namespace = %namespace,
        "reconciling command registry"
    );

    let mut orphans = Vec::new();
    for name in existing {
        if CommandKey::parse(&name, namespace).is_none() {
            report.ignored_foreign += 1;
            continue;
        }
        if map.declares(&name) {
            map.pair(&name, EntryHandle::new(name.clone()));
            report.matched += 1;
            report.entries.push(EntryAction {
                name,
                action: "matched".to_string(),
            });
        } else {
            orphans.push(EntryHandle::new(name));
        }
    }

    // Orphans are stale registrations from definitions that no longer
    // exist. A rejected delete leaves the registry dirty, so it propagates.
    for orphan in orphans {
        registry
            .delete(&orphan)
            .with_context(|| format!("failed to delete orphaned command '{}'", orphan.name()))?;
        report.deleted_orphans += 1;
        report.entries.push(EntryAction {
            name: orphan.name().to_string(),
            action: "deleted_orphan".to_string(),
        });
    }

    // Creation and menu attachment run in catalog order so menu placement
    // mirrors declaration order, whatever order enumeration returned.
    let mut position = 0u32;
    for command in catalog.commands() {
        let full_name = command.key.full_name();
        if map.is_paired(&full_name) {
            continue;
        }

        let spec = EntrySpec {
            name: full_name.clone(),
            display_text: command.display_text.clone(),
            description: command.description.clone(),
            visibility: Visibility::supported_and_enabled(),
            style: StyleHint::PictAndText,
        };
        let outcome = registry
            .create(&spec)
            .with_context(|| format!("failed to create command '{full_name}'"))?;
        match outcome {
            CreateOutcome::Created(handle) => {
                report.created += 1;
                report.entries.push(EntryAction {
                    name: full_name.clone(),
                    action: "created".to_string(),
                });
                if options.display_in_menu {
                    position += 1;
                    registry
                        .attach_to_menu(&handle, &options.menu, position)
                        .with_context(|| {
                            format!("failed to attach '{full_name}' to the {} menu", options.menu)
                        })?;
                    report.attached += 1;
                }
                map.pair(&full_name, handle);
            }
            CreateOutcome::AlreadyExists => {
                // A collision means an earlier pass left partial state
                // behind. The rest of this pass is skipped; the next
                // activation pairs the leftovers as surviving entries.
                tracing::warn!(
                    command = %full_name,
                    "command name already registered, deferring remaining registrations"
                );
                report.entries.push(EntryAction {
                    name: full_name.clone(),
                    action: "halted_duplicate".to_string(),
                });
                report.halted_on = Some(full_name);
                break;
            }
        }
    }

    Ok(ReconcileOutcome { map, report })
}
