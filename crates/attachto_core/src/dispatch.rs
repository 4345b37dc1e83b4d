use std::collections::BTreeMap;

use crate::attach::AttachBackend;
use crate::command::{Catalog, CommandAction, LogicalCommand};
use crate::host::Visibility;

/// Runtime lookup from host-visible command name to logical command. Built
/// from the catalog alone; a command is dispatchable whether or not its
/// registry entry has been created yet.
#[derive(Debug, Default)]
pub struct DispatchTable {
    commands: BTreeMap<String, LogicalCommand>,
}

impl DispatchTable {
    pub fn from_catalog(catalog: &Catalog) -> Self {
        let commands = catalog
            .commands()
            .iter()
            .map(|command| (command.key.full_name(), command.clone()))
            .collect();
        Self { commands }
    }

    pub fn resolve(&self, full_name: &str) -> Option<&LogicalCommand> {
        self.commands.get(full_name)
    }

    /// Run the named command's action. Returns whether the request was
    /// handled; the action's own outcome is reported but never propagated,
    /// since the host routes many foreign names through this boundary.
    pub fn exec<B: AttachBackend + ?Sized>(&self, full_name: &str, backend: &mut B) -> bool {
        let Some(command) = self.resolve(full_name) else {
            return false;
        };

        let result = match &command.action {
            CommandAction::Standard(selector) => backend.attach(selector),
            CommandAction::Iis(selector) => backend.attach_iis(selector),
        };
        if let Err(error) = result {
            tracing::warn!(command = full_name, %error, "attach action failed");
        }
        true
    }

    /// Status for a known command is always supported+enabled. Unknown
    /// names return `None` so the host default stands.
    pub fn query_status(&self, full_name: &str) -> Option<Visibility> {
        self.resolve(full_name)
            .map(|_| Visibility::supported_and_enabled())
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }
}
