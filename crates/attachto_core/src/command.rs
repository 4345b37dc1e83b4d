use std::fmt;

use serde::Serialize;

use crate::attach::ProcessSelector;
use crate::settings::{LaunchTarget, Settings};

pub const NAME_SEPARATOR: char = '.';

/// Namespace prefix owned by this extension. The namespace itself may
/// contain separators ("LazyCat.VSTools.AttachTo"); only the segment after
/// it is constrained.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct CommandNamespace(String);

impl CommandNamespace {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self(namespace.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommandNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Two-part command identity. Host-visible names are rendered as
/// `namespace.short_name`; `short_name` never contains a separator, which
/// is what distinguishes this extension's top-level commands from nested or
/// foreign names during reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct CommandKey {
    namespace: CommandNamespace,
    short_name: String,
}

impl CommandKey {
    /// Build a key from a definition name. Separators and whitespace are
    /// collapsed out of the short name so the rendered full name always
    /// splits back into exactly two parts.
    pub fn derive(namespace: &CommandNamespace, definition_name: &str) -> Self {
        let short_name = definition_name
            .chars()
            .filter(|ch| !ch.is_whitespace() && *ch != NAME_SEPARATOR)
            .collect();
        Self {
            namespace: namespace.clone(),
            short_name,
        }
    }

    /// Parse a host-registered name against an expected namespace. Returns
    /// `None` for foreign prefixes and for nested names (a remainder that
    /// is empty or contains a further separator).
    pub fn parse(full_name: &str, namespace: &CommandNamespace) -> Option<Self> {
        let remainder = full_name.strip_prefix(namespace.as_str())?;
        let short_name = remainder.strip_prefix(NAME_SEPARATOR)?;
        if short_name.is_empty() || short_name.contains(NAME_SEPARATOR) {
            return None;
        }
        Some(Self {
            namespace: namespace.clone(),
            short_name: short_name.to_string(),
        })
    }

    pub fn namespace(&self) -> &CommandNamespace {
        &self.namespace
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    pub fn full_name(&self) -> String {
        format!("{}{}{}", self.namespace, NAME_SEPARATOR, self.short_name)
    }
}

/// Which attach strategy a command runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandAction {
    Standard(ProcessSelector),
    Iis(ProcessSelector),
}

/// An attach-target command derived from one configuration entry,
/// independent of host registration state.
#[derive(Debug, Clone)]
pub struct LogicalCommand {
    pub key: CommandKey,
    pub display_text: String,
    pub description: String,
    pub action: CommandAction,
}

impl LogicalCommand {
    fn from_target(namespace: &CommandNamespace, target: &LaunchTarget) -> Self {
        let selector = target.process.clone();
        let action = if target.attach_to_iis {
            CommandAction::Iis(selector)
        } else {
            CommandAction::Standard(selector)
        };
        Self {
            key: CommandKey::derive(namespace, target.name.trim()),
            display_text: target.display_text().to_string(),
            description: target.description().to_string(),
            action,
        }
    }
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct CatalogReport {
    pub commands: usize,
    pub dropped_duplicates: Vec<String>,
}

/// Ordered set of logical commands for one session. Order is declaration
/// order and drives menu placement.
#[derive(Debug, Clone)]
pub struct Catalog {
    namespace: CommandNamespace,
    commands: Vec<LogicalCommand>,
}

impl Catalog {
    /// Map definitions to logical commands, preserving order. Definitions
    /// whose derived short name collides with an earlier one are dropped,
    /// first occurrence wins.
    pub fn build(namespace: &CommandNamespace, settings: &Settings) -> (Self, CatalogReport) {
        let mut commands: Vec<LogicalCommand> = Vec::with_capacity(settings.targets.len());
        let mut dropped = Vec::new();

        for target in &settings.targets {
            let command = LogicalCommand::from_target(namespace, target);
            let duplicate = commands
                .iter()
                .any(|existing| existing.key.short_name() == command.key.short_name());
            if duplicate {
                tracing::warn!(
                    short_name = command.key.short_name(),
                    "dropping duplicate launch target"
                );
                dropped.push(target.name.trim().to_string());
            } else {
                commands.push(command);
            }
        }

        let report = CatalogReport {
            commands: commands.len(),
            dropped_duplicates: dropped,
        };
        (
            Self {
                namespace: namespace.clone(),
                commands,
            },
            report,
        )
    }

    pub fn namespace(&self) -> &CommandNamespace {
        &self.namespace
    }

    pub fn commands(&self) -> &[LogicalCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn find_by_full_name(&self, full_name: &str) -> Option<&LogicalCommand> {
        self.commands
            .iter()
            .find(|command| command.key.full_name() == full_name)
    }
}
