use anyhow::{Context, Result};
use serde::Serialize;

use crate::attach::AttachBackend;
use crate::command::{Catalog, CatalogReport, CommandNamespace};
use crate::dispatch::DispatchTable;
use crate::host::{HostRegistry, Visibility};
use crate::reconcile::{CommandMap, ReconcileOptions, ReconcileReport, reconcile};
use crate::settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Inactive,
    Active,
}

/// Why the host is deactivating the session. Only an explicit user close
/// tears registrations down; everything else is treated as transient so
/// commands survive and are re-paired on the next activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectReason {
    UserClosed,
    HostShutdown,
    SolutionClosing,
    Other,
}

impl DisconnectReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UserClosed => "user_closed",
            Self::HostShutdown => "host_shutdown",
            Self::SolutionClosing => "solution_closing",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivationReport {
    pub catalog: CatalogReport,
    pub reconcile: ReconcileReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeactivationReport {
    pub reason: DisconnectReason,
    pub torn_down: bool,
    pub deleted: usize,
}

/// One activation/deactivation cycle against the host. Owns the
/// command map and dispatch table between the two calls; all entry points
/// are host-driven and synchronous.
#[derive(Debug)]
pub struct Session {
    namespace: CommandNamespace,
    state: SessionState,
    map: CommandMap,
    dispatch: DispatchTable,
}

impl Session {
    pub fn new(namespace: CommandNamespace) -> Self {
        Self {
            namespace,
            state: SessionState::Inactive,
            map: CommandMap::default(),
            dispatch: DispatchTable::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn namespace(&self) -> &CommandNamespace {
        &self.namespace
    }

    pub fn tracked_commands(&self) -> usize {
        self.map.len()
    }

    /// Build the catalog, reconcile it against the host, and populate the
    /// dispatch table. Safe to call again without an intervening teardown:
    /// the second pass pairs already-created entries as surviving.
    pub fn activate<R: HostRegistry + ?Sized>(
        &mut self,
        settings: &Settings,
        registry: &mut R,
    ) -> Result<ActivationReport> {
        let (catalog, catalog_report) = Catalog::build(&self.namespace, settings);
        let options = ReconcileOptions::with_menu(settings.display_in_tools_menu);
        let outcome = reconcile(&catalog, registry, &options).context("activation failed")?;

        self.map = outcome.map;
        self.dispatch = DispatchTable::from_catalog(&catalog);
        self.state = SessionState::Active;
        tracing::debug!(
            commands = self.map.len(),
            namespace = %self.namespace,
            "session activated"
        );

        Ok(ActivationReport {
            catalog: catalog_report,
            reconcile: outcome.report,
        })
    }

    /// Tear down on a genuine user close; every other reason is a no-op so
    /// transient host events don't churn the registry.
    pub fn deactivate<R: HostRegistry + ?Sized>(
        &mut self,
        reason: DisconnectReason,
        registry: &mut R,
    ) -> Result<DeactivationReport> {
        if reason != DisconnectReason::UserClosed {
            tracing::debug!(reason = reason.as_str(), "ignoring transient disconnect");
            return Ok(DeactivationReport {
                reason,
                torn_down: false,
                deleted: 0,
            });
        }

        let mut deleted = 0;
        for handle in self.map.tracked_handles() {
            registry
                .delete(&handle)
                .with_context(|| format!("failed to delete command '{}'", handle.name()))?;
            deleted += 1;
        }
        self.map.clear();
        self.dispatch.clear();
        self.state = SessionState::Inactive;
        tracing::debug!(deleted, "session deactivated");

        Ok(DeactivationReport {
            reason,
            torn_down: true,
            deleted,
        })
    }

    /// Host invocation boundary: returns whether the name was handled.
    pub fn exec<B: AttachBackend + ?Sized>(&self, full_name: &str, backend: &mut B) -> bool {
        if self.state != SessionState::Active {
            return false;
        }
        self.dispatch.exec(full_name, backend)
    }

    /// Host status query: `None` leaves the host's default status in place.
    pub fn query_status(&self, full_name: &str) -> Option<Visibility> {
        if self.state != SessionState::Active {
            return None;
        }
        self.dispatch.query_status(full_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attach::ProcessSelector;
    use crate::host::{RegistryMutation, SnapshotRegistry};
    use crate::settings::LaunchTarget;

    fn settings(names: &[&str]) -> Settings {
        Settings {
            display_in_tools_menu: true,
            targets: names
                .iter()
                .map(|name| LaunchTarget {
                    name: (*name).to_string(),
                    display_text: None,
                    description: None,
                    attach_to_iis: false,
                    process: ProcessSelector::new("service.exe"),
                })
                .collect(),
        }
    }

    fn session() -> Session {
        Session::new(CommandNamespace::new("ThisExt"))
    }

    #[test]
    fn activation_registers_and_enables_dispatch() {
        let mut session = session();
        let mut registry = SnapshotRegistry::default();
        let report = session
            .activate(&settings(&["Deploy"]), &mut registry)
            .expect("activate");

        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(report.reconcile.created, 1);
        assert!(registry.contains("ThisExt.Deploy"));
        assert!(session.query_status("ThisExt.Deploy").is_some());
    }

    #[test]
    fn double_activation_creates_nothing_new() {
        let mut session = session();
        let mut registry = SnapshotRegistry::default();
        session
            .activate(&settings(&["Deploy", "Web"]), &mut registry)
            .expect("first activate");
        let report = session
            .activate(&settings(&["Deploy", "Web"]), &mut registry)
            .expect("second activate");

        assert_eq!(report.reconcile.created, 0);
        assert_eq!(report.reconcile.matched, 2);
        assert_eq!(session.tracked_commands(), 2);
        let creates = registry
            .mutations()
            .iter()
            .filter(|mutation| matches!(mutation, RegistryMutation::Create { .. }))
            .count();
        assert_eq!(creates, 2);
    }

    #[test]
    fn transient_disconnect_leaves_registry_untouched() {
        let mut session = session();
        let mut registry = SnapshotRegistry::default();
        session
            .activate(&settings(&["Deploy"]), &mut registry)
            .expect("activate");

        for reason in [
            DisconnectReason::HostShutdown,
            DisconnectReason::SolutionClosing,
            DisconnectReason::Other,
        ] {
            let report = session.deactivate(reason, &mut registry).expect("deactivate");
            assert!(!report.torn_down);
            assert_eq!(report.deleted, 0);
        }
        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(session.tracked_commands(), 1);
        assert!(registry.contains("ThisExt.Deploy"));
    }

    #[test]
    fn user_close_deletes_every_tracked_entry() {
        let mut session = session();
        let mut registry = SnapshotRegistry::default();
        session
            .activate(&settings(&["Deploy", "Web"]), &mut registry)
            .expect("activate");

        let report = session
            .deactivate(DisconnectReason::UserClosed, &mut registry)
            .expect("deactivate");
        assert!(report.torn_down);
        assert_eq!(report.deleted, 2);
        assert_eq!(session.state(), SessionState::Inactive);
        assert_eq!(session.tracked_commands(), 0);
        assert!(!registry.contains("ThisExt.Deploy"));
        assert!(!registry.contains("ThisExt.Web"));
    }

    #[test]
    fn inactive_session_handles_nothing() {
        let session = session();
        struct PanicBackend;
        impl AttachBackend for PanicBackend {
            fn attach(&mut self, _selector: &ProcessSelector) -> anyhow::Result<()> {
                panic!("must not be called");
            }
            fn attach_iis(&mut self, _selector: &ProcessSelector) -> anyhow::Result<()> {
                panic!("must not be called");
            }
        }
        let mut backend = PanicBackend;
        assert!(!session.exec("ThisExt.Deploy", &mut backend));
        assert!(session.query_status("ThisExt.Deploy").is_none());
    }

    #[test]
    fn reactivation_after_transient_disconnect_pairs_survivors() {
        let mut registry = SnapshotRegistry::default();
        let mut session = session();
        session
            .activate(&settings(&["Deploy"]), &mut registry)
            .expect("activate");
        session
            .deactivate(DisconnectReason::HostShutdown, &mut registry)
            .expect("transient deactivate");

        // Next session boots against the same host registry.
        let mut next = Session::new(CommandNamespace::new("ThisExt"));
        let report = next
            .activate(&settings(&["Deploy"]), &mut registry)
            .expect("reactivate");
        assert_eq!(report.reconcile.matched, 1);
        assert_eq!(report.reconcile.created, 0);
    }
}
