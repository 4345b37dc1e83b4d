use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Process names the IIS variant considers worker processes. `w3wp.exe` is
/// the modern application-pool worker; `aspnet_wp.exe` is the legacy one.
pub const IIS_WORKER_PROCESSES: &[&str] = &["w3wp.exe", "aspnet_wp.exe"];

/// Selector for the process a command attaches to.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProcessSelector {
    pub executable: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine: Option<String>,
}

impl ProcessSelector {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            machine: None,
        }
    }
}

/// Debugger edge consumed by command actions. Implementations own all
/// platform specifics; errors they return are reported by the dispatcher
/// but never propagate past it.
pub trait AttachBackend {
    /// Attach to the process named by the selector.
    fn attach(&mut self, selector: &ProcessSelector) -> Result<()>;

    /// Attach to the IIS worker process hosting the selected application.
    fn attach_iis(&mut self, selector: &ProcessSelector) -> Result<()>;
}

/// Filter a list of running process names down to IIS worker candidates.
/// Matching is case-insensitive because Windows process names are.
pub fn iis_worker_candidates<'a>(processes: &'a [String]) -> Vec<&'a str> {
    processes
        .iter()
        .map(String::as_str)
        .filter(|name| {
            IIS_WORKER_PROCESSES
                .iter()
                .any(|worker| name.eq_ignore_ascii_case(worker))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_filter_keeps_only_iis_workers() {
        let processes = vec![
            "chrome.exe".to_string(),
            "w3wp.exe".to_string(),
            "devenv.exe".to_string(),
            "aspnet_wp.exe".to_string(),
        ];
        let candidates = iis_worker_candidates(&processes);
        assert_eq!(candidates, vec!["w3wp.exe", "aspnet_wp.exe"]);
    }

    #[test]
    fn worker_filter_is_case_insensitive() {
        let processes = vec!["W3WP.EXE".to_string()];
        assert_eq!(iis_worker_candidates(&processes), vec!["W3WP.EXE"]);
    }

    #[test]
    fn worker_filter_handles_empty_input() {
        assert!(iis_worker_candidates(&[]).is_empty());
    }
}
