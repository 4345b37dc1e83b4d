use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::attach::ProcessSelector;

pub const DEFAULT_SETTINGS_FILENAME: &str = "attachto.toml";
pub const DEFAULT_NAMESPACE: &str = "AttachTo";

/// Declarative list of launch targets plus the global menu flag.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct Settings {
    #[serde(default)]
    pub display_in_tools_menu: bool,
    #[serde(default)]
    pub targets: Vec<LaunchTarget>,
}

/// One launch target definition. Immutable once loaded.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct LaunchTarget {
    pub name: String,
    #[serde(default)]
    pub display_text: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub attach_to_iis: bool,
    pub process: ProcessSelector,
}

impl LaunchTarget {
    pub fn display_text(&self) -> &str {
        self.display_text.as_deref().unwrap_or(&self.name)
    }

    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }
}

/// Resolve the settings path: env ATTACHTO_SETTINGS > explicit override >
/// `attachto.toml` next to the given base directory.
pub fn resolve_settings_path(base_dir: &Path, override_path: Option<&Path>) -> PathBuf {
    if let Ok(value) = env::var("ATTACHTO_SETTINGS") {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return absolutize(Path::new(trimmed), base_dir);
        }
    }
    if let Some(path) = override_path {
        return absolutize(path, base_dir);
    }
    base_dir.join(DEFAULT_SETTINGS_FILENAME)
}

/// Resolve the command namespace: env ATTACHTO_NAMESPACE > explicit
/// override > DEFAULT_NAMESPACE.
pub fn resolve_namespace(override_namespace: Option<&str>) -> String {
    if let Ok(value) = env::var("ATTACHTO_NAMESPACE") {
        let trimmed = value.trim().to_string();
        if !trimmed.is_empty() {
            return trimmed;
        }
    }
    override_namespace
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
        .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string())
}

/// Load and validate settings from a TOML file. Returns default (no
/// targets) if the file doesn't exist.
pub fn load_settings(settings_path: &Path) -> Result<Settings> {
    if !settings_path.exists() {
        return Ok(Settings::default());
    }
    let content = fs::read_to_string(settings_path)
        .with_context(|| format!("failed to read {}", settings_path.display()))?;
    let parsed: Settings = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", settings_path.display()))?;
    validate_settings(&parsed)?;
    Ok(parsed)
}

/// Per-target validation is this boundary's job; catalog construction
/// assumes every definition it receives is well formed.
fn validate_settings(settings: &Settings) -> Result<()> {
    for (index, target) in settings.targets.iter().enumerate() {
        if target.name.trim().is_empty() {
            bail!("target #{} has an empty name", index + 1);
        }
        if target.process.executable.trim().is_empty() {
            bail!(
                "target '{}' has an empty process executable",
                target.name.trim()
            );
        }
    }
    Ok(())
}

pub fn render_starter_settings() -> String {
    "# attachto launch target configuration\n\
     \n\
     display_in_tools_menu = true\n\
     \n\
     [[targets]]\n\
     name = \"Deploy\"\n\
     display_text = \"Attach to Deploy\"\n\
     description = \"Attach the debugger to the deploy service\"\n\
     attach_to_iis = false\n\
     process = { executable = \"deploy.exe\" }\n\
     \n\
     [[targets]]\n\
     name = \"Web\"\n\
     display_text = \"Attach to Web\"\n\
     description = \"Attach the debugger to the IIS worker process\"\n\
     attach_to_iis = true\n\
     process = { executable = \"w3wp.exe\" }\n"
        .to_string()
}

/// Write a starter settings file. Returns `true` when a write occurred.
pub fn init_settings(settings_path: &Path, force: bool) -> Result<bool> {
    if settings_path.exists() && !force {
        return Ok(false);
    }
    if let Some(parent) = settings_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(settings_path, render_starter_settings())
        .with_context(|| format!("failed to write {}", settings_path.display()))?;
    Ok(true)
}

fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_settings_returns_default_for_missing_file() {
        let settings =
            load_settings(Path::new("/nonexistent/attachto.toml")).expect("load settings");
        assert!(settings.targets.is_empty());
        assert!(!settings.display_in_tools_menu);
    }

    #[test]
    fn load_settings_parses_targets_in_order() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("attachto.toml");
        fs::write(
            &path,
            r#"
display_in_tools_menu = true

[[targets]]
name = "Deploy"
display_text = "Attach to Deploy"
description = "deploy service"
process = { executable = "deploy.exe" }

[[targets]]
name = "Web"
attach_to_iis = true
process = { executable = "w3wp.exe", machine = "web01" }
"#,
        )
        .expect("write settings");

        let settings = load_settings(&path).expect("load settings");
        assert!(settings.display_in_tools_menu);
        assert_eq!(settings.targets.len(), 2);
        assert_eq!(settings.targets[0].name, "Deploy");
        assert_eq!(settings.targets[0].display_text(), "Attach to Deploy");
        assert!(!settings.targets[0].attach_to_iis);
        assert_eq!(settings.targets[1].name, "Web");
        assert_eq!(settings.targets[1].display_text(), "Web");
        assert!(settings.targets[1].attach_to_iis);
        assert_eq!(settings.targets[1].process.machine.as_deref(), Some("web01"));
    }

    #[test]
    fn load_settings_rejects_empty_target_name() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("attachto.toml");
        fs::write(
            &path,
            "[[targets]]\nname = \"  \"\nprocess = { executable = \"a.exe\" }\n",
        )
        .expect("write settings");

        let error = load_settings(&path).expect_err("must fail");
        assert!(error.to_string().contains("empty name"));
    }

    #[test]
    fn load_settings_rejects_empty_executable() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("attachto.toml");
        fs::write(
            &path,
            "[[targets]]\nname = \"Deploy\"\nprocess = { executable = \"\" }\n",
        )
        .expect("write settings");

        let error = load_settings(&path).expect_err("must fail");
        assert!(error.to_string().contains("empty process executable"));
    }

    #[test]
    fn load_settings_returns_error_for_invalid_toml() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("attachto.toml");
        fs::write(&path, "[[targets\nname = \"oops\"").expect("write settings");
        let error = load_settings(&path).expect_err("must fail");
        assert!(error.to_string().contains("failed to parse"));
    }

    #[test]
    fn init_settings_writes_parseable_starter_file() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("attachto.toml");
        let wrote = init_settings(&path, false).expect("init");
        assert!(wrote);

        let settings = load_settings(&path).expect("load starter");
        assert_eq!(settings.targets.len(), 2);
        assert!(settings.display_in_tools_menu);

        let wrote_again = init_settings(&path, false).expect("init again");
        assert!(!wrote_again);
    }

    #[test]
    fn resolve_namespace_defaults_without_override() {
        assert_eq!(resolve_namespace(None), DEFAULT_NAMESPACE);
        assert_eq!(resolve_namespace(Some("  ")), DEFAULT_NAMESPACE);
        assert_eq!(resolve_namespace(Some("MyExt")), "MyExt");
    }
}
