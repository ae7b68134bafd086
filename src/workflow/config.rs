//! Workflow files: roots, seeded variables, defaults and the step list

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::errors::ConfigError;
use crate::operations::{build_operation, normalize_command_path, OperationDefaults};
use crate::options::{OptionMap, OptionValue};
use crate::plan::OperationNode;
use crate::task::ActionRegistry;

/// File name looked up in the working directory when no workflow is given
pub const DEFAULT_WORKFLOW_FILE: &str = "heddle.yaml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Directories searched for repositories
    #[serde(default)]
    pub roots: Vec<String>,

    /// Variables seeded into every repository's store
    #[serde(default)]
    pub variables: BTreeMap<String, OptionValue>,

    /// Fleet-wide operation fallbacks (`require_clean`)
    #[serde(default)]
    pub defaults: OptionValue,

    #[serde(default)]
    pub max_parallel: Option<usize>,

    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepConfig {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub after: Vec<String>,

    #[serde(default, alias = "command_path")]
    pub command: Option<String>,

    #[serde(default, alias = "options")]
    pub with: OptionValue,
}

impl StepConfig {
    /// Normalized command path, `None` when missing or blank
    pub fn command_path(&self) -> Option<String> {
        self.command
            .as_deref()
            .map(normalize_command_path)
            .filter(|c| !c.is_empty())
    }

    /// Explicit name, falling back to the command path
    pub fn resolved_name(&self) -> Option<String> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .or_else(|| self.command_path())
    }
}

impl WorkflowConfig {
    /// Load a workflow file. `.toml` files are read as TOML, anything else as YAML.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read workflow file: {}", path.display()))?;

        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        let parsed = if is_toml {
            Self::from_toml_str(&content)
        } else {
            Self::from_yaml_str(&content)
        };
        parsed.with_context(|| format!("Failed to parse workflow file: {}", path.display()))
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Invalid workflow YAML")
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid workflow TOML")
    }

    /// Check step-level structure, collecting every problem found.
    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();
        let mut names = HashSet::new();

        for (index, step) in self.steps.iter().enumerate() {
            let label = step
                .resolved_name()
                .unwrap_or_else(|| format!("#{}", index + 1));
            if step.command_path().is_none() {
                errors.push(ConfigError::MissingCommandPath {
                    step: label.clone(),
                });
            }
            if !names.insert(label.clone()) {
                errors.push(ConfigError::DuplicateName(label.clone()));
            }
            if step.after.iter().any(|dep| dep.trim() == label) {
                errors.push(ConfigError::SelfDependency(label));
            }
        }

        for step in &self.steps {
            let Some(name) = step.resolved_name() else {
                continue;
            };
            for dep in &step.after {
                let dep = dep.trim();
                if dep != name && !names.contains(dep) {
                    errors.push(ConfigError::UnknownDependency {
                        node: name.clone(),
                        dependency: dep.to_string(),
                    });
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Seeded variables as strings. Scalars are rendered, null is dropped.
    pub fn seeds(&self) -> Result<Vec<(String, String)>> {
        let mut seeds = Vec::with_capacity(self.variables.len());
        for (name, value) in &self.variables {
            let rendered = match value {
                OptionValue::Null => continue,
                OptionValue::String(s) => s.clone(),
                OptionValue::Bool(_) | OptionValue::Number(_) => value.to_string(),
                _ => bail!("variable '{name}' must be a scalar"),
            };
            seeds.push((name.clone(), rendered));
        }
        Ok(seeds)
    }

    pub fn operation_defaults(&self) -> Result<OperationDefaults, ConfigError> {
        let options = OptionMap::from_value("defaults", &self.defaults).map_err(|source| {
            ConfigError::InvalidOption {
                step: "defaults".to_string(),
                source,
            }
        })?;
        OperationDefaults::from_options(&options).map_err(|source| ConfigError::InvalidOption {
            step: "defaults".to_string(),
            source,
        })
    }

    /// Validate the workflow and build one operation node per step.
    ///
    /// The defaults pass runs here, before operations are shared.
    pub fn build_nodes(&self, actions: &ActionRegistry) -> Result<Vec<OperationNode>> {
        if let Err(errors) = self.validate() {
            let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
            bail!("Validation errors:\n  - {}", messages.join("\n  - "));
        }

        let defaults = self.operation_defaults()?;
        let mut nodes = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            let (Some(name), Some(command)) = (step.resolved_name(), step.command_path()) else {
                // validate() rejects steps without a command path
                continue;
            };
            let options = OptionMap::from_value("with", &step.with).map_err(|source| {
                ConfigError::InvalidOption {
                    step: name.clone(),
                    source,
                }
            })?;

            let mut operation = build_operation(&name, &command, &options, actions)?;
            operation.apply_defaults(&defaults);

            nodes.push(
                OperationNode::new(Arc::from(operation))
                    .named(name)
                    .after(step.after.iter().map(|d| d.trim().to_string())),
            );
        }
        Ok(nodes)
    }
}

/// Where to look for a workflow when none was named.
///
/// `./heddle.yaml` wins over `<config dir>/heddle/workflow.yaml`.
pub fn default_workflow_path() -> Option<PathBuf> {
    let local = PathBuf::from(DEFAULT_WORKFLOW_FILE);
    if local.is_file() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|dir| dir.join("heddle").join("workflow.yaml"))
        .filter(|path| path.is_file())
}
