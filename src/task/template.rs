//! `${name}` templates rendered against one repository

use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use thiserror::Error;

use crate::env::VariableStore;
use crate::repository::RepositoryState;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{\s*([A-Za-z0-9_.\-]+)\s*\}").expect("Invalid regex pattern")
});

static NON_ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("Invalid regex pattern"));

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unknown template variable '{0}'")]
    Unknown(String),
}

/// Values a task template may reference.
///
/// Repository facts live under `repository.*`, the task name under
/// `task.name`. Seeded and captured variables are reachable both bare
/// (`${branch}`) and as `${variables.branch}`.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    values: BTreeMap<String, String>,
}

impl TemplateContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_repository(
        repository: &RepositoryState,
        task_name: &str,
        variables: &VariableStore,
    ) -> Self {
        let mut context = Self::new();
        for (name, value) in variables.snapshot() {
            context.insert(&format!("variables.{name}"), &value);
            context.insert(&name, &value);
        }

        let name = repository.name();
        if let Some(owner) = repository.owner() {
            context.insert("repository.owner", owner);
            context.insert("repository.full_name", &format!("{owner}/{name}"));
        }
        context.insert("repository.name", &name);
        context.insert("repository.default_branch", repository.default_branch());
        context.insert("repository.path", &repository.path.display().to_string());
        context.insert("repository.path_depth", &repository.path_depth.to_string());
        context.insert(
            "repository.initial_clean",
            if repository.initially_clean { "true" } else { "false" },
        );
        context.insert("task.name", task_name);
        context
    }

    pub fn insert(&mut self, name: &str, value: &str) {
        self.values.insert(name.to_string(), value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Replace every placeholder in one pass.
    ///
    /// Substituted values are not rescanned. An unknown name is an error.
    pub fn render(&self, template: &str) -> Result<String, TemplateError> {
        let mut missing = None;
        let rendered = PLACEHOLDER.replace_all(template, |caps: &Captures| {
            let name = &caps[1];
            match self.values.get(name) {
                Some(value) => value.clone(),
                None => {
                    missing.get_or_insert_with(|| name.to_string());
                    String::new()
                }
            }
        });
        match missing {
            Some(name) => Err(TemplateError::Unknown(name)),
            None => Ok(rendered.into_owned()),
        }
    }
}

/// Lower-case, collapse every run of non-alphanumerics to one hyphen, trim hyphens.
pub fn sanitize_branch_name(raw: &str) -> String {
    NON_ALPHANUMERIC
        .replace_all(&raw.to_lowercase(), "-")
        .trim_matches('-')
        .to_string()
}
