//! Declarative task definitions decoded from step options

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde_json::Value;

use super::actions::{ActionGuard, ActionKind, ActionRegistry, ActionSpec};
use crate::errors::ConfigError;
use crate::options::{OptionError, OptionMap};
use crate::safeguards::{DefaultBucket, SafeguardBuckets};

const DEFAULT_BRANCH_TEMPLATE: &str = "heddle/${task.name}";
const DEFAULT_COMMIT_TEMPLATE: &str = "${task.name}";
const DEFAULT_REMOTE: &str = "origin";

/// How a declared file is written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FileMode {
    /// Always (re)write the rendered content
    #[default]
    Overwrite,
    /// Never touch an existing file
    SkipIfExists,
    /// Add only the rendered lines the file does not already contain
    AppendIfMissing,
}

impl FileMode {
    pub fn as_str(self) -> &'static str {
        match self {
            FileMode::Overwrite => "overwrite",
            FileMode::SkipIfExists => "skip-if-exists",
            FileMode::AppendIfMissing => "append-if-missing",
        }
    }
}

impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "" | "overwrite" => Ok(FileMode::Overwrite),
            "skip-if-exists" | "create" => Ok(FileMode::SkipIfExists),
            "append-if-missing" | "append" | "line-edit" => Ok(FileMode::AppendIfMissing),
            other => Err(format!("unknown file mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSpec {
    /// Repository-relative path template
    pub path: String,
    /// Content template
    pub content: String,
    pub mode: FileMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchSpec {
    pub name: String,
    /// Defaults to the repository's default branch
    pub start_point: Option<String>,
    pub push_remote: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestSpec {
    pub title: String,
    pub body: String,
    /// Defaults to the repository's default branch
    pub base: Option<String>,
    pub draft: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskDefinition {
    pub name: String,
    pub ensure_clean: bool,
    /// Variable whose value, when set, overrides `ensure_clean`
    pub ensure_clean_variable: Option<String>,
    pub branch: Option<BranchSpec>,
    pub files: Vec<FileSpec>,
    /// Explicitly declared actions. Empty means the default pipeline.
    pub actions: Vec<ActionSpec>,
    pub commit_message: String,
    pub pull_request: Option<PullRequestSpec>,
    /// Whole-task safeguards; bare maps default to hard-stop
    pub safeguards: SafeguardBuckets,
}

impl TaskDefinition {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ensure_clean: true,
            ensure_clean_variable: None,
            branch: None,
            files: Vec::new(),
            actions: Vec::new(),
            commit_message: DEFAULT_COMMIT_TEMPLATE.to_string(),
            pull_request: None,
            safeguards: SafeguardBuckets::default(),
        }
    }

    /// Decode one entry of a `tasks` list.
    pub fn from_options(
        step: &str,
        options: &OptionMap,
        registry: &ActionRegistry,
    ) -> Result<Self, ConfigError> {
        let invalid = |source: OptionError| ConfigError::InvalidOption {
            step: step.to_string(),
            source,
        };

        let name = options.require_string("name").map_err(invalid)?;
        let mut task = TaskDefinition::new(name.trim());

        if let Some(ensure_clean) = options.bool("ensure_clean").map_err(invalid)? {
            task.ensure_clean = ensure_clean;
        }
        task.ensure_clean_variable = options
            .string("ensure_clean_variable")
            .map_err(invalid)?
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        task.branch = parse_branch(options).map_err(invalid)?;

        for (index, entry) in options.list("files").map_err(invalid)?.iter().enumerate() {
            let field = format!("files[{index}]");
            let file = OptionMap::from_value(&field, entry).map_err(invalid)?;
            task.files.push(parse_file(&field, &file).map_err(invalid)?);
        }

        match options.raw("commit") {
            None => {}
            Some(Value::String(message)) => task.commit_message = message.clone(),
            Some(_) => {
                let commit = options.map("commit").map_err(invalid)?.unwrap_or_default();
                if let Some(message) = commit.string("message").map_err(invalid)? {
                    task.commit_message = message;
                }
            }
        }

        if let Some(pr) = options.map("pull_request").map_err(invalid)? {
            task.pull_request = Some(PullRequestSpec {
                title: pr.string("title").map_err(invalid)?.unwrap_or_else(|| task.commit_message.clone()),
                body: pr.string("body").map_err(invalid)?.unwrap_or_default(),
                base: pr.string("base").map_err(invalid)?,
                draft: pr.bool("draft").map_err(invalid)?.unwrap_or(false),
            });
        }

        for (index, entry) in options.list("actions").map_err(invalid)?.iter().enumerate() {
            let field = format!("actions[{index}]");
            let action = OptionMap::from_value(&field, entry).map_err(invalid)?;
            task.actions.push(parse_action(step, &field, &action, registry)?);
        }

        if let Some(safeguards) = options.map("safeguards").map_err(invalid)? {
            task.safeguards = SafeguardBuckets::from_options(&safeguards, DefaultBucket::HardStop)
                .map_err(invalid)?;
        }

        if task.files.is_empty() && task.actions.is_empty() {
            return Err(ConfigError::invalid(
                format!("step '{step}' task '{}'", task.name),
                "declares neither files nor actions",
            ));
        }

        Ok(task)
    }
}

fn parse_branch(options: &OptionMap) -> Result<Option<BranchSpec>, OptionError> {
    let default_remote = || DEFAULT_REMOTE.to_string();
    match options.raw("branch") {
        None => Ok(None),
        Some(Value::Bool(false)) => Ok(None),
        Some(Value::Bool(true)) => Ok(Some(BranchSpec {
            name: DEFAULT_BRANCH_TEMPLATE.to_string(),
            start_point: None,
            push_remote: default_remote(),
        })),
        Some(Value::String(name)) => Ok(Some(BranchSpec {
            name: name.clone(),
            start_point: None,
            push_remote: default_remote(),
        })),
        Some(_) => {
            let branch = options.map("branch")?.unwrap_or_default();
            Ok(Some(BranchSpec {
                name: branch
                    .string("name")?
                    .unwrap_or_else(|| DEFAULT_BRANCH_TEMPLATE.to_string()),
                start_point: branch.string("start_point")?,
                push_remote: branch.string("push_remote")?.unwrap_or_else(default_remote),
            }))
        }
    }
}

fn parse_file(field: &str, file: &OptionMap) -> Result<FileSpec, OptionError> {
    let path = file.require_string("path")?;
    let mode = match file.string("mode")? {
        Some(raw) => raw
            .parse()
            .map_err(|reason: String| OptionError::invalid(&format!("{field}.mode"), raw, reason))?,
        None => FileMode::default(),
    };
    Ok(FileSpec {
        path,
        content: file.string("content")?.unwrap_or_default(),
        mode,
    })
}

/// Keys consumed by the action decoder; everything else goes to custom handlers
const ACTION_KEYS: &[&str] = &["type", "guards", "safeguards"];

fn parse_action(
    step: &str,
    field: &str,
    action: &OptionMap,
    registry: &ActionRegistry,
) -> Result<ActionSpec, ConfigError> {
    let invalid = |source: OptionError| ConfigError::InvalidOption {
        step: step.to_string(),
        source,
    };

    let kind_name = action.require_string("type").map_err(invalid)?;
    let kind = match normalize_action_type(&kind_name).as_str() {
        "branch.prepare" => ActionKind::BranchPrepare,
        "files.apply" => ActionKind::FileApply,
        "git.stage" => ActionKind::Stage,
        "git.commit" => ActionKind::Commit {
            message: action.string("message").map_err(invalid)?,
        },
        "git.push" => ActionKind::Push,
        "pull_request.open" | "pull_request.create" | "pr.open" => ActionKind::PullRequest,
        "shell" | "shell.run" => ActionKind::Shell {
            command: action.require_string("command").map_err(invalid)?,
            capture: action.string("capture").map_err(invalid)?,
            timeout: action
                .integer("timeout_seconds")
                .map_err(invalid)?
                .map(Duration::from_secs),
        },
        custom => {
            registry.get(custom)?;
            let options = action
                .keys()
                .filter(|k| !ACTION_KEYS.contains(k))
                .filter_map(|k| action.raw(k).map(|v| (k.to_string(), v.clone())))
                .collect();
            ActionKind::Custom {
                kind: custom.to_string(),
                options,
            }
        }
    };

    let mut spec = ActionSpec::new(kind);

    if action.contains("guards") {
        spec.guards = action
            .string_list("guards")
            .map_err(invalid)?
            .iter()
            .map(|name| {
                name.parse::<ActionGuard>().map_err(|reason| {
                    invalid(OptionError::invalid(&format!("{field}.guards"), name.clone(), reason))
                })
            })
            .collect::<Result<_, _>>()?;
    }

    if let Some(safeguards) = action.map("safeguards").map_err(invalid)? {
        let buckets = SafeguardBuckets::from_options(&safeguards, DefaultBucket::SoftSkip)
            .map_err(invalid)?;
        spec.guards.push(ActionGuard::Safeguards(buckets));
    }

    Ok(spec)
}

/// `Pull-Request Open` -> `pull_request.open`
pub fn normalize_action_type(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '.')
        .filter(|part| !part.is_empty())
        .map(|part| part.replace('-', "_"))
        .collect::<Vec<_>>()
        .join(".")
}
