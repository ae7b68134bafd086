//! Safeguard directives and the hard-stop / soft-skip split

use serde_json::Value;

use crate::options::{OptionError, OptionMap, OptionValue};

const HARD_STOP_KEY: &str = "hard_stop";
const SOFT_SKIP_KEY: &str = "soft_skip";

const DIRECTIVES: &[&str] = &[
    "require_clean",
    "require_changes",
    "branch",
    "branch_in",
    "paths",
    "file_exists",
];

/// `require_clean`, either a plain bool or `{enabled, ignore_dirty_paths}`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanRequirement {
    pub enabled: bool,
    /// Glob or directory patterns whose dirty entries are tolerated
    pub ignore_dirty_paths: Vec<String>,
}

impl CleanRequirement {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ignore_dirty_paths: Vec::new(),
        }
    }

    pub fn from_value(field: &str, value: &OptionValue) -> Result<Self, OptionError> {
        match value {
            Value::Object(_) => {
                let map = OptionMap::from_value(field, value)?;
                Ok(Self {
                    enabled: map.bool("enabled")?.unwrap_or(true),
                    ignore_dirty_paths: map.string_list("ignore_dirty_paths")?,
                })
            }
            other => {
                let enabled = OptionMap::new()
                    .with(field, other.clone())
                    .bool(field)?
                    .unwrap_or(false);
                Ok(Self {
                    enabled,
                    ignore_dirty_paths: Vec::new(),
                })
            }
        }
    }
}

/// One list of directives. Each directive is evaluated independently.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SafeguardSet {
    pub require_clean: Option<CleanRequirement>,
    pub require_changes: bool,
    pub branch: Option<String>,
    pub branch_in: Vec<String>,
    /// Relative paths that must exist (`paths` and `file_exists` combined)
    pub paths: Vec<String>,
}

impl SafeguardSet {
    pub fn from_options(options: &OptionMap) -> Result<Self, OptionError> {
        if let Some(unknown) = options.keys().find(|k| !DIRECTIVES.contains(k)) {
            return Err(OptionError::invalid(unknown, unknown, "unknown safeguard"));
        }

        let require_clean = options
            .raw("require_clean")
            .map(|value| CleanRequirement::from_value("require_clean", value))
            .transpose()?;

        let mut paths = options.string_list("paths")?;
        paths.extend(options.string_list("file_exists")?);

        Ok(Self {
            require_clean,
            require_changes: options.bool("require_changes")?.unwrap_or(false),
            branch: options
                .string("branch")?
                .map(|b| b.trim().to_string())
                .filter(|b| !b.is_empty()),
            branch_in: options.string_list("branch_in")?,
            paths,
        })
    }

    pub fn is_empty(&self) -> bool {
        !self.require_clean.as_ref().is_some_and(|c| c.enabled)
            && !self.require_changes
            && self.branch.is_none()
            && self.branch_in.is_empty()
            && self.paths.is_empty()
    }
}

/// Where a safeguard map without explicit buckets lands.
///
/// Whole-task safeguards use [`DefaultBucket::HardStop`]; safeguards attached
/// to a single action use [`DefaultBucket::SoftSkip`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultBucket {
    HardStop,
    SoftSkip,
}

/// Safeguards split by failure consequence
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SafeguardBuckets {
    /// Failure skips the repository for the rest of the run
    pub hard_stop: SafeguardSet,
    /// Failure skips the current step only
    pub soft_skip: SafeguardSet,
}

impl SafeguardBuckets {
    /// Split a safeguard map.
    ///
    /// Explicit `hard_stop:` / `soft_skip:` keys win. Without either, the
    /// whole map belongs to `default`. Mixing bare directives with explicit
    /// buckets is rejected.
    pub fn from_options(options: &OptionMap, default: DefaultBucket) -> Result<Self, OptionError> {
        let hard = options.map(HARD_STOP_KEY)?;
        let soft = options.map(SOFT_SKIP_KEY)?;

        if hard.is_none() && soft.is_none() {
            let set = SafeguardSet::from_options(options)?;
            return Ok(match default {
                DefaultBucket::HardStop => Self {
                    hard_stop: set,
                    ..Self::default()
                },
                DefaultBucket::SoftSkip => Self {
                    soft_skip: set,
                    ..Self::default()
                },
            });
        }

        if let Some(stray) = options
            .keys()
            .find(|k| *k != HARD_STOP_KEY && *k != SOFT_SKIP_KEY)
        {
            return Err(OptionError::invalid(
                stray,
                stray,
                "directive must be inside hard_stop or soft_skip",
            ));
        }

        Ok(Self {
            hard_stop: hard
                .map(|m| SafeguardSet::from_options(&m))
                .transpose()?
                .unwrap_or_default(),
            soft_skip: soft
                .map(|m| SafeguardSet::from_options(&m))
                .transpose()?
                .unwrap_or_default(),
        })
    }

    pub fn hard_stop(set: SafeguardSet) -> Self {
        Self {
            hard_stop: set,
            ..Self::default()
        }
    }

    pub fn soft_skip(set: SafeguardSet) -> Self {
        Self {
            soft_skip: set,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hard_stop.is_empty() && self.soft_skip.is_empty()
    }
}
