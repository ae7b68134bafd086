//! Map a step's command path and options to an operation

use std::path::PathBuf;

use super::{
    AuditReportOperation, CanonicalizeRemoteOperation, CleanPolicy, FolderRenameOperation,
    Operation, ProtocolConvertOperation, TaskApplyOperation,
};
use crate::errors::ConfigError;
use crate::options::{OptionError, OptionMap};
use crate::ports::RemoteProtocol;
use crate::task::{ActionRegistry, TaskDefinition};

/// Recognized command paths, in normalized form
pub const COMMAND_PATHS: &[&str] = &[
    "remote protocol-convert",
    "remote canonicalize",
    "folder rename",
    "tasks apply",
    "audit report",
];

/// Lower-case a command path and collapse separators (`Remote/Protocol-Convert`
/// and `remote  protocol-convert` are the same command).
pub fn normalize_command_path(raw: &str) -> String {
    raw.split(|c: char| c.is_whitespace() || c == '/' || c == ':')
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Build the operation for one step.
///
/// Required fields are validated here so that a malformed step fails the
/// run before any repository is touched.
pub fn build_operation(
    step: &str,
    command: &str,
    options: &OptionMap,
    actions: &ActionRegistry,
) -> Result<Box<dyn Operation>, ConfigError> {
    let invalid = |source: OptionError| ConfigError::InvalidOption {
        step: step.to_string(),
        source,
    };

    let path = normalize_command_path(command);
    if path.is_empty() {
        return Err(ConfigError::MissingCommandPath {
            step: step.to_string(),
        });
    }

    let clean = CleanPolicy::from_options(options).map_err(invalid)?;

    let operation: Box<dyn Operation> = match path.as_str() {
        "remote protocol-convert" | "remote convert-protocol" => {
            let from = protocol_option(options, "from").map_err(invalid)?;
            let to = protocol_option(options, "to").map_err(invalid)?;
            if from == to {
                return Err(invalid(OptionError::invalid(
                    "to",
                    to.as_str(),
                    "must differ from 'from'",
                )));
            }
            Box::new(ProtocolConvertOperation {
                from,
                to,
                remote: remote_option(options).map_err(invalid)?,
                clean,
            })
        }
        "remote canonicalize" | "remote update-to-canonical" => {
            let protocol = match options.string("protocol").map_err(invalid)? {
                Some(_) => Some(protocol_option(options, "protocol").map_err(invalid)?),
                None => None,
            };
            Box::new(CanonicalizeRemoteOperation {
                remote: remote_option(options).map_err(invalid)?,
                protocol,
                clean,
            })
        }
        "folder rename" => Box::new(FolderRenameOperation {
            include_owner: options
                .bool("include_owner")
                .map_err(invalid)?
                .unwrap_or(false),
            clean,
        }),
        "tasks apply" => {
            let entries = options.list("tasks").map_err(invalid)?;
            if entries.is_empty() {
                return Err(ConfigError::invalid(
                    format!("step '{step}'"),
                    "tasks apply needs at least one task",
                ));
            }
            let mut tasks = Vec::with_capacity(entries.len());
            for (index, entry) in entries.iter().enumerate() {
                let task = OptionMap::from_value(&format!("tasks[{index}]"), entry).map_err(invalid)?;
                tasks.push(TaskDefinition::from_options(step, &task, actions)?);
            }
            Box::new(TaskApplyOperation { tasks, clean })
        }
        "audit report" | "audit" => Box::new(AuditReportOperation {
            output: options.string("output").map_err(invalid)?.map(PathBuf::from),
        }),
        _ => return Err(ConfigError::UnknownCommand(path)),
    };

    tracing::debug!(step, command = %path, "operation built");
    Ok(operation)
}

fn protocol_option(options: &OptionMap, field: &str) -> Result<RemoteProtocol, OptionError> {
    let raw = options.require_string(field)?;
    raw.parse()
        .map_err(|reason: String| OptionError::invalid(field, raw.clone(), reason))
}

fn remote_option(options: &OptionMap) -> Result<String, OptionError> {
    Ok(options
        .string("remote")?
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| "origin".to_string()))
}
