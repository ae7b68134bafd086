//! Dependency-aware stage planning for operations
//!
//! [`plan_operation_stages`] layers operation nodes with Kahn's algorithm.
//! Each [`OperationStage`] holds nodes whose dependencies all live in earlier
//! stages, so members of one stage are mutually independent and may run
//! concurrently. Stages must run in order.

mod cycle;


use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::errors::ConfigError;
use crate::operations::Operation;

/// A vertex of the operation graph as configured
#[derive(Clone, Default)]
pub struct OperationNode {
    /// Step name. Defaults to the operation's own name when unset or blank.
    pub name: Option<String>,
    pub operation: Option<Arc<dyn Operation>>,
    pub dependencies: Vec<String>,
}

impl fmt::Debug for OperationNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationNode")
            .field("name", &self.resolved_name())
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

impl OperationNode {
    pub fn new(operation: Arc<dyn Operation>) -> Self {
        Self {
            name: None,
            operation: Some(operation),
            dependencies: Vec::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn after<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    /// The explicit name, or the operation's intrinsic name
    pub fn resolved_name(&self) -> Option<String> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .or_else(|| {
                self.operation
                    .as_ref()
                    .map(|op| op.name().trim().to_string())
            })
    }
}

/// A validated node placed in a stage
#[derive(Clone)]
pub struct ScheduledOperation {
    pub name: String,
    pub operation: Arc<dyn Operation>,
    pub dependencies: Vec<String>,
}

impl fmt::Debug for ScheduledOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledOperation")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

/// A layer of mutually independent operations
#[derive(Debug, Clone, Default)]
pub struct OperationStage {
    pub operations: Vec<ScheduledOperation>,
}

impl OperationStage {
    pub fn names(&self) -> Vec<&str> {
        self.operations.iter().map(|op| op.name.as_str()).collect()
    }
}

/// Order operation nodes into dependency-respecting stages.
///
/// Validation happens before any scheduling: every node needs an operation
/// and a non-empty name, names are unique, and dependencies must name other
/// defined nodes. A cycle yields [`ConfigError::Cycle`] and no stages.
///
/// Within a stage, nodes keep their input order.
pub fn plan_operation_stages(nodes: &[OperationNode]) -> Result<Vec<OperationStage>, ConfigError> {
    if nodes.is_empty() {
        return Ok(Vec::new());
    }

    let scheduled = validate_nodes(nodes)?;

    let index: HashMap<&str, usize> = scheduled
        .iter()
        .enumerate()
        .map(|(i, node)| (node.name.as_str(), i))
        .collect();

    let mut in_degree = vec![0usize; scheduled.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); scheduled.len()];
    for (i, node) in scheduled.iter().enumerate() {
        for dep in &node.dependencies {
            // validated above
            if let Some(&dep_index) = index.get(dep.as_str()) {
                in_degree[i] += 1;
                dependents[dep_index].push(i);
            }
        }
    }

    let mut wave: Vec<usize> = (0..scheduled.len())
        .filter(|&i| in_degree[i] == 0)
        .collect();
    let mut waves = Vec::new();
    let mut processed = 0;

    while !wave.is_empty() {
        processed += wave.len();
        let mut next = Vec::new();
        for &i in &wave {
            for &dependent in &dependents[i] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    next.push(dependent);
                }
            }
        }
        next.sort_unstable();
        waves.push(std::mem::replace(&mut wave, next));
    }

    if processed < scheduled.len() {
        let remaining: Vec<String> = (0..scheduled.len())
            .filter(|&i| in_degree[i] > 0)
            .map(|i| scheduled[i].name.clone())
            .collect();
        let dependencies: HashMap<String, Vec<String>> = scheduled
            .iter()
            .map(|node| (node.name.clone(), node.dependencies.clone()))
            .collect();
        return Err(ConfigError::Cycle {
            path: cycle::find_cycle(&remaining, &dependencies),
        });
    }

    Ok(waves
        .into_iter()
        .map(|wave| OperationStage {
            operations: wave.into_iter().map(|i| scheduled[i].clone()).collect(),
        })
        .collect())
}

fn validate_nodes(nodes: &[OperationNode]) -> Result<Vec<ScheduledOperation>, ConfigError> {
    let mut scheduled = Vec::with_capacity(nodes.len());
    let mut seen = HashSet::new();

    for (index, node) in nodes.iter().enumerate() {
        let Some(operation) = node.operation.clone() else {
            return Err(ConfigError::MissingOperation {
                index,
                name: node.name.clone().unwrap_or_else(|| "<unnamed>".to_string()),
            });
        };

        let name = node.resolved_name().unwrap_or_default();
        if name.is_empty() {
            return Err(ConfigError::EmptyName { index });
        }
        if !seen.insert(name.clone()) {
            return Err(ConfigError::DuplicateName(name));
        }

        let mut dependencies: Vec<String> = Vec::new();
        for dep in &node.dependencies {
            let dep = dep.trim();
            if dep == name {
                return Err(ConfigError::SelfDependency(name));
            }
            if !dependencies.iter().any(|d| d == dep) {
                dependencies.push(dep.to_string());
            }
        }

        scheduled.push(ScheduledOperation {
            name,
            operation,
            dependencies,
        });
    }

    for node in &scheduled {
        for dep in &node.dependencies {
            if !seen.contains(dep) {
                return Err(ConfigError::UnknownDependency {
                    node: node.name.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }

    Ok(scheduled)
}
