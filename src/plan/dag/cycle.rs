//! Cycle reporting for nodes Kahn's algorithm could not schedule

use std::collections::{HashMap, HashSet};

/// Find one dependency cycle among `remaining` nodes using DFS.
///
/// `dependencies` maps each node name to the names it depends on. Returns
/// the cycle as a closed path (`a -> b -> a`), or the sorted remaining names
/// if no cycle path could be reconstructed.
pub fn find_cycle(remaining: &[String], dependencies: &HashMap<String, Vec<String>>) -> Vec<String> {
    let candidates: HashSet<&str> = remaining.iter().map(String::as_str).collect();
    let mut visited = HashSet::new();
    let mut rec_stack = HashSet::new();
    let mut path = Vec::new();

    for node in remaining {
        if !visited.contains(node.as_str()) {
            if let Some(cycle) = dfs(
                node,
                dependencies,
                &candidates,
                &mut visited,
                &mut rec_stack,
                &mut path,
            ) {
                return cycle;
            }
        }
    }

    let mut names = remaining.to_vec();
    names.sort();
    names
}

fn dfs<'a>(
    node: &'a str,
    dependencies: &'a HashMap<String, Vec<String>>,
    candidates: &HashSet<&str>,
    visited: &mut HashSet<&'a str>,
    rec_stack: &mut HashSet<&'a str>,
    path: &mut Vec<&'a str>,
) -> Option<Vec<String>> {
    visited.insert(node);
    rec_stack.insert(node);
    path.push(node);

    for dep in dependencies.get(node).into_iter().flatten() {
        let dep = dep.as_str();
        if !candidates.contains(dep) {
            continue;
        }
        if !visited.contains(dep) {
            if let Some(cycle) = dfs(dep, dependencies, candidates, visited, rec_stack, path) {
                return Some(cycle);
            }
        } else if rec_stack.contains(dep) {
            let start = path.iter().position(|p| *p == dep).unwrap_or(0);
            let mut cycle: Vec<String> = path[start..].iter().map(|p| p.to_string()).collect();
            cycle.push(dep.to_string());
            return Some(cycle);
        }
    }

    path.pop();
    rec_stack.remove(node);
    None
}
