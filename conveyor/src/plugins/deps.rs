//! Dependency-respecting load ordering.

use super::discovery::PluginCandidate;
use crate::errors::DependencyCycleError;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

/// Orders candidates so every plugin sorts after all plugins it depends on.
///
/// Kahn's algorithm over the declared-dependency graph restricted to the
/// candidate set being loaded together: edges to plugins outside the batch
/// (already loaded, or missing and left for validation to report) do not
/// constrain the order. Ties break alphabetically so the order is
/// deterministic.
///
/// # Errors
///
/// `DependencyCycleError` naming the unresolvable plugins when the batch
/// contains a cycle; the whole batch must then be abandoned.
pub fn sort_by_dependencies(
    candidates: Vec<PluginCandidate>,
) -> Result<Vec<PluginCandidate>, DependencyCycleError> {
    let names: HashSet<String> = candidates.iter().map(|c| c.name().to_string()).collect();

    // In-degree per candidate, counting only edges inside the batch.
    let mut in_degree: BTreeMap<String, usize> = BTreeMap::new();
    let mut dependents: HashMap<String, Vec<String>> = HashMap::new();

    for candidate in &candidates {
        let name = candidate.name().to_string();
        let batch_deps: Vec<&String> = candidate
            .manifest
            .dependencies
            .iter()
            .filter(|dep| names.contains(*dep))
            .collect();

        in_degree.insert(name.clone(), batch_deps.len());
        for dep in batch_deps {
            dependents.entry(dep.clone()).or_default().push(name.clone());
        }
    }

    let mut queue: VecDeque<String> = in_degree
        .iter()
        .filter(|(_, &degree)| degree == 0)
        .map(|(name, _)| name.clone())
        .collect();

    let mut order = Vec::with_capacity(candidates.len());
    while let Some(name) = queue.pop_front() {
        order.push(name.clone());

        if let Some(children) = dependents.get(&name) {
            let mut ready: Vec<String> = Vec::new();
            for child in children {
                if let Some(degree) = in_degree.get_mut(child) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(child.clone());
                    }
                }
            }
            ready.sort();
            queue.extend(ready);
        }
    }

    if order.len() != candidates.len() {
        let mut leftover: Vec<String> = in_degree
            .into_iter()
            .filter(|(name, _)| !order.contains(name))
            .map(|(name, _)| name)
            .collect();
        leftover.sort();
        return Err(DependencyCycleError::new(leftover));
    }

    let mut by_name: HashMap<String, PluginCandidate> = candidates
        .into_iter()
        .map(|c| (c.name().to_string(), c))
        .collect();
    Ok(order.into_iter().filter_map(|name| by_name.remove(&name)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::discovery::PluginSourceKind;
    use crate::plugins::manifest::PluginManifest;
    use std::path::PathBuf;

    fn candidate(name: &str, dependencies: Vec<&str>) -> PluginCandidate {
        PluginCandidate {
            manifest: PluginManifest {
                name: name.to_string(),
                version: "1.0.0".to_string(),
                description: "test".to_string(),
                author: "test".to_string(),
                dependencies: dependencies.into_iter().map(String::from).collect(),
                entry_points: std::collections::HashMap::new(),
                permissions: Vec::new(),
            },
            kind: PluginSourceKind::Directory,
            source_path: PathBuf::from("."),
        }
    }

    fn position(order: &[PluginCandidate], name: &str) -> usize {
        order.iter().position(|c| c.name() == name).unwrap()
    }

    #[test]
    fn test_dependencies_sort_before_dependents() {
        let order = sort_by_dependencies(vec![
            candidate("c", vec!["a", "b"]),
            candidate("b", vec!["a"]),
            candidate("a", vec![]),
        ])
        .unwrap();

        assert!(position(&order, "a") < position(&order, "b"));
        assert!(position(&order, "b") < position(&order, "c"));
    }

    #[test]
    fn test_independent_plugins_sort_alphabetically() {
        let order =
            sort_by_dependencies(vec![candidate("zeta", vec![]), candidate("alpha", vec![])])
                .unwrap();

        let names: Vec<&str> = order.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_dependency_outside_batch_does_not_constrain() {
        // "already_loaded" is not in the batch; validation owns that check.
        let order =
            sort_by_dependencies(vec![candidate("solo", vec!["already_loaded"])]).unwrap();
        assert_eq!(order.len(), 1);
    }

    #[test]
    fn test_cycle_is_fatal_and_names_members() {
        let err = sort_by_dependencies(vec![
            candidate("a", vec!["b"]),
            candidate("b", vec!["a"]),
            candidate("standalone", vec![]),
        ])
        .unwrap_err();

        assert_eq!(err.members, vec!["a", "b"]);
    }
}
