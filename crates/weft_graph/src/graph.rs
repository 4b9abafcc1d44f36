//! Topology graph: resource specs plus the dependency edges between them.
//!
//! Validation and ordering happen before any resource is touched, so a
//! cyclic or dangling configuration never provisions anything.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::debug;

use crate::error::{GraphError, GraphResult};
use crate::node::ResourceSpec;

/// A directed graph of resource specs, keyed by logical name.
///
/// Edges mean "target must exist, with valid outputs, before source is
/// created". Built once per deployment and traversed; never mutated by
/// provisioning.
#[derive(Debug, Clone, Default)]
pub struct TopologyGraph {
    resources: BTreeMap<String, ResourceSpec>,
}

impl TopologyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource spec. Logical names must be unique.
    pub fn add(&mut self, spec: ResourceSpec) -> GraphResult<()> {
        if self.resources.contains_key(&spec.name) {
            return Err(GraphError::DuplicateResource(spec.name));
        }
        debug!(resource = %spec.name, kind = %spec.kind, "added resource to graph");
        self.resources.insert(spec.name.clone(), spec);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ResourceSpec> {
        self.resources.get(name)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceSpec> {
        self.resources.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    /// Check that every dependency names a known resource and that the
    /// edge set is acyclic.
    pub fn validate(&self) -> GraphResult<()> {
        for spec in self.resources.values() {
            for dep in spec.dependencies() {
                if !self.resources.contains_key(dep) {
                    return Err(GraphError::UnknownDependency {
                        resource: spec.name.clone(),
                        dependency: dep.to_string(),
                    });
                }
            }
        }
        self.build_order().map(|_| ())
    }

    /// Compute the dependency-ordered build waves (Kahn's algorithm).
    ///
    /// Resources within a wave have no unsatisfied dependencies on each
    /// other and may be created concurrently. A non-empty remainder after
    /// the algorithm exhausts zero-degree nodes is a cycle.
    pub fn build_order(&self) -> GraphResult<Vec<Vec<String>>> {
        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

        for spec in self.resources.values() {
            let deps = spec.dependencies();
            in_degree.insert(&spec.name, deps.len());
            for dep in deps {
                dependents.entry(dep).or_default().push(&spec.name);
            }
        }

        let mut waves: Vec<Vec<String>> = Vec::new();
        let mut ready: BTreeSet<&str> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(n, _)| *n)
            .collect();
        let mut placed = 0usize;

        while !ready.is_empty() {
            let wave: Vec<&str> = ready.iter().copied().collect();
            ready.clear();

            for name in &wave {
                placed += 1;
                for dependent in dependents.get(name).into_iter().flatten() {
                    let degree = in_degree
                        .get_mut(dependent)
                        .ok_or_else(|| GraphError::UnknownDependency {
                            resource: dependent.to_string(),
                            dependency: name.to_string(),
                        })?;
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(*dependent);
                    }
                }
            }

            waves.push(wave.into_iter().map(str::to_string).collect());
        }

        if placed != self.resources.len() {
            let mut cycle: Vec<String> = in_degree
                .into_iter()
                .filter(|(_, d)| *d > 0)
                .map(|(n, _)| n.to_string())
                .collect();
            cycle.sort();
            return Err(GraphError::DependencyCycle(cycle));
        }

        Ok(waves)
    }
}
