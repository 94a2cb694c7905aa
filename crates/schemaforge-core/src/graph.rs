use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::types::TypeId;

/// Summary of dependency graph structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyGraphSummary {
    pub nodes: usize,
    pub edges: usize,
}

/// Report for type dependency ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyReport {
    pub summary: DependencyGraphSummary,
    /// Dependencies before dependents; `None` when the graph has a cycle.
    pub topo_order: Option<Vec<String>>,
    /// Nodes left unordered because they sit on or behind a cycle.
    pub cycle: Option<Vec<String>>,
}

/// Build a deterministic dependency report over named types.
///
/// Each entry pairs a type with the types it depends on. Built-in
/// dependencies are ignored; named dependencies outside the entry set are
/// still nodes of the graph.
pub fn build_dependency_report<'a, I>(entries: I) -> DependencyReport
where
    I: IntoIterator<Item = (&'a TypeId, &'a [TypeId])>,
{
    let graph = build_adjacency(entries);
    let nodes = graph.len();
    let edges = graph.values().map(|targets| targets.len()).sum();
    let summary = DependencyGraphSummary { nodes, edges };

    match toposort(&graph) {
        Ok(order) => DependencyReport {
            summary,
            topo_order: Some(order),
            cycle: None,
        },
        Err(cycle) => DependencyReport {
            summary,
            topo_order: None,
            cycle: Some(cycle),
        },
    }
}

fn build_adjacency<'a, I>(entries: I) -> BTreeMap<String, BTreeSet<String>>
where
    I: IntoIterator<Item = (&'a TypeId, &'a [TypeId])>,
{
    let mut graph: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for (type_id, dependencies) in entries {
        if !type_id.is_named() {
            continue;
        }
        let key = type_id.to_string();
        graph.entry(key.clone()).or_default();

        for dependency in dependencies.iter().filter(|dep| dep.is_named()) {
            graph
                .entry(dependency.to_string())
                .or_default()
                .insert(key.clone());
        }
    }

    graph
}

fn toposort(graph: &BTreeMap<String, BTreeSet<String>>) -> Result<Vec<String>, Vec<String>> {
    let mut indegree: BTreeMap<String, usize> = BTreeMap::new();

    for node in graph.keys() {
        indegree.entry(node.clone()).or_insert(0);
    }

    for targets in graph.values() {
        for target in targets {
            *indegree.entry(target.clone()).or_insert(0) += 1;
        }
    }

    let mut ready: BTreeSet<String> = indegree
        .iter()
        .filter_map(|(node, count)| (*count == 0).then(|| node.clone()))
        .collect();

    let mut order = Vec::with_capacity(graph.len());

    while let Some(node) = ready.pop_first() {
        if let Some(targets) = graph.get(&node) {
            for target in targets {
                if let Some(count) = indegree.get_mut(target) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        ready.insert(target.clone());
                    }
                }
            }
        }
        order.push(node);
    }

    if order.len() == graph.len() {
        Ok(order)
    } else {
        let cycle_nodes: Vec<String> = indegree
            .into_iter()
            .filter_map(|(node, count)| (count > 0).then_some(node))
            .collect();
        Err(cycle_nodes)
    }
}
