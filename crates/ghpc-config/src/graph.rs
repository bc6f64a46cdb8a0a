//! Group dependency graph using `petgraph`.
//!
//! Builds a directed graph of deployment groups from intergroup references
//! and resolves the order in which groups must be deployed.

use std::collections::BTreeMap;

use ghpc_common::error::{BlueprintError, Result};
use ghpc_common::types::{GroupName, ModuleId};
use petgraph::graph::NodeIndex;

use crate::blueprint::Blueprint;
use crate::igc::group_intergroup_references;

/// Dependencies between deployment groups.
#[derive(Debug)]
pub struct GroupGraph {
    /// Edge `a -> b` means `b` consumes outputs of `a`.
    graph: petgraph::Graph<GroupName, ()>,
    nodes: BTreeMap<GroupName, NodeIndex>,
}

impl GroupGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: petgraph::Graph::new(),
            nodes: BTreeMap::new(),
        }
    }

    /// Builds the graph of `bp`'s groups and their intergroup references.
    ///
    /// # Errors
    ///
    /// Returns an error if a reference targets an unknown module.
    pub fn from_blueprint(bp: &Blueprint) -> Result<Self> {
        let mut graph = Self::new();
        for group in &bp.groups {
            let _ = graph.add_group(group.name.clone());
        }
        for group in &bp.groups {
            for r in group_intergroup_references(bp, group) {
                let producer = bp.module_group(&r.module_id())?;
                graph.add_dependency(&group.name, &producer.name);
            }
        }
        Ok(graph)
    }

    /// Adds a group node, returning the existing node for known names.
    pub fn add_group(&mut self, name: GroupName) -> NodeIndex {
        if let Some(&idx) = self.nodes.get(&name) {
            return idx;
        }
        let idx = self.graph.add_node(name.clone());
        let _ = self.nodes.insert(name, idx);
        idx
    }

    /// Records that `dependent` consumes outputs of `dependency`.
    pub fn add_dependency(&mut self, dependent: &GroupName, dependency: &GroupName) {
        let from = self.add_group(dependency.clone());
        let to = self.add_group(dependent.clone());
        if self.graph.find_edge(from, to).is_none() {
            let _ = self.graph.add_edge(from, to, ());
        }
    }

    /// Groups that `name` consumes outputs from, sorted.
    #[must_use]
    pub fn dependencies(&self, name: &GroupName) -> Vec<GroupName> {
        let Some(&idx) = self.nodes.get(name) else {
            return Vec::new();
        };
        let mut deps: Vec<GroupName> = self
            .graph
            .neighbors_directed(idx, petgraph::Direction::Incoming)
            .filter_map(|n| self.graph.node_weight(n).cloned())
            .collect();
        deps.sort();
        deps
    }

    /// Returns a deployment order: producers before consumers.
    ///
    /// # Errors
    ///
    /// Returns an error if the groups depend on each other cyclically.
    pub fn deployment_order(&self) -> Result<Vec<GroupName>> {
        match petgraph::algo::toposort(&self.graph, None) {
            Ok(indices) => Ok(indices
                .iter()
                .filter_map(|&idx| self.graph.node_weight(idx).cloned())
                .collect()),
            Err(cycle) => {
                let name = self
                    .graph
                    .node_weight(cycle.node_id())
                    .map(ToString::to_string)
                    .unwrap_or_default();
                Err(BlueprintError::CyclicDependency {
                    from: name.clone(),
                    to: name,
                })
            }
        }
    }

    /// Checks that the declared group order is a valid deployment order.
    ///
    /// # Errors
    ///
    /// Returns [`BlueprintError::IntergroupOrder`] naming a producing module
    /// of the first group that is needed before it is declared.
    pub fn check_declared_order(&self, bp: &Blueprint) -> Result<()> {
        let position: BTreeMap<&GroupName, usize> =
            bp.groups.iter().enumerate().map(|(i, g)| (&g.name, i)).collect();
        for (i, group) in bp.groups.iter().enumerate() {
            for dep in self.dependencies(&group.name) {
                if position.get(&dep).is_some_and(|&p| p > i) {
                    let id = bp
                        .group(&dep)?
                        .modules
                        .first()
                        .map(|m| m.id.clone())
                        .unwrap_or_else(|| ModuleId::new(dep.as_str()));
                    return Err(BlueprintError::IntergroupOrder { id });
                }
            }
        }
        Ok(())
    }
}

impl Default for GroupGraph {
    fn default() -> Self {
        Self::new()
    }
}
