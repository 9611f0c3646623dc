//! Input/output graph between stacks
//!
//! Stacks run in declaration order; values only flow through the output
//! pool. This graph never reorders anything. It exists to point out
//! documents whose order cannot work in a single run.
//! Uses petgraph for graph operations.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;

use super::stack::Stack;

/// Something about the document order worth telling the author
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GraphWarning {
    /// No stack in the document publishes this input
    UnresolvedInput { stack: String, input: String },

    /// The producer is declared after the consumer
    ForwardReference {
        stack: String,
        input: String,
        producer: String,
    },

    /// These stacks feed each other
    Cycle { stacks: Vec<String> },

    /// More than one stack publishes the same output; the last one fetched wins
    DuplicateOutput { output: String, stacks: Vec<String> },
}

impl fmt::Display for GraphWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphWarning::UnresolvedInput { stack, input } => write!(
                f,
                "{}: input '{}' is not an output of any stack in this document",
                stack, input
            ),
            GraphWarning::ForwardReference { stack, input, producer } => write!(
                f,
                "{}: input '{}' comes from {}, which is declared later; outputs are collected before any stack is applied, so {} must already exist from a previous run",
                stack, input, producer, producer
            ),
            GraphWarning::Cycle { stacks } => {
                write!(f, "stacks depend on each other: {}", stacks.join(" -> "))
            }
            GraphWarning::DuplicateOutput { output, stacks } => write!(
                f,
                "output '{}' is declared by {}; the last one fetched wins",
                output,
                stacks.join(", ")
            ),
        }
    }
}

/// Producer -> consumer graph, nodes in declaration order
#[derive(Debug, Default)]
pub struct StackGraph {
    /// Edge weight is the output name carried along the edge
    graph: DiGraph<String, String>,

    /// Output name -> producing nodes, in declaration order
    producers: BTreeMap<String, Vec<NodeIndex>>,

    /// (stack, input) pairs with no producer
    unresolved: Vec<(String, String)>,
}

impl StackGraph {
    /// Builds the graph for a list of stacks in declaration order
    pub fn from_stacks(stacks: &[Stack]) -> Self {
        let mut graph = DiGraph::new();

        // First pass: one node per stack, index == declaration position
        let nodes: Vec<NodeIndex> = stacks
            .iter()
            .map(|s| graph.add_node(s.name.clone()))
            .collect();

        let mut producers: BTreeMap<String, Vec<NodeIndex>> = BTreeMap::new();
        for (stack, node) in stacks.iter().zip(&nodes) {
            for output in &stack.outputs {
                let entry = producers.entry(output.clone()).or_default();
                if !entry.contains(node) {
                    entry.push(*node);
                }
            }
        }

        // Second pass: edges from every producer to each consumer
        let mut unresolved = Vec::new();
        for (stack, node) in stacks.iter().zip(&nodes) {
            for input in &stack.inputs {
                match producers.get(input) {
                    Some(from) => {
                        for producer in from {
                            // Reading your own output from a previous run is fine
                            if producer != node {
                                graph.add_edge(*producer, *node, input.clone());
                            }
                        }
                    }
                    None => unresolved.push((stack.name.clone(), input.clone())),
                }
            }
        }

        Self {
            graph,
            producers,
            unresolved,
        }
    }

    /// Returns the number of stacks in the graph
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns true if the graph is empty
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Stacks whose outputs `stack` consumes
    pub fn producers_of(&self, stack: &str) -> Vec<String> {
        let Some(idx) = self.index_of(stack) else {
            return vec![];
        };

        let mut names: Vec<String> = self
            .graph
            .neighbors_directed(idx, petgraph::Direction::Incoming)
            .filter_map(|n| self.graph.node_weight(n).cloned())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Stacks that consume outputs of `stack`
    pub fn consumers_of(&self, stack: &str) -> Vec<String> {
        let Some(idx) = self.index_of(stack) else {
            return vec![];
        };

        let mut names: Vec<String> = self
            .graph
            .neighbors_directed(idx, petgraph::Direction::Outgoing)
            .filter_map(|n| self.graph.node_weight(n).cloned())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// An order in which every producer precedes its consumers, if one exists
    pub fn suggested_order(&self) -> Option<Vec<String>> {
        toposort(&self.graph, None).ok().map(|order| {
            order
                .into_iter()
                .filter_map(|idx| self.graph.node_weight(idx).cloned())
                .collect()
        })
    }

    /// All ordering problems, in a stable order
    pub fn warnings(&self) -> Vec<GraphWarning> {
        let mut warnings = Vec::new();

        for (output, nodes) in &self.producers {
            if nodes.len() > 1 {
                warnings.push(GraphWarning::DuplicateOutput {
                    output: output.clone(),
                    stacks: self.names(nodes),
                });
            }
        }

        for (stack, input) in &self.unresolved {
            warnings.push(GraphWarning::UnresolvedInput {
                stack: stack.clone(),
                input: input.clone(),
            });
        }

        // Node indices follow declaration order
        let mut seen = HashSet::new();
        for edge in self.graph.edge_indices() {
            let Some((from, to)) = self.graph.edge_endpoints(edge) else {
                continue;
            };
            if from.index() > to.index() {
                let input = self.graph[edge].clone();
                let key = (to, input.clone(), from);
                if seen.insert(key) {
                    warnings.push(GraphWarning::ForwardReference {
                        stack: self.graph[to].clone(),
                        input,
                        producer: self.graph[from].clone(),
                    });
                }
            }
        }

        let mut cycles: Vec<Vec<NodeIndex>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| component.len() > 1)
            .collect();
        for component in &mut cycles {
            component.sort();
        }
        cycles.sort();
        for component in cycles {
            warnings.push(GraphWarning::Cycle {
                stacks: self.names(&component),
            });
        }

        warnings
    }

    /// Outputs declared by more than one stack
    pub fn duplicate_outputs(&self) -> Vec<(String, Vec<String>)> {
        self.producers
            .iter()
            .filter(|(_, nodes)| nodes.len() > 1)
            .map(|(output, nodes)| (output.clone(), self.names(nodes)))
            .collect()
    }

    fn index_of(&self, stack: &str) -> Option<NodeIndex> {
        self.graph
            .node_indices()
            .find(|idx| self.graph[*idx] == stack)
    }

    fn names(&self, nodes: &[NodeIndex]) -> Vec<String> {
        nodes
            .iter()
            .filter_map(|idx| self.graph.node_weight(*idx).cloned())
            .collect()
    }
}
