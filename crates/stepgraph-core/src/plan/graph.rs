//! The step graph: an arena of steps indexed by input position.
//!
//! Edges are stored on each [`Step`] as the set of sequences it depends on.
//! Cycle detection turns a [`StepGraph`] into an [`AcyclicGraph`], and only
//! the latter can be ordered.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use tracing::debug;

use super::error::{PlanError, ValidationError};
use super::types::Step;

/// Validated steps whose dependency relation has not yet been checked.
///
/// Arena invariant: `steps[i].sequence == i + 1` and every dependency is a
/// sequence in `1..=steps.len()`. [`StepGraph::new`] enforces it.
#[derive(Debug, Clone)]
pub struct StepGraph {
    steps: Vec<Step>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

impl StepGraph {
    /// Build a graph from steps in input order.
    ///
    /// Rejects steps whose `sequence` is not their 1-based position and
    /// dependencies that name no step in the graph.
    pub fn new(steps: Vec<Step>) -> Result<Self, ValidationError> {
        let len = steps.len();
        for (i, step) in steps.iter().enumerate() {
            if step.sequence != i + 1 {
                return Err(ValidationError::InvalidField {
                    record: i + 1,
                    field: "sequence",
                    reason: format!("is {} but the step is at position {}", step.sequence, i + 1),
                });
            }
            if let Some(dep) = step.depends_on.iter().find(|d| !(1..=len).contains(*d)) {
                return Err(ValidationError::UnknownDependency {
                    step: step.declared_number,
                    id: step.id.clone(),
                    reference: dep.to_string(),
                });
            }
        }
        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Find one edge that closes a cycle, as `(step index, dependency index)`.
    ///
    /// Iterative three-color depth-first search. Roots are tried in input
    /// order and edges in ascending order, so the reported edge is stable.
    pub fn find_cycle_edge(&self) -> Option<(usize, usize)> {
        let deps: Vec<Vec<usize>> = self
            .steps
            .iter()
            .map(|s| s.depends_on.iter().map(|d| d - 1).collect())
            .collect();
        let mut marks = vec![Mark::Unvisited; deps.len()];

        for root in 0..deps.len() {
            if marks[root] != Mark::Unvisited {
                continue;
            }
            marks[root] = Mark::InProgress;
            let mut stack = vec![(root, 0usize)];

            while let Some(frame) = stack.last_mut() {
                let (node, next) = *frame;
                match deps[node].get(next) {
                    Some(&dep) => {
                        frame.1 += 1;
                        match marks[dep] {
                            Mark::InProgress => return Some((node, dep)),
                            Mark::Unvisited => {
                                marks[dep] = Mark::InProgress;
                                stack.push((dep, 0));
                            }
                            Mark::Done => {}
                        }
                    }
                    None => {
                        marks[node] = Mark::Done;
                        stack.pop();
                    }
                }
            }
        }

        None
    }

    /// Confirm the graph is acyclic, or report an edge on a cycle.
    pub fn check_acyclic(self) -> Result<AcyclicGraph, PlanError> {
        if let Some((step, dep)) = self.find_cycle_edge() {
            return Err(PlanError::Cycle {
                step: self.steps[step].id.clone(),
                dependency: self.steps[dep].id.clone(),
            });
        }
        debug!(steps = self.steps.len(), "dependency graph is acyclic");
        Ok(AcyclicGraph { steps: self.steps })
    }
}

/// A step graph known to contain no cycles.
#[derive(Debug, Clone)]
pub struct AcyclicGraph {
    steps: Vec<Step>,
}

impl AcyclicGraph {
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Arena indices in dependency order.
    ///
    /// Kahn's algorithm with a min-heap of ready steps: whenever several steps
    /// are ready, the one that came first in the input goes next.
    pub fn topological_order(&self) -> Vec<usize> {
        let n = self.steps.len();
        let mut remaining: Vec<usize> = self.steps.iter().map(|s| s.depends_on.len()).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (i, step) in self.steps.iter().enumerate() {
            for dep in &step.depends_on {
                dependents[dep - 1].push(i);
            }
        }

        let mut ready: BinaryHeap<Reverse<usize>> = remaining
            .iter()
            .enumerate()
            .filter(|(_, count)| **count == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut order = Vec::with_capacity(n);
        while let Some(Reverse(i)) = ready.pop() {
            order.push(i);
            for &j in &dependents[i] {
                remaining[j] -= 1;
                if remaining[j] == 0 {
                    ready.push(Reverse(j));
                }
            }
        }

        debug_assert_eq!(order.len(), n, "acyclic graph must order every step");
        order
    }

    /// Consume the graph, returning its steps in dependency order.
    pub fn into_ordered_steps(self) -> Vec<Step> {
        let order = self.topological_order();
        let mut slots: Vec<Option<Step>> = self.steps.into_iter().map(Some).collect();
        order
            .into_iter()
            .filter_map(|i| slots[i].take())
            .collect()
    }
}
