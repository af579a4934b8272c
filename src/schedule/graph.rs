//! Dependency graph with a deterministic topological sort

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap};

/// Directed graph over vertices `0..len`. An edge `from -> to` means
/// `from` must come before `to`.
#[derive(Debug, Clone)]
pub(crate) struct DependencyGraph {
    successors: Vec<BTreeSet<usize>>,
}

impl DependencyGraph {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            successors: vec![BTreeSet::new(); len],
        }
    }

    /// Add an ordering constraint; self-loops are ignored
    pub(crate) fn add_edge(&mut self, from: usize, to: usize) {
        if from != to {
            self.successors[from].insert(to);
        }
    }

    pub(crate) fn remove_edge(&mut self, from: usize, to: usize) {
        self.successors[from].remove(&to);
    }

    /// Kahn's algorithm. Among ready vertices the lowest index goes first,
    /// so unconstrained vertices keep their original relative order.
    ///
    /// On failure returns the vertices of one cycle, in edge order.
    pub(crate) fn sort(&self) -> Result<Vec<usize>, Vec<usize>> {
        let len = self.successors.len();
        let mut in_degree = vec![0usize; len];
        for successors in &self.successors {
            for &to in successors {
                in_degree[to] += 1;
            }
        }

        let mut ready: BinaryHeap<Reverse<usize>> = (0..len)
            .filter(|&v| in_degree[v] == 0)
            .map(Reverse)
            .collect();
        let mut order = Vec::with_capacity(len);

        while let Some(Reverse(vertex)) = ready.pop() {
            order.push(vertex);
            for &to in &self.successors[vertex] {
                in_degree[to] -= 1;
                if in_degree[to] == 0 {
                    ready.push(Reverse(to));
                }
            }
        }

        if order.len() == len {
            return Ok(order);
        }

        let remaining: BTreeSet<usize> = (0..len).filter(|&v| in_degree[v] > 0).collect();
        Err(self.find_cycle(&remaining))
    }

    /// Every vertex left after Kahn's algorithm has a predecessor that is
    /// also left, so walking predecessors must revisit a vertex.
    fn find_cycle(&self, remaining: &BTreeSet<usize>) -> Vec<usize> {
        let Some(&start) = remaining.iter().next() else {
            return Vec::new();
        };
        let mut path = vec![start];
        let mut current = start;
        loop {
            let previous = remaining
                .iter()
                .copied()
                .find(|&v| self.successors[v].contains(&current));
            let Some(previous) = previous else {
                return path;
            };
            if let Some(position) = path.iter().position(|&v| v == previous) {
                let mut cycle = path.split_off(position);
                cycle.reverse();
                return cycle;
            }
            path.push(previous);
            current = previous;
        }
    }
}
