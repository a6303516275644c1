//! Dependency graph for formula ordering
//!
//! An edge `(u, v)` means "u must be computed before v", so `v` depends on
//! `u`. Adjacency indices are built once and never mutated, which lets
//! [`Graph::transpose`] share them with the original.

use crate::error::{FormulaError, FormulaResult};
use ahash::AHashMap;
use std::collections::VecDeque;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

/// Immutable directed graph over vertices of type `T`
#[derive(Debug, Clone)]
pub struct Graph<T> {
    vertices: Arc<[T]>,
    index: Arc<AHashMap<T, usize>>,
    edges: Arc<[(usize, usize)]>,
    /// Predecessors of each vertex
    adjacents_in: Arc<[Vec<usize>]>,
    /// Dependents of each vertex
    adjacents_out: Arc<[Vec<usize>]>,
    reversed: bool,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    Unvisited,
    InProgress,
    Done,
}

impl<T> Graph<T>
where
    T: Clone + Eq + Hash + Debug,
{
    /// Build a graph, failing if a vertex repeats or an edge endpoint is
    /// not a vertex
    pub fn new<V, E>(vertices: V, edges: E) -> FormulaResult<Self>
    where
        V: IntoIterator<Item = T>,
        E: IntoIterator<Item = (T, T)>,
    {
        let vertices: Vec<T> = vertices.into_iter().collect();
        let mut index = AHashMap::with_capacity(vertices.len());
        for (i, v) in vertices.iter().enumerate() {
            if index.insert(v.clone(), i).is_some() {
                return Err(FormulaError::DuplicateVertex(format!("{:?}", v)));
            }
        }

        let lookup = |v: &T| {
            index
                .get(v)
                .copied()
                .ok_or_else(|| FormulaError::UnknownVertex(format!("{:?}", v)))
        };

        let mut edge_list = Vec::new();
        let mut adjacents_in = vec![Vec::new(); vertices.len()];
        let mut adjacents_out = vec![Vec::new(); vertices.len()];
        for (from, to) in edges {
            let (u, v) = (lookup(&from)?, lookup(&to)?);
            edge_list.push((u, v));
            adjacents_out[u].push(v);
            adjacents_in[v].push(u);
        }

        Ok(Self {
            vertices: vertices.into(),
            index: Arc::new(index),
            edges: edge_list.into(),
            adjacents_in: adjacents_in.into(),
            adjacents_out: adjacents_out.into(),
            reversed: false,
        })
    }

    /// Number of vertices
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Vertices in insertion order
    pub fn vertices(&self) -> &[T] {
        &self.vertices
    }

    /// Position of a vertex in insertion order
    pub fn index_of(&self, vertex: &T) -> Option<usize> {
        self.index.get(vertex).copied()
    }

    /// Edges as `(before, after)` pairs
    pub fn edges(&self) -> impl Iterator<Item = (&T, &T)> + '_ {
        self.edges.iter().map(move |&(u, v)| {
            let (u, v) = if self.reversed { (v, u) } else { (u, v) };
            (&self.vertices[u], &self.vertices[v])
        })
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Indices of the vertices that must run before `vertex`
    pub fn predecessors(&self, vertex: usize) -> &[usize] {
        &self.adjacents_in[vertex]
    }

    /// Indices of the vertices that depend on `vertex`
    pub fn dependents(&self, vertex: usize) -> &[usize] {
        &self.adjacents_out[vertex]
    }

    /// Predecessors of a vertex, empty if it is unknown
    pub fn adjacents_in(&self, vertex: &T) -> Vec<&T> {
        self.resolve_adjacent(vertex, &self.adjacents_in)
    }

    /// Dependents of a vertex, empty if it is unknown
    pub fn adjacents_out(&self, vertex: &T) -> Vec<&T> {
        self.resolve_adjacent(vertex, &self.adjacents_out)
    }

    fn resolve_adjacent<'a>(&'a self, vertex: &T, table: &'a [Vec<usize>]) -> Vec<&'a T> {
        self.index_of(vertex)
            .map(|i| table[i].iter().map(|&j| &self.vertices[j]).collect())
            .unwrap_or_default()
    }

    /// Whether the graph contains a directed cycle
    ///
    /// Iterative three-color DFS, restarted from every unvisited vertex so
    /// disconnected components are covered too.
    pub fn is_cyclical(&self) -> bool {
        let mut color = vec![Color::Unvisited; self.len()];
        // (vertex, next dependent to visit)
        let mut stack: Vec<(usize, usize)> = Vec::new();

        for root in 0..self.len() {
            if color[root] != Color::Unvisited {
                continue;
            }
            color[root] = Color::InProgress;
            stack.push((root, 0));

            while let Some(top) = stack.last_mut() {
                let (vertex, next) = *top;
                match self.adjacents_out[vertex].get(next) {
                    Some(&child) => {
                        top.1 += 1;
                        match color[child] {
                            Color::InProgress => return true,
                            Color::Unvisited => {
                                color[child] = Color::InProgress;
                                stack.push((child, 0));
                            }
                            Color::Done => {}
                        }
                    }
                    None => {
                        color[vertex] = Color::Done;
                        stack.pop();
                    }
                }
            }
        }

        false
    }

    /// Vertex indices in topological order (Kahn's algorithm)
    ///
    /// On a cyclic graph the result is shorter than [`Graph::len`]; callers
    /// must check.
    pub fn topological_indices(&self) -> Vec<usize> {
        let mut in_degree: Vec<usize> = self.adjacents_in.iter().map(Vec::len).collect();
        let mut queue: VecDeque<usize> = (0..self.len()).filter(|&v| in_degree[v] == 0).collect();
        let mut order = Vec::with_capacity(self.len());

        while let Some(vertex) = queue.pop_front() {
            order.push(vertex);
            for &dependent in &self.adjacents_out[vertex] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    queue.push_back(dependent);
                }
            }
        }

        order
    }

    /// Vertices in topological order; see [`Graph::topological_indices`]
    pub fn topological_sort(&self) -> Vec<T> {
        self.topological_indices()
            .into_iter()
            .map(|i| self.vertices[i].clone())
            .collect()
    }

    /// Stage assignment by longest-path layering, as vertex indices.
    ///
    /// Stage 0 holds the vertices with no predecessors; every other vertex
    /// sits one stage after its latest predecessor. Within a stage vertices
    /// keep insertion order.
    pub fn stage_indices(&self) -> FormulaResult<Vec<Vec<usize>>> {
        let order = self.topological_indices();
        if order.len() != self.len() {
            return Err(FormulaError::Cycle);
        }

        let mut stage = vec![0usize; self.len()];
        for &vertex in &order {
            stage[vertex] = self.adjacents_in[vertex]
                .iter()
                .map(|&p| stage[p] + 1)
                .max()
                .unwrap_or(0);
        }

        let depth = stage.iter().max().map_or(0, |&s| s + 1);
        let mut stages = vec![Vec::new(); depth];
        for (vertex, &s) in stage.iter().enumerate() {
            stages[s].push(vertex);
        }

        Ok(stages)
    }

    /// Fewest stages such that every edge points to a strictly later stage
    ///
    /// Fails with [`FormulaError::Cycle`] on a cyclic graph.
    pub fn minimal_partial_order(&self) -> FormulaResult<Vec<Vec<T>>> {
        Ok(self
            .stage_indices()?
            .into_iter()
            .map(|stage| stage.into_iter().map(|i| self.vertices[i].clone()).collect())
            .collect())
    }

    /// Graph with every edge reversed, sharing this graph's indices
    pub fn transpose(&self) -> Self {
        Self {
            vertices: Arc::clone(&self.vertices),
            index: Arc::clone(&self.index),
            edges: Arc::clone(&self.edges),
            adjacents_in: Arc::clone(&self.adjacents_out),
            adjacents_out: Arc::clone(&self.adjacents_in),
            reversed: !self.reversed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn diamond() -> Graph<&'static str> {
        Graph::new(
            ["A", "B", "C", "D"],
            [("A", "B"), ("A", "C"), ("B", "D"), ("C", "D")],
        )
        .unwrap()
    }

    #[test]
    fn test_circular_reference() {
        let cyclic = Graph::new(["A", "B", "C"], [("A", "B"), ("B", "C"), ("C", "A")]).unwrap();
        assert!(cyclic.is_cyclical());

        let acyclic = Graph::new(["A", "B", "C"], [("A", "B"), ("B", "C")]).unwrap();
        assert!(!acyclic.is_cyclical());
    }

    #[test]
    fn test_cycle_in_disconnected_component() {
        let graph = Graph::new(
            ["A", "B", "X", "Y"],
            [("A", "B"), ("X", "Y"), ("Y", "X")],
        )
        .unwrap();
        assert!(graph.is_cyclical());
    }

    #[test]
    fn test_self_loop_is_cycle() {
        let graph = Graph::new(["A"], [("A", "A")]).unwrap();
        assert!(graph.is_cyclical());
    }

    #[test]
    fn test_shared_descendant_is_not_cycle() {
        assert!(!diamond().is_cyclical());
    }

    #[test]
    fn test_topological_sort() {
        assert_eq!(diamond().topological_sort(), vec!["A", "B", "C", "D"]);

        let cyclic = Graph::new(["A", "B", "C"], [("B", "C"), ("C", "B")]).unwrap();
        assert_eq!(cyclic.topological_sort(), vec!["A"]);
    }

    #[test]
    fn test_minimal_partial_order() {
        assert_eq!(
            diamond().minimal_partial_order().unwrap(),
            vec![vec!["A"], vec!["B", "C"], vec!["D"]]
        );
    }

    #[test]
    fn test_partial_order_uses_longest_path() {
        // C depends on A directly and through B
        let graph = Graph::new(["A", "B", "C"], [("A", "C"), ("A", "B"), ("B", "C")]).unwrap();
        assert_eq!(
            graph.minimal_partial_order().unwrap(),
            vec![vec!["A"], vec!["B"], vec!["C"]]
        );
    }

    #[test]
    fn test_partial_order_rejects_cycle() {
        let graph = Graph::new(["A", "B"], [("A", "B"), ("B", "A")]).unwrap();
        assert_eq!(graph.minimal_partial_order(), Err(FormulaError::Cycle));
    }

    #[test]
    fn test_empty_graph() {
        let graph: Graph<u32> = Graph::new([], []).unwrap();
        assert!(graph.is_empty());
        assert!(!graph.is_cyclical());
        assert_eq!(graph.minimal_partial_order().unwrap(), Vec::<Vec<u32>>::new());
    }

    #[test]
    fn test_construction_errors() {
        assert!(matches!(
            Graph::new(["A"], [("A", "B")]),
            Err(FormulaError::UnknownVertex(_))
        ));
        assert!(matches!(
            Graph::new(["A", "A"], []),
            Err(FormulaError::DuplicateVertex(_))
        ));
    }

    #[test]
    fn test_transpose() {
        let graph = diamond();
        let reversed = graph.transpose();

        assert_eq!(graph.adjacents_out(&"A"), vec![&"B", &"C"]);
        assert_eq!(reversed.adjacents_in(&"A"), vec![&"B", &"C"]);
        assert_eq!(reversed.adjacents_out(&"D"), vec![&"B", &"C"]);
        assert_eq!(
            reversed.edges().collect::<Vec<_>>(),
            vec![(&"B", &"A"), (&"C", &"A"), (&"D", &"B"), (&"D", &"C")]
        );
        assert_eq!(
            reversed.minimal_partial_order().unwrap(),
            vec![vec!["D"], vec!["B", "C"], vec!["A"]]
        );
        assert_eq!(reversed.transpose().edges().count(), graph.edge_count());
    }
}
