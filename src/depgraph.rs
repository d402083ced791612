//! A generic dependency graph.
//!
//! Tracks opaque entities and `from` → `to` dependency edges, and yields
//! either a topological order (dependencies first) or a cycle witness: the
//! `(from, to)` pair whose edge closes the cycle. Used for import cycles
//! and for entity dependencies inside semantic analysis.

use std::collections::HashMap;
use std::hash::Hash;

pub struct DependencyGraph<K> {
    keys: Vec<K>,
    index: HashMap<K, usize>,
    /// `deps[i]` lists the entities `keys[i]` depends on.
    deps: Vec<Vec<usize>>,
}

/// Result of ordering: the order itself, or the back edge of a cycle.
pub type OrderResult<K> = Result<Vec<K>, (K, K)>;

impl<K: Copy + Eq + Hash> DependencyGraph<K> {
    pub fn new() -> Self {
        DependencyGraph {
            keys: Vec::new(),
            index: HashMap::new(),
            deps: Vec::new(),
        }
    }

    pub fn ensure_tracked(&mut self, entity: K) -> usize {
        if let Some(&i) = self.index.get(&entity) {
            return i;
        }
        let i = self.keys.len();
        self.keys.push(entity);
        self.index.insert(entity, i);
        self.deps.push(Vec::new());
        i
    }

    pub fn add_dependency(&mut self, from: K, to: K) {
        let from = self.ensure_tracked(from);
        let to = self.ensure_tracked(to);
        if !self.deps[from].contains(&to) {
            self.deps[from].push(to);
        }
    }

    pub fn contains(&self, entity: K) -> bool {
        self.index.contains_key(&entity)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Kahn's algorithm over the tracked entities; insertion order breaks
    /// ties so the result is deterministic. When a cycle prevents a
    /// complete order, a white/gray/black DFS finds the first back edge.
    pub fn ordered(&self) -> OrderResult<K> {
        let n = self.keys.len();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut pending: Vec<usize> = vec![0; n];
        for (from, deps) in self.deps.iter().enumerate() {
            pending[from] = deps.len();
            for &to in deps {
                dependents[to].push(from);
            }
        }

        let mut queue: Vec<usize> = (0..n).filter(|&i| pending[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        let mut head = 0;
        while head < queue.len() {
            let i = queue[head];
            head += 1;
            order.push(self.keys[i]);
            for &dependent in &dependents[i] {
                pending[dependent] -= 1;
                if pending[dependent] == 0 {
                    queue.push(dependent);
                }
            }
        }

        if order.len() == n {
            return Ok(order);
        }
        Err(self.find_back_edge())
    }

    fn find_back_edge(&self) -> (K, K) {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        let n = self.keys.len();
        let mut color = vec![Color::White; n];
        for root in 0..n {
            if color[root] != Color::White {
                continue;
            }
            // Iterative DFS; each stack frame is (node, next dep index).
            let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
            color[root] = Color::Gray;
            while !stack.is_empty() {
                let top = stack.len() - 1;
                let (node, next) = stack[top];
                if next < self.deps[node].len() {
                    stack[top].1 += 1;
                    let dep = self.deps[node][next];
                    match color[dep] {
                        Color::Gray => return (self.keys[node], self.keys[dep]),
                        Color::White => {
                            color[dep] = Color::Gray;
                            stack.push((dep, 0));
                        }
                        Color::Black => {}
                    }
                } else {
                    color[node] = Color::Black;
                    stack.pop();
                }
            }
        }
        // `ordered` only calls this when a cycle exists.
        unreachable!("no back edge found in a graph Kahn could not order")
    }
}

impl<K: Copy + Eq + Hash> Default for DependencyGraph<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_graph_orders_to_nothing() {
        let graph: DependencyGraph<u32> = DependencyGraph::new();
        assert_eq!(graph.ordered().unwrap(), Vec::<u32>::new());
    }

    #[test]
    fn dependencies_come_first() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency(1, 2);
        graph.add_dependency(2, 3);
        let order = graph.ordered().unwrap();
        let pos = |k: u32| order.iter().position(|&x| x == k).unwrap();
        assert!(pos(3) < pos(2));
        assert!(pos(2) < pos(1));
    }

    #[test]
    fn independent_entities_keep_insertion_order() {
        let mut graph = DependencyGraph::new();
        graph.ensure_tracked(10);
        graph.ensure_tracked(20);
        graph.ensure_tracked(30);
        assert_eq!(graph.ordered().unwrap(), vec![10, 20, 30]);
    }

    #[test]
    fn two_cycle_reports_back_edge() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency(1, 2);
        graph.add_dependency(2, 1);
        let (from, to) = graph.ordered().unwrap_err();
        assert!(matches!((from, to), (1, 2) | (2, 1)));
    }

    #[test]
    fn self_cycle_reports_itself() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency(7, 7);
        assert_eq!(graph.ordered().unwrap_err(), (7, 7));
    }

    #[test]
    fn cycle_deep_in_graph_is_found() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency(1, 2);
        graph.add_dependency(2, 3);
        graph.add_dependency(3, 4);
        graph.add_dependency(4, 2);
        let (from, to) = graph.ordered().unwrap_err();
        // The back edge closes the 2-3-4 loop.
        assert!([(4, 2), (2, 3), (3, 4)].contains(&(from, to)));
    }

    #[test]
    fn duplicate_edges_are_ignored() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency(1, 2);
        graph.add_dependency(1, 2);
        assert_eq!(graph.ordered().unwrap(), vec![2, 1]);
    }
}
