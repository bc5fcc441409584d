//! Round-based topological sorter with pluggable tie-break.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use super::CycleError;

const UNVISITED: usize = usize::MAX;

/// Orders nodes so that every declared dependency is honored.
///
/// Nodes are opaque to the sorter; they only need to be hashable and
/// cloneable. Ties among simultaneously-ready nodes are broken by the
/// comparator handed to [`DependencySorter::sort_by`] (or the natural `Ord`
/// for [`DependencySorter::sort`]).
///
/// # Example
///
/// ```
/// use stagecraft::sort::DependencySorter;
///
/// let mut sorter = DependencySorter::new();
/// sorter.add_dependency("load-config", "open-pool");
/// sorter.add_dependency("open-pool", "warm-cache");
///
/// let order = sorter.sort().unwrap();
/// assert_eq!(order, vec!["load-config", "open-pool", "warm-cache"]);
/// ```
#[derive(Debug)]
pub struct DependencySorter<N> {
    nodes: Vec<N>,
    seen: HashSet<N>,
    successors: HashMap<N, Vec<N>>,
    predecessors: HashMap<N, Vec<N>>,
    edges: HashSet<(N, N)>,
}

impl<N: Clone + Eq + Hash> Default for DependencySorter<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: Clone + Eq + Hash> DependencySorter<N> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            seen: HashSet::new(),
            successors: HashMap::new(),
            predecessors: HashMap::new(),
            edges: HashSet::new(),
        }
    }

    /// Registers a node. Re-adding a known node is a no-op.
    pub fn add(&mut self, node: N) {
        if self.seen.insert(node.clone()) {
            self.nodes.push(node);
        }
    }

    /// Declares that `before` must be emitted strictly earlier than `after`.
    ///
    /// Unknown endpoints are added implicitly; duplicate edges are ignored.
    pub fn add_dependency(&mut self, before: N, after: N) {
        self.add(before.clone());
        self.add(after.clone());
        if self.edges.insert((before.clone(), after.clone())) {
            self.successors
                .entry(before.clone())
                .or_default()
                .push(after.clone());
            self.predecessors.entry(after).or_default().push(before);
        }
    }

    /// Number of registered nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Sorts with the natural ordering of `N` as tie-break.
    pub fn sort(&self) -> Result<Vec<N>, CycleError<N>>
    where
        N: Ord,
    {
        self.sort_by(N::cmp)
    }

    /// Sorts with a caller-supplied tie-break comparator.
    ///
    /// Each round snapshots the currently-ready nodes (unresolved in-degree
    /// zero), orders the snapshot with `compare`, and emits it; nodes freed
    /// while a round is emitted wait for the following round.
    pub fn sort_by<F>(&self, mut compare: F) -> Result<Vec<N>, CycleError<N>>
    where
        F: FnMut(&N, &N) -> Ordering,
    {
        let mut in_degree: HashMap<&N, usize> = self
            .nodes
            .iter()
            .map(|n| (n, self.predecessors.get(n).map_or(0, Vec::len)))
            .collect();

        let mut round: Vec<&N> = self
            .nodes
            .iter()
            .filter(|n| in_degree.get(*n) == Some(&0))
            .collect();
        round.sort_by(|a, b| compare(*a, *b));

        let mut emitted: Vec<N> = Vec::with_capacity(self.nodes.len());
        while !round.is_empty() {
            let mut next: Vec<&N> = Vec::new();
            for node in round.drain(..) {
                emitted.push(node.clone());
                if let Some(successors) = self.successors.get(node) {
                    for successor in successors {
                        if let Some(degree) = in_degree.get_mut(successor) {
                            *degree -= 1;
                            if *degree == 0 {
                                next.push(successor);
                            }
                        }
                    }
                }
            }
            next.sort_by(|a, b| compare(*a, *b));
            round = next;
        }

        if emitted.len() == self.nodes.len() {
            Ok(emitted)
        } else {
            Err(self.cycle_error(&emitted))
        }
    }

    /// Builds the cyclic-subgraph report for the nodes left unemitted.
    ///
    /// The unemitted set contains every node on a cycle plus anything blocked
    /// behind one. Strongly connected components separate the two: only
    /// multi-node components (and self-loops) are truly cyclic.
    fn cycle_error(&self, emitted: &[N]) -> CycleError<N> {
        let emitted_set: HashSet<&N> = emitted.iter().collect();
        let remaining: Vec<&N> = self
            .nodes
            .iter()
            .filter(|n| !emitted_set.contains(n))
            .collect();

        let index_of: HashMap<&N, usize> = remaining
            .iter()
            .enumerate()
            .map(|(i, n)| (*n, i))
            .collect();
        let successors: Vec<Vec<usize>> = remaining
            .iter()
            .map(|n| {
                self.successors
                    .get(*n)
                    .map(|succ| succ.iter().filter_map(|s| index_of.get(s).copied()).collect())
                    .unwrap_or_default()
            })
            .collect();

        let mut cyclic: HashSet<usize> = HashSet::new();
        for component in strongly_connected_components(&successors) {
            if component.len() > 1 {
                cyclic.extend(component);
            } else if let [single] = component[..] {
                if successors[single].contains(&single) {
                    cyclic.insert(single);
                }
            }
        }

        let mut cycle: HashMap<N, HashSet<N>> = HashMap::with_capacity(cyclic.len());
        for &i in &cyclic {
            let node = remaining[i];
            let in_cycle_preds: HashSet<N> = self
                .predecessors
                .get(node)
                .map(|preds| {
                    preds
                        .iter()
                        .filter(|p| index_of.get(*p).is_some_and(|j| cyclic.contains(j)))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            cycle.insert(node.clone(), in_cycle_preds);
        }
        CycleError::new(cycle)
    }
}

/// Tarjan's algorithm over an index-based adjacency list.
fn strongly_connected_components(successors: &[Vec<usize>]) -> Vec<Vec<usize>> {
    struct Tarjan<'a> {
        successors: &'a [Vec<usize>],
        index: Vec<usize>,
        lowlink: Vec<usize>,
        on_stack: Vec<bool>,
        stack: Vec<usize>,
        next_index: usize,
        components: Vec<Vec<usize>>,
    }

    impl Tarjan<'_> {
        fn connect(&mut self, v: usize) {
            self.index[v] = self.next_index;
            self.lowlink[v] = self.next_index;
            self.next_index += 1;
            self.stack.push(v);
            self.on_stack[v] = true;

            let successors = self.successors;
            for &w in &successors[v] {
                if self.index[w] == UNVISITED {
                    self.connect(w);
                    self.lowlink[v] = self.lowlink[v].min(self.lowlink[w]);
                } else if self.on_stack[w] {
                    self.lowlink[v] = self.lowlink[v].min(self.index[w]);
                }
            }

            if self.lowlink[v] == self.index[v] {
                let mut component = Vec::new();
                while let Some(w) = self.stack.pop() {
                    self.on_stack[w] = false;
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                self.components.push(component);
            }
        }
    }

    let n = successors.len();
    let mut tarjan = Tarjan {
        successors,
        index: vec![UNVISITED; n],
        lowlink: vec![0; n],
        on_stack: vec![false; n],
        stack: Vec::new(),
        next_index: 0,
        components: Vec::new(),
    };
    for v in 0..n {
        if tarjan.index[v] == UNVISITED {
            tarjan.connect(v);
        }
    }
    tarjan.components
}
