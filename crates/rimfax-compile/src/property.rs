//! `PropertySet` and related types for pass communication.
//!
//! This module provides the [`PropertySet`] type, which enables compilation passes
//! to share data with each other. It contains both standard properties (coupling
//! map, instruction durations, schedule times) and supports arbitrary custom
//! properties.
//!
//! # Overview
//!
//! During quantum circuit compilation, multiple passes need to share information:
//! - **Scheduling** produces a start time per operation node and a total
//!   circuit duration
//! - **Decoupling insertion** uses instruction durations and the coupling map
//!   to fill idle windows with pulse sequences
//! - **Delay merging** uses the coupling map to decide which concurrently idle
//!   qubits are close enough to share one delay
//!
//! The `PropertySet` acts as a shared context passed through all compilation passes.
//!
//! # Examples
//!
//! ```
//! use rimfax_compile::{PropertySet, CouplingMap, InstructionDurations};
//!
//! let mut durations = InstructionDurations::new();
//! durations.insert_default("x", 160);
//!
//! let props = PropertySet::new()
//!     .with_coupling_map(CouplingMap::linear(5))
//!     .with_durations(durations);
//!
//! assert!(props.coupling_map.is_some());
//! ```

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};

use rimfax_ir::NodeIndex;

use crate::error::{CompileError, CompileResult};

/// Target device coupling map.
///
/// The coupling map defines which pairs of physical qubits can
/// interact with two-qubit gates, and drives the adjacency tests used by
/// the scheduling passes.
///
/// ## Performance
///
/// On construction, a distance matrix is precomputed using BFS from each
/// node. This enables O(1) `distance()` lookups.
///
/// ## Deserialization
///
/// After deserialization, call [`rebuild_caches()`](Self::rebuild_caches) to
/// recompute the adjacency list and distance matrix (which are skipped
/// during serialization). Without this call, `distance()` will fall back to
/// per-query BFS.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouplingMap {
    /// List of connected qubit pairs (bidirectional).
    edges: Vec<(u32, u32)>,
    /// Number of physical qubits.
    num_qubits: u32,
    /// Adjacency list for fast lookup.
    #[serde(skip)]
    adjacency: FxHashMap<u32, Vec<u32>>,
    /// Precomputed all-pairs distance matrix. `dist_matrix[from][to]` is the
    /// shortest-path distance, or `u32::MAX` if unreachable.
    #[serde(skip)]
    dist_matrix: Vec<Vec<u32>>,
}

impl CouplingMap {
    /// Create a new coupling map with the given number of qubits.
    pub fn new(num_qubits: u32) -> Self {
        Self {
            edges: vec![],
            num_qubits,
            adjacency: FxHashMap::default(),
            dist_matrix: vec![],
        }
    }

    /// Add an edge between two qubits (bidirectional).
    ///
    /// Duplicate edges (including reversed pairs) are silently ignored.
    pub fn add_edge(&mut self, q1: u32, q2: u32) {
        // Check for duplicates in either direction.
        if self
            .edges
            .iter()
            .any(|&(a, b)| (a == q1 && b == q2) || (a == q2 && b == q1))
        {
            return;
        }
        self.edges.push((q1, q2));
        self.adjacency.entry(q1).or_default().push(q2);
        self.adjacency.entry(q2).or_default().push(q1);
    }

    /// Precompute all-pairs shortest paths using BFS from each node.
    /// Called automatically by factory methods (linear, star, full).
    fn precompute_distances(&mut self) {
        let n = self.num_qubits as usize;
        self.dist_matrix = vec![vec![u32::MAX; n]; n];

        for src in 0..n {
            self.dist_matrix[src][src] = 0;
            let mut queue = std::collections::VecDeque::new();
            queue.push_back(src as u32);

            while let Some(current) = queue.pop_front() {
                let cur = current as usize;
                for &neighbor in self.adjacency.get(&current).into_iter().flatten() {
                    let nb = neighbor as usize;
                    if self.dist_matrix[src][nb] == u32::MAX {
                        self.dist_matrix[src][nb] = self.dist_matrix[src][cur] + 1;
                        queue.push_back(neighbor);
                    }
                }
            }
        }
    }

    /// Rebuild the adjacency list and distance matrix from the edge list.
    /// Must be called after deserialization to restore O(1) distance lookups.
    pub fn rebuild_caches(&mut self) {
        self.adjacency.clear();
        for &(q1, q2) in &self.edges {
            self.adjacency.entry(q1).or_default().push(q2);
            self.adjacency.entry(q2).or_default().push(q1);
        }
        self.precompute_distances();
    }

    /// Check if two qubits are directly connected.
    #[inline]
    pub fn is_connected(&self, q1: u32, q2: u32) -> bool {
        self.adjacency
            .get(&q1)
            .is_some_and(|neighbors| neighbors.contains(&q2))
    }

    /// Get the number of physical qubits.
    #[inline]
    pub fn num_qubits(&self) -> u32 {
        self.num_qubits
    }

    /// Get the coupling edges.
    pub fn edges(&self) -> &[(u32, u32)] {
        &self.edges
    }

    /// Get neighbors of a qubit.
    pub fn neighbors(&self, qubit: u32) -> impl Iterator<Item = u32> + '_ {
        self.adjacency
            .get(&qubit)
            .map(|v| v.iter().copied())
            .into_iter()
            .flatten()
    }

    /// Create a linear coupling map (0-1-2-3-...).
    pub fn linear(n: u32) -> Self {
        let mut map = Self::new(n);
        for i in 0..n.saturating_sub(1) {
            map.add_edge(i, i + 1);
        }
        map.precompute_distances();
        map
    }

    /// Create a fully connected coupling map.
    pub fn full(n: u32) -> Self {
        let mut map = Self::new(n);
        for i in 0..n {
            for j in (i + 1)..n {
                map.add_edge(i, j);
            }
        }
        map.precompute_distances();
        map
    }

    /// Create a star topology (center qubit connected to all others).
    pub fn star(n: u32) -> Self {
        let mut map = Self::new(n);
        for i in 1..n {
            map.add_edge(0, i);
        }
        map.precompute_distances();
        map
    }

    /// O(1) shortest-path distance lookup using the precomputed matrix.
    /// Falls back to BFS if the matrix has not been precomputed.
    pub fn distance(&self, from: u32, to: u32) -> Option<u32> {
        if from == to {
            return Some(0);
        }

        let (f, t) = (from as usize, to as usize);
        if f < self.dist_matrix.len() && t < self.dist_matrix[f].len() {
            let d = self.dist_matrix[f][t];
            return if d == u32::MAX { None } else { Some(d) };
        }

        // Fallback BFS (for manually-constructed maps without precompute)
        self.distance_bfs(from, to)
    }

    /// Shortest-path distance, with unreachable pairs surfaced as
    /// [`CompileError::Unreachable`] rather than as a silent sentinel.
    pub fn distance_checked(&self, from: u32, to: u32) -> CompileResult<u32> {
        self.distance(from, to)
            .ok_or(CompileError::Unreachable(from, to))
    }

    /// Restrict the coupling map to a subset of physical qubits, returning
    /// the edges between them as index pairs into `subset`.
    pub fn reduce(&self, subset: &[u32]) -> Vec<(usize, usize)> {
        let mut edges = vec![];
        for (i, &a) in subset.iter().enumerate() {
            for (j, &b) in subset.iter().enumerate().skip(i + 1) {
                if self.is_connected(a, b) {
                    edges.push((i, j));
                }
            }
        }
        edges
    }

    /// BFS fallback for distance computation.
    fn distance_bfs(&self, from: u32, to: u32) -> Option<u32> {
        let mut visited = FxHashMap::default();
        let mut queue = std::collections::VecDeque::new();
        queue.push_back((from, 0u32));
        visited.insert(from, 0u32);

        while let Some((current, dist)) = queue.pop_front() {
            for &neighbor in self.adjacency.get(&current).into_iter().flatten() {
                if neighbor == to {
                    return Some(dist + 1);
                }
                if let std::collections::hash_map::Entry::Vacant(e) = visited.entry(neighbor) {
                    e.insert(dist + 1);
                    queue.push_back((neighbor, dist + 1));
                }
            }
        }

        None
    }
}

/// Durations of instructions on the target device, in device time units.
///
/// Lookups first try the `(name, qubit)` pair, then the per-name default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstructionDurations {
    /// Per-qubit durations keyed by instruction name and physical qubit.
    per_qubit: FxHashMap<(String, u32), u64>,
    /// Per-name fallback durations.
    defaults: FxHashMap<String, u64>,
}

impl InstructionDurations {
    /// Create an empty duration table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the duration of an instruction on a specific qubit.
    pub fn insert(&mut self, name: impl Into<String>, qubit: u32, duration: u64) {
        self.per_qubit.insert((name.into(), qubit), duration);
    }

    /// Set the default duration of an instruction on any qubit.
    pub fn insert_default(&mut self, name: impl Into<String>, duration: u64) {
        self.defaults.insert(name.into(), duration);
    }

    /// Look up the duration of an instruction on a qubit.
    pub fn get(&self, name: &str, qubit: u32) -> CompileResult<u64> {
        if let Some(&d) = self.per_qubit.get(&(name.to_string(), qubit)) {
            return Ok(d);
        }
        self.defaults
            .get(name)
            .copied()
            .ok_or_else(|| CompileError::UnknownDuration {
                name: name.to_string(),
                qubit,
            })
    }
}

/// Properties shared between compilation passes.
///
/// The `PropertySet` allows passes to communicate by storing and retrieving
/// typed values. Standard properties like the coupling map, instruction
/// durations and schedule times have dedicated public fields for convenience.
///
/// # Standard Properties
///
/// | Field | Type | Description |
/// |-------|------|-------------|
/// | `coupling_map` | [`CouplingMap`] | Device connectivity graph |
/// | `durations` | [`InstructionDurations`] | Instruction durations per qubit |
/// | `node_start_time` | `Option<FxHashMap<NodeIndex, u64>>` | Scheduled start time per operation node |
/// | `duration` | `u64` | Total scheduled circuit duration |
///
/// # Custom Properties
///
/// Passes can store arbitrary data using the type-safe [`insert`](Self::insert)
/// and [`get`](Self::get) methods. Each type can have at most one value stored.
#[derive(Debug, Default)]
pub struct PropertySet {
    /// Target coupling map defining allowed two-qubit interactions and
    /// qubit adjacency.
    pub coupling_map: Option<CouplingMap>,

    /// Instruction durations for the target device.
    ///
    /// Required by decoupling insertion.
    pub durations: Option<InstructionDurations>,

    /// Scheduled start time per operation node.
    ///
    /// Produced by a scheduler; consumed and rebuilt by passes that
    /// reconstruct the graph.
    pub node_start_time: Option<FxHashMap<NodeIndex, u64>>,

    /// Total scheduled circuit duration.
    pub duration: Option<u64>,

    /// Custom properties storage (type-erased).
    custom: FxHashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl PropertySet {
    /// Create a new empty property set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the coupling map.
    #[must_use]
    pub fn with_coupling_map(mut self, coupling_map: CouplingMap) -> Self {
        self.coupling_map = Some(coupling_map);
        self
    }

    /// Set the instruction durations.
    #[must_use]
    pub fn with_durations(mut self, durations: InstructionDurations) -> Self {
        self.durations = Some(durations);
        self
    }

    /// Set the schedule: per-node start times and total duration.
    #[must_use]
    pub fn with_schedule(mut self, node_start_time: FxHashMap<NodeIndex, u64>, duration: u64) -> Self {
        self.node_start_time = Some(node_start_time);
        self.duration = Some(duration);
        self
    }

    /// Insert a custom property.
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) {
        self.custom.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Get a custom property.
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.custom
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref())
    }

    /// Get a mutable custom property.
    pub fn get_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.custom
            .get_mut(&TypeId::of::<T>())
            .and_then(|v| v.downcast_mut())
    }

    /// Remove a custom property.
    pub fn remove<T: Any>(&mut self) -> Option<T> {
        self.custom
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast().ok())
            .map(|v| *v)
    }
}
