//! DAG-based circuit representation.
//!
//! Nodes are wire inputs, wire outputs, or operations; edges carry the wire
//! they belong to. For every wire the edges restricted to that wire form a
//! single path from its `In` node to its `Out` node. Rewrite passes splice
//! whole sub-graphs in and out of the DAG, so node identities must survive
//! removals — the graph is a `StableDiGraph` and a `NodeIndex` stays valid
//! until its own node is removed.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use petgraph::Direction;
use petgraph::stable_graph::StableDiGraph;
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::error::{IrError, IrResult};
use crate::instruction::{Instruction, InstructionKind};
use crate::qubit::{ClbitId, QubitId};

/// Node index type for the circuit DAG.
pub type NodeIndex = petgraph::stable_graph::NodeIndex<u32>;

/// A node in the circuit DAG.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DagNode {
    /// Input node for a wire.
    In(WireId),
    /// Output node for a wire.
    Out(WireId),
    /// Operation node containing an instruction.
    Op(Instruction),
}

impl DagNode {
    /// Check if this is an input node.
    #[inline]
    pub fn is_input(&self) -> bool {
        matches!(self, DagNode::In(_))
    }

    /// Check if this is an output node.
    #[inline]
    pub fn is_output(&self) -> bool {
        matches!(self, DagNode::Out(_))
    }

    /// Check if this is an operation node.
    #[inline]
    pub fn is_op(&self) -> bool {
        matches!(self, DagNode::Op(_))
    }

    /// Get the instruction if this is an operation node.
    #[inline]
    pub fn instruction(&self) -> Option<&Instruction> {
        match self {
            DagNode::Op(inst) => Some(inst),
            _ => None,
        }
    }

    /// Get mutable reference to the instruction.
    #[inline]
    pub fn instruction_mut(&mut self) -> Option<&mut Instruction> {
        match self {
            DagNode::Op(inst) => Some(inst),
            _ => None,
        }
    }
}

/// Identifier for a wire in the DAG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WireId {
    /// A quantum wire.
    Qubit(QubitId),
    /// A classical wire.
    Clbit(ClbitId),
}

impl std::fmt::Display for WireId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WireId::Qubit(q) => write!(f, "{q}"),
            WireId::Clbit(c) => write!(f, "{c}"),
        }
    }
}

impl From<QubitId> for WireId {
    fn from(q: QubitId) -> Self {
        WireId::Qubit(q)
    }
}

impl From<ClbitId> for WireId {
    fn from(c: ClbitId) -> Self {
        WireId::Clbit(c)
    }
}

/// An edge in the circuit DAG representing a wire segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DagEdge {
    /// The wire this edge represents.
    pub wire: WireId,
}

/// The abstraction level of a circuit in the compilation pipeline.
///
/// Scheduling passes require the `Physical` level, where a `QubitId` is an
/// index into the hardware coupling graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CircuitLevel {
    /// Logical level: qubits are abstract, no physical mapping applied.
    #[default]
    Logical,
    /// Physical level: qubits are mapped to physical device positions.
    Physical,
}

/// DAG-based circuit representation.
#[derive(Debug, Clone)]
pub struct CircuitDag {
    /// The underlying graph.
    graph: StableDiGraph<DagNode, DagEdge, u32>,
    /// Qubits in insertion order. The order defines the positional boundary
    /// mapping used by [`CircuitDag::substitute_node_with_dag`].
    qubits: Vec<QubitId>,
    /// Classical bits in insertion order.
    clbits: Vec<ClbitId>,
    /// Map from qubit to its (input, output) boundary nodes.
    qubit_io: FxHashMap<QubitId, (NodeIndex, NodeIndex)>,
    /// Map from classical bit to its (input, output) boundary nodes.
    clbit_io: FxHashMap<ClbitId, (NodeIndex, NodeIndex)>,
    /// Wire front: the node just before each wire's output node, kept for
    /// O(1) appends in `apply`.
    wire_front: FxHashMap<WireId, NodeIndex>,
    /// Global phase of the circuit.
    global_phase: f64,
    /// Abstraction level of the circuit.
    level: CircuitLevel,
}

impl CircuitDag {
    /// Create a new empty circuit DAG.
    pub fn new() -> Self {
        Self {
            graph: StableDiGraph::default(),
            qubits: vec![],
            clbits: vec![],
            qubit_io: FxHashMap::default(),
            clbit_io: FxHashMap::default(),
            wire_front: FxHashMap::default(),
            global_phase: 0.0,
            level: CircuitLevel::Logical,
        }
    }

    /// Add a qubit to the circuit.
    pub fn add_qubit(&mut self, qubit: QubitId) {
        if self.qubit_io.contains_key(&qubit) {
            return;
        }
        let wire = WireId::Qubit(qubit);
        let in_node = self.graph.add_node(DagNode::In(wire));
        let out_node = self.graph.add_node(DagNode::Out(wire));
        self.graph.add_edge(in_node, out_node, DagEdge { wire });
        self.qubits.push(qubit);
        self.qubit_io.insert(qubit, (in_node, out_node));
        self.wire_front.insert(wire, in_node);
    }

    /// Add a classical bit to the circuit.
    pub fn add_clbit(&mut self, clbit: ClbitId) {
        if self.clbit_io.contains_key(&clbit) {
            return;
        }
        let wire = WireId::Clbit(clbit);
        let in_node = self.graph.add_node(DagNode::In(wire));
        let out_node = self.graph.add_node(DagNode::Out(wire));
        self.graph.add_edge(in_node, out_node, DagEdge { wire });
        self.clbits.push(clbit);
        self.clbit_io.insert(clbit, (in_node, out_node));
        self.wire_front.insert(wire, in_node);
    }

    /// The first free classical bit id, used when a pass needs a synthetic
    /// wire (e.g. the loop-back condition bit).
    pub fn next_clbit_id(&self) -> ClbitId {
        ClbitId(self.clbits.iter().map(|c| c.0 + 1).max().unwrap_or(0))
    }

    fn wire_io(&self, wire: WireId) -> Option<(NodeIndex, NodeIndex)> {
        match wire {
            WireId::Qubit(q) => self.qubit_io.get(&q).copied(),
            WireId::Clbit(c) => self.clbit_io.get(&c).copied(),
        }
    }

    /// Get the input boundary node for a wire.
    pub fn input_node(&self, wire: WireId) -> Option<NodeIndex> {
        self.wire_io(wire).map(|(i, _)| i)
    }

    /// Get the output boundary node for a wire.
    pub fn output_node(&self, wire: WireId) -> Option<NodeIndex> {
        self.wire_io(wire).map(|(_, o)| o)
    }

    fn validate_operands(&self, instruction: &Instruction) -> IrResult<()> {
        let op_name = instruction.name().to_string();

        let arity_ok = match &instruction.kind {
            InstructionKind::Gate(gate) => {
                gate.num_qubits() as usize == instruction.qubits.len()
            }
            InstructionKind::ControlFlow(op) => {
                op.num_qubits() as usize == instruction.qubits.len()
                    && op.num_clbits() as usize == instruction.clbits.len()
            }
            _ => true,
        };
        if !arity_ok {
            let (eq, ec) = match &instruction.kind {
                InstructionKind::Gate(g) => (g.num_qubits(), 0),
                InstructionKind::ControlFlow(op) => (op.num_qubits(), op.num_clbits()),
                _ => unreachable!(),
            };
            return Err(IrError::ArityMismatch {
                op_name,
                expected_qubits: eq,
                expected_clbits: ec,
                got_qubits: instruction.qubits.len() as u32,
                got_clbits: instruction.clbits.len() as u32,
            });
        }

        for &qubit in &instruction.qubits {
            if !self.qubit_io.contains_key(&qubit) {
                return Err(IrError::QubitNotFound {
                    qubit,
                    op_name: Some(op_name),
                });
            }
        }
        for &clbit in &instruction.clbits {
            if !self.clbit_io.contains_key(&clbit) {
                return Err(IrError::ClbitNotFound {
                    clbit,
                    op_name: Some(op_name),
                });
            }
        }

        let mut seen = FxHashSet::default();
        for &qubit in &instruction.qubits {
            if !seen.insert(qubit) {
                return Err(IrError::DuplicateQubit {
                    qubit,
                    op_name: Some(op_name),
                });
            }
        }

        Ok(())
    }

    /// Apply an instruction at the back of the circuit.
    pub fn apply(&mut self, instruction: Instruction) -> IrResult<NodeIndex> {
        self.validate_operands(&instruction)?;

        let wires: Vec<WireId> = instruction
            .qubits
            .iter()
            .map(|&q| WireId::Qubit(q))
            .chain(instruction.clbits.iter().map(|&c| WireId::Clbit(c)))
            .collect();

        let op_node = self.graph.add_node(DagNode::Op(instruction));

        for wire in wires {
            let (_, out_node) = self.wire_io(wire).expect("operand validated above");
            let prev_node = self.wire_front[&wire];

            let edge_id = self
                .graph
                .edges_directed(prev_node, Direction::Outgoing)
                .find(|e| e.weight().wire == wire && e.target() == out_node)
                .map(|e| e.id())
                .ok_or_else(|| {
                    IrError::InvalidDag(format!(
                        "Missing edge from wire front to output for wire {wire}"
                    ))
                })?;
            self.graph.remove_edge(edge_id);
            self.graph.add_edge(prev_node, op_node, DagEdge { wire });
            self.graph.add_edge(op_node, out_node, DagEdge { wire });
            self.wire_front.insert(wire, op_node);
        }

        Ok(op_node)
    }

    /// Add an operation node without wiring it to anything. The caller is
    /// responsible for re-establishing wire continuity via [`Self::link`] /
    /// [`Self::unlink`]; used by the control-flow lowering pass for its
    /// loop-back condition node.
    pub fn add_detached_op(&mut self, instruction: Instruction) -> IrResult<NodeIndex> {
        self.validate_operands(&instruction)?;
        Ok(self.graph.add_node(DagNode::Op(instruction)))
    }

    /// Add an edge carrying `wire` from `a` to `b`.
    pub fn link(&mut self, a: NodeIndex, b: NodeIndex, wire: WireId) -> IrResult<()> {
        if !self.graph.contains_node(a) || !self.graph.contains_node(b) {
            return Err(IrError::InvalidNode);
        }
        self.graph.add_edge(a, b, DagEdge { wire });
        if self.output_node(wire) == Some(b) {
            self.wire_front.insert(wire, a);
        }
        Ok(())
    }

    /// Remove the edge carrying `wire` from `a` to `b`.
    pub fn unlink(&mut self, a: NodeIndex, b: NodeIndex, wire: WireId) -> IrResult<()> {
        let edge_id = self
            .graph
            .edges_directed(a, Direction::Outgoing)
            .find(|e| e.target() == b && e.weight().wire == wire)
            .map(|e| e.id())
            .ok_or_else(|| {
                IrError::InvalidDag(format!("No edge {a:?} -> {b:?} on wire {wire}"))
            })?;
        self.graph.remove_edge(edge_id);
        if self.output_node(wire) == Some(b) {
            self.refresh_front(wire);
        }
        Ok(())
    }

    /// Recompute the wire front for `wire` from the output node's incoming
    /// edges.
    fn refresh_front(&mut self, wire: WireId) {
        let Some((in_node, out_node)) = self.wire_io(wire) else {
            return;
        };
        let front = self
            .graph
            .edges_directed(out_node, Direction::Incoming)
            .find(|e| e.weight().wire == wire)
            .map_or(in_node, |e| e.source());
        self.wire_front.insert(wire, front);
    }

    /// Remove an operation node, returning its incoming and outgoing edges
    /// as `(neighbor, wire)` pairs without reconnecting anything.
    pub fn remove_node_collect(
        &mut self,
        node: NodeIndex,
    ) -> IrResult<(Vec<(NodeIndex, WireId)>, Vec<(NodeIndex, WireId)>)> {
        let Some(dag_node) = self.graph.node_weight(node) else {
            return Err(IrError::InvalidNode);
        };
        if !dag_node.is_op() {
            return Err(IrError::InvalidDag(
                "Cannot remove non-operation node".into(),
            ));
        }

        let incoming: Vec<_> = self
            .graph
            .edges_directed(node, Direction::Incoming)
            .map(|e| (e.source(), e.weight().wire))
            .collect();
        let outgoing: Vec<_> = self
            .graph
            .edges_directed(node, Direction::Outgoing)
            .map(|e| (e.target(), e.weight().wire))
            .collect();

        self.graph.remove_node(node);

        // The removed node may have been the front of some wires.
        let fronts: Vec<WireId> = self
            .wire_front
            .iter()
            .filter(|&(_, &n)| n == node)
            .map(|(&w, _)| w)
            .collect();
        for wire in fronts {
            self.refresh_front(wire);
        }

        Ok((incoming, outgoing))
    }

    /// Remove an operation node from the DAG, reconnecting each wire's
    /// predecessor to its successor.
    pub fn remove_op(&mut self, node: NodeIndex) -> IrResult<Instruction> {
        let instruction = self
            .graph
            .node_weight(node)
            .ok_or(IrError::InvalidNode)?
            .instruction()
            .cloned()
            .ok_or_else(|| IrError::InvalidDag("Cannot remove non-operation node".into()))?;

        let (incoming, outgoing) = self.remove_node_collect(node)?;
        for &(pred, wire) in &incoming {
            for &(succ, succ_wire) in &outgoing {
                if wire == succ_wire {
                    self.link(pred, succ, wire)?;
                }
            }
        }

        Ok(instruction)
    }

    /// Deterministic topological order over all nodes; among ready nodes the
    /// smallest `(key, index)` wins.
    fn topological_order_by<K: Ord>(
        &self,
        mut key: impl FnMut(&DagNode) -> K,
    ) -> Vec<NodeIndex> {
        let mut indegree: FxHashMap<NodeIndex, usize> = FxHashMap::default();
        for idx in self.graph.node_indices() {
            indegree.insert(idx, 0);
        }
        for edge in self.graph.edge_references() {
            *indegree.get_mut(&edge.target()).expect("node exists") += 1;
        }

        let mut ready: BinaryHeap<Reverse<(K, usize)>> = BinaryHeap::new();
        for (&idx, &deg) in &indegree {
            if deg == 0 {
                ready.push(Reverse((key(&self.graph[idx]), idx.index())));
            }
        }

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some(Reverse((_, raw))) = ready.pop() {
            let idx = NodeIndex::new(raw);
            order.push(idx);
            for edge in self.graph.edges_directed(idx, Direction::Outgoing) {
                let deg = indegree.get_mut(&edge.target()).expect("node exists");
                *deg -= 1;
                if *deg == 0 {
                    ready.push(Reverse((key(&self.graph[edge.target()]), edge.target().index())));
                }
            }
        }

        assert!(
            order.len() == self.graph.node_count(),
            "DAG must be acyclic — cycle detected in circuit graph"
        );
        order
    }

    /// Iterate over operations in a deterministic topological order.
    pub fn topological_ops(&self) -> impl Iterator<Item = (NodeIndex, &Instruction)> {
        self.topological_ops_by_key(|_| 0u8)
            .into_iter()
            .map(|idx| (idx, self.graph[idx].instruction().expect("op node")))
    }

    /// Operation nodes in topological order with a caller-supplied
    /// tie-break: among simultaneously-ready operations, smaller keys come
    /// first. Boundary nodes always take precedence over operations.
    pub fn topological_ops_by_key<K: Ord>(
        &self,
        mut key: impl FnMut(&Instruction) -> K,
    ) -> Vec<NodeIndex> {
        self.topological_order_by(|node| match node {
            DagNode::Op(inst) => Some(key(inst)),
            _ => None,
        })
        .into_iter()
        .filter(|&idx| self.graph[idx].is_op())
        .collect()
    }

    /// Operation nodes whose descriptor name matches, in topological order.
    pub fn named_ops(&self, name: &str) -> Vec<NodeIndex> {
        self.topological_ops()
            .filter(|(_, inst)| inst.name() == name)
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Get an instruction by node index.
    #[inline]
    pub fn get_instruction(&self, node: NodeIndex) -> Option<&Instruction> {
        self.graph.node_weight(node).and_then(|n| n.instruction())
    }

    /// Get a mutable instruction by node index.
    #[inline]
    pub fn get_instruction_mut(&mut self, node: NodeIndex) -> Option<&mut Instruction> {
        self.graph
            .node_weight_mut(node)
            .and_then(|n| n.instruction_mut())
    }

    /// The predecessor of a node on a specific wire, if any.
    pub fn wire_pred(&self, node: NodeIndex, wire: WireId) -> Option<NodeIndex> {
        self.graph
            .edges_directed(node, Direction::Incoming)
            .find(|e| e.weight().wire == wire)
            .map(|e| e.source())
    }

    /// The successor of a node on a specific wire, if any.
    pub fn wire_succ(&self, node: NodeIndex, wire: WireId) -> Option<NodeIndex> {
        self.graph
            .edges_directed(node, Direction::Outgoing)
            .find(|e| e.weight().wire == wire)
            .map(|e| e.target())
    }

    /// Unique predecessor nodes of a node.
    pub fn predecessors(&self, node: NodeIndex) -> Vec<NodeIndex> {
        let mut seen = FxHashSet::default();
        self.graph
            .edges_directed(node, Direction::Incoming)
            .map(|e| e.source())
            .filter(|&n| seen.insert(n))
            .collect()
    }

    /// Unique successor nodes of a node.
    pub fn successors(&self, node: NodeIndex) -> Vec<NodeIndex> {
        let mut seen = FxHashSet::default();
        self.graph
            .edges_directed(node, Direction::Outgoing)
            .map(|e| e.target())
            .filter(|&n| seen.insert(n))
            .collect()
    }

    /// Replace one operation node with an entire replacement graph.
    ///
    /// The replacement's wires map positionally onto the node's operands:
    /// its i-th qubit onto the node's i-th qubit argument, likewise for
    /// classical bits. Fails with [`IrError::ArityMismatch`] when the
    /// boundary widths differ and [`IrError::DanglingWire`] when a host edge
    /// at the node carries a wire the node does not declare. Validation runs
    /// before any mutation: on error the host graph is unchanged.
    ///
    /// Returns the mapping from replacement operation nodes to their new
    /// identities in the host graph.
    pub fn substitute_node_with_dag(
        &mut self,
        node: NodeIndex,
        replacement: CircuitDag,
    ) -> IrResult<FxHashMap<NodeIndex, NodeIndex>> {
        let instruction = self
            .graph
            .node_weight(node)
            .ok_or(IrError::InvalidNode)?
            .instruction()
            .cloned()
            .ok_or_else(|| IrError::InvalidDag("Cannot substitute a boundary node".into()))?;

        if replacement.num_qubits() != instruction.qubits.len()
            || replacement.num_clbits() != instruction.clbits.len()
        {
            return Err(IrError::ArityMismatch {
                op_name: instruction.name().to_string(),
                expected_qubits: instruction.qubits.len() as u32,
                expected_clbits: instruction.clbits.len() as u32,
                got_qubits: replacement.num_qubits() as u32,
                got_clbits: replacement.num_clbits() as u32,
            });
        }

        // Positional boundary maps: replacement-local wire -> host wire.
        let qubit_map: FxHashMap<QubitId, QubitId> = replacement
            .qubits
            .iter()
            .copied()
            .zip(instruction.qubits.iter().copied())
            .collect();
        let clbit_map: FxHashMap<ClbitId, ClbitId> = replacement
            .clbits
            .iter()
            .copied()
            .zip(instruction.clbits.iter().copied())
            .collect();

        // Every incident edge must carry a declared operand wire.
        let declared: FxHashSet<WireId> = instruction
            .qubits
            .iter()
            .map(|&q| WireId::Qubit(q))
            .chain(instruction.clbits.iter().map(|&c| WireId::Clbit(c)))
            .collect();
        for edge in self
            .graph
            .edges_directed(node, Direction::Incoming)
            .chain(self.graph.edges_directed(node, Direction::Outgoing))
        {
            if !declared.contains(&edge.weight().wire) {
                return Err(IrError::DanglingWire {
                    wire: edge.weight().wire.to_string(),
                });
            }
        }

        // Per host wire: the node's boundary neighbors.
        let mut boundaries: Vec<(WireId, WireId, Vec<NodeIndex>, Vec<NodeIndex>)> = vec![];
        for (local, host) in replacement
            .qubits
            .iter()
            .map(|&q| (WireId::Qubit(q), WireId::Qubit(qubit_map[&q])))
            .chain(
                replacement
                    .clbits
                    .iter()
                    .map(|&c| (WireId::Clbit(c), WireId::Clbit(clbit_map[&c]))),
            )
        {
            let preds: Vec<_> = self
                .graph
                .edges_directed(node, Direction::Incoming)
                .filter(|e| e.weight().wire == host)
                .map(|e| e.source())
                .collect();
            let succs: Vec<_> = self
                .graph
                .edges_directed(node, Direction::Outgoing)
                .filter(|e| e.weight().wire == host)
                .map(|e| e.target())
                .collect();
            boundaries.push((local, host, preds, succs));
        }

        // Validation done; mutation cannot fail from here on.
        self.graph.remove_node(node);

        // Copy operation nodes with operands remapped onto host wires.
        let mut node_map: FxHashMap<NodeIndex, NodeIndex> = FxHashMap::default();
        for idx in replacement.graph.node_indices() {
            if let DagNode::Op(inst) = &replacement.graph[idx] {
                let host_idx = self
                    .graph
                    .add_node(DagNode::Op(inst.remap_wires(&qubit_map, &clbit_map)));
                node_map.insert(idx, host_idx);
            }
        }

        // Copy interior edges (operation to operation).
        for edge in replacement.graph.edge_references() {
            if let (Some(&src), Some(&dst)) =
                (node_map.get(&edge.source()), node_map.get(&edge.target()))
            {
                let wire = match edge.weight().wire {
                    WireId::Qubit(q) => WireId::Qubit(qubit_map[&q]),
                    WireId::Clbit(c) => WireId::Clbit(clbit_map[&c]),
                };
                self.graph.add_edge(src, dst, DagEdge { wire });
            }
        }

        // Stitch each wire's boundary: host predecessor to the replacement's
        // first op on that wire, its last op to the host successor. An empty
        // replacement path short-circuits predecessor to successor.
        for (local, host, preds, succs) in boundaries {
            let (in_node, out_node) = replacement.wire_io(local).expect("wire exists");
            let firsts: Vec<_> = replacement
                .graph
                .edges_directed(in_node, Direction::Outgoing)
                .filter(|e| e.weight().wire == local && e.target() != out_node)
                .map(|e| node_map[&e.target()])
                .collect();
            let lasts: Vec<_> = replacement
                .graph
                .edges_directed(out_node, Direction::Incoming)
                .filter(|e| e.weight().wire == local && e.source() != in_node)
                .map(|e| node_map[&e.source()])
                .collect();

            if firsts.is_empty() {
                for &pred in &preds {
                    for &succ in &succs {
                        self.graph.add_edge(pred, succ, DagEdge { wire: host });
                    }
                }
            } else {
                for &pred in &preds {
                    for &first in &firsts {
                        self.graph.add_edge(pred, first, DagEdge { wire: host });
                    }
                }
                for &last in &lasts {
                    for &succ in &succs {
                        self.graph.add_edge(last, succ, DagEdge { wire: host });
                    }
                }
            }
            self.refresh_front(host);
        }

        self.global_phase += replacement.global_phase;

        Ok(node_map)
    }

    /// Collapse a wire-contiguous set of operation nodes into one new
    /// operation spanning the union of their wires.
    ///
    /// `new_inst`'s operand lists define the wire order of the collapsed
    /// operation and must equal the block's wire union as a set. With
    /// `cycle_check`, fails with [`IrError::CycleDetected`] when contracting
    /// the block would create a dependency cycle through outside nodes.
    pub fn replace_block_with_op(
        &mut self,
        nodes: &[NodeIndex],
        new_inst: Instruction,
        cycle_check: bool,
    ) -> IrResult<NodeIndex> {
        if nodes.is_empty() {
            return Err(IrError::InvalidDag("Cannot collapse an empty block".into()));
        }
        let block: FxHashSet<NodeIndex> = nodes.iter().copied().collect();

        let mut union_qubits: FxHashSet<QubitId> = FxHashSet::default();
        let mut union_clbits: FxHashSet<ClbitId> = FxHashSet::default();
        for &idx in nodes {
            let inst = self
                .get_instruction(idx)
                .ok_or(IrError::InvalidNode)?;
            union_qubits.extend(inst.qubits.iter().copied());
            union_clbits.extend(inst.clbits.iter().copied());
        }

        let new_qubits: FxHashSet<QubitId> = new_inst.qubits.iter().copied().collect();
        let new_clbits: FxHashSet<ClbitId> = new_inst.clbits.iter().copied().collect();
        if new_qubits != union_qubits || new_clbits != union_clbits {
            return Err(IrError::ArityMismatch {
                op_name: new_inst.name().to_string(),
                expected_qubits: union_qubits.len() as u32,
                expected_clbits: union_clbits.len() as u32,
                got_qubits: new_inst.qubits.len() as u32,
                got_clbits: new_inst.clbits.len() as u32,
            });
        }

        if cycle_check && self.contraction_creates_cycle(&block) {
            return Err(IrError::CycleDetected);
        }

        // Per wire: find the contiguous block run and its outside neighbors.
        let mut stitches: Vec<(WireId, NodeIndex, NodeIndex)> = vec![];
        for wire in new_inst
            .qubits
            .iter()
            .map(|&q| WireId::Qubit(q))
            .chain(new_inst.clbits.iter().map(|&c| WireId::Clbit(c)))
        {
            let path = self.wire_path(wire)?;
            let positions: Vec<usize> = path
                .iter()
                .enumerate()
                .filter(|(_, n)| block.contains(n))
                .map(|(i, _)| i)
                .collect();
            if positions.is_empty() {
                return Err(IrError::InvalidDag(format!(
                    "Block does not touch wire {wire}"
                )));
            }
            let (first, last) = (positions[0], *positions.last().expect("nonempty"));
            if last - first + 1 != positions.len() {
                return Err(IrError::InvalidDag(format!(
                    "Block is not contiguous on wire {wire}"
                )));
            }
            stitches.push((wire, path[first - 1], path[last + 1]));
        }

        // Validation done; rebuild the region.
        for &idx in &block {
            self.graph.remove_node(idx);
        }
        let new_node = self.graph.add_node(DagNode::Op(new_inst));
        for (wire, pred, succ) in stitches {
            self.graph.add_edge(pred, new_node, DagEdge { wire });
            self.graph.add_edge(new_node, succ, DagEdge { wire });
            self.refresh_front(wire);
        }

        Ok(new_node)
    }

    /// Check whether contracting `block` into a single node would create a
    /// cycle through nodes outside the block.
    fn contraction_creates_cycle(&self, block: &FxHashSet<NodeIndex>) -> bool {
        let mut contracted: petgraph::graph::DiGraph<(), ()> = petgraph::graph::DiGraph::new();
        let mut map: FxHashMap<NodeIndex, petgraph::graph::NodeIndex> = FxHashMap::default();
        let super_node = contracted.add_node(());
        for idx in self.graph.node_indices() {
            let mapped = if block.contains(&idx) {
                super_node
            } else {
                contracted.add_node(())
            };
            map.insert(idx, mapped);
        }
        for edge in self.graph.edge_references() {
            let (a, b) = (map[&edge.source()], map[&edge.target()]);
            if a != b {
                contracted.add_edge(a, b, ());
            }
        }
        petgraph::algo::is_cyclic_directed(&contracted)
    }

    /// The full node path of a wire from its input to its output node.
    /// Requires the wire to be a single simple path.
    fn wire_path(&self, wire: WireId) -> IrResult<Vec<NodeIndex>> {
        let (in_node, out_node) = self
            .wire_io(wire)
            .ok_or_else(|| IrError::InvalidDag(format!("Unknown wire {wire}")))?;
        let mut path = vec![in_node];
        let mut current = in_node;
        let max_steps = self.graph.node_count();
        while current != out_node {
            let mut next_nodes = self
                .graph
                .edges_directed(current, Direction::Outgoing)
                .filter(|e| e.weight().wire == wire)
                .map(|e| e.target());
            let next = next_nodes.next().ok_or_else(|| {
                IrError::InvalidDag(format!(
                    "Wire {wire} is broken: no outgoing edge from node {current:?}"
                ))
            })?;
            if next_nodes.next().is_some() {
                return Err(IrError::InvalidDag(format!(
                    "Wire {wire} forks at node {current:?}"
                )));
            }
            path.push(next);
            current = next;
            if path.len() > max_steps + 1 {
                return Err(IrError::InvalidDag(format!(
                    "Wire {wire} has too many steps (possible loop)"
                )));
            }
        }
        Ok(path)
    }

    /// Duplicate the wire set, level and global phase with no operations.
    /// Used as the accumulator target when a pass rebuilds a graph.
    pub fn copy_empty_like(&self) -> Self {
        let mut copy = Self::new();
        for &q in &self.qubits {
            copy.add_qubit(q);
        }
        for &c in &self.clbits {
            copy.add_clbit(c);
        }
        copy.global_phase = self.global_phase;
        copy.level = self.level;
        copy
    }

    /// Get the number of qubits.
    #[inline]
    pub fn num_qubits(&self) -> usize {
        self.qubits.len()
    }

    /// Get the number of classical bits.
    #[inline]
    pub fn num_clbits(&self) -> usize {
        self.clbits.len()
    }

    /// Get the number of operations.
    #[inline]
    pub fn num_ops(&self) -> usize {
        let io_nodes = 2 * (self.qubits.len() + self.clbits.len());
        self.graph.node_count().saturating_sub(io_nodes)
    }

    /// Calculate the circuit depth.
    pub fn depth(&self) -> usize {
        let mut depths: FxHashMap<NodeIndex, usize> =
            FxHashMap::with_capacity_and_hasher(self.graph.node_count(), Default::default());
        let mut max_depth = 0usize;

        for node in self.topological_order_by(|_| ()) {
            let max_pred_depth = self
                .graph
                .edges_directed(node, Direction::Incoming)
                .map(|e| depths.get(&e.source()).copied().unwrap_or(0))
                .max()
                .unwrap_or(0);
            let node_depth = if self.graph[node].is_op() {
                max_pred_depth + 1
            } else {
                max_pred_depth
            };
            max_depth = max_depth.max(node_depth);
            depths.insert(node, node_depth);
        }

        max_depth
    }

    /// Qubits in insertion order.
    pub fn qubits(&self) -> &[QubitId] {
        &self.qubits
    }

    /// Classical bits in insertion order.
    pub fn clbits(&self) -> &[ClbitId] {
        &self.clbits
    }

    /// Get the global phase.
    pub fn global_phase(&self) -> f64 {
        self.global_phase
    }

    /// Set the global phase.
    pub fn set_global_phase(&mut self, phase: f64) {
        self.global_phase = phase;
    }

    /// Get the abstraction level of this circuit.
    pub fn level(&self) -> CircuitLevel {
        self.level
    }

    /// Set the abstraction level of this circuit.
    pub fn set_level(&mut self, level: CircuitLevel) {
        self.level = level;
    }

    /// Get a reference to the underlying graph.
    pub fn graph(&self) -> &StableDiGraph<DagNode, DagEdge, u32> {
        &self.graph
    }

    /// Verify the structural integrity of the DAG.
    ///
    /// Checks acyclicity, boundary-node bookkeeping, and single-simple-path
    /// wire continuity from every input to its output. Flattened
    /// control-flow regions intentionally fan wires out and will not pass
    /// this check; it applies to ordinary circuits.
    pub fn verify_integrity(&self) -> IrResult<()> {
        if petgraph::algo::is_cyclic_directed(&self.graph) {
            return Err(IrError::InvalidDag("Graph contains a cycle".into()));
        }

        for &qubit in &self.qubits {
            if !self.qubit_io.contains_key(&qubit) {
                return Err(IrError::InvalidDag(format!(
                    "Qubit {qubit} missing boundary nodes"
                )));
            }
            self.wire_path(WireId::Qubit(qubit))?;
        }
        for &clbit in &self.clbits {
            if !self.clbit_io.contains_key(&clbit) {
                return Err(IrError::InvalidDag(format!(
                    "Clbit {clbit} missing boundary nodes"
                )));
            }
            self.wire_path(WireId::Clbit(clbit))?;
        }

        Ok(())
    }
}

impl Default for CircuitDag {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::StandardGate;

    fn h(q: u32) -> Instruction {
        Instruction::single_qubit_gate(StandardGate::H, QubitId(q))
    }

    fn cx(a: u32, b: u32) -> Instruction {
        Instruction::two_qubit_gate(StandardGate::CX, QubitId(a), QubitId(b))
    }

    fn dag_with_qubits(n: u32) -> CircuitDag {
        let mut dag = CircuitDag::new();
        for q in 0..n {
            dag.add_qubit(QubitId(q));
        }
        dag
    }

    #[test]
    fn test_empty_dag() {
        let dag = CircuitDag::new();
        assert_eq!(dag.num_qubits(), 0);
        assert_eq!(dag.num_clbits(), 0);
        assert_eq!(dag.num_ops(), 0);
        assert_eq!(dag.depth(), 0);
    }

    #[test]
    fn test_apply_and_depth() {
        let mut dag = dag_with_qubits(2);
        dag.apply(h(0)).unwrap();
        dag.apply(cx(0, 1)).unwrap();
        assert_eq!(dag.num_ops(), 2);
        assert_eq!(dag.depth(), 2);
        dag.verify_integrity().unwrap();
    }

    #[test]
    fn test_parallel_gates_depth() {
        let mut dag = dag_with_qubits(2);
        dag.apply(h(0)).unwrap();
        dag.apply(h(1)).unwrap();
        assert_eq!(dag.depth(), 1);
    }

    #[test]
    fn test_gate_arity_mismatch() {
        let mut dag = dag_with_qubits(2);
        let result = dag.apply(Instruction::gate(StandardGate::CX, [QubitId(0)]));
        assert!(matches!(result, Err(IrError::ArityMismatch { .. })));
    }

    #[test]
    fn test_qubit_not_found() {
        let mut dag = dag_with_qubits(1);
        let result = dag.apply(cx(0, 99));
        assert!(matches!(result, Err(IrError::QubitNotFound { .. })));
    }

    #[test]
    fn test_duplicate_qubit_rejected() {
        let mut dag = dag_with_qubits(2);
        let result = dag.apply(Instruction::gate(StandardGate::CX, [QubitId(0), QubitId(0)]));
        assert!(matches!(result, Err(IrError::DuplicateQubit { .. })));
    }

    #[test]
    fn test_remove_op_reconnects_wires() {
        let mut dag = dag_with_qubits(2);
        dag.apply(h(0)).unwrap();
        let mid = dag.apply(cx(0, 1)).unwrap();
        dag.apply(h(1)).unwrap();

        dag.remove_op(mid).unwrap();
        assert_eq!(dag.num_ops(), 2);
        dag.verify_integrity().unwrap();
        // StableDiGraph keeps the other node identities intact.
        assert_eq!(dag.depth(), 1);
    }

    #[test]
    fn test_topological_ops_deterministic() {
        let mut dag = dag_with_qubits(2);
        dag.apply(h(1)).unwrap();
        dag.apply(h(0)).unwrap();

        let first: Vec<_> = dag.topological_ops().map(|(i, _)| i).collect();
        let second: Vec<_> = dag.topological_ops().map(|(i, _)| i).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_topological_tie_break_prefers_small_keys() {
        let mut dag = dag_with_qubits(2);
        // Both ready at rank 0: a delay on q0 and a gate on q1.
        dag.apply(h(1)).unwrap();
        dag.apply(Instruction::delay(QubitId(0), 100)).unwrap();

        let order = dag.topological_ops_by_key(|inst| u8::from(!inst.is_delay()));
        let names: Vec<_> = order
            .iter()
            .map(|&i| dag.get_instruction(i).unwrap().name().to_string())
            .collect();
        assert_eq!(names, vec!["delay", "h"]);
    }

    #[test]
    fn test_named_ops() {
        let mut dag = dag_with_qubits(2);
        dag.apply(h(0)).unwrap();
        dag.apply(Instruction::delay(QubitId(1), 10)).unwrap();
        dag.apply(h(0)).unwrap();
        assert_eq!(dag.named_ops("h").len(), 2);
        assert_eq!(dag.named_ops("delay").len(), 1);
        assert!(dag.named_ops("cx").is_empty());
    }

    #[test]
    fn test_substitute_round_trip() {
        // Replacing a node with a single-op graph of matching arity gives a
        // graph isomorphic to the original.
        let mut dag = dag_with_qubits(2);
        dag.apply(h(0)).unwrap();
        let target = dag.apply(cx(0, 1)).unwrap();
        dag.apply(h(1)).unwrap();

        let mut repl = dag_with_qubits(2);
        repl.apply(cx(0, 1)).unwrap();

        let mapping = dag.substitute_node_with_dag(target, repl).unwrap();
        assert_eq!(mapping.len(), 1);
        assert_eq!(dag.num_ops(), 3);
        // h(q0) -> cx -> h(q1) is a dependency chain through the cx.
        assert_eq!(dag.depth(), 3);
        dag.verify_integrity().unwrap();

        let names: Vec<_> = dag
            .topological_ops()
            .map(|(_, inst)| inst.name().to_string())
            .collect();
        assert_eq!(names, vec!["h", "cx", "h"]);
    }

    #[test]
    fn test_substitute_expands_node() {
        let mut dag = dag_with_qubits(2);
        let target = dag.apply(cx(0, 1)).unwrap();

        // Reversed-operand replacement: h-sandwiched CX over local wires.
        let mut repl = dag_with_qubits(2);
        repl.apply(h(0)).unwrap();
        repl.apply(h(1)).unwrap();
        repl.apply(cx(1, 0)).unwrap();
        repl.apply(h(0)).unwrap();
        repl.apply(h(1)).unwrap();

        dag.substitute_node_with_dag(target, repl).unwrap();
        assert_eq!(dag.num_ops(), 5);
        assert_eq!(dag.depth(), 3);
        dag.verify_integrity().unwrap();
    }

    #[test]
    fn test_substitute_arity_mismatch_leaves_host_unchanged() {
        let mut dag = dag_with_qubits(2);
        let target = dag.apply(cx(0, 1)).unwrap();

        let mut repl = dag_with_qubits(1);
        repl.apply(h(0)).unwrap();

        let err = dag.substitute_node_with_dag(target, repl).unwrap_err();
        assert!(matches!(err, IrError::ArityMismatch { .. }));
        assert_eq!(dag.num_ops(), 1);
        dag.verify_integrity().unwrap();
    }

    #[test]
    fn test_substitute_with_empty_graph_splices_wire() {
        let mut dag = dag_with_qubits(1);
        dag.apply(h(0)).unwrap();
        let target = dag.apply(h(0)).unwrap();

        let repl = dag_with_qubits(1);
        dag.substitute_node_with_dag(target, repl).unwrap();
        assert_eq!(dag.num_ops(), 1);
        dag.verify_integrity().unwrap();
    }

    #[test]
    fn test_substitute_accumulates_global_phase() {
        let mut dag = dag_with_qubits(1);
        let target = dag.apply(h(0)).unwrap();

        let mut repl = dag_with_qubits(1);
        repl.apply(h(0)).unwrap();
        repl.set_global_phase(0.5);

        dag.substitute_node_with_dag(target, repl).unwrap();
        assert!((dag.global_phase() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_replace_block_with_op() {
        let mut dag = dag_with_qubits(2);
        let a = dag.apply(h(0)).unwrap();
        let b = dag.apply(cx(0, 1)).unwrap();

        let joined = dag
            .replace_block_with_op(
                &[a, b],
                Instruction::gate(
                    crate::gate::CustomGate::new("fused", 2),
                    [QubitId(0), QubitId(1)],
                ),
                true,
            )
            .unwrap();
        assert_eq!(dag.num_ops(), 1);
        assert_eq!(dag.get_instruction(joined).unwrap().name(), "fused");
        dag.verify_integrity().unwrap();
    }

    #[test]
    fn test_replace_block_cycle_detected() {
        // q0: a ----- c      q1: a - b - c   collapsing {a, c} would need
        // the result both before and after b.
        let mut dag = dag_with_qubits(2);
        let a = dag.apply(cx(0, 1)).unwrap();
        dag.apply(h(1)).unwrap();
        let c = dag.apply(cx(0, 1)).unwrap();

        let err = dag
            .replace_block_with_op(
                &[a, c],
                Instruction::gate(
                    crate::gate::CustomGate::new("fused", 2),
                    [QubitId(0), QubitId(1)],
                ),
                true,
            )
            .unwrap_err();
        assert!(matches!(err, IrError::CycleDetected));
        assert_eq!(dag.num_ops(), 3);
    }

    #[test]
    fn test_replace_block_arity_mismatch() {
        let mut dag = dag_with_qubits(2);
        let a = dag.apply(cx(0, 1)).unwrap();
        let err = dag
            .replace_block_with_op(
                &[a],
                Instruction::gate(crate::gate::CustomGate::new("fused", 1), [QubitId(0)]),
                false,
            )
            .unwrap_err();
        assert!(matches!(err, IrError::ArityMismatch { .. }));
    }

    #[test]
    fn test_copy_empty_like() {
        let mut dag = dag_with_qubits(3);
        dag.add_clbit(ClbitId(0));
        dag.set_global_phase(1.25);
        dag.set_level(CircuitLevel::Physical);
        dag.apply(h(0)).unwrap();

        let copy = dag.copy_empty_like();
        assert_eq!(copy.num_qubits(), 3);
        assert_eq!(copy.num_clbits(), 1);
        assert_eq!(copy.num_ops(), 0);
        assert_eq!(copy.qubits(), dag.qubits());
        assert!((copy.global_phase() - 1.25).abs() < 1e-12);
        assert_eq!(copy.level(), CircuitLevel::Physical);
    }

    #[test]
    fn test_raw_surgery_roundtrip() {
        let mut dag = dag_with_qubits(1);
        let a = dag.apply(h(0)).unwrap();
        let b = dag.apply(h(0)).unwrap();
        let wire = WireId::Qubit(QubitId(0));
        let out = dag.output_node(wire).unwrap();

        // Splice b out by hand.
        let (incoming, outgoing) = dag.remove_node_collect(b).unwrap();
        assert_eq!(incoming, vec![(a, wire)]);
        assert_eq!(outgoing, vec![(out, wire)]);
        dag.link(a, out, wire).unwrap();

        dag.verify_integrity().unwrap();
        assert_eq!(dag.num_ops(), 1);
        // apply still works because the wire front was refreshed.
        dag.apply(h(0)).unwrap();
        dag.verify_integrity().unwrap();
    }

    #[test]
    fn test_next_clbit_id() {
        let mut dag = dag_with_qubits(1);
        assert_eq!(dag.next_clbit_id(), ClbitId(0));
        dag.add_clbit(ClbitId(0));
        dag.add_clbit(ClbitId(5));
        assert_eq!(dag.next_clbit_id(), ClbitId(6));
    }
}
