//! Merging of adjacent per-qubit delays into joint multi-qubit blocks.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use rimfax_ir::{CircuitDag, Instruction, NodeIndex, QubitId};

use crate::error::{CompileError, CompileResult};
use crate::pass::{Pass, PassKind};
use crate::property::{CouplingMap, PropertySet};

/// Delays at or below this duration are not worth joining.
pub const MIN_JOINABLE_DELAY_DURATION: u64 = 200;

/// Merges concurrently idle, physically adjacent qubits' delays into joint
/// multi-qubit delay blocks.
///
/// A sweep over delay begin/end events maintains a set of open intervals;
/// a delay beginning next to open intervals closes them and opens one
/// spanning the union of their qubits, and a delay ending inside a shared
/// interval closes it and reopens the remainder. The closed intervals then
/// replace the contributing single-qubit delays during a topological rebuild
/// that orders delays ahead of other operations at equal rank, so joint
/// blocks are emitted as early as the schedule allows.
///
/// Only delays that neither touch the start or end of the circuit nor fall
/// below [`MIN_JOINABLE_DELAY_DURATION`] participate. The rebuild invalidates
/// per-node start times, so the pass clears `node_start_time` on completion.
#[derive(Debug, Default)]
pub struct CombineAdjacentDelays;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventKind {
    /// Ends sort ahead of begins at equal times, so an abutting delay joins
    /// the reopened remainder rather than the closing interval.
    End,
    Begin,
}

#[derive(Debug, Clone)]
struct DelayEvent {
    time: u64,
    kind: EventKind,
    node: NodeIndex,
    qubits: Vec<u32>,
}

#[derive(Debug, Clone)]
struct OpenInterval {
    start: u64,
    /// Contributing delay nodes with their physical qubits, in merge order.
    nodes: Vec<(NodeIndex, Vec<u32>)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ClosedInterval {
    start: u64,
    end: u64,
    nodes: Vec<(NodeIndex, Vec<u32>)>,
}

impl CombineAdjacentDelays {
    pub fn new() -> Self {
        Self
    }

    fn is_joinable(duration: u64, start_time: u64, total_duration: u64) -> bool {
        start_time != 0
            && start_time + duration < total_duration
            && duration > MIN_JOINABLE_DELAY_DURATION
    }

    /// One begin and one end event per joinable delay, ordered by time with
    /// ends first and node identity as the final tie-break.
    fn delay_events(
        dag: &CircuitDag,
        node_start_time: &FxHashMap<NodeIndex, u64>,
        total_duration: u64,
    ) -> Vec<DelayEvent> {
        let mut events = Vec::new();
        for (&node, &start) in node_start_time {
            let Some(inst) = dag.get_instruction(node) else {
                continue;
            };
            let Some(duration) = inst.delay_duration() else {
                continue;
            };
            if !Self::is_joinable(duration, start, total_duration) {
                continue;
            }
            let qubits: Vec<u32> = inst.qubits.iter().map(|q| q.0).collect();
            events.push(DelayEvent {
                time: start,
                kind: EventKind::Begin,
                node,
                qubits: qubits.clone(),
            });
            events.push(DelayEvent {
                time: start + duration,
                kind: EventKind::End,
                node,
                qubits,
            });
        }
        events.sort_by_key(|e| (e.time, e.kind == EventKind::Begin, e.node.index()));
        events
    }

    /// Sweep the event list into a set of closed candidate intervals.
    fn sweep(events: &[DelayEvent], coupling_map: &CouplingMap) -> CompileResult<Vec<ClosedInterval>> {
        let mut open: Vec<OpenInterval> = Vec::new();
        let mut closed: Vec<ClosedInterval> = Vec::new();

        let close = |interval: OpenInterval, end: u64, closed: &mut Vec<ClosedInterval>| {
            // A combine can close an interval at the instant it opened;
            // zero-width intervals are dropped.
            if interval.start != end {
                closed.push(ClosedInterval {
                    start: interval.start,
                    end,
                    nodes: interval.nodes,
                });
            }
        };

        for event in events {
            // Open intervals within coupling distance one of this event's
            // qubit.
            let mut adjacent = Vec::new();
            for (idx, interval) in open.iter().enumerate() {
                let mut near = false;
                for (_, qubits) in &interval.nodes {
                    for &q in qubits {
                        if coupling_map.distance_checked(event.qubits[0], q)? <= 1 {
                            near = true;
                        }
                    }
                }
                if near {
                    adjacent.push(idx);
                }
            }

            match event.kind {
                EventKind::Begin => {
                    let mut nodes = vec![(event.node, event.qubits.clone())];
                    // Fold every adjacent open interval into one new
                    // interval starting here.
                    for &idx in adjacent.iter().rev() {
                        let interval = open.remove(idx);
                        nodes.extend(interval.nodes.clone());
                        close(interval, event.time, &mut closed);
                    }
                    open.push(OpenInterval {
                        start: event.time,
                        nodes,
                    });
                }
                EventKind::End => {
                    let holders: Vec<usize> = open
                        .iter()
                        .enumerate()
                        .filter(|(_, i)| i.nodes.iter().any(|(n, _)| *n == event.node))
                        .map(|(idx, _)| idx)
                        .collect();
                    let [holder] = holders[..] else {
                        return Err(CompileError::UnmatchedDelayEnd {
                            time: event.time,
                            qubit: event.qubits[0],
                        });
                    };
                    let interval = open.remove(holder);
                    let remaining: Vec<(NodeIndex, Vec<u32>)> = interval
                        .nodes
                        .iter()
                        .filter(|(n, _)| *n != event.node)
                        .cloned()
                        .collect();
                    close(interval, event.time, &mut closed);
                    // A shared interval keeps running for the other qubits.
                    if !remaining.is_empty() {
                        open.push(OpenInterval {
                            start: event.time,
                            nodes: remaining,
                        });
                    }
                }
            }
        }

        closed.sort_by_key(|c| (c.start, c.end));
        Ok(closed)
    }

    fn joint_delay(interval: &ClosedInterval) -> Instruction {
        let qubits: Vec<QubitId> = interval
            .nodes
            .iter()
            .flat_map(|(_, qubits)| qubits.iter().map(|&q| QubitId(q)))
            .collect();
        Instruction::delay_on(qubits, interval.end - interval.start)
    }
}

impl Pass for CombineAdjacentDelays {
    fn name(&self) -> &str {
        "CombineAdjacentDelays"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()> {
        let total_duration = properties
            .duration
            .ok_or_else(|| CompileError::NotScheduled(self.name().to_string()))?;
        let node_start_time = properties
            .node_start_time
            .as_ref()
            .ok_or_else(|| CompileError::NotScheduled(self.name().to_string()))?;
        let coupling_map =
            properties
                .coupling_map
                .as_ref()
                .ok_or_else(|| CompileError::MissingProperty {
                    pass: self.name().to_string(),
                    property: "coupling_map".to_string(),
                })?;

        let events = Self::delay_events(dag, node_start_time, total_duration);
        let joinable: FxHashSet<NodeIndex> = events.iter().map(|e| e.node).collect();
        let closed = Self::sweep(&events, coupling_map)?;
        debug!(
            joinable = joinable.len(),
            intervals = closed.len(),
            "collected delay intervals"
        );

        // Candidate intervals per contributing delay node, as indices into
        // the (start, end)-sorted closed list.
        let mut replacements: FxHashMap<NodeIndex, Vec<usize>> = FxHashMap::default();
        for (idx, interval) in closed.iter().enumerate() {
            for &(node, _) in &interval.nodes {
                replacements.entry(node).or_default().push(idx);
            }
        }

        let mut new_dag = dag.copy_empty_like();
        let mut buffered: Vec<NodeIndex> = Vec::new();
        let mut emitted_intervals: FxHashSet<usize> = FxHashSet::default();
        let mut emitted_nodes: FxHashSet<NodeIndex> = FxHashSet::default();
        let mut water_mark = 0u64;

        // Delays sort ahead of other operations at equal rank, so every
        // contributing delay is buffered by the time a flush point arrives.
        let order = dag.topological_ops_by_key(|inst| u8::from(!inst.is_delay()));
        for node in order {
            let Some(inst) = dag.get_instruction(node) else {
                continue;
            };
            if joinable.contains(&node) {
                buffered.push(node);
                continue;
            }
            if buffered.is_empty() {
                new_dag.apply(inst.clone())?;
                continue;
            }

            let mut candidates: Vec<usize> = buffered
                .iter()
                .flat_map(|n| replacements.get(n).cloned().unwrap_or_default())
                .collect();
            candidates.sort_unstable();
            candidates.dedup();

            if candidates.is_empty() {
                // Buffered delays with no joint replacement pass through.
                for &delay in &buffered {
                    if emitted_nodes.insert(delay) {
                        if let Some(delay_inst) = dag.get_instruction(delay) {
                            new_dag.apply(delay_inst.clone())?;
                        }
                    }
                }
            } else {
                let node_start = node_start_time.get(&node).copied().unwrap_or(total_duration);
                // Flush every interval that ends in the window between the
                // last flush point and this node's start.
                for idx in candidates {
                    let interval = &closed[idx];
                    if water_mark < interval.end
                        && interval.end <= node_start
                        && emitted_intervals.insert(idx)
                    {
                        new_dag.apply(Self::joint_delay(interval))?;
                    }
                }
                water_mark = node_start;
            }

            if emitted_nodes.insert(node) {
                new_dag.apply(inst.clone())?;
            }
        }

        // Buffered delays that never joined an interval still occupy their
        // original window.
        for &delay in &buffered {
            if replacements.get(&delay).is_none_or(Vec::is_empty)
                && node_start_time.get(&delay).copied().unwrap_or(0) > 0
                && emitted_nodes.insert(delay)
            {
                if let Some(inst) = dag.get_instruction(delay) {
                    new_dag.apply(inst.clone())?;
                }
            }
        }
        // Trailing intervals with no later flush point.
        for (idx, interval) in closed.iter().enumerate() {
            if emitted_intervals.insert(idx) {
                new_dag.apply(Self::joint_delay(interval))?;
            }
        }

        *dag = new_dag;
        // Node identities changed wholesale; stale start times must not leak
        // to later passes.
        properties.node_start_time = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rimfax_ir::Circuit;

    /// Two coupled qubits with 300-unit delays offset by 10 time units,
    /// inside a longer circuit.
    fn staggered_dag() -> (CircuitDag, PropertySet) {
        let mut circuit = Circuit::with_size("staggered", 2, 0);
        circuit.h(QubitId(0)).unwrap();
        circuit.h(QubitId(1)).unwrap();
        circuit.delay(QubitId(0), 300).unwrap();
        circuit.delay(QubitId(1), 300).unwrap();
        circuit.h(QubitId(0)).unwrap();
        circuit.h(QubitId(1)).unwrap();
        let dag = circuit.into_dag();

        let mut node_start_time = FxHashMap::default();
        let mut seen_delay = [false; 2];
        for (node, inst) in dag.topological_ops() {
            let q = inst.qubits[0].0 as usize;
            let start = if inst.is_delay() {
                seen_delay[q] = true;
                if q == 0 { 50 } else { 60 }
            } else if seen_delay[q] {
                if q == 0 { 350 } else { 360 }
            } else {
                0
            };
            node_start_time.insert(node, start);
        }

        let properties = PropertySet::new()
            .with_coupling_map(CouplingMap::linear(2))
            .with_schedule(node_start_time, 420);
        (dag, properties)
    }

    #[test]
    fn test_partial_overlap_splits_into_three_intervals() {
        let (dag, properties) = staggered_dag();
        let node_start_time = properties.node_start_time.as_ref().unwrap();
        let events =
            CombineAdjacentDelays::delay_events(&dag, node_start_time, 420);
        assert_eq!(events.len(), 4);

        let cmap = properties.coupling_map.as_ref().unwrap();
        let closed = CombineAdjacentDelays::sweep(&events, cmap).unwrap();

        let spans: Vec<(u64, u64, usize)> = closed
            .iter()
            .map(|c| (c.start, c.end, c.nodes.len()))
            .collect();
        // q0 alone for [50,60), both for [60,350), q1 alone for [350,360).
        assert_eq!(spans, vec![(50, 60, 1), (60, 350, 2), (350, 360, 1)]);
    }

    #[test]
    fn test_merge_determinism() {
        let (dag, properties) = staggered_dag();
        let node_start_time = properties.node_start_time.as_ref().unwrap();
        let cmap = properties.coupling_map.as_ref().unwrap();
        let events =
            CombineAdjacentDelays::delay_events(&dag, node_start_time, 420);
        let first = CombineAdjacentDelays::sweep(&events, cmap).unwrap();
        let second = CombineAdjacentDelays::sweep(&events, cmap).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_rebuild_conserves_idle_time_per_qubit() {
        let (mut dag, mut properties) = staggered_dag();
        CombineAdjacentDelays::new()
            .run(&mut dag, &mut properties)
            .unwrap();

        let mut idle = vec![0u64; 2];
        for (_, inst) in dag.topological_ops() {
            if let Some(duration) = inst.delay_duration() {
                for &q in &inst.qubits {
                    idle[q.0 as usize] += duration;
                }
            }
        }
        assert_eq!(idle, vec![300, 300]);

        // A two-qubit joint block exists for the shared window.
        let joint: Vec<u64> = dag
            .topological_ops()
            .filter(|(_, i)| i.is_delay() && i.qubits.len() == 2)
            .filter_map(|(_, i)| i.delay_duration())
            .collect();
        assert_eq!(joint, vec![290]);

        // Start times no longer describe this graph.
        assert!(properties.node_start_time.is_none());
    }

    #[test]
    fn test_ineligible_delays_pass_through() {
        let mut circuit = Circuit::with_size("edges", 2, 0);
        // Starts at t=0: ineligible.
        circuit.delay(QubitId(0), 300).unwrap();
        circuit.h(QubitId(0)).unwrap();
        // Too short to join.
        circuit.delay(QubitId(1), 150).unwrap();
        circuit.h(QubitId(1)).unwrap();
        let mut dag = circuit.into_dag();

        let mut node_start_time = FxHashMap::default();
        for (node, inst) in dag.topological_ops() {
            let start = match (inst.name(), inst.qubits[0].0) {
                ("delay", 0) => 0,
                ("delay", _) => 50,
                ("h", 0) => 300,
                _ => 200,
            };
            node_start_time.insert(node, start);
        }
        let mut properties = PropertySet::new()
            .with_coupling_map(CouplingMap::linear(2))
            .with_schedule(node_start_time, 400);

        CombineAdjacentDelays::new()
            .run(&mut dag, &mut properties)
            .unwrap();

        let delays: Vec<(u64, usize)> = dag
            .topological_ops()
            .filter_map(|(_, i)| i.delay_duration().map(|d| (d, i.qubits.len())))
            .collect();
        assert_eq!(delays.len(), 2);
        assert!(delays.iter().all(|&(_, n)| n == 1));
    }

    #[test]
    fn test_unmatched_end_event() {
        let mut circuit = Circuit::with_size("broken", 1, 0);
        circuit.delay(QubitId(0), 300).unwrap();
        let dag = circuit.into_dag();
        let node = dag.topological_ops().next().unwrap().0;

        // An end event with no preceding begin cannot belong to any open
        // interval.
        let events = vec![DelayEvent {
            time: 350,
            kind: EventKind::End,
            node,
            qubits: vec![0],
        }];
        let err = CombineAdjacentDelays::sweep(&events, &CouplingMap::linear(2)).unwrap_err();
        assert!(matches!(
            err,
            CompileError::UnmatchedDelayEnd { time: 350, qubit: 0 }
        ));
    }
}
