//! Circuit instructions combining operations with operands.

use serde::{Deserialize, Serialize};

use crate::control_flow::ControlFlowOp;
use crate::gate::{Gate, StandardGate};
use crate::qubit::{ClbitId, QubitId};

/// Role of a transient marker operation used while flattening control flow.
///
/// Markers are internal to the lowering pass: `Enter` and `Exit` survive as
/// the shared entry/exit points of a flattened construct, while `BlockEnter`,
/// `BlockExit` and `Placeholder` exist only between lowering steps and are
/// guaranteed not to outlive the pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowMarkerRole {
    /// Shared entry point of a flattened control-flow construct.
    Enter,
    /// Shared exit point of a flattened control-flow construct.
    Exit,
    /// Entry fence of one nested block; removed during rewiring.
    BlockEnter,
    /// Exit fence of one nested block; removed during rewiring.
    BlockExit,
    /// Stand-in for a nested block before its graph is spliced in.
    Placeholder,
}

/// The kind of instruction in a circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InstructionKind {
    /// A quantum gate operation.
    Gate(Gate),
    /// Measurement operation.
    Measure,
    /// Reset qubit to |0⟩.
    Reset,
    /// Barrier (synchronization point).
    Barrier,
    /// Idle window on one or more qubits.
    Delay {
        /// Duration in device-specific time units.
        duration: u64,
    },
    /// A compound control-flow operation owning nested blocks.
    ControlFlow(ControlFlowOp),
    /// Transient lowering marker.
    FlowMarker {
        /// The marker's role within the lowering scaffold.
        role: FlowMarkerRole,
    },
    /// Synthetic loop-back condition re-evaluation.
    ///
    /// Consumes a loop's classical wires and drives one fresh condition bit;
    /// inserted by lowering to model the loop-back edge without a cycle.
    ConditionEval,
}

/// A complete instruction with operands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    /// The kind of instruction.
    pub kind: InstructionKind,
    /// Qubits this instruction operates on.
    pub qubits: Vec<QubitId>,
    /// Classical bits this instruction operates on.
    pub clbits: Vec<ClbitId>,
}

impl Instruction {
    /// Create a gate instruction.
    pub fn gate(gate: impl Into<Gate>, qubits: impl IntoIterator<Item = QubitId>) -> Self {
        Self {
            kind: InstructionKind::Gate(gate.into()),
            qubits: qubits.into_iter().collect(),
            clbits: vec![],
        }
    }

    /// Create a single-qubit gate instruction.
    pub fn single_qubit_gate(gate: StandardGate, qubit: QubitId) -> Self {
        Self::gate(gate, [qubit])
    }

    /// Create a two-qubit gate instruction.
    pub fn two_qubit_gate(gate: StandardGate, q1: QubitId, q2: QubitId) -> Self {
        Self::gate(gate, [q1, q2])
    }

    /// Create a measurement instruction.
    pub fn measure(qubit: QubitId, clbit: ClbitId) -> Self {
        Self {
            kind: InstructionKind::Measure,
            qubits: vec![qubit],
            clbits: vec![clbit],
        }
    }

    /// Create a reset instruction.
    pub fn reset(qubit: QubitId) -> Self {
        Self {
            kind: InstructionKind::Reset,
            qubits: vec![qubit],
            clbits: vec![],
        }
    }

    /// Create a barrier instruction.
    pub fn barrier(qubits: impl IntoIterator<Item = QubitId>) -> Self {
        Self {
            kind: InstructionKind::Barrier,
            qubits: qubits.into_iter().collect(),
            clbits: vec![],
        }
    }

    /// Create a single-qubit delay instruction.
    pub fn delay(qubit: QubitId, duration: u64) -> Self {
        Self::delay_on([qubit], duration)
    }

    /// Create a delay instruction spanning several qubits.
    pub fn delay_on(qubits: impl IntoIterator<Item = QubitId>, duration: u64) -> Self {
        Self {
            kind: InstructionKind::Delay { duration },
            qubits: qubits.into_iter().collect(),
            clbits: vec![],
        }
    }

    /// Create a compound control-flow instruction.
    pub fn control_flow(
        op: ControlFlowOp,
        qubits: impl IntoIterator<Item = QubitId>,
        clbits: impl IntoIterator<Item = ClbitId>,
    ) -> Self {
        Self {
            kind: InstructionKind::ControlFlow(op),
            qubits: qubits.into_iter().collect(),
            clbits: clbits.into_iter().collect(),
        }
    }

    /// Create a lowering marker spanning the given wires.
    pub fn flow_marker(
        role: FlowMarkerRole,
        qubits: impl IntoIterator<Item = QubitId>,
        clbits: impl IntoIterator<Item = ClbitId>,
    ) -> Self {
        Self {
            kind: InstructionKind::FlowMarker { role },
            qubits: qubits.into_iter().collect(),
            clbits: clbits.into_iter().collect(),
        }
    }

    /// Create a condition re-evaluation instruction.
    pub fn condition_eval(clbits: impl IntoIterator<Item = ClbitId>) -> Self {
        Self {
            kind: InstructionKind::ConditionEval,
            qubits: vec![],
            clbits: clbits.into_iter().collect(),
        }
    }

    /// Check if this is a gate instruction.
    pub fn is_gate(&self) -> bool {
        matches!(self.kind, InstructionKind::Gate(_))
    }

    /// Check if this is a measurement.
    pub fn is_measure(&self) -> bool {
        matches!(self.kind, InstructionKind::Measure)
    }

    /// Check if this is a reset.
    pub fn is_reset(&self) -> bool {
        matches!(self.kind, InstructionKind::Reset)
    }

    /// Check if this is a barrier.
    pub fn is_barrier(&self) -> bool {
        matches!(self.kind, InstructionKind::Barrier)
    }

    /// Check if this is a delay.
    pub fn is_delay(&self) -> bool {
        matches!(self.kind, InstructionKind::Delay { .. })
    }

    /// Get the delay duration if this is a delay.
    pub fn delay_duration(&self) -> Option<u64> {
        match self.kind {
            InstructionKind::Delay { duration } => Some(duration),
            _ => None,
        }
    }

    /// Check if this is a compound control-flow instruction.
    pub fn is_control_flow(&self) -> bool {
        matches!(self.kind, InstructionKind::ControlFlow(_))
    }

    /// Get the control-flow descriptor if present.
    pub fn control_flow_op(&self) -> Option<&ControlFlowOp> {
        match &self.kind {
            InstructionKind::ControlFlow(op) => Some(op),
            _ => None,
        }
    }

    /// Check if this is a lowering marker with the given role.
    pub fn is_marker(&self, role: FlowMarkerRole) -> bool {
        matches!(self.kind, InstructionKind::FlowMarker { role: r } if r == role)
    }

    /// Get the gate if this is a gate instruction.
    pub fn as_gate(&self) -> Option<&Gate> {
        match &self.kind {
            InstructionKind::Gate(g) => Some(g),
            _ => None,
        }
    }

    /// Get the name of the instruction.
    pub fn name(&self) -> &str {
        match &self.kind {
            InstructionKind::Gate(g) => g.name(),
            InstructionKind::Measure => "measure",
            InstructionKind::Reset => "reset",
            InstructionKind::Barrier => "barrier",
            InstructionKind::Delay { .. } => "delay",
            InstructionKind::ControlFlow(op) => op.name(),
            InstructionKind::FlowMarker { role } => match role {
                FlowMarkerRole::Enter => "enter",
                FlowMarkerRole::Exit => "exit",
                FlowMarkerRole::BlockEnter => "block_enter",
                FlowMarkerRole::BlockExit => "block_exit",
                FlowMarkerRole::Placeholder => "placeholder",
            },
            InstructionKind::ConditionEval => "condition",
        }
    }

    /// Bind a symbol in every parameter this instruction carries, including
    /// parameters of nested control-flow blocks. Pure.
    pub fn bind_parameter(&self, name: &str, value: f64) -> Self {
        let kind = match &self.kind {
            InstructionKind::Gate(g) => InstructionKind::Gate(g.bind(name, value)),
            InstructionKind::ControlFlow(op) => InstructionKind::ControlFlow(op.bind(name, value)),
            other => other.clone(),
        };
        Self {
            kind,
            qubits: self.qubits.clone(),
            clbits: self.clbits.clone(),
        }
    }

    /// Remap operand wires through the given lookup tables. Used when a
    /// replacement graph's local wires are spliced into a host graph.
    pub(crate) fn remap_wires(
        &self,
        qubit_map: &rustc_hash::FxHashMap<QubitId, QubitId>,
        clbit_map: &rustc_hash::FxHashMap<ClbitId, ClbitId>,
    ) -> Self {
        Self {
            kind: self.kind.clone(),
            qubits: self
                .qubits
                .iter()
                .map(|q| qubit_map.get(q).copied().unwrap_or(*q))
                .collect(),
            clbits: self
                .clbits
                .iter()
                .map(|c| clbit_map.get(c).copied().unwrap_or(*c))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::ParameterExpression;

    #[test]
    fn test_gate_instruction() {
        let inst = Instruction::single_qubit_gate(StandardGate::H, QubitId(0));
        assert!(inst.is_gate());
        assert_eq!(inst.qubits.len(), 1);
        assert_eq!(inst.name(), "h");
    }

    #[test]
    fn test_measure_instruction() {
        let inst = Instruction::measure(QubitId(0), ClbitId(0));
        assert!(inst.is_measure());
        assert_eq!(inst.qubits.len(), 1);
        assert_eq!(inst.clbits.len(), 1);
    }

    #[test]
    fn test_multi_qubit_delay() {
        let inst = Instruction::delay_on([QubitId(0), QubitId(2)], 320);
        assert!(inst.is_delay());
        assert_eq!(inst.delay_duration(), Some(320));
        assert_eq!(inst.qubits.len(), 2);
        assert_eq!(inst.name(), "delay");
    }

    #[test]
    fn test_marker_names() {
        let m = Instruction::flow_marker(FlowMarkerRole::Placeholder, [QubitId(0)], []);
        assert_eq!(m.name(), "placeholder");
        assert!(m.is_marker(FlowMarkerRole::Placeholder));
        assert!(!m.is_marker(FlowMarkerRole::Enter));
    }

    #[test]
    fn test_serde_roundtrip() {
        let inst = Instruction::gate(
            StandardGate::Rz(ParameterExpression::symbol("theta")),
            [QubitId(3)],
        );
        let json = serde_json::to_string(&inst).unwrap();
        let back: Instruction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, inst);

        let measure = Instruction::measure(QubitId(1), ClbitId(0));
        let json = serde_json::to_string(&measure).unwrap();
        let back: Instruction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, measure);
    }

    #[test]
    fn test_bind_parameter_on_gate() {
        let inst = Instruction::single_qubit_gate(
            StandardGate::Rx(ParameterExpression::symbol("i")),
            QubitId(0),
        );
        let bound = inst.bind_parameter("i", 4.0);
        match bound.as_gate() {
            Some(Gate::Standard(StandardGate::Rx(p))) => assert_eq!(p.as_f64(), Some(4.0)),
            _ => panic!("Expected bound Rx"),
        }
    }
}
