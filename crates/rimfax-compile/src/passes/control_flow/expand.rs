//! Lowering of compound control-flow nodes into the flat graph.

use rimfax_ir::{
    CircuitDag, ClbitId, FlowMarkerRole, Instruction, IrError, NodeIndex, QubitId, WireId,
};
use tracing::debug;

use crate::error::CompileResult;
use crate::pass::{Pass, PassKind};
use crate::property::PropertySet;

/// Splices compound control-flow nodes into the flat graph.
///
/// Each compound node is replaced by a scaffold of flow markers: a shared
/// `enter`, one placeholder slot per nested block, and a shared `exit`. Every
/// placeholder is then substituted with its block's own graph, and the
/// per-block scaffolding is collapsed so the branch bodies form a diamond
/// between the shared entry and exit. For loop constructs a condition
/// re-evaluation node is threaded onto the loop's classical wires ahead of
/// the entry, producing one fresh single-bit wire that models the loop-back
/// edge without a cycle.
///
/// The lowered regions deliberately fan out across branches, so callers must
/// not expect single-path wire continuity afterwards. Block-enter,
/// block-exit, and placeholder markers never survive this pass.
#[derive(Debug, Default)]
pub struct ExpandControlFlow;

impl ExpandControlFlow {
    pub fn new() -> Self {
        Self
    }

    fn expand(&self, dag: &mut CircuitDag) -> CompileResult<()> {
        loop {
            let targets: Vec<NodeIndex> = dag
                .topological_ops()
                .filter(|(_, inst)| inst.is_control_flow())
                .map(|(idx, _)| idx)
                .collect();
            if targets.is_empty() {
                return Ok(());
            }
            for node in targets {
                self.lower_node(dag, node)?;
            }
        }
    }

    fn lower_node(&self, dag: &mut CircuitDag, node: NodeIndex) -> CompileResult<()> {
        let Some(instruction) = dag.get_instruction(node).cloned() else {
            return Ok(());
        };
        let Some(op) = instruction.control_flow_op().cloned() else {
            return Ok(());
        };

        let qubits: Vec<QubitId> = (0..op.num_qubits()).map(QubitId).collect();
        let clbits: Vec<ClbitId> = (0..op.num_clbits()).map(ClbitId).collect();
        let marker = |role| Instruction::flow_marker(role, qubits.clone(), clbits.clone());

        // Build the scaffold over local wires; substitution maps them
        // positionally onto the node's operands.
        let mut scaffold = CircuitDag::new();
        for &q in &qubits {
            scaffold.add_qubit(q);
        }
        for &c in &clbits {
            scaffold.add_clbit(c);
        }
        let enter_local = scaffold.apply(marker(FlowMarkerRole::Enter))?;
        let mut branches_local = Vec::with_capacity(op.blocks.len());
        for _ in &op.blocks {
            let block_enter = scaffold.apply(marker(FlowMarkerRole::BlockEnter))?;
            let placeholder = scaffold.apply(marker(FlowMarkerRole::Placeholder))?;
            let block_exit = scaffold.apply(marker(FlowMarkerRole::BlockExit))?;
            branches_local.push((block_enter, placeholder, block_exit));
        }
        let exit_local = scaffold.apply(marker(FlowMarkerRole::Exit))?;

        let node_map = dag.substitute_node_with_dag(node, scaffold)?;
        let resolve = |local: NodeIndex| -> CompileResult<NodeIndex> {
            node_map.get(&local).copied().ok_or_else(|| {
                IrError::InvalidDag("scaffold node missing from substitution map".into()).into()
            })
        };

        // Fill every placeholder slot with its block's graph. Nested
        // control-flow nodes are spliced in as-is and lowered by a later
        // sweep of the fixpoint loop, at host level, where a nested loop may
        // legally grow the wire set with its condition bit.
        for (&(_, placeholder_local, _), block) in branches_local.iter().zip(&op.blocks) {
            let block_dag = block.to_dag()?;
            dag.substitute_node_with_dag(resolve(placeholder_local)?, block_dag)?;
        }

        let enter = resolve(enter_local)?;
        let exit = resolve(exit_local)?;

        // Collapse the branch scaffolding: each body hangs directly off the
        // shared entry and feeds the shared exit.
        for &(block_enter_local, _, _) in &branches_local {
            let block_enter = resolve(block_enter_local)?;
            let (_, outgoing) = dag.remove_node_collect(block_enter)?;
            for (succ, wire) in outgoing {
                dag.link(enter, succ, wire)?;
            }
        }
        for &(_, _, block_exit_local) in &branches_local {
            let block_exit = resolve(block_exit_local)?;
            let (incoming, _) = dag.remove_node_collect(block_exit)?;
            for (pred, wire) in incoming {
                dag.link(pred, exit, wire)?;
            }
        }

        if op.kind.is_loop() {
            self.attach_condition(dag, enter, &instruction.clbits)?;
        }

        debug!(kind = op.kind.name(), blocks = op.blocks.len(), "lowered control-flow node");
        Ok(())
    }

    /// Thread a condition re-evaluation node onto the loop's classical wires
    /// ahead of `enter`, with one fresh single-bit wire carrying the loop-back
    /// signal into the entry.
    fn attach_condition(
        &self,
        dag: &mut CircuitDag,
        enter: NodeIndex,
        loop_clbits: &[ClbitId],
    ) -> CompileResult<()> {
        let fresh = dag.next_clbit_id();
        dag.add_clbit(fresh);

        let mut cond_clbits = loop_clbits.to_vec();
        cond_clbits.push(fresh);
        let cond = dag.add_detached_op(Instruction::condition_eval(cond_clbits))?;

        for &clbit in loop_clbits {
            let wire = WireId::Clbit(clbit);
            let pred = dag
                .wire_pred(enter, wire)
                .ok_or_else(|| IrError::DanglingWire { wire: wire.to_string() })?;
            dag.unlink(pred, enter, wire)?;
            dag.link(pred, cond, wire)?;
            dag.link(cond, enter, wire)?;
        }

        let wire = WireId::Clbit(fresh);
        let input = dag
            .input_node(wire)
            .ok_or_else(|| IrError::DanglingWire { wire: wire.to_string() })?;
        let output = dag
            .output_node(wire)
            .ok_or_else(|| IrError::DanglingWire { wire: wire.to_string() })?;
        dag.unlink(input, output, wire)?;
        dag.link(input, cond, wire)?;
        dag.link(cond, enter, wire)?;
        dag.link(enter, output, wire)?;
        Ok(())
    }
}

impl Pass for ExpandControlFlow {
    fn name(&self) -> &str {
        "ExpandControlFlow"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, dag: &mut CircuitDag, _properties: &mut PropertySet) -> CompileResult<()> {
        self.expand(dag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rimfax_ir::{Block, Circuit, StandardGate};

    fn op_names(dag: &CircuitDag) -> Vec<String> {
        dag.topological_ops()
            .map(|(_, inst)| inst.name().to_string())
            .collect()
    }

    #[test]
    fn test_if_with_empty_alternative() {
        let mut consequent = Block::new(1, 1);
        consequent.push(Instruction::single_qubit_gate(StandardGate::X, QubitId(0)));

        let mut circuit = Circuit::with_size("branch", 1, 1);
        circuit
            .if_else(
                consequent,
                Some(Block::new(1, 1)),
                vec![QubitId(0)],
                vec![ClbitId(0)],
            )
            .unwrap();
        let mut dag = circuit.into_dag();

        let mut properties = PropertySet::default();
        ExpandControlFlow::new()
            .run(&mut dag, &mut properties)
            .unwrap();

        assert_eq!(op_names(&dag), vec!["enter", "x", "exit"]);
        assert!(dag.named_ops("placeholder").is_empty());
        assert!(dag.named_ops("block_enter").is_empty());
        assert!(dag.named_ops("block_exit").is_empty());
    }

    #[test]
    fn test_case_fans_out() {
        let mut first = Block::new(1, 1);
        first.push(Instruction::single_qubit_gate(StandardGate::X, QubitId(0)));
        let mut second = Block::new(1, 1);
        second.push(Instruction::single_qubit_gate(StandardGate::Y, QubitId(0)));

        let mut circuit = Circuit::with_size("case", 1, 1);
        circuit
            .case(
                vec![0, 1],
                vec![first, second],
                vec![QubitId(0)],
                vec![ClbitId(0)],
            )
            .unwrap();
        let mut dag = circuit.into_dag();

        let mut properties = PropertySet::default();
        ExpandControlFlow::new()
            .run(&mut dag, &mut properties)
            .unwrap();

        let names = op_names(&dag);
        assert_eq!(names.first().map(String::as_str), Some("enter"));
        assert_eq!(names.last().map(String::as_str), Some("exit"));
        assert!(names.contains(&"x".to_string()));
        assert!(names.contains(&"y".to_string()));

        // Both branch bodies hang directly off the shared entry.
        let enter = dag.named_ops("enter")[0];
        let branch_heads: Vec<&str> = dag
            .successors(enter)
            .into_iter()
            .filter_map(|n| dag.get_instruction(n).map(|i| i.name()))
            .collect();
        assert!(branch_heads.contains(&"x"));
        assert!(branch_heads.contains(&"y"));
    }

    #[test]
    fn test_while_loop_gets_condition_node() {
        let mut body = Block::new(1, 1);
        body.push(Instruction::single_qubit_gate(StandardGate::X, QubitId(0)));

        let mut circuit = Circuit::with_size("loop", 1, 1);
        circuit
            .while_loop(body, vec![QubitId(0)], vec![ClbitId(0)])
            .unwrap();
        let mut dag = circuit.into_dag();
        assert_eq!(dag.num_clbits(), 1);

        let mut properties = PropertySet::default();
        ExpandControlFlow::new()
            .run(&mut dag, &mut properties)
            .unwrap();

        // Condition node sits ahead of the entry, on a fresh classical wire.
        assert_eq!(op_names(&dag), vec!["condition", "enter", "x", "exit"]);
        assert_eq!(dag.num_clbits(), 2);

        let cond = dag.named_ops("condition")[0];
        let enter = dag.named_ops("enter")[0];
        assert!(dag.successors(cond).contains(&enter));
    }

    #[test]
    fn test_nested_control_flow_fully_flattened() {
        let mut inner = Block::new(1, 1);
        inner.push(Instruction::single_qubit_gate(StandardGate::X, QubitId(0)));
        let inner_op = rimfax_ir::ControlFlowOp::if_else(inner, None).unwrap();

        let mut outer = Block::new(1, 1);
        outer.push(Instruction::control_flow(
            inner_op,
            vec![QubitId(0)],
            vec![ClbitId(0)],
        ));

        let mut circuit = Circuit::with_size("nested", 1, 1);
        circuit
            .if_else(outer, None, vec![QubitId(0)], vec![ClbitId(0)])
            .unwrap();
        let mut dag = circuit.into_dag();

        let mut properties = PropertySet::default();
        ExpandControlFlow::new()
            .run(&mut dag, &mut properties)
            .unwrap();

        assert!(dag.topological_ops().all(|(_, inst)| !inst.is_control_flow()));
        assert_eq!(op_names(&dag), vec!["enter", "enter", "x", "exit", "exit"]);
    }

    #[test]
    fn test_loop_inside_branch_adds_condition_at_host_level() {
        let mut inner_body = Block::new(1, 1);
        inner_body.push(Instruction::single_qubit_gate(StandardGate::X, QubitId(0)));
        let inner = rimfax_ir::ControlFlowOp::while_loop(inner_body).unwrap();

        let mut outer = Block::new(1, 1);
        outer.push(Instruction::control_flow(
            inner,
            vec![QubitId(0)],
            vec![ClbitId(0)],
        ));

        let mut circuit = Circuit::with_size("nested", 1, 1);
        circuit
            .if_else(outer, None, vec![QubitId(0)], vec![ClbitId(0)])
            .unwrap();
        let mut dag = circuit.into_dag();

        let mut properties = PropertySet::default();
        ExpandControlFlow::new()
            .run(&mut dag, &mut properties)
            .unwrap();

        // The nested loop lowers once it sits in the host graph, so its
        // fresh condition wire lands there rather than inside a block sized
        // to the original width.
        assert!(dag.topological_ops().all(|(_, inst)| !inst.is_control_flow()));
        assert_eq!(dag.num_clbits(), 2);
        assert_eq!(dag.named_ops("condition").len(), 1);
        assert_eq!(dag.named_ops("enter").len(), 2);
        assert_eq!(dag.named_ops("exit").len(), 2);
    }
}
