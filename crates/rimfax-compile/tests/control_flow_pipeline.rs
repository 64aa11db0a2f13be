//! Integration tests for the control-flow flattening pipeline.
//!
//! These tests run unrolling and lowering together, the way the pass
//! manager sequences them, and verify that compound loop/branch nodes are
//! fully spliced into the flat graph with their bodies intact.

use rimfax_compile::PassManagerBuilder;
use rimfax_ir::{
    Block, Circuit, CircuitDag, ClbitId, Gate, Instruction, ParameterExpression, QubitId,
    StandardGate,
};

/// Helper: collect operation names in topological order.
fn op_names(dag: &CircuitDag) -> Vec<String> {
    dag.topological_ops()
        .map(|(_, inst)| inst.name().to_string())
        .collect()
}

/// Helper: count operations of a given name.
fn count_ops(dag: &CircuitDag, name: &str) -> usize {
    dag.topological_ops()
        .filter(|(_, inst)| inst.name() == name)
        .count()
}

// ============================================================================
// Test 1: Bounded loops unroll before lowering sees them
// ============================================================================

#[test]
fn test_bounded_loop_fully_unrolled() {
    let mut body = Block::new(2, 0);
    body.push(Instruction::single_qubit_gate(StandardGate::H, QubitId(0)));
    body.push(Instruction::two_qubit_gate(
        StandardGate::CX,
        QubitId(0),
        QubitId(1),
    ));

    let mut circuit = Circuit::with_size("repeat", 2, 0);
    circuit
        .for_loop(
            0i64,
            4i64,
            1i64,
            None,
            body,
            vec![QubitId(0), QubitId(1)],
            vec![],
        )
        .unwrap();

    let (pm, mut props) = PassManagerBuilder::new().build();
    let mut dag = circuit.into_dag();
    pm.run(&mut dag, &mut props).unwrap();

    assert_eq!(count_ops(&dag, "h"), 4);
    assert_eq!(count_ops(&dag, "cx"), 4);
    assert!(dag.named_ops("for_loop").is_empty());
    // Plain sequential bodies: the graph is still wire-continuous.
    dag.verify_integrity().unwrap();
}

#[test]
fn test_loop_parameter_bound_per_iteration() {
    let mut body = Block::new(1, 0);
    body.push(Instruction::single_qubit_gate(
        StandardGate::Rx(ParameterExpression::symbol("t")),
        QubitId(0),
    ));

    let mut circuit = Circuit::with_size("sweep", 1, 0);
    circuit
        .for_loop(1i64, 8i64, 3i64, Some("t"), body, vec![QubitId(0)], vec![])
        .unwrap();

    let (pm, mut props) = PassManagerBuilder::new().build();
    let mut dag = circuit.into_dag();
    pm.run(&mut dag, &mut props).unwrap();

    let angles: Vec<f64> = dag
        .topological_ops()
        .filter_map(|(_, inst)| match inst.as_gate() {
            Some(Gate::Standard(StandardGate::Rx(theta))) => theta.as_f64(),
            _ => None,
        })
        .collect();
    assert_eq!(angles, vec![1.0, 4.0, 7.0]);
}

// ============================================================================
// Test 2: Branches lower into a shared-entry/shared-exit diamond
// ============================================================================

#[test]
fn test_if_else_lowered_to_diamond() {
    let mut consequent = Block::new(1, 1);
    consequent.push(Instruction::single_qubit_gate(StandardGate::X, QubitId(0)));
    let mut alternative = Block::new(1, 1);
    alternative.push(Instruction::single_qubit_gate(StandardGate::Z, QubitId(0)));

    let mut circuit = Circuit::with_size("branch", 1, 1);
    circuit.h(QubitId(0)).unwrap();
    circuit.measure(QubitId(0), ClbitId(0)).unwrap();
    circuit
        .if_else(
            consequent,
            Some(alternative),
            vec![QubitId(0)],
            vec![ClbitId(0)],
        )
        .unwrap();

    let (pm, mut props) = PassManagerBuilder::new().build();
    let mut dag = circuit.into_dag();
    pm.run(&mut dag, &mut props).unwrap();

    assert!(dag.topological_ops().all(|(_, inst)| !inst.is_control_flow()));
    assert_eq!(count_ops(&dag, "enter"), 1);
    assert_eq!(count_ops(&dag, "exit"), 1);
    assert_eq!(count_ops(&dag, "x"), 1);
    assert_eq!(count_ops(&dag, "z"), 1);
    assert_eq!(count_ops(&dag, "placeholder"), 0);
    assert_eq!(count_ops(&dag, "block_enter"), 0);
    assert_eq!(count_ops(&dag, "block_exit"), 0);

    // Both branch bodies fan out of the single entry.
    let enter = dag.named_ops("enter")[0];
    let heads: Vec<String> = dag
        .successors(enter)
        .into_iter()
        .filter_map(|n| dag.get_instruction(n).map(|i| i.name().to_string()))
        .collect();
    assert!(heads.contains(&"x".to_string()));
    assert!(heads.contains(&"z".to_string()));
}

// ============================================================================
// Test 3: Loops that survive unrolling get a loop-back condition wire
// ============================================================================

#[test]
fn test_while_loop_lowering_adds_condition_wire() {
    let mut body = Block::new(1, 1);
    body.push(Instruction::single_qubit_gate(StandardGate::X, QubitId(0)));
    body.push(Instruction::measure(QubitId(0), ClbitId(0)));

    let mut circuit = Circuit::with_size("loop", 1, 1);
    circuit
        .while_loop(body, vec![QubitId(0)], vec![ClbitId(0)])
        .unwrap();

    let (pm, mut props) = PassManagerBuilder::new().build();
    let mut dag = circuit.into_dag();
    let clbits_before = dag.num_clbits();
    pm.run(&mut dag, &mut props).unwrap();

    assert_eq!(dag.num_clbits(), clbits_before + 1);
    assert_eq!(count_ops(&dag, "condition"), 1);

    // The condition feeds the entry on the fresh wire.
    let cond = dag.named_ops("condition")[0];
    let enter = dag.named_ops("enter")[0];
    assert!(dag.successors(cond).contains(&enter));
}

// ============================================================================
// Test 4: A loop nested in a branch is flattened in one pipeline run
// ============================================================================

#[test]
fn test_loop_nested_in_branch() {
    let mut inner_body = Block::new(1, 1);
    inner_body.push(Instruction::single_qubit_gate(StandardGate::H, QubitId(0)));
    let inner = rimfax_ir::ControlFlowOp::while_loop(inner_body).unwrap();

    let mut outer_body = Block::new(1, 1);
    outer_body.push(Instruction::control_flow(
        inner,
        vec![QubitId(0)],
        vec![ClbitId(0)],
    ));

    let mut circuit = Circuit::with_size("nested", 1, 1);
    circuit
        .if_else(outer_body, None, vec![QubitId(0)], vec![ClbitId(0)])
        .unwrap();

    let (pm, mut props) = PassManagerBuilder::new().build();
    let mut dag = circuit.into_dag();
    pm.run(&mut dag, &mut props).unwrap();

    assert!(dag.topological_ops().all(|(_, inst)| !inst.is_control_flow()));
    assert_eq!(count_ops(&dag, "enter"), 2);
    assert_eq!(count_ops(&dag, "exit"), 2);
    assert_eq!(count_ops(&dag, "condition"), 1);
    assert_eq!(count_ops(&dag, "h"), 1);
}

// ============================================================================
// Test 5: Case nodes lower one branch per label
// ============================================================================

#[test]
fn test_case_lowering_keeps_all_branches() {
    let gates = [StandardGate::X, StandardGate::Y, StandardGate::Z];
    let blocks: Vec<Block> = gates
        .iter()
        .map(|g| {
            let mut block = Block::new(1, 1);
            block.push(Instruction::single_qubit_gate(g.clone(), QubitId(0)));
            block
        })
        .collect();

    let mut circuit = Circuit::with_size("case", 1, 1);
    circuit
        .case(vec![0, 1, 2], blocks, vec![QubitId(0)], vec![ClbitId(0)])
        .unwrap();

    let (pm, mut props) = PassManagerBuilder::new().build();
    let mut dag = circuit.into_dag();
    pm.run(&mut dag, &mut props).unwrap();

    let names = op_names(&dag);
    for expected in ["x", "y", "z"] {
        assert!(names.contains(&expected.to_string()));
    }

    // Every branch body hangs directly off the shared entry. The empty
    // classical paths also collapse into direct enter-to-exit edges, so
    // exit is a fourth successor.
    let enter = dag.named_ops("enter")[0];
    let heads: Vec<String> = dag
        .successors(enter)
        .into_iter()
        .filter_map(|n| dag.get_instruction(n).map(|i| i.name().to_string()))
        .collect();
    for expected in ["x", "y", "z", "exit"] {
        assert!(heads.contains(&expected.to_string()));
    }
}

// ============================================================================
// Test 6: Symbolic loop bounds abort the pipeline with a typed error
// ============================================================================

#[test]
fn test_symbolic_bounds_surface_as_error() {
    let mut body = Block::new(1, 0);
    body.push(Instruction::single_qubit_gate(StandardGate::X, QubitId(0)));
    let op = rimfax_ir::ControlFlowOp::new(
        rimfax_ir::ControlFlowKind::ForLoop {
            start: ParameterExpression::constant(0.0),
            stop: ParameterExpression::symbol("n"),
            step: ParameterExpression::constant(1.0),
            loop_parameter: None,
        },
        vec![body],
    )
    .unwrap();

    let mut circuit = Circuit::with_size("open", 1, 0);
    circuit
        .dag_mut()
        .apply(Instruction::control_flow(op, vec![QubitId(0)], vec![]))
        .unwrap();

    let (pm, mut props) = PassManagerBuilder::new().build();
    let mut dag = circuit.into_dag();
    let err = pm.run(&mut dag, &mut props).unwrap_err();
    assert!(matches!(
        err,
        rimfax_compile::CompileError::NonIntegerBound { .. }
    ));
}
