//! Compile-time unrolling of bounded for-loops.

use rimfax_ir::{CircuitDag, ClbitId, ControlFlowKind, NodeIndex, ParameterExpression, QubitId};
use tracing::debug;

use crate::error::{CompileError, CompileResult};
use crate::pass::{Pass, PassKind};
use crate::property::PropertySet;

/// Replaces every for-loop node whose bounds are concrete integers with a
/// sequential concatenation of parameter-bound copies of its body.
///
/// Iteration follows half-open range semantics: the loop variable starts at
/// `start` and advances by `step` while strictly before `stop` (for negative
/// `step`, while strictly after). An empty range erases the loop node
/// entirely. Loops with symbolic bounds fail with
/// [`CompileError::NonIntegerBound`]; while-loops, if/else, and case nodes
/// are left untouched for the lowering pass.
#[derive(Debug, Default)]
pub struct UnrollLoops;

impl UnrollLoops {
    pub fn new() -> Self {
        Self
    }

    fn integer_bound(expr: &ParameterExpression, which: &str) -> CompileResult<i64> {
        expr.as_i64().ok_or_else(|| CompileError::NonIntegerBound {
            op_name: "for_loop".to_string(),
            reason: format!("{which} is not a concrete integer: {expr}"),
        })
    }

    fn unroll_node(&self, dag: &mut CircuitDag, node: NodeIndex) -> CompileResult<()> {
        let Some(instruction) = dag.get_instruction(node).cloned() else {
            return Ok(());
        };
        let Some(op) = instruction.control_flow_op() else {
            return Ok(());
        };
        let ControlFlowKind::ForLoop {
            start,
            stop,
            step,
            loop_parameter,
        } = &op.kind
        else {
            return Ok(());
        };

        let start = Self::integer_bound(start, "start")?;
        let stop = Self::integer_bound(stop, "stop")?;
        let step = Self::integer_bound(step, "step")?;
        if step == 0 {
            return Err(CompileError::NonIntegerBound {
                op_name: "for_loop".to_string(),
                reason: "step must be nonzero".to_string(),
            });
        }

        let body = &op.blocks[0];
        let mut unrolled = CircuitDag::new();
        for q in 0..body.num_qubits {
            unrolled.add_qubit(QubitId(q));
        }
        for c in 0..body.num_clbits {
            unrolled.add_clbit(ClbitId(c));
        }

        let mut iterations = 0usize;
        let mut value = start;
        while (step > 0 && value < stop) || (step < 0 && value > stop) {
            let stamped = match loop_parameter {
                Some(name) => body.bind(name, value as f64),
                None => body.clone(),
            };
            for inst in stamped.instructions {
                unrolled.apply(inst)?;
            }
            iterations += 1;
            value += step;
        }

        debug!(start, stop, step, iterations, "unrolled for-loop");
        dag.substitute_node_with_dag(node, unrolled)?;
        Ok(())
    }
}

impl Pass for UnrollLoops {
    fn name(&self) -> &str {
        "UnrollLoops"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, dag: &mut CircuitDag, _properties: &mut PropertySet) -> CompileResult<()> {
        // Unrolling a loop can surface for-loops that were nested in its
        // body, so iterate until none remain at the top level.
        loop {
            let targets = dag.named_ops("for_loop");
            if targets.is_empty() {
                return Ok(());
            }
            for node in targets {
                self.unroll_node(dag, node)?;
            }
        }
    }
}
