//! Compound control-flow operation descriptors.
//!
//! A control-flow operation is a graph-of-graphs node: it owns an ordered
//! list of nested [`Block`]s, each a complete sub-circuit over the
//! operation's own boundary wires. Blocks are never aliased between two
//! parents; the lowering pass consumes them when it splices a construct into
//! the flat graph.

use serde::{Deserialize, Serialize};

use crate::dag::CircuitDag;
use crate::error::{IrError, IrResult};
use crate::instruction::Instruction;
use crate::parameter::ParameterExpression;
use crate::qubit::{ClbitId, QubitId};

/// An owned nested sub-circuit over local wires `0..num_qubits` /
/// `0..num_clbits`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Number of quantum wires the block spans.
    pub num_qubits: u32,
    /// Number of classical wires the block spans.
    pub num_clbits: u32,
    /// The block body, in application order.
    pub instructions: Vec<Instruction>,
}

impl Block {
    /// Create an empty block of the given width.
    pub fn new(num_qubits: u32, num_clbits: u32) -> Self {
        Self {
            num_qubits,
            num_clbits,
            instructions: vec![],
        }
    }

    /// Append an instruction to the block body.
    pub fn push(&mut self, instruction: Instruction) -> &mut Self {
        self.instructions.push(instruction);
        self
    }

    /// Bind a symbol in every instruction, returning a new block. Pure: the
    /// source block is untouched, so a loop body can be stamped out once per
    /// iteration value.
    pub fn bind(&self, name: &str, value: f64) -> Self {
        Self {
            num_qubits: self.num_qubits,
            num_clbits: self.num_clbits,
            instructions: self
                .instructions
                .iter()
                .map(|inst| inst.bind_parameter(name, value))
                .collect(),
        }
    }

    /// Check whether any instruction still carries an unbound parameter.
    pub fn is_parameterized(&self) -> bool {
        self.instructions.iter().any(|inst| match &inst.kind {
            crate::instruction::InstructionKind::Gate(g) => g.is_parameterized(),
            crate::instruction::InstructionKind::ControlFlow(op) => {
                op.blocks.iter().any(Block::is_parameterized)
            }
            _ => false,
        })
    }

    /// Convert the block into a standalone DAG over local wires.
    pub fn to_dag(&self) -> IrResult<CircuitDag> {
        let mut dag = CircuitDag::new();
        for q in 0..self.num_qubits {
            dag.add_qubit(QubitId(q));
        }
        for c in 0..self.num_clbits {
            dag.add_clbit(ClbitId(c));
        }
        for inst in &self.instructions {
            dag.apply(inst.clone())?;
        }
        Ok(dag)
    }
}

/// The control-flow construct a compound operation represents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ControlFlowKind {
    /// Bounded loop over an arithmetic progression of the loop parameter.
    ForLoop {
        /// First iteration value (inclusive).
        start: ParameterExpression,
        /// Stop bound (exclusive).
        stop: ParameterExpression,
        /// Step between iteration values.
        step: ParameterExpression,
        /// Name of the symbol bound to the iteration value in the body.
        loop_parameter: Option<String>,
    },
    /// Loop with a runtime condition; never unrolled at compile time.
    WhileLoop,
    /// Conditional with a consequent and an optional alternative.
    IfElse,
    /// Multi-way branch, one block per label.
    Case {
        /// Match labels, one per block.
        labels: Vec<i64>,
    },
}

impl ControlFlowKind {
    /// Get the construct's operation name.
    pub fn name(&self) -> &'static str {
        match self {
            ControlFlowKind::ForLoop { .. } => "for_loop",
            ControlFlowKind::WhileLoop => "while_loop",
            ControlFlowKind::IfElse => "if_else",
            ControlFlowKind::Case { .. } => "case",
        }
    }

    /// Whether the construct loops back on its condition after the body.
    pub fn is_loop(&self) -> bool {
        matches!(
            self,
            ControlFlowKind::ForLoop { .. } | ControlFlowKind::WhileLoop
        )
    }
}

/// A compound control-flow operation owning its nested blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlFlowOp {
    /// The construct this operation represents.
    pub kind: ControlFlowKind,
    /// The nested blocks, in construct order (for/while: body; if/else:
    /// consequent then alternative; case: one per label).
    pub blocks: Vec<Block>,
}

impl ControlFlowOp {
    /// Create a new control-flow operation.
    ///
    /// Fails with [`IrError::EmptyBlockList`] when no block is supplied,
    /// with [`IrError::ArityMismatch`] when the blocks disagree on width or
    /// the block count does not fit the construct (for/while take exactly
    /// one block, if/else one or two, case one per label).
    pub fn new(kind: ControlFlowKind, blocks: Vec<Block>) -> IrResult<Self> {
        if blocks.is_empty() {
            return Err(IrError::EmptyBlockList(kind.name().to_string()));
        }

        let expected_ok = match &kind {
            ControlFlowKind::ForLoop { .. } | ControlFlowKind::WhileLoop => blocks.len() == 1,
            ControlFlowKind::IfElse => blocks.len() <= 2,
            ControlFlowKind::Case { labels } => blocks.len() == labels.len(),
        };
        if !expected_ok {
            return Err(IrError::InvalidDag(format!(
                "{} does not take {} blocks",
                kind.name(),
                blocks.len()
            )));
        }

        let (nq, nc) = (blocks[0].num_qubits, blocks[0].num_clbits);
        for block in &blocks[1..] {
            if block.num_qubits != nq || block.num_clbits != nc {
                return Err(IrError::ArityMismatch {
                    op_name: kind.name().to_string(),
                    expected_qubits: nq,
                    expected_clbits: nc,
                    got_qubits: block.num_qubits,
                    got_clbits: block.num_clbits,
                });
            }
        }

        Ok(Self { kind, blocks })
    }

    /// Create a bounded for-loop with integer bounds.
    pub fn for_loop(
        start: i64,
        stop: i64,
        step: i64,
        loop_parameter: Option<&str>,
        body: Block,
    ) -> IrResult<Self> {
        Self::new(
            ControlFlowKind::ForLoop {
                start: start.into(),
                stop: stop.into(),
                step: step.into(),
                loop_parameter: loop_parameter.map(str::to_string),
            },
            vec![body],
        )
    }

    /// Create a while-loop.
    pub fn while_loop(body: Block) -> IrResult<Self> {
        Self::new(ControlFlowKind::WhileLoop, vec![body])
    }

    /// Create an if/else with an optional alternative.
    pub fn if_else(consequent: Block, alternative: Option<Block>) -> IrResult<Self> {
        let mut blocks = vec![consequent];
        blocks.extend(alternative);
        Self::new(ControlFlowKind::IfElse, blocks)
    }

    /// Create a case construct with one block per label.
    pub fn case(labels: Vec<i64>, blocks: Vec<Block>) -> IrResult<Self> {
        Self::new(ControlFlowKind::Case { labels }, blocks)
    }

    /// Get the operation name.
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Number of quantum wires the operation spans.
    pub fn num_qubits(&self) -> u32 {
        self.blocks[0].num_qubits
    }

    /// Number of classical wires the operation spans.
    pub fn num_clbits(&self) -> u32 {
        self.blocks[0].num_clbits
    }

    /// Bind a symbol across all nested blocks (but not the loop bounds),
    /// returning a new operation.
    pub fn bind(&self, name: &str, value: f64) -> Self {
        Self {
            kind: self.kind.clone(),
            blocks: self.blocks.iter().map(|b| b.bind(name, value)).collect(),
        }
    }
}
