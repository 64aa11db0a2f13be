//! Rimfax Circuit Intermediate Representation
//!
//! This crate provides the core data structures for representing quantum circuits
//! in Rimfax. It forms the foundation of the entire Rimfax compilation stack.
//!
//! # Overview
//!
//! The circuit IR uses a DAG (Directed Acyclic Graph) representation internally,
//! which enables efficient compilation and structural rewrite passes. The
//! high-level [`Circuit`] API provides a convenient builder pattern for
//! constructing circuits, including structured control flow.
//!
//! # Core Components
//!
//! - **Qubits and Classical Bits**: [`QubitId`], [`ClbitId`] for addressing quantum
//!   and classical registers
//! - **Gates**: [`StandardGate`] for built-in gates (H, X, CX, etc.) and [`CustomGate`]
//!   for user-defined operations
//! - **Parameters**: [`ParameterExpression`] for symbolic parameters such as loop variables
//! - **Instructions**: [`Instruction`] combining operations with their operands
//! - **Control flow**: [`ControlFlowOp`] compound operations owning nested [`Block`]s
//! - **DAG**: [`CircuitDag`] for the internal graph representation, including
//!   graph surgery primitives used by rewrite passes
//! - **Circuit**: [`Circuit`] high-level builder API
//!
//! # Example: Building a Bell State
//!
//! ```rust
//! use rimfax_ir::{Circuit, QubitId};
//!
//! // Create a new circuit with 2 qubits and 2 classical bits
//! let mut circuit = Circuit::with_size("bell_state", 2, 2);
//!
//! // Build the Bell state: |00⟩ → (|00⟩ + |11⟩)/√2
//! circuit.h(QubitId(0)).unwrap();
//! circuit.cx(QubitId(0), QubitId(1)).unwrap();
//!
//! // Add measurement
//! circuit.measure_all().unwrap();
//!
//! assert_eq!(circuit.num_qubits(), 2);
//! assert!(circuit.depth() >= 2);  // H, CX, measure
//! ```
//!
//! # Example: A Bounded Loop
//!
//! ```rust
//! use rimfax_ir::{Block, Circuit, Instruction, QubitId, StandardGate};
//!
//! let mut body = Block::new(1, 0);
//! body.push(Instruction::single_qubit_gate(StandardGate::X, QubitId(0)));
//!
//! let mut circuit = Circuit::with_size("looped", 1, 0);
//! circuit
//!     .for_loop(0i64, 4i64, 1i64, None, body, [QubitId(0)], [])
//!     .unwrap();
//!
//! assert_eq!(circuit.dag().named_ops("for_loop").len(), 1);
//! ```

pub mod circuit;
pub mod control_flow;
pub mod dag;
pub mod error;
pub mod gate;
pub mod instruction;
pub mod parameter;
pub mod qubit;

pub use circuit::Circuit;
pub use control_flow::{Block, ControlFlowKind, ControlFlowOp};
pub use dag::{CircuitDag, CircuitLevel, DagEdge, DagNode, NodeIndex, WireId};
pub use error::{IrError, IrResult};
pub use gate::{CustomGate, Gate, StandardGate};
pub use instruction::{FlowMarkerRole, Instruction, InstructionKind};
pub use parameter::ParameterExpression;
pub use qubit::{Clbit, ClbitId, Qubit, QubitId, RegisterSlot};
