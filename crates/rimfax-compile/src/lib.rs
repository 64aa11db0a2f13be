//! Rimfax Structural Rewrite and Scheduling Framework
//!
//! This crate provides the pass-based rewrite layer that transforms circuit
//! DAGs built with `rimfax-ir`: compound control flow is flattened into the
//! plain graph, bounded loops are unrolled at compile time, and scheduled
//! idle windows are filled with decoupling sequences or merged into joint
//! multi-qubit delay blocks.
//!
//! # Architecture
//!
//! ```text
//! Input DAG
//!       │
//!       ▼
//! ┌─────────────┐
//! │ PassManager │ ◄── PropertySet (coupling map, durations, schedule)
//! └─────────────┘
//!       │
//!       ├── UnrollLoops
//!       ├── ExpandControlFlow
//!       ├── DynamicalDecoupling
//!       └── CombineAdjacentDelays
//!       │
//!       ▼
//! Output DAG
//! ```
//!
//! Passes communicate only through the DAG itself and the [`PropertySet`]
//! side table; the scheduling passes additionally consume per-node start
//! times and a total circuit duration produced by an external scheduler.
//!
//! # Example: Flattening control flow
//!
//! ```rust
//! use rimfax_compile::{PassManagerBuilder, PropertySet};
//! use rimfax_ir::{Block, Circuit, Instruction, QubitId, StandardGate};
//!
//! let mut body = Block::new(1, 0);
//! body.push(Instruction::single_qubit_gate(StandardGate::X, QubitId(0)));
//!
//! let mut circuit = Circuit::with_size("demo", 1, 0);
//! circuit
//!     .for_loop(0i64, 3i64, 1i64, None, body, vec![QubitId(0)], vec![])
//!     .unwrap();
//!
//! let (pm, mut props) = PassManagerBuilder::new().build();
//! let mut dag = circuit.into_dag();
//! pm.run(&mut dag, &mut props).unwrap();
//!
//! assert_eq!(dag.num_ops(), 3); // three stamped-out copies of the body
//! ```
//!
//! # Built-in Passes
//!
//! ## Control-flow passes
//! - [`passes::UnrollLoops`]: Stamp out statically-bounded for-loops
//! - [`passes::ExpandControlFlow`]: Splice remaining loop/branch nodes into
//!   marker-delimited regions of the flat graph
//!
//! ## Scheduling passes
//! - [`passes::DynamicalDecoupling`]: Fill multi-qubit idle windows with an
//!   echo sequence, offset between coupled qubits
//! - [`passes::CombineAdjacentDelays`]: Merge concurrently idle, physically
//!   adjacent qubits' delays into joint blocks
//!
//! # Custom Passes
//!
//! Implement the [`Pass`] trait to create custom compilation passes:
//!
//! ```rust
//! use rimfax_compile::{Pass, PassKind, CompileResult, PropertySet};
//! use rimfax_ir::CircuitDag;
//!
//! struct MyCustomPass;
//!
//! impl Pass for MyCustomPass {
//!     fn name(&self) -> &str { "my_custom_pass" }
//!     fn kind(&self) -> PassKind { PassKind::Transformation }
//!
//!     fn run(&self, dag: &mut CircuitDag, props: &mut PropertySet) -> CompileResult<()> {
//!         // Your pass logic here
//!         Ok(())
//!     }
//! }
//! ```

pub mod error;
pub mod manager;
pub mod pass;
pub mod property;
pub mod unitary;

// Built-in passes
pub mod passes;

pub use error::{CompileError, CompileResult};
pub use manager::{PassManager, PassManagerBuilder};
pub use pass::{Pass, PassKind};
pub use passes::{CombineAdjacentDelays, DynamicalDecoupling, ExpandControlFlow, UnrollLoops};
pub use property::{CouplingMap, InstructionDurations, PropertySet};
pub use unitary::Unitary2x2;
