//! Error types for the IR crate.

use crate::qubit::{ClbitId, QubitId};
use thiserror::Error;

/// Errors that can occur in IR operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IrError {
    /// Qubit not found in circuit.
    #[error("Qubit {qubit:?} not found in circuit{}", format_op_context(.op_name))]
    QubitNotFound {
        /// The qubit that was not found.
        qubit: QubitId,
        /// Optional operation name for context.
        op_name: Option<String>,
    },

    /// Classical bit not found in circuit.
    #[error("Classical bit {clbit:?} not found in circuit{}", format_op_context(.op_name))]
    ClbitNotFound {
        /// The classical bit that was not found.
        clbit: ClbitId,
        /// Optional operation name for context.
        op_name: Option<String>,
    },

    /// Operation arity does not match the wires it is applied to, or a
    /// replacement graph's boundary wire set does not match the node it
    /// replaces.
    #[error("Operation '{op_name}' expects {expected_qubits}q/{expected_clbits}c, got {got_qubits}q/{got_clbits}c")]
    ArityMismatch {
        /// Name of the operation.
        op_name: String,
        /// Expected number of qubits.
        expected_qubits: u32,
        /// Expected number of classical bits.
        expected_clbits: u32,
        /// Actual number of qubits provided.
        got_qubits: u32,
        /// Actual number of classical bits provided.
        got_clbits: u32,
    },

    /// A host edge references a wire the replacement graph does not carry.
    #[error("Edge on wire {wire} is not declared by the substituted node")]
    DanglingWire {
        /// Display form of the offending wire.
        wire: String,
    },

    /// Collapsing a block of nodes into one operation would create a cycle.
    #[error("Collapsing the node block would create a dependency cycle")]
    CycleDetected,

    /// A compound control-flow operation was built with no blocks.
    #[error("Control-flow operation '{0}' has an empty block list")]
    EmptyBlockList(String),

    /// Invalid DAG structure.
    #[error("Invalid DAG structure: {0}")]
    InvalidDag(String),

    /// Invalid node index.
    #[error("Invalid node index")]
    InvalidNode,

    /// Duplicate qubit in operation.
    #[error("Duplicate qubit {qubit:?} in operation{}", format_op_context(.op_name))]
    DuplicateQubit {
        /// The duplicate qubit.
        qubit: QubitId,
        /// Optional operation name for context.
        op_name: Option<String>,
    },
}

/// Helper function to format optional operation context.
#[allow(clippy::ref_option)]
fn format_op_context(op_name: &Option<String>) -> String {
    match op_name {
        Some(name) => format!(" (op: {name})"),
        None => String::new(),
    }
}

/// Result type for IR operations.
pub type IrResult<T> = Result<T, IrError>;
