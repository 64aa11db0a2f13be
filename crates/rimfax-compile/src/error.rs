//! Error types for compilation passes.

use rimfax_ir::IrError;
use thiserror::Error;

/// Errors that can occur during compilation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CompileError {
    /// An underlying IR operation failed.
    #[error(transparent)]
    Ir(#[from] IrError),

    /// A loop bound could not be resolved to an integer, or the stride is
    /// zero or symbolic.
    #[error("Cannot unroll '{op_name}': {reason}")]
    NonIntegerBound {
        /// Name of the loop operation.
        op_name: String,
        /// Why the bounds are unusable.
        reason: String,
    },

    /// A scheduling pass ran on a circuit without timing information.
    #[error("Pass '{0}' requires a scheduled circuit")]
    NotScheduled(String),

    /// A scheduling pass ran on a circuit that is not mapped to physical
    /// qubits.
    #[error("Pass '{0}' runs on physical circuits only")]
    NotPhysical(String),

    /// A decoupling sequence has the wrong shape.
    #[error("Invalid decoupling sequence: {0}")]
    InvalidSequence(String),

    /// A decoupling sequence does not compose to the identity.
    #[error("The decoupling sequence does not make an identity operation")]
    NonIdentitySequence,

    /// No duration is known for an instruction on a qubit.
    #[error("No duration for '{name}' on qubit {qubit}")]
    UnknownDuration {
        /// Instruction name.
        name: String,
        /// Physical qubit index.
        qubit: u32,
    },

    /// Two physical qubits have no path in the coupling map.
    #[error("Qubits {0} and {1} are not connected in the coupling map")]
    Unreachable(u32, u32),

    /// A delay interval ended without a matching open interval.
    #[error("Delay interval ending at t={time} has no open interval on qubit {qubit}")]
    UnmatchedDelayEnd {
        /// Event time.
        time: u64,
        /// Physical qubit index of the ending delay.
        qubit: u32,
    },

    /// A required property is missing from the property set.
    #[error("Pass '{pass}' requires property '{property}'")]
    MissingProperty {
        /// Name of the pass.
        pass: String,
        /// Name of the missing property.
        property: String,
    },
}

/// Result type for compilation operations.
pub type CompileResult<T> = Result<T, CompileError>;
