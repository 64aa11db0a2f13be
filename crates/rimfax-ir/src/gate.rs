//! Quantum gate descriptors.
//!
//! Gate matrix semantics live outside this crate; the IR only carries names,
//! arity and parameters. The decoupling scheduler's identity check consumes
//! these descriptors through its own 2x2 unitary table.

use serde::{Deserialize, Serialize};

use crate::parameter::ParameterExpression;

/// Standard gates with known semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StandardGate {
    /// Identity gate.
    I,
    /// Pauli-X gate.
    X,
    /// Pauli-Y gate.
    Y,
    /// Pauli-Z gate.
    Z,
    /// Hadamard gate.
    H,
    /// S gate (sqrt(Z)).
    S,
    /// S-dagger gate.
    Sdg,
    /// T gate (fourth root of Z).
    T,
    /// T-dagger gate.
    Tdg,
    /// Rotation around X axis.
    Rx(ParameterExpression),
    /// Rotation around Y axis.
    Ry(ParameterExpression),
    /// Rotation around Z axis.
    Rz(ParameterExpression),
    /// Phase gate.
    P(ParameterExpression),
    /// Universal single-qubit gate U(θ, φ, λ).
    U(
        ParameterExpression,
        ParameterExpression,
        ParameterExpression,
    ),
    /// Controlled-X (CNOT) gate.
    CX,
    /// Controlled-Y gate.
    CY,
    /// Controlled-Z gate.
    CZ,
    /// SWAP gate.
    Swap,
    /// Toffoli gate (CCX).
    CCX,
}

impl StandardGate {
    /// Get the name of this gate.
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            StandardGate::I => "id",
            StandardGate::X => "x",
            StandardGate::Y => "y",
            StandardGate::Z => "z",
            StandardGate::H => "h",
            StandardGate::S => "s",
            StandardGate::Sdg => "sdg",
            StandardGate::T => "t",
            StandardGate::Tdg => "tdg",
            StandardGate::Rx(_) => "rx",
            StandardGate::Ry(_) => "ry",
            StandardGate::Rz(_) => "rz",
            StandardGate::P(_) => "p",
            StandardGate::U(_, _, _) => "u",
            StandardGate::CX => "cx",
            StandardGate::CY => "cy",
            StandardGate::CZ => "cz",
            StandardGate::Swap => "swap",
            StandardGate::CCX => "ccx",
        }
    }

    /// Get the number of qubits this gate operates on.
    #[inline]
    pub fn num_qubits(&self) -> u32 {
        match self {
            StandardGate::I
            | StandardGate::X
            | StandardGate::Y
            | StandardGate::Z
            | StandardGate::H
            | StandardGate::S
            | StandardGate::Sdg
            | StandardGate::T
            | StandardGate::Tdg
            | StandardGate::Rx(_)
            | StandardGate::Ry(_)
            | StandardGate::Rz(_)
            | StandardGate::P(_)
            | StandardGate::U(_, _, _) => 1,

            StandardGate::CX | StandardGate::CY | StandardGate::CZ | StandardGate::Swap => 2,

            StandardGate::CCX => 3,
        }
    }

    /// Check if this gate has unbound parameters.
    pub fn is_parameterized(&self) -> bool {
        self.parameters().iter().any(|p| p.is_symbolic())
    }

    /// Get parameters of this gate.
    pub fn parameters(&self) -> Vec<&ParameterExpression> {
        match self {
            StandardGate::Rx(p)
            | StandardGate::Ry(p)
            | StandardGate::Rz(p)
            | StandardGate::P(p) => vec![p],

            StandardGate::U(a, b, c) => vec![a, b, c],

            _ => vec![],
        }
    }

    /// Bind a symbol in every parameter, returning a new gate.
    pub fn bind(&self, name: &str, value: f64) -> Self {
        match self {
            StandardGate::Rx(p) => StandardGate::Rx(p.bind(name, value)),
            StandardGate::Ry(p) => StandardGate::Ry(p.bind(name, value)),
            StandardGate::Rz(p) => StandardGate::Rz(p.bind(name, value)),
            StandardGate::P(p) => StandardGate::P(p.bind(name, value)),
            StandardGate::U(a, b, c) => StandardGate::U(
                a.bind(name, value),
                b.bind(name, value),
                c.bind(name, value),
            ),
            other => other.clone(),
        }
    }
}

/// A user-defined gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomGate {
    /// Name of the gate.
    pub name: String,
    /// Number of qubits this gate acts on.
    pub num_qubits: u32,
    /// Parameters of the gate.
    pub params: Vec<ParameterExpression>,
}

impl CustomGate {
    /// Create a new custom gate.
    pub fn new(name: impl Into<String>, num_qubits: u32) -> Self {
        Self {
            name: name.into(),
            num_qubits,
            params: vec![],
        }
    }

    /// Create a new custom gate with parameters.
    pub fn with_params(
        name: impl Into<String>,
        num_qubits: u32,
        params: Vec<ParameterExpression>,
    ) -> Self {
        Self {
            name: name.into(),
            num_qubits,
            params,
        }
    }
}

/// A quantum gate, either standard or custom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Gate {
    /// A standard gate with known semantics.
    Standard(StandardGate),
    /// A custom user-defined gate.
    Custom(CustomGate),
}

impl Gate {
    /// Get the name of this gate.
    #[inline]
    pub fn name(&self) -> &str {
        match self {
            Gate::Standard(g) => g.name(),
            Gate::Custom(g) => &g.name,
        }
    }

    /// Get the number of qubits.
    #[inline]
    pub fn num_qubits(&self) -> u32 {
        match self {
            Gate::Standard(g) => g.num_qubits(),
            Gate::Custom(g) => g.num_qubits,
        }
    }

    /// Check if this gate has unbound parameters.
    pub fn is_parameterized(&self) -> bool {
        match self {
            Gate::Standard(g) => g.is_parameterized(),
            Gate::Custom(g) => g.params.iter().any(|p| p.is_symbolic()),
        }
    }

    /// Bind a symbol in every parameter, returning a new gate.
    pub fn bind(&self, name: &str, value: f64) -> Self {
        match self {
            Gate::Standard(g) => Gate::Standard(g.bind(name, value)),
            Gate::Custom(g) => Gate::Custom(CustomGate {
                name: g.name.clone(),
                num_qubits: g.num_qubits,
                params: g.params.iter().map(|p| p.bind(name, value)).collect(),
            }),
        }
    }
}

impl From<StandardGate> for Gate {
    fn from(g: StandardGate) -> Self {
        Gate::Standard(g)
    }
}

impl From<CustomGate> for Gate {
    fn from(g: CustomGate) -> Self {
        Gate::Custom(g)
    }
}
