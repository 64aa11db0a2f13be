//! Unitary matrix utilities for sequence validation.
//!
//! Provides 2x2 unitary matrix operations used to check that a decoupling
//! sequence composes to the identity, and to extract the global phase it
//! leaves behind.

use num_complex::Complex64;
use rimfax_ir::{Gate, StandardGate};
use std::f64::consts::PI;

/// Tolerance for floating point comparisons.
const EPSILON: f64 = 1e-10;

/// A 2x2 unitary matrix in row-major order.
#[derive(Debug, Clone, Copy)]
pub struct Unitary2x2 {
    /// The matrix elements in row-major order: [[a, b], [c, d]].
    pub data: [Complex64; 4],
}

impl Unitary2x2 {
    /// Create a new 2x2 unitary matrix.
    pub fn new(a: Complex64, b: Complex64, c: Complex64, d: Complex64) -> Self {
        Self { data: [a, b, c, d] }
    }

    /// Create the identity matrix.
    pub fn identity() -> Self {
        Self::new(
            Complex64::new(1.0, 0.0),
            Complex64::new(0.0, 0.0),
            Complex64::new(0.0, 0.0),
            Complex64::new(1.0, 0.0),
        )
    }

    /// Create a Hadamard matrix.
    pub fn h() -> Self {
        let s = 1.0 / 2.0_f64.sqrt();
        Self::new(
            Complex64::new(s, 0.0),
            Complex64::new(s, 0.0),
            Complex64::new(s, 0.0),
            Complex64::new(-s, 0.0),
        )
    }

    /// Create a Pauli-X matrix.
    pub fn x() -> Self {
        Self::new(
            Complex64::new(0.0, 0.0),
            Complex64::new(1.0, 0.0),
            Complex64::new(1.0, 0.0),
            Complex64::new(0.0, 0.0),
        )
    }

    /// Create a Pauli-Y matrix.
    pub fn y() -> Self {
        Self::new(
            Complex64::new(0.0, 0.0),
            Complex64::new(0.0, -1.0),
            Complex64::new(0.0, 1.0),
            Complex64::new(0.0, 0.0),
        )
    }

    /// Create a Pauli-Z matrix.
    pub fn z() -> Self {
        Self::new(
            Complex64::new(1.0, 0.0),
            Complex64::new(0.0, 0.0),
            Complex64::new(0.0, 0.0),
            Complex64::new(-1.0, 0.0),
        )
    }

    /// Create an S gate (sqrt(Z)).
    pub fn s() -> Self {
        Self::new(
            Complex64::new(1.0, 0.0),
            Complex64::new(0.0, 0.0),
            Complex64::new(0.0, 0.0),
            Complex64::new(0.0, 1.0),
        )
    }

    /// Create an S-dagger gate.
    pub fn sdg() -> Self {
        Self::new(
            Complex64::new(1.0, 0.0),
            Complex64::new(0.0, 0.0),
            Complex64::new(0.0, 0.0),
            Complex64::new(0.0, -1.0),
        )
    }

    /// Create a T gate (fourth root of Z).
    pub fn t() -> Self {
        let phase = Complex64::from_polar(1.0, PI / 4.0);
        Self::new(
            Complex64::new(1.0, 0.0),
            Complex64::new(0.0, 0.0),
            Complex64::new(0.0, 0.0),
            phase,
        )
    }

    /// Create a T-dagger gate.
    pub fn tdg() -> Self {
        let phase = Complex64::from_polar(1.0, -PI / 4.0);
        Self::new(
            Complex64::new(1.0, 0.0),
            Complex64::new(0.0, 0.0),
            Complex64::new(0.0, 0.0),
            phase,
        )
    }

    /// Create an RX rotation matrix.
    pub fn rx(theta: f64) -> Self {
        let c = (theta / 2.0).cos();
        let s = (theta / 2.0).sin();
        Self::new(
            Complex64::new(c, 0.0),
            Complex64::new(0.0, -s),
            Complex64::new(0.0, -s),
            Complex64::new(c, 0.0),
        )
    }

    /// Create an RY rotation matrix.
    pub fn ry(theta: f64) -> Self {
        let c = (theta / 2.0).cos();
        let s = (theta / 2.0).sin();
        Self::new(
            Complex64::new(c, 0.0),
            Complex64::new(-s, 0.0),
            Complex64::new(s, 0.0),
            Complex64::new(c, 0.0),
        )
    }

    /// Create an RZ rotation matrix.
    pub fn rz(theta: f64) -> Self {
        let exp_neg = Complex64::from_polar(1.0, -theta / 2.0);
        let exp_pos = Complex64::from_polar(1.0, theta / 2.0);
        Self::new(
            exp_neg,
            Complex64::new(0.0, 0.0),
            Complex64::new(0.0, 0.0),
            exp_pos,
        )
    }

    /// Create a phase gate P(lambda).
    pub fn p(lambda: f64) -> Self {
        let phase = Complex64::from_polar(1.0, lambda);
        Self::new(
            Complex64::new(1.0, 0.0),
            Complex64::new(0.0, 0.0),
            Complex64::new(0.0, 0.0),
            phase,
        )
    }

    /// Create a U gate U(theta, phi, lambda).
    pub fn u(theta: f64, phi: f64, lambda: f64) -> Self {
        let c = (theta / 2.0).cos();
        let s = (theta / 2.0).sin();
        Self::new(
            Complex64::new(c, 0.0),
            -Complex64::from_polar(s, lambda),
            Complex64::from_polar(s, phi),
            Complex64::from_polar(c, phi + lambda),
        )
    }

    /// Build the matrix of a single-qubit gate, if it has one and all its
    /// parameters are bound.
    pub fn from_gate(gate: &Gate) -> Option<Self> {
        let Gate::Standard(standard) = gate else {
            return None;
        };
        let unitary = match standard {
            StandardGate::I => Self::identity(),
            StandardGate::X => Self::x(),
            StandardGate::Y => Self::y(),
            StandardGate::Z => Self::z(),
            StandardGate::H => Self::h(),
            StandardGate::S => Self::s(),
            StandardGate::Sdg => Self::sdg(),
            StandardGate::T => Self::t(),
            StandardGate::Tdg => Self::tdg(),
            StandardGate::Rx(theta) => Self::rx(theta.as_f64()?),
            StandardGate::Ry(theta) => Self::ry(theta.as_f64()?),
            StandardGate::Rz(theta) => Self::rz(theta.as_f64()?),
            StandardGate::P(lambda) => Self::p(lambda.as_f64()?),
            StandardGate::U(theta, phi, lambda) => {
                Self::u(theta.as_f64()?, phi.as_f64()?, lambda.as_f64()?)
            }
            _ => return None,
        };
        Some(unitary)
    }

    /// Multiply this matrix by another: self * other.
    #[allow(clippy::many_single_char_names)]
    pub fn mul(&self, other: &Self) -> Self {
        let [a, b, c, d] = self.data;
        let [e, f, g, h] = other.data;
        Self::new(a * e + b * g, a * f + b * h, c * e + d * g, c * f + d * h)
    }

    /// Check if this is approximately identity (up to global phase).
    pub fn is_identity(&self) -> bool {
        // Check if diagonal and equal (up to global phase)
        let [a, b, c, d] = self.data;

        // Off-diagonal should be zero
        if b.norm() > EPSILON || c.norm() > EPSILON {
            return false;
        }

        // Diagonal elements should be equal
        (a - d).norm() < EPSILON
    }

    /// The phase angle of the (0,0) element; for a matrix that is identity
    /// up to global phase, this is that phase.
    pub fn phase_angle(&self) -> f64 {
        self.data[0].arg()
    }
}

/// Wrap an angle into the interval (-π, π].
pub fn mod_2pi(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(2.0 * PI) - PI;
    if (wrapped + PI).abs() < EPSILON {
        PI
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pauli_products() {
        // X * X = I
        let xx = Unitary2x2::x().mul(&Unitary2x2::x());
        assert!(xx.is_identity());
        assert!(xx.phase_angle().abs() < EPSILON);

        // X * Z * X * Z = -I
        let xzxz = Unitary2x2::x()
            .mul(&Unitary2x2::z())
            .mul(&Unitary2x2::x())
            .mul(&Unitary2x2::z());
        assert!(xzxz.is_identity());
        assert!((xzxz.phase_angle().abs() - PI).abs() < EPSILON);
    }

    #[test]
    fn test_x_rz_echo_is_identity() {
        // The default decoupling sequence: X, RZ(π), X, RZ(-π).
        let seq = Unitary2x2::identity()
            .mul(&Unitary2x2::x())
            .mul(&Unitary2x2::rz(PI))
            .mul(&Unitary2x2::x())
            .mul(&Unitary2x2::rz(-PI));
        assert!(seq.is_identity());
    }

    #[test]
    fn test_hadamard_not_identity() {
        assert!(!Unitary2x2::h().is_identity());
    }

    #[test]
    fn test_from_gate_requires_bound_params() {
        use rimfax_ir::ParameterExpression;

        let bound = Gate::Standard(StandardGate::Rz(ParameterExpression::constant(1.0)));
        assert!(Unitary2x2::from_gate(&bound).is_some());

        let symbolic = Gate::Standard(StandardGate::Rz(ParameterExpression::symbol("theta")));
        assert!(Unitary2x2::from_gate(&symbolic).is_none());
    }

    #[test]
    fn test_mod_2pi() {
        assert!((mod_2pi(0.0)).abs() < EPSILON);
        assert!((mod_2pi(2.0 * PI)).abs() < EPSILON);
        assert!((mod_2pi(3.0 * PI) - PI).abs() < EPSILON);
        // Both endpoints of the branch cut map to the +π representative.
        assert!((mod_2pi(PI) - PI).abs() < EPSILON);
        assert!((mod_2pi(-PI) - PI).abs() < EPSILON);
    }
}
