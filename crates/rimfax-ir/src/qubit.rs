//! Wire identity types.
//!
//! Quantum and classical bits are addressed by dense `u32` ids; register
//! membership is optional naming sugar for the front end and never affects
//! graph identity.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! bit_id {
    ($(#[$attr:meta])* $name:ident, $prefix:literal) => {
        $(#[$attr])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

bit_id!(
    /// Unique identifier for a qubit within a circuit.
    ///
    /// At [`CircuitLevel::Physical`](crate::dag::CircuitLevel::Physical) the
    /// inner index doubles as the position in the hardware coupling graph.
    QubitId,
    "q"
);

bit_id!(
    /// Unique identifier for a classical bit within a circuit.
    ClbitId,
    "c"
);

/// The named register slot a bit was allocated from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegisterSlot {
    /// Register name.
    pub name: String,
    /// Position within the register.
    pub index: u32,
}

impl fmt::Display for RegisterSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.name, self.index)
    }
}

/// A quantum bit with optional register membership.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Qubit {
    /// The unique identifier.
    pub id: QubitId,
    /// Register membership, if allocated through a register.
    pub register: Option<RegisterSlot>,
}

impl Qubit {
    /// Create a new qubit with just an id.
    pub fn new(id: QubitId) -> Self {
        Self { id, register: None }
    }

    /// Create a new qubit with register membership.
    pub fn with_register(id: QubitId, register: impl Into<String>, index: u32) -> Self {
        Self {
            id,
            register: Some(RegisterSlot {
                name: register.into(),
                index,
            }),
        }
    }
}

impl fmt::Display for Qubit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.register {
            Some(slot) => slot.fmt(f),
            None => self.id.fmt(f),
        }
    }
}

/// A classical bit with optional register membership.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Clbit {
    /// The unique identifier.
    pub id: ClbitId,
    /// Register membership, if allocated through a register.
    pub register: Option<RegisterSlot>,
}

impl Clbit {
    /// Create a new classical bit with just an id.
    pub fn new(id: ClbitId) -> Self {
        Self { id, register: None }
    }

    /// Create a new classical bit with register membership.
    pub fn with_register(id: ClbitId, register: impl Into<String>, index: u32) -> Self {
        Self {
            id,
            register: Some(RegisterSlot {
                name: register.into(),
                index,
            }),
        }
    }
}

impl fmt::Display for Clbit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.register {
            Some(slot) => slot.fmt(f),
            None => self.id.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qubit_display() {
        let q = Qubit::new(QubitId(0));
        assert_eq!(format!("{q}"), "q0");

        let q_reg = Qubit::with_register(QubitId(1), "qr", 0);
        assert_eq!(format!("{q_reg}"), "qr[0]");
    }

    #[test]
    fn test_clbit_display() {
        let c = Clbit::new(ClbitId(0));
        assert_eq!(format!("{c}"), "c0");

        let c_reg = Clbit::with_register(ClbitId(1), "cr", 0);
        assert_eq!(format!("{c_reg}"), "cr[0]");
    }

    #[test]
    fn test_register_slot_carries_name_and_index() {
        let q = Qubit::with_register(QubitId(3), "data", 2);
        let slot = q.register.unwrap();
        assert_eq!(slot.name, "data");
        assert_eq!(slot.index, 2);
    }
}
