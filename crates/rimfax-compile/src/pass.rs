//! Pass trait and types for compilation passes.

use rimfax_ir::CircuitDag;

use crate::error::CompileResult;
use crate::property::PropertySet;

/// The kind of compilation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    /// Analysis pass that reads but does not modify the DAG.
    Analysis,
    /// Transformation pass that modifies the DAG.
    Transformation,
}

/// A compilation pass that operates on a circuit DAG.
///
/// Passes are the fundamental unit of compilation in Rimfax. Each pass
/// performs a specific transformation or analysis on the circuit.
pub trait Pass: Send + Sync {
    /// Get the name of this pass.
    fn name(&self) -> &str;

    /// Get the kind of this pass.
    fn kind(&self) -> PassKind;

    /// Run the pass on the given DAG.
    ///
    /// For analysis passes, this should not modify the DAG but may
    /// write to the `PropertySet`.
    ///
    /// For transformation passes, this modifies the DAG and may read
    /// from or update the `PropertySet` (e.g. rebuilding start times
    /// after the graph is reconstructed).
    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()>;

    /// Check if this pass should run based on current state.
    ///
    /// This can be overridden to skip passes that are not needed.
    fn should_run(&self, _dag: &CircuitDag, _properties: &PropertySet) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestPass;

    impl Pass for TestPass {
        fn name(&self) -> &'static str {
            "test"
        }

        fn kind(&self) -> PassKind {
            PassKind::Transformation
        }

        fn run(&self, _dag: &mut CircuitDag, _properties: &mut PropertySet) -> CompileResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_pass_kind() {
        let pass = TestPass;
        assert_eq!(pass.kind(), PassKind::Transformation);
        assert_eq!(pass.name(), "test");
    }
}
