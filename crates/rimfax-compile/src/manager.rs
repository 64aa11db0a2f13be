//! Pass manager for orchestrating compilation.

use tracing::{debug, info, instrument};

use rimfax_ir::CircuitDag;

use crate::error::CompileResult;
use crate::pass::Pass;
use crate::passes::{CombineAdjacentDelays, ExpandControlFlow, UnrollLoops};
use crate::property::{CouplingMap, InstructionDurations, PropertySet};

/// Manages and executes a sequence of compilation passes.
pub struct PassManager {
    /// The passes to execute, in order.
    passes: Vec<Box<dyn Pass>>,
}

impl PassManager {
    /// Create a new empty pass manager.
    pub fn new() -> Self {
        Self { passes: vec![] }
    }

    /// Add a pass to the manager.
    pub fn add_pass(&mut self, pass: impl Pass + 'static) {
        self.passes.push(Box::new(pass));
    }

    /// Run all passes on the given DAG.
    #[instrument(skip(self, dag, properties))]
    pub fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()> {
        info!(
            "Running pass manager with {} passes on circuit with {} qubits",
            self.passes.len(),
            dag.num_qubits()
        );

        for pass in &self.passes {
            if pass.should_run(dag, properties) {
                debug!("Running pass: {}", pass.name());
                pass.run(dag, properties)?;
                // Avoid calling dag.depth() here — it performs a full topological
                // sort (O(V+E)) on every pass and is only used for debug logging.
                debug!("Pass {} completed, ops: {}", pass.name(), dag.num_ops());
            } else {
                debug!("Skipping pass: {}", pass.name());
            }
        }

        info!("Pass manager completed, ops: {}", dag.num_ops());

        Ok(())
    }

    /// Get the number of passes.
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    /// Check if the manager has no passes.
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }
}

impl Default for PassManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating pass managers with preset configurations.
pub struct PassManagerBuilder {
    /// Target properties.
    properties: PropertySet,
}

impl PassManagerBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            properties: PropertySet::new(),
        }
    }

    /// Set the target properties.
    #[must_use]
    pub fn with_properties(mut self, properties: PropertySet) -> Self {
        self.properties = properties;
        self
    }

    /// Set the target coupling map and instruction durations.
    #[must_use]
    pub fn with_target(
        mut self,
        coupling_map: CouplingMap,
        durations: InstructionDurations,
    ) -> Self {
        self.properties.coupling_map = Some(coupling_map);
        self.properties.durations = Some(durations);
        self
    }

    /// Build the pass manager and return it with the properties.
    ///
    /// The structural passes always run; delay merging is added when a
    /// coupling map is available. Decoupling insertion needs a per-target
    /// sequence configuration, so it is added explicitly by the caller.
    pub fn build(self) -> (PassManager, PropertySet) {
        let mut pm = PassManager::new();

        pm.add_pass(UnrollLoops::new());
        pm.add_pass(ExpandControlFlow::new());

        if self.properties.coupling_map.is_some() {
            pm.add_pass(CombineAdjacentDelays::new());
        }

        (pm, self.properties)
    }
}

impl Default for PassManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rimfax_ir::{Circuit, QubitId};

    #[test]
    fn test_empty_pass_manager() {
        let pm = PassManager::new();
        assert!(pm.is_empty());
        assert_eq!(pm.len(), 0);
    }

    #[test]
    fn test_pass_manager_run() {
        let pm = PassManager::new();
        let mut props = PropertySet::new();

        let mut circuit = Circuit::with_size("test", 2, 0);
        circuit.h(QubitId(0)).unwrap();
        circuit.cx(QubitId(0), QubitId(1)).unwrap();

        let mut dag = circuit.into_dag();
        pm.run(&mut dag, &mut props).unwrap();

        assert_eq!(dag.num_ops(), 2);
    }

    #[test]
    fn test_pass_manager_builder() {
        let mut durations = InstructionDurations::new();
        durations.insert_default("x", 160);

        let (pm, props) = PassManagerBuilder::new()
            .with_target(CouplingMap::linear(5), durations)
            .build();

        assert_eq!(pm.len(), 3);
        assert!(props.coupling_map.is_some());
        assert!(props.durations.is_some());
    }
}
