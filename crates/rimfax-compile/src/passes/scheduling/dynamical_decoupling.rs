//! Dynamical decoupling insertion on multi-qubit idle windows.

use rimfax_ir::{CircuitDag, CircuitLevel, Gate, Instruction, StandardGate};
use std::f64::consts::PI;
use tracing::debug;

use crate::error::{CompileError, CompileResult};
use crate::pass::{Pass, PassKind};
use crate::property::{CouplingMap, InstructionDurations, PropertySet};
use crate::unitary::{Unitary2x2, mod_2pi};

/// Fills multi-qubit delay windows with a decoupling pulse sequence.
///
/// The sequence must be an even-length list of single-qubit gates (or a
/// single gate) whose matrix product is the identity up to a global phase;
/// that residual phase accumulates into the circuit's global phase each time
/// the sequence is inserted. Physically adjacent qubits get offset pulse
/// placements, chosen by greedily 2-coloring the coupling map restricted to
/// the delay's qubits. When no proper 2-coloring exists the greedy colors
/// stand and timing conflicts between neighbors are accepted.
///
/// Free time around the pulses is quantized down to the pulse-alignment
/// granularity; the rounding remainder lands in the middle gap so the filled
/// window exactly equals the original delay duration.
#[derive(Debug)]
pub struct DynamicalDecoupling {
    sequence: Vec<StandardGate>,
    sequence_gphase: f64,
    skip_reset_qubits: bool,
    pulse_alignment: u64,
    skip_threshold: f64,
}

impl Default for DynamicalDecoupling {
    fn default() -> Self {
        Self::new()
    }
}

impl DynamicalDecoupling {
    /// Create the pass with the default echo sequence X, RZ(π), X, RZ(−π).
    pub fn new() -> Self {
        // X·RZ(π)·X·RZ(−π) = −I, leaving a global phase of π per insertion.
        Self {
            sequence: vec![
                StandardGate::X,
                StandardGate::Rz(PI.into()),
                StandardGate::X,
                StandardGate::Rz((-PI).into()),
            ],
            sequence_gphase: PI,
            skip_reset_qubits: true,
            pulse_alignment: 1,
            skip_threshold: 1.0,
        }
    }

    /// Create the pass with a custom decoupling sequence.
    ///
    /// Fails with [`CompileError::InvalidSequence`] for an odd-length
    /// sequence other than a single gate, and with
    /// [`CompileError::NonIdentitySequence`] when the product is not
    /// proportional to the identity.
    pub fn with_sequence(sequence: Vec<StandardGate>) -> CompileResult<Self> {
        let sequence_gphase = Self::validate_sequence(&sequence)?;
        Ok(Self {
            sequence,
            sequence_gphase,
            ..Self::new()
        })
    }

    /// Timing-grid granularity for inserted delays.
    pub fn pulse_alignment(mut self, alignment: u64) -> Self {
        self.pulse_alignment = alignment.max(1);
        self
    }

    /// Fraction of the idle window the sequence may consume before insertion
    /// is abandoned; 1 always inserts when the sequence fits at all.
    pub fn skip_threshold(mut self, threshold: f64) -> Self {
        self.skip_threshold = threshold;
        self
    }

    /// Whether idle windows immediately following a reset or the circuit
    /// start are left untouched.
    pub fn skip_reset_qubits(mut self, skip: bool) -> Self {
        self.skip_reset_qubits = skip;
        self
    }

    fn validate_sequence(sequence: &[StandardGate]) -> CompileResult<f64> {
        if sequence.is_empty() {
            return Err(CompileError::InvalidSequence(
                "decoupling sequence is empty".to_string(),
            ));
        }
        if sequence.len() == 1 {
            return Ok(0.0);
        }
        if sequence.len() % 2 != 0 {
            return Err(CompileError::InvalidSequence(
                "decoupling sequence must contain an even number of gates (or exactly one)"
                    .to_string(),
            ));
        }
        let mut product = Unitary2x2::identity();
        for gate in sequence {
            let unitary = Unitary2x2::from_gate(&Gate::Standard(gate.clone())).ok_or_else(|| {
                CompileError::InvalidSequence(format!(
                    "no single-qubit matrix for gate '{}'",
                    gate.name()
                ))
            })?;
            product = product.mul(&unitary);
        }
        if !product.is_identity() {
            return Err(CompileError::NonIdentitySequence);
        }
        Ok(product.phase_angle())
    }

    /// Total duration of one sequence instance on a physical qubit.
    fn sequence_duration(
        &self,
        durations: &InstructionDurations,
        qubit: u32,
    ) -> CompileResult<u64> {
        let mut total = 0;
        for gate in &self.sequence {
            total += durations.get(gate.name(), qubit)?;
        }
        Ok(total)
    }

    /// Gap templates for the two colors: fractional placement of free time
    /// around the pulses, plus which gaps absorb an extra half sequence
    /// duration. Odd placements load the front of the window, even
    /// placements straddle it, so neighboring pulses do not line up.
    fn templates(&self, color: usize) -> (Vec<f64>, Vec<f64>) {
        let gaps = self.sequence.len() + 1;
        let mut spacing = vec![0.0; gaps];
        let mut addition = vec![0.0; gaps];
        if color == 0 {
            spacing[0] = 0.5;
            spacing[1] = 0.5;
            addition[0] = 1.0;
            addition[1] = 1.0;
        } else {
            spacing[0] = 0.25;
            spacing[1] = 0.5;
            spacing[gaps - 1] = 0.25;
            addition[1] = 1.0;
            addition[gaps - 1] = 1.0;
        }
        (spacing, addition)
    }

    fn constrained_length(&self, value: f64) -> f64 {
        let alignment = self.pulse_alignment as f64;
        alignment * (value / alignment).floor()
    }

    /// Greedy coloring of the coupling map reduced to the delay's qubits:
    /// each qubit takes the smallest color unused by its already-colored
    /// neighbors.
    fn color_qubits(physical: &[u32], coupling_map: &CouplingMap) -> Vec<usize> {
        let edges = coupling_map.reduce(physical);
        let mut neighbors = vec![Vec::new(); physical.len()];
        for (a, b) in edges {
            neighbors[a].push(b);
            neighbors[b].push(a);
        }
        let mut colors = vec![usize::MAX; physical.len()];
        for i in 0..physical.len() {
            let taken: Vec<usize> = neighbors[i]
                .iter()
                .map(|&n| colors[n])
                .filter(|&c| c != usize::MAX)
                .collect();
            let mut color = 0;
            while taken.contains(&color) {
                color += 1;
            }
            colors[i] = color;
        }
        colors
    }
}

impl Pass for DynamicalDecoupling {
    fn name(&self) -> &str {
        "DynamicalDecoupling"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()> {
        if dag.level() != CircuitLevel::Physical {
            return Err(CompileError::NotPhysical(self.name().to_string()));
        }
        if properties.duration.is_none() {
            return Err(CompileError::NotScheduled(self.name().to_string()));
        }
        let durations = properties
            .durations
            .as_ref()
            .ok_or_else(|| CompileError::MissingProperty {
                pass: self.name().to_string(),
                property: "durations".to_string(),
            })?;
        let coupling_map =
            properties
                .coupling_map
                .as_ref()
                .ok_or_else(|| CompileError::MissingProperty {
                    pass: self.name().to_string(),
                    property: "coupling_map".to_string(),
                })?;

        let mut new_dag = dag.copy_empty_like();
        let mut inserted = 0usize;

        for (node, inst) in dag.topological_ops() {
            let is_multi_delay = inst.is_delay() && inst.qubits.len() > 1;
            if !is_multi_delay {
                new_dag.apply(inst.clone())?;
                continue;
            }
            let Some(duration) = inst.delay_duration() else {
                new_dag.apply(inst.clone())?;
                continue;
            };
            // A zero-width window has no idle time to fill.
            if duration == 0 {
                new_dag.apply(inst.clone())?;
                continue;
            }

            // Qubits fresh out of initialization decohere slowly; leave
            // their idle windows alone.
            if self.skip_reset_qubits
                && dag
                    .predecessors(node)
                    .iter()
                    .all(|&p| dag.get_instruction(p).is_none_or(Instruction::is_reset))
            {
                new_dag.apply(inst.clone())?;
                continue;
            }

            let physical: Vec<u32> = inst.qubits.iter().map(|q| q.0).collect();
            let mut sequence_durations = Vec::with_capacity(physical.len());
            for &q in &physical {
                sequence_durations.push(self.sequence_duration(durations, q)?);
            }
            let slacks: Vec<i64> = sequence_durations
                .iter()
                .map(|&d| duration as i64 - d as i64)
                .collect();

            let does_not_fit = slacks
                .iter()
                .any(|&s| 1.0 - s as f64 / duration as f64 >= self.skip_threshold);
            if does_not_fit {
                for &qubit in &inst.qubits {
                    new_dag.apply(Instruction::delay(qubit, duration))?;
                }
                continue;
            }

            let colors = Self::color_qubits(&physical, coupling_map);
            for (i, &qubit) in inst.qubits.iter().enumerate() {
                let xx = sequence_durations[i] as f64;
                let slack = slacks[i] as f64;
                let slack_prime = slack - xx;
                let (spacing, addition) = self.templates(colors[i]);

                let mut taus: Vec<f64> = spacing
                    .iter()
                    .zip(&addition)
                    .map(|(&s, &a)| {
                        self.constrained_length(slack_prime * s)
                            + self.constrained_length(0.5 * xx * a)
                    })
                    .collect();
                // Quantization rounds every gap down; park the remainder in
                // the middle gap so the window total is exact.
                let unused: f64 = slack - taus.iter().sum::<f64>();
                let middle = (taus.len() - 1) / 2;
                taus[middle] += unused;

                for (j, &tau) in taus.iter().enumerate() {
                    if tau > 0.0 {
                        new_dag.apply(Instruction::delay(qubit, tau as u64))?;
                    }
                    if let Some(gate) = self.sequence.get(j) {
                        new_dag.apply(Instruction::single_qubit_gate(gate.clone(), qubit))?;
                    }
                }
            }

            new_dag.set_global_phase(mod_2pi(new_dag.global_phase() + self.sequence_gphase));
            inserted += 1;
        }

        debug!(inserted, "filled multi-qubit idle windows");
        *dag = new_dag;
        Ok(())
    }
}
