//! Simulation of a loaded problem.

pub mod noise;

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::Error;
use crate::model::Model;
use crate::problem::{Condition, Measurement, Observable, Problem, SimulationEntry, Time};
use crate::solver::{Integrator, OdeSystem, SteadyState};
use crate::table::Table;
use crate::{Result, MEASUREMENT};

use self::noise::NoiseModel;

const OBSERVABLE_PARAMETER_PREFIX: &str = "observableParameter";
const NOISE_PARAMETER_PREFIX: &str = "noiseParameter";

/// Settings used when simulating a problem.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOptions {
    pub integrator: Integrator,
    pub steady_state: SteadyState,
    /// Multiplier applied to every noise scale
    pub noise_scaling_factor: f64,
    /// Replace noisy values whose sign differs from the simulated value
    /// with 0
    pub zero_bounded: bool,
    /// Seed for the noise generator, entropy based if not set
    pub seed: Option<u64>,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        SimulationOptions {
            integrator: Integrator::default(),
            steady_state: SteadyState::default(),
            noise_scaling_factor: 1.0,
            zero_bounded: false,
            seed: None,
        }
    }
}

impl SimulationOptions {
    /// Applies settings found in a problem file on top of the current
    /// options.
    pub fn apply_settings(&mut self, settings: &SimulationEntry) {
        if let Some(v) = settings.rtol {
            self.integrator.rtol = v;
        }
        if let Some(v) = settings.atol {
            self.integrator.atol = v;
        }
        if let Some(v) = settings.max_steps {
            self.integrator.max_steps = v;
        }
        if let Some(v) = settings.steady_state_rtol {
            self.steady_state.rtol = v;
        }
        if let Some(v) = settings.steady_state_atol {
            self.steady_state.atol = v;
        }
        if let Some(v) = settings.noise_scaling_factor {
            self.noise_scaling_factor = v;
        }
        if let Some(v) = settings.zero_bounded {
            self.zero_bounded = v;
        }
        if settings.seed.is_some() {
            self.seed = settings.seed;
        }
    }
}

/// Model with a fixed parameter vector, seen as an ODE system.
struct ModelSystem<'a> {
    model: &'a Model,
    params: &'a [f64],
}

impl OdeSystem for ModelSystem<'_> {
    fn dim(&self) -> usize {
        self.model.species.len()
    }

    fn rhs(&self, t: f64, y: &[f64], dy: &mut [f64]) -> Result<()> {
        self.model.rhs(t, y, self.params, dy)
    }
}

/// Model state at a single time point, together with the parameters it
/// was simulated with.
struct Snapshot<'a> {
    t: f64,
    state: &'a [f64],
    params: &'a [f64],
}

/// Simulator bound to a problem.
///
/// Creating a simulator does no I/O. It checks that every observable and
/// noise formula only refers to known symbols, so that failures surface
/// before any simulation work is done.
///
/// # Example
///
/// ```ignore
/// let problem = petgen_core::Problem::from_path("petab.yaml")?;
/// let simulator = petgen_core::Simulator::new(&problem)?;
/// let noisy = simulator.simulate(true)?;
/// ```
pub struct Simulator<'p> {
    problem: &'p Problem,
    pub options: SimulationOptions,
}

impl<'p> Simulator<'p> {
    /// Creates a new simulator using default options overridden by the
    /// problem's own settings.
    pub fn new(problem: &'p Problem) -> Result<Simulator<'p>> {
        let mut options = SimulationOptions::default();
        options.apply_settings(&problem.settings);
        Simulator::with_options(problem, options)
    }

    pub fn with_options(problem: &'p Problem, options: SimulationOptions) -> Result<Simulator<'p>> {
        let sim = Simulator { problem, options };
        sim.validate()?;
        Ok(sim)
    }

    pub fn problem(&self) -> &Problem {
        self.problem
    }

    fn validate(&self) -> Result<()> {
        let model = &self.problem.model;
        let params = model.default_parameters();
        let state = model.initial_state(&params)?;
        let snapshot = Snapshot {
            t: 0.0,
            state: &state,
            params: &params,
        };
        for observable in &self.problem.observables {
            let value = observable.formula.eval(|name| {
                if is_placeholder(name, OBSERVABLE_PARAMETER_PREFIX, &observable.id) {
                    Some(1.0)
                } else {
                    self.resolve(name, &snapshot)
                }
            })?;
            observable.noise_formula.eval(|name| {
                if is_placeholder(name, NOISE_PARAMETER_PREFIX, &observable.id) {
                    Some(1.0)
                } else if name == observable.id {
                    Some(value)
                } else {
                    self.resolve(name, &snapshot)
                }
            })?;
        }

        // every placeholder used by a formula needs a value in each row
        for (n, m) in self.problem.measurements.iter().enumerate() {
            let observable = self.problem.observable(&m.observable_id)?;
            let checks = [
                (
                    OBSERVABLE_PARAMETER_PREFIX,
                    observable.formula.source(),
                    m.observable_parameters.len(),
                ),
                (
                    NOISE_PARAMETER_PREFIX,
                    observable.noise_formula.source(),
                    m.noise_parameters.len(),
                ),
            ];
            for (prefix, source, given) in checks.iter() {
                let needed = max_placeholder_index(source, prefix, &observable.id);
                if needed > *given {
                    return Err(Error::MissingPlaceholderValue(
                        n + 2,
                        format!("{}{}_{}", prefix, needed, observable.id),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Simulates all measurements of the problem, returning the
    /// measurement table with simulated values in the measurement column.
    ///
    /// With noise enabled values are perturbed according to each
    /// observable's noise model. Unless a seed is configured, the noise
    /// generator is seeded from system entropy and repeated calls produce
    /// different values.
    pub fn simulate(&self, noise: bool) -> Result<Table> {
        let mut rng = match self.options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.simulate_with_rng(noise, &mut rng)
    }

    /// Same as `simulate`, drawing noise from the given generator.
    pub fn simulate_with_rng<R: Rng + ?Sized>(&self, noise: bool, rng: &mut R) -> Result<Table> {
        let rows = self.simulate_rows()?;
        let mut table = self.problem.measurement_table.clone();
        let column = table.require_column(MEASUREMENT)?;
        for (n, (value, noise_model)) in rows.iter().enumerate() {
            let value = if noise {
                noise_model.sample(*value, rng).map_err(|e| {
                    Error::InvalidNoise(
                        self.problem.measurements[n].observable_id.clone(),
                        e.to_string(),
                    )
                })?
            } else {
                *value
            };
            table.set(n, column, format!("{}", value));
        }
        Ok(table)
    }

    /// Computes noise-free observable values for every measurement row, in
    /// measurement table order.
    pub fn simulate_values(&self) -> Result<Vec<f64>> {
        Ok(self.simulate_rows()?.into_iter().map(|(v, _)| v).collect())
    }

    /// Simulates every measurement row, returning the noise-free value
    /// together with the row's noise model.
    fn simulate_rows(&self) -> Result<Vec<(f64, NoiseModel)>> {
        let measurements = &self.problem.measurements;
        let mut rows_out = Vec::with_capacity(measurements.len());
        rows_out.resize_with(measurements.len(), || None);

        // rows sharing conditions are simulated together
        let mut groups: BTreeMap<(Option<&str>, &str), Vec<usize>> = BTreeMap::new();
        for (n, m) in measurements.iter().enumerate() {
            groups
                .entry((
                    m.preequilibration_condition_id.as_deref(),
                    m.simulation_condition_id.as_str(),
                ))
                .or_insert_with(Vec::new)
                .push(n);
        }

        for ((preeq_id, sim_id), rows) in groups {
            debug!(
                "simulating condition {} (preequilibration: {}), {} measurement(s)",
                sim_id,
                preeq_id.unwrap_or("none"),
                rows.len()
            );
            let condition = self.problem.condition(sim_id)?;
            let params = self.condition_parameters(condition)?;
            let initial = match preeq_id {
                Some(preeq_id) => self.preequilibrate(self.problem.condition(preeq_id)?, condition)?,
                None => {
                    let mut state = self.problem.model.initial_state(&params)?;
                    self.apply_species_overrides(condition, &mut state)?;
                    state
                }
            };

            let states = self.simulate_condition(&initial, &params, &rows)?;
            for n in rows {
                let m = &measurements[n];
                let (t, state) = match m.time {
                    Time::Finite(t) => (t, lookup_state(&states.finite, t)?),
                    Time::SteadyState => states
                        .steady
                        .as_ref()
                        .map(|(t, s)| (*t, s.as_slice()))
                        .ok_or_else(|| Error::Other("steady state wasn't simulated".to_string()))?,
                };
                let snapshot = Snapshot {
                    t,
                    state,
                    params: &params,
                };
                let value = self.observable_value(m, &snapshot)?;
                let noise_model = self.noise_model(m, value, &snapshot)?;
                rows_out[n] = Some((value, noise_model));
            }
        }
        rows_out
            .into_iter()
            .map(|r| r.ok_or_else(|| Error::Other("measurement row wasn't simulated".to_string())))
            .collect()
    }

    /// Builds the parameter vector for a condition: model defaults,
    /// overridden by the parameter table, overridden by the condition.
    fn condition_parameters(&self, condition: &Condition) -> Result<Vec<f64>> {
        let model = &self.problem.model;
        let mut params = model.default_parameters();
        for entry in &self.problem.parameters {
            if let Some(i) = model.parameter_index(&entry.id) {
                params[i] = entry.nominal_value;
            }
        }
        for (target, value) in &condition.overrides {
            if let Some(i) = model.parameter_index(target) {
                params[i] = self.problem.resolve_value(value)?;
            }
        }
        Ok(params)
    }

    fn apply_species_overrides(&self, condition: &Condition, state: &mut [f64]) -> Result<()> {
        for (target, value) in &condition.overrides {
            if let Some(i) = self.problem.model.species_index(target) {
                state[i] = self.problem.resolve_value(value)?;
            }
        }
        Ok(())
    }

    /// Drives the model to steady state under the preequilibration
    /// condition, then applies species set by the simulation condition.
    fn preequilibrate(&self, preeq: &Condition, condition: &Condition) -> Result<Vec<f64>> {
        let model = &self.problem.model;
        let params = self.condition_parameters(preeq)?;
        let mut state = model.initial_state(&params)?;
        self.apply_species_overrides(preeq, &mut state)?;
        let sys = ModelSystem {
            model,
            params: &params,
        };
        let t = self.options.integrator.integrate_to_steady_state(
            &sys,
            0.0,
            &mut state,
            &self.options.steady_state,
        )?;
        debug!("preequilibration {} reached steady state at t={}", preeq.id, t);
        self.apply_species_overrides(condition, &mut state)?;
        Ok(state)
    }

    fn simulate_condition(&self, initial: &[f64], params: &[f64], rows: &[usize]) -> Result<States> {
        let sys = ModelSystem {
            model: &self.problem.model,
            params,
        };
        let mut times: Vec<f64> = Vec::new();
        let mut needs_steady = false;
        for n in rows {
            match self.problem.measurements[*n].time {
                Time::Finite(t) => times.push(t),
                Time::SteadyState => needs_steady = true,
            }
        }
        times.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        times.dedup();

        let mut finite = Vec::with_capacity(times.len());
        let mut state = initial.to_vec();
        let mut t = 0.0;
        for t_next in times {
            self.options.integrator.integrate(&sys, t, t_next, &mut state)?;
            t = t_next;
            finite.push((t, state.clone()));
        }

        let steady = if needs_steady {
            let mut state = initial.to_vec();
            let t = self.options.integrator.integrate_to_steady_state(
                &sys,
                0.0,
                &mut state,
                &self.options.steady_state,
            )?;
            Some((t, state))
        } else {
            None
        };
        Ok(States { finite, steady })
    }

    fn observable_value(&self, m: &Measurement, snapshot: &Snapshot) -> Result<f64> {
        let observable = self.problem.observable(&m.observable_id)?;
        let overrides = self.placeholders(OBSERVABLE_PARAMETER_PREFIX, observable, &m.observable_parameters)?;
        observable.formula.eval(|name| {
            lookup_placeholder(&overrides, name).or_else(|| self.resolve(name, snapshot))
        })
    }

    /// Evaluates the noise model of a measurement row. The noise formula
    /// can refer to the simulated observable value by the observable id.
    fn noise_model(&self, m: &Measurement, value: f64, snapshot: &Snapshot) -> Result<NoiseModel> {
        let observable = self.problem.observable(&m.observable_id)?;
        let overrides = self.placeholders(NOISE_PARAMETER_PREFIX, observable, &m.noise_parameters)?;
        let scale = observable.noise_formula.eval(|name| {
            if name == observable.id {
                return Some(value);
            }
            lookup_placeholder(&overrides, name).or_else(|| self.resolve(name, snapshot))
        })?;
        Ok(NoiseModel {
            distribution: observable.noise_distribution,
            transformation: observable.transformation,
            scale: scale * self.options.noise_scaling_factor,
            zero_bounded: self.options.zero_bounded,
        })
    }

    fn placeholders(
        &self,
        prefix: &str,
        observable: &Observable,
        values: &[crate::problem::ValueRef],
    ) -> Result<Vec<(String, f64)>> {
        values
            .iter()
            .enumerate()
            .map(|(n, v)| {
                Ok((
                    format!("{}{}_{}", prefix, n + 1, observable.id),
                    self.problem.resolve_value(v)?,
                ))
            })
            .collect()
    }

    /// Resolves model symbols first, then parameter table entries.
    fn resolve(&self, name: &str, snapshot: &Snapshot) -> Option<f64> {
        self.problem
            .model
            .resolve(name, snapshot.t, snapshot.state, snapshot.params)
            .or_else(|| self.problem.parameter(name).map(|p| p.nominal_value))
    }
}

/// Simulated states of a single condition.
struct States {
    finite: Vec<(f64, Vec<f64>)>,
    steady: Option<(f64, Vec<f64>)>,
}

fn lookup_state(states: &[(f64, Vec<f64>)], t: f64) -> Result<&[f64]> {
    states
        .iter()
        .find(|(ts, _)| *ts == t)
        .map(|(_, s)| s.as_slice())
        .ok_or_else(|| Error::Other(format!("no simulated state at t={}", t)))
}

fn lookup_placeholder(overrides: &[(String, f64)], name: &str) -> Option<f64> {
    overrides
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| *v)
}

/// Gets the placeholder index if `name` is a placeholder like
/// `observableParameter1_obs`.
fn placeholder_index(name: &str, prefix: &str, observable_id: &str) -> Option<usize> {
    name.strip_prefix(prefix)
        .and_then(|rest| rest.strip_suffix(observable_id))
        .and_then(|rest| rest.strip_suffix('_'))
        .filter(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
        .and_then(|n| n.parse().ok())
}

fn is_placeholder(name: &str, prefix: &str, observable_id: &str) -> bool {
    placeholder_index(name, prefix, observable_id).is_some()
}

/// Highest placeholder index referenced in a formula, 0 if none.
fn max_placeholder_index(source: &str, prefix: &str, observable_id: &str) -> usize {
    source
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter_map(|token| placeholder_index(token, prefix, observable_id))
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::{Path, PathBuf};

    fn fixture_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../problems/conversion")
    }

    /// Copies the fixture problem into a temporary directory, replacing
    /// `from` with `to` in the given file.
    fn edited_fixture(file: &str, from: &str, to: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for entry in fs::read_dir(fixture_dir()).unwrap() {
            let entry = entry.unwrap();
            fs::copy(entry.path(), dir.path().join(entry.file_name())).unwrap();
        }
        let path = dir.path().join(file);
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains(from));
        fs::write(&path, content.replacen(from, to, 1)).unwrap();
        dir
    }

    fn load(dir: &Path) -> Problem {
        Problem::from_path(dir.join(crate::PROBLEM_FILE_NAME)).unwrap()
    }

    fn problem() -> Problem {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../problems/conversion")
            .join(crate::PROBLEM_FILE_NAME);
        Problem::from_path(path).unwrap()
    }

    /// Reversible conversion A <-> B, total amount conserved.
    fn analytic_a(a0: f64, b0: f64, k1: f64, k2: f64, t: f64) -> f64 {
        let a_ss = (a0 + b0) * k2 / (k1 + k2);
        a_ss + (a0 - a_ss) * (-(k1 + k2) * t).exp()
    }

    fn column(table: &Table, name: &str) -> Vec<String> {
        let idx = table.column_index(name).unwrap();
        table.rows().iter().map(|r| r[idx].clone()).collect()
    }

    #[test]
    fn placeholders_are_recognized() {
        assert!(is_placeholder("observableParameter1_obs_a", OBSERVABLE_PARAMETER_PREFIX, "obs_a"));
        assert!(is_placeholder("noiseParameter12_obs_a", NOISE_PARAMETER_PREFIX, "obs_a"));
        assert!(!is_placeholder("observableParameter_obs_a", OBSERVABLE_PARAMETER_PREFIX, "obs_a"));
        assert!(!is_placeholder("observableParameter1_obs_b", OBSERVABLE_PARAMETER_PREFIX, "obs_a"));
    }

    #[test]
    fn noise_free_values_match_analytic_solution() {
        let problem = problem();
        let sim = Simulator::new(&problem).unwrap();
        let values = sim.simulate_values().unwrap();
        for (m, value) in problem.measurements.iter().zip(values.iter()) {
            let t = match m.time {
                Time::Finite(t) => t,
                Time::SteadyState => f64::INFINITY,
            };
            let expected = match (
                m.preequilibration_condition_id.as_deref(),
                m.simulation_condition_id.as_str(),
                m.observable_id.as_str(),
            ) {
                (None, "c0", "obs_a") => 2.0 * analytic_a(1.0, 0.0, 0.5, 0.25, t),
                (None, "c0", "obs_b") => 1.0 - analytic_a(1.0, 0.0, 0.5, 0.25, t),
                (None, "c_high", "obs_a") => 2.0 * analytic_a(1.0, 0.0, 1.5, 0.25, t),
                (None, "c_high", "obs_b") => 1.0 - analytic_a(1.0, 0.0, 1.5, 0.25, t),
                // steady state of c0 is A = 1/3, B = 2/3, then A is reset to 1
                (Some("c0"), "c_reset", "obs_a") => {
                    2.0 * analytic_a(1.0, 2.0 / 3.0, 0.5, 0.25, t)
                }
                (Some("c0"), "c_reset", "obs_b") => {
                    5.0 / 3.0 - analytic_a(1.0, 2.0 / 3.0, 0.5, 0.25, t)
                }
                other => panic!("unexpected measurement in fixture: {:?}", other),
            };
            assert!(
                (value - expected).abs() < 1e-6,
                "{:?}: {} vs {}",
                m,
                value,
                expected
            );
        }
    }

    #[test]
    fn steady_state_after_preequilibration() {
        let problem = problem();
        let sim = Simulator::new(&problem).unwrap();
        let values = sim.simulate_values().unwrap();
        let (n, _) = problem
            .measurements
            .iter()
            .enumerate()
            .find(|(_, m)| {
                m.preequilibration_condition_id.is_some() && m.time == Time::SteadyState
            })
            .unwrap();
        // 5/3 in total after the reset, k2 / (k1 + k2) = 1/3 of it as A
        assert!((values[n] - 2.0 * 5.0 / 9.0).abs() < 1e-6, "{}", values[n]);
    }

    #[test]
    fn missing_placeholder_value_fails_on_construction() {
        let dir = edited_fixture(
            "measurement_design.tsv",
            "obs_a\t\tc0\t0\t0\tscale_a\t",
            "obs_a\t\tc0\t0\t0\t\t",
        );
        let problem = load(dir.path());
        match Simulator::new(&problem) {
            Err(Error::MissingPlaceholderValue(row, name)) => {
                assert_eq!(row, 2);
                assert_eq!(name, "observableParameter1_obs_a");
            }
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("missing placeholder value accepted"),
        }
    }

    #[test]
    fn noise_formula_can_use_observable_value() {
        let dir = edited_fixture("observables.tsv", "\tsigma_b\t", "\t0.1 * obs_b\t");
        let problem = load(dir.path());
        let sim = Simulator::new(&problem).unwrap();
        let rows = sim.simulate_rows().unwrap();
        let mut checked = 0;
        for (m, (value, noise)) in problem.measurements.iter().zip(rows.iter()) {
            if m.observable_id == "obs_b" {
                assert!((noise.scale - 0.1 * value).abs() < 1e-12);
                checked += 1;
            }
        }
        assert!(checked > 0);
    }

    #[test]
    fn noise_free_table_keeps_columns() {
        let problem = problem();
        let sim = Simulator::new(&problem).unwrap();
        let table = sim.simulate(false).unwrap();
        assert_eq!(table.columns(), problem.measurement_table.columns());
        assert_eq!(table.len(), problem.measurements.len());
        assert_eq!(
            column(&table, crate::TIME),
            column(&problem.measurement_table, crate::TIME)
        );
        let expected: Vec<String> = sim
            .simulate_values()
            .unwrap()
            .iter()
            .map(|v| format!("{}", v))
            .collect();
        assert_eq!(column(&table, MEASUREMENT), expected);
    }

    #[test]
    fn seeded_noise_is_reproducible() {
        let problem = problem();
        let options = SimulationOptions {
            seed: Some(42),
            ..SimulationOptions::default()
        };
        let sim = Simulator::with_options(&problem, options).unwrap();
        let first = sim.simulate(true).unwrap();
        let second = sim.simulate(true).unwrap();
        assert_eq!(first, second);
        assert_ne!(first, sim.simulate(false).unwrap());
    }

    #[test]
    fn unseeded_noise_keeps_shape() {
        let problem = problem();
        let sim = Simulator::new(&problem).unwrap();
        let first = sim.simulate(true).unwrap();
        let second = sim.simulate(true).unwrap();
        assert_eq!(first.columns(), second.columns());
        assert_eq!(first.len(), second.len());
        for table in &[first, second] {
            for value in column(table, MEASUREMENT) {
                assert!(value.parse::<f64>().unwrap().is_finite());
            }
        }
    }

    #[test]
    fn noise_scaling_factor_zero_disables_noise() {
        let problem = problem();
        let options = SimulationOptions {
            noise_scaling_factor: 0.0,
            ..SimulationOptions::default()
        };
        let sim = Simulator::with_options(&problem, options).unwrap();
        assert_eq!(sim.simulate(true).unwrap(), sim.simulate(false).unwrap());
    }

    #[test]
    fn settings_override_defaults() {
        let mut options = SimulationOptions::default();
        options.apply_settings(&SimulationEntry {
            rtol: Some(1e-6),
            seed: Some(5),
            zero_bounded: Some(true),
            ..SimulationEntry::default()
        });
        assert_eq!(options.integrator.rtol, 1e-6);
        assert_eq!(options.integrator.atol, Integrator::default().atol);
        assert_eq!(options.seed, Some(5));
        assert!(options.zero_bounded);
    }
}
