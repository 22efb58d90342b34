//! This library implements synthetic measurement generation for reaction
//! network models.
//!
//! Programming interface is centered around the [`Problem`] and
//! [`Simulator`] structures. [`Problem`] is loaded from a problem file
//! which references a model and a set of tab-separated tables (parameters,
//! conditions, observables and a measurement design). [`Simulator`] binds
//! to a loaded problem and produces a measurement [`Table`] with simulated
//! values, optionally perturbed with measurement noise.
//!
//! # Using the library
//!
//! To use `petgen-core` in your Rust project add the following to your
//! `Cargo.toml`:
//!
//! ```toml
//! petgen-core = "0.1.0"
//! ```
//!
//! ## Example
//!
//! ```ignore
//! extern crate petgen_core as petgen;
//! use petgen::{Problem, Simulator};
//!
//! pub fn main() {
//!     let problem = Problem::from_path("petab.yaml").unwrap();
//!     let simulator = Simulator::new(&problem).unwrap();
//!     let table = simulator.simulate(true).unwrap();
//!     table.write_tsv("measurements.tsv").unwrap();
//! }
//! ```
//!
//! For the whole load-simulate-write flow with fixed file names see
//! [`Runner`].
//!
//! [`Problem`]: problem/struct.Problem.html
//! [`Simulator`]: sim/struct.Simulator.html
//! [`Table`]: table/struct.Table.html
//! [`Runner`]: runner/struct.Runner.html

#[macro_use]
extern crate serde;
#[macro_use]
extern crate log;

// reexports
pub use error::{Error, Result};
pub use model::Model;
pub use problem::Problem;
pub use runner::{FilePaths, OutputMode, Runner};
pub use sim::{SimulationOptions, Simulator};
pub use table::Table;

pub mod error;
pub mod expr;
pub mod model;
pub mod problem;
pub mod runner;
pub mod sim;
pub mod solver;
pub mod table;

mod util;

pub const VERSION: &'static str = env!("CARGO_PKG_VERSION");

/// Supported problem file format version.
pub const FORMAT_VERSION: u32 = 1;

/// Default name of the problem file within the base directory.
pub const PROBLEM_FILE_NAME: &str = "petab.yaml";
/// Output file name, not including the mode suffix and the extension.
pub const OUTPUT_FILE_STEM: &str = "measurements";
/// Suffix appended to the output file stem for noise-free output.
pub const NOISE_FREE_SUFFIX: &str = "_noisefree";
/// Extension of all table files.
pub const TABLE_FILE_EXTENSION: &str = "tsv";

/// Symbol bound to the current simulation time inside model expressions.
pub const TIME_SYMBOL: &str = "time";

// measurement table columns
pub const OBSERVABLE_ID: &str = "observableId";
pub const PREEQUILIBRATION_CONDITION_ID: &str = "preequilibrationConditionId";
pub const SIMULATION_CONDITION_ID: &str = "simulationConditionId";
pub const MEASUREMENT: &str = "measurement";
pub const TIME: &str = "time";
pub const OBSERVABLE_PARAMETERS: &str = "observableParameters";
pub const NOISE_PARAMETERS: &str = "noiseParameters";

// parameter table columns
pub const PARAMETER_ID: &str = "parameterId";
pub const PARAMETER_NAME: &str = "parameterName";
pub const PARAMETER_SCALE: &str = "parameterScale";
pub const LOWER_BOUND: &str = "lowerBound";
pub const UPPER_BOUND: &str = "upperBound";
pub const NOMINAL_VALUE: &str = "nominalValue";
pub const ESTIMATE: &str = "estimate";

// condition table columns
pub const CONDITION_ID: &str = "conditionId";
pub const CONDITION_NAME: &str = "conditionName";

// observable table columns
pub const OBSERVABLE_NAME: &str = "observableName";
pub const OBSERVABLE_FORMULA: &str = "observableFormula";
pub const OBSERVABLE_TRANSFORMATION: &str = "observableTransformation";
pub const NOISE_FORMULA: &str = "noiseFormula";
pub const NOISE_DISTRIBUTION: &str = "noiseDistribution";

/// Separator used in override cells of the measurement table.
pub const PARAMETER_SEPARATOR: char = ';';
