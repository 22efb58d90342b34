//! This example loads a problem, simulates it with and without noise and
//! prints the resulting tables.
//!
//! Run it with a path to a problem file, or without arguments to use the
//! bundled conversion problem.

extern crate petgen_core as petgen;
extern crate simplelog;

use std::env;
use std::path::PathBuf;

use petgen::{Problem, Simulator};
use simplelog::{ConfigBuilder, LevelFilter, TermLogger, TerminalMode};

fn main() {
    let args: Vec<String> = env::args().collect();
    let level = if args.contains(&"--verbose".to_string()) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let config = ConfigBuilder::new().add_filter_allow_str("petgen").build();
    TermLogger::init(level, config, TerminalMode::Mixed).unwrap();

    let path = match args.iter().skip(1).find(|a| !a.starts_with("--")) {
        Some(p) => PathBuf::from(p),
        None => PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../problems/conversion/petab.yaml"),
    };

    let problem = Problem::from_path(&path).unwrap();
    let simulator = Simulator::new(&problem).unwrap();

    println!("noise-free:\n{}", simulator.simulate(false).unwrap().to_tsv_string());
    println!("noisy:\n{}", simulator.simulate(true).unwrap().to_tsv_string());
}
