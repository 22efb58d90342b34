//! Whole generation run: load the problem, simulate, write tables.

use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::Error;
use crate::problem::Problem;
use crate::sim::Simulator;
use crate::table::Table;
use crate::{Result, NOISE_FREE_SUFFIX, OUTPUT_FILE_STEM, PROBLEM_FILE_NAME, TABLE_FILE_EXTENSION};

/// Which measurement tables a run produces.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum OutputMode {
    Noisy,
    NoiseFree,
    Both,
}

impl Default for OutputMode {
    fn default() -> Self {
        OutputMode::Noisy
    }
}

impl OutputMode {
    /// Noise flags to simulate with, in output order.
    pub fn noise_flags(&self) -> &'static [bool] {
        match self {
            OutputMode::Noisy => &[true],
            OutputMode::NoiseFree => &[false],
            OutputMode::Both => &[true, false],
        }
    }
}

impl FromStr for OutputMode {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "noisy" => Ok(OutputMode::Noisy),
            "noise-free" | "noisefree" => Ok(OutputMode::NoiseFree),
            "both" => Ok(OutputMode::Both),
            _ => Err(Error::Other(format!("unknown output mode: {}", s))),
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutputMode::Noisy => "noisy",
            OutputMode::NoiseFree => "noise-free",
            OutputMode::Both => "both",
        };
        write!(f, "{}", s)
    }
}

/// Locations of the problem file and of the output tables.
#[derive(Debug, Clone, PartialEq)]
pub struct FilePaths {
    pub problem: PathBuf,
    pub output_dir: PathBuf,
}

impl FilePaths {
    /// Uses the fixed file names within the given base directory.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> FilePaths {
        FilePaths {
            problem: dir.as_ref().join(PROBLEM_FILE_NAME),
            output_dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Path of the output table, `measurements.tsv` for noisy output and
    /// `measurements_noisefree.tsv` otherwise.
    pub fn output(&self, noise: bool) -> PathBuf {
        let stem = if noise {
            OUTPUT_FILE_STEM.to_string()
        } else {
            format!("{}{}", OUTPUT_FILE_STEM, NOISE_FREE_SUFFIX)
        };
        self.output_dir
            .join(format!("{}.{}", stem, TABLE_FILE_EXTENSION))
    }
}

/// Single generation run.
///
/// Every table is simulated and written to a temporary file next to its
/// target before any existing output is replaced. A run failing before
/// that point leaves existing output files untouched.
#[derive(Debug, Clone)]
pub struct Runner {
    pub paths: FilePaths,
    pub mode: OutputMode,
    /// Overrides the seed found in the problem file
    pub seed: Option<u64>,
}

impl Runner {
    pub fn new(paths: FilePaths) -> Runner {
        Runner {
            paths,
            mode: OutputMode::default(),
            seed: None,
        }
    }

    /// Performs the run, returning paths of the written tables.
    pub fn run(&self) -> Result<Vec<PathBuf>> {
        let problem = Problem::from_path(&self.paths.problem)?;
        let mut simulator = Simulator::new(&problem)?;
        if self.seed.is_some() {
            simulator.options.seed = self.seed;
        }

        let mut tables: Vec<(PathBuf, Table)> = Vec::new();
        for noise in self.mode.noise_flags() {
            tables.push((self.paths.output(*noise), simulator.simulate(*noise)?));
        }

        let mut staged: Vec<PathBuf> = Vec::with_capacity(tables.len());
        for (path, table) in &tables {
            let tmp = staging_path(path);
            if let Err(e) = table.write_tsv(&tmp) {
                for tmp in &staged {
                    let _ = fs::remove_file(tmp);
                }
                return Err(e);
            }
            staged.push(tmp);
        }

        let mut written = Vec::with_capacity(tables.len());
        for ((path, table), tmp) in tables.into_iter().zip(staged) {
            fs::rename(&tmp, &path)
                .map_err(|e| Error::IoError(format!("{}: {}", path.to_string_lossy(), e)))?;
            info!(
                "wrote {} measurement rows to: {}",
                table.len(),
                path.to_string_lossy()
            );
            written.push(path);
        }
        Ok(written)
    }
}

/// Temporary file a table is written to before replacing `path`.
fn staging_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixture_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let src = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../problems/conversion");
        for entry in fs::read_dir(&src).unwrap() {
            let entry = entry.unwrap();
            fs::copy(entry.path(), dir.path().join(entry.file_name())).unwrap();
        }
        dir
    }

    fn line_count(path: &Path) -> usize {
        fs::read_to_string(path).unwrap().lines().count()
    }

    #[test]
    fn output_paths() {
        let paths = FilePaths::from_dir("/data");
        assert_eq!(paths.problem, PathBuf::from("/data/petab.yaml"));
        assert_eq!(paths.output(true), PathBuf::from("/data/measurements.tsv"));
        assert_eq!(
            paths.output(false),
            PathBuf::from("/data/measurements_noisefree.tsv")
        );
    }

    #[test]
    fn output_mode_from_str() {
        assert_eq!("noisy".parse::<OutputMode>().unwrap(), OutputMode::Noisy);
        assert_eq!(
            "noise-free".parse::<OutputMode>().unwrap(),
            OutputMode::NoiseFree
        );
        assert_eq!("both".parse::<OutputMode>().unwrap(), OutputMode::Both);
        assert!("loud".parse::<OutputMode>().is_err());
    }

    #[test]
    fn run_writes_header_and_rows() {
        let dir = fixture_dir();
        let runner = Runner::new(FilePaths::from_dir(dir.path()));
        let written = runner.run().unwrap();
        assert_eq!(written, vec![dir.path().join("measurements.tsv")]);

        let problem = Problem::from_path(dir.path().join(PROBLEM_FILE_NAME)).unwrap();
        assert_eq!(line_count(&written[0]), problem.measurements.len() + 1);
        let table = Table::from_path(&written[0]).unwrap();
        assert_eq!(table.columns(), problem.measurement_table.columns());
    }

    #[test]
    fn second_run_overwrites() {
        let dir = fixture_dir();
        let runner = Runner::new(FilePaths::from_dir(dir.path()));
        let first = runner.run().unwrap();
        let lines = line_count(&first[0]);
        let second = runner.run().unwrap();
        assert_eq!(first, second);
        assert_eq!(line_count(&second[0]), lines);
    }

    #[test]
    fn seeded_runs_are_identical() {
        let dir = fixture_dir();
        let mut runner = Runner::new(FilePaths::from_dir(dir.path()));
        runner.seed = Some(1);
        let path = runner.run().unwrap().remove(0);
        let first = fs::read_to_string(&path).unwrap();
        runner.run().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), first);
    }

    #[test]
    fn both_modes() {
        let dir = fixture_dir();
        let mut runner = Runner::new(FilePaths::from_dir(dir.path()));
        runner.mode = OutputMode::Both;
        let written = runner.run().unwrap();
        assert_eq!(written.len(), 2);
        assert!(written.iter().all(|p| p.exists()));
        assert_eq!(line_count(&written[0]), line_count(&written[1]));
    }

    #[test]
    fn failed_write_keeps_all_previous_output() {
        let dir = fixture_dir();
        let paths = FilePaths::from_dir(dir.path());
        fs::write(paths.output(true), "previous").unwrap();
        // noise-free table can't be staged, a directory is in the way
        fs::create_dir(staging_path(&paths.output(false))).unwrap();

        let mut runner = Runner::new(paths.clone());
        runner.mode = OutputMode::Both;
        assert!(runner.run().is_err());
        assert_eq!(fs::read_to_string(paths.output(true)).unwrap(), "previous");
        assert!(!paths.output(false).exists());
        assert!(!staging_path(&paths.output(true)).exists());
    }

    #[test]
    fn missing_problem_creates_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let paths = FilePaths::from_dir(dir.path());
        assert!(Runner::new(paths.clone()).run().is_err());
        assert!(!paths.output(true).exists());
    }

    #[test]
    fn malformed_problem_keeps_previous_output() {
        let dir = fixture_dir();
        let paths = FilePaths::from_dir(dir.path());
        fs::write(paths.output(true), "previous").unwrap();
        fs::write(&paths.problem, "format_version: 1\nproblems: [").unwrap();
        assert!(Runner::new(paths.clone()).run().is_err());
        assert_eq!(fs::read_to_string(paths.output(true)).unwrap(), "previous");
    }
}
