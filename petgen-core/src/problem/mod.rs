//! Problem definition: the model together with the tables describing
//! parameters, experimental conditions, observables and the measurement
//! design.

pub mod deser;
pub mod entries;

use std::path::{Path, PathBuf};

use fnv::FnvHashMap;

pub use self::deser::SimulationEntry;
pub use self::entries::{
    Condition, Measurement, NoiseDistribution, Observable, ParameterEntry, Scale, Time, ValueRef,
};

use crate::error::Error;
use crate::model::Model;
use crate::table::Table;
use crate::util;
use crate::{Result, FORMAT_VERSION};

/// Loaded and validated problem definition.
///
/// # Loading
///
/// A problem is loaded from a problem file (YAML or TOML) which points to
/// a model file and to the tab-separated tables. All referenced paths are
/// relative to the directory containing the problem file. Multiple files
/// given for the same table are concatenated.
///
/// # Validation
///
/// All cross references between the tables are checked during loading:
/// measurement rows have to point to existing observables and conditions,
/// condition columns have to name model parameters or species and every
/// parameter reference has to resolve. Expressions are checked later,
/// when a simulator is created for the problem.
#[derive(Debug)]
pub struct Problem {
    /// Full path to the problem file
    pub path: PathBuf,
    pub model: Model,
    pub parameters: Vec<ParameterEntry>,
    pub conditions: Vec<Condition>,
    pub observables: Vec<Observable>,
    pub measurements: Vec<Measurement>,
    /// Concatenated measurement table, kept to preserve all of its columns
    /// in the simulation output
    pub measurement_table: Table,
    /// Simulation settings found in the problem file
    pub settings: SimulationEntry,

    parameters_idx: FnvHashMap<String, usize>,
    conditions_idx: FnvHashMap<String, usize>,
    observables_idx: FnvHashMap<String, usize>,
}

impl Problem {
    /// Creates a new problem from a path to the problem file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Problem> {
        let path = path.as_ref();
        let path = dunce::canonicalize(path)
            .map_err(|e| Error::IoError(format!("{}: {}", path.to_string_lossy(), e)))?;
        let base_dir = path
            .parent()
            .ok_or_else(|| {
                Error::Other(format!(
                    "unable to get parent of path: {}",
                    path.to_string_lossy()
                ))
            })?
            .to_path_buf();
        info!("loading problem from: {}", path.to_string_lossy());

        let file: deser::ProblemFile = util::deser_struct_from_path(&path)?;
        match file.format_version.major() {
            Some(FORMAT_VERSION) => (),
            _ => {
                return Err(Error::InvalidProblem(format!(
                    "unsupported format version: {:?}",
                    file.format_version
                )))
            }
        }
        if file.problems.len() != 1 {
            return Err(Error::InvalidProblem(format!(
                "expected exactly one problem entry, found {}",
                file.problems.len()
            )));
        }
        let entry = &file.problems[0];
        if !entry.sbml_files.is_empty() {
            return Err(Error::InvalidProblem(
                "SBML models are not supported, use model_files instead".to_string(),
            ));
        }
        if entry.model_files.len() != 1 {
            return Err(Error::InvalidProblem(format!(
                "expected exactly one model file, found {}",
                entry.model_files.len()
            )));
        }

        let model = Model::from_path(&util::resolve_relative(&base_dir, &entry.model_files[0]))?;
        let parameter_table = read_tables(&base_dir, &file.parameter_file.clone().into_vec())?;
        let condition_table = read_tables(&base_dir, &entry.condition_files)?;
        let observable_table = read_tables(&base_dir, &entry.observable_files)?;
        let measurement_table = read_tables(&base_dir, &entry.measurement_files)?;

        let problem = Problem::from_parts(
            path.clone(),
            model,
            entries::parameters_from_table(&parameter_table)?,
            entries::conditions_from_table(&condition_table)?,
            entries::observables_from_table(&observable_table)?,
            measurement_table,
            file.simulation.clone(),
        )?;
        info!(
            "loaded problem with model \"{}\": {} species, {} reactions, {} conditions, \
             {} observables, {} measurements",
            problem.model.name,
            problem.model.species.len(),
            problem.model.reactions.len(),
            problem.conditions.len(),
            problem.observables.len(),
            problem.measurements.len()
        );
        Ok(problem)
    }

    /// Assembles a problem from already loaded parts and validates cross
    /// references between them.
    pub fn from_parts(
        path: PathBuf,
        model: Model,
        parameters: Vec<ParameterEntry>,
        conditions: Vec<Condition>,
        observables: Vec<Observable>,
        measurement_table: Table,
        settings: SimulationEntry,
    ) -> Result<Problem> {
        let measurements = entries::measurements_from_table(&measurement_table)?;
        let parameters_idx = index_ids(parameters.iter().map(|p| p.id.as_str()))?;
        let conditions_idx = index_ids(conditions.iter().map(|c| c.id.as_str()))?;
        let observables_idx = index_ids(observables.iter().map(|o| o.id.as_str()))?;
        let problem = Problem {
            path,
            model,
            parameters,
            conditions,
            observables,
            measurements,
            measurement_table,
            settings,
            parameters_idx,
            conditions_idx,
            observables_idx,
        };
        problem.validate()?;
        Ok(problem)
    }

    fn validate(&self) -> Result<()> {
        for condition in &self.conditions {
            for (target, value) in &condition.overrides {
                if self.model.symbol(target).is_none() || target == crate::TIME_SYMBOL {
                    return Err(Error::UnknownOverrideTarget(
                        condition.id.clone(),
                        target.clone(),
                    ));
                }
                self.check_value_ref(value)?;
            }
        }
        for measurement in &self.measurements {
            self.observable(&measurement.observable_id)?;
            self.condition(&measurement.simulation_condition_id)?;
            if let Some(preeq) = &measurement.preequilibration_condition_id {
                self.condition(preeq)?;
            }
            for value in measurement
                .observable_parameters
                .iter()
                .chain(measurement.noise_parameters.iter())
            {
                self.check_value_ref(value)?;
            }
        }
        Ok(())
    }

    fn check_value_ref(&self, value: &ValueRef) -> Result<()> {
        match value {
            ValueRef::Number(_) => Ok(()),
            ValueRef::Parameter(id) => self.parameter_value(id).map(|_| ()),
        }
    }

    pub fn observable(&self, id: &str) -> Result<&Observable> {
        match self.observables_idx.get(id) {
            Some(i) => Ok(&self.observables[*i]),
            None => Err(Error::UnknownObservable(
                id.to_string(),
                util::get_similar(id, self.observables.iter().map(|o| o.id.as_str())),
            )),
        }
    }

    pub fn condition(&self, id: &str) -> Result<&Condition> {
        match self.conditions_idx.get(id) {
            Some(i) => Ok(&self.conditions[*i]),
            None => Err(Error::UnknownCondition(
                id.to_string(),
                util::get_similar(id, self.conditions.iter().map(|c| c.id.as_str())),
            )),
        }
    }

    pub fn parameter(&self, id: &str) -> Option<&ParameterEntry> {
        self.parameters_idx.get(id).map(|i| &self.parameters[*i])
    }

    /// Gets the value of a parameter, first looking at the parameter table,
    /// then at model defaults.
    pub fn parameter_value(&self, id: &str) -> Result<f64> {
        if let Some(p) = self.parameter(id) {
            return Ok(p.nominal_value);
        }
        if let Some(i) = self.model.parameter_index(id) {
            return Ok(self.model.parameters[i].value);
        }
        let candidates = self
            .parameters
            .iter()
            .map(|p| p.id.as_str())
            .chain(self.model.parameters.iter().map(|p| p.id.as_str()));
        Err(Error::UnknownParameter(
            id.to_string(),
            util::get_similar(id, candidates),
        ))
    }

    /// Resolves a table cell value into a number.
    pub fn resolve_value(&self, value: &ValueRef) -> Result<f64> {
        match value {
            ValueRef::Number(v) => Ok(*v),
            ValueRef::Parameter(id) => self.parameter_value(id),
        }
    }

    /// Directory containing the problem file.
    pub fn base_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }
}

fn read_tables(base_dir: &Path, files: &[String]) -> Result<Table> {
    let mut paths = files.iter().map(|f| util::resolve_relative(base_dir, f));
    let mut table = match paths.next() {
        Some(p) => Table::from_path(&p)?,
        None => {
            return Err(Error::InvalidProblem(
                "missing table file entry".to_string(),
            ))
        }
    };
    for path in paths {
        debug!("concatenating table: {}", path.to_string_lossy());
        table.concat(Table::from_path(&path)?)?;
    }
    Ok(table)
}

fn index_ids<'a, I>(ids: I) -> Result<FnvHashMap<String, usize>>
where
    I: Iterator<Item = &'a str>,
{
    let mut map = FnvHashMap::default();
    for (n, id) in ids.enumerate() {
        if map.insert(id.to_string(), n).is_some() {
            return Err(Error::DuplicateId(id.to_string()));
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixture() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../problems/conversion")
            .join(crate::PROBLEM_FILE_NAME)
    }

    #[test]
    fn problem_from_path() {
        let problem = Problem::from_path(fixture()).unwrap();
        assert_eq!(problem.model.name, "conversion");
        assert_eq!(problem.model.species.len(), 2);
        assert_eq!(problem.observables.len(), 2);
        assert_eq!(problem.conditions.len(), 3);
        assert_eq!(problem.measurements.len(), problem.measurement_table.len());
        assert_eq!(problem.parameter_value("k1").unwrap(), 0.5);
        // model default, not listed in the parameter table
        assert_eq!(problem.parameter_value("A0").unwrap(), 1.0);
        assert!(problem.settings.seed.is_none());
    }

    #[test]
    fn missing_problem_file() {
        let res = Problem::from_path("../problems/conversion/nonexistent.yaml");
        assert!(matches!(res, Err(Error::IoError(_))));
    }

    #[test]
    fn unknown_observable_has_suggestion() {
        let problem = Problem::from_path(fixture()).unwrap();
        match problem.observable("obs_c") {
            Err(Error::UnknownObservable(id, Some(similar))) => {
                assert_eq!(id, "obs_c");
                assert!(similar.starts_with("obs_"));
            }
            other => panic!("unexpected: {:?}", other.map(|o| o.id.clone())),
        }
    }

    fn fixture_copy() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let src = fixture().parent().unwrap().to_path_buf();
        for entry in fs::read_dir(&src).unwrap() {
            let entry = entry.unwrap();
            fs::copy(entry.path(), dir.path().join(entry.file_name())).unwrap();
        }
        dir
    }

    fn append(path: &Path, line: &str) {
        let mut content = fs::read_to_string(path).unwrap();
        content.push_str(line);
        fs::write(path, content).unwrap();
    }

    #[test]
    fn unknown_condition_in_design() {
        let dir = fixture_copy();
        let design = dir.path().join("measurement_design.tsv");
        let content = fs::read_to_string(&design).unwrap();
        fs::write(&design, content.replace("\tc_high\t", "\tc_hgh\t")).unwrap();

        let res = Problem::from_path(dir.path().join(crate::PROBLEM_FILE_NAME));
        assert!(matches!(res, Err(Error::UnknownCondition(_, _))));
    }

    #[test]
    fn duplicate_table_ids() {
        let rows = [
            ("parameters.tsv", "k1\tforward rate\tlin\t0.001\t100\t0.5\t1\n"),
            ("conditions.tsv", "c0\tcontrol again\t\t\n"),
            ("observables.tsv", "obs_b\tB\tB\tlog\tsigma_b\tlaplace\n"),
        ];
        for (file, row) in rows.iter() {
            let dir = fixture_copy();
            append(&dir.path().join(file), row);
            let res = Problem::from_path(dir.path().join(crate::PROBLEM_FILE_NAME));
            assert!(
                matches!(res, Err(Error::DuplicateId(_))),
                "duplicate row in {} accepted",
                file
            );
        }
    }

    #[test]
    fn sbml_models_are_rejected() {
        let dir = fixture_copy();
        let path = dir.path().join(crate::PROBLEM_FILE_NAME);
        let content = fs::read_to_string(&path).unwrap();
        fs::write(
            &path,
            content.replace(
                "  - model_files:",
                "  - sbml_files:\n      - model.xml\n    model_files:",
            ),
        )
        .unwrap();
        assert!(matches!(
            Problem::from_path(&path),
            Err(Error::InvalidProblem(_))
        ));
    }

    #[test]
    fn measurement_files_are_concatenated() {
        let dir = fixture_copy();
        let base = Problem::from_path(dir.path().join(crate::PROBLEM_FILE_NAME)).unwrap();

        // same columns, different order
        fs::write(
            dir.path().join("more_design.tsv"),
            "time\tobservableId\tsimulationConditionId\tmeasurement\t\
             preequilibrationConditionId\tobservableParameters\tnoiseParameters\t\
             datasetId\treplicateId\n\
             3\tobs_b\tc_high\t0\t\t\t\td_high\t2\n",
        )
        .unwrap();
        let path = dir.path().join(crate::PROBLEM_FILE_NAME);
        let content = fs::read_to_string(&path).unwrap();
        fs::write(
            &path,
            content.replace(
                "      - measurement_design.tsv",
                "      - measurement_design.tsv\n      - more_design.tsv",
            ),
        )
        .unwrap();

        let problem = Problem::from_path(&path).unwrap();
        assert_eq!(problem.measurements.len(), base.measurements.len() + 1);
        let last = problem.measurements.last().unwrap();
        assert_eq!(last.observable_id, "obs_b");
        assert_eq!(last.simulation_condition_id, "c_high");
        assert_eq!(last.time, Time::Finite(3.0));
        assert_eq!(
            problem.measurement_table.columns(),
            base.measurement_table.columns()
        );
    }

    #[test]
    fn toml_problem_file() {
        let dir = fixture_copy();
        let path = dir.path().join("petab.toml");
        fs::write(
            &path,
            r#"
format_version = 1
parameter_file = "parameters.tsv"

[[problems]]
model_files = ["model.yaml"]
condition_files = ["conditions.tsv"]
observable_files = ["observables.tsv"]
measurement_files = ["measurement_design.tsv"]

[simulation]
seed = 7
rtol = 1e-6
"#,
        )
        .unwrap();
        let problem = Problem::from_path(&path).unwrap();
        let yaml = Problem::from_path(fixture()).unwrap();
        assert_eq!(problem.measurements, yaml.measurements);
        assert_eq!(problem.settings.seed, Some(7));
        assert_eq!(problem.settings.rtol, Some(1e-6));
    }

    #[test]
    fn malformed_problem_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(crate::PROBLEM_FILE_NAME);
        fs::write(&path, "format_version: [1\nproblems: {").unwrap();
        assert!(Problem::from_path(&path).is_err());

        fs::write(
            &path,
            "format_version: 2\nparameter_file: p.tsv\nproblems: []\n",
        )
        .unwrap();
        assert!(matches!(
            Problem::from_path(&path),
            Err(Error::InvalidProblem(_))
        ));
    }
}
