//! Contains structs used for problem file deserialization.
//!
//! Some fields accept more than one shape, for example `parameter_file`
//! can be either a single path or a list of paths, and `format_version`
//! can be written as a number or as a string. Untagged enums cover those
//! cases, conversion into proper objects happens in the parent module.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemFile {
    pub format_version: FormatVersion,
    pub parameter_file: OneOrMany,
    pub problems: Vec<ProblemEntry>,
    #[serde(default)]
    pub simulation: SimulationEntry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FormatVersion {
    Number(u32),
    Text(String),
}

impl FormatVersion {
    /// Major component of the format version, if it can be read.
    pub fn major(&self) -> Option<u32> {
        match self {
            FormatVersion::Number(n) => Some(*n),
            FormatVersion::Text(s) => s.trim().split('.').next()?.parse().ok(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProblemEntry {
    #[serde(default)]
    pub model_files: Vec<String>,
    #[serde(default)]
    pub sbml_files: Vec<String>,
    #[serde(default)]
    pub condition_files: Vec<String>,
    #[serde(default)]
    pub measurement_files: Vec<String>,
    #[serde(default)]
    pub observable_files: Vec<String>,
}

/// Optional simulation settings stored alongside the problem. Anything
/// left out falls back to the defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationEntry {
    pub rtol: Option<f64>,
    pub atol: Option<f64>,
    pub max_steps: Option<usize>,
    pub steady_state_rtol: Option<f64>,
    pub steady_state_atol: Option<f64>,
    pub noise_scaling_factor: Option<f64>,
    pub zero_bounded: Option<bool>,
    pub seed: Option<u64>,
}
