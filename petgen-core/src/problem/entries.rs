//! Typed rows of the problem tables.

use crate::error::Error;
use crate::expr::Expr;
use crate::table::Table;
use crate::util::parse_float;
use crate::Result;
use crate::*;

/// Scale of a parameter or observable.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Scale {
    Lin,
    Log,
    Log10,
}

impl Scale {
    pub fn from_str(s: Option<&str>, column: &str) -> Result<Scale> {
        match s {
            None | Some("lin") => Ok(Scale::Lin),
            Some("log") => Ok(Scale::Log),
            Some("log10") => Ok(Scale::Log10),
            Some(other) => Err(Error::InvalidValue(other.to_string(), column.to_string())),
        }
    }

    /// Maps a linear value onto this scale.
    pub fn apply(&self, value: f64) -> f64 {
        match self {
            Scale::Lin => value,
            Scale::Log => value.ln(),
            Scale::Log10 => value.log10(),
        }
    }

    /// Maps a value on this scale back to linear.
    pub fn invert(&self, value: f64) -> f64 {
        match self {
            Scale::Lin => value,
            Scale::Log => value.exp(),
            Scale::Log10 => 10f64.powf(value),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum NoiseDistribution {
    Normal,
    Laplace,
}

impl NoiseDistribution {
    pub fn from_str(s: Option<&str>) -> Result<NoiseDistribution> {
        match s {
            None | Some("normal") => Ok(NoiseDistribution::Normal),
            Some("laplace") => Ok(NoiseDistribution::Laplace),
            Some(other) => Err(Error::InvalidValue(
                other.to_string(),
                NOISE_DISTRIBUTION.to_string(),
            )),
        }
    }
}

/// Cell that holds either a number or a reference to a parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueRef {
    Number(f64),
    Parameter(String),
}

impl ValueRef {
    pub fn parse(s: &str) -> ValueRef {
        match parse_float(s) {
            Ok(v) => ValueRef::Number(v),
            Err(_) => ValueRef::Parameter(s.trim().to_string()),
        }
    }

    /// Parses a `;`-separated list of values. Missing cell yields an
    /// empty list.
    pub fn parse_list(s: Option<&str>) -> Vec<ValueRef> {
        match s {
            Some(s) => s
                .split(PARAMETER_SEPARATOR)
                .map(|p| ValueRef::parse(p))
                .collect(),
            None => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterEntry {
    pub id: String,
    pub name: Option<String>,
    pub scale: Scale,
    pub lower_bound: Option<f64>,
    pub upper_bound: Option<f64>,
    /// Value on linear scale
    pub nominal_value: f64,
    pub estimate: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub id: String,
    pub name: Option<String>,
    /// Target (parameter or species id) with the value to set
    pub overrides: Vec<(String, ValueRef)>,
}

#[derive(Debug)]
pub struct Observable {
    pub id: String,
    pub name: Option<String>,
    pub formula: Expr,
    pub transformation: Scale,
    pub noise_formula: Expr,
    pub noise_distribution: NoiseDistribution,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Time {
    Finite(f64),
    SteadyState,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub observable_id: String,
    pub preequilibration_condition_id: Option<String>,
    pub simulation_condition_id: String,
    pub time: Time,
    pub observable_parameters: Vec<ValueRef>,
    pub noise_parameters: Vec<ValueRef>,
}

fn parse_cell(table: &Table, row: usize, column: usize) -> Result<f64> {
    let s = table.get_required(row, column)?;
    parse_float(s).map_err(|_| Error::InvalidValue(s.to_string(), table.columns()[column].clone()))
}

fn parse_optional_cell(table: &Table, row: usize, column: Option<usize>) -> Result<Option<f64>> {
    match column.and_then(|c| table.get(row, c).map(|s| (c, s))) {
        Some((c, s)) => parse_float(s)
            .map(Some)
            .map_err(|_| Error::InvalidValue(s.to_string(), table.columns()[c].clone())),
        None => Ok(None),
    }
}

fn optional_string(table: &Table, row: usize, column: Option<usize>) -> Option<String> {
    column
        .and_then(|c| table.get(row, c))
        .map(|s| s.to_string())
}

pub fn parameters_from_table(table: &Table) -> Result<Vec<ParameterEntry>> {
    let id_col = table.require_column(PARAMETER_ID)?;
    let nominal_col = table.require_column(NOMINAL_VALUE)?;
    let name_col = table.column_index(PARAMETER_NAME);
    let scale_col = table.column_index(PARAMETER_SCALE);
    let lower_col = table.column_index(LOWER_BOUND);
    let upper_col = table.column_index(UPPER_BOUND);
    let estimate_col = table.column_index(ESTIMATE);

    let mut entries = Vec::with_capacity(table.len());
    for row in 0..table.len() {
        let id = table.get_required(row, id_col)?.to_string();
        let estimate = match estimate_col.and_then(|c| table.get(row, c)) {
            None | Some("0") => false,
            Some("1") => true,
            Some(other) => {
                return Err(Error::InvalidValue(other.to_string(), ESTIMATE.to_string()))
            }
        };
        let entry = ParameterEntry {
            name: optional_string(table, row, name_col),
            scale: Scale::from_str(scale_col.and_then(|c| table.get(row, c)), PARAMETER_SCALE)?,
            lower_bound: parse_optional_cell(table, row, lower_col)?,
            upper_bound: parse_optional_cell(table, row, upper_col)?,
            nominal_value: parse_cell(table, row, nominal_col)?,
            estimate,
            id,
        };
        let below = entry.lower_bound.map_or(false, |lb| entry.nominal_value < lb);
        let above = entry.upper_bound.map_or(false, |ub| entry.nominal_value > ub);
        if below || above {
            warn!(
                "parameter {}: nominal value {} outside of bounds [{:?}, {:?}]",
                entry.id, entry.nominal_value, entry.lower_bound, entry.upper_bound
            );
        }
        entries.push(entry);
    }
    Ok(entries)
}

pub fn conditions_from_table(table: &Table) -> Result<Vec<Condition>> {
    let id_col = table.require_column(CONDITION_ID)?;
    let name_col = table.column_index(CONDITION_NAME);
    let targets: Vec<(usize, &String)> = table
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, c)| c.as_str() != CONDITION_ID && c.as_str() != CONDITION_NAME)
        .collect();

    let mut conditions = Vec::with_capacity(table.len());
    for row in 0..table.len() {
        let mut overrides = Vec::new();
        for (col, target) in &targets {
            match table.get(row, *col).map(ValueRef::parse) {
                // `nan` keeps the value the target would have otherwise
                Some(ValueRef::Number(v)) if v.is_nan() => (),
                Some(value) => overrides.push((target.to_string(), value)),
                None => (),
            }
        }
        conditions.push(Condition {
            id: table.get_required(row, id_col)?.to_string(),
            name: optional_string(table, row, name_col),
            overrides,
        });
    }
    Ok(conditions)
}

pub fn observables_from_table(table: &Table) -> Result<Vec<Observable>> {
    let id_col = table.require_column(OBSERVABLE_ID)?;
    let formula_col = table.require_column(OBSERVABLE_FORMULA)?;
    let noise_col = table.require_column(NOISE_FORMULA)?;
    let name_col = table.column_index(OBSERVABLE_NAME);
    let transformation_col = table.column_index(OBSERVABLE_TRANSFORMATION);
    let distribution_col = table.column_index(NOISE_DISTRIBUTION);

    let mut observables = Vec::with_capacity(table.len());
    for row in 0..table.len() {
        observables.push(Observable {
            id: table.get_required(row, id_col)?.to_string(),
            name: optional_string(table, row, name_col),
            formula: Expr::parse(table.get_required(row, formula_col)?)?,
            transformation: Scale::from_str(
                transformation_col.and_then(|c| table.get(row, c)),
                OBSERVABLE_TRANSFORMATION,
            )?,
            noise_formula: Expr::parse(table.get_required(row, noise_col)?)?,
            noise_distribution: NoiseDistribution::from_str(
                distribution_col.and_then(|c| table.get(row, c)),
            )?,
        });
    }
    Ok(observables)
}

pub fn measurements_from_table(table: &Table) -> Result<Vec<Measurement>> {
    let observable_col = table.require_column(OBSERVABLE_ID)?;
    let condition_col = table.require_column(SIMULATION_CONDITION_ID)?;
    let time_col = table.require_column(TIME)?;
    // values are replaced by the simulator, only the presence is checked
    table.require_column(MEASUREMENT)?;
    let preeq_col = table.column_index(PREEQUILIBRATION_CONDITION_ID);
    let obs_par_col = table.column_index(OBSERVABLE_PARAMETERS);
    let noise_par_col = table.column_index(NOISE_PARAMETERS);

    let mut measurements = Vec::with_capacity(table.len());
    for row in 0..table.len() {
        let time = match parse_cell(table, row, time_col)? {
            t if t == f64::INFINITY => Time::SteadyState,
            t if t.is_finite() && t >= 0.0 => Time::Finite(t),
            t => return Err(Error::InvalidTime(format!("{} (row {})", t, row + 2))),
        };
        measurements.push(Measurement {
            observable_id: table.get_required(row, observable_col)?.to_string(),
            preequilibration_condition_id: optional_string(table, row, preeq_col),
            simulation_condition_id: table.get_required(row, condition_col)?.to_string(),
            time,
            observable_parameters: ValueRef::parse_list(obs_par_col.and_then(|c| table.get(row, c))),
            noise_parameters: ValueRef::parse_list(noise_par_col.and_then(|c| table.get(row, c))),
        });
    }
    Ok(measurements)
}
