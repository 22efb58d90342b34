//! Contains a collection of useful utility functions.

extern crate strsim;

use std::fs::read;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::Result;

/// Create a static deser object from given path using serde.
///
/// Format is selected based on the file extension.
pub fn deser_struct_from_path<T>(file_path: &Path) -> Result<T>
where
    for<'de> T: serde::Deserialize<'de>,
{
    let ext = file_path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_string();
    let bytes = read(file_path).map_err(|e| {
        Error::IoError(format!("{}: {}", file_path.to_string_lossy(), e))
    })?;
    let d: T = match ext.as_str() {
        "toml" => toml::from_slice(&bytes)?,
        #[cfg(feature = "yaml")]
        "yaml" | "yml" => serde_yaml::from_slice(&bytes)?,
        _ => {
            return Err(Error::UnsupportedFileFormat(
                file_path.to_string_lossy().to_string(),
            ))
        }
    };
    Ok(d)
}

/// Resolves a path found inside a problem file against the problem's
/// directory. Absolute paths are returned as is.
pub fn resolve_relative(base_dir: &Path, path: &str) -> PathBuf {
    let p = PathBuf::from(path);
    if p.is_relative() {
        base_dir.join(p)
    } else {
        p
    }
}

/// Get a similar identifier based on string similarity.
pub fn get_similar<'a, I>(original: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    use self::strsim::normalized_damerau_levenshtein;
    let mut highest_sim = 0f64;
    let mut best = None;
    for candidate in candidates {
        let j = normalized_damerau_levenshtein(candidate, original);
        if j > highest_sim {
            highest_sim = j;
            best = Some(candidate);
        }
    }
    if highest_sim > 0.4f64 {
        best.map(|s| s.to_owned())
    } else {
        None
    }
}

/// Parses a float the way table cells spell them, accepting `inf`,
/// `-inf` and `nan` in any letter case.
pub fn parse_float(s: &str) -> std::result::Result<f64, std::num::ParseFloatError> {
    match s.trim().to_lowercase().as_str() {
        "inf" | "+inf" | "infinity" => Ok(f64::INFINITY),
        "-inf" | "-infinity" => Ok(f64::NEG_INFINITY),
        "nan" => Ok(f64::NAN),
        other => other.parse::<f64>(),
    }
}

#[test]
fn similar_id_is_suggested() {
    let ids = vec!["obs_a", "obs_b", "total"];
    assert_eq!(
        get_similar("obs_c", ids.iter().map(|s| *s)),
        Some("obs_a".to_string())
    );
    assert_eq!(get_similar("zzzzzzzzzz", ids.iter().map(|s| *s)), None);
}

#[test]
fn floats_parse_with_infinity() {
    assert_eq!(parse_float("inf").unwrap(), f64::INFINITY);
    assert_eq!(parse_float(" Inf ").unwrap(), f64::INFINITY);
    assert_eq!(parse_float("2.5e-1").unwrap(), 0.25);
    assert!(parse_float("nan").unwrap().is_nan());
    assert!(parse_float("abc").is_err());
}
