//! Reaction network model definitions, logic for turning deserialized
//! model files into a compiled model.
//!
//! A model is a set of species, each with an initial value, a set of
//! parameters with default values, and a set of reactions. Every reaction
//! has a rate law and stoichiometric coefficients for its reactants and
//! products. The model's right hand side is the sum of all reaction
//! rates weighted by the net stoichiometry.

use std::path::Path;

use fnv::FnvHashMap;
use linked_hash_map::LinkedHashMap;

use crate::error::Error;
use crate::expr::Expr;
use crate::util;
use crate::{Result, TIME_SYMBOL};

/// Species initial value as written in the model file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InitialEntry {
    Number(f64),
    Expression(String),
}

/// Model file structure used for deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelFile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub species: LinkedHashMap<String, InitialEntry>,
    #[serde(default)]
    pub parameters: LinkedHashMap<String, f64>,
    #[serde(default)]
    pub reactions: Vec<ReactionEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub reactants: LinkedHashMap<String, f64>,
    #[serde(default)]
    pub products: LinkedHashMap<String, f64>,
    pub rate: String,
}

/// What a symbol inside a model expression refers to.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Symbol {
    Species(usize),
    Parameter(usize),
    Time,
}

#[derive(Debug)]
pub enum InitialValue {
    Constant(f64),
    Expression(Expr),
}

#[derive(Debug)]
pub struct Species {
    pub id: String,
    pub initial: InitialValue,
}

#[derive(Debug, Clone)]
pub struct Parameter {
    pub id: String,
    /// Default value as defined in the model file
    pub value: f64,
}

#[derive(Debug)]
pub struct Reaction {
    pub id: String,
    pub rate: Expr,
    /// Net stoichiometry as (species index, coefficient) pairs
    pub stoichiometry: Vec<(usize, f64)>,
}

/// Compiled reaction network.
#[derive(Debug)]
pub struct Model {
    pub name: String,
    pub species: Vec<Species>,
    pub parameters: Vec<Parameter>,
    pub reactions: Vec<Reaction>,
    symbols: FnvHashMap<String, Symbol>,
}

impl Model {
    /// Creates a new model from a path to a model file.
    pub fn from_path(path: &Path) -> Result<Model> {
        let file: ModelFile = util::deser_struct_from_path(path)?;
        let mut model = Model::from_file(file)?;
        if model.name.is_empty() {
            if let Some(stem) = path.file_stem() {
                model.name = stem.to_string_lossy().to_string();
            }
        }
        Ok(model)
    }

    /// Creates a new model from a deserialized model file structure.
    pub fn from_file(file: ModelFile) -> Result<Model> {
        let mut symbols = FnvHashMap::default();
        symbols.insert(TIME_SYMBOL.to_string(), Symbol::Time);

        let mut species = Vec::new();
        for (n, (id, initial)) in file.species.iter().enumerate() {
            if symbols.insert(id.clone(), Symbol::Species(n)).is_some() {
                return Err(Error::DuplicateId(id.clone()));
            }
            let initial = match initial {
                InitialEntry::Number(v) => InitialValue::Constant(*v),
                InitialEntry::Expression(s) => InitialValue::Expression(Expr::parse(s)?),
            };
            species.push(Species {
                id: id.clone(),
                initial,
            });
        }

        let mut parameters = Vec::new();
        for (n, (id, value)) in file.parameters.iter().enumerate() {
            if symbols.insert(id.clone(), Symbol::Parameter(n)).is_some() {
                return Err(Error::DuplicateId(id.clone()));
            }
            parameters.push(Parameter {
                id: id.clone(),
                value: *value,
            });
        }

        let mut reactions = Vec::new();
        for (n, entry) in file.reactions.iter().enumerate() {
            let id = if entry.id.is_empty() {
                format!("reaction_{}", n)
            } else {
                entry.id.clone()
            };
            let mut net: LinkedHashMap<usize, f64> = LinkedHashMap::new();
            let sides = entry
                .reactants
                .iter()
                .map(|(s, c)| (s, -c))
                .chain(entry.products.iter().map(|(s, c)| (s, *c)));
            for (species_id, coeff) in sides {
                let idx = match symbols.get(species_id) {
                    Some(Symbol::Species(i)) => *i,
                    _ => {
                        return Err(Error::InvalidModel(format!(
                            "reaction {} refers to unknown species {}",
                            id, species_id
                        )))
                    }
                };
                *net.entry(idx).or_insert(0.0) += coeff;
            }
            reactions.push(Reaction {
                id,
                rate: Expr::parse(&entry.rate)?,
                stoichiometry: net.into_iter().filter(|(_, c)| *c != 0.0).collect(),
            });
        }

        let model = Model {
            name: file.name,
            species,
            parameters,
            reactions,
            symbols,
        };
        model.validate()?;
        Ok(model)
    }

    /// Evaluates all expressions once using default parameter values,
    /// catching references to undefined symbols early.
    fn validate(&self) -> Result<()> {
        let params = self.default_parameters();
        let state = self.initial_state(&params)?;
        let mut dy = vec![0.0; self.species.len()];
        self.rhs(0.0, &state, &params, &mut dy)
    }

    pub fn symbol(&self, name: &str) -> Option<Symbol> {
        self.symbols.get(name).copied()
    }

    pub fn species_index(&self, id: &str) -> Option<usize> {
        match self.symbol(id) {
            Some(Symbol::Species(i)) => Some(i),
            _ => None,
        }
    }

    pub fn parameter_index(&self, id: &str) -> Option<usize> {
        match self.symbol(id) {
            Some(Symbol::Parameter(i)) => Some(i),
            _ => None,
        }
    }

    /// Parameter values as defined in the model file.
    pub fn default_parameters(&self) -> Vec<f64> {
        self.parameters.iter().map(|p| p.value).collect()
    }

    /// Resolves a symbol against the given state and parameter vectors.
    pub fn resolve(&self, name: &str, t: f64, state: &[f64], params: &[f64]) -> Option<f64> {
        match self.symbols.get(name)? {
            Symbol::Species(i) => state.get(*i).copied(),
            Symbol::Parameter(i) => params.get(*i).copied(),
            Symbol::Time => Some(t),
        }
    }

    /// Evaluates initial species values. Initial value expressions can
    /// refer to parameters only.
    pub fn initial_state(&self, params: &[f64]) -> Result<Vec<f64>> {
        let mut state = Vec::with_capacity(self.species.len());
        for species in &self.species {
            let value = match &species.initial {
                InitialValue::Constant(v) => *v,
                InitialValue::Expression(expr) => expr.eval(|name| match self.symbols.get(name)? {
                    Symbol::Parameter(i) => params.get(*i).copied(),
                    Symbol::Time => Some(0.0),
                    Symbol::Species(_) => None,
                })?,
            };
            state.push(value);
        }
        Ok(state)
    }

    /// Computes time derivatives of all species.
    pub fn rhs(&self, t: f64, state: &[f64], params: &[f64], dy: &mut [f64]) -> Result<()> {
        for d in dy.iter_mut() {
            *d = 0.0;
        }
        for reaction in &self.reactions {
            let rate = reaction
                .rate
                .eval(|name| self.resolve(name, t, state, params))?;
            for (idx, coeff) in &reaction.stoichiometry {
                dy[*idx] += coeff * rate;
            }
        }
        Ok(())
    }
}
