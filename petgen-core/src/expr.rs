//! Precompiled math expressions.
//!
//! Rate laws, initial values, observable and noise formulas are all
//! stored as [`Expr`]s. Parsing and compilation happen once, evaluation
//! resolves symbols through a caller-provided lookup.

extern crate fasteval;

use std::fmt;

use fasteval::Compiler;
use fasteval::Evaler;

use crate::error::Error;
use crate::Result;

/// Precompiles an expression and stores it together with its source.
pub struct Expr {
    source: String,
    instruction: fasteval::Instruction,
    slab: fasteval::Slab,
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Expr({:?})", self.source)
    }
}

impl Expr {
    pub fn parse(source: &str) -> Result<Expr> {
        let mut slab = fasteval::Slab::new();
        let parser = fasteval::Parser::new();
        let instruction = parser
            .parse(source, &mut slab.ps)
            .map_err(|e| Error::ExpressionParseError(source.to_string(), format!("{:?}", e)))?
            .from(&slab.ps)
            .compile(&slab.ps, &mut slab.cs);
        Ok(Expr {
            source: source.to_string(),
            instruction,
            slab,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluates the expression, resolving variables with `lookup`.
    ///
    /// Besides the built-in functions of the expression engine, `exp`,
    /// `ln`, `sqrt` and `pow` are available.
    pub fn eval<F>(&self, mut lookup: F) -> Result<f64>
    where
        F: FnMut(&str) -> Option<f64>,
    {
        let mut ns = |name: &str, args: Vec<f64>| -> Option<f64> {
            if args.is_empty() {
                lookup(name)
            } else {
                call_function(name, &args)
            }
        };
        self.instruction
            .eval(&self.slab, &mut ns)
            .map_err(|e| Error::ExpressionEvalError(self.source.clone(), format!("{:?}", e)))
    }
}

fn call_function(name: &str, args: &[f64]) -> Option<f64> {
    match (name, args) {
        ("exp", [x]) => Some(x.exp()),
        ("ln", [x]) => Some(x.ln()),
        ("sqrt", [x]) => Some(x.sqrt()),
        ("pow", [x, y]) => Some(x.powf(*y)),
        _ => None,
    }
}
