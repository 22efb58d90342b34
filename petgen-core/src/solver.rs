//! Adaptive ODE integration.
//!
//! Integration is done with the Dormand-Prince 5(4) stepper of the
//! `ode_solvers` crate. Systems are described by the [`OdeSystem`] trait,
//! which unlike the crate's own `System` can fail while evaluating the
//! right hand side.

use std::cell::RefCell;

use nalgebra::DVector;
use ode_solvers::dop_shared::OutputType;
use ode_solvers::{Dopri5, System};

use crate::error::Error;
use crate::Result;

type State = DVector<f64>;

/// Horizon after which steady state search gives up.
const MAX_STEADY_STATE_TIME: f64 = 1e9;

// stepper controller settings, same as the crate defaults
const SAFETY_FACTOR: f64 = 0.9;
const BETA: f64 = 0.04;
const FAC_MIN: f64 = 0.2;
const FAC_MAX: f64 = 10.0;
const N_STIFF: u32 = 1000;

/// System of first order ordinary differential equations.
pub trait OdeSystem {
    fn dim(&self) -> usize;
    /// Computes `dy = f(t, y)`.
    fn rhs(&self, t: f64, y: &[f64], dy: &mut [f64]) -> Result<()>;
}

/// Bridges an [`OdeSystem`] to the stepper. The first failure of the
/// right hand side is stored and reported once the stepper returns.
struct Rhs<'a, S: OdeSystem> {
    sys: &'a S,
    error: &'a RefCell<Option<Error>>,
}

impl<S: OdeSystem> System<f64, State> for Rhs<'_, S> {
    fn system(&self, t: f64, y: &State, dy: &mut State) {
        if let Err(e) = self.sys.rhs(t, y.as_slice(), dy.as_mut_slice()) {
            dy.fill(0.0);
            let mut error = self.error.borrow_mut();
            if error.is_none() {
                *error = Some(e);
            }
        }
    }
}

/// Integrator settings.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Integrator {
    pub rtol: f64,
    pub atol: f64,
    /// Maximum number of steps for a single call
    pub max_steps: usize,
}

impl Default for Integrator {
    fn default() -> Self {
        Integrator {
            rtol: 1e-8,
            atol: 1e-10,
            max_steps: 100_000,
        }
    }
}

/// Criterion for accepting a state as steady.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct SteadyState {
    pub rtol: f64,
    pub atol: f64,
}

impl Default for SteadyState {
    fn default() -> Self {
        SteadyState {
            rtol: 1e-8,
            atol: 1e-10,
        }
    }
}

impl Integrator {
    /// Integrates `y` from `t0` to `t1` in place.
    pub fn integrate<S: OdeSystem>(&self, sys: &S, t0: f64, t1: f64, y: &mut [f64]) -> Result<()> {
        if t1 < t0 {
            return Err(Error::IntegrationError(
                t0,
                format!("can't integrate backwards to t={}", t1),
            ));
        }
        if t1 == t0 {
            return Ok(());
        }

        let error = RefCell::new(None);
        let rhs = Rhs { sys, error: &error };
        let max_steps = self.max_steps.min(u32::MAX as usize) as u32;
        let mut stepper = Dopri5::from_param(
            rhs,
            t0,
            t1,
            t1 - t0,
            State::from_column_slice(y),
            self.rtol,
            self.atol,
            SAFETY_FACTOR,
            BETA,
            FAC_MIN,
            FAC_MAX,
            t1 - t0,
            0.0,
            max_steps,
            N_STIFF,
            OutputType::Sparse,
        );
        let res = stepper.integrate();
        if let Some(e) = error.borrow_mut().take() {
            return Err(e);
        }
        if let Err(e) = res {
            return Err(Error::IntegrationError(t0, format!("{:?}", e)));
        }

        let end = match stepper.y_out().last() {
            Some(end) => end,
            None => return Err(Error::IntegrationError(t0, "no output state".to_string())),
        };
        if end.iter().any(|v| !v.is_finite()) {
            return Err(Error::IntegrationError(t1, "non-finite state".to_string()));
        }
        y.copy_from_slice(end.as_slice());
        Ok(())
    }

    /// Integrates `y` starting at `t0` until the state stops changing.
    /// Returns the time at which steady state was reached.
    pub fn integrate_to_steady_state<S: OdeSystem>(
        &self,
        sys: &S,
        t0: f64,
        y: &mut [f64],
        criterion: &SteadyState,
    ) -> Result<f64> {
        let mut dy = vec![0.0; sys.dim()];
        let mut t = t0;
        let mut horizon = 1.0;
        loop {
            sys.rhs(t, y, &mut dy)?;
            let steady = dy
                .iter()
                .zip(y.iter())
                .all(|(d, x)| d.abs() <= criterion.atol + criterion.rtol * x.abs());
            if steady {
                return Ok(t);
            }
            if t - t0 > MAX_STEADY_STATE_TIME {
                return Err(Error::SteadyStateNotReached(t));
            }
            self.integrate(sys, t, t + horizon, y)?;
            t += horizon;
            horizon *= 2.0;
        }
    }
}
