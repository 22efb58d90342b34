//! Measurement noise sampling.

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::error::Error;
use crate::problem::{NoiseDistribution, Scale};
use crate::Result;

/// Describes how noise is added to a single simulated value.
#[derive(Debug, Copy, Clone)]
pub struct NoiseModel {
    pub distribution: NoiseDistribution,
    /// Scale on which noise is added, the result is mapped back to linear
    pub transformation: Scale,
    /// Standard deviation for normal noise, scale parameter for laplace
    pub scale: f64,
    /// Return 0 whenever noise flips the sign of the simulated value
    pub zero_bounded: bool,
}

impl NoiseModel {
    /// Draws a noisy version of `value`.
    pub fn sample<R: Rng + ?Sized>(&self, value: f64, rng: &mut R) -> Result<f64> {
        if !self.scale.is_finite() || self.scale < 0.0 {
            return Err(Error::Other(format!("invalid noise scale: {}", self.scale)));
        }
        if self.scale == 0.0 {
            return Ok(value);
        }
        let transformed = self.transformation.apply(value);
        if transformed.is_nan() {
            return Err(Error::Other(format!(
                "value {} can't be mapped to {:?} scale",
                value, self.transformation
            )));
        }
        let noise = match self.distribution {
            NoiseDistribution::Normal => Normal::new(0.0, self.scale)
                .map_err(|e| Error::Other(format!("{:?}", e)))?
                .sample(rng),
            NoiseDistribution::Laplace => sample_laplace(self.scale, rng),
        };
        let noisy = self.transformation.invert(transformed + noise);
        if self.zero_bounded && value.signum() != noisy.signum() {
            return Ok(0.0);
        }
        Ok(noisy)
    }
}

/// Inverse transform sampling of the Laplace distribution centered at 0.
fn sample_laplace<R: Rng + ?Sized>(scale: f64, rng: &mut R) -> f64 {
    let mut u = rng.gen::<f64>() - 0.5;
    while u == -0.5 {
        u = rng.gen::<f64>() - 0.5;
    }
    -scale * u.signum() * (1.0 - 2.0 * u.abs()).ln()
}
