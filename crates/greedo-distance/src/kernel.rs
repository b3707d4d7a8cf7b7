//! Exponential time kernel
//!
//! ```text
//! μ         = ln 2 / half_life
//! kernel(δ) = exp(−μ|δ|) · (1 + μ|δ|)
//! ```
//!
//! The kernel is 1 at δ = 0 and strictly decreasing in |δ|, which lets the
//! threshold test be turned into a time window around each usage event.

use greedo_common::ConfigError;

/// Time window within which the kernel stays at or above a threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KernelWindow {
    /// Every pair passes (threshold ≤ 0)
    Unbounded,
    /// Only pairs with |δ| ≤ the contained bound can pass
    Bounded(f64),
    /// No pair passes (threshold > 1)
    Empty,
}

impl KernelWindow {
    /// Whether a time difference lies inside the window
    #[inline]
    pub fn contains(&self, delta_s: f64) -> bool {
        match self {
            KernelWindow::Unbounded => true,
            KernelWindow::Bounded(bound) => delta_s.abs() <= *bound,
            KernelWindow::Empty => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialKernel {
    mu: f64,
}

impl ExponentialKernel {
    /// Create a kernel from its half-life in seconds
    pub fn from_half_life(half_life_s: f64) -> Result<Self, ConfigError> {
        if !(half_life_s > 0.0) || !half_life_s.is_finite() {
            return Err(ConfigError::NonPositiveHalfLife(half_life_s));
        }
        Ok(Self {
            mu: std::f64::consts::LN_2 / half_life_s,
        })
    }

    /// Decay rate μ in 1/s
    #[inline]
    pub fn mu(&self) -> f64 {
        self.mu
    }

    /// Kernel value for a time difference in seconds
    #[inline]
    pub fn value(&self, delta_s: f64) -> f64 {
        let x = self.mu * delta_s.abs();
        (-x).exp() * (1.0 + x)
    }

    /// Window of time differences whose kernel value is at least `threshold`.
    ///
    /// The bound is found by bisection on x = μ|δ| and rounded outwards, so
    /// callers still test the exact kernel value at the window edges.
    pub fn window(&self, threshold: f64) -> KernelWindow {
        if threshold <= 0.0 {
            return KernelWindow::Unbounded;
        }
        if threshold > 1.0 {
            return KernelWindow::Empty;
        }

        let profile = |x: f64| (-x).exp() * (1.0 + x);
        let mut lo = 0.0_f64;
        let mut hi = 1.0_f64;
        while profile(hi) >= threshold {
            lo = hi;
            hi *= 2.0;
        }
        for _ in 0..200 {
            let mid = 0.5 * (lo + hi);
            if profile(mid) >= threshold {
                lo = mid;
            } else {
                hi = mid;
            }
            if hi - lo <= f64::EPSILON * hi {
                break;
            }
        }

        KernelWindow::Bounded(hi / self.mu)
    }
}
