//! Closed-form switching and well functions shared by the potential terms.
//!
//! Every function returns the value together with the derivative the callers need,
//! so that energy and force are always computed from the same expression.

/// Cutoff tolerance for the tanh windows: outside the padded window θ < δ.
pub const WELL_DELTA: f64 = 1e-5;

/// A smooth square well between `rmin` and `rmax` with steepness `kappa`.
///
/// `θ(r) = ¼ (1 + tanh κ(r − rmin)) (1 + tanh κ(rmax − r))`. The padded bounds
/// `rmin_theta` and `rmax_theta` mark where θ drops below [`WELL_DELTA`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WellWindow {
    pub rmin: f64,
    pub rmax: f64,
    pub kappa: f64,
    pub rmin_theta: f64,
    pub rmax_theta: f64,
}

impl WellWindow {
    pub fn new(rmin: f64, rmax: f64, kappa: f64) -> Self {
        let pad = (1.0 - 2.0 * WELL_DELTA).atanh() / kappa;
        Self {
            rmin,
            rmax,
            kappa,
            rmin_theta: rmin - pad,
            rmax_theta: rmax + pad,
        }
    }

    /// Whether a squared distance lies strictly inside the padded window.
    #[inline]
    pub fn contains_sq(&self, rsq: f64) -> bool {
        rsq > self.rmin_theta * self.rmin_theta && rsq < self.rmax_theta * self.rmax_theta
    }

    #[inline]
    pub fn theta(&self, r: f64) -> f64 {
        self.theta_and_prd(r).0
    }

    /// θ(r) and `θ′(r) / r`, the factor that turns into a force when multiplied by the
    /// pair vector `x_i − x_j`.
    #[inline]
    pub fn theta_and_prd(&self, r: f64) -> (f64, f64) {
        let t1 = (self.kappa * (r - self.rmin)).tanh();
        let t2 = (self.kappa * (self.rmax - r)).tanh();
        let theta = 0.25 * (1.0 + t1) * (1.0 + t2);
        let prd = self.kappa * theta * (t2 - t1) / r;
        (theta, prd)
    }
}

/// The density switch `σ(ρ) = ½ (1 − tanh κσ(ρ − ρ0))` and its derivative `dσ/dρ`.
#[inline]
pub fn density_switch(rho: f64, rho0: f64, kappa_sigma: f64) -> (f64, f64) {
    let th = (kappa_sigma * (rho - rho0)).tanh();
    let sigma = 0.5 * (1.0 - th);
    let derivative = -kappa_sigma * sigma * (1.0 + th);
    (sigma, derivative)
}

/// The burial window `tanh κ(ρ − ρmin) + tanh κ(ρmax − ρ)` and its derivative in ρ.
#[inline]
pub fn burial_window(rho: f64, rho_min: f64, rho_max: f64, kappa: f64) -> (f64, f64) {
    let t0 = (kappa * (rho - rho_min)).tanh();
    let t1 = (kappa * (rho_max - rho)).tanh();
    (t0 + t1, kappa * (t1 * t1 - t0 * t0))
}

/// An unnormalized Gaussian `exp(−dr² / (2 σ²))`.
#[inline]
pub fn gaussian(dr: f64, sigma_sq: f64) -> f64 {
    (-dr * dr / (2.0 * sigma_sq)).exp()
}

/// The chain-extension factor `ν(r) = ½ (1 + tanh(pref (cut − r)))` and `dν/dr`.
#[inline]
pub fn extension_factor(r: f64, cut: f64, pref: f64) -> (f64, f64) {
    let th = (pref * (cut - r)).tanh();
    let nu = 0.5 * (1.0 + th);
    let derivative = -0.5 * pref * (1.0 - th * th);
    (nu, derivative)
}

/// A one-sided harmonic `k (r − r0)²` and `dE/dr`.
#[inline]
pub fn harmonic(r: f64, r0: f64, k: f64) -> (f64, f64) {
    let dr = r - r0;
    (k * dr * dr, 2.0 * k * dr)
}
