//! Seasonal ARIMA estimated by conditional sum of squares.
//!
//! The model is
//!
//! ```text
//! φ(B) Φ(Bˢ) (1 − B)ᵈ (1 − Bˢ)ᴰ yₜ = θ(B) Θ(Bˢ) εₜ
//! ```
//!
//! with no trend term. AR polynomials are kept stationary by optimising over
//! partial autocorrelations; MA polynomials are left unconstrained.

use super::ForecastError;
use super::optimizer::NelderMead;

/// Fewest whole seasons of differenced data accepted for a fit.
const MIN_SEASONS: usize = 5;

/// Residual magnitude beyond which a parameter set counts as explosive.
const EXPLOSION_LIMIT: f64 = 1e150;

/// Model orders `(p, d, q) × (P, D, Q, s)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SarimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    pub seasonal_p: usize,
    pub seasonal_d: usize,
    pub seasonal_q: usize,
    pub period: usize,
}

impl SarimaOrder {
    /// (2,1,2)×(0,1,2,7): the weekly passenger model.
    pub const WEEKLY: SarimaOrder = SarimaOrder {
        p: 2,
        d: 1,
        q: 2,
        seasonal_p: 0,
        seasonal_d: 1,
        seasonal_q: 2,
        period: 7,
    };

    pub fn param_count(&self) -> usize {
        self.p + self.q + self.seasonal_p + self.seasonal_q
    }

    /// Observations consumed by differencing.
    pub fn differencing_lag(&self) -> usize {
        self.d + self.seasonal_d * self.period
    }

    fn ar_degree(&self) -> usize {
        self.p + self.seasonal_p * self.period
    }

    fn ma_degree(&self) -> usize {
        self.q + self.seasonal_q * self.period
    }

    pub fn min_observations(&self) -> usize {
        let by_season = MIN_SEASONS * self.period.max(1) + self.differencing_lag();
        let by_lags = self.differencing_lag() + self.ar_degree() + self.ma_degree() + 1;
        by_season.max(by_lags)
    }

    fn difference(&self, data: &[f64]) -> Vec<f64> {
        let mut result = data.to_vec();
        for _ in 0..self.d {
            result = difference(&result, 1);
        }
        for _ in 0..self.seasonal_d {
            result = difference(&result, self.period);
        }
        result
    }

    /// `(1 − B)ᵈ (1 − Bˢ)ᴰ` as a lag polynomial.
    fn integration_polynomial(&self) -> Vec<f64> {
        let mut poly = vec![1.0];
        for _ in 0..self.d {
            poly = poly_mul(&poly, &lag_polynomial(&[1.0], 1, -1.0));
        }
        for _ in 0..self.seasonal_d {
            poly = poly_mul(&poly, &lag_polynomial(&[1.0], self.period, -1.0));
        }
        poly
    }
}

/// Fitted coefficients in the sign convention of the model equation.
#[derive(Debug, Clone, PartialEq)]
pub struct SarimaParams {
    pub ar: Vec<f64>,
    pub ma: Vec<f64>,
    pub seasonal_ar: Vec<f64>,
    pub seasonal_ma: Vec<f64>,
}

impl SarimaParams {
    fn zeros(order: &SarimaOrder) -> Self {
        Self {
            ar: vec![0.0; order.p],
            ma: vec![0.0; order.q],
            seasonal_ar: vec![0.0; order.seasonal_p],
            seasonal_ma: vec![0.0; order.seasonal_q],
        }
    }

    /// Maps an optimiser point `[ar.., ma.., seasonal_ar.., seasonal_ma..]`
    /// onto model coefficients.
    fn from_unconstrained(order: &SarimaOrder, x: &[f64]) -> Self {
        let (ar, rest) = x.split_at(order.p);
        let (ma, rest) = rest.split_at(order.q);
        let (seasonal_ar, seasonal_ma) = rest.split_at(order.seasonal_p);

        Self {
            ar: constrain_stationary(ar),
            ma: ma.to_vec(),
            seasonal_ar: constrain_stationary(seasonal_ar),
            seasonal_ma: seasonal_ma.to_vec(),
        }
    }

    /// `φ(B) Φ(Bˢ)`
    fn ar_polynomial(&self, period: usize) -> Vec<f64> {
        poly_mul(
            &lag_polynomial(&self.ar, 1, -1.0),
            &lag_polynomial(&self.seasonal_ar, period, -1.0),
        )
    }

    /// `θ(B) Θ(Bˢ)`
    fn ma_polynomial(&self, period: usize) -> Vec<f64> {
        poly_mul(
            &lag_polynomial(&self.ma, 1, 1.0),
            &lag_polynomial(&self.seasonal_ma, period, 1.0),
        )
    }

    /// Expanded ARMA recursion coefficients `(a₁.., c₁..)` for
    /// `wₜ = Σ aᵢ wₜ₋ᵢ + eₜ + Σ cⱼ eₜ₋ⱼ`.
    fn recursion(&self, period: usize) -> (Vec<f64>, Vec<f64>) {
        let ar = self.ar_polynomial(period)[1..].iter().map(|c| -c).collect();
        let ma = self.ma_polynomial(period)[1..].to_vec();
        (ar, ma)
    }
}

/// One forecast step on the original scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastStep {
    pub mean: f64,
    pub std_error: f64,
}

#[derive(Debug, Clone)]
pub struct SarimaModel {
    order: SarimaOrder,
    params: SarimaParams,
    sigma2: f64,
    data: Vec<f64>,
    /// Residuals aligned with the differenced series.
    residuals: Vec<f64>,
    iterations: usize,
}

impl SarimaModel {
    pub fn fit(data: &[f64], order: SarimaOrder) -> Result<Self, ForecastError> {
        let required = order.min_observations();
        if data.len() < required {
            return Err(ForecastError::InsufficientData {
                required,
                actual: data.len(),
            });
        }
        if data.iter().any(|x| !x.is_finite()) {
            return Err(ForecastError::InvalidData(
                "series contains NaN or infinite values".to_string(),
            ));
        }

        let w = order.difference(data);
        let sum_w2: f64 = w.iter().map(|v| v * v).sum();
        let sum_y2: f64 = data.iter().map(|v| v * v).sum();

        // Nothing left to explain once differenced: flat or exactly periodic.
        if sum_w2 <= f64::EPSILON * sum_y2.max(1.0) {
            return Ok(Self {
                order,
                params: SarimaParams::zeros(&order),
                sigma2: 0.0,
                data: data.to_vec(),
                residuals: vec![0.0; w.len()],
                iterations: 0,
            });
        }

        let objective = |x: &[f64]| {
            let params = SarimaParams::from_unconstrained(&order, x);
            let (ar, ma) = params.recursion(order.period);
            match css_residuals(&w, &ar, &ma) {
                Some(e) => e.iter().map(|v| v * v).sum::<f64>() / sum_w2,
                None => f64::INFINITY,
            }
        };

        let start = vec![0.0; order.param_count()];
        let minimum = NelderMead::default().minimize(objective, &start);
        if !minimum.converged || !minimum.value.is_finite() {
            return Err(ForecastError::ConvergenceFailure {
                iterations: minimum.iterations,
            });
        }

        let params = SarimaParams::from_unconstrained(&order, &minimum.point);
        let (ar, ma) = params.recursion(order.period);
        let residuals = css_residuals(&w, &ar, &ma).ok_or_else(|| {
            ForecastError::NumericalError("residuals diverged at the optimum".to_string())
        })?;
        let effective = w.len() - ar.len();
        let sigma2 = residuals.iter().map(|v| v * v).sum::<f64>() / effective as f64;

        Ok(Self {
            order,
            params,
            sigma2,
            data: data.to_vec(),
            residuals,
            iterations: minimum.iterations,
        })
    }

    pub fn params(&self) -> &SarimaParams {
        &self.params
    }

    /// Innovation variance.
    pub fn sigma2(&self) -> f64 {
        self.sigma2
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Forecasts `steps` values past the end of the fitted data. Future shocks
    /// are zero; standard errors come from the MA(∞) weights of the integrated
    /// model.
    pub fn forecast(&self, steps: usize) -> Result<Vec<ForecastStep>, ForecastError> {
        let period = self.order.period;
        let (_, ma) = self.params.recursion(period);
        let full_ar = poly_mul(
            &self.params.ar_polynomial(period),
            &self.order.integration_polynomial(),
        );
        let phi: Vec<f64> = full_ar[1..].iter().map(|c| -c).collect();

        let n = self.data.len();
        let offset = self.order.differencing_lag();
        let mut y = self.data.clone();
        let mut e = vec![0.0; n];
        e[offset..].copy_from_slice(&self.residuals);

        for h in 0..steps {
            let t = n + h;
            let ar_part: f64 = phi.iter().enumerate().map(|(i, a)| a * y[t - i - 1]).sum();
            let ma_part: f64 = ma.iter().enumerate().map(|(j, c)| c * e[t - j - 1]).sum();
            y.push(ar_part + ma_part);
            e.push(0.0);
        }

        let psi = psi_weights(&phi, &ma, steps);
        let mut cumulative = 0.0;
        let mut out = Vec::with_capacity(steps);
        for h in 0..steps {
            cumulative += psi[h] * psi[h];
            let step = ForecastStep {
                mean: y[n + h],
                std_error: (self.sigma2 * cumulative).sqrt(),
            };
            if !step.mean.is_finite() || !step.std_error.is_finite() {
                return Err(ForecastError::NumericalError(format!(
                    "forecast step {} is not finite",
                    h + 1
                )));
            }
            out.push(step);
        }

        Ok(out)
    }
}

/// Conditional residuals of `wₜ = Σ aᵢ wₜ₋ᵢ + eₜ + Σ cⱼ eₜ₋ⱼ`, with
/// pre-sample shocks at zero and the first `ar.len()` residuals fixed at zero.
/// `None` when the recursion explodes.
fn css_residuals(w: &[f64], ar: &[f64], ma: &[f64]) -> Option<Vec<f64>> {
    let start = ar.len().min(w.len());
    let mut e = vec![0.0; w.len()];

    for t in start..w.len() {
        let mut v = w[t];
        for (i, a) in ar.iter().enumerate() {
            v -= a * w[t - i - 1];
        }
        for (j, c) in ma.iter().enumerate().take(t) {
            v -= c * e[t - j - 1];
        }
        if !v.is_finite() || v.abs() > EXPLOSION_LIMIT {
            return None;
        }
        e[t] = v;
    }

    Some(e)
}

/// MA(∞) weights ψ₀..ψₖ₋₁ of `yₜ = Σ φᵢ yₜ₋ᵢ + εₜ + Σ cⱼ εₜ₋ⱼ`.
fn psi_weights(phi: &[f64], ma: &[f64], count: usize) -> Vec<f64> {
    let mut psi = Vec::with_capacity(count);
    for k in 0..count {
        let mut v = if k == 0 {
            1.0
        } else {
            ma.get(k - 1).copied().unwrap_or(0.0)
        };
        for (i, a) in phi.iter().enumerate().take(k) {
            v += a * psi[k - i - 1];
        }
        psi.push(v);
    }
    psi
}

/// Maps unconstrained reals to the coefficients of a stationary AR
/// polynomial through partial autocorrelations in (−1, 1).
fn constrain_stationary(unconstrained: &[f64]) -> Vec<f64> {
    let n = unconstrained.len();
    if n == 0 {
        return Vec::new();
    }
    let r: Vec<f64> = unconstrained
        .iter()
        .map(|x| x / (1.0 + x * x).sqrt())
        .collect();

    let mut y = vec![vec![0.0; n]; n];
    for k in 0..n {
        for i in 0..k {
            y[k][i] = y[k - 1][i] + r[k] * y[k - 1][k - i - 1];
        }
        y[k][k] = r[k];
    }

    y[n - 1].iter().map(|v| -v).collect()
}

/// `1 + sign·c₁Bˡᵃᵍ + sign·c₂B²ˡᵃᵍ + …`
fn lag_polynomial(coeffs: &[f64], lag: usize, sign: f64) -> Vec<f64> {
    let mut poly = vec![0.0; coeffs.len() * lag + 1];
    poly[0] = 1.0;
    for (i, c) in coeffs.iter().enumerate() {
        poly[(i + 1) * lag] = sign * c;
    }
    poly
}

fn poly_mul(a: &[f64], b: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

fn difference(data: &[f64], lag: usize) -> Vec<f64> {
    data.windows(lag + 1).map(|w| w[lag] - w[0]).collect()
}
