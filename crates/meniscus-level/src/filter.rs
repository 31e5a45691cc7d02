//! Butterworth low-pass design and zero-phase (forward-backward) filtering.
//!
//! The design follows the usual analog-prototype route: poles on the unit
//! circle, frequency pre-warping, bilinear transform, then expansion into
//! transfer-function coefficients `b`/`a` (with `a[0] == 1`).

use nalgebra::{Complex, DMatrix, DVector};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("filter order must be at least 1")]
    ZeroOrder,
    #[error("cutoff must lie strictly between 0 and 1 (got {0})")]
    InvalidCutoff(f64),
    #[error("signal of length {0} is too short to filter")]
    SignalTooShort(usize),
    #[error("steady-state initial conditions are singular")]
    SingularInitialConditions,
    #[error("filter state has {got} values, expected {expected}")]
    StateLength { expected: usize, got: usize },
}

/// IIR filter in transfer-function form.
#[derive(Clone, Debug, PartialEq)]
pub struct IirFilter {
    pub b: Vec<f64>,
    pub a: Vec<f64>,
}

impl IirFilter {
    /// Digital Butterworth low-pass of `order` with normalised `cutoff`
    /// (fraction of Nyquist).
    pub fn butterworth_lowpass(order: usize, cutoff: f64) -> Result<Self, FilterError> {
        if order == 0 {
            return Err(FilterError::ZeroOrder);
        }
        if !(cutoff > 0.0 && cutoff < 1.0) {
            return Err(FilterError::InvalidCutoff(cutoff));
        }

        // sample rate 2 so that the Nyquist frequency is 1
        let fs2 = 4.0;
        let warped = fs2 * (std::f64::consts::PI * cutoff / 2.0).tan();

        let n = order as f64;
        let analog_poles: Vec<Complex<f64>> = (0..order)
            .map(|k| {
                let m = -(n - 1.0) + 2.0 * k as f64;
                let theta = std::f64::consts::PI * m / (2.0 * n);
                -Complex::new(theta.cos(), theta.sin()) * warped
            })
            .collect();

        let gain_analog = warped.powi(order as i32);
        let denom = analog_poles
            .iter()
            .fold(Complex::new(1.0, 0.0), |acc, p| acc * (Complex::new(fs2, 0.0) - p));
        let gain = gain_analog / denom.re;

        let digital_poles: Vec<Complex<f64>> = analog_poles
            .iter()
            .map(|p| (Complex::new(fs2, 0.0) + p) / (Complex::new(fs2, 0.0) - p))
            .collect();
        let digital_zeros = vec![Complex::new(-1.0, 0.0); order];

        let b = poly(&digital_zeros)
            .into_iter()
            .map(|c| c.re * gain)
            .collect();
        let a = poly(&digital_poles).into_iter().map(|c| c.re).collect();
        Ok(Self { b, a })
    }

    /// Number of state variables (`max(len(a), len(b)) - 1`).
    pub fn state_len(&self) -> usize {
        self.a.len().max(self.b.len()) - 1
    }

    /// Gain at DC: `sum(b) / sum(a)`.
    pub fn dc_gain(&self) -> f64 {
        self.b.iter().sum::<f64>() / self.a.iter().sum::<f64>()
    }

    /// Steady-state initial state for a unit step input.
    pub fn steady_state(&self) -> Result<Vec<f64>, FilterError> {
        let (b, a) = self.normalized();
        let m = b.len() - 1;
        if m == 0 {
            return Ok(Vec::new());
        }

        // (I - C^T) zi = b[1..] - a[1..] * b[0], C the companion matrix of a
        let mut lhs = DMatrix::<f64>::identity(m, m);
        for j in 0..m {
            lhs[(j, 0)] += a[j + 1];
        }
        for i in 0..m - 1 {
            lhs[(i, i + 1)] -= 1.0;
        }
        let rhs = DVector::from_iterator(m, (0..m).map(|i| b[i + 1] - a[i + 1] * b[0]));
        lhs.lu()
            .solve(&rhs)
            .map(|zi| zi.iter().copied().collect())
            .ok_or(FilterError::SingularInitialConditions)
    }

    /// Direct form II transposed, starting from state `zi` (updated in place).
    ///
    /// `zi` must hold exactly [`Self::state_len`] values.
    pub fn lfilter(&self, x: &[f64], zi: &mut [f64]) -> Result<Vec<f64>, FilterError> {
        let (b, a) = self.normalized();
        let m = b.len() - 1;
        if zi.len() != m {
            return Err(FilterError::StateLength {
                expected: m,
                got: zi.len(),
            });
        }
        let mut y = Vec::with_capacity(x.len());
        for &xn in x {
            let yn = b[0] * xn + zi.first().copied().unwrap_or(0.0);
            for i in 0..m {
                let carry = if i + 1 < m { zi[i + 1] } else { 0.0 };
                zi[i] = b[i + 1] * xn + carry - a[i + 1] * yn;
            }
            y.push(yn);
        }
        Ok(y)
    }

    /// Forward-backward filtering with odd-extension padding.
    ///
    /// Pad length is `3 * (state_len + 1)`, shortened for short signals.
    pub fn filtfilt(&self, x: &[f64]) -> Result<Vec<f64>, FilterError> {
        if x.len() < 2 {
            return Err(FilterError::SignalTooShort(x.len()));
        }
        let zi = self.steady_state()?;
        let padlen = (3 * (self.state_len() + 1)).min(x.len() - 1);

        let first = x[0];
        let last = x[x.len() - 1];
        let mut ext = Vec::with_capacity(x.len() + 2 * padlen);
        ext.extend((1..=padlen).rev().map(|i| 2.0 * first - x[i]));
        ext.extend_from_slice(x);
        ext.extend((1..=padlen).map(|i| 2.0 * last - x[x.len() - 1 - i]));

        let mut state: Vec<f64> = zi.iter().map(|z| z * ext[0]).collect();
        let forward = self.lfilter(&ext, &mut state)?;

        let reversed: Vec<f64> = forward.iter().rev().copied().collect();
        let mut state: Vec<f64> = zi.iter().map(|z| z * reversed[0]).collect();
        let mut backward = self.lfilter(&reversed, &mut state)?;
        backward.reverse();

        Ok(backward[padlen..padlen + x.len()].to_vec())
    }

    /// Coefficients padded to equal length and scaled so that `a[0] == 1`.
    fn normalized(&self) -> (Vec<f64>, Vec<f64>) {
        let len = self.a.len().max(self.b.len());
        let a0 = self.a.first().copied().unwrap_or(1.0);
        let mut b: Vec<f64> = self.b.iter().map(|v| v / a0).collect();
        let mut a: Vec<f64> = self.a.iter().map(|v| v / a0).collect();
        b.resize(len, 0.0);
        a.resize(len, 0.0);
        (b, a)
    }
}

/// Monic polynomial with the given roots, highest power first.
fn poly(roots: &[Complex<f64>]) -> Vec<Complex<f64>> {
    let mut coeffs = vec![Complex::new(1.0, 0.0)];
    for r in roots {
        let mut next = vec![Complex::new(0.0, 0.0); coeffs.len() + 1];
        for (i, c) in coeffs.iter().enumerate() {
            next[i] += c;
            next[i + 1] -= c * r;
        }
        coeffs = next;
    }
    coeffs
}

/// First difference: `out[i] = x[i + 1] - x[i]`.
pub fn diff(x: &[f64]) -> Vec<f64> {
    x.windows(2).map(|w| w[1] - w[0]).collect()
}
