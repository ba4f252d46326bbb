//! Gaver–Stehfest numerical Laplace inversion.

use std::f64::consts::LN_2;
use std::sync::OnceLock;

/// Number of Stehfest terms.
pub const STEHFEST_TERMS: usize = 12;

static WEIGHTS: OnceLock<[f64; STEHFEST_TERMS]> = OnceLock::new();

/// Stehfest weights `V_i` for [`STEHFEST_TERMS`] terms, computed once.
pub fn stehfest_weights() -> &'static [f64; STEHFEST_TERMS] {
    WEIGHTS.get_or_init(compute_weights)
}

fn factorial(n: usize) -> f64 {
    (1..=n).map(|k| k as f64).product()
}

fn compute_weights() -> [f64; STEHFEST_TERMS] {
    let half = STEHFEST_TERMS / 2;
    let mut weights = [0.0; STEHFEST_TERMS];
    for (idx, w) in weights.iter_mut().enumerate() {
        let i = idx + 1;
        let sum: f64 = ((i + 1) / 2..=i.min(half))
            .map(|k| {
                (k as f64).powi(half as i32) * factorial(2 * k)
                    / (factorial(half - k)
                        * factorial(k)
                        * factorial(k - 1)
                        * factorial(i - k)
                        * factorial(2 * k - i))
            })
            .sum();
        let sign = if (half + i) % 2 == 0 { 1.0 } else { -1.0 };
        *w = sign * sum;
    }
    weights
}

/// Invert `transform` at time `t > 0`.
///
/// Returns `(f(t), t·f'(t))`: the second value inverts `s·F(s)`, which is the
/// log-time derivative of `f` when `f(0) = 0`.
pub fn stehfest_invert(transform: impl Fn(f64) -> f64, t: f64) -> (f64, f64) {
    let step = LN_2 / t;
    let mut value = 0.0;
    let mut derivative = 0.0;
    for (idx, w) in stehfest_weights().iter().enumerate() {
        let s = (idx + 1) as f64 * step;
        let f = transform(s);
        value += w * f;
        derivative += w * s * f;
    }
    (value * step, derivative * LN_2)
}
