//! Exponentially scaled modified Bessel functions `K0` and `K1`.

use std::f64::consts::PI;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Below this argument the power series is used, above it Steed's continued fraction.
const SERIES_LIMIT: f64 = 2.0;

const MAX_TERMS: usize = 10_000;

/// `(e^x K0(x), e^x K1(x))` for `x > 0`.
///
/// The scaling keeps large arguments representable: kernels only ever need
/// ratios of `K0`/`K1` or products with a compensating exponential.
pub(crate) fn scaled_k0_k1(x: f64) -> (f64, f64) {
    if x <= 0.0 {
        return (f64::INFINITY, f64::INFINITY);
    }
    if x <= SERIES_LIMIT {
        power_series(x)
    } else {
        continued_fraction(x)
    }
}

/// Ascending series in `y = x²/4` with digamma coefficients.
fn power_series(x: f64) -> (f64, f64) {
    let y = 0.25 * x * x;
    // term = y^k / (k!)^2, harmonic = H_k, psi = ψ(k + 1)
    let mut term = 1.0;
    let mut harmonic = 0.0;
    let mut psi = -EULER_GAMMA;
    let (mut i0, mut i1, mut s0, mut s1) = (0.0, 0.0, 0.0, 0.0);

    for k in 0..30 {
        let next = (k + 1) as f64;
        i0 += term;
        s0 += harmonic * term;
        let term1 = term / next;
        i1 += term1;
        let psi_next = psi + 1.0 / next;
        s1 += (psi + psi_next) * term1;
        if k > 2 && term < 1e-17 * i0 {
            break;
        }
        term *= y / (next * next);
        harmonic += 1.0 / next;
        psi = psi_next;
    }

    i1 *= 0.5 * x;
    let log_half = (0.5 * x).ln();
    let k0 = -(log_half + EULER_GAMMA) * i0 + s0;
    let k1 = 1.0 / x + log_half * i1 - 0.25 * x * s1;
    let scale = x.exp();
    (k0 * scale, k1 * scale)
}

/// Steed's method (Temme's CF2) for the scaled pair at moderate and large `x`.
fn continued_fraction(x: f64) -> (f64, f64) {
    let a1 = 0.25;
    let mut b = 2.0 * (1.0 + x);
    let mut d = 1.0 / b;
    let mut h = d;
    let mut delh = d;
    let mut q1 = 0.0;
    let mut q2 = 1.0;
    let mut q = a1;
    let mut c = a1;
    let mut a = -a1;
    let mut s = 1.0 + q * delh;

    for i in 2..MAX_TERMS {
        let fi = i as f64;
        a -= 2.0 * (fi - 1.0);
        c = -a * c / fi;
        let q_next = (q1 - b * q2) / a;
        q1 = q2;
        q2 = q_next;
        q += c * q_next;
        b += 2.0;
        d = 1.0 / (b + a * d);
        delh = (b * d - 1.0) * delh;
        h += delh;
        let dels = q * delh;
        s += dels;
        if (dels / s).abs() < 1e-16 {
            break;
        }
    }

    h *= a1;
    let k0 = (PI / (2.0 * x)).sqrt() / s;
    let k1 = k0 * (x + 0.5 - h) / x;
    (k0, k1)
}
