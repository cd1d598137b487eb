//! Single-order Taylor coefficient recurrences.
//!
//! Convention: `c[k] = f^(k)(t₀) / k!` (scaled Taylor coefficients).
//! Each function returns the order-`q` coefficient of its result given the
//! coefficients `0..=q` of its operands and `0..q` of its result(s). At
//! `q == 0` it returns the plain function value.
//!
//! Auxiliary results (the partner function of `sin`, the square of `tan`,
//! the radical of `asin`, ...) are computed by the caller first and passed
//! in, matching the result layout of the operator catalog.

use crate::base::Base;

#[inline]
fn int<B: Base>(j: usize) -> B {
    B::from_usize(j)
}

/// `Σ_{j=lo}^{hi} a[j] * b[q-j]`
#[inline]
fn cauchy<B: Base>(q: usize, lo: usize, hi: usize, a: &[B], b: &[B]) -> B {
    let mut sum = B::zero();
    for j in lo..=hi {
        sum = sum + a[j] * b[q - j];
    }
    sum
}

/// `(1/q) Σ_{j=1}^{q} j * a[j] * b[q-j]`, the coefficient of `∫ a' b`.
#[inline]
fn scaled_cauchy<B: Base>(q: usize, a: &[B], b: &[B]) -> B {
    let mut sum = B::zero();
    for j in 1..=q {
        sum = sum + int::<B>(j) * a[j] * b[q - j];
    }
    sum / int(q)
}

// ══════════════════════════════════════════════
//  Arithmetic
// ══════════════════════════════════════════════

/// `z = x * y` (Cauchy product).
#[inline]
pub fn taylor_mul<B: Base>(q: usize, x: &[B], y: &[B]) -> B {
    cauchy(q, 0, q, x, y)
}

/// `z = azmul(x, y)`: the Cauchy product with absolute-zero terms.
#[inline]
pub fn taylor_azmul<B: Base>(q: usize, x: &[B], y: &[B]) -> B {
    let mut sum = B::zero();
    for j in 0..=q {
        sum = sum + x[j].azmul(y[q - j]);
    }
    sum
}

/// `z = x / y`
///
/// `z[q] = (x[q] - Σ_{j=1}^{q} z[q-j] * y[j]) / y[0]`
#[inline]
pub fn taylor_div<B: Base>(q: usize, x: &[B], y: &[B], z: &[B]) -> B {
    if q == 0 {
        return x[0] / y[0];
    }
    let mut sum = x[q];
    for j in 1..=q {
        sum = sum - z[q - j] * y[j];
    }
    sum / y[0]
}

/// `z = p / y` for a parameter `p`.
#[inline]
pub fn taylor_div_pv<B: Base>(q: usize, p: B, y: &[B], z: &[B]) -> B {
    if q == 0 {
        return p / y[0];
    }
    let mut sum = B::zero();
    for j in 1..=q {
        sum = sum - z[q - j] * y[j];
    }
    sum / y[0]
}

// ══════════════════════════════════════════════
//  Exponentials and logarithms
// ══════════════════════════════════════════════

/// `z = exp(x)`
///
/// `z[q] = (1/q) Σ_{j=1}^{q} j * x[j] * z[q-j]`
#[inline]
pub fn taylor_exp<B: Base>(q: usize, x: &[B], z: &[B]) -> B {
    if q == 0 {
        return x[0].exp();
    }
    scaled_cauchy(q, x, z)
}

/// `z = exp(x) - 1`; the recurrence runs on `1 + z`.
#[inline]
pub fn taylor_expm1<B: Base>(q: usize, x: &[B], z: &[B]) -> B {
    if q == 0 {
        return x[0].exp_m1();
    }
    x[q] + scaled_cauchy(q, x, z)
}

/// `z = ln(x)`
///
/// `z[q] = (x[q] - (1/q) Σ_{j=1}^{q-1} j * z[j] * x[q-j]) / x[0]`
#[inline]
pub fn taylor_ln<B: Base>(q: usize, x: &[B], z: &[B]) -> B {
    if q == 0 {
        return x[0].ln();
    }
    (x[q] - log_sum(q, x, z)) / x[0]
}

/// `z = ln(1 + x)`
#[inline]
pub fn taylor_ln_1p<B: Base>(q: usize, x: &[B], z: &[B]) -> B {
    if q == 0 {
        return x[0].ln_1p();
    }
    (x[q] - log_sum(q, x, z)) / (B::one() + x[0])
}

#[inline]
fn log_sum<B: Base>(q: usize, x: &[B], z: &[B]) -> B {
    let mut sum = B::zero();
    for j in 1..q {
        sum = sum + int::<B>(j) * z[j] * x[q - j];
    }
    sum / int(q)
}

/// `z = sqrt(x)`
///
/// `z[q] = (x[q] - Σ_{j=1}^{q-1} z[j] * z[q-j]) / (2 * z[0])`
#[inline]
pub fn taylor_sqrt<B: Base>(q: usize, x: &[B], z: &[B]) -> B {
    if q == 0 {
        return x[0].sqrt();
    }
    let sum = if q > 1 { cauchy(q, 1, q - 1, z, z) } else { B::zero() };
    (x[q] - sum) / (z[0] + z[0])
}

// ══════════════════════════════════════════════
//  Trigonometric and hyperbolic
// ══════════════════════════════════════════════

/// `(sin(x), cos(x))`, coupled.
///
/// `s[q] = (1/q) Σ j x[j] c[q-j]`, `c[q] = -(1/q) Σ j x[j] s[q-j]`
#[inline]
pub fn taylor_sin_cos<B: Base>(q: usize, x: &[B], s: &[B], c: &[B]) -> (B, B) {
    if q == 0 {
        return (x[0].sin(), x[0].cos());
    }
    (scaled_cauchy(q, x, c), -scaled_cauchy(q, x, s))
}

/// `(sinh(x), cosh(x))`, coupled with positive signs.
#[inline]
pub fn taylor_sinh_cosh<B: Base>(q: usize, x: &[B], s: &[B], c: &[B]) -> (B, B) {
    if q == 0 {
        return (x[0].sinh(), x[0].cosh());
    }
    (scaled_cauchy(q, x, c), scaled_cauchy(q, x, s))
}

/// `z = tan(x)` given the auxiliary `y = z²` up to order `q - 1`.
///
/// `z[q] = x[q] + (1/q) Σ_{j=1}^{q} j * x[j] * y[q-j]`
#[inline]
pub fn taylor_tan<B: Base>(q: usize, x: &[B], y: &[B]) -> B {
    if q == 0 {
        return x[0].tan();
    }
    x[q] + scaled_cauchy(q, x, y)
}

/// `z = tanh(x)` given the auxiliary `y = z²` up to order `q - 1`.
#[inline]
pub fn taylor_tanh<B: Base>(q: usize, x: &[B], y: &[B]) -> B {
    if q == 0 {
        return x[0].tanh();
    }
    x[q] - scaled_cauchy(q, x, y)
}

/// `y = z²` once `z[q]` is known.
#[inline]
pub fn taylor_square<B: Base>(q: usize, z: &[B]) -> B {
    cauchy(q, 0, q, z, z)
}

/// Inverse functions of the form `z' = s x' / b`.
///
/// `b` is the auxiliary (the radical for `asin`, `1 + x²` for `atan`, ...)
/// and must already hold order `q`. `s` is `1` or `-1` (for `acos`).
///
/// `z[q] = (s x[q] - (1/q) Σ_{j=1}^{q-1} j z[j] b[q-j]) / b[0]`
#[inline]
pub fn taylor_inverse<B: Base>(q: usize, negate: bool, x: &[B], b: &[B], z: &[B]) -> B {
    let mut sum = B::zero();
    for j in 1..q {
        sum = sum + int::<B>(j) * z[j] * b[q - j];
    }
    let xq = if negate { -x[q] } else { x[q] };
    (xq - sum / int(q)) / b[0]
}

/// Auxiliary radical `b = sqrt(c ± x²)` at order `q > 0`.
///
/// `negate_square` selects `sqrt(1 - x²)`; otherwise this serves both
/// `sqrt(1 + x²)` and `sqrt(x² - 1)`, since the constant `c` only matters at
/// order zero.
#[inline]
pub fn taylor_radical<B: Base>(q: usize, negate_square: bool, x: &[B], b: &[B]) -> B {
    let sq = cauchy(q, 0, q, x, x);
    let sq = if negate_square { -sq } else { sq };
    let sum = if q > 1 { cauchy(q, 1, q - 1, b, b) } else { B::zero() };
    (sq - sum) / (b[0] + b[0])
}

/// Auxiliary polynomial `b = 1 ± x²` at order `q > 0`.
#[inline]
pub fn taylor_one_plus_square<B: Base>(q: usize, negate_square: bool, x: &[B]) -> B {
    let sq = cauchy(q, 0, q, x, x);
    if negate_square {
        -sq
    } else {
        sq
    }
}

// ══════════════════════════════════════════════
//  Special functions
// ══════════════════════════════════════════════

/// `z = erf(x)` given `d = 2/√π exp(-x²)` up to order `q - 1`.
///
/// `z[q] = (1/q) Σ_{j=1}^{q} j * x[j] * d[q-j]`
#[inline]
pub fn taylor_erf<B: Base>(q: usize, x: &[B], d: &[B]) -> B {
    if q == 0 {
        return x[0].erf();
    }
    scaled_cauchy(q, x, d)
}

/// `z = |x|`; the derivative is `sign(x0)` away from the kink.
#[inline]
pub fn taylor_abs<B: Base>(q: usize, x: &[B]) -> B {
    if q == 0 {
        return x[0].abs();
    }
    x[0].sign() * x[q]
}

/// Piecewise-constant functions contribute nothing above order zero.
#[inline]
pub fn taylor_sign<B: Base>(q: usize, x: &[B]) -> B {
    if q == 0 {
        x[0].sign()
    } else {
        B::zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Coefficients of `f(x0 + t)` via the given single-order rule.
    fn series(n: usize, x0: f64, rule: impl Fn(usize, &[f64], &[f64]) -> f64) -> Vec<f64> {
        let mut x = vec![0.0; n];
        x[0] = x0;
        if n > 1 {
            x[1] = 1.0;
        }
        let mut z = vec![0.0; n];
        for q in 0..n {
            z[q] = rule(q, &x, &z);
        }
        z
    }

    #[test]
    fn exp_coefficients_are_scaled_factorials() {
        let z = series(5, 0.3, taylor_exp);
        let mut fact = 1.0;
        for (k, zk) in z.iter().enumerate() {
            if k > 0 {
                fact *= k as f64;
            }
            assert_relative_eq!(*zk, 0.3_f64.exp() / fact, epsilon = 1e-14);
        }
    }

    #[test]
    fn ln_second_coefficient() {
        // ln(x0 + t) = ln x0 + t/x0 - t²/(2 x0²) + ...
        let z = series(3, 2.0, taylor_ln);
        assert_relative_eq!(z[1], 0.5, epsilon = 1e-14);
        assert_relative_eq!(z[2], -1.0 / 8.0, epsilon = 1e-14);
    }

    #[test]
    fn sqrt_matches_binomial_series() {
        let z = series(3, 4.0, taylor_sqrt);
        assert_relative_eq!(z[0], 2.0, epsilon = 1e-14);
        assert_relative_eq!(z[1], 0.25, epsilon = 1e-14);
        assert_relative_eq!(z[2], -1.0 / 64.0, epsilon = 1e-14);
    }

    #[test]
    fn sin_cos_second_order() {
        let x = [0.7, 1.0, 0.0];
        let mut s = [0.0; 3];
        let mut c = [0.0; 3];
        for q in 0..3 {
            let (sq, cq) = taylor_sin_cos(q, &x, &s, &c);
            s[q] = sq;
            c[q] = cq;
        }
        assert_relative_eq!(s[2], -0.7_f64.sin() / 2.0, epsilon = 1e-14);
        assert_relative_eq!(c[1], -0.7_f64.sin(), epsilon = 1e-14);
    }

    #[test]
    fn tan_uses_square_auxiliary() {
        let x = [0.4, 1.0, 0.0];
        let mut z = [0.0; 3];
        let mut y = [0.0; 3];
        for q in 0..3 {
            z[q] = taylor_tan(q, &x, &y);
            y[q] = taylor_square(q, &z);
        }
        let t = 0.4_f64.tan();
        assert_relative_eq!(z[1], 1.0 + t * t, epsilon = 1e-14);
        // d²/dx² tan = 2 tan sec², halved
        assert_relative_eq!(z[2], t * (1.0 + t * t), epsilon = 1e-14);
    }

    #[test]
    fn asin_first_order() {
        let x = [0.5, 1.0];
        let b0 = (1.0 - 0.25_f64).sqrt();
        let b = [b0, taylor_radical(1, true, &x, &[b0, 0.0])];
        let z0 = 0.5_f64.asin();
        let z1 = taylor_inverse(1, false, &x, &b, &[z0, 0.0]);
        assert_relative_eq!(z1, 1.0 / b0, epsilon = 1e-14);
        assert_relative_eq!(b[1], -0.5 / b0, epsilon = 1e-14);
    }
}
