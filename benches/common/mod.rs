use adtape::Base;

// ─── Rosenbrock ────────────────────────────────────────────────────────────

pub fn rosenbrock<T: Base>(x: &[T]) -> T {
    let one = T::one();
    let hundred = T::from_f64(100.0);
    let mut sum = T::zero();
    for i in 0..x.len() - 1 {
        let t1 = one - x[i];
        let t2 = x[i + 1] - x[i] * x[i];
        sum = sum + t1 * t1 + hundred * t2 * t2;
    }
    sum
}

// ─── Rastrigin ─────────────────────────────────────────────────────────────
// f(x) = 10n + Σ[x_i² - 10·cos(2π·x_i)]

pub fn rastrigin<T: Base>(x: &[T]) -> T {
    let ten = T::from_f64(10.0);
    let two_pi = T::from_f64(2.0 * std::f64::consts::PI);
    let mut sum = T::from_usize(10 * x.len());
    for &xi in x {
        sum = sum + xi * xi - ten * (two_pi * xi).cos();
    }
    sum
}

pub fn make_input(n: usize) -> Vec<f64> {
    (0..n).map(|i| 0.5 + 0.01 * i as f64).collect()
}
