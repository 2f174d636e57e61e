/// Hydrogen atom special functions
/// Radial and angular factors of the hydrogen-like wavefunction in atomic units.

use std::f64::consts::PI;

use once_cell::sync::Lazy;

use crate::error::PhysicsError;

/// Represents quantum numbers (n, l, m_l)
/// n: Principal quantum number (1, 2, 3, ...)
/// l: Azimuthal quantum number (0 to n-1)
/// m_l: Magnetic quantum number (-l to l)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QuantumNumbers {
    pub n: u32,
    pub l: u32,
    pub m_l: i32,
}

impl QuantumNumbers {
    pub fn new(n: u32, l: u32, m_l: i32) -> Option<Self> {
        if n == 0 || l >= n || m_l.unsigned_abs() > l {
            return None;
        }
        Some(QuantumNumbers { n, l, m_l })
    }
}

/// Largest n! that fits in an i64.
const MAX_FACTORIAL: usize = 20;

static FACTORIALS: Lazy<[i64; MAX_FACTORIAL + 1]> = Lazy::new(|| {
    let mut table = [1i64; MAX_FACTORIAL + 1];
    for i in 1..=MAX_FACTORIAL {
        table[i] = table[i - 1] * i as i64;
    }
    table
});

/// n! in 64-bit signed arithmetic. n = 8 needs (n+l)! up to 15!, well inside range.
pub fn factorial(n: u32) -> i64 {
    FACTORIALS[(n as usize).min(MAX_FACTORIAL)]
}

/// Double factorial n!! = n * (n-2) * (n-4) * ... * 1 or 2
pub fn double_factorial(n: i64) -> i64 {
    let mut result = 1i64;
    let mut i = n;
    while i > 1 {
        result *= i;
        i -= 2;
    }
    result
}

/// Generalized Laguerre polynomial L^alpha_n(x).
///
/// Uses the closed forms for n < 2, the three-term recurrence when alpha is
/// non-negative or x lies beyond the point where the alternating series loses
/// precision, and the finite hypergeometric series otherwise.
pub fn laguerre(n: u32, alpha: f64, x: f64) -> Result<f64, PhysicsError> {
    if x.is_nan() || alpha.is_nan() {
        return Err(PhysicsError::Domain { function: "laguerre" });
    }

    match n {
        0 => Ok(1.0),
        1 => Ok(1.0 + alpha - x),
        _ if alpha >= 0.0 || !in_series_zone(n, x) => Ok(laguerre_recurrence(n, alpha, x)),
        _ => Ok(laguerre_series(n, alpha, x)),
    }
}

fn in_series_zone(n: u32, x: f64) -> bool {
    x <= n as f64 + 1.0
}

fn laguerre_recurrence(n: u32, alpha: f64, x: f64) -> f64 {
    let mut l0 = 1.0;
    let mut l1 = 1.0 + alpha - x;

    for k in 2..=n {
        let k_f = k as f64;
        let l_new = ((2.0 * k_f - 1.0 + alpha - x) * l1 - (k_f - 1.0 + alpha) * l0) / k_f;
        l0 = l1;
        l1 = l_new;
    }

    l1
}

/// sum_{k=0}^{n} (-1)^k C(n+alpha, n-k) x^k / k!
fn laguerre_series(n: u32, alpha: f64, x: f64) -> f64 {
    // C(n+alpha, n) = prod_{j=1}^{n} (alpha + j) / j
    let mut term = (1..=n).fold(1.0, |acc, j| acc * (alpha + j as f64) / j as f64);
    let mut terms = Vec::with_capacity(n as usize + 1);
    terms.push(term);

    for k in 1..=n {
        let k_f = k as f64;
        term *= -x * (n as f64 - k_f + 1.0) / (k_f * (alpha + k_f));
        terms.push(term);
    }

    // smallest terms first
    terms.iter().rev().sum()
}

/// Associated Legendre function P^m_l(x), Condon-Shortley phase included.
pub fn associated_legendre(l: u32, m: u32, x: f64) -> Result<f64, PhysicsError> {
    if x.is_nan() {
        return Err(PhysicsError::Domain { function: "associated_legendre" });
    }
    if m > l {
        return Ok(0.0);
    }
    if m == 0 {
        return Ok(legendre(l, x));
    }

    let m_f = m as f64;
    let sign = if m % 2 == 0 { 1.0 } else { -1.0 };
    let pmm = sign * (1.0 - x * x).max(0.0).powf(m_f / 2.0) * double_factorial(2 * m as i64 - 1) as f64;

    if l == m {
        return Ok(pmm);
    }

    let pm1m = x * (2.0 * m_f + 1.0) * pmm;

    if l == m + 1 {
        return Ok(pm1m);
    }

    let mut p0 = pmm;
    let mut p1 = pm1m;

    for k in (m + 2)..=l {
        let k_f = k as f64;
        let pk = ((2.0 * k_f - 1.0) * x * p1 - (k_f + m_f - 1.0) * p0) / (k_f - m_f);
        p0 = p1;
        p1 = pk;
    }

    Ok(p1)
}

/// Legendre polynomial P_l(x), Arfken's form of the Bonnet recurrence.
fn legendre(l: u32, x: f64) -> f64 {
    match l {
        0 => 1.0,
        1 => x,
        _ => {
            let mut p0 = 1.0;
            let mut p1 = x;

            for k in 2..=l {
                let k_f = k as f64;
                let p_new = 2.0 * x * p1 - p0 - (x * p1 - p0) / k_f;
                p0 = p1;
                p1 = p_new;
            }

            p1
        }
    }
}

/// Radial normalization (2/n)^(3/2) * sqrt((n-l-1)! / (2n (n+l)!))
pub fn radial_norm(n: u32, l: u32) -> f64 {
    let n_f = n as f64;
    (2.0 / n_f).powf(1.5) * (factorial(n - l - 1) as f64 / (2.0 * n_f * factorial(n + l) as f64)).sqrt()
}

/// Angular normalization sqrt((2l+1)/4pi * (l-|m|)!/(l+|m|)!)
pub fn angular_norm(l: u32, m_l: i32) -> f64 {
    let m_abs = m_l.unsigned_abs();
    let ratio = factorial(l - m_abs) as f64 / factorial(l + m_abs) as f64;
    ((2.0 * l as f64 + 1.0) / (4.0 * PI) * ratio).sqrt()
}

/// Radial wavefunction R_nl(r) of hydrogen, r in Bohr radii.
pub fn radial_wavefunction(r: f64, n: u32, l: u32) -> Result<f64, PhysicsError> {
    if r.is_nan() {
        return Err(PhysicsError::Domain { function: "radial_wavefunction" });
    }
    if r < 0.0 {
        return Ok(0.0);
    }

    let rho = 2.0 * r / n as f64;
    radial_from_norm(radial_norm(n, l), n, l, rho)
}

/// R_nl evaluated at rho = 2r/n with a precomputed normalization.
pub(crate) fn radial_from_norm(norm: f64, n: u32, l: u32, rho: f64) -> Result<f64, PhysicsError> {
    let poly = laguerre(n - l - 1, (2 * l + 1) as f64, rho)?;
    Ok(norm * rho.powi(l as i32) * (-rho / 2.0).exp() * poly)
}

/// Step of the radial extent integration, in Bohr radii.
const EXTENT_STEP: f64 = 0.01;

/// Radius enclosing `fraction` of the radial probability of (n, l), by
/// midpoint integration of R^2 r^2. Gives up at 8 n^2.
pub fn radial_extent(n: u32, l: u32, fraction: f64) -> Result<f64, PhysicsError> {
    let norm = radial_norm(n, l);
    let limit = 8.0 * (n * n) as f64;
    let mut enclosed = 0.0;
    let mut r = 0.0;
    while enclosed < fraction && r < limit {
        let mid = r + EXTENT_STEP / 2.0;
        let radial = radial_from_norm(norm, n, l, 2.0 * mid / n as f64)?;
        enclosed += radial * radial * mid * mid * EXTENT_STEP;
        r += EXTENT_STEP;
    }
    Ok(r)
}

/// Complex spherical harmonic Y_lm with theta the azimuth and phi the polar angle.
/// Returns (re, im).
pub fn spherical_harmonic(theta: f64, phi: f64, l: u32, m_l: i32) -> Result<(f64, f64), PhysicsError> {
    angular_from_norm(angular_norm(l, m_l), theta, phi, l, m_l)
}

pub(crate) fn angular_from_norm(
    norm: f64,
    theta: f64,
    phi: f64,
    l: u32,
    m_l: i32,
) -> Result<(f64, f64), PhysicsError> {
    let legendre = associated_legendre(l, m_l.unsigned_abs(), phi.cos())?;
    let (s, c) = (m_l as f64 * theta).sin_cos();
    let magnitude = norm * legendre;
    Ok((magnitude * c, magnitude * s))
}

/// |z|^2 computed as Re(z * conj(z)).
pub fn norm_sqr((re, im): (f64, f64)) -> f64 {
    re * re + im * im
}

/// Complex product in rectangular form.
pub fn complex_mul((a, b): (f64, f64), (c, d): (f64, f64)) -> (f64, f64) {
    (a * c - b * d, a * d + b * c)
}

/// One-dimensional radial probability density R^2 r^2, boosted by 4pi for s
/// orbitals since Y_00 carries the 1/sqrt(4pi) that the layer test never sees.
pub fn radial_probability(radial: f64, r: f64, l: u32) -> f64 {
    let rdp = radial * radial * r * r;
    if l == 0 {
        rdp * 4.0 * PI
    } else {
        rdp
    }
}
