//! Complex helpers for frequency-response evaluation and pole finding.

pub use num_complex::Complex64 as Complex;

pub const ZERO: Complex = Complex::new(0.0, 0.0);
pub const ONE: Complex = Complex::new(1.0, 0.0);

/// Evaluate a real-coefficient polynomial (highest power first) at `z`
pub fn polyval(coeffs: &[f64], z: Complex) -> Complex {
    coeffs
        .iter()
        .fold(ZERO, |acc, &c| acc * z + Complex::from(c))
}
