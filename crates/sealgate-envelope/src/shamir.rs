//! Shamir secret sharing over the Ed25519 scalar field.
//!
//! A secret scalar `s` is the constant term of a random polynomial of degree
//! `threshold - 1`. Each evaluation point `x >= 1` yields one share `f(x)`;
//! any `threshold` distinct points recover `s` by Lagrange interpolation at
//! zero, in any order.

use curve25519_dalek::scalar::Scalar;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{EnvelopeError, Result};

/// Sample a uniformly random scalar.
pub fn random_scalar<R: RngCore>(rng: &mut R) -> Scalar {
    let mut wide = [0u8; 64];
    rng.fill_bytes(&mut wide);
    let scalar = Scalar::from_bytes_mod_order_wide(&wide);
    wide.zeroize();
    scalar
}

/// Random polynomial `f(x) = a_0 + a_1 x + ... + a_{t-1} x^{t-1}`, `a_0` secret.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ShamirPolynomial {
    coefficients: Vec<Scalar>,
}

impl ShamirPolynomial {
    /// Build a polynomial hiding `secret` that needs `threshold` points.
    pub fn from_secret<R: RngCore>(secret: Scalar, threshold: u16, rng: &mut R) -> Result<Self> {
        if threshold == 0 {
            return Err(EnvelopeError::InvalidThreshold {
                threshold,
                total_weight: 0,
            });
        }

        let mut coefficients = Vec::with_capacity(threshold as usize);
        coefficients.push(secret);
        for _ in 1..threshold {
            coefficients.push(random_scalar(rng));
        }

        Ok(Self { coefficients })
    }

    /// Evaluate at point `x` (Horner's method).
    pub fn evaluate(&self, x: u16) -> Scalar {
        let x = Scalar::from(x as u64);
        let mut result = Scalar::ZERO;
        for coeff in self.coefficients.iter().rev() {
            result = result * x + coeff;
        }
        result
    }

    /// The share at evaluation point `x`.
    pub fn share(&self, x: u16) -> SharePoint {
        SharePoint {
            x,
            y: self.evaluate(x).to_bytes(),
        }
    }
}

/// One evaluation `(x, f(x))` of a sharing polynomial.
///
/// `y` is stored as canonical little-endian scalar bytes.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct SharePoint {
    pub x: u16,
    pub y: [u8; 32],
}

impl SharePoint {
    fn scalar(&self) -> Result<Scalar> {
        Option::<Scalar>::from(Scalar::from_canonical_bytes(self.y))
            .ok_or_else(|| EnvelopeError::InvalidShare(format!("non-canonical share at x={}", self.x)))
    }

    /// Serialize to `x (2 bytes LE) || y (32 bytes)`.
    pub fn to_bytes(&self) -> [u8; 34] {
        let mut out = [0u8; 34];
        out[..2].copy_from_slice(&self.x.to_le_bytes());
        out[2..].copy_from_slice(&self.y);
        out
    }

    /// Parse the 34-byte form produced by [`SharePoint::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 34 {
            return Err(EnvelopeError::InvalidShare(format!(
                "expected 34 bytes, got {}",
                bytes.len()
            )));
        }
        let x = u16::from_le_bytes([bytes[0], bytes[1]]);
        let mut y = [0u8; 32];
        y.copy_from_slice(&bytes[2..]);
        Ok(Self { x, y })
    }
}

impl std::fmt::Debug for SharePoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SharePoint(x={})", self.x)
    }
}

/// Recover `f(0)` from `threshold` share points.
///
/// Uses the first `threshold` distinct points; duplicates are ignored.
pub fn interpolate_at_zero(points: &[SharePoint], threshold: u16) -> Result<Scalar> {
    let mut selected: Vec<(Scalar, Scalar)> = Vec::with_capacity(threshold as usize);
    let mut seen = std::collections::BTreeSet::new();

    for point in points {
        if point.x == 0 {
            return Err(EnvelopeError::InvalidShare("share at x=0".into()));
        }
        if !seen.insert(point.x) {
            continue;
        }
        selected.push((Scalar::from(point.x as u64), point.scalar()?));
        if selected.len() == threshold as usize {
            break;
        }
    }

    if threshold == 0 || selected.len() < threshold as usize {
        return Err(EnvelopeError::InsufficientShares {
            needed: threshold,
            got: selected.len(),
        });
    }

    let mut secret = Scalar::ZERO;
    for (i, (x_i, y_i)) in selected.iter().enumerate() {
        // L_i(0) = prod_{j != i} x_j / (x_j - x_i)
        let mut numerator = Scalar::ONE;
        let mut denominator = Scalar::ONE;
        for (j, (x_j, _)) in selected.iter().enumerate() {
            if i != j {
                numerator *= x_j;
                denominator *= x_j - x_i;
            }
        }
        secret += y_i * numerator * denominator.invert();
    }

    Ok(secret)
}
