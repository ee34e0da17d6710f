//! Energy-preserving feedback matrix for the 8-line network.
//!
//! Two orthogonal generators bound the blend:
//!
//! - `b = 0`: the normalized Sylvester Hadamard matrix `H` (maximally
//!   diffusive, every line feeds every line with equal magnitude).
//! - `b = 1`: a sign-flipped Householder reflection `A·D`, where
//!   `A = I - (2/N)·11ᵀ` and `D = diag(-1, 1, ..., 1)`. Mostly self-feeding
//!   with a small uniform spill, so echoes stay distinct.
//!
//! Both endpoints are written as `H·R` with `R` orthogonal: `R(0) = I` and
//! `R(1) = K = D·H·D`. `K` is a symmetric involution, so it splits space into
//! its `+1` and `-1` eigenspaces (projectors `P₊`, `P₋`). The blend rotates
//! only inside the `-1` eigenspace:
//!
//! ```text
//! R(b) = P₊ + cos(πb)·P₋ + sin(πb)·J
//! ```
//!
//! where `J` is a skew-symmetric complex structure on that eigenspace
//! (`J² = -P₋`). `R(b)` is orthogonal for every `b`, so `M(b) = H·R(b)` is
//! too: the feedback loop neither gains nor loses energy through the matrix at
//! any blend, and stability depends on the loop gain alone.
//!
//! All construction runs in `f64` once; blending is a 3-term weighted sum of
//! precomputed `f32` matrices.

use libm::{cos, sin, sqrt};

/// Number of lines the matrix mixes.
pub const LINES: usize = 8;

const INV_SQRT8: f32 = 0.353_553_38;

type Matrix64 = [[f64; LINES]; LINES];

/// Matrix of `f32` coefficients, row-major.
pub type Matrix = [[f32; LINES]; LINES];

/// In-place fast Walsh-Hadamard transform, normalized to be orthogonal.
#[inline]
pub fn hadamard8(v: &mut [f32; LINES]) {
    let a0 = v[0] + v[1];
    let a1 = v[0] - v[1];
    let a2 = v[2] + v[3];
    let a3 = v[2] - v[3];
    let a4 = v[4] + v[5];
    let a5 = v[4] - v[5];
    let a6 = v[6] + v[7];
    let a7 = v[6] - v[7];

    let b0 = a0 + a2;
    let b1 = a1 + a3;
    let b2 = a0 - a2;
    let b3 = a1 - a3;
    let b4 = a4 + a6;
    let b5 = a5 + a7;
    let b6 = a4 - a6;
    let b7 = a5 - a7;

    v[0] = (b0 + b4) * INV_SQRT8;
    v[1] = (b1 + b5) * INV_SQRT8;
    v[2] = (b2 + b6) * INV_SQRT8;
    v[3] = (b3 + b7) * INV_SQRT8;
    v[4] = (b0 - b4) * INV_SQRT8;
    v[5] = (b1 - b5) * INV_SQRT8;
    v[6] = (b2 - b6) * INV_SQRT8;
    v[7] = (b3 - b7) * INV_SQRT8;
}

fn hadamard64() -> Matrix64 {
    let scale = 1.0 / sqrt(LINES as f64);
    let mut h = [[0.0; LINES]; LINES];
    for (i, row) in h.iter_mut().enumerate() {
        for (j, value) in row.iter_mut().enumerate() {
            *value = if (i & j).count_ones() % 2 == 0 { scale } else { -scale };
        }
    }
    h
}

fn multiply(a: &Matrix64, b: &Matrix64) -> Matrix64 {
    let mut out = [[0.0; LINES]; LINES];
    for i in 0..LINES {
        for j in 0..LINES {
            out[i][j] = (0..LINES).map(|k| a[i][k] * b[k][j]).sum();
        }
    }
    out
}

fn to_f32(m: &Matrix64) -> Matrix {
    let mut out = [[0.0; LINES]; LINES];
    for i in 0..LINES {
        for j in 0..LINES {
            out[i][j] = m[i][j] as f32;
        }
    }
    out
}

/// Flip the sign of the first row (`left`) or first column of `m`.
fn flip_first(m: &mut Matrix64, left: bool) {
    for (i, row) in m.iter_mut().enumerate() {
        for (j, value) in row.iter_mut().enumerate() {
            if (left && i == 0) || (!left && j == 0) {
                *value = -*value;
            }
        }
    }
}

/// Orthonormal basis of the column space of `p` (Gram-Schmidt).
fn column_basis(p: &Matrix64) -> ([[f64; LINES]; LINES], usize) {
    let mut basis = [[0.0; LINES]; LINES];
    let mut count = 0;
    for j in 0..LINES {
        let mut v: [f64; LINES] = core::array::from_fn(|i| p[i][j]);
        for b in &basis[..count] {
            let dot: f64 = v.iter().zip(b).map(|(x, y)| x * y).sum();
            for (x, y) in v.iter_mut().zip(b) {
                *x -= dot * y;
            }
        }
        let norm = sqrt(v.iter().map(|x| x * x).sum());
        if norm > 1e-6 {
            for x in &mut v {
                *x /= norm;
            }
            basis[count] = v;
            count += 1;
        }
    }
    (basis, count)
}

/// The Householder-based alternative generator `(I - (2/N)·11ᵀ)·D`.
pub fn householder_generator() -> Matrix {
    let mut a = [[0.0f64; LINES]; LINES];
    let spill = 2.0 / LINES as f64;
    for (i, row) in a.iter_mut().enumerate() {
        for (j, value) in row.iter_mut().enumerate() {
            *value = if i == j { 1.0 - spill } else { -spill };
        }
    }
    flip_first(&mut a, false);
    to_f32(&a)
}

/// The normalized Hadamard generator.
pub fn hadamard_generator() -> Matrix {
    to_f32(&hadamard64())
}

/// Orthogonal blend between the Hadamard and Householder generators.
///
/// Holds the three precomputed terms of `M(b) = H·P₊ + cos(πb)·H·P₋ +
/// sin(πb)·H·J` and the current blended matrix.
#[derive(Debug, Clone)]
pub struct MixMatrix {
    fixed: Matrix,
    cos_term: Matrix,
    sin_term: Matrix,
    alternate: Matrix,
    current: Matrix,
    blend: f32,
}

impl Default for MixMatrix {
    fn default() -> Self {
        Self::new()
    }
}

impl MixMatrix {
    /// Build the blend terms. Allocation-free; safe to call anywhere, but it
    /// costs a few thousand flops so stages build it once at construction.
    pub fn new() -> Self {
        let h = hadamard64();

        // K = D·H·D
        let mut k = h;
        flip_first(&mut k, true);
        flip_first(&mut k, false);

        let mut p_plus = [[0.0; LINES]; LINES];
        let mut p_minus = [[0.0; LINES]; LINES];
        for i in 0..LINES {
            for j in 0..LINES {
                let identity = if i == j { 1.0 } else { 0.0 };
                p_plus[i][j] = 0.5 * (identity + k[i][j]);
                p_minus[i][j] = 0.5 * (identity - k[i][j]);
            }
        }

        // J = Σ (w·uᵀ - u·wᵀ) over consecutive basis pairs of range(P₋).
        let (basis, count) = column_basis(&p_minus);
        let mut j_mat = [[0.0; LINES]; LINES];
        for pair in 0..count / 2 {
            let u = basis[2 * pair];
            let w = basis[2 * pair + 1];
            for r in 0..LINES {
                for c in 0..LINES {
                    j_mat[r][c] += w[r] * u[c] - u[r] * w[c];
                }
            }
        }

        let fixed = to_f32(&multiply(&h, &p_plus));
        let cos_term = to_f32(&multiply(&h, &p_minus));
        let sin_term = to_f32(&multiply(&h, &j_mat));
        let alternate = householder_generator();

        Self {
            fixed,
            cos_term,
            sin_term,
            alternate,
            current: hadamard_generator(),
            blend: 0.0,
        }
    }

    /// Current blend in `[0, 1]`.
    pub fn blend(&self) -> f32 {
        self.blend
    }

    /// Move the blend. `0` is Hadamard, `1` is the Householder generator.
    /// Both endpoints are stored exactly rather than computed.
    pub fn set_blend(&mut self, blend: f32) {
        let blend = if blend.is_finite() { blend.clamp(0.0, 1.0) } else { 0.0 };
        if blend == self.blend {
            return;
        }
        self.blend = blend;
        if blend <= 0.0 {
            self.current = hadamard_generator();
            return;
        }
        if blend >= 1.0 {
            self.current = self.alternate;
            return;
        }
        let angle = core::f64::consts::PI * f64::from(blend);
        let (c, s) = (cos(angle) as f32, sin(angle) as f32);
        for i in 0..LINES {
            for j in 0..LINES {
                self.current[i][j] =
                    self.fixed[i][j] + c * self.cos_term[i][j] + s * self.sin_term[i][j];
            }
        }
    }

    /// The matrix currently applied.
    pub fn matrix(&self) -> &Matrix {
        &self.current
    }

    /// `v ← M·v`. Uses the fast transform at `blend == 0`.
    #[inline]
    pub fn apply(&self, v: &mut [f32; LINES]) {
        if self.blend <= 0.0 {
            hadamard8(v);
            return;
        }
        let input = *v;
        for (out, row) in v.iter_mut().zip(&self.current) {
            *out = row.iter().zip(&input).map(|(m, x)| m * x).sum();
        }
    }
}

/// Largest absolute entry of `M·Mᵀ - I`.
pub fn orthogonality_error(m: &Matrix) -> f32 {
    let mut worst = 0.0f32;
    for i in 0..LINES {
        for j in 0..LINES {
            let dot: f32 = (0..LINES).map(|k| m[i][k] * m[j][k]).sum();
            let identity = if i == j { 1.0 } else { 0.0 };
            worst = worst.max((dot - identity).abs());
        }
    }
    worst
}
