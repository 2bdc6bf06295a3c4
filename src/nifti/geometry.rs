//! Voxel-to-world affine derivation.
//!
//! A `NIfTI-1` header carries two independent transforms:
//!
//! - **qform**: a unit quaternion `(b, c, d)` with implied non-negative `w`,
//!   voxel spacings from `pixdim`, the handedness flag `qfac = pixdim[0]` and
//!   a translation `qoffset`.
//! - **sform**: three explicit affine rows `srow_x`, `srow_y`, `srow_z`.
//!
//! [`AffineSolver::best`] prefers the qform whenever `qform_code > 0` and only
//! falls back to the sform when the qform is unset. Most tools prefer the
//! sform; callers that want that order can call [`AffineSolver::sform`] first.

use super::header::NiftiHeader;
use crate::error::GeometryError;
use log::trace;

/// Row-major 4x4 homogeneous transform.
pub type Affine = [[f64; 4]; 4];

/// Default quaternion tolerance: three float32 ULPs at 1.0.
///
/// Quaternion components are stored as `f32`, so `b² + c² + d²` of a
/// unit quaternion routinely lands a few ULPs past one.
pub const QUATERNION_EPSILON: f64 = 3.0 * f32::EPSILON as f64;

/// Below this `w²` is treated as exactly zero.
///
/// Kept at float64 scale: rotations near 180° have `w` around 1e-4, which a
/// float32-sized band would flatten.
const W_CLAMP_EPSILON: f64 = 3.0 * f64::EPSILON;

const IDENTITY3: [[f64; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// Derives affines from header fields using an explicit tolerance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineSolver {
    epsilon: f64,
}

impl Default for AffineSolver {
    fn default() -> Self {
        Self::new(QUATERNION_EPSILON)
    }
}

impl AffineSolver {
    pub const fn new(epsilon: f64) -> Self {
        Self { epsilon }
    }

    pub const fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Reconstruct `[w, b, c, d]` with `w >= 0` from the stored components.
    ///
    /// The solver's epsilon only bounds how far past unit length `(b, c, d)`
    /// may drift before it is rejected.
    pub fn fill_positive(&self, bcd: [f64; 3]) -> Result<[f64; 4], GeometryError> {
        let [b, c, d] = bcd;
        let w2 = 1.0 - (b * b + c * c + d * d);
        if w2 < -self.epsilon {
            return Err(GeometryError::InvalidQuaternion { w2 });
        }
        let w = if w2 < W_CLAMP_EPSILON { 0.0 } else { w2.sqrt() };
        Ok([w, b, c, d])
    }

    /// Rotation matrix of `[w, b, c, d]`, normalizing by its squared norm.
    pub fn quaternion_to_rotation(&self, q: [f64; 4]) -> [[f64; 3]; 3] {
        let [w, x, y, z] = q;
        let nq = w * w + x * x + y * y + z * z;
        if nq < self.epsilon {
            return IDENTITY3;
        }

        let s = 2.0 / nq;
        let (xs, ys, zs) = (x * s, y * s, z * s);
        let (wx, wy, wz) = (w * xs, w * ys, w * zs);
        let (xx, xy, xz) = (x * xs, x * ys, x * zs);
        let (yy, yz, zz) = (y * ys, y * zs, z * zs);

        [
            [1.0 - (yy + zz), xy - wz, xz + wy],
            [xy + wz, 1.0 - (xx + zz), yz - wx],
            [xz - wy, yz + wx, 1.0 - (xx + yy)],
        ]
    }

    /// Affine from the quaternion fields.
    pub fn qform(&self, header: &NiftiHeader) -> Result<Affine, GeometryError> {
        let qfac = header.pixdim[0];
        if qfac != 1.0 && qfac != -1.0 {
            return Err(GeometryError::InvalidQfac(qfac));
        }

        let q = self.fill_positive(header.quatern().map(f64::from))?;
        let r = self.quaternion_to_rotation(q);
        let scale = [
            f64::from(header.pixdim[1]),
            f64::from(header.pixdim[2]),
            f64::from(header.pixdim[3]) * f64::from(qfac),
        ];
        let offset = header.qoffset().map(f64::from);

        let mut affine = identity();
        for (row, out) in affine.iter_mut().take(3).enumerate() {
            for col in 0..3 {
                out[col] = r[row][col] * scale[col];
            }
            out[3] = offset[row];
        }
        Ok(affine)
    }

    /// Affine from the three stored rows.
    pub fn sform(&self, header: &NiftiHeader) -> Affine {
        let row = |r: [f32; 4]| r.map(f64::from);
        [
            row(header.srow_x),
            row(header.srow_y),
            row(header.srow_z),
            [0.0, 0.0, 0.0, 1.0],
        ]
    }

    /// qform if `qform_code > 0`, else sform if `sform_code > 0`.
    pub fn best(&self, header: &NiftiHeader) -> Result<Affine, GeometryError> {
        if header.qform_code > 0 {
            trace!("using qform (qform_code {})", header.qform_code);
            self.qform(header)
        } else if header.sform_code > 0 {
            trace!("using sform (sform_code {})", header.sform_code);
            Ok(self.sform(header))
        } else {
            trace!("no transform code set");
            Err(GeometryError::NoValidTransform)
        }
    }
}

/// 4x4 identity.
pub fn identity() -> Affine {
    [
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ]
}

/// Map a voxel index triple to world coordinates.
pub fn apply_affine(affine: &Affine, ijk: [f64; 3]) -> [f64; 3] {
    std::array::from_fn(|row| {
        let m = &affine[row];
        m[0] * ijk[0] + m[1] * ijk[1] + m[2] * ijk[2] + m[3]
    })
}

/// Inverse of an affine with bottom row `[0, 0, 0, 1]` (world to voxel).
pub fn invert_affine(affine: &Affine) -> Result<Affine, GeometryError> {
    let m = affine;
    let cof = |r0: usize, r1: usize, c0: usize, c1: usize| {
        m[r0][c0] * m[r1][c1] - m[r0][c1] * m[r1][c0]
    };

    // Adjugate of the upper 3x3 block, transposed as it is built.
    let adj = [
        [cof(1, 2, 1, 2), -cof(0, 2, 1, 2), cof(0, 1, 1, 2)],
        [-cof(1, 2, 0, 2), cof(0, 2, 0, 2), -cof(0, 1, 0, 2)],
        [cof(1, 2, 0, 1), -cof(0, 2, 0, 1), cof(0, 1, 0, 1)],
    ];
    let det = m[0][0] * adj[0][0] + m[0][1] * adj[1][0] + m[0][2] * adj[2][0];
    if !det.is_normal() {
        return Err(GeometryError::SingularAffine(det));
    }

    let mut inv = identity();
    for row in 0..3 {
        for col in 0..3 {
            inv[row][col] = adj[row][col] / det;
        }
        inv[row][3] = -(0..3).map(|k| inv[row][k] * m[k][3]).sum::<f64>();
    }
    Ok(inv)
}

impl NiftiHeader {
    /// Quaternion affine with the default tolerance.
    pub fn qform_affine(&self) -> Result<Affine, GeometryError> {
        AffineSolver::default().qform(self)
    }

    /// Direct affine from the stored rows.
    pub fn sform_affine(&self) -> Affine {
        AffineSolver::default().sform(self)
    }

    /// Preferred affine with the default tolerance.
    pub fn best_affine(&self) -> Result<Affine, GeometryError> {
        AffineSolver::default().best(self)
    }
}
