//! # nifti1
//!
//! Decoding and encoding of `NIfTI-1` neuroimaging buffers.
//!
//! - Bit-exact header codec with byte-order detection from `dim[0]`
//! - qform (quaternion) and sform (direct) affine derivation
//! - Zero-copy voxel views over a shared buffer, with `ndarray` conversion
//! - Transparent gzip through a pluggable compression gate
//!
//! ## Quick Start
//!
//! ```no_run
//! use nifti1::nifti::NiftiImage;
//!
//! # fn main() -> nifti1::Result<()> {
//! let bytes = std::fs::read("brain.nii.gz")?;
//! let image = NiftiImage::from_bytes(bytes)?;
//! println!("shape {:?}, type {}", image.shape(), image.dtype());
//! if let Ok(affine) = image.affine() {
//!     println!("voxel (0,0,0) at {:?}", nifti1::nifti::apply_affine(&affine, [0.0; 3]));
//! }
//! let data = image.to_f32()?;
//! # let _ = data;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod nifti;

pub use error::{Error, Result};
pub use nifti::{DataType, NiftiHeader, NiftiImage};
