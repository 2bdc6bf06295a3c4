//! `NIfTI-1` format support.
//!
//! `NIfTI` (Neuroimaging Informatics Technology Initiative) stores a fixed
//! 348-byte header followed by raw voxel data, optionally gzip-compressed.
//! This module decodes and encodes the header, derives voxel-to-world
//! affines and binds the voxel block without copying it.

pub mod codec;
pub mod geometry;
pub mod gzip;
pub mod header;
pub mod image;

pub use geometry::{apply_affine, invert_affine, Affine, AffineSolver, QUATERNION_EPSILON};
pub use gzip::{CompressionGate, Gzip, NoCompression};
pub use header::{
    datatype_codes, CodePolicy, DataType, DecodeConfig, DecodeConfigBuilder, HeaderWarning,
    NiftiHeader, NiftiHeaderBuilder, SliceOrder, SpatialUnits, TemporalUnits, XformCode,
};
pub use image::{bind_data, ArrayData, NiftiElement, NiftiImage, VoxelView};
