//! Error types for NIfTI-1 decoding, geometry and image construction.
//!
//! Errors are split by the stage that raises them so callers can decide what
//! is recoverable: a [`FormatError`] always aborts decoding or binding, while
//! a [`GeometryError`] only means no affine could be resolved and the raw
//! header and voxel data remain usable.

use thiserror::Error;

/// Malformed or unrecognized byte-level content.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormatError {
    /// Buffer is shorter than the region being read.
    #[error("buffer truncated: need {needed} bytes, got {available}")]
    Truncated {
        /// Bytes required.
        needed: usize,
        /// Bytes present.
        available: usize,
    },
    /// `sizeof_hdr` is not 348.
    #[error("sizeof_hdr must be 348, got {0}")]
    BadHeaderSize(i32),
    /// Magic is neither `ni1\0` nor `n+1\0`.
    #[error("invalid NIfTI magic {0:?}")]
    BadMagic([u8; 4]),
    /// `dim[0]` outside `1..=7`, or a negative extent.
    #[error("invalid dim[{index}] = {value}")]
    BadDim {
        /// Index into `dim`.
        index: usize,
        /// Offending value.
        value: i16,
    },
    /// Voxel data would start inside the header.
    #[error("vox_offset {vox_offset} is before the end of the header ({sizeof_hdr})")]
    BadVoxOffset {
        /// Declared data offset.
        vox_offset: f32,
        /// Header size.
        sizeof_hdr: i32,
    },
    /// A fixed-width text field is longer than its slot.
    #[error("{field} is {len} bytes, maximum is {max}")]
    TextTooLong {
        /// Field name.
        field: &'static str,
        /// Actual length.
        len: usize,
        /// Slot width.
        max: usize,
    },
    /// Datatype code outside the supported element kinds.
    #[error("unsupported data type code {0}")]
    UnsupportedDatatype(i16),
    /// Array element kind has no supported NIfTI datatype.
    #[error("unknown element kind {0}")]
    UnknownElementKind(&'static str),
    /// `bitpix` disagrees with the declared datatype.
    #[error("bitpix {bitpix} does not match data type code {datatype} (expected {expected})")]
    BitpixMismatch {
        /// Datatype code.
        datatype: i16,
        /// Stored bitpix.
        bitpix: i16,
        /// Bitpix implied by the datatype.
        expected: i16,
    },
    /// qform/sform code outside its enumerated range under a strict policy.
    #[error("{field} {code} is outside the expected range")]
    CodeOutOfRange {
        /// Field name.
        field: &'static str,
        /// Stored code.
        code: i16,
    },
    /// Typed access requested with the wrong element type.
    #[error("element kind mismatch: data is {stored}, requested {requested}")]
    ElementKindMismatch {
        /// Kind held by the view.
        stored: &'static str,
        /// Kind requested by the caller.
        requested: &'static str,
    },
}

/// Failure to derive a voxel-to-world affine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// `b² + c² + d²` exceeds one by more than the tolerance.
    #[error("quaternion is not unit length: w² = {w2}")]
    InvalidQuaternion {
        /// Computed `1 - (b² + c² + d²)`.
        w2: f64,
    },
    /// `pixdim[0]` is not exactly ±1.
    #[error("qfac (pixdim[0]) must be -1 or 1, got {0}")]
    InvalidQfac(f32),
    /// Neither qform nor sform code is set.
    #[error("no valid transform: qform_code and sform_code are both unset")]
    NoValidTransform,
    /// Rotation/scale block cannot be inverted.
    #[error("affine is singular (determinant {0})")]
    SingularAffine(f64),
}

/// Failure to build a header from an in-memory array.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    /// More than seven non-trailing axes.
    #[error("too many dimensions: {0} (NIfTI-1 supports at most 7)")]
    TooManyDimensions(usize),
    /// Extent does not fit the 16-bit `dim` field.
    #[error("extent {extent} on axis {axis} exceeds the NIfTI-1 limit of 32767")]
    ExtentTooLarge {
        /// Axis index.
        axis: usize,
        /// Extent along the axis.
        extent: usize,
    },
    /// Data length disagrees with the shape.
    #[error("shape implies {expected} voxels, data has {got}")]
    ShapeMismatch {
        /// Product of the shape.
        expected: usize,
        /// Element count supplied.
        got: usize,
    },
}

/// Crate-level error.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed header or voxel region.
    #[error(transparent)]
    Format(#[from] FormatError),
    /// Affine derivation failure.
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    /// Header construction failure.
    #[error(transparent)]
    Header(#[from] HeaderError),
    /// Compressed input could not be inflated.
    #[error("decompression failed: {0}")]
    Decompression(String),
    /// Output could not be deflated.
    #[error("compression failed: {0}")]
    Compression(String),
    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
