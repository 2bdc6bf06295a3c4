//! `NIfTI-1` header parsing, validation and serialization.
//!
//! The 348-byte header is described by a single offset table ([`layout`]).
//! Decoding and encoding both walk that table through the byte codec, so a
//! header produced by [`NiftiHeader::from_bytes`] re-encodes to the same bytes.
//!
//! There is no byte-order field in NIfTI-1: the order is inferred from
//! `dim[0]`, which must lie in `1..=7`.

use super::codec::{self, Field, FieldReader, FieldWriter, ScalarKind};
use crate::error::{FormatError, Result};
use log::{debug, warn};
use std::borrow::Cow;

/// `NIfTI-1` header field layout.
pub mod layout {
    use super::{Field, ScalarKind::*};

    pub const SIZEOF_HDR: Field = Field::scalar("sizeof_hdr", 0, Int32);
    pub const DATA_TYPE: Field = Field::text("data_type", 4, 10);
    pub const DB_NAME: Field = Field::text("db_name", 14, 18);
    pub const EXTENTS: Field = Field::scalar("extents", 32, Int32);
    pub const SESSION_ERROR: Field = Field::scalar("session_error", 36, Int16);
    pub const REGULAR: Field = Field::scalar("regular", 38, Int8);
    pub const DIM_INFO: Field = Field::scalar("dim_info", 39, Int8);
    pub const DIM: Field = Field::array("dim", 40, Int16, 8);
    pub const INTENT_P1: Field = Field::scalar("intent_p1", 56, Float32);
    pub const INTENT_P2: Field = Field::scalar("intent_p2", 60, Float32);
    pub const INTENT_P3: Field = Field::scalar("intent_p3", 64, Float32);
    pub const INTENT_CODE: Field = Field::scalar("intent_code", 68, Int16);
    pub const DATATYPE: Field = Field::scalar("datatype", 70, Int16);
    pub const BITPIX: Field = Field::scalar("bitpix", 72, Int16);
    pub const SLICE_START: Field = Field::scalar("slice_start", 74, Int16);
    pub const PIXDIM: Field = Field::array("pixdim", 76, Float32, 8);
    pub const VOX_OFFSET: Field = Field::scalar("vox_offset", 108, Float32);
    pub const SCL_SLOPE: Field = Field::scalar("scl_slope", 112, Float32);
    pub const SCL_INTER: Field = Field::scalar("scl_inter", 116, Float32);
    pub const SLICE_END: Field = Field::scalar("slice_end", 120, Int16);
    pub const SLICE_CODE: Field = Field::scalar("slice_code", 122, Int8);
    pub const XYZT_UNITS: Field = Field::scalar("xyzt_units", 123, Int8);
    pub const CAL_MAX: Field = Field::scalar("cal_max", 124, Float32);
    pub const CAL_MIN: Field = Field::scalar("cal_min", 128, Float32);
    pub const SLICE_DURATION: Field = Field::scalar("slice_duration", 132, Float32);
    pub const TOFFSET: Field = Field::scalar("toffset", 136, Float32);
    pub const GLMAX: Field = Field::scalar("glmax", 140, Int32);
    pub const GLMIN: Field = Field::scalar("glmin", 144, Int32);
    pub const DESCRIP: Field = Field::text("descrip", 148, 80);
    pub const AUX_FILE: Field = Field::text("aux_file", 228, 24);
    pub const QFORM_CODE: Field = Field::scalar("qform_code", 252, Int16);
    pub const SFORM_CODE: Field = Field::scalar("sform_code", 254, Int16);
    pub const QUATERN_B: Field = Field::scalar("quatern_b", 256, Float32);
    pub const QUATERN_C: Field = Field::scalar("quatern_c", 260, Float32);
    pub const QUATERN_D: Field = Field::scalar("quatern_d", 264, Float32);
    pub const QOFFSET_X: Field = Field::scalar("qoffset_x", 268, Float32);
    pub const QOFFSET_Y: Field = Field::scalar("qoffset_y", 272, Float32);
    pub const QOFFSET_Z: Field = Field::scalar("qoffset_z", 276, Float32);
    pub const SROW_X: Field = Field::array("srow_x", 280, Float32, 4);
    pub const SROW_Y: Field = Field::array("srow_y", 296, Float32, 4);
    pub const SROW_Z: Field = Field::array("srow_z", 312, Float32, 4);
    pub const INTENT_NAME: Field = Field::text("intent_name", 328, 16);
    pub const MAGIC: Field = Field::text("magic", 344, 4);
}

/// Magic for a single `.nii` file (header and data together).
pub const MAGIC_SINGLE: [u8; 4] = *b"n+1\0";

/// Magic for a `.hdr`/`.img` pair.
pub const MAGIC_PAIR: [u8; 4] = *b"ni1\0";

/// Voxel element kinds that can be bound to a typed view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum DataType {
    /// Unsigned 8-bit integer
    UInt8 = 2,
    /// Signed 16-bit integer
    Int16 = 4,
    /// Signed 32-bit integer
    Int32 = 8,
    /// 32-bit floating point
    Float32 = 16,
    /// 64-bit floating point
    Float64 = 64,
}

impl DataType {
    /// Parse from a `NIfTI` datatype code.
    pub fn from_code(code: i16) -> std::result::Result<Self, FormatError> {
        match code {
            2 => Ok(Self::UInt8),
            4 => Ok(Self::Int16),
            8 => Ok(Self::Int32),
            16 => Ok(Self::Float32),
            64 => Ok(Self::Float64),
            _ => Err(FormatError::UnsupportedDatatype(code)),
        }
    }

    /// `NIfTI` datatype code.
    pub const fn code(self) -> i16 {
        self as i16
    }

    /// Size of each element in bytes.
    pub const fn byte_size(self) -> usize {
        match self {
            Self::UInt8 => 1,
            Self::Int16 => 2,
            Self::Int32 | Self::Float32 => 4,
            Self::Float64 => 8,
        }
    }

    /// Expected `bitpix` for this kind.
    pub const fn bitpix(self) -> i16 {
        (self.byte_size() * 8) as i16
    }

    /// Rust type name, for messages.
    pub const fn type_name(self) -> &'static str {
        match self {
            Self::UInt8 => "u8",
            Self::Int16 => "i16",
            Self::Int32 => "i32",
            Self::Float32 => "f32",
            Self::Float64 => "f64",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Every datatype code defined by `nifti1.h`.
///
/// Only the [`DataType`] subset can be bound to voxel views; the rest are
/// kept so raw headers can be inspected.
pub mod datatype_codes {
    pub const UNKNOWN: i16 = 0;
    pub const BINARY: i16 = 1;
    pub const UINT8: i16 = 2;
    pub const INT16: i16 = 4;
    pub const INT32: i16 = 8;
    pub const FLOAT32: i16 = 16;
    pub const COMPLEX64: i16 = 32;
    pub const FLOAT64: i16 = 64;
    pub const RGB24: i16 = 128;
    pub const INT8: i16 = 256;
    pub const UINT16: i16 = 512;
    pub const UINT32: i16 = 768;
    pub const INT64: i16 = 1024;
    pub const UINT64: i16 = 1280;
    pub const FLOAT128: i16 = 1536;
    pub const COMPLEX128: i16 = 1792;
    pub const COMPLEX256: i16 = 2048;
    pub const RGBA32: i16 = 2304;
}

/// Coordinate space named by `qform_code` / `sform_code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i16)]
pub enum XformCode {
    /// Arbitrary coordinates.
    #[default]
    Unknown = 0,
    /// Scanner-based anatomical coordinates.
    ScannerAnat = 1,
    /// Coordinates aligned to another file or anatomical truth.
    AlignedAnat = 2,
    /// Talairach-Tournoux atlas space.
    Talairach = 3,
    /// MNI 152 template space.
    Mni152 = 4,
}

impl XformCode {
    /// Parse a stored code; `None` for values outside the table.
    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(Self::Unknown),
            1 => Some(Self::ScannerAnat),
            2 => Some(Self::AlignedAnat),
            3 => Some(Self::Talairach),
            4 => Some(Self::Mni152),
            _ => None,
        }
    }

    pub const fn code(self) -> i16 {
        self as i16
    }
}

/// Spatial units for voxel dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpatialUnits {
    #[default]
    /// Units are not specified.
    Unknown,
    /// Voxel dimensions expressed in meters.
    Meter,
    /// Voxel dimensions expressed in millimeters.
    Millimeter,
    /// Voxel dimensions expressed in micrometers.
    Micrometer,
}

impl SpatialUnits {
    fn from_code(code: u8) -> Self {
        match code & 0x07 {
            1 => Self::Meter,
            2 => Self::Millimeter,
            3 => Self::Micrometer,
            _ => Self::Unknown,
        }
    }

    fn to_code(self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::Meter => 1,
            Self::Millimeter => 2,
            Self::Micrometer => 3,
        }
    }
}

/// Units of the fourth (time) axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TemporalUnits {
    #[default]
    /// Temporal spacing unspecified.
    Unknown,
    /// Temporal spacing in seconds.
    Second,
    /// Temporal spacing in milliseconds.
    Millisecond,
    /// Temporal spacing in microseconds.
    Microsecond,
    /// Spectral axis in hertz.
    Hertz,
    /// Spectral axis in parts per million.
    PartsPerMillion,
    /// Angular frequency in radians per second.
    RadiansPerSecond,
}

impl TemporalUnits {
    fn from_code(code: u8) -> Self {
        match code & 0x38 {
            0x08 => Self::Second,
            0x10 => Self::Millisecond,
            0x18 => Self::Microsecond,
            0x20 => Self::Hertz,
            0x28 => Self::PartsPerMillion,
            0x30 => Self::RadiansPerSecond,
            _ => Self::Unknown,
        }
    }

    fn to_code(self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::Second => 0x08,
            Self::Millisecond => 0x10,
            Self::Microsecond => 0x18,
            Self::Hertz => 0x20,
            Self::PartsPerMillion => 0x28,
            Self::RadiansPerSecond => 0x30,
        }
    }
}

/// Slice acquisition order (`slice_code`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceOrder {
    SequentialIncreasing,
    SequentialDecreasing,
    AlternatingIncreasing,
    AlternatingDecreasing,
    /// Alternating, starting at the second slice.
    AlternatingIncreasing2,
    /// Alternating decreasing, starting at the second-to-last slice.
    AlternatingDecreasing2,
}

impl SliceOrder {
    fn from_code(code: i8) -> Option<Self> {
        match code {
            1 => Some(Self::SequentialIncreasing),
            2 => Some(Self::SequentialDecreasing),
            3 => Some(Self::AlternatingIncreasing),
            4 => Some(Self::AlternatingDecreasing),
            5 => Some(Self::AlternatingIncreasing2),
            6 => Some(Self::AlternatingDecreasing2),
            _ => None,
        }
    }
}

/// Non-fatal header irregularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderWarning {
    /// `qform_code` outside `{0, 1}`.
    QformCode(i16),
    /// `sform_code` outside `{0, 2, 3, 4}`.
    SformCode(i16),
}

impl HeaderWarning {
    /// Name of the offending field.
    pub const fn field(self) -> &'static str {
        match self {
            Self::QformCode(_) => "qform_code",
            Self::SformCode(_) => "sform_code",
        }
    }

    /// Offending code.
    pub const fn code(self) -> i16 {
        match self {
            Self::QformCode(code) | Self::SformCode(code) => code,
        }
    }
}

impl std::fmt::Display for HeaderWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} is outside the expected range", self.field(), self.code())
    }
}

/// How out-of-range qform/sform codes are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodePolicy {
    /// Log a warning and continue.
    #[default]
    Warn,
    /// Fail with [`FormatError::CodeOutOfRange`].
    Reject,
}

/// Decoding options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodeConfig {
    /// Treatment of advisory code violations.
    pub code_policy: CodePolicy,
    /// Tolerance used when reconstructing the qform quaternion.
    pub quaternion_epsilon: f64,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            code_policy: CodePolicy::Warn,
            quaternion_epsilon: crate::nifti::geometry::QUATERNION_EPSILON,
        }
    }
}

impl DecodeConfig {
    /// Start from the defaults.
    pub fn builder() -> DecodeConfigBuilder {
        DecodeConfigBuilder::default()
    }
}

/// Builder for [`DecodeConfig`].
#[derive(Debug, Clone, Default)]
pub struct DecodeConfigBuilder {
    config: DecodeConfig,
}

impl DecodeConfigBuilder {
    /// Set the advisory code policy.
    pub fn code_policy(mut self, policy: CodePolicy) -> Self {
        self.config.code_policy = policy;
        self
    }

    /// Set the quaternion tolerance.
    pub fn quaternion_epsilon(mut self, epsilon: f64) -> Self {
        self.config.quaternion_epsilon = epsilon;
        self
    }

    pub fn build(self) -> DecodeConfig {
        self.config
    }
}

/// `NIfTI-1` header.
///
/// Numeric fields keep their on-disk widths and text fields keep their raw
/// bytes, so a decoded header re-encodes bit for bit.
#[derive(Debug, Clone, PartialEq)]
pub struct NiftiHeader {
    /// Must be 348.
    pub sizeof_hdr: i32,
    /// Unused ANALYZE field.
    pub data_type: [u8; 10],
    /// Unused ANALYZE field.
    pub db_name: [u8; 18],
    /// Unused ANALYZE field.
    pub extents: i32,
    /// Unused ANALYZE field.
    pub session_error: i16,
    /// Unused ANALYZE field.
    pub regular: i8,
    /// Frequency/phase/slice encoding axes, two bits each.
    pub dim_info: i8,
    /// `dim[0]` is the number of dimensions, `dim[1..=7]` the extents.
    pub dim: [i16; 8],
    pub intent_p1: f32,
    pub intent_p2: f32,
    pub intent_p3: f32,
    /// Statistical intent code, stored verbatim.
    pub intent_code: i16,
    /// Raw datatype code; see [`DataType`].
    pub datatype: i16,
    /// Bits per voxel.
    pub bitpix: i16,
    pub slice_start: i16,
    /// `pixdim[0]` is qfac, `pixdim[1..=7]` are grid spacings.
    pub pixdim: [f32; 8],
    /// Byte offset of voxel data in a single-file image.
    pub vox_offset: f32,
    pub scl_slope: f32,
    pub scl_inter: f32,
    pub slice_end: i16,
    pub slice_code: i8,
    /// Spatial units in bits 0-2, temporal units in bits 3-5.
    pub xyzt_units: i8,
    pub cal_max: f32,
    pub cal_min: f32,
    pub slice_duration: f32,
    pub toffset: f32,
    /// Unused ANALYZE field.
    pub glmax: i32,
    /// Unused ANALYZE field.
    pub glmin: i32,
    /// Free text, at most 80 bytes.
    pub descrip: Vec<u8>,
    /// Auxiliary filename, at most 24 bytes.
    pub aux_file: Vec<u8>,
    pub qform_code: i16,
    pub sform_code: i16,
    pub quatern_b: f32,
    pub quatern_c: f32,
    pub quatern_d: f32,
    pub qoffset_x: f32,
    pub qoffset_y: f32,
    pub qoffset_z: f32,
    /// First row of the sform affine.
    pub srow_x: [f32; 4],
    /// Second row of the sform affine.
    pub srow_y: [f32; 4],
    /// Third row of the sform affine.
    pub srow_z: [f32; 4],
    /// Intent label, at most 16 bytes.
    pub intent_name: Vec<u8>,
    pub magic: [u8; 4],
    /// Byte order of every multi-byte field.
    pub(crate) little_endian: bool,
}

impl Default for NiftiHeader {
    fn default() -> Self {
        Self {
            sizeof_hdr: Self::SIZE as i32,
            data_type: [0; 10],
            db_name: [0; 18],
            extents: 0,
            session_error: 0,
            regular: 0,
            dim_info: 0,
            dim: [3, 1, 1, 1, 1, 1, 1, 1],
            intent_p1: 0.0,
            intent_p2: 0.0,
            intent_p3: 0.0,
            intent_code: 0,
            datatype: DataType::Float32.code(),
            bitpix: DataType::Float32.bitpix(),
            slice_start: 0,
            pixdim: [1.0; 8],
            vox_offset: Self::DEFAULT_VOX_OFFSET as f32,
            scl_slope: 1.0,
            scl_inter: 0.0,
            slice_end: 0,
            slice_code: 0,
            xyzt_units: 0,
            cal_max: 0.0,
            cal_min: 0.0,
            slice_duration: 0.0,
            toffset: 0.0,
            glmax: 0,
            glmin: 0,
            descrip: Vec::new(),
            aux_file: Vec::new(),
            qform_code: 0,
            sform_code: 0,
            quatern_b: 0.0,
            quatern_c: 0.0,
            quatern_d: 0.0,
            qoffset_x: 0.0,
            qoffset_y: 0.0,
            qoffset_z: 0.0,
            srow_x: [1.0, 0.0, 0.0, 0.0],
            srow_y: [0.0, 1.0, 0.0, 0.0],
            srow_z: [0.0, 0.0, 1.0, 0.0],
            intent_name: Vec::new(),
            magic: MAGIC_SINGLE,
            little_endian: true,
        }
    }
}

/// Choose the byte order from `dim[0]`.
///
/// Little-endian wins when it yields `dim[0]` in `1..=7`, big-endian when
/// that one does. If neither does, `sizeof_hdr` breaks the tie so the dim
/// check reports the actual fault instead of a bogus header size.
fn detect_little_endian(bytes: &[u8]) -> bool {
    let dim0_le = codec::read_i16(bytes, layout::DIM.offset, true);
    if (1..=7).contains(&dim0_le) {
        return true;
    }
    let dim0_be = codec::read_i16(bytes, layout::DIM.offset, false);
    if (1..=7).contains(&dim0_be) {
        return false;
    }
    codec::read_i32(bytes, layout::SIZEOF_HDR.offset, false) != NiftiHeader::SIZE as i32
}

/// Bytes up to the first NUL, decoded lossily.
fn c_string(bytes: &[u8]) -> Cow<'_, str> {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end])
}

impl NiftiHeader {
    /// Size of the `NIfTI-1` header in bytes.
    pub const SIZE: usize = 348;

    /// Header plus the 4-byte extension flag; the conventional data offset.
    pub const DEFAULT_VOX_OFFSET: usize = 352;

    /// Maximum `descrip` length.
    pub const DESCRIP_LEN: usize = layout::DESCRIP.count;

    /// Maximum `aux_file` length.
    pub const AUX_FILE_LEN: usize = layout::AUX_FILE.count;

    /// Maximum `intent_name` length.
    pub const INTENT_NAME_LEN: usize = layout::INTENT_NAME.count;

    /// Start building a header from defaults.
    pub fn builder() -> NiftiHeaderBuilder {
        NiftiHeaderBuilder::new()
    }

    /// Decode a header with automatic byte-order detection.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_bytes_with(bytes, &DecodeConfig::default())
    }

    /// Decode a header using explicit options.
    pub fn from_bytes_with(bytes: &[u8], config: &DecodeConfig) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(FormatError::Truncated {
                needed: Self::SIZE,
                available: bytes.len(),
            }
            .into());
        }

        let little_endian = detect_little_endian(bytes);
        debug!(
            "decoding NIfTI-1 header as {}-endian",
            if little_endian { "little" } else { "big" }
        );

        let sizeof_hdr = codec::read_i32(bytes, layout::SIZEOF_HDR.offset, little_endian);
        if sizeof_hdr != Self::SIZE as i32 {
            return Err(FormatError::BadHeaderSize(sizeof_hdr).into());
        }

        let header = Self::read_fields(&FieldReader::new(bytes, little_endian), little_endian);
        header.validate()?;
        header.apply_code_policy(config.code_policy)?;
        Ok(header)
    }

    #[allow(clippy::wildcard_imports)]
    fn read_fields(r: &FieldReader<'_>, little_endian: bool) -> Self {
        use layout::*;

        Self {
            sizeof_hdr: r.i32(&SIZEOF_HDR),
            data_type: r.bytes(&DATA_TYPE),
            db_name: r.bytes(&DB_NAME),
            extents: r.i32(&EXTENTS),
            session_error: r.i16(&SESSION_ERROR),
            regular: r.i8(&REGULAR),
            dim_info: r.i8(&DIM_INFO),
            dim: r.i16_array(&DIM),
            intent_p1: r.f32(&INTENT_P1),
            intent_p2: r.f32(&INTENT_P2),
            intent_p3: r.f32(&INTENT_P3),
            intent_code: r.i16(&INTENT_CODE),
            datatype: r.i16(&DATATYPE),
            bitpix: r.i16(&BITPIX),
            slice_start: r.i16(&SLICE_START),
            pixdim: r.f32_array(&PIXDIM),
            vox_offset: r.f32(&VOX_OFFSET),
            scl_slope: r.f32(&SCL_SLOPE),
            scl_inter: r.f32(&SCL_INTER),
            slice_end: r.i16(&SLICE_END),
            slice_code: r.i8(&SLICE_CODE),
            xyzt_units: r.i8(&XYZT_UNITS),
            cal_max: r.f32(&CAL_MAX),
            cal_min: r.f32(&CAL_MIN),
            slice_duration: r.f32(&SLICE_DURATION),
            toffset: r.f32(&TOFFSET),
            glmax: r.i32(&GLMAX),
            glmin: r.i32(&GLMIN),
            descrip: r.text(&DESCRIP),
            aux_file: r.text(&AUX_FILE),
            qform_code: r.i16(&QFORM_CODE),
            sform_code: r.i16(&SFORM_CODE),
            quatern_b: r.f32(&QUATERN_B),
            quatern_c: r.f32(&QUATERN_C),
            quatern_d: r.f32(&QUATERN_D),
            qoffset_x: r.f32(&QOFFSET_X),
            qoffset_y: r.f32(&QOFFSET_Y),
            qoffset_z: r.f32(&QOFFSET_Z),
            srow_x: r.f32_array(&SROW_X),
            srow_y: r.f32_array(&SROW_Y),
            srow_z: r.f32_array(&SROW_Z),
            intent_name: r.text(&INTENT_NAME),
            magic: r.bytes(&MAGIC),
            little_endian,
        }
    }

    /// Serialize to a zero-initialized 352-byte buffer (header plus extension flag).
    ///
    /// Encoding does not validate. Text fields longer than their slot
    /// (`descrip` 80, `aux_file` 24, `intent_name` 16 bytes) are truncated to
    /// fit; call [`NiftiHeader::validate`] first to reject them instead.
    #[allow(clippy::wildcard_imports)]
    pub fn to_bytes(&self) -> Vec<u8> {
        use layout::*;

        let mut buf = vec![0u8; Self::DEFAULT_VOX_OFFSET];
        let mut w = FieldWriter::new(&mut buf, self.little_endian);

        w.i32(&SIZEOF_HDR, self.sizeof_hdr);
        w.text(&DATA_TYPE, &self.data_type);
        w.text(&DB_NAME, &self.db_name);
        w.i32(&EXTENTS, self.extents);
        w.i16(&SESSION_ERROR, self.session_error);
        w.i8(&REGULAR, self.regular);
        w.i8(&DIM_INFO, self.dim_info);
        w.i16_array(&DIM, &self.dim);
        w.f32(&INTENT_P1, self.intent_p1);
        w.f32(&INTENT_P2, self.intent_p2);
        w.f32(&INTENT_P3, self.intent_p3);
        w.i16(&INTENT_CODE, self.intent_code);
        w.i16(&DATATYPE, self.datatype);
        w.i16(&BITPIX, self.bitpix);
        w.i16(&SLICE_START, self.slice_start);
        w.f32_array(&PIXDIM, &self.pixdim);
        w.f32(&VOX_OFFSET, self.vox_offset);
        w.f32(&SCL_SLOPE, self.scl_slope);
        w.f32(&SCL_INTER, self.scl_inter);
        w.i16(&SLICE_END, self.slice_end);
        w.i8(&SLICE_CODE, self.slice_code);
        w.i8(&XYZT_UNITS, self.xyzt_units);
        w.f32(&CAL_MAX, self.cal_max);
        w.f32(&CAL_MIN, self.cal_min);
        w.f32(&SLICE_DURATION, self.slice_duration);
        w.f32(&TOFFSET, self.toffset);
        w.i32(&GLMAX, self.glmax);
        w.i32(&GLMIN, self.glmin);
        w.text(&DESCRIP, &self.descrip);
        w.text(&AUX_FILE, &self.aux_file);
        w.i16(&QFORM_CODE, self.qform_code);
        w.i16(&SFORM_CODE, self.sform_code);
        w.f32(&QUATERN_B, self.quatern_b);
        w.f32(&QUATERN_C, self.quatern_c);
        w.f32(&QUATERN_D, self.quatern_d);
        w.f32(&QOFFSET_X, self.qoffset_x);
        w.f32(&QOFFSET_Y, self.qoffset_y);
        w.f32(&QOFFSET_Z, self.qoffset_z);
        w.f32_array(&SROW_X, &self.srow_x);
        w.f32_array(&SROW_Y, &self.srow_y);
        w.f32_array(&SROW_Z, &self.srow_z);
        w.text(&INTENT_NAME, &self.intent_name);
        w.text(&MAGIC, &self.magic);

        buf
    }

    /// Check the mandatory invariants.
    pub fn validate(&self) -> std::result::Result<(), FormatError> {
        if self.magic != MAGIC_SINGLE && self.magic != MAGIC_PAIR {
            return Err(FormatError::BadMagic(self.magic));
        }

        if self.sizeof_hdr != Self::SIZE as i32 {
            return Err(FormatError::BadHeaderSize(self.sizeof_hdr));
        }

        if !(1..=7).contains(&self.dim[0]) {
            return Err(FormatError::BadDim {
                index: 0,
                value: self.dim[0],
            });
        }

        // Negated comparison so a NaN offset is rejected too.
        if !(self.vox_offset >= self.sizeof_hdr as f32) {
            return Err(FormatError::BadVoxOffset {
                vox_offset: self.vox_offset,
                sizeof_hdr: self.sizeof_hdr,
            });
        }

        for (field, text) in [
            (&layout::DESCRIP, &self.descrip),
            (&layout::AUX_FILE, &self.aux_file),
            (&layout::INTENT_NAME, &self.intent_name),
        ] {
            if text.len() > field.count {
                return Err(FormatError::TextTooLong {
                    field: field.name,
                    len: text.len(),
                    max: field.count,
                });
            }
        }

        Ok(())
    }

    /// Advisory irregularities that do not block decoding.
    pub fn warnings(&self) -> Vec<HeaderWarning> {
        let mut warnings = Vec::new();
        if !matches!(self.qform_code, 0 | 1) {
            warnings.push(HeaderWarning::QformCode(self.qform_code));
        }
        if !matches!(self.sform_code, 0 | 2 | 3 | 4) {
            warnings.push(HeaderWarning::SformCode(self.sform_code));
        }
        warnings
    }

    pub(crate) fn apply_code_policy(
        &self,
        policy: CodePolicy,
    ) -> std::result::Result<(), FormatError> {
        for warning in self.warnings() {
            match policy {
                CodePolicy::Warn => warn!("NIfTI header: {}", warning),
                CodePolicy::Reject => {
                    return Err(FormatError::CodeOutOfRange {
                        field: warning.field(),
                        code: warning.code(),
                    })
                }
            }
        }
        Ok(())
    }

    /// Number of dimensions, `dim[0]` clamped to `0..=7`.
    pub fn ndim(&self) -> usize {
        self.dim[0].clamp(0, 7) as usize
    }

    /// Extents of the used axes. Negative extents read as zero.
    pub fn shape(&self) -> Vec<usize> {
        self.dim[1..=self.ndim()]
            .iter()
            .map(|&d| d.max(0) as usize)
            .collect()
    }

    /// Total number of voxels, saturating at `usize::MAX`.
    pub fn num_voxels(&self) -> usize {
        self.shape()
            .iter()
            .fold(1usize, |acc, &d| acc.saturating_mul(d))
    }

    /// Grid spacings of the used axes (`pixdim[1..=ndim]`).
    pub fn spacing(&self) -> Vec<f32> {
        self.pixdim[1..=self.ndim()].to_vec()
    }

    /// Supported element kind, or the unsupported code as an error.
    pub fn data_type(&self) -> std::result::Result<DataType, FormatError> {
        DataType::from_code(self.datatype)
    }

    /// Voxel data offset in bytes.
    pub fn data_offset(&self) -> usize {
        self.vox_offset.max(0.0) as usize
    }

    /// Size of the voxel block in bytes.
    pub fn data_size(&self) -> std::result::Result<usize, FormatError> {
        Ok(self
            .num_voxels()
            .saturating_mul(self.data_type()?.byte_size()))
    }

    /// Returns true if multi-byte fields are little-endian.
    pub fn is_little_endian(&self) -> bool {
        self.little_endian
    }

    /// Returns true for a single-file `n+1` image.
    pub fn is_single_file(&self) -> bool {
        self.magic == MAGIC_SINGLE
    }

    pub fn spatial_units(&self) -> SpatialUnits {
        SpatialUnits::from_code(self.xyzt_units as u8)
    }

    pub fn temporal_units(&self) -> TemporalUnits {
        TemporalUnits::from_code(self.xyzt_units as u8)
    }

    /// Space named by `qform_code`, if it is a known code.
    pub fn qform_xform(&self) -> Option<XformCode> {
        XformCode::from_code(self.qform_code)
    }

    /// Space named by `sform_code`, if it is a known code.
    pub fn sform_xform(&self) -> Option<XformCode> {
        XformCode::from_code(self.sform_code)
    }

    /// Frequency-encoding axis (1-based, 0 if unset).
    pub fn freq_dim(&self) -> u8 {
        self.dim_info as u8 & 0x03
    }

    /// Phase-encoding axis (1-based, 0 if unset).
    pub fn phase_dim(&self) -> u8 {
        (self.dim_info as u8 >> 2) & 0x03
    }

    /// Slice axis (1-based, 0 if unset).
    pub fn slice_dim(&self) -> u8 {
        (self.dim_info as u8 >> 4) & 0x03
    }

    pub fn slice_order(&self) -> Option<SliceOrder> {
        SliceOrder::from_code(self.slice_code)
    }

    /// Stored quaternion `(b, c, d)`.
    pub fn quatern(&self) -> [f32; 3] {
        [self.quatern_b, self.quatern_c, self.quatern_d]
    }

    /// Stored qform translation.
    pub fn qoffset(&self) -> [f32; 3] {
        [self.qoffset_x, self.qoffset_y, self.qoffset_z]
    }

    /// `descrip` up to its first NUL.
    pub fn descrip_str(&self) -> Cow<'_, str> {
        c_string(&self.descrip)
    }

    /// `aux_file` up to its first NUL.
    pub fn aux_file_str(&self) -> Cow<'_, str> {
        c_string(&self.aux_file)
    }

    /// `intent_name` up to its first NUL.
    pub fn intent_name_str(&self) -> Cow<'_, str> {
        c_string(&self.intent_name)
    }
}

/// Accumulates header fields and validates them on [`build`](Self::build).
///
/// `build` runs the same checks as decoding, so hand-built and decoded
/// headers obey the same invariants.
#[derive(Debug, Clone, Default)]
pub struct NiftiHeaderBuilder {
    header: NiftiHeader,
}

impl NiftiHeaderBuilder {
    /// Start from [`NiftiHeader::default`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw `dim` array, `dim[0]` included.
    pub fn dim(mut self, dim: [i16; 8]) -> Self {
        self.header.dim = dim;
        self
    }

    /// Supported element kind; also sets `bitpix`.
    pub fn datatype(mut self, datatype: DataType) -> Self {
        self.header.datatype = datatype.code();
        self.header.bitpix = datatype.bitpix();
        self
    }

    /// Raw datatype code and bitpix, for codes outside [`DataType`].
    pub fn datatype_code(mut self, code: i16, bitpix: i16) -> Self {
        self.header.datatype = code;
        self.header.bitpix = bitpix;
        self
    }

    pub fn pixdim(mut self, pixdim: [f32; 8]) -> Self {
        self.header.pixdim = pixdim;
        self
    }

    pub fn vox_offset(mut self, vox_offset: f32) -> Self {
        self.header.vox_offset = vox_offset;
        self
    }

    pub fn sizeof_hdr(mut self, sizeof_hdr: i32) -> Self {
        self.header.sizeof_hdr = sizeof_hdr;
        self
    }

    pub fn dim_info(mut self, freq: u8, phase: u8, slice: u8) -> Self {
        self.header.dim_info = ((freq & 0x03) | ((phase & 0x03) << 2) | ((slice & 0x03) << 4)) as i8;
        self
    }

    /// Intensity scaling `value * slope + inter`.
    pub fn scaling(mut self, slope: f32, inter: f32) -> Self {
        self.header.scl_slope = slope;
        self.header.scl_inter = inter;
        self
    }

    /// Display range.
    pub fn calibration(mut self, min: f32, max: f32) -> Self {
        self.header.cal_min = min;
        self.header.cal_max = max;
        self
    }

    pub fn units(mut self, spatial: SpatialUnits, temporal: TemporalUnits) -> Self {
        self.header.xyzt_units = (spatial.to_code() | temporal.to_code()) as i8;
        self
    }

    pub fn slice_timing(mut self, start: i16, end: i16, code: i8, duration: f32) -> Self {
        self.header.slice_start = start;
        self.header.slice_end = end;
        self.header.slice_code = code;
        self.header.slice_duration = duration;
        self
    }

    pub fn toffset(mut self, toffset: f32) -> Self {
        self.header.toffset = toffset;
        self
    }

    /// Intent code, parameters and label.
    pub fn intent(mut self, code: i16, params: [f32; 3], name: impl AsRef<[u8]>) -> Self {
        self.header.intent_code = code;
        [self.header.intent_p1, self.header.intent_p2, self.header.intent_p3] = params;
        self.header.intent_name = name.as_ref().to_vec();
        self
    }

    pub fn descrip(mut self, descrip: impl AsRef<[u8]>) -> Self {
        self.header.descrip = descrip.as_ref().to_vec();
        self
    }

    pub fn aux_file(mut self, aux_file: impl AsRef<[u8]>) -> Self {
        self.header.aux_file = aux_file.as_ref().to_vec();
        self
    }

    /// Quaternion transform: code, `(b, c, d)` and translation.
    pub fn qform(mut self, code: XformCode, quatern: [f32; 3], qoffset: [f32; 3]) -> Self {
        self.header.qform_code = code.code();
        [self.header.quatern_b, self.header.quatern_c, self.header.quatern_d] = quatern;
        [self.header.qoffset_x, self.header.qoffset_y, self.header.qoffset_z] = qoffset;
        self
    }

    /// Raw qform code, for codes outside [`XformCode`].
    pub fn qform_code(mut self, code: i16) -> Self {
        self.header.qform_code = code;
        self
    }

    /// Direct transform: code and the three affine rows.
    pub fn sform(mut self, code: XformCode, rows: [[f32; 4]; 3]) -> Self {
        self.header.sform_code = code.code();
        [self.header.srow_x, self.header.srow_y, self.header.srow_z] = rows;
        self
    }

    /// Raw sform code, for codes outside [`XformCode`].
    pub fn sform_code(mut self, code: i16) -> Self {
        self.header.sform_code = code;
        self
    }

    pub fn magic(mut self, magic: [u8; 4]) -> Self {
        self.header.magic = magic;
        self
    }

    pub fn little_endian(mut self, little_endian: bool) -> Self {
        self.header.little_endian = little_endian;
        self
    }

    /// Validate and return the header.
    pub fn build(self) -> Result<NiftiHeader> {
        self.header.validate()?;
        self.header.apply_code_policy(CodePolicy::Warn)?;
        Ok(self.header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use byteorder::{BigEndian, ByteOrder, LittleEndian};

    /// Minimal valid little-endian header bytes.
    fn minimal_le() -> Vec<u8> {
        let mut bytes = vec![0u8; 352];
        LittleEndian::write_i32(&mut bytes[0..4], 348);
        LittleEndian::write_i16(&mut bytes[40..42], 3); // dim[0]
        LittleEndian::write_i16(&mut bytes[42..44], 2);
        LittleEndian::write_i16(&mut bytes[44..46], 2);
        LittleEndian::write_i16(&mut bytes[46..48], 2);
        LittleEndian::write_i16(&mut bytes[70..72], 16); // float32
        LittleEndian::write_i16(&mut bytes[72..74], 32);
        LittleEndian::write_f32(&mut bytes[108..112], 352.0);
        bytes[344..348].copy_from_slice(b"n+1\0");
        bytes
    }

    #[test]
    fn test_layout_offsets() {
        assert_eq!(layout::DIM_INFO.offset, 39);
        assert_eq!(layout::DIM.end(), 56);
        assert_eq!(layout::PIXDIM.end(), layout::VOX_OFFSET.offset);
        assert_eq!(layout::DESCRIP.end(), layout::AUX_FILE.offset);
        assert_eq!(layout::AUX_FILE.end(), layout::QFORM_CODE.offset);
        assert_eq!(layout::SROW_Z.end(), layout::INTENT_NAME.offset);
        assert_eq!(layout::MAGIC.end(), NiftiHeader::SIZE);
    }

    #[test]
    fn test_decode_minimal_little_endian() {
        let header = NiftiHeader::from_bytes(&minimal_le()).unwrap();
        assert!(header.is_little_endian());
        assert_eq!(header.dim, [3, 2, 2, 2, 0, 0, 0, 0]);
        assert_eq!(header.shape(), vec![2, 2, 2]);
        assert_eq!(header.data_type().unwrap(), DataType::Float32);
        assert_eq!(header.data_offset(), 352);
        assert_eq!(header.descrip.len(), 80);
        assert!(header.is_single_file());
    }

    #[test]
    fn test_decode_big_endian() {
        let mut bytes = vec![0u8; 348];
        BigEndian::write_i32(&mut bytes[0..4], 348);
        bytes[40..42].copy_from_slice(&[0x00, 0x01]);
        BigEndian::write_i16(&mut bytes[42..44], 7);
        BigEndian::write_i16(&mut bytes[70..72], 4);
        BigEndian::write_i16(&mut bytes[72..74], 16);
        BigEndian::write_f32(&mut bytes[80..84], 2.5);
        BigEndian::write_f32(&mut bytes[108..112], 352.0);
        BigEndian::write_i16(&mut bytes[252..254], 1);
        bytes[344..348].copy_from_slice(b"ni1\0");

        let header = NiftiHeader::from_bytes(&bytes).unwrap();
        assert!(!header.is_little_endian());
        assert_eq!(header.dim[0], 1);
        assert_eq!(header.dim[1], 7);
        assert_eq!(header.datatype, 4);
        assert_eq!(header.pixdim[1], 2.5);
        assert_eq!(header.qform_code, 1);
        assert!(!header.is_single_file());
    }

    #[test]
    fn test_encode_preserves_big_endian() {
        let mut bytes = minimal_le();
        let le = NiftiHeader::from_bytes(&bytes).unwrap();
        let mut be = le.clone();
        be.little_endian = false;
        bytes = be.to_bytes();
        assert_eq!(&bytes[40..42], &[0x00, 0x03]);
        let decoded = NiftiHeader::from_bytes(&bytes).unwrap();
        assert!(!decoded.is_little_endian());
        assert_eq!(decoded.dim, le.dim);
    }

    #[test]
    fn test_roundtrip_is_byte_exact() {
        let mut bytes = minimal_le();
        bytes[4..14].copy_from_slice(b"dsr\0\0\0\0\0\0x");
        LittleEndian::write_i32(&mut bytes[32..36], 16384);
        bytes[38] = b'r';
        LittleEndian::write_i32(&mut bytes[140..144], 255);
        bytes[148..156].copy_from_slice(b"FSL\0tail");
        bytes[328..332].copy_from_slice(b"beta");

        let header = NiftiHeader::from_bytes(&bytes).unwrap();
        let encoded = header.to_bytes();
        assert_eq!(encoded.len(), 352);
        assert_eq!(&encoded[..348], &bytes[..348]);
        assert_eq!(header.descrip_str(), "FSL");
        assert_eq!(header.intent_name_str(), "beta");
    }

    #[test]
    fn test_rejects_short_buffer() {
        let err = NiftiHeader::from_bytes(&[0u8; 100]).unwrap_err();
        assert!(matches!(
            err,
            Error::Format(FormatError::Truncated {
                needed: 348,
                available: 100
            })
        ));
    }

    #[test]
    fn test_rejects_bad_header_size() {
        let mut bytes = minimal_le();
        LittleEndian::write_i32(&mut bytes[0..4], 347);
        let err = NiftiHeader::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, Error::Format(FormatError::BadHeaderSize(347))));
    }

    #[test]
    fn test_rejects_bad_magic() {
        let mut bytes = minimal_le();
        bytes[344..348].copy_from_slice(b"xxxx");
        let err = NiftiHeader::from_bytes(&bytes).unwrap_err();
        assert!(matches!(
            err,
            Error::Format(FormatError::BadMagic(m)) if &m == b"xxxx"
        ));
        assert!(err.to_string().contains("invalid NIfTI magic"));
    }

    #[test]
    fn test_rejects_zero_dim() {
        let mut bytes = minimal_le();
        LittleEndian::write_i16(&mut bytes[40..42], 0);
        let err = NiftiHeader::from_bytes(&bytes).unwrap_err();
        assert!(matches!(
            err,
            Error::Format(FormatError::BadDim { index: 0, value: 0 })
        ));
    }

    #[test]
    fn test_rejects_vox_offset_inside_header() {
        let mut bytes = minimal_le();
        LittleEndian::write_f32(&mut bytes[108..112], 100.0);
        let err = NiftiHeader::from_bytes(&bytes).unwrap_err();
        assert!(matches!(
            err,
            Error::Format(FormatError::BadVoxOffset { sizeof_hdr: 348, .. })
        ));
    }

    #[test]
    fn test_rejects_nan_vox_offset() {
        let mut bytes = minimal_le();
        LittleEndian::write_f32(&mut bytes[108..112], f32::NAN);
        assert!(NiftiHeader::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_unsupported_datatype_decodes() {
        let mut bytes = minimal_le();
        LittleEndian::write_i16(&mut bytes[70..72], datatype_codes::INT64);
        LittleEndian::write_i16(&mut bytes[72..74], 64);
        let header = NiftiHeader::from_bytes(&bytes).unwrap();
        assert_eq!(header.datatype, 1024);
        assert_eq!(
            header.data_type(),
            Err(FormatError::UnsupportedDatatype(1024))
        );
    }

    #[test]
    fn test_out_of_range_codes_warn_by_default() {
        let mut bytes = minimal_le();
        LittleEndian::write_i16(&mut bytes[252..254], 3);
        LittleEndian::write_i16(&mut bytes[254..256], 9);
        let header = NiftiHeader::from_bytes(&bytes).unwrap();
        assert_eq!(
            header.warnings(),
            vec![HeaderWarning::QformCode(3), HeaderWarning::SformCode(9)]
        );
    }

    #[test]
    fn test_out_of_range_codes_rejected_when_strict() {
        let mut bytes = minimal_le();
        LittleEndian::write_i16(&mut bytes[254..256], 1);
        let config = DecodeConfig::builder()
            .code_policy(CodePolicy::Reject)
            .build();
        let err = NiftiHeader::from_bytes_with(&bytes, &config).unwrap_err();
        assert!(matches!(
            err,
            Error::Format(FormatError::CodeOutOfRange {
                field: "sform_code",
                code: 1
            })
        ));
    }

    #[test]
    fn test_units_and_dim_info() {
        let header = NiftiHeader::builder()
            .units(SpatialUnits::Millimeter, TemporalUnits::Millisecond)
            .dim_info(1, 2, 3)
            .slice_timing(0, 9, 3, 0.1)
            .build()
            .unwrap();
        assert_eq!(header.xyzt_units, 0x12);
        assert_eq!(header.spatial_units(), SpatialUnits::Millimeter);
        assert_eq!(header.temporal_units(), TemporalUnits::Millisecond);
        assert_eq!(
            (header.freq_dim(), header.phase_dim(), header.slice_dim()),
            (1, 2, 3)
        );
        assert_eq!(header.slice_order(), Some(SliceOrder::AlternatingIncreasing));
    }

    #[test]
    fn test_temporal_units_spectral_codes() {
        assert_eq!(TemporalUnits::from_code(0x20), TemporalUnits::Hertz);
        assert_eq!(TemporalUnits::from_code(0x2A), TemporalUnits::PartsPerMillion);
        assert_eq!(TemporalUnits::RadiansPerSecond.to_code(), 0x30);
        assert_eq!(TemporalUnits::from_code(0x38), TemporalUnits::Unknown);
    }

    #[test]
    fn test_builder_validates_text_lengths() {
        let err = NiftiHeader::builder()
            .aux_file([b'a'; 25])
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Format(FormatError::TextTooLong {
                field: "aux_file",
                len: 25,
                max: 24
            })
        ));

        let ok = NiftiHeader::builder().descrip([b'd'; 80]).build();
        assert!(ok.is_ok());
    }

    #[test]
    fn test_builder_shares_decode_validation() {
        let err = NiftiHeader::builder()
            .dim([8, 1, 1, 1, 1, 1, 1, 1])
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Format(FormatError::BadDim { index: 0, value: 8 })
        ));

        let err = NiftiHeader::builder().vox_offset(0.0).build().unwrap_err();
        assert!(matches!(err, Error::Format(FormatError::BadVoxOffset { .. })));
    }

    #[test]
    fn test_builder_output_decodes_to_same_fields() {
        let header = NiftiHeader::builder()
            .dim([4, 3, 4, 5, 2, 1, 1, 1])
            .datatype(DataType::Int16)
            .pixdim([-1.0, 0.5, 0.75, 1.25, 2.0, 1.0, 1.0, 1.0])
            .scaling(2.0, -1.0)
            .intent(2, [1.0, 2.0, 3.0], "ttest")
            .descrip("built by hand")
            .qform(XformCode::ScannerAnat, [0.0, 0.0, 1.0], [1.0, 2.0, 3.0])
            .sform(
                XformCode::Mni152,
                [[1.0, 0.0, 0.0, 4.0], [0.0, 1.0, 0.0, 5.0], [0.0, 0.0, 1.0, 6.0]],
            )
            .little_endian(false)
            .build()
            .unwrap();

        let decoded = NiftiHeader::from_bytes(&header.to_bytes()).unwrap();
        assert!(!decoded.is_little_endian());
        assert_eq!(decoded.dim, header.dim);
        assert_eq!(decoded.bitpix, 16);
        assert_eq!(decoded.pixdim, header.pixdim);
        assert_eq!(decoded.intent_name_str(), "ttest");
        assert_eq!(decoded.descrip_str(), "built by hand");
        assert_eq!(decoded.qform_xform(), Some(XformCode::ScannerAnat));
        assert_eq!(decoded.sform_xform(), Some(XformCode::Mni152));
        assert_eq!(decoded.srow_z, [0.0, 0.0, 1.0, 6.0]);
        assert_eq!(decoded.to_bytes(), header.to_bytes());
    }

    #[test]
    fn test_datatype_codes_are_total() {
        for dt in [
            DataType::UInt8,
            DataType::Int16,
            DataType::Int32,
            DataType::Float32,
            DataType::Float64,
        ] {
            assert_eq!(DataType::from_code(dt.code()), Ok(dt));
            assert_eq!(dt.bitpix() as usize, dt.byte_size() * 8);
        }
        assert!(DataType::from_code(datatype_codes::UINT16).is_err());
    }

    #[test]
    fn test_encode_truncates_oversized_text() {
        let mut header = NiftiHeader {
            descrip: vec![b'x'; 90],
            ..NiftiHeader::default()
        };
        assert!(matches!(
            header.validate(),
            Err(FormatError::TextTooLong {
                field: "descrip",
                len: 90,
                max: 80
            })
        ));

        let decoded = NiftiHeader::from_bytes(&header.to_bytes()).unwrap();
        assert_eq!(decoded.descrip, vec![b'x'; 80]);

        header.descrip.truncate(80);
        assert!(header.validate().is_ok());
    }
}
