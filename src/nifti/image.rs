//! `NIfTI-1` image: header, shared byte buffer and resolved affine.
//!
//! Voxel data is never copied on load. [`bind_data`] checks that the header's
//! shape and datatype fit the buffer and returns a [`VoxelView`] borrowing the
//! region that starts at `vox_offset`. Conversion to `ndarray` happens only on
//! request and always yields Fortran-order arrays, matching the on-disk layout
//! where the first axis varies fastest.

use super::geometry::{Affine, AffineSolver};
use super::gzip::{CompressionGate, Gzip};
use super::header::{DataType, DecodeConfig, NiftiHeader, MAGIC_SINGLE};
use crate::error::{FormatError, GeometryError, HeaderError, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use log::debug;
use ndarray::{ArrayD, IxDyn, ShapeBuilder};
use std::ops::Range;
use std::sync::Arc;

/// Element types that map to a supported `NIfTI` datatype.
pub trait NiftiElement: Copy + Send + Sync + 'static {
    /// Datatype stored on disk for this element.
    const DATA_TYPE: DataType;

    /// Decode one element from exactly `DATA_TYPE.byte_size()` bytes.
    fn read(bytes: &[u8], little_endian: bool) -> Self;

    /// Encode one element into exactly `DATA_TYPE.byte_size()` bytes.
    fn write(self, bytes: &mut [u8], little_endian: bool);

    fn to_f64(self) -> f64;
}

impl NiftiElement for u8 {
    const DATA_TYPE: DataType = DataType::UInt8;

    fn read(bytes: &[u8], _little_endian: bool) -> Self {
        bytes[0]
    }

    fn write(self, bytes: &mut [u8], _little_endian: bool) {
        bytes[0] = self;
    }

    fn to_f64(self) -> f64 {
        f64::from(self)
    }
}

macro_rules! impl_nifti_element {
    ($ty:ty, $variant:ident, $read:ident, $write:ident) => {
        impl NiftiElement for $ty {
            const DATA_TYPE: DataType = DataType::$variant;

            fn read(bytes: &[u8], little_endian: bool) -> Self {
                if little_endian {
                    LittleEndian::$read(bytes)
                } else {
                    BigEndian::$read(bytes)
                }
            }

            fn write(self, bytes: &mut [u8], little_endian: bool) {
                if little_endian {
                    LittleEndian::$write(bytes, self);
                } else {
                    BigEndian::$write(bytes, self);
                }
            }

            fn to_f64(self) -> f64 {
                f64::from(self)
            }
        }
    };
}

impl_nifti_element!(i16, Int16, read_i16, write_i16);
impl_nifti_element!(i32, Int32, read_i32, write_i32);
impl_nifti_element!(f32, Float32, read_f32, write_f32);
impl_nifti_element!(f64, Float64, read_f64, write_f64);

/// Typed, zero-copy view of the voxel region.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelView<'a> {
    datatype: DataType,
    bytes: &'a [u8],
    little_endian: bool,
    shape: Vec<usize>,
}

impl<'a> VoxelView<'a> {
    pub fn datatype(&self) -> DataType {
        self.datatype
    }

    /// Extents of the used axes.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.bytes.len() / self.datatype.byte_size()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn is_little_endian(&self) -> bool {
        self.little_endian
    }

    /// Raw voxel bytes in stored byte order.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Element `index` in storage order, widened to `f64`.
    pub fn get(&self, index: usize) -> Option<f64> {
        let width = self.datatype.byte_size();
        let start = index.checked_mul(width)?;
        let bytes = self.bytes.get(start..start.checked_add(width)?)?;
        Some(self.decode_f64(bytes))
    }

    fn decode_f64(&self, bytes: &[u8]) -> f64 {
        let le = self.little_endian;
        match self.datatype {
            DataType::UInt8 => u8::read(bytes, le).to_f64(),
            DataType::Int16 => i16::read(bytes, le).to_f64(),
            DataType::Int32 => i32::read(bytes, le).to_f64(),
            DataType::Float32 => f32::read(bytes, le).to_f64(),
            DataType::Float64 => f64::read(bytes, le),
        }
    }

    /// All elements in storage order, widened to `f64`.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.bytes
            .chunks_exact(self.datatype.byte_size())
            .map(|chunk| self.decode_f64(chunk))
    }

    fn fortran_array<T>(&self, values: Vec<T>) -> Result<ArrayD<T>> {
        let got = values.len();
        ArrayD::from_shape_vec(IxDyn(&self.shape).f(), values).map_err(|_| {
            HeaderError::ShapeMismatch {
                expected: self.shape.iter().product(),
                got,
            }
            .into()
        })
    }

    /// Copy into a Fortran-order array of the stored element type.
    pub fn to_array<T: NiftiElement>(&self) -> Result<ArrayD<T>> {
        if T::DATA_TYPE != self.datatype {
            return Err(FormatError::ElementKindMismatch {
                stored: self.datatype.type_name(),
                requested: T::DATA_TYPE.type_name(),
            }
            .into());
        }
        let values = self
            .bytes
            .chunks_exact(self.datatype.byte_size())
            .map(|chunk| T::read(chunk, self.little_endian))
            .collect();
        self.fortran_array(values)
    }

    /// Convert any stored type to a Fortran-order `f32` array.
    pub fn to_f32(&self) -> Result<ArrayD<f32>> {
        self.fortran_array(self.iter().map(|v| v as f32).collect())
    }
}

/// Byte range of the voxel block, validating dims, datatype and bitpix.
fn data_region(
    header: &NiftiHeader,
    available: usize,
) -> std::result::Result<Range<usize>, FormatError> {
    let used = header.ndim() + 1;
    for (index, &value) in header.dim.iter().enumerate().take(used).skip(1) {
        if value < 0 {
            return Err(FormatError::BadDim { index, value });
        }
    }

    let datatype = header.data_type()?;
    if header.bitpix != datatype.bitpix() {
        return Err(FormatError::BitpixMismatch {
            datatype: datatype.code(),
            bitpix: header.bitpix,
            expected: datatype.bitpix(),
        });
    }

    let start = header.data_offset();
    let end = header
        .data_size()?
        .checked_add(start)
        .unwrap_or(usize::MAX);
    if end > available {
        return Err(FormatError::Truncated {
            needed: end,
            available,
        });
    }
    Ok(start..end)
}

/// Bind the header's shape and datatype to the voxel region of `bytes`.
pub fn bind_data<'a>(
    header: &NiftiHeader,
    bytes: &'a [u8],
) -> std::result::Result<VoxelView<'a>, FormatError> {
    let region = data_region(header, bytes.len())?;
    Ok(VoxelView {
        datatype: header.data_type()?,
        bytes: &bytes[region],
        little_endian: header.is_little_endian(),
        shape: header.shape(),
    })
}

/// In-memory array accepted by [`NiftiImage::from_array`].
///
/// Only the `U8`, `I16`, `I32`, `F32` and `F64` variants have a supported
/// `NIfTI` datatype; the others are rejected with
/// [`FormatError::UnknownElementKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    U8(ArrayD<u8>),
    I8(ArrayD<i8>),
    I16(ArrayD<i16>),
    U16(ArrayD<u16>),
    I32(ArrayD<i32>),
    U32(ArrayD<u32>),
    I64(ArrayD<i64>),
    U64(ArrayD<u64>),
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
}

macro_rules! impl_from_array {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<ArrayD<$ty>> for ArrayData {
                fn from(arr: ArrayD<$ty>) -> Self {
                    Self::$variant(arr)
                }
            }
        )*
    };
}

impl_from_array!(
    u8 => U8, i8 => I8, i16 => I16, u16 => U16, i32 => I32,
    u32 => U32, i64 => I64, u64 => U64, f32 => F32, f64 => F64,
);

impl ArrayData {
    /// Rust name of the element type.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::U8(_) => "u8",
            Self::I8(_) => "i8",
            Self::I16(_) => "i16",
            Self::U16(_) => "u16",
            Self::I32(_) => "i32",
            Self::U32(_) => "u32",
            Self::I64(_) => "i64",
            Self::U64(_) => "u64",
            Self::F32(_) => "f32",
            Self::F64(_) => "f64",
        }
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            Self::U8(a) => a.shape(),
            Self::I8(a) => a.shape(),
            Self::I16(a) => a.shape(),
            Self::U16(a) => a.shape(),
            Self::I32(a) => a.shape(),
            Self::U32(a) => a.shape(),
            Self::I64(a) => a.shape(),
            Self::U64(a) => a.shape(),
            Self::F32(a) => a.shape(),
            Self::F64(a) => a.shape(),
        }
    }

    /// Datatype for this element kind.
    pub fn datatype(&self) -> std::result::Result<DataType, FormatError> {
        match self {
            Self::U8(_) => Ok(DataType::UInt8),
            Self::I16(_) => Ok(DataType::Int16),
            Self::I32(_) => Ok(DataType::Int32),
            Self::F32(_) => Ok(DataType::Float32),
            Self::F64(_) => Ok(DataType::Float64),
            _ => Err(FormatError::UnknownElementKind(self.kind_name())),
        }
    }

    /// Append elements little-endian in column-major order.
    fn write_le(&self, out: &mut Vec<u8>) -> std::result::Result<(), FormatError> {
        match self {
            Self::U8(a) => write_column_major(a, out),
            Self::I16(a) => write_column_major(a, out),
            Self::I32(a) => write_column_major(a, out),
            Self::F32(a) => write_column_major(a, out),
            Self::F64(a) => write_column_major(a, out),
            _ => return Err(FormatError::UnknownElementKind(self.kind_name())),
        }
        Ok(())
    }
}

fn write_column_major<T: NiftiElement>(arr: &ArrayD<T>, out: &mut Vec<u8>) {
    let width = T::DATA_TYPE.byte_size();
    let start = out.len();
    out.resize(start + arr.len() * width, 0);
    // Reversing the axes makes logical iteration walk the first axis fastest.
    for (chunk, &value) in out[start..].chunks_exact_mut(width).zip(arr.t().iter()) {
        value.write(chunk, true);
    }
}

/// `dim` for an array shape: axes up to the last non-singleton, unused set to 1.
fn dims_for_shape(shape: &[usize]) -> std::result::Result<[i16; 8], HeaderError> {
    let ndim = shape.iter().rposition(|&extent| extent != 1).map_or(1, |i| i + 1);
    if ndim > 7 {
        return Err(HeaderError::TooManyDimensions(ndim));
    }

    let mut dim = [1i16; 8];
    dim[0] = ndim as i16;
    for (axis, &extent) in shape.iter().enumerate().take(ndim) {
        dim[axis + 1] =
            i16::try_from(extent).map_err(|_| HeaderError::ExtentTooLarge { axis, extent })?;
    }
    Ok(dim)
}

/// A decoded or constructed `NIfTI-1` image.
#[derive(Debug, Clone)]
pub struct NiftiImage {
    header: NiftiHeader,
    bytes: Arc<Vec<u8>>,
    datatype: DataType,
    region: Range<usize>,
    affine: std::result::Result<Affine, GeometryError>,
}

impl NiftiImage {
    /// Decode a raw or gzip-compressed buffer with default options.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::from_bytes_with(bytes, &Gzip::new(), &DecodeConfig::default())
    }

    /// Decode through `gate` with explicit options.
    pub fn from_bytes_with<G: CompressionGate + ?Sized>(
        bytes: Vec<u8>,
        gate: &G,
        config: &DecodeConfig,
    ) -> Result<Self> {
        let bytes = if gate.is_compressed(&bytes) {
            gate.decompress(&bytes)?
        } else {
            bytes
        };
        Self::from_shared_bytes(Arc::new(bytes), config)
    }

    /// Decode an uncompressed buffer that may be shared with other images.
    pub fn from_shared_bytes(bytes: Arc<Vec<u8>>, config: &DecodeConfig) -> Result<Self> {
        let header = NiftiHeader::from_bytes_with(&bytes, config)?;
        let region = data_region(&header, bytes.len())?;
        let datatype = header.data_type()?;
        let affine = AffineSolver::new(config.quaternion_epsilon).best(&header);
        if let Err(e) = &affine {
            debug!("image has no usable affine: {e}");
        }
        Ok(Self {
            header,
            bytes,
            datatype,
            region,
            affine,
        })
    }

    /// Build a single-file image from an array and a voxel-to-world affine.
    ///
    /// The affine is stored as the sform (`sform_code = 2`); the image's
    /// affine is then resolved from the stored `f32` rows, as a reader would.
    ///
    /// `dim[0]` counts the axes up to the last extent that is not 1, so
    /// trailing singleton axes are dropped while a zero-length axis is kept
    /// (`[4, 1, 1]` gives 1, `[4, 0, 1]` gives 2, all-singleton gives 1).
    pub fn from_array(data: impl Into<ArrayData>, affine: Affine) -> Result<Self> {
        let data = data.into();
        let datatype = data.datatype()?;
        let dim = dims_for_shape(data.shape())?;
        let row = |r: usize| affine[r].map(|v| v as f32);

        let header = NiftiHeader {
            dim,
            datatype: datatype.code(),
            bitpix: datatype.bitpix(),
            pixdim: [1.0; 8],
            vox_offset: NiftiHeader::DEFAULT_VOX_OFFSET as f32,
            scl_slope: 1.0,
            scl_inter: 0.0,
            qform_code: 0,
            sform_code: 2,
            srow_x: row(0),
            srow_y: row(1),
            srow_z: row(2),
            magic: MAGIC_SINGLE,
            little_endian: true,
            ..NiftiHeader::default()
        };
        header.validate()?;

        let mut bytes = header.to_bytes();
        data.write_le(&mut bytes)?;

        let region = NiftiHeader::DEFAULT_VOX_OFFSET..bytes.len();
        let affine = AffineSolver::default().best(&header);
        Ok(Self {
            header,
            bytes: Arc::new(bytes),
            datatype,
            region,
            affine,
        })
    }

    pub fn header(&self) -> &NiftiHeader {
        &self.header
    }

    /// Resolved affine, or why none could be derived.
    pub fn affine(&self) -> std::result::Result<Affine, GeometryError> {
        self.affine.clone()
    }

    pub fn shape(&self) -> Vec<usize> {
        self.header.shape()
    }

    pub fn spacing(&self) -> Vec<f32> {
        self.header.spacing()
    }

    /// Stored element kind.
    pub fn dtype(&self) -> DataType {
        self.datatype
    }

    /// Zero-copy view of the voxel block.
    pub fn data(&self) -> VoxelView<'_> {
        VoxelView {
            datatype: self.datatype,
            bytes: &self.bytes[self.region.clone()],
            little_endian: self.header.is_little_endian(),
            shape: self.header.shape(),
        }
    }

    /// Shared buffer the image was decoded from.
    pub fn shared_bytes(&self) -> &Arc<Vec<u8>> {
        &self.bytes
    }

    pub fn to_array<T: NiftiElement>(&self) -> Result<ArrayD<T>> {
        self.data().to_array()
    }

    pub fn to_f32(&self) -> Result<ArrayD<f32>> {
        self.data().to_f32()
    }

    /// Voxels as `f32` after `scl_slope`/`scl_inter`.
    ///
    /// A zero slope means the values are stored unscaled.
    pub fn to_scaled_f32(&self) -> Result<ArrayD<f32>> {
        let slope = f64::from(self.header.scl_slope);
        let inter = f64::from(self.header.scl_inter);
        if slope == 0.0 {
            return self.to_f32();
        }
        let view = self.data();
        view.fortran_array(view.iter().map(|v| (v * slope + inter) as f32).collect())
    }

    /// Single-file encoding: header, original bytes up to `vox_offset`
    /// (extensions included), then the voxel block.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.header.to_bytes();
        out.truncate(NiftiHeader::SIZE);
        out.extend_from_slice(&self.bytes[NiftiHeader::SIZE..self.region.end]);
        out
    }

    /// [`to_bytes`](Self::to_bytes) passed through `gate`.
    pub fn to_compressed_bytes<G: CompressionGate + ?Sized>(&self, gate: &G) -> Result<Vec<u8>> {
        gate.compress(&self.to_bytes())
    }
}
