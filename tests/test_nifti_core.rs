//! Integration tests for the public NIfTI-1 API.
//!
//! Covers decoding of hand-built buffers in both byte orders, validation
//! failures, affine selection, voxel binding and gzip round trips.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use flate2::write::GzEncoder;
use flate2::Compression;
use nifti1::error::{Error, FormatError, GeometryError};
use nifti1::nifti::{
    self, AffineSolver, CodePolicy, DataType, DecodeConfig, Gzip, NiftiHeader, NiftiImage,
    NoCompression, XformCode,
};
use ndarray::{ArrayD, IxDyn, ShapeBuilder};
use proptest::prelude::*;
use std::io::Write;
use std::sync::Arc;

/// Create a test NIfTI image using the library's own functions
fn create_test_image(data: Vec<f32>, shape: Vec<usize>) -> NiftiImage {
    let c_order = ArrayD::from_shape_vec(shape.clone(), data).unwrap();
    let mut f_order = ArrayD::zeros(IxDyn(&shape).f());
    f_order.assign(&c_order);
    let affine = [
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ];
    NiftiImage::from_array(f_order, affine).unwrap()
}

/// 2x2x2 float32 volume, header written in the given byte order.
fn raw_volume(little_endian: bool) -> Vec<u8> {
    let mut bytes = vec![0u8; 352 + 32];
    macro_rules! put {
        ($write:ident, $range:expr, $value:expr) => {
            if little_endian {
                LittleEndian::$write(&mut bytes[$range], $value)
            } else {
                BigEndian::$write(&mut bytes[$range], $value)
            }
        };
    }
    put!(write_i32, 0..4, 348);
    put!(write_i16, 40..42, 3);
    put!(write_i16, 42..44, 2);
    put!(write_i16, 44..46, 2);
    put!(write_i16, 46..48, 2);
    put!(write_i16, 70..72, 16);
    put!(write_i16, 72..74, 32);
    put!(write_f32, 76..80, 1.0);
    put!(write_f32, 80..84, 1.5);
    put!(write_f32, 84..88, 1.5);
    put!(write_f32, 88..92, 3.0);
    put!(write_f32, 108..112, 352.0);
    put!(write_f32, 112..116, 1.0);
    for i in 0..8 {
        let at = 352 + i * 4;
        put!(write_f32, at..at + 4, i as f32);
    }
    bytes[344..348].copy_from_slice(b"n+1\0");
    bytes
}

fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

#[test]
fn test_decode_little_and_big_endian_agree() {
    let le = NiftiImage::from_bytes(raw_volume(true)).unwrap();
    let be = NiftiImage::from_bytes(raw_volume(false)).unwrap();

    assert!(le.header().is_little_endian());
    assert!(!be.header().is_little_endian());
    assert_eq!(le.shape(), vec![2, 2, 2]);
    assert_eq!(be.shape(), le.shape());
    assert_eq!(be.spacing(), vec![1.5, 1.5, 3.0]);
    assert_eq!(be.to_f32().unwrap(), le.to_f32().unwrap());
}

#[test]
fn test_voxel_view_is_zero_copy() {
    let image = NiftiImage::from_bytes(raw_volume(true)).unwrap();
    let view = image.data();
    assert_eq!(view.len(), 8);
    assert_eq!(view.datatype(), DataType::Float32);
    assert_eq!(
        view.as_bytes().as_ptr(),
        image.shared_bytes()[352..].as_ptr()
    );
    assert_eq!(view.iter().collect::<Vec<_>>(), (0..8).map(f64::from).collect::<Vec<_>>());
}

#[test]
fn test_load_invalid_magic_bytes() {
    let img = create_test_image(vec![1.0f32, 2.0, 3.0, 4.0], vec![2, 2, 1]);
    let mut file_data = img.to_bytes();
    file_data[344..348].copy_from_slice(b"BAD!");

    let err = NiftiImage::from_bytes(file_data).unwrap_err();
    assert!(err.to_string().contains("invalid NIfTI magic"));
}

#[test]
fn test_load_unsupported_data_type() {
    let img = create_test_image(vec![1.0f32, 2.0, 3.0, 4.0], vec![2, 2, 1]);
    let mut file_data = img.to_bytes();
    file_data[70..72].copy_from_slice(&9999i16.to_le_bytes());

    let err = NiftiImage::from_bytes(file_data).unwrap_err();
    assert!(err.to_string().contains("unsupported data type"));
}

fn decode_corrupted(corrupt: impl FnOnce(&mut Vec<u8>)) -> Error {
    let mut bytes = raw_volume(true);
    corrupt(&mut bytes);
    NiftiImage::from_bytes(bytes).unwrap_err()
}

#[test]
fn test_validation_failures() {
    let err = decode_corrupted(|b| LittleEndian::write_i32(&mut b[0..4], 347));
    assert!(matches!(err, Error::Format(FormatError::BadHeaderSize(347))));

    let err = decode_corrupted(|b| b[344..348].copy_from_slice(b"xxxx"));
    assert!(matches!(err, Error::Format(FormatError::BadMagic(_))));

    let err = decode_corrupted(|b| LittleEndian::write_i16(&mut b[40..42], 0));
    assert!(matches!(
        err,
        Error::Format(FormatError::BadDim { index: 0, value: 0 })
    ));

    let err = decode_corrupted(|b| LittleEndian::write_f32(&mut b[108..112], 100.0));
    assert!(matches!(err, Error::Format(FormatError::BadVoxOffset { .. })));

    let err = decode_corrupted(|b| b.truncate(300));
    assert!(matches!(err, Error::Format(FormatError::Truncated { .. })));

    // Header intact, voxel block cut short.
    let err = decode_corrupted(|b| b.truncate(360));
    assert!(matches!(
        err,
        Error::Format(FormatError::Truncated {
            needed: 384,
            available: 360
        })
    ));
}

#[test]
fn test_roundtrip_preserves_metadata() {
    let original_data = vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
    let img = create_test_image(original_data, vec![2, 2, 2]);

    let reloaded = NiftiImage::from_bytes(img.to_bytes()).unwrap();
    assert_eq!(reloaded.shape(), img.shape());
    assert_eq!(reloaded.dtype(), DataType::Float32);
    assert_eq!(reloaded.affine(), img.affine());
    assert_eq!(reloaded.to_f32().unwrap(), img.to_f32().unwrap());
    assert_eq!(reloaded.to_bytes(), img.to_bytes());
}

#[test]
fn test_gzip_roundtrip_through_flate2() {
    let raw = raw_volume(false);
    let image = NiftiImage::from_bytes(gzip(&raw)).unwrap();
    assert_eq!(image.to_bytes(), raw);

    let recompressed = image.to_compressed_bytes(&Gzip::new()).unwrap();
    let again = NiftiImage::from_bytes(recompressed).unwrap();
    assert_eq!(again.to_bytes(), raw);
}

#[test]
fn test_no_compression_gate_rejects_gzip() {
    let compressed = gzip(&raw_volume(true));
    let result = NiftiImage::from_bytes_with(compressed, &NoCompression, &DecodeConfig::default());
    assert!(result.is_err());
}

#[test]
fn test_strict_code_policy() {
    let mut bytes = raw_volume(true);
    LittleEndian::write_i16(&mut bytes[252..254], 7);

    assert!(NiftiImage::from_bytes(bytes.clone()).is_ok());

    let strict = DecodeConfig::builder()
        .code_policy(CodePolicy::Reject)
        .build();
    let err = NiftiImage::from_bytes_with(bytes, &Gzip::new(), &strict).unwrap_err();
    assert!(matches!(
        err,
        Error::Format(FormatError::CodeOutOfRange {
            field: "qform_code",
            code: 7
        })
    ));
}

#[test]
fn test_affine_selection() {
    let mut bytes = raw_volume(true);
    // sform only
    LittleEndian::write_i16(&mut bytes[254..256], XformCode::AlignedAnat.code());
    for (row, offset) in [280usize, 296, 312].into_iter().enumerate() {
        LittleEndian::write_f32(&mut bytes[offset + row * 4..offset + row * 4 + 4], 2.0);
        LittleEndian::write_f32(&mut bytes[offset + 12..offset + 16], 10.0);
    }
    let sform = NiftiImage::from_bytes(bytes.clone()).unwrap().affine().unwrap();
    assert_eq!(sform[0], [2.0, 0.0, 0.0, 10.0]);

    // qform wins once its code is set
    LittleEndian::write_i16(&mut bytes[252..254], XformCode::ScannerAnat.code());
    LittleEndian::write_f32(&mut bytes[268..272], -5.0);
    let qform = NiftiImage::from_bytes(bytes.clone()).unwrap().affine().unwrap();
    assert_eq!(qform[0], [1.5, 0.0, 0.0, -5.0]);
    assert_eq!(qform[2][2], 3.0);

    // qfac of zero makes the qform unusable without failing the load
    LittleEndian::write_f32(&mut bytes[76..80], 0.0);
    let image = NiftiImage::from_bytes(bytes).unwrap();
    assert_eq!(image.affine(), Err(GeometryError::InvalidQfac(0.0)));
    assert_eq!(image.data().len(), 8);
}

#[test]
fn test_shared_buffer_images() {
    let shared = Arc::new(raw_volume(true));
    let a = NiftiImage::from_shared_bytes(Arc::clone(&shared), &DecodeConfig::default()).unwrap();
    let b = NiftiImage::from_shared_bytes(Arc::clone(&shared), &DecodeConfig::default()).unwrap();
    assert!(Arc::ptr_eq(a.shared_bytes(), b.shared_bytes()));
    assert_eq!(Arc::strong_count(&shared), 3);
}

#[test]
fn test_images_decode_across_threads() {
    let image = NiftiImage::from_bytes(raw_volume(true)).unwrap();
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let image = image.clone();
            std::thread::spawn(move || image.to_f32().unwrap().sum())
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), 28.0);
    }
}

#[test]
fn test_header_roundtrip_via_module_api() {
    let header = NiftiHeader::from_bytes(&raw_volume(false)).unwrap();
    let encoded = header.to_bytes();
    let decoded = NiftiHeader::from_bytes(&encoded).unwrap();
    assert_eq!(decoded, header);
    assert_eq!(nifti::bind_data(&decoded, &raw_volume(false)).unwrap().len(), 8);
}

/// Unit quaternions with `w >= 0`, biased towards rotations near 180°.
fn unit_quaternion() -> impl Strategy<Value = [f64; 4]> {
    (
        prop_oneof![0.0f64..1.0, 0.0f64..1e-3],
        -1.0f64..1.0,
        -1.0f64..1.0,
        -1.0f64..1.0,
    )
        .prop_filter("non-degenerate", |(w, b, c, d)| {
            w * w + b * b + c * c + d * d > 1e-6
        })
        .prop_map(|(w, b, c, d)| {
            let n = (w * w + b * b + c * c + d * d).sqrt();
            [w / n, b / n, c / n, d / n]
        })
}

fn max_rotation_diff(a: [[f64; 3]; 3], b: [[f64; 3]; 3]) -> f64 {
    (0..3)
        .flat_map(|i| (0..3).map(move |j| (i, j)))
        .map(|(i, j)| (a[i][j] - b[i][j]).abs())
        .fold(0.0, f64::max)
}

#[test]
fn test_fill_positive_near_half_turn_keeps_rotation() {
    let solver = AffineSolver::default();
    for w in [5e-4, 1e-5, 1e-7] {
        let n = (w * w + 1.0f64).sqrt();
        let q = [w / n, 1.0 / n, 0.0, 0.0];
        let filled = solver.fill_positive([q[1], q[2], q[3]]).unwrap();
        let diff = max_rotation_diff(
            solver.quaternion_to_rotation(filled),
            solver.quaternion_to_rotation(q),
        );
        assert!(diff < 1e-6, "w = {w}: rotation off by {diff}");
    }
}

proptest! {
    #[test]
    fn prop_fill_positive_recovers_w(q in unit_quaternion()) {
        let solver = AffineSolver::default();
        let filled = solver.fill_positive([q[1], q[2], q[3]]).unwrap();
        prop_assert!((filled[0] - q[0]).abs() < 1e-6);
    }

    #[test]
    fn prop_fill_positive_reproduces_rotation(q in unit_quaternion()) {
        let solver = AffineSolver::default();
        let filled = solver.fill_positive([q[1], q[2], q[3]]).unwrap();
        let diff = max_rotation_diff(
            solver.quaternion_to_rotation(filled),
            solver.quaternion_to_rotation(q),
        );
        prop_assert!(diff < 1e-6, "rotation off by {}", diff);
    }

    #[test]
    fn prop_rotation_is_orthonormal(q in unit_quaternion()) {
        let r = AffineSolver::default().quaternion_to_rotation(q);
        for i in 0..3 {
            for j in 0..3 {
                let dot: f64 = (0..3).map(|k| r[k][i] * r[k][j]).sum();
                let expected = if i == j { 1.0 } else { 0.0 };
                prop_assert!((dot - expected).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn prop_header_encode_is_stable(
        dims in proptest::collection::vec(1i16..64, 1..=7),
        pixdim in proptest::array::uniform3(0.1f32..10.0),
        slope in -4.0f32..4.0,
        little_endian in any::<bool>(),
        descrip in proptest::collection::vec(1u8..=255, 0..=80),
    ) {
        let mut dim = [1i16; 8];
        dim[0] = dims.len() as i16;
        dim[1..=dims.len()].copy_from_slice(&dims);

        let header = NiftiHeader::builder()
            .dim(dim)
            .datatype(DataType::Int16)
            .pixdim([1.0, pixdim[0], pixdim[1], pixdim[2], 1.0, 1.0, 1.0, 1.0])
            .scaling(slope, 0.0)
            .descrip(&descrip)
            .little_endian(little_endian)
            .build()
            .unwrap();

        let once = header.to_bytes();
        let decoded = NiftiHeader::from_bytes(&once).unwrap();
        prop_assert_eq!(decoded.is_little_endian(), little_endian);
        prop_assert_eq!(&decoded.dim, &dim);
        prop_assert_eq!(&decoded.descrip[..descrip.len()], &descrip[..]);
        prop_assert_eq!(decoded.to_bytes(), once);
    }
}
