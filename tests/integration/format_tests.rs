//! Container edge cases: byte order, BigTIFF and format detection.
//!
//! Files are built byte by byte so the layouts the `tiff` encoder never
//! writes (big-endian, BigTIFF) are covered too.

use tiff_squeeze::format::tiff::{ByteOrder, SeriesKind, TiffSeries};
use tiff_squeeze::io::BytesRangeReader;
use tiff_squeeze::{
    detect_file_format, detect_format, read_stack, CompressionMethod, FormatError, PixelBuffer,
    TiffCompressorManager, TiffError, TiffFlavor, TiffVerifier, VerifyError,
};

use super::test_utils::{
    build_gray8_tiff, gradient_u16, gradient_u8, sample_stack, write_gray16_stack, ByteOrderType,
};

const IMAGEJ_DESCRIPTION: &str = "ImageJ=1.53t\nimages=1\nunit=micron\n";

fn parse(data: Vec<u8>) -> TiffSeries {
    TiffSeries::parse(&BytesRangeReader::new(data, "test.tif")).unwrap()
}

// =============================================================================
// Byte Order and BigTIFF
// =============================================================================

#[test]
fn test_every_container_layout_parses() {
    let pixels = gradient_u8(1, 12, 7);
    let layouts = [
        (ByteOrderType::LittleEndian, false),
        (ByteOrderType::BigEndian, false),
        (ByteOrderType::LittleEndian, true),
        (ByteOrderType::BigEndian, true),
    ];

    for (order, bigtiff) in layouts {
        let series = parse(build_gray8_tiff(order, bigtiff, 12, 7, &pixels, None));

        let expected_order = match order {
            ByteOrderType::LittleEndian => ByteOrder::LittleEndian,
            ByteOrderType::BigEndian => ByteOrder::BigEndian,
        };
        assert_eq!(series.header.byte_order, expected_order);
        assert_eq!(series.header.is_bigtiff, bigtiff);
        assert_eq!(series.kind, SeriesKind::Generic);
        assert_eq!(series.shape, vec![7, 12]);
        assert_eq!(series.page_indices, vec![0]);

        let page = series.first_page().unwrap();
        assert_eq!(page.bits_per_sample, 8);
        assert_eq!(page.compression, 1);
    }
}

#[test]
fn test_big_endian_and_bigtiff_decode_and_compress() {
    let pixels = gradient_u8(1, 10, 6);
    for bigtiff in [false, true] {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.tif");
        std::fs::write(
            &path,
            build_gray8_tiff(ByteOrderType::BigEndian, bigtiff, 10, 6, &pixels, None),
        )
        .unwrap();

        let stack = read_stack(&path).unwrap();
        assert_eq!(stack.shape, vec![6, 10]);
        assert_eq!(stack.pixels, PixelBuffer::U8(pixels.clone()));

        let (compressed, _) =
            TiffCompressorManager::compress_file(&path, CompressionMethod::Zip).unwrap();
        assert!(TiffVerifier::new(&path, &compressed).verify_all().unwrap().passed());
    }
}

#[test]
fn test_description_read_in_both_byte_orders() {
    let pixels = gradient_u8(1, 4, 4);
    for order in [ByteOrderType::LittleEndian, ByteOrderType::BigEndian] {
        for bigtiff in [false, true] {
            let series = parse(build_gray8_tiff(
                order,
                bigtiff,
                4,
                4,
                &pixels,
                Some(IMAGEJ_DESCRIPTION),
            ));
            assert_eq!(series.description.as_deref(), Some(IMAGEJ_DESCRIPTION));
            assert_eq!(series.kind, SeriesKind::ImageJ);
            assert_eq!(series.imagej.unwrap().images(), Some(1));
        }
    }
}

#[test]
fn test_shaped_description() {
    let pixels = gradient_u8(1, 6, 4);
    let series = parse(build_gray8_tiff(
        ByteOrderType::LittleEndian,
        false,
        6,
        4,
        &pixels,
        Some(r#"{"shape": [4, 6]}"#),
    ));
    assert_eq!(series.kind, SeriesKind::Shaped);
    assert_eq!(series.shape, vec![4, 6]);
    assert!(series.imagej.is_none());
}

#[test]
fn test_multi_page_generic_series() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pages.tif");
    write_gray16_stack(&path, 5, 3, &gradient_u16(4, 5, 3), None);

    let series = TiffSeries::open(&path).unwrap();
    assert_eq!(series.kind, SeriesKind::Generic);
    assert_eq!(series.series_len(), 4);
    assert_eq!(series.shape, vec![4, 3, 5]);
    assert!(!series.is_imagej());
}

// =============================================================================
// Malformed Input
// =============================================================================

#[test]
fn test_bad_magic() {
    let mut data = build_gray8_tiff(ByteOrderType::LittleEndian, false, 2, 2, &[0; 4], None);
    data[0] = b'X';
    let result = TiffSeries::parse(&BytesRangeReader::new(data, "bad.tif"));
    assert!(matches!(result, Err(TiffError::InvalidMagic(_))));
}

#[test]
fn test_truncated_file() {
    let data = build_gray8_tiff(ByteOrderType::LittleEndian, false, 8, 8, &[1; 64], None);
    let truncated = data[..data.len() - 20].to_vec();
    assert!(TiffSeries::parse(&BytesRangeReader::new(truncated, "short.tif")).is_err());
}

#[test]
fn test_oversized_declared_shape_is_an_error() {
    let data = build_gray8_tiff(
        ByteOrderType::LittleEndian,
        false,
        4,
        4,
        &[0; 16],
        Some(r#"{"shape": [18446744073709551615, 4, 4]}"#),
    );
    let result = TiffSeries::parse(&BytesRangeReader::new(data.clone(), "huge.tif"));
    assert!(matches!(result, Err(TiffError::InvalidTagValue { .. })));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("huge.tif");
    std::fs::write(&path, data).unwrap();
    let result = TiffVerifier::new(&path, &path).verify_dimensions();
    assert!(matches!(result, Err(VerifyError::Dimensions(_))));
    assert!(read_stack(&path).is_err());
}

// =============================================================================
// Format Detection
// =============================================================================

#[test]
fn test_detect_flavors() {
    let pixels = gradient_u8(1, 4, 4);
    let cases = [
        (false, None, TiffFlavor::Tiff),
        (true, None, TiffFlavor::BigTiff),
        (false, Some(IMAGEJ_DESCRIPTION), TiffFlavor::ImageJ),
        (true, Some(IMAGEJ_DESCRIPTION), TiffFlavor::ImageJ),
        (false, Some("Acquired with a plain camera"), TiffFlavor::Tiff),
    ];

    for (bigtiff, description, expected) in cases {
        let data = build_gray8_tiff(
            ByteOrderType::BigEndian,
            bigtiff,
            4,
            4,
            &pixels,
            description,
        );
        let flavor = detect_format(&BytesRangeReader::new(data, "detect.tif")).unwrap();
        assert_eq!(flavor, expected, "{description:?} bigtiff={bigtiff}");
    }
}

#[test]
fn test_detect_rejects_non_tiff() {
    let png = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR".to_vec();
    let result = detect_format(&BytesRangeReader::new(png, "image.png"));
    assert!(matches!(result, Err(FormatError::UnsupportedFormat { .. })));

    let tiny = detect_format(&BytesRangeReader::new(vec![b'I', b'I'], "tiny.tif"));
    assert!(matches!(tiny, Err(FormatError::UnsupportedFormat { .. })));
}

#[test]
fn test_detect_file_format() {
    let dir = tempfile::tempdir().unwrap();
    let imagej = sample_stack(dir.path(), "imagej.tif");
    assert_eq!(detect_file_format(&imagej).unwrap(), TiffFlavor::ImageJ);

    let plain = dir.path().join("plain.tif");
    write_gray16_stack(&plain, 4, 4, &gradient_u16(1, 4, 4), None);
    assert_eq!(detect_file_format(&plain).unwrap(), TiffFlavor::Tiff);

    assert!(matches!(
        detect_file_format(dir.path().join("missing.tif")),
        Err(FormatError::Io(_))
    ));
}
