//! Compression tests: every method, output naming and metadata survival.

use tempfile::TempDir;

use tiff_squeeze::format::tiff::{Compression, SeriesKind, TiffSeries};
use tiff_squeeze::{
    compressed_path_for, is_compressed_output, read_stack, CompressError, CompressionMethod,
    FormatError, PixelBuffer, TiffCompressor, TiffCompressorManager, TiffError, TiffFlavor,
    TiffVerifier,
};

use super::test_utils::{
    gradient_u16, gradient_u8, is_tiff_magic, sample_stack, write_gray16_stack,
    write_gray8_stack, write_rgb8,
};

fn scratch() -> TempDir {
    tempfile::tempdir().unwrap()
}

// =============================================================================
// Methods
// =============================================================================

#[test]
fn test_every_method_round_trips() {
    for method in CompressionMethod::ALL {
        let dir = scratch();
        let original = sample_stack(dir.path(), "stack.tif");

        let (compressed, stats) = TiffCompressorManager::compress_file(&original, method).unwrap();
        assert_eq!(
            compressed,
            dir.path().join(format!("stack_compressed_{}.tif", method.as_str()))
        );
        assert!(is_tiff_magic(&std::fs::read(&compressed).unwrap()));

        assert_eq!(stats.original_size, std::fs::metadata(&original).unwrap().len());
        assert_eq!(stats.compressed_size, std::fs::metadata(&compressed).unwrap().len());

        let report = TiffVerifier::new(&original, &compressed).verify_all().unwrap();
        assert!(report.passed(), "{method} failed: {:?}", report.failed_checks());
    }
}

#[test]
fn test_pages_use_requested_compression() {
    let expected = [
        (CompressionMethod::Lzw, Compression::Lzw),
        (CompressionMethod::Zip, Compression::AdobeDeflate),
        (CompressionMethod::PackBits, Compression::PackBits),
    ];
    for (method, scheme) in expected {
        let dir = scratch();
        let original = sample_stack(dir.path(), "stack.tif");
        let (compressed, _) = TiffCompressorManager::compress_file(&original, method).unwrap();

        let series = TiffSeries::open(&compressed).unwrap();
        assert_eq!(series.pages.len(), 2);
        for page in &series.pages {
            assert_eq!(page.compression_scheme(), Some(scheme));
        }
    }
}

#[test]
fn test_imagej_metadata_survives() {
    let dir = scratch();
    let original = sample_stack(dir.path(), "stack.tif");
    let (compressed, _) =
        TiffCompressorManager::compress_file(&original, CompressionMethod::Lzw).unwrap();

    let series = TiffSeries::open(&compressed).unwrap();
    assert_eq!(series.kind, SeriesKind::ImageJ);
    assert_eq!(series.shape, vec![2, 8, 8]);

    let meta = series.imagej.unwrap();
    assert_eq!(meta.frames(), Some(2));
    assert_eq!(meta.images(), Some(2));
    assert!(meta.contains_key("unit"));
}

#[test]
fn test_plain_stack_keeps_shape() {
    let dir = scratch();
    let original = dir.path().join("plain.tif");
    write_gray16_stack(&original, 8, 4, &gradient_u16(3, 8, 4), None);

    let (compressed, _) =
        TiffCompressorManager::compress_file(&original, CompressionMethod::Zip).unwrap();

    let before = TiffSeries::open(&original).unwrap();
    let after = TiffSeries::open(&compressed).unwrap();
    assert_eq!(before.kind, SeriesKind::Generic);
    assert_eq!(after.kind, SeriesKind::Shaped);
    assert_eq!(before.shape, vec![3, 4, 8]);
    assert_eq!(after.shape, before.shape);
    assert!(after.imagej.is_none());
}

#[test]
fn test_eight_bit_and_rgb_round_trip() {
    let dir = scratch();

    let gray = dir.path().join("gray.tif");
    write_gray8_stack(&gray, 6, 5, &gradient_u8(4, 6, 5));
    let rgb = dir.path().join("rgb.tif");
    write_rgb8(&rgb, 6, 5, &gradient_u8(1, 6 * 3, 5));

    for original in [gray, rgb] {
        let (compressed, _) =
            TiffCompressorManager::compress_file(&original, CompressionMethod::PackBits).unwrap();
        let a = read_stack(&original).unwrap();
        let b = read_stack(&compressed).unwrap();
        assert_eq!(a.shape, b.shape);
        assert_eq!(a.pixels, b.pixels);
        assert!(matches!(b.pixels, PixelBuffer::U8(_)));
    }
}

#[test]
fn test_compressor_into_explicit_output() {
    let dir = scratch();
    let original = sample_stack(dir.path(), "stack.tif");
    let output = dir.path().join("out").join("custom.tif");
    std::fs::create_dir_all(output.parent().unwrap()).unwrap();

    let compressor = TiffCompressor::new(&original).unwrap();
    assert_eq!(compressor.input(), original.as_path());
    let stats = compressor.compress(&output, CompressionMethod::Zip).unwrap();

    assert_eq!(stats.original_size, compressor.original_size());
    assert!(output.exists());
    assert!(TiffVerifier::new(&original, &output).verify_all().unwrap().passed());
}

// =============================================================================
// Failures
// =============================================================================

#[test]
fn test_missing_input() {
    let dir = scratch();
    let result = TiffCompressor::new(dir.path().join("missing.tif"));
    assert!(matches!(result, Err(CompressError::Io(_))));
}

#[test]
fn test_non_tiff_input_leaves_no_output() {
    let dir = scratch();
    let junk = dir.path().join("junk.tif");
    std::fs::write(&junk, b"II*\0this is not really a tiff").unwrap();

    let result = TiffCompressorManager::compress_file(&junk, CompressionMethod::Zip);
    assert!(matches!(
        result,
        Err(CompressError::Format(FormatError::Tiff(TiffError::InvalidIfdOffset(_))))
    ));
    assert!(!compressed_path_for(&junk, CompressionMethod::Zip).exists());
}

#[test]
fn test_existing_output_is_never_replaced() {
    let dir = scratch();
    let original = sample_stack(dir.path(), "stack.tif");
    let taken = compressed_path_for(&original, CompressionMethod::Zip);
    std::fs::write(&taken, b"someone else's file").unwrap();

    let result = TiffCompressorManager::compress_file(&original, CompressionMethod::Zip);
    assert!(matches!(result, Err(CompressError::OutputExists(_))));
    assert_eq!(std::fs::read(&taken).unwrap(), b"someone else's file");
    assert!(original.exists());
}

#[test]
fn test_compressor_reports_flavor() {
    let dir = scratch();
    let original = sample_stack(dir.path(), "stack.tif");
    assert_eq!(TiffCompressor::new(&original).unwrap().flavor(), TiffFlavor::ImageJ);
}

#[test]
fn test_unknown_method() {
    let result = "jpeg".parse::<CompressionMethod>();
    assert!(matches!(result, Err(CompressError::UnknownMethod(m)) if m == "jpeg"));
    assert_eq!("Deflate".parse::<CompressionMethod>().unwrap(), CompressionMethod::Zip);
}

// =============================================================================
// Naming and Directory Compression
// =============================================================================

#[test]
fn test_output_naming() {
    let output = compressed_path_for("/data/scan.ome.tiff", CompressionMethod::PackBits);
    assert_eq!(
        output,
        std::path::PathBuf::from("/data/scan.ome_compressed_packbits.tif")
    );
    assert!(is_compressed_output(&output));
    assert!(is_compressed_output("x_compressed_lzw.tif"));
    assert!(!is_compressed_output("/data/scan.tif"));
    assert!(!is_compressed_output("compressed.tif"));
}

#[test]
fn test_batch_compress_directory() {
    let input = scratch();
    let output = scratch();
    sample_stack(input.path(), "a.tif");
    sample_stack(input.path(), "b.tiff");
    std::fs::write(input.path().join("broken.tif"), b"not a tiff").unwrap();
    std::fs::write(input.path().join("notes.txt"), b"ignored").unwrap();

    let results = TiffCompressorManager::batch_compress_directory(
        input.path(),
        output.path().join("compressed"),
        CompressionMethod::Lzw,
    )
    .unwrap();

    let names: Vec<&str> = results.iter().map(|r| r.file_name.as_str()).collect();
    assert_eq!(names, vec!["a.tif", "b.tiff"]);
    for entry in &results {
        assert!(entry.output.exists());
        assert_eq!(
            entry.output.file_name().unwrap().to_string_lossy(),
            format!("compressed_{}", entry.file_name)
        );
    }

    // Originals are left alone
    assert!(input.path().join("a.tif").exists());
    assert!(input.path().join("b.tiff").exists());
}
