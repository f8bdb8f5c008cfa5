//! File manager tests: retention after success and failure, directory
//! batches and progress reporting.

use std::path::Path;

use tempfile::TempDir;

use tiff_squeeze::batch::NO_FILES_MESSAGE;
use tiff_squeeze::{
    read_stack, BatchError, CompressionMethod, FileManager, FnProgress, IoError, NoProgress,
    PixelBuffer, ProgressEvent, Retention,
};

use super::test_utils::{
    build_gray8_tiff, sample_stack, write_gray16_stack, write_gray_f32, ByteOrderType,
};

fn scratch() -> TempDir {
    tempfile::tempdir().unwrap()
}

/// A float image with a NaN sample, which can never verify.
fn unverifiable(dir: &Path, name: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    let mut data: Vec<f32> = (0..16).map(|i| i as f32).collect();
    data[5] = f32::NAN;
    write_gray_f32(&path, 4, 4, &data);
    path
}

fn percents(events: &[ProgressEvent]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::Percent(p) => Some(*p),
            _ => None,
        })
        .collect()
}

// =============================================================================
// Single File
// =============================================================================

#[test]
fn test_verified_file_replaces_original() {
    let dir = scratch();
    let original = sample_stack(dir.path(), "stack.tif");
    let manager = FileManager::new(CompressionMethod::Zip);

    let mut events: Vec<ProgressEvent> = Vec::new();
    let outcome = manager.process_file(&original, &mut events).unwrap();

    assert!(outcome.verified);
    assert!(outcome.report.unwrap().passed());
    assert_eq!(outcome.kept, dir.path().join("stack_compressed_zip.tif"));
    assert_eq!(outcome.kept, outcome.compressed);
    assert!(outcome.backup.is_none());
    assert!(outcome.retention_error.is_none());

    assert!(!original.exists());
    assert!(outcome.compressed.exists());

    assert_eq!(events.first(), Some(&ProgressEvent::Started { total: 1 }));
    assert_eq!(events.last(), Some(&ProgressEvent::Finished));
    assert_eq!(percents(&events), vec![33, 66, 100]);

    let log: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::Log(line) => Some(line.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(log[0], "File: stack.tif");
    assert_eq!(log[1], "Compressed to: stack_compressed_zip.tif");
    assert!(log[2].starts_with("Size: "));
    assert_eq!(log[3], "Verification: Success");
    assert!(log.contains(&"Original file deleted: stack.tif"));
    assert!(log.contains(&"Kept file: stack_compressed_zip.tif"));
}

#[test]
fn test_failed_verification_keeps_original() {
    let dir = scratch();
    let original = unverifiable(dir.path(), "nan.tif");
    let manager = FileManager::new(CompressionMethod::Lzw);

    let mut events: Vec<ProgressEvent> = Vec::new();
    let outcome = manager.process_file(&original, &mut events).unwrap();

    assert!(!outcome.verified);
    let report = outcome.report.unwrap();
    assert!(!report.pixel_values_match);
    assert!(!report.statistical_match);
    assert_eq!(outcome.kept, original);

    assert!(original.exists());
    assert!(!outcome.compressed.exists());

    let lines: Vec<String> = events
        .into_iter()
        .filter_map(|e| match e {
            ProgressEvent::Log(line) => Some(line),
            _ => None,
        })
        .collect();
    assert!(lines.contains(&"Verification: Failed".to_string()));
    assert!(lines.contains(&"- Failed: pixel_values_match".to_string()));
    assert!(lines.contains(&"Compressed file deleted: nan_compressed_lzw.tif".to_string()));
}

#[test]
fn test_non_tiff_file_is_an_error() {
    let dir = scratch();
    let junk = dir.path().join("junk.tif");
    std::fs::write(&junk, b"not a tiff at all").unwrap();

    let result = FileManager::new(CompressionMethod::Zip).process_file(&junk, &mut NoProgress);
    assert!(matches!(result, Err(BatchError::Compress(_))));
    assert!(junk.exists());
}

// =============================================================================
// Retention
// =============================================================================

#[test]
fn test_backup_moves_original() {
    let dir = scratch();
    let backup = scratch();
    let backup_dir = backup.path().join("originals");
    let original = sample_stack(dir.path(), "stack.tif");

    let manager = FileManager::new(CompressionMethod::PackBits)
        .with_retention(Retention::Backup(backup_dir.clone()));
    let outcome = manager.process_file(&original, &mut NoProgress).unwrap();

    assert!(outcome.verified);
    assert_eq!(outcome.backup, Some(backup_dir.join("stack.tif")));
    assert!(!original.exists());
    assert!(backup_dir.join("stack.tif").exists());
    assert!(outcome.compressed.exists());
}

#[test]
fn test_backup_moves_compressed_on_failure() {
    let dir = scratch();
    let backup = scratch();
    let original = unverifiable(dir.path(), "nan.tif");

    let manager = FileManager::new(CompressionMethod::Zip)
        .with_retention(Retention::Backup(backup.path().to_path_buf()));
    let outcome = manager.process_file(&original, &mut NoProgress).unwrap();

    assert!(!outcome.verified);
    assert!(original.exists());
    assert!(!outcome.compressed.exists());
    assert_eq!(
        outcome.backup,
        Some(backup.path().join("nan_compressed_zip.tif"))
    );
}

#[test]
fn test_keep_both_leaves_files() {
    let dir = scratch();
    let original = sample_stack(dir.path(), "stack.tif");

    let manager = FileManager::new(CompressionMethod::Zip).with_retention(Retention::KeepBoth);
    let outcome = manager.process_file(&original, &mut NoProgress).unwrap();

    assert!(outcome.verified);
    assert_eq!(outcome.kept, outcome.compressed);
    assert!(original.exists());
    assert!(outcome.compressed.exists());
}

#[test]
fn test_retention_error_keeps_original() {
    let dir = scratch();
    let original = sample_stack(dir.path(), "stack.tif");
    let not_a_dir = dir.path().join("backup.txt");
    std::fs::write(&not_a_dir, b"occupied").unwrap();

    let manager = FileManager::new(CompressionMethod::Zip)
        .with_retention(Retention::Backup(not_a_dir));
    let outcome = manager.process_file(&original, &mut NoProgress).unwrap();

    assert!(outcome.verified);
    assert!(outcome.retention_error.is_some());
    assert_eq!(outcome.kept, original);
    assert!(original.exists());
    assert!(outcome.compressed.exists());
}

// =============================================================================
// Directories
// =============================================================================

#[test]
fn test_directory_batch_continues_past_bad_files() {
    let dir = scratch();
    sample_stack(dir.path(), "a.tif");
    std::fs::write(dir.path().join("broken.tif"), b"garbage").unwrap();
    std::fs::create_dir(dir.path().join("sub")).unwrap();
    sample_stack(&dir.path().join("sub"), "b.tif");
    sample_stack(dir.path(), "x_compressed_zip.tif");

    let manager = FileManager::new(CompressionMethod::Zip);
    let mut events: Vec<ProgressEvent> = Vec::new();
    let report = manager.process_path(dir.path(), &mut events).unwrap();

    assert_eq!(report.files.len(), 2);
    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].path, dir.path().join("broken.tif"));
    assert_eq!(report.skipped, vec![dir.path().join("x_compressed_zip.tif")]);
    assert_eq!(report.failed(), 1);
    assert!(!report.is_success());
    assert_eq!(report.to_string(), "2 verified, 1 failed, 1 skipped");

    assert!(dir.path().join("a_compressed_zip.tif").exists());
    assert!(!dir.path().join("a.tif").exists());
    assert!(dir.path().join("sub").join("b_compressed_zip.tif").exists());
    assert!(dir.path().join("broken.tif").exists());

    assert_eq!(events.first(), Some(&ProgressEvent::Started { total: 3 }));
    assert_eq!(events.last(), Some(&ProgressEvent::Finished));
    assert_eq!(percents(&events), vec![33, 66, 100]);
    let started: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::FileStarted { index, total: 3, .. } => Some(*index),
            _ => None,
        })
        .collect();
    assert_eq!(started, vec![1, 2, 3]);

    assert!(report
        .log
        .iter()
        .any(|line| line.starts_with("Error processing broken.tif")));
}

#[test]
fn test_same_stem_inputs_do_not_share_an_output() {
    let dir = scratch();
    let tif = dir.path().join("scan.tif");
    let tiff = dir.path().join("scan.tiff");
    write_gray16_stack(&tif, 4, 4, &[11; 16], None);
    write_gray16_stack(&tiff, 4, 4, &[99; 16], None);

    let report = FileManager::new(CompressionMethod::Zip)
        .process_path(dir.path(), &mut NoProgress)
        .unwrap();

    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].path, tiff);
    assert!(report.failures[0].error.contains("overwrite"));

    let output = dir.path().join("scan_compressed_zip.tif");
    assert!(!tif.exists());
    assert!(tiff.exists());
    assert_eq!(read_stack(&output).unwrap().pixels, PixelBuffer::U16(vec![11; 16]));
    assert_eq!(read_stack(&tiff).unwrap().pixels, PixelBuffer::U16(vec![99; 16]));
}

#[test]
fn test_backup_keeps_every_same_named_original() {
    let dir = scratch();
    let backup = scratch();
    for sub in ["a", "b"] {
        std::fs::create_dir(dir.path().join(sub)).unwrap();
        sample_stack(&dir.path().join(sub), "x.tif");
    }

    let manager = FileManager::new(CompressionMethod::Lzw)
        .with_retention(Retention::Backup(backup.path().to_path_buf()));
    let report = manager.process_path(dir.path(), &mut NoProgress).unwrap();

    assert_eq!(report.succeeded(), 2);
    let backups: Vec<_> = report.files.iter().map(|f| f.backup.clone().unwrap()).collect();
    assert_eq!(
        backups,
        vec![backup.path().join("x.tif"), backup.path().join("x (1).tif")]
    );
    assert_eq!(std::fs::read_dir(backup.path()).unwrap().count(), 2);
}

#[test]
fn test_oversized_shape_fails_only_that_file() {
    let dir = scratch();
    sample_stack(dir.path(), "a.tif");
    let huge = dir.path().join("huge.tif");
    std::fs::write(
        &huge,
        build_gray8_tiff(
            ByteOrderType::LittleEndian,
            false,
            4,
            4,
            &[0; 16],
            Some(r#"{"shape": [18446744073709551615, 4, 4]}"#),
        ),
    )
    .unwrap();

    let report = FileManager::new(CompressionMethod::Zip)
        .process_path(dir.path(), &mut NoProgress)
        .unwrap();

    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].path, huge);
    assert!(huge.exists());
}

#[test]
fn test_empty_directory() {
    let dir = scratch();
    std::fs::write(dir.path().join("readme.txt"), b"no images here").unwrap();

    let report = FileManager::new(CompressionMethod::Zip)
        .process_path(dir.path(), &mut NoProgress)
        .unwrap();

    assert!(report.files.is_empty());
    assert!(report.is_success());
    assert_eq!(report.log, vec![NO_FILES_MESSAGE.to_string()]);
}

#[test]
fn test_single_file_path() {
    let dir = scratch();
    let original = sample_stack(dir.path(), "stack.tif");

    let mut seen: Vec<ProgressEvent> = Vec::new();
    let report = FileManager::new(CompressionMethod::Lzw)
        .process_path(&original, &mut FnProgress(|e: ProgressEvent| seen.push(e)))
        .unwrap();

    assert_eq!(report.files.len(), 1);
    assert!(report.is_success());
    assert!(!report.log.is_empty());
    assert_eq!(percents(&seen), vec![33, 66, 100]);
}

#[test]
fn test_missing_path() {
    let dir = scratch();
    let result = FileManager::new(CompressionMethod::Zip)
        .process_path(dir.path().join("nowhere"), &mut NoProgress);
    assert!(matches!(result, Err(BatchError::Io(IoError::NotFound(_)))));
}
