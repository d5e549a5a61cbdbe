//! End-to-end merges through the pipeline, synchronously.

use pdfmerge::CompressionLevel;
use pdfmerge::error::FailureKind;
use pdfmerge::merge::{MergePipeline, StreamCompressor};
use rstest::rstest;
use std::fs;
use tempfile::TempDir;

use crate::common::{
    BrokenEncryptor, FIXTURE_PASSWORD, FailsOnce, RecordingSink, assert_monotone, entry, labels,
    leftover_temp_files, page_labels, plain_settings, request, write_encrypted_pdf, write_pdf,
};

#[test]
fn test_two_documents_in_selection_order() {
    let dir = TempDir::new().unwrap();
    let doc1 = write_pdf(dir.path(), "doc1", 5);
    let doc2 = write_pdf(dir.path(), "doc2", 3);
    let output = dir.path().join("merged.pdf");

    let entries = [entry(&doc1, 5, &[0, 1]), entry(&doc2, 3, &[0, 1, 2])];
    let sink = RecordingSink::default();
    let outcome = MergePipeline::new()
        .run(&request(&entries, &plain_settings(&output)), &sink)
        .unwrap();

    assert_eq!(outcome.total_pages, 5);
    assert_eq!(outcome.output_path, output);
    assert_eq!(outcome.final_size_bytes, fs::metadata(&output).unwrap().len());

    let mut expected = labels("doc1", &[0, 1]);
    expected.extend(labels("doc2", &[0, 1, 2]));
    assert_eq!(page_labels(&output), expected);
    assert!(leftover_temp_files(&output).is_empty());
}

#[test]
fn test_encrypted_second_document_leaves_output_untouched() {
    let dir = TempDir::new().unwrap();
    let doc1 = write_pdf(dir.path(), "doc1", 5);
    let doc2 = write_encrypted_pdf(dir.path(), "doc2", 3);
    let output = dir.path().join("merged.pdf");
    fs::write(&output, b"previous output").unwrap();

    let entries = [entry(&doc1, 5, &[0, 1]), entry(&doc2, 3, &[0, 1, 2])];
    let failure = MergePipeline::new()
        .run(&request(&entries, &plain_settings(&output)), &RecordingSink::default())
        .unwrap_err();

    assert_eq!(failure.kind, FailureKind::AppendFailure);
    assert_eq!(failure.output_path, output);
    assert_eq!(fs::read(&output).unwrap(), b"previous output");
    assert!(leftover_temp_files(&output).is_empty());
}

#[test]
fn test_encrypted_document_with_no_previous_output() {
    let dir = TempDir::new().unwrap();
    let locked = write_encrypted_pdf(dir.path(), "locked", 2);
    let output = dir.path().join("merged.pdf");

    let failure = MergePipeline::new()
        .run(
            &request(&[entry(&locked, 2, &[0])], &plain_settings(&output)),
            &RecordingSink::default(),
        )
        .unwrap_err();

    assert_eq!(failure.kind, FailureKind::AppendFailure);
    assert!(!output.exists());
    assert!(leftover_temp_files(&output).is_empty());
}

#[rstest]
#[case(vec![vec![0]], 1)]
#[case(vec![vec![2, 0, 1], vec![1]], 4)]
#[case(vec![vec![0, 0, 0], vec![1, 1]], 5)]
#[case(vec![vec![0, 1, 2], vec![0, 1], vec![2]], 6)]
fn test_page_count_is_sum_of_selections(#[case] selections: Vec<Vec<usize>>, #[case] total: usize) {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("merged.pdf");

    let mut entries = Vec::new();
    let mut expected = Vec::new();
    for (index, pages) in selections.iter().enumerate() {
        let stem = format!("src{index}");
        let path = write_pdf(dir.path(), &stem, 3);
        entries.push(entry(&path, 3, pages));
        expected.extend(labels(&stem, pages));
    }

    let outcome = MergePipeline::new()
        .run(&request(&entries, &plain_settings(&output)), &RecordingSink::default())
        .unwrap();

    assert_eq!(outcome.total_pages, total);
    assert_eq!(page_labels(&output), expected);
}

#[rstest]
#[case(CompressionLevel::None)]
#[case(CompressionLevel::Fast)]
#[case(CompressionLevel::Maximum)]
fn test_progress_is_monotone_and_ends_at_100(#[case] level: CompressionLevel) {
    let dir = TempDir::new().unwrap();
    let a = write_pdf(dir.path(), "a", 4);
    let b = write_pdf(dir.path(), "b", 2);
    let c = write_pdf(dir.path(), "c", 7);
    let output = dir.path().join("merged.pdf");

    let mut settings = plain_settings(&output);
    settings.compression_level = level;
    let entries = [entry(&a, 4, &[0, 1, 2, 3]), entry(&b, 2, &[1]), entry(&c, 7, &[6, 0])];

    let sink = RecordingSink::default();
    MergePipeline::new()
        .run(&request(&entries, &settings), &sink)
        .unwrap();

    let percents = sink.percents();
    assert_monotone(&percents);
    assert_eq!(percents.first().copied(), Some(0.0));
    assert_eq!(percents.last().copied(), Some(100.0));
    assert!(
        sink.messages()
            .last()
            .is_some_and(|m| m.starts_with("Merge successful! Output: "))
    );
}

#[test]
fn test_status_messages_follow_pipeline_order() {
    let dir = TempDir::new().unwrap();
    let a = write_pdf(dir.path(), "a", 1);
    let output = dir.path().join("merged.pdf");

    let mut settings = plain_settings(&output);
    settings.compression_level = CompressionLevel::Normal;
    settings.password_protect = true;
    settings.password = Some(FIXTURE_PASSWORD.to_string());

    let sink = RecordingSink::default();
    MergePipeline::new()
        .run(&request(&[entry(&a, 1, &[0])], &settings), &sink)
        .unwrap();

    let messages = sink.messages();
    let position = |prefix: &str| {
        messages
            .iter()
            .position(|m| m.starts_with(prefix))
            .unwrap_or_else(|| panic!("missing '{prefix}' in {messages:?}"))
    };

    let order = [
        position("Starting merge process..."),
        position("Merging a.pdf (1/1)..."),
        position("Appending pages from a.pdf..."),
        position("Added 1 pages from a.pdf"),
        position("Finalizing and saving merged PDF..."),
        position("Compressing content streams..."),
        position("Applying password protection..."),
        position("Writing output file..."),
        position("Moving output file..."),
        position("Merge successful!"),
    ];
    assert!(order.windows(2).all(|w| w[0] < w[1]), "{messages:?}");
}

#[test]
fn test_compression_fault_does_not_stop_merge() {
    let dir = TempDir::new().unwrap();
    let a = write_pdf(dir.path(), "a", 3);
    let output = dir.path().join("merged.pdf");

    let mut settings = plain_settings(&output);
    settings.compression_level = CompressionLevel::High;

    let compressor = std::sync::Arc::new(FailsOnce::default());
    let pipeline = MergePipeline::new().with_compressor(SharedCompressor(compressor.clone()));
    let outcome = pipeline
        .run(&request(&[entry(&a, 3, &[0, 1, 2])], &settings), &RecordingSink::default())
        .unwrap();

    assert!(compressor.calls() > 1);
    assert_eq!(outcome.total_pages, 3);
    assert_eq!(page_labels(&output), labels("a", &[0, 1, 2]));
}

#[test]
fn test_encryption_fault_aborts_merge() {
    let dir = TempDir::new().unwrap();
    let a = write_pdf(dir.path(), "a", 2);
    let output = dir.path().join("merged.pdf");

    let mut settings = plain_settings(&output);
    settings.password_protect = true;
    settings.password = Some(FIXTURE_PASSWORD.to_string());

    let failure = MergePipeline::new()
        .with_encryptor(BrokenEncryptor)
        .run(&request(&[entry(&a, 2, &[0, 1])], &settings), &RecordingSink::default())
        .unwrap_err();

    assert_eq!(failure.kind, FailureKind::EncryptionFailure);
    assert!(failure.message.contains("injected fault"));
    assert!(!output.exists());
    assert!(leftover_temp_files(&output).is_empty());
}

#[test]
fn test_password_protected_output() {
    let dir = TempDir::new().unwrap();
    let a = write_pdf(dir.path(), "a", 2);
    let output = dir.path().join("merged.pdf");

    let mut settings = plain_settings(&output);
    settings.password_protect = true;
    settings.password = Some(FIXTURE_PASSWORD.to_string());

    MergePipeline::new()
        .run(&request(&[entry(&a, 2, &[1, 0])], &settings), &RecordingSink::default())
        .unwrap();

    let bytes = fs::read(&output).unwrap();
    let has_encrypt = bytes.windows(b"/Encrypt".len()).any(|w| w == b"/Encrypt");
    assert!(has_encrypt, "output has no Encrypt dictionary");
}

#[test]
fn test_commit_failure_keeps_target() {
    let dir = TempDir::new().unwrap();
    let a = write_pdf(dir.path(), "a", 1);

    // A non-empty directory cannot be replaced by a file rename
    let output = dir.path().join("merged.pdf");
    fs::create_dir(&output).unwrap();
    fs::write(output.join("keep.txt"), b"keep").unwrap();

    let failure = MergePipeline::new()
        .run(
            &request(&[entry(&a, 1, &[0])], &plain_settings(&output)),
            &RecordingSink::default(),
        )
        .unwrap_err();

    assert_eq!(failure.kind, FailureKind::CommitFailure);
    assert_eq!(fs::read(output.join("keep.txt")).unwrap(), b"keep");
    assert!(leftover_temp_files(&output).is_empty());
}

#[test]
fn test_existing_output_is_replaced_on_success() {
    let dir = TempDir::new().unwrap();
    let a = write_pdf(dir.path(), "a", 2);
    let output = dir.path().join("merged.pdf");
    fs::write(&output, b"stale").unwrap();

    MergePipeline::new()
        .run(
            &request(&[entry(&a, 2, &[1])], &plain_settings(&output)),
            &RecordingSink::default(),
        )
        .unwrap();

    assert_eq!(page_labels(&output), labels("a", &[1]));
}

#[test]
fn test_bookmarks_per_document() {
    let dir = TempDir::new().unwrap();
    let a = write_pdf(dir.path(), "a", 2);
    let b = write_pdf(dir.path(), "b", 2);
    let output = dir.path().join("merged.pdf");

    let mut settings = plain_settings(&output);
    settings.preserve_bookmarks = true;
    MergePipeline::new()
        .run(
            &request(&[entry(&a, 2, &[0, 1]), entry(&b, 2, &[1])], &settings),
            &RecordingSink::default(),
        )
        .unwrap();

    let doc = lopdf::Document::load(&output).unwrap();
    let catalog = doc.catalog().unwrap();
    let outlines_id = catalog.get(b"Outlines").unwrap().as_reference().unwrap();
    let outlines = doc.get_dictionary(outlines_id).unwrap();
    assert_eq!(outlines.get(b"Count").unwrap().as_i64().unwrap(), 2);
}

/// Lets a test keep a handle on the compressor it gives away.
struct SharedCompressor(std::sync::Arc<FailsOnce>);

impl StreamCompressor for SharedCompressor {
    fn compress(
        &self,
        id: lopdf::ObjectId,
        stream: &mut lopdf::Stream,
        level: u32,
    ) -> pdfmerge::Result<bool> {
        self.0.compress(id, stream, level)
    }
}
