//! Shared fixtures for the integration tests.
//!
//! PDFs are generated on the fly. Every page draws one string literal,
//! `"{stem}-p{index}"`, so a merged file can be read back as a list of
//! page labels.

#![allow(dead_code)]

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use pdfmerge::config::OutputSettings;
use pdfmerge::error::{PdfMergeError, Result};
use pdfmerge::merge::{DocumentEncryptor, ProgressSink, Rc4Encryptor, StreamCompressor};
use pdfmerge::request::{DocumentEntry, MergeRequest};
use pdfmerge::task::{ResultReceiver, TaskResult};

/// Password used for protected fixtures.
pub const FIXTURE_PASSWORD: &str = "fixture-secret";

/// Build an in-memory document with `pages` labeled pages.
pub fn labeled_document(stem: &str, pages: usize) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let kids: Vec<Object> = (0..pages)
        .map(|index| {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![72.into(), 700.into()]),
                    Operation::new(
                        "Tj",
                        vec![Object::string_literal(format!("{stem}-p{index}"))],
                    ),
                    Operation::new("ET", vec![]),
                ],
            };
            let bytes = content.encode().unwrap_or_default();
            let content_id = doc.add_object(Stream::new(dictionary! {}, bytes));
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            })
            .into()
        })
        .collect();

    doc.objects.insert(
        pages_id,
        dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }
        .into(),
    );
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);
    doc
}

/// Write a labeled PDF as `{dir}/{stem}.pdf`.
pub fn write_pdf(dir: &Path, stem: &str, pages: usize) -> PathBuf {
    let mut doc = labeled_document(stem, pages);
    let path = dir.join(format!("{stem}.pdf"));
    doc.save(&path).expect("failed to write fixture");
    path
}

/// Write a labeled PDF protected with [`FIXTURE_PASSWORD`].
pub fn write_encrypted_pdf(dir: &Path, stem: &str, pages: usize) -> PathBuf {
    let mut doc = labeled_document(stem, pages);
    Rc4Encryptor
        .encrypt(&mut doc, FIXTURE_PASSWORD)
        .expect("failed to encrypt fixture");
    let path = dir.join(format!("{stem}.pdf"));
    doc.save(&path).expect("failed to write fixture");
    path
}

/// Labels of every page of the PDF at `path`, in page order.
pub fn page_labels(path: &Path) -> Vec<String> {
    let doc = Document::load(path).expect("failed to load merged output");
    doc.get_pages()
        .values()
        .map(|&page_id| page_label(&doc, page_id))
        .collect()
}

fn page_label(doc: &Document, page_id: ObjectId) -> String {
    let bytes = doc.get_page_content(page_id).expect("page has no content");
    let content = Content::decode(&bytes).expect("page content does not parse");
    content
        .operations
        .iter()
        .filter(|op| op.operator == "Tj")
        .find_map(|op| match op.operands.first() {
            Some(Object::String(text, _)) => Some(String::from_utf8_lossy(text).into_owned()),
            _ => None,
        })
        .unwrap_or_default()
}

/// Expected labels for `pages` of `stem`.
pub fn labels(stem: &str, pages: &[usize]) -> Vec<String> {
    pages.iter().map(|index| format!("{stem}-p{index}")).collect()
}

/// Entry for `path` selecting `pages`.
pub fn entry(path: &Path, page_count: usize, pages: &[usize]) -> DocumentEntry {
    let mut entry = DocumentEntry::new(path, page_count);
    entry.selected_pages = pages.to_vec();
    entry
}

/// Uncompressed, unprotected settings targeting `output`.
pub fn plain_settings(output: &Path) -> OutputSettings {
    let mut settings = OutputSettings::new(output);
    settings.compression_level = pdfmerge::CompressionLevel::None;
    settings
}

/// Build a request, panicking on invalid input.
pub fn request(entries: &[DocumentEntry], settings: &OutputSettings) -> MergeRequest {
    MergeRequest::build(entries, settings).expect("request should build")
}

/// Temporary siblings left next to `output`.
pub fn leftover_temp_files(output: &Path) -> Vec<PathBuf> {
    let dir = output.parent().expect("output has a parent");
    std::fs::read_dir(dir)
        .expect("output directory is readable")
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .is_some_and(|ext| ext.to_string_lossy().ends_with("part_tmp"))
        })
        .collect()
}

/// Sink that remembers every progress point.
#[derive(Debug, Default)]
pub struct RecordingSink {
    points: RefCell<Vec<(String, f64)>>,
}

impl RecordingSink {
    pub fn messages(&self) -> Vec<String> {
        self.points.borrow().iter().map(|(m, _)| m.clone()).collect()
    }

    pub fn percents(&self) -> Vec<f64> {
        self.points.borrow().iter().map(|(_, p)| *p).collect()
    }
}

impl ProgressSink for RecordingSink {
    fn progress(&self, message: &str, percent: f64) {
        self.points.borrow_mut().push((message.to_string(), percent));
    }
}

/// Check that `percents` never decrease.
pub fn assert_monotone(percents: &[f64]) {
    for pair in percents.windows(2) {
        assert!(
            pair[1] >= pair[0],
            "progress went backwards: {} -> {} in {percents:?}",
            pair[0],
            pair[1]
        );
    }
}

/// Compressor that fails on the first stream it sees and works after that.
#[derive(Debug, Default)]
pub struct FailsOnce {
    calls: AtomicUsize,
}

impl FailsOnce {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl StreamCompressor for FailsOnce {
    fn compress(&self, id: ObjectId, stream: &mut Stream, level: u32) -> Result<bool> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(PdfMergeError::CompressionFailed {
                object_id: id,
                reason: "injected fault".to_string(),
            });
        }
        pdfmerge::merge::FlateCompressor.compress(id, stream, level)
    }
}

/// Encryptor that always fails.
#[derive(Debug, Default)]
pub struct BrokenEncryptor;

impl DocumentEncryptor for BrokenEncryptor {
    fn encrypt(&self, _doc: &mut Document, _password: &str) -> Result<()> {
        Err(PdfMergeError::encryption_failed("injected fault"))
    }
}

/// Receive messages until a terminal one arrives or `timeout` passes
/// without any message.
pub fn collect_until_terminal(receiver: &mut ResultReceiver, timeout: Duration) -> Vec<TaskResult> {
    let mut messages = Vec::new();
    while let Some(message) = receiver.recv_timeout(timeout) {
        let terminal = message.is_terminal();
        messages.push(message);
        if terminal {
            break;
        }
    }
    messages
}
