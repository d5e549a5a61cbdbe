//! Optional finalize steps: stream compression and password protection.
//!
//! Both steps sit behind small traits so a pipeline can be given a
//! different implementation, which is how the failure paths are tested.
//! Compression failures are per stream and never abort a merge; an
//! encryption failure always does.

use flate2::Compression;
use flate2::write::ZlibEncoder;
use lopdf::{Document, Object, ObjectId, Stream, StringFormat};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io::Write;
use std::time::SystemTime;
use tracing::{debug, warn};

use crate::config::CompressionLevel;
use crate::error::{PdfMergeError, Result};

/// Compresses one stream in place.
pub trait StreamCompressor: Send + Sync {
    /// Compress `stream` at zlib `level`.
    ///
    /// Returns `Ok(false)` when the stream was left as it is.
    fn compress(&self, id: ObjectId, stream: &mut Stream, level: u32) -> Result<bool>;
}

/// Applies password protection to a whole document.
pub trait DocumentEncryptor: Send + Sync {
    /// Encrypt `doc` so it opens with `password`.
    fn encrypt(&self, doc: &mut Document, password: &str) -> Result<()>;
}

/// Deflate compressor for unfiltered streams.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlateCompressor;

impl StreamCompressor for FlateCompressor {
    fn compress(&self, id: ObjectId, stream: &mut Stream, level: u32) -> Result<bool> {
        if stream.dict.has(b"Filter") || !stream.allows_compression || stream.content.is_empty() {
            return Ok(false);
        }

        let failed = |reason: std::io::Error| PdfMergeError::CompressionFailed {
            object_id: id,
            reason: reason.to_string(),
        };

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level));
        encoder.write_all(&stream.content).map_err(failed)?;
        let compressed = encoder.finish().map_err(failed)?;

        if compressed.len() >= stream.content.len() {
            return Ok(false);
        }

        stream.dict.set("Filter", Object::Name(b"FlateDecode".to_vec()));
        stream.set_content(compressed);
        Ok(true)
    }
}

/// Counts from one compression pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompressionReport {
    /// Streams that were replaced by a smaller compressed version.
    pub compressed: usize,
    /// Streams left alone (already filtered, or no gain).
    pub skipped: usize,
    /// Streams whose compression failed and were left uncompressed.
    pub failed: usize,
    /// The pass ended early on an error that was not stream-specific.
    pub stopped: bool,
}

/// Compress every stream of `doc` at `level`.
///
/// A stream failing with a recoverable error is logged and left untouched.
/// Any other error ends the pass early, leaving the remaining streams as
/// they are. Neither case is an error for the caller.
pub fn compress_streams(
    doc: &mut Document,
    compressor: &dyn StreamCompressor,
    level: CompressionLevel,
) -> CompressionReport {
    let mut report = CompressionReport::default();
    let Some(zlib_level) = level.zlib_level() else {
        return report;
    };

    for (id, object) in doc.objects.iter_mut() {
        let Object::Stream(stream) = object else {
            continue;
        };
        match compressor.compress(*id, stream, zlib_level) {
            Ok(true) => report.compressed += 1,
            Ok(false) => report.skipped += 1,
            Err(err) if err.is_recoverable() => {
                warn!(%err, "Skipping stream that could not be compressed");
                report.failed += 1;
            }
            Err(err) => {
                warn!(%err, "Stopping compression pass");
                report.failed += 1;
                report.stopped = true;
                break;
            }
        }
    }

    debug!(
        compressed = report.compressed,
        skipped = report.skipped,
        failed = report.failed,
        %level,
        "Compressed streams"
    );
    report
}

/// RC4 128-bit standard security handler.
///
/// Owner and user password are the same, and all permissions are granted
/// once the document is opened.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rc4Encryptor;

impl DocumentEncryptor for Rc4Encryptor {
    fn encrypt(&self, doc: &mut Document, password: &str) -> Result<()> {
        use lopdf::{EncryptionState, EncryptionVersion, Permissions};

        if doc.is_encrypted() {
            return Err(PdfMergeError::encryption_failed("document is already encrypted"));
        }

        // The key derivation reads the first ID entry
        let id = document_id(doc, password);
        doc.trailer.set(
            "ID",
            Object::Array(vec![
                Object::String(id.clone(), StringFormat::Hexadecimal),
                Object::String(id, StringFormat::Hexadecimal),
            ]),
        );

        let version = EncryptionVersion::V2 {
            document: &*doc,
            owner_password: password,
            user_password: password,
            key_length: 128,
            permissions: Permissions::all(),
        };
        let state = EncryptionState::try_from(version)
            .map_err(|e| PdfMergeError::encryption_failed(e.to_string()))?;
        doc.encrypt(&state)
            .map_err(|e| PdfMergeError::encryption_failed(e.to_string()))?;

        debug!("Applied password protection");
        Ok(())
    }
}

/// 16 bytes that identify this output file.
fn document_id(doc: &Document, password: &str) -> Vec<u8> {
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();

    let mut bytes = Vec::with_capacity(16);
    for salt in 0u8..2 {
        let mut hasher = DefaultHasher::new();
        salt.hash(&mut hasher);
        nanos.hash(&mut hasher);
        doc.objects.len().hash(&mut hasher);
        password.len().hash(&mut hasher);
        bytes.extend_from_slice(&hasher.finish().to_be_bytes());
    }
    bytes
}
