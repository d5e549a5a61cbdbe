//! Reading source documents and committing output files.

pub mod reader;
pub mod writer;

pub use reader::{OpenDocument, display_name, load_document};
pub use writer::{OutputCommitter, TEMP_EXTENSION, format_file_size, size_in_mb};
