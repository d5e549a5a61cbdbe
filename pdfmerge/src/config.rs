//! Output settings for a merge.
//!
//! This module holds everything the settings provider hands to a merge:
//! - Compression level and its zlib mapping
//! - Document metadata with length limits
//! - Quality presets
//! - JSON persistence of the settings file
//! - Page selection parsing

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{PdfMergeError, Result};

/// Color mode that leaves page content untouched.
pub const DEFAULT_COLOR_MODE: &str = "Colorful (Original)";

/// DPI setting that leaves page content untouched.
pub const DEFAULT_DPI: &str = "Original";

/// Conventional file name of the persisted settings.
pub const SETTINGS_FILE_NAME: &str = "merge_config.json";

/// Compression level for the output PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    /// Streams are written as they are.
    None,
    /// Quick compression with moderate size reduction.
    Fast,
    /// Balanced compression and speed.
    #[default]
    Normal,
    /// Better compression, slower processing.
    High,
    /// Best compression, slowest processing.
    Maximum,
}

impl CompressionLevel {
    /// All levels, from fastest to smallest output.
    pub const ALL: [CompressionLevel; 5] = [
        Self::None,
        Self::Fast,
        Self::Normal,
        Self::High,
        Self::Maximum,
    ];

    /// Zlib level used for content streams, or `None` when compression is off.
    pub fn zlib_level(&self) -> Option<u32> {
        match self {
            Self::None => None,
            Self::Fast => Some(1),
            Self::Normal => Some(6),
            Self::High => Some(8),
            Self::Maximum => Some(9),
        }
    }

    /// Check if any compression is applied.
    pub fn is_enabled(&self) -> bool {
        *self != Self::None
    }
}

impl fmt::Display for CompressionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Fast => "fast",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Maximum => "maximum",
        };
        f.write_str(name)
    }
}

impl FromStr for CompressionLevel {
    type Err = PdfMergeError;

    /// Parse a compression level, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns an error if the string doesn't match a valid compression level.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "fast" => Ok(Self::Fast),
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            "maximum" => Ok(Self::Maximum),
            _ => Err(PdfMergeError::invalid_config(format!(
                "Invalid compression level: {s}. Must be one of: none, fast, normal, high, maximum"
            ))),
        }
    }
}

/// PDF metadata to set on the output document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    /// Document title.
    pub title: Option<String>,
    /// Document author.
    pub author: Option<String>,
    /// Document subject.
    pub subject: Option<String>,
    /// Document keywords (comma-separated).
    pub keywords: Option<String>,
}

impl Metadata {
    const MAX_TITLE: usize = 200;
    const MAX_AUTHOR: usize = 100;
    const MAX_SUBJECT: usize = 500;
    const MAX_KEYWORDS: usize = 1000;

    /// Create metadata from optional strings, trimming whitespace.
    pub fn new(
        title: Option<String>,
        author: Option<String>,
        subject: Option<String>,
        keywords: Option<String>,
    ) -> Self {
        let to_string_opt = |opt: Option<String>| {
            opt.filter(|s| !s.trim().is_empty())
                .map(|s| s.trim().to_string())
        };

        Self {
            title: to_string_opt(title),
            author: to_string_opt(author),
            subject: to_string_opt(subject),
            keywords: to_string_opt(keywords),
        }
    }

    /// Check if any metadata fields are set.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.author.is_none()
            && self.subject.is_none()
            && self.keywords.is_none()
    }

    /// Check field lengths.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first field that is too long.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("title", &self.title, Self::MAX_TITLE),
            ("author", &self.author, Self::MAX_AUTHOR),
            ("subject", &self.subject, Self::MAX_SUBJECT),
            ("keywords", &self.keywords, Self::MAX_KEYWORDS),
        ];

        for (name, value, max) in fields {
            if let Some(value) = value
                && value.chars().count() > max
            {
                return Err(PdfMergeError::invalid_config(format!(
                    "Metadata {name} is longer than {max} characters"
                )));
            }
        }

        Ok(())
    }
}

/// Named bundles of output settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityPreset {
    /// Small file size for web sharing.
    Web,
    /// High quality for printing.
    Print,
    /// Maximum compression for storage.
    Archive,
    /// Optimized for digital reading.
    Screen,
    /// Fast processing, no bookmarks.
    Draft,
    /// Optimized for e-readers.
    Ebook,
}

impl QualityPreset {
    /// Human readable description.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Web => "Small file size for web sharing",
            Self::Print => "High quality for printing",
            Self::Archive => "Maximum compression for storage",
            Self::Screen => "Optimized for digital reading",
            Self::Draft => "Fast processing, lower quality",
            Self::Ebook => "Optimized for e-readers",
        }
    }

    /// Overwrite the preset's fields on `settings`.
    ///
    /// Output path, password and metadata are left alone.
    pub fn apply(&self, settings: &mut OutputSettings) {
        let (compression, dpi, bookmarks) = match self {
            Self::Web => (CompressionLevel::Maximum, "96", true),
            Self::Print => (CompressionLevel::Normal, "300", true),
            Self::Archive => (CompressionLevel::Maximum, DEFAULT_DPI, true),
            Self::Screen => (CompressionLevel::Normal, "150", true),
            Self::Draft => (CompressionLevel::Fast, DEFAULT_DPI, false),
            Self::Ebook => (CompressionLevel::Maximum, "150", true),
        };

        settings.compression_level = compression;
        settings.color_mode = DEFAULT_COLOR_MODE.to_string();
        settings.dpi = dpi.to_string();
        settings.preserve_bookmarks = bookmarks;
    }
}

impl FromStr for QualityPreset {
    type Err = PdfMergeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "web" => Ok(Self::Web),
            "print" => Ok(Self::Print),
            "archive" => Ok(Self::Archive),
            "screen" => Ok(Self::Screen),
            "draft" => Ok(Self::Draft),
            "ebook" => Ok(Self::Ebook),
            _ => Err(PdfMergeError::invalid_config(format!(
                "Unknown preset: {s}. Must be one of: web, print, archive, screen, draft, ebook"
            ))),
        }
    }
}

/// Settings for one merge, as provided by the settings collaborator.
///
/// `color_mode` and `dpi` are accepted and persisted but have no effect on
/// the output. A merge logs a warning when they differ from their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Final output path.
    pub output_path: PathBuf,
    /// Compression applied to content streams.
    pub compression_level: CompressionLevel,
    /// Add one outline entry per merged document.
    pub preserve_bookmarks: bool,
    /// Whether the output should be password protected.
    pub password_protect: bool,
    /// Password used when `password_protect` is set.
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// Requested color mode. Ignored.
    pub color_mode: String,
    /// Requested DPI. Ignored.
    pub dpi: String,
    /// Metadata for the output Info dictionary.
    pub metadata: Metadata,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            output_path: PathBuf::new(),
            compression_level: CompressionLevel::default(),
            preserve_bookmarks: true,
            password_protect: false,
            password: None,
            color_mode: DEFAULT_COLOR_MODE.to_string(),
            dpi: DEFAULT_DPI.to_string(),
            metadata: Metadata::default(),
        }
    }
}

impl OutputSettings {
    /// Create settings targeting `output_path` with all defaults.
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
            ..Default::default()
        }
    }

    /// Load settings from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PdfMergeError::file_not_found(path));
        }
        let content = std::fs::read_to_string(path)?;
        let settings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Save settings as pretty-printed JSON.
    ///
    /// The password is never written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Password to apply, if protection is requested.
    ///
    /// # Errors
    ///
    /// Returns an error if protection is requested without a password.
    pub fn effective_password(&self) -> Result<Option<String>> {
        if !self.password_protect {
            return Ok(None);
        }
        match self.password.as_deref() {
            Some(password) if !password.is_empty() => Ok(Some(password.to_string())),
            _ => Err(PdfMergeError::invalid_config(
                "Password protection is enabled but no password was given",
            )),
        }
    }

    /// Check if color mode or DPI differ from their no-op defaults.
    pub fn has_custom_rendering(&self) -> bool {
        self.color_mode != DEFAULT_COLOR_MODE || self.dpi != DEFAULT_DPI
    }
}

/// Parse a 1-based page selection into zero-based indices.
///
/// Items are separated by commas and may be single pages (`"3"`) or
/// inclusive ranges (`"1-5"`). The result keeps the written order and any
/// duplicates, so `"3,1-2,1"` yields `[2, 0, 1, 0]`.
///
/// Ranges are cut off at `page_count`. Single pages past the end are kept
/// as written and left for [`MergeRequest::build`](crate::request::MergeRequest::build)
/// to drop, so the result may be empty when nothing falls inside the document.
///
/// # Errors
///
/// Returns an error for empty input, page zero, reversed ranges, or
/// anything that is not a number.
///
/// # Examples
///
/// ```
/// use pdfmerge::config::parse_page_selection;
///
/// let pages = parse_page_selection("3,1-2,1", 5).unwrap();
/// assert_eq!(pages, vec![2, 0, 1, 0]);
///
/// let clamped = parse_page_selection("2-1000000000000", 3).unwrap();
/// assert_eq!(clamped, vec![1, 2]);
/// ```
pub fn parse_page_selection(s: &str, page_count: usize) -> Result<Vec<usize>> {
    let invalid = |reason: String| PdfMergeError::invalid_selection(s, reason);
    let page_number = |part: &str| -> Result<usize> {
        let page: usize = part
            .trim()
            .parse()
            .map_err(|_| invalid(format!("Invalid page number: {}", part.trim())))?;
        if page == 0 {
            return Err(invalid("Page numbers must be positive (1-indexed)".to_string()));
        }
        Ok(page - 1)
    };

    let mut pages = Vec::new();
    let mut items = 0;

    for part in s.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        items += 1;

        if let Some((start, end)) = part.split_once('-') {
            let start = page_number(start)?;
            let end = page_number(end)?;
            if start > end {
                return Err(invalid(format!(
                    "Invalid range {part}: start page must be less than or equal to end page"
                )));
            }
            pages.extend(start..(end + 1).min(page_count));
        } else {
            pages.push(page_number(part)?);
        }
    }

    if items == 0 {
        return Err(invalid("Page selection cannot be empty".to_string()));
    }

    Ok(pages)
}
