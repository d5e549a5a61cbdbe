//! CLI argument parsing for pdfmerge.
//!
//! Defines the command-line surface with `clap` and turns it into the
//! library's [`OutputSettings`] and a list of inputs with optional page
//! selections.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use pdfmerge::config::{CompressionLevel, Metadata, OutputSettings, QualityPreset};
use pdfmerge::error::{PdfMergeError, Result};

/// Merge selected pages of PDF files into a single document.
///
/// Every input is merged in the order given. Append `:PAGES` to an input
/// to take only some of its pages, in the written order.
#[derive(Parser, Debug)]
#[command(name = "pdfmerge")]
#[command(version)]
#[command(about = "Merge selected pages of PDF files into a single document", long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Input PDF files, each optionally followed by `:PAGES`
    ///
    /// Glob patterns are expanded in sorted order. A page selection
    /// applies to every file a pattern matches.
    ///
    /// Examples:
    ///   pdfmerge a.pdf b.pdf:1-3 -o merged.pdf
    ///   pdfmerge "scans/*.pdf" report.pdf:3,1-2 -o merged.pdf
    #[arg(required = true, value_name = "FILE[:PAGES]")]
    pub inputs: Vec<String>,

    /// Output PDF file path
    ///
    /// The file is written to a temporary sibling first and only replaces
    /// an existing file once the merge has fully succeeded.
    #[arg(short, long, value_name = "FILE")]
    #[arg(required_unless_present_any = ["validate_only", "settings"])]
    pub output: Option<PathBuf>,

    /// Compression level for content streams
    ///
    /// One of none, fast, normal, high, maximum.
    #[arg(short, long, value_name = "LEVEL")]
    pub compression: Option<String>,

    /// Do not add a bookmark per merged document
    #[arg(long)]
    pub no_bookmarks: bool,

    /// Protect the output with this password
    #[arg(long, value_name = "PASSWORD", env = "PDFMERGE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Load output settings from a JSON file
    ///
    /// Options given on the command line override the loaded values.
    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Save the effective output settings to a JSON file
    ///
    /// The password is never saved.
    #[arg(long, value_name = "FILE")]
    pub save_settings: Option<PathBuf>,

    /// Apply a quality preset before other options
    ///
    /// One of web, print, archive, screen, draft, ebook.
    #[arg(long, value_name = "NAME")]
    pub preset: Option<String>,

    /// Requested color mode (accepted but has no effect)
    #[arg(long, value_name = "MODE")]
    pub color_mode: Option<String>,

    /// Requested DPI (accepted but has no effect)
    #[arg(long, value_name = "DPI")]
    pub dpi: Option<String>,

    /// Set title metadata for output PDF
    #[arg(long, value_name = "TEXT")]
    pub title: Option<String>,

    /// Set author metadata for output PDF
    #[arg(long, value_name = "TEXT")]
    pub author: Option<String>,

    /// Set subject metadata for output PDF
    #[arg(long, value_name = "TEXT")]
    pub subject: Option<String>,

    /// Set keywords metadata for output PDF (comma-separated)
    #[arg(long, value_name = "TEXT")]
    pub keywords: Option<String>,

    /// Only check the inputs, do not merge
    #[arg(long)]
    pub validate_only: bool,

    /// Print every task message as one JSON line
    #[arg(long)]
    pub json: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// One input path with its optional page selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSpec {
    /// Path of the PDF.
    pub path: PathBuf,
    /// 1-based selection string, or `None` for all pages.
    pub pages: Option<String>,
}

impl Cli {
    /// Build the effective output settings.
    ///
    /// Precedence, lowest first: defaults or the `--settings` file, the
    /// preset, then individual options.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings file cannot be loaded or an option
    /// value is invalid.
    pub fn to_settings(&self) -> Result<OutputSettings> {
        let mut settings = match self.settings {
            Some(ref path) => OutputSettings::load(path)?,
            None => OutputSettings::default(),
        };

        if let Some(ref preset) = self.preset {
            QualityPreset::from_str(preset)?.apply(&mut settings);
        }

        if let Some(ref output) = self.output {
            settings.output_path = output.clone();
        }
        if let Some(ref level) = self.compression {
            settings.compression_level = CompressionLevel::from_str(level)?;
        }
        if self.no_bookmarks {
            settings.preserve_bookmarks = false;
        }
        if let Some(ref password) = self.password {
            settings.password_protect = true;
            settings.password = Some(password.clone());
        }
        if let Some(ref color_mode) = self.color_mode {
            settings.color_mode = color_mode.clone();
        }
        if let Some(ref dpi) = self.dpi {
            settings.dpi = dpi.clone();
        }

        let loaded = settings.metadata;
        settings.metadata = Metadata::new(
            self.title.clone().or(loaded.title),
            self.author.clone().or(loaded.author),
            self.subject.clone().or(loaded.subject),
            self.keywords.clone().or(loaded.keywords),
        );
        settings.metadata.validate()?;

        Ok(settings)
    }

    /// Expand every input into concrete paths.
    ///
    /// # Errors
    ///
    /// Returns an error for a malformed glob pattern or a pattern that
    /// matches nothing.
    pub fn expand_inputs(&self) -> Result<Vec<InputSpec>> {
        let mut expanded = Vec::new();
        for input in &self.inputs {
            let (pattern, pages) = split_page_suffix(input);
            for path in expand_pattern(pattern)? {
                expanded.push(InputSpec {
                    path,
                    pages: pages.map(str::to_string),
                });
            }
        }
        Ok(expanded)
    }
}

/// Split a trailing `:PAGES` selection off an input argument.
///
/// The suffix only counts when it looks like a selection, so a drive
/// letter such as `C:\docs\a.pdf` stays part of the path.
pub fn split_page_suffix(input: &str) -> (&str, Option<&str>) {
    if let Some((path, pages)) = input.rsplit_once(':') {
        let looks_like_selection = !pages.trim().is_empty()
            && pages
                .chars()
                .all(|c| c.is_ascii_digit() || c == ',' || c == '-' || c == ' ');
        if !path.is_empty() && looks_like_selection {
            return (path, Some(pages));
        }
    }
    (input, None)
}

fn expand_pattern(pattern: &str) -> Result<Vec<PathBuf>> {
    if !pattern.contains(['*', '?', '[']) {
        return Ok(vec![PathBuf::from(pattern)]);
    }

    let entries = glob::glob(pattern).map_err(|err| {
        PdfMergeError::invalid_config(format!("Invalid glob pattern '{pattern}': {err}"))
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(err) => {
                tracing::warn!(%err, "Skipping unreadable glob match");
                None
            }
        })
        .filter(|path| is_pdf(path))
        .collect();
    paths.sort();

    if paths.is_empty() {
        return Err(PdfMergeError::invalid_config(format!(
            "No PDF files match '{pattern}'"
        )));
    }
    Ok(paths)
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}
