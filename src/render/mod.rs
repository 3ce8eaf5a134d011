//! Rendering backends for [`AdmitCardDocument`]: a printable HTML view and a
//! single-page PDF export. Both write their output next to each other in a
//! caller-chosen directory.

mod fonts;
pub mod html;
mod layout;
pub mod pdf;
mod raster;
mod staging;
#[cfg(test)]
pub(crate) mod test_font;

use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::template::AdmitCardDocument;

pub use fonts::default_font_dirs;
pub use staging::StagingArea;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("output directory {path} is not usable: {source}")]
    OutDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("print template failed: {0}")]
    Template(#[from] minijinja::Error),

    #[error("font {path} could not be used: {reason}")]
    Font { path: PathBuf, reason: String },

    #[error("{}", missing_glyphs_message(.sample, .configured.as_deref()))]
    MissingGlyphs {
        /// Some of the characters without a glyph.
        sample: String,
        configured: Option<PathBuf>,
    },

    #[error("rasterization failed: {0}")]
    Raster(String),

    #[error("pdf assembly failed: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not open {path} for printing: {reason}; open the file manually and print it from the browser")]
    Opener { path: PathBuf, reason: String },
}

fn missing_glyphs_message(sample: &str, configured: Option<&Path>) -> String {
    let checked = match configured {
        Some(path) => format!("{} or the system font directories", path.display()),
        None => "the system font directories".to_string(),
    };
    format!(
        "no font in {checked} has glyphs for \"{sample}\"; set printer.fontPath to a TrueType \
         font that covers them (for Hindi, e.g. Noto Sans Devanagari)"
    )
}

/// How the PDF page is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PdfMode {
    /// The card is painted into a bitmap at `exportScale` and embedded as one
    /// full-card image.
    #[default]
    Raster,
    /// Text and shapes are written as PDF operators; text stays selectable.
    Vector,
}

/// `printer` setup section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrinterSettings {
    /// Bitmap scale of the exported card and its photo.
    pub export_scale: u32,
    pub page_margin_mm: u32,
    pub print_margin_cm: f64,
    /// TrueType font tried first for PDF text.
    pub font_path: Option<PathBuf>,
    pub pdf_mode: PdfMode,
}

impl Default for PrinterSettings {
    fn default() -> Self {
        Self {
            export_scale: 2,
            page_margin_mm: 10,
            print_margin_cm: 1.0,
            font_path: None,
            pdf_mode: PdfMode::Raster,
        }
    }
}

fn ensure_out_dir(out_dir: &Path) -> Result<(), RenderError> {
    std::fs::create_dir_all(out_dir).map_err(|source| RenderError::OutDir {
        path: out_dir.to_path_buf(),
        source,
    })
}

/// Render `doc` to `out_dir/<file stem>.pdf`. The page is assembled in a
/// staging area that is removed whether or not the export succeeds. Fonts
/// missing from `printer.fontPath` are looked up in `font_dirs`.
pub fn export_pdf(
    doc: &AdmitCardDocument,
    photo: Option<&[u8]>,
    settings: &PrinterSettings,
    font_dirs: &[PathBuf],
    out_dir: &Path,
) -> Result<PathBuf, RenderError> {
    ensure_out_dir(out_dir)?;
    let staging = StagingArea::create(out_dir).map_err(|source| RenderError::OutDir {
        path: out_dir.to_path_buf(),
        source,
    })?;

    let bytes = pdf::render(doc, photo, settings, font_dirs)?;

    let name = format!("{}.pdf", doc.file_stem);
    std::fs::write(staging.file(&name), &bytes)?;
    let dest = out_dir.join(&name);
    staging.publish(&name, &dest)?;
    tracing::info!(path = %dest.display(), bytes = bytes.len(), "admit card exported");
    Ok(dest)
}

/// Write the auto-printing HTML view to `out_dir/<file stem>.html` and, when
/// `open` is set, hand it to the desktop's default opener.
pub fn print_view(
    doc: &AdmitCardDocument,
    photo: Option<&[u8]>,
    settings: &PrinterSettings,
    out_dir: &Path,
    open: bool,
) -> Result<PathBuf, RenderError> {
    ensure_out_dir(out_dir)?;
    let html = html::render(doc, photo, settings)?;
    let dest = out_dir.join(format!("{}.html", doc.file_stem));
    std::fs::write(&dest, html)?;
    tracing::info!(path = %dest.display(), "print view written");
    if open {
        open_with_system(&dest)?;
    }
    Ok(dest)
}

fn open_with_system(path: &Path) -> Result<(), RenderError> {
    let opener = if cfg!(target_os = "macos") {
        Command::new("open")
    } else if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd");
        c.args(["/C", "start", ""]);
        c
    } else {
        Command::new("xdg-open")
    };
    open_with(opener, path)
}

fn open_with(mut cmd: Command, path: &Path) -> Result<(), RenderError> {
    let status = cmd.arg(path).status().map_err(|e| RenderError::Opener {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    if !status.success() {
        return Err(RenderError::Opener {
            path: path.to_path_buf(),
            reason: format!("opener exited with {status}"),
        });
    }
    Ok(())
}
