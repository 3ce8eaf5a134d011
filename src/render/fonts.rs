//! Fonts for the PDF export.
//!
//! The card mixes Latin and Devanagari, so text is drawn from a chain of
//! fonts: `printer.fontPath` first, then whatever the font directories offer
//! for the characters it lacks. Runs that fall on a TrueType face are shaped
//! so that conjuncts and vowel signs come out in visual order.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use super::{PdfMode, RenderError};
use crate::template::{AdmitCardDocument, PHOTO_PLACEHOLDER};

/// TrueType/OpenType font file, validated on load.
#[derive(Debug, Clone)]
pub struct FontFile {
    pub path: PathBuf,
    data: Vec<u8>,
}

impl FontFile {
    pub fn load(path: &Path) -> Result<Self, RenderError> {
        let data = std::fs::read(path).map_err(|e| RenderError::Font {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        ttf_parser::Face::parse(&data, 0).map_err(|e| RenderError::Font {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            data,
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    fn face(&self) -> Option<ttf_parser::Face<'_>> {
        ttf_parser::Face::parse(&self.data, 0).ok()
    }
}

/// Characters that need a glyph. Joiners and whitespace never do.
fn is_ignorable(c: char) -> bool {
    c.is_whitespace() || matches!(c, '\u{200c}' | '\u{200d}')
}

/// Every character the PDF must draw from a TrueType face. Vector output
/// covers WinAnsi text with the standard Helvetica fonts.
pub fn needed_chars(doc: &AdmitCardDocument, mode: PdfMode) -> BTreeSet<char> {
    let mut items = doc.text_items();
    items.push(PHOTO_PLACEHOLDER.to_string());
    items
        .iter()
        .flat_map(|s| s.chars())
        .filter(|c| !is_ignorable(*c))
        .filter(|c| mode == PdfMode::Raster || win_ansi(*c).is_none())
        .collect()
}

/// Platform font directories searched when `printer.fontPath` is not enough.
pub fn default_font_dirs() -> Vec<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let mut dirs = Vec::new();
    if cfg!(target_os = "windows") {
        if let Some(windir) = std::env::var_os("WINDIR") {
            dirs.push(PathBuf::from(windir).join("Fonts"));
        }
        if let Some(local) = std::env::var_os("LOCALAPPDATA") {
            dirs.push(PathBuf::from(local).join("Microsoft/Windows/Fonts"));
        }
    } else if cfg!(target_os = "macos") {
        dirs.push(PathBuf::from("/System/Library/Fonts"));
        dirs.push(PathBuf::from("/Library/Fonts"));
        if let Some(home) = home {
            dirs.push(home.join("Library/Fonts"));
        }
    } else {
        dirs.push(PathBuf::from("/usr/share/fonts"));
        dirs.push(PathBuf::from("/usr/local/share/fonts"));
        if let Some(home) = home {
            dirs.push(home.join(".local/share/fonts"));
            dirs.push(home.join(".fonts"));
        }
    }
    dirs
}

/// File name fragments of fonts worth loading, best first. Devanagari faces
/// lead; the Latin sans faces fill in for raster output.
const PREFERRED_FONTS: &[&str] = &[
    "notosansdevanagari",
    "nirmala",
    "mangal",
    "kohinoor",
    "devanagari",
    "lohit",
    "gargi",
    "kalimati",
    "notosans-regular",
    "dejavusans.ttf",
    "liberationsans-regular",
    "arial.ttf",
    "freesans",
];

const STYLE_VARIANTS: &[&str] = &["bold", "italic", "oblique", "light", "thin", "condensed", "black"];

const MAX_DEPTH: usize = 4;
const MAX_CHAIN: usize = 4;

fn collect_candidates(dir: &Path, depth: usize, out: &mut Vec<(usize, bool, PathBuf)>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if depth < MAX_DEPTH {
                collect_candidates(&path, depth + 1, out);
            }
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let name = name.to_ascii_lowercase();
        if ![".ttf", ".otf", ".ttc"].iter().any(|ext| name.ends_with(ext)) {
            continue;
        }
        if let Some(rank) = PREFERRED_FONTS.iter().position(|hint| name.contains(hint)) {
            let styled = STYLE_VARIANTS.iter().any(|v| name.contains(v));
            out.push((rank, styled, path));
        }
    }
}

/// Known font files under `dirs`, best candidates first.
fn candidates(dirs: &[PathBuf]) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for dir in dirs {
        collect_candidates(dir, 0, &mut found);
    }
    found.sort();
    found.dedup_by(|a, b| a.2 == b.2);
    found.into_iter().map(|(_, _, path)| path).collect()
}

/// The fonts one export draws from, in lookup order.
#[derive(Debug, Default)]
pub struct FontSet {
    fonts: Vec<FontFile>,
}

impl FontSet {
    /// Fonts covering `needed`: the configured font first, then discovered
    /// ones until nothing is missing. Fails when some character has no glyph
    /// anywhere, so a card is never exported with text missing.
    pub fn resolve(
        needed: &BTreeSet<char>,
        font_path: Option<&Path>,
        dirs: &[PathBuf],
    ) -> Result<Self, RenderError> {
        let mut set = FontSet::default();
        if let Some(path) = font_path {
            set.fonts.push(FontFile::load(path)?);
        }
        let mut missing = set.missing(needed);
        if !missing.is_empty() {
            for path in candidates(dirs) {
                if set.fonts.len() >= MAX_CHAIN {
                    break;
                }
                let font = match FontFile::load(&path) {
                    Ok(f) => f,
                    Err(e) => {
                        tracing::debug!(error = %e, "skipping font");
                        continue;
                    }
                };
                let covers_any = font
                    .face()
                    .is_some_and(|face| missing.iter().any(|c| has_glyph(&face, *c)));
                if covers_any {
                    tracing::debug!(font = %path.display(), "font added to the export chain");
                    set.fonts.push(font);
                    missing = set.missing(needed);
                    if missing.is_empty() {
                        break;
                    }
                }
            }
        }
        if !missing.is_empty() {
            return Err(RenderError::MissingGlyphs {
                sample: missing.iter().take(12).collect(),
                configured: font_path.map(Path::to_path_buf),
            });
        }
        Ok(set)
    }

    pub fn fonts(&self) -> &[FontFile] {
        &self.fonts
    }

    fn missing(&self, needed: &BTreeSet<char>) -> BTreeSet<char> {
        let faces: Vec<ttf_parser::Face<'_>> = self.fonts.iter().filter_map(FontFile::face).collect();
        needed
            .iter()
            .copied()
            .filter(|c| !faces.iter().any(|f| has_glyph(f, *c)))
            .collect()
    }
}

fn has_glyph(face: &ttf_parser::Face<'_>, c: char) -> bool {
    face.glyph_index(c).is_some_and(|g| g.0 != 0)
}

/// Windows-1252 code for `c`, if it has one.
pub fn win_ansi(c: char) -> Option<u8> {
    match c as u32 {
        0x20..=0x7e | 0xa0..=0xff => Some(c as u32 as u8),
        _ => match c {
            '€' => Some(0x80),
            '…' => Some(0x85),
            '‘' => Some(0x91),
            '’' => Some(0x92),
            '“' => Some(0x93),
            '”' => Some(0x94),
            '•' => Some(0x95),
            '–' => Some(0x96),
            '—' => Some(0x97),
            '™' => Some(0x99),
            _ => None,
        },
    }
}

#[rustfmt::skip]
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

pub fn helvetica_width(code: u8, bold: bool) -> u16 {
    let table = if bold { &HELVETICA_BOLD } else { &HELVETICA };
    match code {
        0x20..=0x7e => table[(code - 0x20) as usize],
        0x85 | 0x97 => 1000,
        0x91 | 0x92 => 222,
        0x93 | 0x94 => 333,
        0x95 => 350,
        _ => 556,
    }
}

/// Which font a run is drawn with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceRef {
    /// Helvetica / Helvetica-Bold, WinAnsi encoded.
    Standard,
    /// Index into the [`FontSet`].
    Loaded(usize),
}

/// One positioned glyph. Lengths are in 1/1000 em.
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    /// Glyph id, or the WinAnsi code for standard runs.
    pub id: u16,
    pub advance: f32,
    pub x_offset: f32,
    pub y_offset: f32,
    /// Source text of the cluster this glyph starts, if it starts one.
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    pub face: FaceRef,
    pub glyphs: Vec<Glyph>,
    /// Sum of advances, 1/1000 em.
    pub width: f32,
    /// Characters no font could draw.
    pub dropped: usize,
}

struct LoadedFace<'a> {
    metrics: ttf_parser::Face<'a>,
    shaping: rustybuzz::Face<'a>,
    per_em: f32,
}

/// Splits text into font runs and shapes them.
pub struct Shaper<'a> {
    /// WinAnsi characters go to Helvetica when set.
    standard: bool,
    faces: Vec<LoadedFace<'a>>,
}

impl<'a> Shaper<'a> {
    pub fn new(set: &'a FontSet, mode: PdfMode) -> Result<Self, RenderError> {
        let mut faces = Vec::with_capacity(set.fonts.len());
        for font in &set.fonts {
            let bad_font = |reason: String| RenderError::Font {
                path: font.path.clone(),
                reason,
            };
            let metrics =
                ttf_parser::Face::parse(&font.data, 0).map_err(|e| bad_font(e.to_string()))?;
            let shaping = rustybuzz::Face::from_slice(&font.data, 0)
                .ok_or_else(|| bad_font("not shapeable".to_string()))?;
            let per_em = 1000.0 / metrics.units_per_em() as f32;
            faces.push(LoadedFace {
                metrics,
                shaping,
                per_em,
            });
        }
        Ok(Self {
            standard: mode == PdfMode::Vector,
            faces,
        })
    }

    /// Metrics-only shaper over the standard fonts.
    #[cfg(test)]
    pub fn standard_only() -> Shaper<'static> {
        Shaper {
            standard: true,
            faces: Vec::new(),
        }
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn metrics(&self, face: usize) -> Option<&ttf_parser::Face<'a>> {
        self.faces.get(face).map(|f| &f.metrics)
    }

    fn face_for(&self, c: char, current: Option<FaceRef>) -> FaceRef {
        if self.standard && win_ansi(c).is_some() {
            return FaceRef::Standard;
        }
        if is_ignorable(c) {
            if let Some(face) = current {
                return face;
            }
        }
        if let Some(i) = self
            .faces
            .iter()
            .position(|f| has_glyph(&f.metrics, c))
        {
            return FaceRef::Loaded(i);
        }
        match current {
            Some(FaceRef::Loaded(i)) => FaceRef::Loaded(i),
            _ if !self.faces.is_empty() => FaceRef::Loaded(0),
            _ => FaceRef::Standard,
        }
    }

    /// Shaped runs of `text`, in visual order.
    pub fn runs(&self, text: &str, bold: bool) -> Vec<Run> {
        let mut segments: Vec<(FaceRef, String)> = Vec::new();
        for c in text.chars() {
            let face = self.face_for(c, segments.last().map(|(f, _)| *f));
            match segments.last_mut() {
                Some((f, s)) if *f == face => s.push(c),
                _ => segments.push((face, c.to_string())),
            }
        }
        segments
            .into_iter()
            .map(|(face, s)| match face {
                FaceRef::Standard => standard_run(&s, bold),
                FaceRef::Loaded(i) => self.shape(i, &s),
            })
            .collect()
    }

    fn shape(&self, index: usize, text: &str) -> Run {
        let face = &self.faces[index];
        let mut buffer = rustybuzz::UnicodeBuffer::new();
        buffer.push_str(text);
        buffer.guess_segment_properties();
        let shaped = rustybuzz::shape(&face.shaping, &[], buffer);
        let infos = shaped.glyph_infos();
        let positions = shaped.glyph_positions();

        let mut starts: Vec<usize> = infos.iter().map(|i| i.cluster as usize).collect();
        starts.sort_unstable();
        starts.dedup();

        let mut glyphs = Vec::with_capacity(infos.len());
        let mut width = 0.0;
        let mut dropped = 0;
        for (i, (info, pos)) in infos.iter().zip(positions).enumerate() {
            let id = u16::try_from(info.glyph_id).unwrap_or(0);
            if id == 0 {
                dropped += 1;
            }
            let starts_cluster = i == 0 || infos[i - 1].cluster != info.cluster;
            let cluster_text = starts_cluster
                .then(|| {
                    let start = info.cluster as usize;
                    let end = starts
                        .iter()
                        .copied()
                        .find(|s| *s > start)
                        .unwrap_or(text.len());
                    text.get(start..end).map(str::to_string)
                })
                .flatten();
            let advance = pos.x_advance as f32 * face.per_em;
            width += advance;
            glyphs.push(Glyph {
                id,
                advance,
                x_offset: pos.x_offset as f32 * face.per_em,
                y_offset: pos.y_offset as f32 * face.per_em,
                text: cluster_text,
            });
        }
        Run {
            face: FaceRef::Loaded(index),
            glyphs,
            width,
            dropped,
        }
    }

    /// Default advance of `gid` in 1/1000 em, as a PDF width entry.
    pub fn glyph_width(&self, face: usize, gid: u16) -> u16 {
        self.faces
            .get(face)
            .and_then(|f| {
                let advance = f.metrics.glyph_hor_advance(ttf_parser::GlyphId(gid))?;
                Some((advance as f32 * f.per_em).round() as u16)
            })
            .unwrap_or(0)
    }

    pub fn measure(&self, text: &str, size: f32, bold: bool) -> f32 {
        self.runs(text, bold).iter().map(|r| r.width).sum::<f32>() * size / 1000.0
    }

    /// Greedy word wrap. Always returns at least one line.
    pub fn wrap(&self, text: &str, size: f32, bold: bool, max_width: f32) -> Vec<String> {
        let mut lines = Vec::new();
        let mut current = String::new();
        for word in text.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if !current.is_empty() && self.measure(&candidate, size, bold) > max_width {
                lines.push(std::mem::replace(&mut current, word.to_string()));
            } else {
                current = candidate;
            }
        }
        lines.push(current);
        lines
    }
}

fn standard_run(text: &str, bold: bool) -> Run {
    let mut glyphs = Vec::with_capacity(text.len());
    let mut width = 0.0;
    let mut dropped = 0;
    for c in text.chars() {
        let Some(code) = win_ansi(c) else {
            dropped += 1;
            continue;
        };
        let advance = helvetica_width(code, bold) as f32;
        width += advance;
        glyphs.push(Glyph {
            id: code as u16,
            advance,
            x_offset: 0.0,
            y_offset: 0.0,
            text: Some(c.to_string()),
        });
    }
    Run {
        face: FaceRef::Standard,
        glyphs,
        width,
        dropped,
    }
}

pub fn postscript_name(face: &ttf_parser::Face<'_>) -> String {
    let name = face
        .names()
        .into_iter()
        .filter(|n| n.name_id == ttf_parser::name_id::POST_SCRIPT_NAME)
        .find_map(|n| n.to_string())
        .unwrap_or_default();
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_graphic() && !"[](){}<>/%".contains(*c))
        .collect();
    if cleaned.is_empty() {
        "AdmitCardFont".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::test_font;

    fn chars(s: &str) -> BTreeSet<char> {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn helvetica_measures_and_wraps() {
        let s = Shaper::standard_only();
        assert!((s.measure("0", 10.0, false) - 5.56).abs() < 0.01);
        assert!(s.measure("W", 10.0, true) > s.measure("i", 10.0, true));
        let lines = s.wrap("one two three four five six", 10.0, false, 40.0);
        assert!(lines.len() > 1);
        assert_eq!(s.wrap("", 10.0, false, 40.0), vec![String::new()]);
    }

    #[test]
    fn unreadable_font_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let bad = dir.path().join("broken.ttf");
        std::fs::write(&bad, b"definitely not a font").expect("write");
        assert!(matches!(FontFile::load(&bad), Err(RenderError::Font { .. })));
        assert!(FontFile::load(&dir.path().join("missing.ttf")).is_err());
    }

    #[test]
    fn configured_font_without_devanagari_is_refused() {
        let dir = tempfile::tempdir().expect("tempdir");
        let latin = test_font::write(dir.path(), "latin.ttf", test_font::LATIN_ONLY);
        let empty = tempfile::tempdir().expect("tempdir");
        let err = FontSet::resolve(
            &chars("प्रवेश पत्र"),
            Some(latin.as_path()),
            &[empty.path().to_path_buf()],
        )
        .expect_err("no devanagari");
        let message = err.to_string();
        assert!(message.contains("प"), "{message}");
        assert!(message.contains("printer.fontPath"), "{message}");
        assert!(message.contains("latin.ttf"), "{message}");
    }

    #[test]
    fn missing_glyphs_are_found_in_font_dirs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let latin = test_font::write(dir.path(), "latin.ttf", test_font::LATIN_ONLY);
        let system = tempfile::tempdir().expect("tempdir");
        let nested = system.path().join("truetype/noto");
        std::fs::create_dir_all(&nested).expect("mkdir");
        test_font::write(&nested, "NotoSansDevanagari-Bold.ttf", test_font::DEVANAGARI_ONLY);
        let regular =
            test_font::write(&nested, "NotoSansDevanagari-Regular.ttf", test_font::DEVANAGARI_ONLY);
        test_font::write(&nested, "SomethingElse.ttf", test_font::FULL);

        let set = FontSet::resolve(
            &chars("Roll प्रवेश"),
            Some(latin.as_path()),
            &[system.path().to_path_buf()],
        )
        .expect("resolved");
        let paths: Vec<&Path> = set.fonts().iter().map(|f| f.path.as_path()).collect();
        assert_eq!(paths, vec![latin.as_path(), regular.as_path()]);
    }

    #[test]
    fn nothing_needed_means_no_fonts() {
        let empty = tempfile::tempdir().expect("tempdir");
        let set = FontSet::resolve(&BTreeSet::new(), None, &[empty.path().to_path_buf()])
            .expect("resolved");
        assert!(set.fonts().is_empty());
    }

    #[test]
    fn vector_runs_split_latin_from_devanagari() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = test_font::write(dir.path(), "full.ttf", test_font::FULL);
        let set = FontSet::resolve(&chars("प"), Some(path.as_path()), &[]).expect("resolved");
        let shaper = Shaper::new(&set, PdfMode::Vector).expect("shaper");

        let runs = shaper.runs("ADMIT CARD / प्रवेश पत्र", true);
        let faces: Vec<FaceRef> = runs.iter().map(|r| r.face).collect();
        assert_eq!(
            faces,
            vec![FaceRef::Standard, FaceRef::Loaded(0), FaceRef::Standard, FaceRef::Loaded(0)]
        );
        assert!(runs.iter().all(|r| r.dropped == 0));
        let shown: String = runs
            .iter()
            .flat_map(|r| &r.glyphs)
            .filter_map(|g| g.text.as_deref())
            .collect();
        assert_eq!(shown, "ADMIT CARD / प्रवेश पत्र");
    }

    #[test]
    fn raster_runs_use_loaded_faces_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = test_font::write(dir.path(), "full.ttf", test_font::FULL);
        let set = FontSet::resolve(&chars("Aप"), Some(path.as_path()), &[]).expect("resolved");
        let shaper = Shaper::new(&set, PdfMode::Raster).expect("shaper");
        let runs = shaper.runs("Exam Details / परीक्षा विवरण", false);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].face, FaceRef::Loaded(0));
        // 600 units per box glyph, 250 per space, 1000 units per em
        let width = shaper.measure("AB C", 10.0, false);
        assert!((width - (600.0 * 3.0 + 250.0) / 100.0).abs() < 0.01, "{width}");
    }
}
