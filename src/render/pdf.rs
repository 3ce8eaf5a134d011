//! Single-page A4 PDF export.
//!
//! The laid-out card is placed inside the configured margins and scaled down
//! when it would not fit. Raster mode embeds the card as one bitmap rendered
//! at `exportScale`; vector mode writes the text and shapes as page operators.
//! Both tag the card with its text so it stays searchable.

use std::collections::BTreeMap;
use std::path::PathBuf;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use super::fonts::{self, FaceRef, FontFile, FontSet, Run, Shaper};
use super::layout::{self, Item, Layout, PhotoImage, Rgb, CANVAS_WIDTH};
use super::raster::{self, Bitmap};
use super::{PdfMode, PrinterSettings, RenderError};
use crate::template::{AdmitCardDocument, PhotoSlot};

const A4_WIDTH_PT: f32 = 595.28;
const A4_HEIGHT_PT: f32 = 841.89;
const PT_PER_MM: f32 = 72.0 / 25.4;

/// Font resource names for the standard fonts; loaded faces follow as F3...
const HELVETICA: &str = "F1";
const HELVETICA_BOLD: &str = "F2";

fn loaded_font_name(index: usize) -> Vec<u8> {
    format!("F{}", index + 3).into_bytes()
}

/// Canvas px to page points.
#[derive(Debug, Clone, Copy)]
struct Placement {
    margin: f32,
    scale: f32,
}

impl Placement {
    fn new(page_margin_mm: u32, canvas_height: f32) -> Self {
        let margin = page_margin_mm as f32 * PT_PER_MM;
        let avail_w = A4_WIDTH_PT - 2.0 * margin;
        let avail_h = A4_HEIGHT_PT - 2.0 * margin;
        Self {
            margin,
            scale: (avail_w / CANVAS_WIDTH).min(avail_h / canvas_height),
        }
    }

    fn x(&self, px: f32) -> f32 {
        self.margin + px * self.scale
    }

    fn y(&self, px: f32) -> f32 {
        A4_HEIGHT_PT - self.margin - px * self.scale
    }
}

fn real(v: f32) -> Object {
    Object::Real(v.into())
}

fn color_operands(c: Rgb) -> Vec<Object> {
    vec![real(c.0), real(c.1), real(c.2)]
}

fn utf16_text(s: &str) -> Object {
    let mut bytes = vec![0xfe, 0xff];
    for unit in s.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

/// `/Span << /ActualText ... >> BDC`: extraction sees `text`.
fn begin_actual_text(text: &str) -> Operation {
    Operation::new(
        "BDC",
        vec![
            "Span".into(),
            Object::Dictionary(dictionary! { "ActualText" => utf16_text(text) }),
        ],
    )
}

/// Glyph use per loaded face: gid -> (width, text it stands for).
type GlyphUse = BTreeMap<u16, (u16, Option<String>)>;

/// Writes the display list as page operators.
struct PageWriter<'s, 'f> {
    shaper: &'s Shaper<'f>,
    place: Placement,
    ops: Vec<Operation>,
    used: Vec<GlyphUse>,
}

impl PageWriter<'_, '_> {
    fn op(&mut self, operator: &str, operands: Vec<Object>) {
        self.ops.push(Operation::new(operator, operands));
    }

    fn matrix(&mut self, x: f32, y: f32) {
        self.op(
            "Tm",
            vec![real(1.0), real(0.0), real(0.0), real(1.0), real(x), real(y)],
        );
    }

    /// Shaped glyphs as TJ arrays. Offsets and kerning become array
    /// adjustments, vertical offsets text rise.
    fn show_glyphs(&mut self, face: usize, run: &Run, size_pt: f32) {
        let mut array = Vec::new();
        let mut rise = 0.0;
        let mut carry = 0.0;
        for g in &run.glyphs {
            let width = self.shaper.glyph_width(face, g.id);
            let entry = self.used[face].entry(g.id).or_insert((width, None));
            if entry.1.is_none() {
                entry.1 = g.text.clone();
            }
            if g.y_offset != rise {
                if !array.is_empty() {
                    self.op("TJ", vec![Object::Array(std::mem::take(&mut array))]);
                }
                self.op("Ts", vec![real(g.y_offset * size_pt / 1000.0)]);
                rise = g.y_offset;
            }
            let shift = g.x_offset - carry;
            if shift.abs() > 0.01 {
                array.push(real(-shift));
            }
            array.push(Object::String(
                g.id.to_be_bytes().to_vec(),
                StringFormat::Hexadecimal,
            ));
            carry = g.x_offset + width as f32 - g.advance;
        }
        if !array.is_empty() {
            self.op("TJ", vec![Object::Array(array)]);
        }
        if rise != 0.0 {
            self.op("Ts", vec![real(0.0)]);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn text(
        &mut self,
        x: f32,
        baseline: f32,
        size: f32,
        bold: bool,
        color: Rgb,
        text: &str,
        runs: &[Run],
    ) {
        let tagged = runs.iter().any(|r| r.face != FaceRef::Standard);
        if tagged {
            self.ops.push(begin_actual_text(text));
        }
        let size_pt = size * self.place.scale;
        let mut pen = self.place.x(x);
        let y = self.place.y(baseline);
        self.op("rg", color_operands(color));
        self.op("BT", vec![]);
        for run in runs {
            if !run.glyphs.is_empty() {
                match run.face {
                    FaceRef::Standard => {
                        let font = if bold { HELVETICA_BOLD } else { HELVETICA };
                        self.op("Tf", vec![font.into(), real(size_pt)]);
                        self.op("Tr", vec![Object::Integer(0)]);
                        self.matrix(pen, y);
                        let bytes = run.glyphs.iter().map(|g| g.id as u8).collect();
                        self.op("Tj", vec![Object::String(bytes, StringFormat::Literal)]);
                    }
                    FaceRef::Loaded(i) => {
                        self.op("Tf", vec![Object::Name(loaded_font_name(i)), real(size_pt)]);
                        if bold {
                            // fill + stroke thickens glyphs of a single-weight font
                            self.op("RG", color_operands(color));
                            self.op("w", vec![real(0.04 * size_pt)]);
                            self.op("Tr", vec![Object::Integer(2)]);
                        } else {
                            self.op("Tr", vec![Object::Integer(0)]);
                        }
                        self.matrix(pen, y);
                        self.show_glyphs(i, run, size_pt);
                    }
                }
            }
            pen += run.width * size_pt / 1000.0;
        }
        self.op("ET", vec![]);
        if tagged {
            self.op("EMC", vec![]);
        }
    }

    fn draw(&mut self, item: &Item) {
        let place = self.place;
        match item {
            Item::Text {
                x,
                baseline,
                size,
                bold,
                color,
                text,
                runs,
            } => self.text(*x, *baseline, *size, *bold, *color, text, runs),
            Item::Rect {
                x,
                y,
                w,
                h,
                fill,
                stroke,
            } => {
                let rect = vec![
                    real(place.x(*x)),
                    real(place.y(y + h)),
                    real(w * place.scale),
                    real(h * place.scale),
                ];
                if let Some(f) = fill {
                    self.op("rg", color_operands(*f));
                }
                if let Some(s) = stroke {
                    self.op("RG", color_operands(*s));
                    self.op("w", vec![real(place.scale)]);
                }
                self.op("re", rect);
                let paint = match (fill, stroke) {
                    (Some(_), Some(_)) => "B",
                    (Some(_), None) => "f",
                    (None, Some(_)) => "S",
                    (None, None) => "n",
                };
                self.op(paint, vec![]);
            }
            Item::Line {
                x1,
                y1,
                x2,
                y2,
                width,
                color,
            } => {
                self.op("RG", color_operands(*color));
                self.op("w", vec![real(width * place.scale)]);
                self.op("m", vec![real(place.x(*x1)), real(place.y(*y1))]);
                self.op("l", vec![real(place.x(*x2)), real(place.y(*y2))]);
                self.op("S", vec![]);
            }
            Item::Image { x, y, w, h } => {
                self.op("q", vec![]);
                self.op(
                    "cm",
                    vec![
                        real(w * place.scale),
                        real(0.0),
                        real(0.0),
                        real(h * place.scale),
                        real(place.x(*x)),
                        real(place.y(y + h)),
                    ],
                );
                self.op("Do", vec!["Im1".into()]);
                self.op("Q", vec![]);
            }
        }
    }
}

fn standard_fonts(doc: &mut Document, fonts: &mut Dictionary) {
    let regular = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    fonts.set(HELVETICA, regular);
    fonts.set(HELVETICA_BOLD, bold);
}

fn to_unicode_cmap(glyphs: &GlyphUse) -> String {
    let mut out = String::from(
        "/CIDInit /ProcSet findresource begin\n12 dict begin\nbegincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n/CMapType 2 def\n\
         1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n",
    );
    let entries: Vec<(u16, &str)> = glyphs
        .iter()
        .filter_map(|(gid, (_, text))| Some((*gid, text.as_deref()?)))
        .collect();
    for chunk in entries.chunks(100) {
        out.push_str(&format!("{} beginbfchar\n", chunk.len()));
        for (gid, text) in chunk {
            let hex: String = text.encode_utf16().map(|u| format!("{u:04X}")).collect();
            out.push_str(&format!("<{gid:04X}> <{hex}>\n"));
        }
        out.push_str("endbfchar\n");
    }
    out.push_str(
        "endcmap\nCMapName currentdict /CIDInit /ProcSet findresource /defineresource pop\nend\nend\n",
    );
    out
}

/// Type0 / CIDFontType2 font with Identity-H encoding over glyph ids.
fn embedded_font(
    doc: &mut Document,
    font: &FontFile,
    face: &ttf_parser::Face<'_>,
    glyphs: &GlyphUse,
) -> ObjectId {
    let per_unit = 1000.0 / face.units_per_em() as f32;
    let scaled = |v: i16| Object::Integer((v as f32 * per_unit).round() as i64);
    let bbox = face.global_bounding_box();
    let name = fonts::postscript_name(face);

    let file_id = doc.add_object(Stream::new(
        dictionary! { "Length1" => Object::Integer(font.data().len() as i64) },
        font.data().to_vec(),
    ));

    let descriptor = doc.add_object(dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => Object::Name(name.clone().into_bytes()),
        "Flags" => Object::Integer(32),
        "FontBBox" => vec![scaled(bbox.x_min), scaled(bbox.y_min), scaled(bbox.x_max), scaled(bbox.y_max)],
        "ItalicAngle" => Object::Integer(0),
        "Ascent" => scaled(face.ascender()),
        "Descent" => scaled(face.descender()),
        "CapHeight" => scaled(face.capital_height().unwrap_or(face.ascender())),
        "StemV" => Object::Integer(80),
        "FontFile2" => file_id,
    });

    let widths: Vec<Object> = glyphs
        .iter()
        .flat_map(|(gid, (width, _))| {
            [
                Object::Integer(*gid as i64),
                Object::Array(vec![Object::Integer(*width as i64)]),
            ]
        })
        .collect();
    let descendant = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "CIDFontType2",
        "BaseFont" => Object::Name(name.clone().into_bytes()),
        "CIDSystemInfo" => dictionary! {
            "Registry" => Object::string_literal("Adobe"),
            "Ordering" => Object::string_literal("Identity"),
            "Supplement" => Object::Integer(0),
        },
        "FontDescriptor" => descriptor,
        "CIDToGIDMap" => "Identity",
        "W" => widths,
    });
    let to_unicode = doc.add_object(Stream::new(
        Dictionary::new(),
        to_unicode_cmap(glyphs).into_bytes(),
    ));
    tracing::debug!(font = %font.path.display(), glyphs = glyphs.len(), "font embedded");
    doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => Object::Name(name.into_bytes()),
        "Encoding" => "Identity-H",
        "DescendantFonts" => vec![Object::Reference(descendant)],
        "ToUnicode" => to_unicode,
    })
}

fn rgb_image(doc: &mut Document, width: u32, height: u32, rgb: &[u8]) -> ObjectId {
    doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => Object::Integer(width as i64),
            "Height" => Object::Integer(height as i64),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => Object::Integer(8),
        },
        rgb.to_vec(),
    ))
}

fn vector_page(
    pdf: &mut Document,
    layout: &Layout,
    shaper: &Shaper<'_>,
    set: &FontSet,
    photo: Option<&PhotoImage>,
    place: Placement,
) -> (Vec<Operation>, Dictionary) {
    let mut writer = PageWriter {
        shaper,
        place,
        ops: Vec::new(),
        used: vec![GlyphUse::new(); shaper.face_count()],
    };
    for item in &layout.items {
        writer.draw(item);
    }

    let mut fonts = Dictionary::new();
    standard_fonts(pdf, &mut fonts);
    for (i, (font, used)) in set.fonts().iter().zip(&writer.used).enumerate() {
        if used.is_empty() {
            continue;
        }
        if let Some(face) = shaper.metrics(i) {
            let id = embedded_font(pdf, font, face, used);
            fonts.set(loaded_font_name(i), id);
        }
    }
    let mut resources = dictionary! { "Font" => fonts };
    if let Some(p) = photo {
        let image_id = rgb_image(pdf, p.width, p.height, &p.rgb);
        resources.set("XObject", dictionary! { "Im1" => image_id });
    }
    (writer.ops, resources)
}

fn raster_page(
    pdf: &mut Document,
    bitmap: &Bitmap,
    doc: &AdmitCardDocument,
    canvas_height: f32,
    place: Placement,
) -> (Vec<Operation>, Dictionary) {
    let image_id = rgb_image(pdf, bitmap.width, bitmap.height, &bitmap.rgb);
    let ops = vec![
        begin_actual_text(&doc.text_items().join("\n")),
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![
                real(CANVAS_WIDTH * place.scale),
                real(0.0),
                real(0.0),
                real(canvas_height * place.scale),
                real(place.x(0.0)),
                real(place.y(canvas_height)),
            ],
        ),
        Operation::new("Do", vec!["Card".into()]),
        Operation::new("Q", vec![]),
        Operation::new("EMC", vec![]),
    ];
    (ops, dictionary! { "XObject" => dictionary! { "Card" => image_id } })
}

/// Render the card to PDF bytes. Fails with [`RenderError::MissingGlyphs`]
/// when neither `printer.fontPath` nor `font_dirs` can draw all of its text.
pub fn render(
    doc: &AdmitCardDocument,
    photo: Option<&[u8]>,
    settings: &PrinterSettings,
    font_dirs: &[PathBuf],
) -> Result<Vec<u8>, RenderError> {
    let needed = fonts::needed_chars(doc, settings.pdf_mode);
    let set = FontSet::resolve(&needed, settings.font_path.as_deref(), font_dirs)?;
    let shaper = Shaper::new(&set, settings.pdf_mode)?;

    let photo = match (&doc.photo, photo) {
        (PhotoSlot::Image { .. }, Some(bytes)) => layout::prepare_photo(bytes, settings.export_scale),
        _ => None,
    };
    let layout = layout::layout(doc, &shaper, photo.is_some());
    let dropped = layout.dropped();
    if dropped > 0 {
        tracing::warn!(dropped, file_stem = %doc.file_stem, "characters without a glyph were left out");
    }
    let place = Placement::new(settings.page_margin_mm, layout.height);

    let mut pdf = Document::with_version("1.5");
    let pages_id = pdf.new_object_id();
    let (ops, resources) = match settings.pdf_mode {
        PdfMode::Raster => {
            let bitmap = raster::rasterize(&layout, &shaper, photo.as_ref(), settings.export_scale)?;
            raster_page(&mut pdf, &bitmap, doc, layout.height, place)
        }
        PdfMode::Vector => vector_page(&mut pdf, &layout, &shaper, &set, photo.as_ref(), place),
    };
    let resources_id = pdf.add_object(resources);

    let content = Content { operations: ops };
    let content_id = pdf.add_object(Stream::new(Dictionary::new(), content.encode()?));
    let page_id = pdf.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
        "MediaBox" => vec![real(0.0), real(0.0), real(A4_WIDTH_PT), real(A4_HEIGHT_PT)],
    });
    pdf.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => Object::Integer(1),
        }),
    );
    let catalog_id = pdf.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = pdf.add_object(dictionary! {
        "Title" => utf16_text(&doc.title),
        "Producer" => Object::string_literal("admitd"),
    });
    pdf.trailer.set("Root", catalog_id);
    pdf.trailer.set("Info", info_id);
    pdf.compress();

    let mut out = Vec::new();
    pdf.save_to(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExamParameters, StudentSnapshot};
    use crate::render::test_font;
    use crate::template::{build_document, CardContent, Organization};

    fn doc(photo: Option<&str>) -> AdmitCardDocument {
        let student = StudentSnapshot {
            id: "s1".into(),
            full_name: "Asha Rani".into(),
            father_name: Some("Ram Kumar".into()),
            roll_number: Some("1001".into()),
            registration_number: "MWS-17".into(),
            class_name: "8".into(),
        };
        let exam = ExamParameters {
            exam_name: "Haryana GK Exam 2025".into(),
            exam_date: "2025-06-01".into(),
            exam_time: String::new(),
            exam_center: "Govt. School, Bhuna".into(),
            generated_at: None,
        };
        build_document(
            &Organization::default(),
            &CardContent {
                student: &student,
                exam: Some(&exam),
                exam_name: "GK",
                photo,
            },
        )
    }

    /// Settings with the test font configured, and an empty font directory.
    struct Fixture {
        _dir: tempfile::TempDir,
        settings: PrinterSettings,
        font_dirs: Vec<PathBuf>,
    }

    fn fixture(mode: PdfMode) -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let font = test_font::write(dir.path(), "card.ttf", test_font::FULL);
        let empty = dir.path().join("no-fonts");
        std::fs::create_dir_all(&empty).expect("mkdir");
        Fixture {
            settings: PrinterSettings {
                font_path: Some(font),
                pdf_mode: mode,
                ..PrinterSettings::default()
            },
            font_dirs: vec![empty],
            _dir: dir,
        }
    }

    fn png(w: u32, h: u32) -> Vec<u8> {
        let mut png = Vec::new();
        image::RgbImage::from_pixel(w, h, image::Rgb([200, 10, 10]))
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .expect("encode");
        png
    }

    fn operations(pdf: &[u8]) -> Vec<Operation> {
        let loaded = Document::load_mem(pdf).expect("load pdf");
        let pages = loaded.get_pages();
        assert_eq!(pages.len(), 1);
        let page_id = *pages.values().next().expect("page");
        Content::decode(&loaded.get_page_content(page_id).expect("content"))
            .expect("decode content")
            .operations
    }

    fn shown_text(pdf: &[u8]) -> Vec<Vec<u8>> {
        operations(pdf)
            .iter()
            .filter(|op| op.operator == "Tj")
            .filter_map(|op| match op.operands.first() {
                Some(Object::String(bytes, _)) => Some(bytes.clone()),
                _ => None,
            })
            .collect()
    }

    fn actual_text(pdf: &[u8]) -> Vec<String> {
        operations(pdf)
            .iter()
            .filter(|op| op.operator == "BDC")
            .filter_map(|op| match op.operands.get(1) {
                Some(Object::Dictionary(d)) => d.get(b"ActualText").ok().cloned(),
                _ => None,
            })
            .filter_map(|text| match text {
                Object::String(bytes, _) => {
                    let units: Vec<u16> = bytes[2..]
                        .chunks_exact(2)
                        .map(|c| u16::from_be_bytes([c[0], c[1]]))
                        .collect();
                    String::from_utf16(&units).ok()
                }
                _ => None,
            })
            .collect()
    }

    /// (width, height) of every image XObject.
    fn images(pdf: &[u8]) -> Vec<(i64, i64)> {
        let loaded = Document::load_mem(pdf).expect("load pdf");
        loaded
            .objects
            .values()
            .filter_map(|o| o.as_stream().ok())
            .filter(|s| {
                s.dict.get(b"Subtype").and_then(|v| v.as_name()).ok() == Some(b"Image".as_slice())
            })
            .filter_map(|s| {
                let w = s.dict.get(b"Width").and_then(|v| v.as_i64()).ok()?;
                let h = s.dict.get(b"Height").and_then(|v| v.as_i64()).ok()?;
                Some((w, h))
            })
            .collect()
    }

    fn has_embedded_font(pdf: &[u8]) -> bool {
        let loaded = Document::load_mem(pdf).expect("load pdf");
        loaded.objects.values().any(|o| {
            o.as_dict()
                .ok()
                .and_then(|d| d.get(b"FontFile2").ok())
                .is_some()
        })
    }

    #[test]
    fn raster_export_is_one_bitmap_at_export_scale() {
        let f = fixture(PdfMode::Raster);
        let pdf = render(&doc(None), None, &f.settings, &f.font_dirs).expect("render");
        assert!(pdf.starts_with(b"%PDF"));
        let imgs = images(&pdf);
        assert_eq!(imgs.len(), 1);
        assert_eq!(imgs[0].0, 794 * 2);
        assert!(shown_text(&pdf).is_empty());

        let text = actual_text(&pdf).join("\n");
        for expected in ["ADMIT CARD / प्रवेश पत्र", "Asha Rani", "1001", "To be announced"] {
            assert!(text.contains(expected), "missing {expected}");
        }

        let scale_one = PrinterSettings {
            export_scale: 1,
            ..f.settings.clone()
        };
        let pdf = render(&doc(None), None, &scale_one, &f.font_dirs).expect("render");
        assert_eq!(images(&pdf)[0].0, 794);
    }

    #[test]
    fn raster_export_composites_the_photo() {
        let f = fixture(PdfMode::Raster);
        let pdf = render(
            &doc(Some("uploads/a.png")),
            Some(&png(60, 80)),
            &f.settings,
            &f.font_dirs,
        )
        .expect("render");
        assert_eq!(images(&pdf).len(), 1);
    }

    #[test]
    fn vector_export_keeps_latin_and_devanagari_text() {
        let f = fixture(PdfMode::Vector);
        let pdf = render(&doc(None), None, &f.settings, &f.font_dirs).expect("render");
        let texts = shown_text(&pdf);
        for expected in [
            "Roll Number:",
            "1001",
            "Asha Rani",
            "To be announced",
            "Haryana GK Exam 2025",
            "Photo",
        ] {
            assert!(
                texts.iter().any(|t| t.as_slice() == expected.as_bytes()),
                "missing {expected}"
            );
        }
        let tagged = actual_text(&pdf);
        for expected in [
            "ADMIT CARD / प्रवेश पत्र",
            "Exam Details / परीक्षा विवरण",
            "अधिकृत हस्ताक्षर",
        ] {
            assert!(tagged.iter().any(|t| t == expected), "missing {expected}");
        }
        assert!(has_embedded_font(&pdf));
        assert!(operations(&pdf).iter().any(|op| op.operator == "TJ"));
        assert!(images(&pdf).is_empty());
    }

    #[test]
    fn export_without_a_devanagari_font_is_refused() {
        let f = fixture(PdfMode::Raster);
        for mode in [PdfMode::Raster, PdfMode::Vector] {
            let settings = PrinterSettings {
                font_path: None,
                pdf_mode: mode,
                ..PrinterSettings::default()
            };
            let err = render(&doc(None), None, &settings, &f.font_dirs).expect_err("no font");
            assert!(matches!(err, RenderError::MissingGlyphs { .. }));
            assert!(err.to_string().contains("printer.fontPath"));
        }
    }

    #[test]
    fn decodable_photo_is_embedded_in_vector_mode() {
        let f = fixture(PdfMode::Vector);
        let pdf = render(
            &doc(Some("uploads/a.png")),
            Some(&png(60, 80)),
            &f.settings,
            &f.font_dirs,
        )
        .expect("render");
        assert_eq!(images(&pdf), vec![(200, 240)]);
        assert!(!shown_text(&pdf).iter().any(|t| t.as_slice() == b"Photo"));
    }

    #[test]
    fn undecodable_photo_falls_back_to_placeholder() {
        let f = fixture(PdfMode::Vector);
        let pdf = render(
            &doc(Some("uploads/a.png")),
            Some(b"not an image"),
            &f.settings,
            &f.font_dirs,
        )
        .expect("render");
        assert!(images(&pdf).is_empty());
        assert!(shown_text(&pdf).iter().any(|t| t.as_slice() == b"Photo"));
    }

    #[test]
    fn to_unicode_maps_clusters() {
        let mut used = GlyphUse::new();
        used.insert(7, (600, Some("प्र".to_string())));
        used.insert(8, (600, None));
        let cmap = to_unicode_cmap(&used);
        assert!(cmap.contains("1 beginbfchar"));
        assert!(cmap.contains("<0007> <092A094D0930>"));
        assert!(!cmap.contains("<0008>"));
    }
}
