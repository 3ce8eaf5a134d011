//! Card layout on a 794 px wide virtual canvas (30 px padding), as a flat
//! display list shared by the vector and raster PDF writers.

use super::fonts::{Run, Shaper};
use crate::template::{AdmitCardDocument, Field, PhotoSlot};

pub const CANVAS_WIDTH: f32 = 794.0;
const PADDING: f32 = 30.0;
const LABEL_WIDTH: f32 = 150.0;
pub const PHOTO_WIDTH: f32 = 100.0;
pub const PHOTO_HEIGHT: f32 = 120.0;
const LINE: f32 = 1.25;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb(pub f32, pub f32, pub f32);

impl Rgb {
    pub const TEXT: Rgb = Rgb(0.0, 0.0, 0.0);
    pub const WHITE: Rgb = Rgb(1.0, 1.0, 1.0);
    const MUTED: Rgb = Rgb(0.4, 0.4, 0.4);
    const FAINT: Rgb = Rgb(0.6, 0.6, 0.6);
    const HEADING: Rgb = Rgb(0.2, 0.2, 0.2);
    const PHOTO_BORDER: Rgb = Rgb(0.8, 0.8, 0.8);
    const RULE: Rgb = Rgb(0.867, 0.867, 0.867);
    const PANEL: Rgb = Rgb(0.961, 0.961, 0.961);

    /// `#rgb` or `#rrggbb`; anything else is black.
    pub fn hex(s: &str) -> Self {
        let digits = s.trim_start_matches('#');
        let channel = |v: &str| u8::from_str_radix(v, 16).ok().map(|n| n as f32 / 255.0);
        let parsed = match digits.len() {
            _ if !digits.is_ascii() => (None, None, None),
            3 => {
                let expand = |i: usize| channel(&digits[i..=i].repeat(2));
                (expand(0), expand(1), expand(2))
            }
            6 => (
                channel(&digits[0..2]),
                channel(&digits[2..4]),
                channel(&digits[4..6]),
            ),
            _ => (None, None, None),
        };
        match parsed {
            (Some(r), Some(g), Some(b)) => Rgb(r, g, b),
            _ => Rgb::TEXT,
        }
    }

    pub fn to_u8(self) -> [u8; 3] {
        let c = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [c(self.0), c(self.1), c(self.2)]
    }
}

/// Photo decoded, cropped to the slot's aspect ratio and resampled.
pub struct PhotoImage {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

pub fn prepare_photo(bytes: &[u8], export_scale: u32) -> Option<PhotoImage> {
    let img = match image::load_from_memory(bytes) {
        Ok(img) => img,
        Err(e) => {
            tracing::warn!(error = %e, "photo could not be decoded; drawing placeholder");
            return None;
        }
    };
    let (w, h) = (img.width(), img.height());
    if w == 0 || h == 0 {
        return None;
    }
    // object-fit: cover
    let target = PHOTO_WIDTH / PHOTO_HEIGHT;
    let (cw, ch) = if w as f32 / h as f32 > target {
        (((h as f32) * target).round().max(1.0) as u32, h)
    } else {
        (w, ((w as f32) / target).round().max(1.0) as u32)
    };
    let cropped = img.crop_imm((w - cw.min(w)) / 2, (h - ch.min(h)) / 2, cw, ch);
    let scale = export_scale.clamp(1, 4);
    let out_w = PHOTO_WIDTH as u32 * scale;
    let out_h = PHOTO_HEIGHT as u32 * scale;
    let resized = cropped.resize_exact(out_w, out_h, image::imageops::FilterType::Triangle);
    Some(PhotoImage {
        width: out_w,
        height: out_h,
        rgb: resized.to_rgb8().into_raw(),
    })
}

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Text {
        x: f32,
        baseline: f32,
        size: f32,
        bold: bool,
        color: Rgb,
        text: String,
        runs: Vec<Run>,
    },
    Rect {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        fill: Option<Rgb>,
        stroke: Option<Rgb>,
    },
    Line {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        width: f32,
        color: Rgb,
    },
    Image {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
    },
}

/// Laid-out card.
pub struct Layout {
    pub items: Vec<Item>,
    pub height: f32,
}

impl Layout {
    /// Characters that no font in the chain could draw.
    pub fn dropped(&self) -> usize {
        self.items
            .iter()
            .map(|item| match item {
                Item::Text { runs, .. } => runs.iter().map(|r| r.dropped).sum(),
                _ => 0,
            })
            .sum()
    }
}

struct Canvas<'s, 'f> {
    shaper: &'s Shaper<'f>,
    items: Vec<Item>,
    y: f32,
}

impl Canvas<'_, '_> {
    fn text(&mut self, x: f32, baseline: f32, size: f32, bold: bool, color: Rgb, text: String) {
        let runs = self.shaper.runs(&text, bold);
        self.items.push(Item::Text {
            x,
            baseline,
            size,
            bold,
            color,
            text,
            runs,
        });
    }

    fn centered(&mut self, text: &str, size: f32, bold: bool, color: Rgb) {
        let max = CANVAS_WIDTH - 2.0 * PADDING;
        for line in self.shaper.wrap(text, size, bold, max) {
            let w = self.shaper.measure(&line, size, bold);
            self.text((CANVAS_WIDTH - w) / 2.0, self.y + size, size, bold, color, line);
            self.y += size * LINE;
        }
    }

    fn right_aligned(&mut self, text: &str, size: f32, color: Rgb) {
        let w = self.shaper.measure(text, size, false);
        self.text(
            CANVAS_WIDTH - PADDING - w,
            self.y + size,
            size,
            false,
            color,
            text.to_string(),
        );
        self.y += size * LINE;
    }

    fn rows(&mut self, fields: &[Field], x: f32, value_width: f32, size: f32, gap: f32) {
        for (i, f) in fields.iter().enumerate() {
            if i > 0 {
                self.y += gap;
            }
            self.text(x, self.y + size, size, true, Rgb::TEXT, f.label.clone());
            for line in self.shaper.wrap(&f.value, size, false, value_width) {
                self.text(x + LABEL_WIDTH, self.y + size, size, false, Rgb::TEXT, line);
                self.y += size * LINE;
            }
        }
    }

    /// One instructions column; returns its bottom edge.
    fn column(&mut self, x: f32, top: f32, width: f32, label: &str, points: &[String]) -> f32 {
        const SIZE: f32 = 10.0;
        const LEADING: f32 = 14.0;
        let mut y = top;
        self.text(x, y + SIZE, SIZE, true, Rgb::TEXT, label.to_string());
        y += LEADING + 4.0;
        for point in points {
            for line in self.shaper.wrap(point, SIZE, false, width) {
                self.text(x, y + SIZE, SIZE, false, Rgb::TEXT, line);
                y += LEADING;
            }
        }
        y
    }
}

/// Display list for the whole card and the canvas height it needs.
pub fn layout(doc: &AdmitCardDocument, shaper: &Shaper<'_>, has_photo: bool) -> Layout {
    let accent = Rgb::hex(&doc.accent);
    let left = PADDING;
    let right = CANVAS_WIDTH - PADDING;
    let width = right - left;
    let mut c = Canvas {
        shaper,
        items: Vec::new(),
        y: PADDING,
    };

    c.y += 10.0;
    c.centered(&doc.header.title, 22.0, true, accent);
    c.y += 10.0;
    for (i, line) in doc.header.subtitle_lines.iter().enumerate() {
        let size = if i == 0 { 13.0 } else { 12.0 };
        c.centered(line, size, false, Rgb::MUTED);
    }
    c.y += 15.0;
    c.items.push(Item::Line {
        x1: left,
        y1: c.y,
        x2: right,
        y2: c.y,
        width: 2.0,
        color: accent,
    });
    c.y += 2.0 + 20.0;

    let banner_h = 10.0 + 18.0 * LINE + 10.0;
    c.items.push(Item::Rect {
        x: left,
        y: c.y,
        w: width,
        h: banner_h,
        fill: Some(accent),
        stroke: None,
    });
    let banner = doc.banner.joined();
    let bw = shaper.measure(&banner, 18.0, true);
    c.text((CANVAS_WIDTH - bw) / 2.0, c.y + 10.0 + 18.0, 18.0, true, Rgb::WHITE, banner);
    c.y += banner_h + 20.0;

    let details_top = c.y;
    let photo_x = right - PHOTO_WIDTH;
    c.rows(
        &doc.identity,
        left,
        photo_x - 30.0 - (left + LABEL_WIDTH),
        14.0,
        8.0,
    );
    let rows_bottom = c.y;
    if has_photo {
        c.items.push(Item::Image {
            x: photo_x,
            y: details_top,
            w: PHOTO_WIDTH,
            h: PHOTO_HEIGHT,
        });
    } else {
        let label = match &doc.photo {
            PhotoSlot::Placeholder { label } => label.as_str(),
            PhotoSlot::Image { .. } => crate::template::PHOTO_PLACEHOLDER,
        };
        let lw = shaper.measure(label, 12.0, false);
        c.text(
            photo_x + (PHOTO_WIDTH - lw) / 2.0,
            details_top + PHOTO_HEIGHT / 2.0 + 4.0,
            12.0,
            false,
            Rgb::FAINT,
            label.to_string(),
        );
    }
    c.items.push(Item::Rect {
        x: photo_x,
        y: details_top,
        w: PHOTO_WIDTH,
        h: PHOTO_HEIGHT,
        fill: None,
        stroke: Some(Rgb::PHOTO_BORDER),
    });
    c.y = rows_bottom.max(details_top + PHOTO_HEIGHT) + 20.0;

    let exam_top = c.y;
    let exam_index = c.items.len();
    c.y += 15.0;
    c.text(
        left + 15.0,
        c.y + 14.0,
        14.0,
        true,
        Rgb::HEADING,
        doc.exam_heading.joined(),
    );
    c.y += 14.0 * LINE + 10.0;
    c.rows(
        &doc.exam,
        left + 15.0,
        right - 15.0 - (left + 15.0 + LABEL_WIDTH),
        14.0,
        6.0,
    );
    c.y += 15.0;
    c.items.insert(
        exam_index,
        Item::Rect {
            x: left,
            y: exam_top,
            w: width,
            h: c.y - exam_top,
            fill: Some(Rgb::PANEL),
            stroke: None,
        },
    );
    c.y += 20.0;

    let box_top = c.y;
    let box_index = c.items.len();
    c.y += 12.0;
    c.text(
        left + 12.0,
        c.y + 13.0,
        13.0,
        true,
        Rgb::TEXT,
        doc.instructions.heading.joined(),
    );
    c.y += 13.0 * LINE + 8.0;
    let col_w = (width - 24.0) / 2.0;
    let cols_top = c.y;
    let divider = left + 12.0 + col_w;
    let left_bottom = c.column(
        left + 12.0,
        cols_top,
        col_w - 10.0,
        &doc.instructions.english_label,
        &doc.instructions.english,
    );
    let right_bottom = c.column(
        divider + 10.0,
        cols_top,
        col_w - 10.0,
        &doc.instructions.local_label,
        &doc.instructions.local,
    );
    let cols_bottom = left_bottom.max(right_bottom);
    c.items.push(Item::Line {
        x1: divider,
        y1: cols_top,
        x2: divider,
        y2: cols_bottom,
        width: 1.0,
        color: Rgb::RULE,
    });
    c.y = cols_bottom + 12.0;
    c.items.insert(
        box_index,
        Item::Rect {
            x: left,
            y: box_top,
            w: width,
            h: c.y - box_top,
            fill: None,
            stroke: Some(Rgb::RULE),
        },
    );

    c.y += 30.0;
    c.right_aligned(&doc.signature.line, 14.0, Rgb::TEXT);
    c.right_aligned(&doc.signature.caption.en, 12.0, Rgb::TEXT);
    c.right_aligned(&doc.signature.caption.local, 11.0, Rgb::TEXT);

    c.y += 20.0;
    c.items.push(Item::Line {
        x1: left,
        y1: c.y,
        x2: right,
        y2: c.y,
        width: 1.0,
        color: Rgb::RULE,
    });
    c.y += 15.0;
    for (i, line) in doc.footer.iter().enumerate() {
        if i > 0 {
            c.y += 3.0;
        }
        c.centered(line, 10.0, false, Rgb::MUTED);
    }
    c.y += PADDING;

    Layout {
        height: c.y,
        items: c.items,
    }
}
