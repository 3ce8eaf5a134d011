//! Paints a [`Layout`] into an RGB bitmap at the export scale.

use tiny_skia::{
    Color, FillRule, FilterQuality, IntSize, Paint, Path, PathBuilder, Pixmap, PixmapPaint, Rect,
    Stroke, Transform,
};

use super::fonts::{FaceRef, Run, Shaper};
use super::layout::{Item, Layout, PhotoImage, Rgb, CANVAS_WIDTH};
use super::RenderError;

/// Rendered card, tightly packed 8-bit RGB.
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

fn paint(color: Rgb) -> Paint<'static> {
    let [r, g, b] = color.to_u8();
    let mut paint = Paint::default();
    paint.set_color_rgba8(r, g, b, 255);
    paint.anti_alias = true;
    paint
}

/// Glyph outline in font units, placed on the pixmap.
struct GlyphPen<'b> {
    builder: &'b mut PathBuilder,
    x: f32,
    y: f32,
    scale: f32,
}

impl ttf_parser::OutlineBuilder for GlyphPen<'_> {
    fn move_to(&mut self, x: f32, y: f32) {
        self.builder
            .move_to(self.x + x * self.scale, self.y - y * self.scale);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.builder
            .line_to(self.x + x * self.scale, self.y - y * self.scale);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        self.builder.quad_to(
            self.x + x1 * self.scale,
            self.y - y1 * self.scale,
            self.x + x * self.scale,
            self.y - y * self.scale,
        );
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.builder.cubic_to(
            self.x + x1 * self.scale,
            self.y - y1 * self.scale,
            self.x + x2 * self.scale,
            self.y - y2 * self.scale,
            self.x + x * self.scale,
            self.y - y * self.scale,
        );
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

struct Painter<'s, 'f> {
    shaper: &'s Shaper<'f>,
    pixmap: Pixmap,
    scale: f32,
    /// Glyphs drawn, for the export log.
    glyphs: usize,
}

impl Painter<'_, '_> {
    fn rect(&self, x: f32, y: f32, w: f32, h: f32) -> Option<Rect> {
        Rect::from_xywh(x * self.scale, y * self.scale, w * self.scale, h * self.scale)
    }

    fn stroke(&mut self, path: &Path, width: f32, color: Rgb) {
        let stroke = Stroke {
            width: width * self.scale,
            ..Stroke::default()
        };
        self.pixmap
            .stroke_path(path, &paint(color), &stroke, Transform::identity(), None);
    }

    fn text(&mut self, x: f32, baseline: f32, size: f32, bold: bool, color: Rgb, runs: &[Run]) {
        let em = size * self.scale / 1000.0;
        let mut pen_x = x * self.scale;
        let baseline = baseline * self.scale;
        let mut outline = PathBuilder::new();
        for run in runs {
            let face = match run.face {
                FaceRef::Loaded(i) => self.shaper.metrics(i),
                FaceRef::Standard => None,
            };
            let Some(face) = face else {
                pen_x += run.width * em;
                continue;
            };
            let units = size * self.scale / face.units_per_em() as f32;
            for glyph in &run.glyphs {
                let mut pen = GlyphPen {
                    builder: &mut outline,
                    x: pen_x + glyph.x_offset * em,
                    y: baseline - glyph.y_offset * em,
                    scale: units,
                };
                if face
                    .outline_glyph(ttf_parser::GlyphId(glyph.id), &mut pen)
                    .is_some()
                {
                    self.glyphs += 1;
                }
                pen_x += glyph.advance * em;
            }
        }
        let Some(path) = outline.finish() else {
            return;
        };
        let paint = paint(color);
        self.pixmap
            .fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
        if bold {
            // thickens glyphs of a single-weight font
            let stroke = Stroke {
                width: 0.04 * size * self.scale,
                ..Stroke::default()
            };
            self.pixmap
                .stroke_path(&path, &paint, &stroke, Transform::identity(), None);
        }
    }

    fn draw(&mut self, item: &Item, photo: Option<&PhotoImage>) -> Result<(), RenderError> {
        match item {
            Item::Text {
                x,
                baseline,
                size,
                bold,
                color,
                runs,
                ..
            } => self.text(*x, *baseline, *size, *bold, *color, runs),
            Item::Rect {
                x,
                y,
                w,
                h,
                fill,
                stroke,
            } => {
                let Some(rect) = self.rect(*x, *y, *w, *h) else {
                    return Ok(());
                };
                if let Some(f) = fill {
                    self.pixmap
                        .fill_rect(rect, &paint(*f), Transform::identity(), None);
                }
                if let Some(s) = stroke {
                    self.stroke(&PathBuilder::from_rect(rect), 1.0, *s);
                }
            }
            Item::Line {
                x1,
                y1,
                x2,
                y2,
                width,
                color,
            } => {
                let mut builder = PathBuilder::new();
                builder.move_to(x1 * self.scale, y1 * self.scale);
                builder.line_to(x2 * self.scale, y2 * self.scale);
                if let Some(path) = builder.finish() {
                    self.stroke(&path, *width, *color);
                }
            }
            Item::Image { x, y, w, h } => {
                let Some(photo) = photo else {
                    return Ok(());
                };
                let source = photo_pixmap(photo)?;
                let sx = w * self.scale / photo.width as f32;
                let sy = h * self.scale / photo.height as f32;
                self.pixmap.draw_pixmap(
                    0,
                    0,
                    source.as_ref(),
                    &PixmapPaint {
                        quality: FilterQuality::Bilinear,
                        ..PixmapPaint::default()
                    },
                    Transform::from_row(sx, 0.0, 0.0, sy, x * self.scale, y * self.scale),
                    None,
                );
            }
        }
        Ok(())
    }
}

fn photo_pixmap(photo: &PhotoImage) -> Result<Pixmap, RenderError> {
    let rgba: Vec<u8> = photo
        .rgb
        .chunks_exact(3)
        .flat_map(|p| [p[0], p[1], p[2], 255])
        .collect();
    IntSize::from_wh(photo.width, photo.height)
        .and_then(|size| Pixmap::from_vec(rgba, size))
        .ok_or_else(|| RenderError::Raster("photo has no pixels".to_string()))
}

/// Paint `layout` on a white bitmap `scale` times the canvas size.
pub fn rasterize(
    layout: &Layout,
    shaper: &Shaper<'_>,
    photo: Option<&PhotoImage>,
    scale: u32,
) -> Result<Bitmap, RenderError> {
    let scale = scale.clamp(1, 4) as f32;
    let width = (CANVAS_WIDTH * scale).ceil() as u32;
    let height = (layout.height * scale).ceil() as u32;
    let mut pixmap = Pixmap::new(width, height)
        .ok_or_else(|| RenderError::Raster(format!("cannot allocate {width}x{height} bitmap")))?;
    pixmap.fill(Color::WHITE);

    let mut painter = Painter {
        shaper,
        pixmap,
        scale,
        glyphs: 0,
    };
    for item in &layout.items {
        painter.draw(item, photo)?;
    }
    tracing::debug!(width, height, glyphs = painter.glyphs, "card rasterized");

    // Every pixel is opaque, so premultiplied RGBA is plain RGBA.
    let rgb = painter
        .pixmap
        .data()
        .chunks_exact(4)
        .flat_map(|p| [p[0], p[1], p[2]])
        .collect();
    Ok(Bitmap { width, height, rgb })
}
