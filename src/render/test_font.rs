//! Minimal TrueType font for tests. Every glyph is a filled box, whitespace is
//! empty. Enough for cmap lookup, shaping, metrics and outlines.

/// ASCII, Latin-1, the Devanagari block and the dotted circle.
pub const FULL: &[(u32, u32)] = &[(0x20, 0x7e), (0xa0, 0xff), (0x900, 0x97f), (0x25cc, 0x25cc)];

pub const LATIN_ONLY: &[(u32, u32)] = &[(0x20, 0x7e), (0xa0, 0xff)];

pub const DEVANAGARI_ONLY: &[(u32, u32)] = &[(0x20, 0x20), (0x900, 0x97f), (0x25cc, 0x25cc)];

const ADVANCE: u16 = 600;
const SPACE_ADVANCE: u16 = 250;

fn put16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn box_glyph() -> Vec<u8> {
    let mut g = Vec::new();
    put16(&mut g, 1); // contours
    for v in [50i16, 0, 550, 700] {
        put16(&mut g, v as u16);
    }
    put16(&mut g, 3); // last point of the contour
    put16(&mut g, 0); // no instructions
    g.extend_from_slice(&[0x01; 4]); // on-curve, 16-bit deltas
    for dx in [50i16, 500, 0, -500] {
        put16(&mut g, dx as u16);
    }
    for dy in [0i16, 0, 700, 0] {
        put16(&mut g, dy as u16);
    }
    g
}

/// Font covering `ranges`, glyph ids assigned in order from 1.
pub fn build(ranges: &[(u32, u32)]) -> Vec<u8> {
    let chars: Vec<u32> = ranges.iter().flat_map(|&(a, b)| a..=b).collect();
    let num_glyphs = (chars.len() + 1) as u16;
    let blank = |c: u32| c == 0x20 || c == 0xa0;

    let outline = box_glyph();
    let mut glyf = Vec::new();
    let mut loca = Vec::new();
    put32(&mut loca, 0); // .notdef is empty
    for &c in &chars {
        if !blank(c) {
            glyf.extend_from_slice(&outline);
        }
        put32(&mut loca, glyf.len() as u32);
    }

    let mut hmtx = Vec::new();
    put16(&mut hmtx, ADVANCE);
    put16(&mut hmtx, 0);
    for &c in &chars {
        put16(&mut hmtx, if blank(c) { SPACE_ADVANCE } else { ADVANCE });
        put16(&mut hmtx, 50);
    }

    let mut cmap = Vec::new();
    put16(&mut cmap, 0);
    put16(&mut cmap, 1);
    put16(&mut cmap, 3); // Windows
    put16(&mut cmap, 10); // full Unicode
    put32(&mut cmap, 12);
    put16(&mut cmap, 12); // format
    put16(&mut cmap, 0);
    put32(&mut cmap, 16 + 12 * ranges.len() as u32);
    put32(&mut cmap, 0);
    put32(&mut cmap, ranges.len() as u32);
    let mut next_gid = 1u32;
    for &(a, b) in ranges {
        put32(&mut cmap, a);
        put32(&mut cmap, b);
        put32(&mut cmap, next_gid);
        next_gid += b - a + 1;
    }

    let mut head = Vec::new();
    put32(&mut head, 0x0001_0000);
    put32(&mut head, 0x0001_0000);
    put32(&mut head, 0);
    put32(&mut head, 0x5f0f_3cf5);
    put16(&mut head, 0x000b);
    put16(&mut head, 1000);
    head.extend_from_slice(&[0; 16]); // created, modified
    for v in [0i16, -200, 1000, 800] {
        put16(&mut head, v as u16);
    }
    put16(&mut head, 0); // macStyle
    put16(&mut head, 8);
    put16(&mut head, 2);
    put16(&mut head, 1); // long loca offsets
    put16(&mut head, 0);

    let mut hhea = Vec::new();
    put32(&mut hhea, 0x0001_0000);
    for v in [800i16, -200, 0] {
        put16(&mut hhea, v as u16);
    }
    put16(&mut hhea, ADVANCE);
    for v in [0i16, 0, 550, 1, 0, 0, 0, 0, 0, 0, 0] {
        put16(&mut hhea, v as u16);
    }
    put16(&mut hhea, num_glyphs);

    let mut maxp = Vec::new();
    put32(&mut maxp, 0x0000_5000);
    put16(&mut maxp, num_glyphs);

    let tables: [(&[u8; 4], Vec<u8>); 7] = [
        (b"cmap", cmap),
        (b"glyf", glyf),
        (b"head", head),
        (b"hhea", hhea),
        (b"hmtx", hmtx),
        (b"loca", loca),
        (b"maxp", maxp),
    ];

    let mut font = Vec::new();
    put32(&mut font, 0x0001_0000);
    put16(&mut font, tables.len() as u16);
    put16(&mut font, 64);
    put16(&mut font, 2);
    put16(&mut font, tables.len() as u16 * 16 - 64);
    let mut offset = 12 + 16 * tables.len() as u32;
    for (tag, data) in &tables {
        font.extend_from_slice(*tag);
        put32(&mut font, 0);
        put32(&mut font, offset);
        put32(&mut font, data.len() as u32);
        offset += (data.len() as u32 + 3) & !3;
    }
    for (_, data) in &tables {
        font.extend_from_slice(data);
        font.resize((font.len() + 3) & !3, 0);
    }
    font
}

/// Writes a font covering `ranges` to `dir/name` and returns the path.
pub fn write(dir: &std::path::Path, name: &str, ranges: &[(u32, u32)]) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, build(ranges)).expect("write test font");
    path
}
