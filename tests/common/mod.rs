//! In-memory TrueType fonts for integration tests.
//!
//! Small enough to reason about byte by byte, complete enough that
//! `ttf-parser` accepts both the input and the subset output.

#![allow(dead_code)]

// ─── Glyphs ─────────────────────────────────────────────────────

pub enum Glyph {
    /// No outline (e.g. space).
    Empty,
    /// A one-contour triangle.
    Simple { instructions: Vec<u8> },
    /// References other glyphs by id.
    Composite {
        components: Vec<u16>,
        instructions: Vec<u8>,
    },
}

impl Glyph {
    pub fn simple() -> Self {
        Glyph::Simple {
            instructions: vec![],
        }
    }

    pub fn hinted(instructions: &[u8]) -> Self {
        Glyph::Simple {
            instructions: instructions.to_vec(),
        }
    }

    pub fn composite(components: &[u16]) -> Self {
        Glyph::Composite {
            components: components.to_vec(),
            instructions: vec![],
        }
    }

    pub fn encoded_len(&self) -> usize {
        self.encode().len()
    }

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            Glyph::Empty => {}
            Glyph::Simple { instructions } => {
                push_i16(&mut out, 1); // numberOfContours
                for v in [0i16, 0, 400, 700] {
                    push_i16(&mut out, v);
                }
                push_u16(&mut out, 2); // endPtsOfContours[0]
                push_u16(&mut out, instructions.len() as u16);
                out.extend_from_slice(instructions);
                out.extend_from_slice(&[0x01, 0x01, 0x01]); // on-curve, long deltas
                for x in [0i16, 200, 200] {
                    push_i16(&mut out, x);
                }
                for y in [0i16, 700, -700] {
                    push_i16(&mut out, y);
                }
            }
            Glyph::Composite {
                components,
                instructions,
            } => {
                push_i16(&mut out, -1);
                for v in [0i16, 0, 600, 900] {
                    push_i16(&mut out, v);
                }
                for (i, &gid) in components.iter().enumerate() {
                    let last = i + 1 == components.len();
                    // ARG_1_AND_2_ARE_WORDS | ARGS_ARE_XY_VALUES
                    let mut flags = 0x0001 | 0x0002;
                    if !last {
                        flags |= 0x0020;
                    } else if !instructions.is_empty() {
                        flags |= 0x0100;
                    }
                    push_u16(&mut out, flags);
                    push_u16(&mut out, gid);
                    push_i16(&mut out, (i as i16) * 50);
                    push_i16(&mut out, 0);
                }
                if !instructions.is_empty() {
                    push_u16(&mut out, instructions.len() as u16);
                    out.extend_from_slice(instructions);
                }
            }
        }
        if out.len() % 2 != 0 {
            out.push(0);
        }
        out
    }
}

// ─── Font ───────────────────────────────────────────────────────

pub struct TestFont {
    pub glyphs: Vec<Glyph>,
    pub advances: Vec<u16>,
    pub cmap: Vec<(u32, u16)>,
    pub fpgm: Option<Vec<u8>>,
    pub prep: Option<Vec<u8>>,
    pub cvt: Option<Vec<u8>>,
    pub long_loca: bool,
    /// Explicit loca offsets; `glyf` is still built from `glyphs`.
    pub loca: Option<Vec<u32>>,
    pub sfnt_version: u32,
}

impl TestFont {
    pub fn new(glyphs: Vec<Glyph>) -> Self {
        let advances = (0..glyphs.len()).map(|i| 500 + 10 * i as u16).collect();
        TestFont {
            glyphs,
            advances,
            cmap: vec![],
            fpgm: None,
            prep: None,
            cvt: None,
            long_loca: false,
            loca: None,
            sfnt_version: 0x0001_0000,
        }
    }

    pub fn build(&self) -> Vec<u8> {
        self.build_at(0)
    }

    /// Build with every table offset shifted by `base`, for embedding in a
    /// collection at that position.
    pub fn build_at(&self, base: u32) -> Vec<u8> {
        let num_glyphs = self.glyphs.len() as u16;

        let mut glyf = Vec::new();
        let mut offsets = Vec::new();
        for glyph in &self.glyphs {
            offsets.push(glyf.len() as u32);
            glyf.extend(glyph.encode());
        }
        offsets.push(glyf.len() as u32);
        let offsets = self.loca.clone().unwrap_or(offsets);
        let mut loca = Vec::new();
        for off in offsets {
            if self.long_loca {
                push_u32(&mut loca, off);
            } else {
                push_u16(&mut loca, (off / 2) as u16);
            }
        }

        let mut hmtx = Vec::new();
        for &adv in &self.advances {
            push_u16(&mut hmtx, adv);
            push_i16(&mut hmtx, 0);
        }

        let mut tables: Vec<([u8; 4], Vec<u8>)> = vec![
            (*b"head", head(self.long_loca)),
            (*b"hhea", hhea(self.advances.len() as u16)),
            (*b"maxp", maxp(num_glyphs)),
            (*b"hmtx", hmtx),
            (*b"loca", loca),
            (*b"glyf", glyf),
            (*b"cmap", cmap(&self.cmap)),
            (*b"name", vec![0, 0, 0, 0, 0, 6]),
            (*b"OS/2", os2()),
            (*b"post", post_v2(num_glyphs)),
        ];
        if let Some(fpgm) = &self.fpgm {
            tables.push((*b"fpgm", fpgm.clone()));
        }
        if let Some(prep) = &self.prep {
            tables.push((*b"prep", prep.clone()));
        }
        if let Some(cvt) = &self.cvt {
            tables.push((*b"cvt ", cvt.clone()));
        }
        tables.sort_by_key(|(tag, _)| *tag);

        let mut out = Vec::new();
        push_u32(&mut out, self.sfnt_version);
        let n = tables.len() as u16;
        let selector = 15 - n.leading_zeros() as u16;
        push_u16(&mut out, n);
        push_u16(&mut out, (1 << selector) * 16);
        push_u16(&mut out, selector);
        push_u16(&mut out, n * 16 - (1 << selector) * 16);

        let mut offset = 12 + tables.len() * 16;
        for (tag, data) in &tables {
            out.extend_from_slice(tag);
            push_u32(&mut out, checksum(data));
            push_u32(&mut out, base + offset as u32);
            push_u32(&mut out, data.len() as u32);
            offset += (data.len() + 3) & !3;
        }
        for (_, data) in &tables {
            out.extend_from_slice(data);
            while out.len() % 4 != 0 {
                out.push(0);
            }
        }
        out
    }
}

/// Nine glyphs with composites (one nested), an empty glyph, and a
/// supplementary-plane mapping.
///
/// | gid | glyph       | cmap    |
/// |-----|-------------|---------|
/// | 0   | .notdef     |         |
/// | 1   | space       | U+0020  |
/// | 2   | A           | U+0041  |
/// | 3   | B           | U+0042  |
/// | 4   | Aacute = 2+5| U+00C1  |
/// | 5   | acute       | U+00B4  |
/// | 6   | C           | U+0043  |
/// | 7   | grin        | U+1F600 |
/// | 8   | 4+5         |         |
pub fn standard_font() -> TestFont {
    let mut font = TestFont::new(vec![
        Glyph::simple(),
        Glyph::Empty,
        Glyph::simple(),
        Glyph::simple(),
        Glyph::composite(&[2, 5]),
        Glyph::simple(),
        Glyph::simple(),
        Glyph::simple(),
        Glyph::composite(&[4, 5]),
    ]);
    font.advances = vec![500, 250, 600, 610, 600, 300, 650, 1000, 600];
    font.cmap = vec![
        (0x20, 1),
        (0x41, 2),
        (0x42, 3),
        (0x43, 6),
        (0xB4, 5),
        (0xC1, 4),
        (0x1F600, 7),
    ];
    font
}

/// `standard_font` with hinting:
/// - fpgm defines function 0 (reads CVT 2) and function 1 (touches nothing)
/// - A pushes and pops, B calls function 1, C calls function 0
pub fn hinted_font() -> TestFont {
    let mut font = standard_font();
    font.glyphs[2] = Glyph::hinted(&[0xB0, 0x05, 0x21]);
    font.glyphs[3] = Glyph::hinted(&[0xB0, 0x01, 0x2B]);
    font.glyphs[6] = Glyph::hinted(&[0xB0, 0x00, 0x2B]);
    font.fpgm = Some(vec![
        0xB0, 0x00, 0x2C, 0xB0, 0x02, 0x45, 0x21, 0x2D, // FDEF 0
        0xB0, 0x01, 0x2C, 0xB0, 0x00, 0x21, 0x2D, // FDEF 1
    ]);
    font.prep = Some(vec![0xB0, 0x00, 0x21]);
    font.cvt = Some(vec![0, 10, 0, 20, 0, 30, 0, 40]);
    font
}

/// Wrap faces in a `ttcf` collection.
pub fn collection(faces: &[TestFont]) -> Vec<u8> {
    let header_len = 12 + 4 * faces.len();
    let mut face_offsets = Vec::new();
    let mut position = header_len;
    for face in faces {
        face_offsets.push(position as u32);
        position += face.build().len();
    }

    let mut out = Vec::new();
    out.extend_from_slice(b"ttcf");
    push_u32(&mut out, 0x0001_0000);
    push_u32(&mut out, faces.len() as u32);
    for &off in &face_offsets {
        push_u32(&mut out, off);
    }
    for (face, &off) in faces.iter().zip(&face_offsets) {
        out.extend(face.build_at(off));
    }
    out
}

// ─── Tables ─────────────────────────────────────────────────────

fn head(long_loca: bool) -> Vec<u8> {
    let mut out = Vec::new();
    push_u32(&mut out, 0x0001_0000); // version
    push_u32(&mut out, 0x0001_0000); // fontRevision
    push_u32(&mut out, 0); // checksumAdjustment
    push_u32(&mut out, 0x5F0F_3CF5); // magicNumber
    push_u16(&mut out, 0x000B); // flags
    push_u16(&mut out, 1000); // unitsPerEm
    out.extend_from_slice(&[0; 16]); // created, modified
    for v in [0i16, -200, 1000, 900] {
        push_i16(&mut out, v);
    }
    push_u16(&mut out, 0); // macStyle
    push_u16(&mut out, 8); // lowestRecPPEM
    push_i16(&mut out, 2); // fontDirectionHint
    push_i16(&mut out, long_loca as i16);
    push_i16(&mut out, 0); // glyphDataFormat
    out
}

fn hhea(num_h_metrics: u16) -> Vec<u8> {
    let mut out = Vec::new();
    push_u32(&mut out, 0x0001_0000);
    push_i16(&mut out, 800); // ascender
    push_i16(&mut out, -200); // descender
    push_i16(&mut out, 0); // lineGap
    push_u16(&mut out, 1000); // advanceWidthMax
    out.extend_from_slice(&[0; 22]);
    push_u16(&mut out, num_h_metrics);
    out
}

fn maxp(num_glyphs: u16) -> Vec<u8> {
    let mut out = Vec::new();
    push_u32(&mut out, 0x0001_0000);
    push_u16(&mut out, num_glyphs);
    push_u16(&mut out, 3); // maxPoints
    push_u16(&mut out, 1); // maxContours
    out.extend_from_slice(&[0; 22]);
    out
}

fn os2() -> Vec<u8> {
    let mut out = vec![0; 78];
    out[5] = 0x90; // usWeightClass 400
    out[7] = 5; // usWidthClass
    out
}

fn post_v2(num_glyphs: u16) -> Vec<u8> {
    let mut out = Vec::new();
    push_u32(&mut out, 0x0002_0000);
    out.extend_from_slice(&[0; 28]);
    push_u16(&mut out, num_glyphs);
    for _ in 0..num_glyphs {
        push_u16(&mut out, 0);
    }
    out
}

/// (3,1) format 4 for BMP codes, plus (3,10) format 12 when any code is
/// supplementary.
fn cmap(mappings: &[(u32, u16)]) -> Vec<u8> {
    let mut sorted = mappings.to_vec();
    sorted.sort();
    let bmp: Vec<(u16, u16)> = sorted
        .iter()
        .filter(|(c, _)| *c <= 0xFFFF)
        .map(|&(c, g)| (c as u16, g))
        .collect();

    let mut subtables = vec![((3u16, 1u16), format4(&bmp))];
    if sorted.iter().any(|(c, _)| *c > 0xFFFF) {
        subtables.push(((3, 10), format12(&sorted)));
    }

    let mut out = Vec::new();
    push_u16(&mut out, 0);
    push_u16(&mut out, subtables.len() as u16);
    let mut offset = 4 + 8 * subtables.len() as u32;
    for ((platform, encoding), data) in &subtables {
        push_u16(&mut out, *platform);
        push_u16(&mut out, *encoding);
        push_u32(&mut out, offset);
        offset += data.len() as u32;
    }
    for (_, data) in &subtables {
        out.extend_from_slice(data);
    }
    out
}

fn format4(mappings: &[(u16, u16)]) -> Vec<u8> {
    // One segment per code, then the 0xFFFF terminator
    let mut segments: Vec<(u16, u16, i16)> = mappings
        .iter()
        .map(|&(c, g)| (c, c, g.wrapping_sub(c) as i16))
        .collect();
    segments.push((0xFFFF, 0xFFFF, 1));

    let seg_count = segments.len() as u16;
    let selector = 15 - seg_count.leading_zeros() as u16;
    let search_range = (1u16 << selector) * 2;

    let mut out = Vec::new();
    push_u16(&mut out, 4);
    push_u16(&mut out, 16 + 8 * seg_count);
    push_u16(&mut out, 0);
    push_u16(&mut out, seg_count * 2);
    push_u16(&mut out, search_range);
    push_u16(&mut out, selector);
    push_u16(&mut out, seg_count * 2 - search_range);
    for s in &segments {
        push_u16(&mut out, s.1);
    }
    push_u16(&mut out, 0);
    for s in &segments {
        push_u16(&mut out, s.0);
    }
    for s in &segments {
        push_i16(&mut out, s.2);
    }
    for _ in &segments {
        push_u16(&mut out, 0);
    }
    out
}

fn format12(mappings: &[(u32, u16)]) -> Vec<u8> {
    let mut out = Vec::new();
    push_u16(&mut out, 12);
    push_u16(&mut out, 0);
    push_u32(&mut out, 16 + 12 * mappings.len() as u32);
    push_u32(&mut out, 0);
    push_u32(&mut out, mappings.len() as u32);
    for &(c, g) in mappings {
        push_u32(&mut out, c);
        push_u32(&mut out, c);
        push_u32(&mut out, g as u32);
    }
    out
}

// ─── Bytes ──────────────────────────────────────────────────────

fn push_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn push_i16(out: &mut Vec<u8>, v: i16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn push_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn checksum(data: &[u8]) -> u32 {
    data.chunks(4).fold(0u32, |sum, chunk| {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        sum.wrapping_add(u32::from_be_bytes(word))
    })
}

pub fn read_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([data[offset], data[offset + 1]])
}

pub fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

/// `(tag, offset, length)` for every record in an output font.
pub fn table_records(font: &[u8]) -> Vec<([u8; 4], usize, usize)> {
    let n = read_u16(font, 4) as usize;
    (0..n)
        .map(|i| {
            let p = 12 + i * 16;
            let tag = [font[p], font[p + 1], font[p + 2], font[p + 3]];
            (tag, read_u32(font, p + 8) as usize, read_u32(font, p + 12) as usize)
        })
        .collect()
}

pub fn table<'a>(font: &'a [u8], tag: &[u8; 4]) -> Option<&'a [u8]> {
    table_records(font)
        .into_iter()
        .find(|(t, _, _)| t == tag)
        .map(|(_, off, len)| &font[off..off + len])
}
