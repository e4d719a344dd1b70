//! HEIF/HEIC container validation (the format iPhone and most recent Android
//! cameras write).
//!
//! HEVC pixel data is not decoded. Instead the ISO-BMFF structure is checked:
//! boxes must tile the file exactly, `ftyp` must carry a HEIF brand, `meta`
//! must declare a `pict` handler and a primary item, and every `iloc` extent
//! that points into the file must lie inside it. That catches truncated
//! uploads and non-HEIF ISO-BMFF files (MP4, MOV) sharing the `ftyp` header.

use super::{ContainerDecoder, DecodeError};

const NAME: &str = "heif";

const HEIF_BRANDS: &[&[u8; 4]] = &[
    b"heic", b"heix", b"heim", b"heis", b"hevc", b"hevx", b"hevm", b"hevs", b"mif1", b"msf1",
    b"avif", b"avis",
];

pub struct HeifDecoder;

impl ContainerDecoder for HeifDecoder {
    fn name(&self) -> &'static str {
        NAME
    }

    fn sniff(&self, head: &[u8]) -> bool {
        if head.len() < 16 || &head[4..8] != b"ftyp" {
            return false;
        }
        let size = u32::from_be_bytes([head[0], head[1], head[2], head[3]]) as usize;
        let end = size.clamp(8, head.len());
        has_heif_brand(&head[8..end])
    }

    fn validate(&self, bytes: &[u8]) -> Result<(), DecodeError> {
        let top = read_boxes(bytes, 0, bytes.len())?;

        let ftyp = match top.first() {
            Some(b) if &b.kind == b"ftyp" => b,
            _ => return Err(err("missing leading ftyp box")),
        };
        if !has_heif_brand(&bytes[ftyp.body..ftyp.end]) {
            return Err(err("ftyp box carries no HEIF brand"));
        }

        let meta = find(&top, b"meta").ok_or_else(|| err("missing meta box"))?;
        // meta is a full box: version + flags precede the children
        let meta_children = read_boxes(bytes, full_box_body(meta)?, meta.end)?;

        let hdlr = find(&meta_children, b"hdlr").ok_or_else(|| err("missing hdlr box"))?;
        let mut r = ByteReader::new(&bytes[..hdlr.end], full_box_body(hdlr)?);
        r.skip(4)?; // pre_defined
        if r.take(4)? != b"pict" {
            return Err(err("meta handler is not 'pict'"));
        }

        let pitm = find(&meta_children, b"pitm").ok_or_else(|| err("missing pitm box"))?;
        let primary = parse_pitm(&bytes[..pitm.end], pitm)?;

        let iloc = find(&meta_children, b"iloc").ok_or_else(|| err("missing iloc box"))?;
        let items = parse_iloc(&bytes[..iloc.end], iloc)?;
        if !items.iter().any(|item| item.id == primary) {
            return Err(err(format!("primary item {} has no location", primary)));
        }

        let file_len = bytes.len() as u64;
        for item in items.iter().filter(|i| i.construction_method == 0) {
            for &(offset, length) in &item.extents {
                let start = item
                    .base_offset
                    .checked_add(offset)
                    .ok_or_else(|| err("extent offset overflow"))?;
                let end = start
                    .checked_add(length)
                    .ok_or_else(|| err("extent length overflow"))?;
                // length 0 means "to the end of the file"
                if start > file_len || end > file_len {
                    return Err(err(format!(
                        "item {} extent {}..{} lies outside the file ({} bytes)",
                        item.id, start, end, file_len
                    )));
                }
            }
        }

        Ok(())
    }
}

fn err(reason: impl Into<String>) -> DecodeError {
    DecodeError::new(NAME, reason)
}

fn has_heif_brand(ftyp_body: &[u8]) -> bool {
    // major_brand, minor_version, compatible_brands...
    ftyp_body
        .chunks_exact(4)
        .enumerate()
        .filter(|(i, _)| *i != 1)
        .any(|(_, brand)| HEIF_BRANDS.iter().any(|b| b.as_slice() == brand))
}

#[derive(Debug, Clone, Copy)]
struct BmffBox {
    kind: [u8; 4],
    /// Offset of the first byte after the header
    body: usize,
    end: usize,
}

fn find<'a>(boxes: &'a [BmffBox], kind: &[u8; 4]) -> Option<&'a BmffBox> {
    boxes.iter().find(|b| &b.kind == kind)
}

fn full_box_body(b: &BmffBox) -> Result<usize, DecodeError> {
    if b.end - b.body < 4 {
        return Err(err(format!(
            "{} box too short",
            String::from_utf8_lossy(&b.kind)
        )));
    }
    Ok(b.body + 4)
}

/// Read the boxes covering `data[start..end]` exactly.
fn read_boxes(data: &[u8], start: usize, end: usize) -> Result<Vec<BmffBox>, DecodeError> {
    let mut boxes = Vec::new();
    let mut pos = start;
    while pos < end {
        let mut r = ByteReader::new(&data[..end], pos);
        let size32 = r.u32()?;
        let kind: [u8; 4] = r
            .take(4)?
            .try_into()
            .map_err(|_| err("short box type"))?;
        let size = match size32 {
            0 => (end - pos) as u64,
            1 => r.u64()?,
            n => n as u64,
        };
        let header_len = (r.pos - pos) as u64;
        if size < header_len {
            return Err(err(format!(
                "{} box has invalid size {}",
                String::from_utf8_lossy(&kind),
                size
            )));
        }
        let box_end = usize::try_from(size)
            .ok()
            .and_then(|s| pos.checked_add(s))
            .filter(|e| *e <= end)
            .ok_or_else(|| {
                err(format!(
                    "{} box truncated ({} bytes declared, {} available)",
                    String::from_utf8_lossy(&kind),
                    size,
                    end - pos
                ))
            })?;
        boxes.push(BmffBox {
            kind,
            body: r.pos,
            end: box_end,
        });
        pos = box_end;
    }
    Ok(boxes)
}

fn parse_pitm(data: &[u8], pitm: &BmffBox) -> Result<u32, DecodeError> {
    let mut r = ByteReader::new(data, pitm.body);
    let version = r.u8()?;
    r.skip(3)?;
    if version == 0 {
        Ok(r.u16()? as u32)
    } else {
        r.u32()
    }
}

#[derive(Debug)]
struct ItemLocation {
    id: u32,
    construction_method: u8,
    base_offset: u64,
    /// (offset, length) pairs
    extents: Vec<(u64, u64)>,
}

fn parse_iloc(data: &[u8], iloc: &BmffBox) -> Result<Vec<ItemLocation>, DecodeError> {
    let mut r = ByteReader::new(data, iloc.body);
    let version = r.u8()?;
    if version > 2 {
        return Err(err(format!("unsupported iloc version {}", version)));
    }
    r.skip(3)?;

    let sizes = r.u8()?;
    let offset_size = sizes >> 4;
    let length_size = sizes & 0x0f;
    let sizes = r.u8()?;
    let base_offset_size = sizes >> 4;
    let index_size = if version >= 1 { sizes & 0x0f } else { 0 };

    let item_count = if version < 2 { r.u16()? as u32 } else { r.u32()? };
    let mut items = Vec::new();
    for _ in 0..item_count {
        let id = if version < 2 { r.u16()? as u32 } else { r.u32()? };
        let construction_method = if version >= 1 {
            (r.u16()? & 0x0f) as u8
        } else {
            0
        };
        r.skip(2)?; // data_reference_index
        let base_offset = r.uint(base_offset_size)?;
        let extent_count = r.u16()?;
        let mut extents = Vec::with_capacity(extent_count as usize);
        for _ in 0..extent_count {
            r.uint(index_size)?;
            let offset = r.uint(offset_size)?;
            let length = r.uint(length_size)?;
            extents.push((offset, length));
        }
        items.push(ItemLocation {
            id,
            construction_method,
            base_offset,
            extents,
        });
    }
    Ok(items)
}

/// Big-endian reader bounded by the slice it was created with.
struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|e| *e <= self.data.len())
            .ok_or_else(|| err("unexpected end of box"))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn skip(&mut self, n: usize) -> Result<(), DecodeError> {
        self.take(n).map(drop)
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_be_bytes([self.u8()?, self.u8()?]))
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        Ok(self.uint(4)? as u32)
    }

    fn u64(&mut self) -> Result<u64, DecodeError> {
        self.uint(8)
    }

    /// Unsigned integer of 0, 4 or 8 bytes (iloc field widths).
    fn uint(&mut self, size: u8) -> Result<u64, DecodeError> {
        match size {
            0 => Ok(0),
            1 | 2 | 4 | 8 => Ok(self
                .take(size as usize)?
                .iter()
                .fold(0u64, |acc, b| (acc << 8) | *b as u64)),
            n => Err(err(format!("invalid field size {}", n))),
        }
    }
}
