//! Fixture builders shared by unit tests.

use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use chrono::{Local, NaiveDate};
use image::{ImageFormat, Rgb, RgbImage};

use crate::Report;

pub const HEIF_PAYLOAD: &[u8] = b"not really hevc but long enough";

fn encode(format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_pixel(8, 8, Rgb([200, 120, 40]));
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), format).unwrap();
    out
}

pub fn plain_jpeg() -> Vec<u8> {
    encode(ImageFormat::Jpeg)
}

pub fn png_bytes() -> Vec<u8> {
    encode(ImageFormat::Png)
}

/// Little-endian TIFF with a single ASCII entry in IFD0.
fn tiff_with_ascii(tag: u16, value: &str) -> Vec<u8> {
    let mut value = value.as_bytes().to_vec();
    value.push(0);
    assert!(value.len() > 4, "fixture only supports out-of-line values");

    let mut t = Vec::new();
    t.extend_from_slice(b"II");
    t.extend_from_slice(&42u16.to_le_bytes());
    t.extend_from_slice(&8u32.to_le_bytes());
    // IFD0: 1 entry
    t.extend_from_slice(&1u16.to_le_bytes());
    t.extend_from_slice(&tag.to_le_bytes());
    t.extend_from_slice(&2u16.to_le_bytes()); // ASCII
    t.extend_from_slice(&(value.len() as u32).to_le_bytes());
    t.extend_from_slice(&26u32.to_le_bytes());
    t.extend_from_slice(&0u32.to_le_bytes()); // no next IFD
    t.extend_from_slice(&value);
    t
}

/// A decodable JPEG carrying an EXIF APP1 segment with one ASCII tag.
pub fn jpeg_with_exif(tag: u16, value: &str) -> Vec<u8> {
    let jpeg = plain_jpeg();
    let mut payload = b"Exif\0\0".to_vec();
    payload.extend_from_slice(&tiff_with_ascii(tag, value));

    let mut out = jpeg[..2].to_vec(); // SOI
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(&payload);
    out.extend_from_slice(&jpeg[2..]);
    out
}

/// JPEG with EXIF tag 306 (DateTime) set to `value`.
pub fn jpeg_with_datetime(value: &str) -> Vec<u8> {
    jpeg_with_exif(0x0132, value)
}

fn bmff_box(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut b = ((body.len() + 8) as u32).to_be_bytes().to_vec();
    b.extend_from_slice(kind);
    b.extend_from_slice(body);
    b
}

fn versioned_box(kind: &[u8; 4], version: u8, body: &[u8]) -> Vec<u8> {
    let mut full = vec![version, 0, 0, 0];
    full.extend_from_slice(body);
    bmff_box(kind, &full)
}

fn full_box(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
    versioned_box(kind, 0, body)
}

/// Item id, `infe` item type and the payload stored for it in `mdat`.
type HeifItem<'a> = (u16, &'a [u8; 4], &'a [u8]);

fn heif_meta(items: &[HeifItem], first_offset: u32) -> Vec<u8> {
    let mut hdlr = vec![0u8; 4];
    hdlr.extend_from_slice(b"pict");
    hdlr.extend_from_slice(&[0u8; 13]); // reserved + empty name

    let pitm = items[0].0.to_be_bytes();

    let mut iinf = (items.len() as u16).to_be_bytes().to_vec();
    for &(id, kind, _) in items {
        let mut infe = id.to_be_bytes().to_vec();
        infe.extend_from_slice(&0u16.to_be_bytes()); // item_protection_index
        infe.extend_from_slice(kind);
        infe.push(0); // empty item_name
        iinf.extend(versioned_box(b"infe", 2, &infe));
    }

    let mut iloc = vec![0x44, 0x00]; // offset_size 4, length_size 4, base_offset_size 0
    iloc.extend_from_slice(&(items.len() as u16).to_be_bytes());
    let mut offset = first_offset;
    for &(id, _, data) in items {
        iloc.extend_from_slice(&id.to_be_bytes());
        iloc.extend_from_slice(&0u16.to_be_bytes()); // data_reference_index
        iloc.extend_from_slice(&1u16.to_be_bytes()); // extent_count
        iloc.extend_from_slice(&offset.to_be_bytes());
        iloc.extend_from_slice(&(data.len() as u32).to_be_bytes());
        offset += data.len() as u32;
    }

    let mut children = full_box(b"hdlr", &hdlr);
    children.extend(full_box(b"pitm", &pitm));
    children.extend(full_box(b"iinf", &iinf));
    children.extend(full_box(b"iloc", &iloc));
    full_box(b"meta", &children)
}

/// HEIF layout: ftyp, meta (hdlr, pitm, iinf, iloc) and an mdat holding the
/// items back to back. The first item is the primary one.
fn heif_with_items(brand: &[u8; 4], items: &[HeifItem]) -> Vec<u8> {
    let mut ftyp_body = brand.to_vec();
    ftyp_body.extend_from_slice(&0u32.to_be_bytes());
    ftyp_body.extend_from_slice(brand);
    if brand == b"heic" {
        ftyp_body.extend_from_slice(b"mif1");
    }
    let ftyp = bmff_box(b"ftyp", &ftyp_body);

    let meta_len = heif_meta(items, 0).len();
    let first_offset = (ftyp.len() + meta_len + 8) as u32;
    let mdat: Vec<u8> = items.iter().flat_map(|&(_, _, data)| data.to_vec()).collect();

    let mut out = ftyp;
    out.extend(heif_meta(items, first_offset));
    out.extend(bmff_box(b"mdat", &mdat));
    out
}

/// Minimal HEIF with a single coded image item and no Exif.
pub fn heif_bytes(brand: &[u8; 4]) -> Vec<u8> {
    heif_with_items(brand, &[(1, b"hvc1", HEIF_PAYLOAD)])
}

/// HEIC whose Exif item carries tag 306 (DateTime) set to `value`.
pub fn heic_with_datetime(value: &str) -> Vec<u8> {
    // Exif data block: offset to the TIFF header, then the TIFF itself
    let mut exif = 0u32.to_be_bytes().to_vec();
    exif.extend_from_slice(&tiff_with_ascii(0x0132, value));
    heif_with_items(
        b"heic",
        &[(1, b"hvc1", HEIF_PAYLOAD), (2, b"Exif", exif.as_slice())],
    )
}

/// Noon local time on the given day, as a filesystem timestamp.
pub fn local_noon(year: i32, month: u32, day: u32) -> SystemTime {
    let dt = NaiveDate::from_ymd_opt(year, month, day)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
        .and_local_timezone(Local)
        .single()
        .unwrap();
    SystemTime::from(dt)
}

/// Collects every report event. The closure owns its sink so it is `'static`,
/// as `ReportCallback` requires.
pub fn recorder() -> (Arc<Mutex<Vec<Report>>>, impl Fn(&Report) + Send + Sync + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (seen, move |r: &Report| sink.lock().unwrap().push(r.clone()))
}
