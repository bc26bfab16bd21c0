//! Synthetic images and records shared by the unit tests

use chrono::Utc;
use image::{ImageBuffer, ImageFormat, Rgb};
use pawprint_fp::{FingerprintRecord, Species, SubjectId, View};
use std::collections::HashMap;
use std::io::Cursor;

/// PNG bytes of a single-color image
pub fn solid_png(color: [u8; 3], width: u32, height: u32) -> Vec<u8> {
    let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_pixel(width, height, Rgb(color));
    encode_png(img)
}

/// PNG bytes of an image with a smooth color gradient
pub fn gradient_png(width: u32, height: u32) -> Vec<u8> {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            ((x + y) * 127 / (width + height).max(1)) as u8,
        ])
    });
    encode_png(img)
}

fn encode_png(img: ImageBuffer<Rgb<u8>, Vec<u8>>) -> Vec<u8> {
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, ImageFormat::Png).unwrap();
    bytes.into_inner()
}

/// The same image for every view
pub fn uniform_views(bytes: &[u8]) -> HashMap<View, Vec<u8>> {
    View::ALL.iter().map(|v| (*v, bytes.to_vec())).collect()
}

/// Record with hand-written vectors for metric and store tests
pub fn record_with(
    id: &str,
    species: Species,
    version: &str,
    views: &[(View, Vec<f32>)],
) -> FingerprintRecord {
    FingerprintRecord {
        subject_id: SubjectId::new(id).unwrap(),
        species,
        lifecycle_status: "lost".to_string(),
        generated_at: Utc::now(),
        extractor_version: version.to_string(),
        views: views.iter().cloned().collect(),
    }
}

/// Complete record whose views all carry `vector`
pub fn complete_record(id: &str, species: Species, version: &str, vector: Vec<f32>) -> FingerprintRecord {
    let views: Vec<_> = View::ALL.iter().map(|v| (*v, vector.clone())).collect();
    record_with(id, species, version, &views)
}
