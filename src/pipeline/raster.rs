//! Table image stitching and PNG encoding.
//!
//! A table spanning several pages is rendered one crop per page and the
//! crops are stacked top to bottom. PNG is used for the stored artifact
//! because it is lossless: the OCR pass reads the same pixels the
//! rasteriser produced.

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage};
use std::io::Cursor;
use tracing::debug;

/// Stack `b` under `a`.
///
/// Both images are brought to the wider of the two widths (heights are
/// kept), then pasted onto a white canvas of height
/// `height(a) + height(b) - overlap`, with `b` starting `overlap` rows above
/// the bottom of `a`. `overlap` is clamped to the shorter image's height.
pub fn merge_images(a: &DynamicImage, b: &DynamicImage, overlap: u32) -> DynamicImage {
    let width = a.width().max(b.width());
    let a = fit_width(a, width);
    let b = fit_width(b, width);

    let overlap = overlap.min(a.height()).min(b.height());
    let height = a.height() + b.height() - overlap;

    let mut canvas = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
    imageops::replace(&mut canvas, &a, 0, 0);
    imageops::replace(&mut canvas, &b, 0, i64::from(a.height() - overlap));

    debug!(
        "Merged table images → {}x{} px (overlap {})",
        width, height, overlap
    );
    DynamicImage::ImageRgb8(canvas)
}

fn fit_width(img: &DynamicImage, width: u32) -> RgbImage {
    if img.width() == width {
        img.to_rgb8()
    } else {
        img.resize_exact(width, img.height(), FilterType::Lanczos3)
            .to_rgb8()
    }
}

/// Left fold of [`merge_images`] over `images` in order. A single image is
/// returned untouched; an empty input yields `None`.
pub fn merge_all(images: Vec<DynamicImage>, overlap: u32) -> Option<DynamicImage> {
    let mut iter = images.into_iter();
    let first = iter.next()?;
    Some(iter.fold(first, |acc, next| merge_images(&acc, &next, overlap)))
}

/// Encode an image as PNG bytes.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!("Encoded table image → {} bytes PNG", buf.len());
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgba, RgbaImage};

    fn solid(w: u32, h: u32, rgb: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([rgb[0], rgb[1], rgb[2], 255])))
    }

    #[test]
    fn merge_dimensions_follow_overlap_rule() {
        let merged = merge_images(&solid(100, 40, [255, 0, 0]), &solid(80, 30, [0, 0, 255]), 5);
        assert_eq!(merged.dimensions(), (100, 65));
    }

    #[test]
    fn narrower_image_is_stretched_and_pasted_below() {
        let merged = merge_images(&solid(100, 10, [255, 0, 0]), &solid(50, 10, [0, 0, 255]), 0);
        assert_eq!(merged.get_pixel(0, 0).0[..3], [255, 0, 0]);
        assert_eq!(merged.get_pixel(99, 15).0[..3], [0, 0, 255]);
    }

    #[test]
    fn oversized_overlap_is_clamped() {
        let merged = merge_images(&solid(10, 10, [0, 0, 0]), &solid(10, 20, [0, 0, 0]), 50);
        assert_eq!(merged.dimensions(), (10, 20));
    }

    #[test]
    fn merge_all_folds_in_order() {
        let parts = vec![
            solid(10, 5, [255, 0, 0]),
            solid(10, 6, [0, 255, 0]),
            solid(10, 7, [0, 0, 255]),
        ];
        let merged = merge_all(parts, 0).expect("non-empty");
        assert_eq!(merged.dimensions(), (10, 18));
        assert_eq!(merged.get_pixel(0, 17).0[..3], [0, 0, 255]);
        assert!(merge_all(vec![], 0).is_none());
    }

    #[test]
    fn single_part_bypasses_merge() {
        let only = solid(7, 3, [1, 2, 3]);
        let out = merge_all(vec![only.clone()], 10).unwrap();
        assert_eq!(out, only);
    }

    #[test]
    fn encode_png_round_trips_dimensions() {
        let png = encode_png(&solid(12, 9, [9, 9, 9])).expect("encode");
        assert_eq!(&png[1..4], b"PNG");
        let decoded = image::load_from_memory(&png).expect("decode");
        assert_eq!(decoded.dimensions(), (12, 9));
    }
}
