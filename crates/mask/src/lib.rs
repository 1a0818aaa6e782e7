//! # Region Mask Library
//!
//! Per-pixel masks for the text regions of a comic page, and the algorithms
//! that work on them:
//!
//! - **Detections**: regions proposed by a detector, or rasterized from
//!   user-edited polygons
//! - **Erasers**: trait-based removal of the original lettering, flat fill
//!   for bubbles and dilation plus inpainting for text over artwork
//! - **Outlines**: simplified polygons of a mask, for manual editing
//! - **IO**: polygon sets as JSON, base64 PNG mask decoding
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bubble_common::RegionClass;
//! use mask::{Detection, RegionEraser, StandardEraser, UserPolygon};
//!
//! let mut page = image::open("page.png")?.to_rgb8();
//! let polygons = vec![UserPolygon {
//!     class: RegionClass::Bubble,
//!     confidence: 1.0,
//!     polygon: vec![[10, 10], [120, 10], [120, 60], [10, 60]],
//! }];
//!
//! let detection = Detection::from_polygons(page.width(), page.height(), &polygons)?;
//! let eraser = StandardEraser::default();
//! for region in detection.regions() {
//!     eraser.erase(&mut page, region)?;
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Core modules
pub mod error;
pub mod types;
pub mod traits;
pub mod algorithms;
pub mod io;

// Re-exports for convenience
pub use error::{MaskError, Result};
pub use types::{Detection, DetectionOrigin, Region, RegionMask, UserPolygon};
pub use traits::*;
pub use algorithms::*;
pub use io::*;

#[cfg(test)]
mod tests {
    use super::*;
    use bubble_common::{BoundingBox, RegionClass};
    use image::{GrayImage, Luma, Rgb, RgbImage};

    fn square_mask(width: u32, height: u32, from: u32, to: u32) -> RegionMask {
        let mut img = GrayImage::new(width, height);
        for y in from..to {
            for x in from..to {
                img.put_pixel(x, y, Luma([255u8]));
            }
        }
        RegionMask::new(img)
    }

    fn rectangle() -> Vec<[i32; 2]> {
        vec![[10, 10], [40, 10], [40, 30], [10, 30]]
    }

    #[test]
    fn test_polygon_rasterization() {
        let mask = RegionMask::from_polygon(64, 48, &rectangle()).expect("Should rasterize");
        assert_eq!(
            mask.bounding_box(),
            Some(BoundingBox::new(10, 40, 10, 30).unwrap())
        );
        assert!(mask.contains(25, 20));
        assert!(!mask.contains(5, 5));
    }

    #[test]
    fn test_closed_ring_is_accepted() {
        let mut closed = rectangle();
        closed.push([10, 10]);
        let mask = RegionMask::from_polygon(64, 48, &closed).expect("Should accept a closed ring");
        assert!(!mask.is_empty());
    }

    #[test]
    fn test_degenerate_polygon_rejected() {
        let result = RegionMask::from_polygon(64, 48, &[[1, 1], [5, 5], [1, 1]]);
        assert!(matches!(result, Err(MaskError::InvalidPolygon(_))));
    }

    #[test]
    fn test_bounding_box_of_degenerate_masks() {
        assert!(RegionMask::new(GrayImage::new(20, 20)).bounding_box().is_none());

        let mut line = GrayImage::new(20, 20);
        for x in 2..15 {
            line.put_pixel(x, 7, Luma([255u8]));
        }
        assert!(RegionMask::new(line).bounding_box().is_none());
    }

    #[test]
    fn test_dilation_grows_mask() {
        let mask = square_mask(40, 40, 10, 20);
        let grown = mask.dilate(2);
        assert_eq!(
            grown.bounding_box(),
            Some(BoundingBox::new(8, 21, 8, 21).unwrap())
        );
        assert!(grown.area() > mask.area());
        assert_eq!(mask.dilate(0), mask);
    }

    #[test]
    fn test_detection_rejects_mismatched_masks() {
        let region = Region::new(RegionClass::Bubble, 0.9, square_mask(30, 30, 5, 10)).unwrap();
        let result = Detection::from_model(40, 30, vec![region]);
        assert!(matches!(result, Err(MaskError::SizeMismatch { .. })));
    }

    #[test]
    fn test_region_confidence_validated() {
        let result = Region::new(RegionClass::Bubble, 1.5, square_mask(10, 10, 2, 5));
        assert!(matches!(result, Err(MaskError::InvalidConfidence(_))));
    }

    #[test]
    fn test_detection_from_polygons() {
        let polygons = vec![UserPolygon {
            class: RegionClass::NarrationBox,
            confidence: 1.0,
            polygon: rectangle(),
        }];
        let detection = Detection::from_polygons(64, 48, &polygons).expect("Should build detection");
        assert_eq!(detection.origin(), DetectionOrigin::UserPolygons);
        assert_eq!(detection.len(), 1);
        assert_eq!(detection.regions()[0].class, RegionClass::NarrationBox);
    }

    #[test]
    fn test_flat_fill_only_touches_mask() {
        let mut page = RgbImage::from_pixel(30, 30, Rgb([10, 20, 30]));
        let region = Region::new(RegionClass::Bubble, 0.9, square_mask(30, 30, 5, 15)).unwrap();

        FlatFill::default().erase(&mut page, &region).expect("Should fill");
        assert_eq!(page.get_pixel(8, 8), &Rgb([255, 255, 255]));
        assert_eq!(page.get_pixel(20, 20), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_inpaint_restores_uniform_background() {
        let background = Rgb([80, 120, 160]);
        let mut page = RgbImage::from_pixel(40, 40, background);
        for y in 15..25 {
            for x in 15..25 {
                page.put_pixel(x, y, Rgb([0, 0, 0]));
            }
        }
        let region = Region::new(RegionClass::FloatingText, 0.8, square_mask(40, 40, 15, 25)).unwrap();

        DilatedInpaint::default().erase(&mut page, &region).expect("Should inpaint");
        assert!(page.pixels().all(|p| *p == background));
    }

    #[test]
    fn test_class_aware_eraser() {
        let mut page = RgbImage::from_pixel(30, 30, Rgb([50, 50, 50]));
        let bubble = Region::new(RegionClass::Bubble, 0.9, square_mask(30, 30, 2, 8)).unwrap();
        let floating = Region::new(RegionClass::FloatingText, 0.9, square_mask(30, 30, 18, 24)).unwrap();

        let eraser = StandardEraser::default();
        eraser.erase(&mut page, &bubble).expect("Should erase bubble");
        eraser.erase(&mut page, &floating).expect("Should erase floating text");

        assert_eq!(page.get_pixel(4, 4), &Rgb([255, 255, 255]));
        assert_eq!(page.get_pixel(20, 20), &Rgb([50, 50, 50]));
    }

    #[test]
    fn test_eraser_checks_extent() {
        let mut page = RgbImage::new(20, 20);
        let region = Region::new(RegionClass::Bubble, 0.9, square_mask(30, 30, 2, 8)).unwrap();
        assert!(FlatFill::default().erase(&mut page, &region).is_err());
    }

    #[test]
    fn test_outline_round_trip() {
        let mask = RegionMask::from_polygon(64, 48, &rectangle()).unwrap();
        let outline = largest_outline(&mask, 1.0).expect("Should find an outline");
        assert!(outline.len() >= 3 && outline.len() <= 8, "got {:?}", outline);

        let redrawn = RegionMask::from_polygon(64, 48, &outline).unwrap();
        assert_eq!(redrawn.bounding_box(), mask.bounding_box());
    }

    #[test]
    fn test_polygon_set_file_round_trip() {
        let region = Region::new(
            RegionClass::Bubble,
            0.7,
            RegionMask::from_polygon(64, 48, &rectangle()).unwrap(),
        )
        .unwrap();
        let detection = Detection::from_model(64, 48, vec![region]).unwrap();
        let set = PolygonSet::from_detection(&detection, 1.0);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.polygons.json");
        set.save(&path).expect("Should save polygons");
        let loaded = PolygonSet::load(&path).expect("Should load polygons");
        assert_eq!(loaded, set);

        let rebuilt = loaded.to_detection().expect("Should rasterize polygons");
        assert_eq!(rebuilt.regions()[0].class, RegionClass::Bubble);
        assert_eq!(rebuilt.regions()[0].confidence, 0.7);
    }

    #[test]
    fn test_user_polygon_default_confidence() {
        let polygon: UserPolygon = serde_json::from_str(
            r#"{"class":"floating_text","polygon":[[0,0],[4,0],[4,4]]}"#,
        )
        .unwrap();
        assert_eq!(polygon.confidence, 1.0);
        assert_eq!(polygon.class, RegionClass::FloatingText);
    }

    #[test]
    fn test_decode_base64_mask() {
        use base64::Engine;

        let mask = square_mask(12, 12, 3, 9);
        let mut png = Vec::new();
        mask.as_image()
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let encoded = base64::engine::general_purpose::STANDARD.encode(&png);

        let decoded = decode_base64_mask(&encoded).expect("Should decode mask");
        assert_eq!(decoded, mask);

        let with_prefix = format!("data:image/png;base64,{}", encoded);
        assert_eq!(decode_base64_mask(&with_prefix).unwrap(), mask);
        assert!(decode_base64_mask("not base64 !!").is_err());
    }
}
