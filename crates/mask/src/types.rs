use bubble_common::{BoundingBox, RegionClass};
use image::{GrayImage, Luma};
use imageproc::{distance_transform::Norm, point::Point};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    algorithms::outline::largest_outline,
    error::{MaskError, Result},
};

/// Value written for pixels that belong to a region
pub const MASK_ON: Luma<u8> = Luma([255u8]);

/// Per-pixel membership of one region, same extent as the page it was detected on
#[derive(Debug, Clone, PartialEq)]
pub struct RegionMask(GrayImage);

impl RegionMask {
    /// Wrap a grayscale image; any non-zero pixel is part of the region
    pub fn new(mask: GrayImage) -> Self {
        Self(mask)
    }

    /// Rasterize a closed polygon into a mask of the given extent
    pub fn from_polygon(width: u32, height: u32, points: &[[i32; 2]]) -> Result<Self> {
        let mut vertices: Vec<Point<i32>> = Vec::with_capacity(points.len());
        for &[x, y] in points {
            let point = Point::new(x, y);
            if vertices.last() != Some(&point) {
                vertices.push(point);
            }
        }
        // imageproc expects an open ring
        while vertices.len() > 1 && vertices.first() == vertices.last() {
            vertices.pop();
        }
        if vertices.len() < 3 {
            return Err(MaskError::InvalidPolygon(format!(
                "need at least 3 distinct vertices, got {}",
                vertices.len()
            )));
        }

        let mut mask = GrayImage::new(width, height);
        imageproc::drawing::draw_polygon_mut(&mut mask, &vertices, MASK_ON);
        Ok(Self(mask))
    }

    /// Decode a PNG (or any supported format) mask image
    pub fn from_image_bytes(bytes: &[u8]) -> Result<Self> {
        let decoded = image::load_from_memory(bytes)?;
        Ok(Self(decoded.to_luma8()))
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn as_image(&self) -> &GrayImage {
        &self.0
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x < self.0.width() && y < self.0.height() && self.0.get_pixel(x, y)[0] > 0
    }

    /// Number of pixels set in the mask
    pub fn area(&self) -> usize {
        self.0.pixels().filter(|p| p[0] > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        !self.0.pixels().any(|p| p[0] > 0)
    }

    /// Tight box around the set pixels; `None` for empty or single-row/column masks
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let mut extent: Option<(u32, u32, u32, u32)> = None;
        for (x, y, pixel) in self.0.enumerate_pixels() {
            if pixel[0] == 0 {
                continue;
            }
            extent = Some(match extent {
                None => (x, x, y, y),
                Some((x_min, x_max, y_min, y_max)) => {
                    (x_min.min(x), x_max.max(x), y_min.min(y), y_max.max(y))
                }
            });
        }
        let (x_min, x_max, y_min, y_max) = extent?;
        BoundingBox::new(x_min, x_max, y_min, y_max).ok()
    }

    /// Grow the mask with a square structuring element of side `2 * radius + 1`
    pub fn dilate(&self, radius: u8) -> Self {
        if radius == 0 {
            return self.clone();
        }
        Self(imageproc::morphology::dilate(&self.0, Norm::LInf, radius))
    }
}

/// One region proposed by the detector (or drawn by a user)
#[derive(Debug, Clone)]
pub struct Region {
    pub class: RegionClass,
    /// Detector confidence in `[0, 1]`
    pub confidence: f32,
    pub mask: RegionMask,
}

impl Region {
    pub fn new(class: RegionClass, confidence: f32, mask: RegionMask) -> Result<Self> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(MaskError::InvalidConfidence(confidence));
        }
        Ok(Self {
            class,
            confidence,
            mask,
        })
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.mask.bounding_box()
    }

    /// Simplified outline of the region, suitable for manual editing
    pub fn to_polygon(&self, tolerance: f32) -> Option<UserPolygon> {
        let outline = largest_outline(&self.mask, tolerance)?;
        Some(UserPolygon {
            class: self.class,
            confidence: self.confidence,
            polygon: outline,
        })
    }
}

/// A manually edited region outline that can replace automatic detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct UserPolygon {
    pub class: RegionClass,
    #[serde(default = "UserPolygon::default_confidence")]
    pub confidence: f32,
    /// Vertices in pixel coordinates
    pub polygon: Vec<[i32; 2]>,
}

impl UserPolygon {
    fn default_confidence() -> f32 {
        1.0
    }
}

/// Where a [`Detection`] came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DetectionOrigin {
    Model,
    UserPolygons,
}

/// Regions found on one page, in detection order
#[derive(Debug, Clone)]
pub struct Detection {
    width: u32,
    height: u32,
    regions: Vec<Region>,
    origin: DetectionOrigin,
}

impl Detection {
    /// Build from the detector's output; every mask must match the page extent
    pub fn from_model(width: u32, height: u32, regions: Vec<Region>) -> Result<Self> {
        for region in &regions {
            if region.mask.width() != width || region.mask.height() != height {
                return Err(MaskError::SizeMismatch {
                    mask_width: region.mask.width(),
                    mask_height: region.mask.height(),
                    image_width: width,
                    image_height: height,
                });
            }
        }
        Ok(Self {
            width,
            height,
            regions,
            origin: DetectionOrigin::Model,
        })
    }

    /// Build from user-supplied outlines, rasterizing each polygon into a mask
    pub fn from_polygons(width: u32, height: u32, polygons: &[UserPolygon]) -> Result<Self> {
        let regions = polygons
            .iter()
            .map(|polygon| {
                let mask = RegionMask::from_polygon(width, height, &polygon.polygon)?;
                Region::new(polygon.class, polygon.confidence, mask)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            width,
            height,
            regions,
            origin: DetectionOrigin::UserPolygons,
        })
    }

    /// A page with nothing detected
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            regions: Vec::new(),
            origin: DetectionOrigin::Model,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn origin(&self) -> DetectionOrigin {
        self.origin
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Editable outlines for every region that has one
    pub fn to_polygons(&self, tolerance: f32) -> Vec<UserPolygon> {
        self.regions
            .iter()
            .filter_map(|region| region.to_polygon(tolerance))
            .collect()
    }
}
