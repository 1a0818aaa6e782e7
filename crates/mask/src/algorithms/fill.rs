use image::{Rgb, RgbImage};
use crate::{
    algorithms::check_extent,
    error::Result,
    traits::RegionEraser,
    types::Region,
};

/// Paint every masked pixel with a solid color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlatFill {
    pub color: Rgb<u8>,
}

impl Default for FlatFill {
    fn default() -> Self {
        Self {
            color: Rgb([255, 255, 255]),
        }
    }
}

impl FlatFill {
    pub fn new(color: [u8; 3]) -> Self {
        Self { color: Rgb(color) }
    }
}

impl RegionEraser for FlatFill {
    fn erase(&self, image: &mut RgbImage, region: &Region) -> Result<()> {
        check_extent(image, region)?;

        for (x, y, pixel) in region.mask.as_image().enumerate_pixels() {
            if pixel[0] > 0 {
                image.put_pixel(x, y, self.color);
            }
        }
        Ok(())
    }
}
