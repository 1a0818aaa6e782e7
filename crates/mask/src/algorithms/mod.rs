pub mod fill;
pub mod inpaint;
pub mod outline;

pub use fill::*;
pub use inpaint::*;
pub use outline::*;

use image::RgbImage;
use crate::{
    error::{MaskError, Result},
    traits::RegionEraser,
    types::Region,
};

/// Eraser that picks a strategy from the region class: flat backgrounds get
/// the `flat` eraser, text over artwork gets the `textured` one
#[derive(Debug, Clone, Default)]
pub struct ClassAwareEraser<F, T>
where
    F: RegionEraser,
    T: RegionEraser,
{
    pub flat: F,
    pub textured: T,
}

impl<F, T> ClassAwareEraser<F, T>
where
    F: RegionEraser,
    T: RegionEraser,
{
    pub fn new(flat: F, textured: T) -> Self {
        Self { flat, textured }
    }
}

impl<F, T> RegionEraser for ClassAwareEraser<F, T>
where
    F: RegionEraser,
    T: RegionEraser,
{
    fn erase(&self, image: &mut RgbImage, region: &Region) -> Result<()> {
        if region.class.has_flat_background() {
            self.flat.erase(image, region)
        } else {
            self.textured.erase(image, region)
        }
    }
}

/// Standard eraser: white fill for bubbles and boxes, inpainting for floating text
pub type StandardEraser = ClassAwareEraser<FlatFill, DilatedInpaint>;

pub(crate) fn check_extent(image: &RgbImage, region: &Region) -> Result<()> {
    if region.mask.width() != image.width() || region.mask.height() != image.height() {
        return Err(MaskError::SizeMismatch {
            mask_width: region.mask.width(),
            mask_height: region.mask.height(),
            image_width: image.width(),
            image_height: image.height(),
        });
    }
    Ok(())
}
