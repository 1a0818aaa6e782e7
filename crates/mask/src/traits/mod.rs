use image::RgbImage;
use crate::{error::Result, types::Region};

/// Trait for removing the original lettering of a region from the page
pub trait RegionEraser: Send + Sync {
    /// Erase the region in place; the region mask must match the image extent
    fn erase(&self, image: &mut RgbImage, region: &Region) -> Result<()>;
}

impl<E: RegionEraser + ?Sized> RegionEraser for Box<E> {
    fn erase(&self, image: &mut RgbImage, region: &Region) -> Result<()> {
        (**self).erase(image, region)
    }
}
