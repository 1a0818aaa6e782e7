use image::{GrayImage, Rgb, RgbImage};
use crate::{
    algorithms::check_extent,
    error::Result,
    traits::RegionEraser,
    types::Region,
};

/// Dilate the mask, then reconstruct the covered pixels from their surroundings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DilatedInpaint {
    /// Dilation radius in pixels (a radius of 2 is a 5x5 kernel)
    pub dilation: u8,
    /// Neighbourhood radius used when reconstructing a pixel
    pub radius: u32,
}

impl Default for DilatedInpaint {
    fn default() -> Self {
        Self {
            dilation: 2,
            radius: 3,
        }
    }
}

impl RegionEraser for DilatedInpaint {
    fn erase(&self, image: &mut RgbImage, region: &Region) -> Result<()> {
        check_extent(image, region)?;

        let grown = region.mask.dilate(self.dilation);
        inpaint(image, grown.as_image(), self.radius);
        Ok(())
    }
}

/// Fill masked pixels layer by layer from the outside in.
///
/// Each pass reconstructs the unknown pixels that touch a known one, using an
/// inverse-square-distance average of the known pixels within `radius`. Pixels
/// are only marked known once the whole layer is written, so a layer never
/// reads from itself. Stops early when nothing is known at all.
pub fn inpaint(image: &mut RgbImage, mask: &GrayImage, radius: u32) {
    let (width, height) = image.dimensions();
    let radius = radius.max(1) as i64;
    let idx = |x: u32, y: u32| (y as usize) * (width as usize) + x as usize;

    let mut known: Vec<bool> = (0..height)
        .flat_map(|y| (0..width).map(move |x| (x, y)))
        .map(|(x, y)| mask.get_pixel(x, y)[0] == 0)
        .collect();

    let mut remaining: Vec<(u32, u32)> = (0..height)
        .flat_map(|y| (0..width).map(move |x| (x, y)))
        .filter(|&(x, y)| !known[idx(x, y)])
        .collect();

    while !remaining.is_empty() {
        let mut layer: Vec<(u32, u32, Rgb<u8>)> = Vec::new();
        let mut deferred = Vec::with_capacity(remaining.len());

        for &(x, y) in &remaining {
            let mut weight_sum = 0.0f32;
            let mut channels = [0.0f32; 3];
            let mut touches_known = false;

            for dy in -radius..=radius {
                for dx in -radius..=radius {
                    let distance_sq = (dx * dx + dy * dy) as f32;
                    if distance_sq == 0.0 || distance_sq > (radius * radius) as f32 {
                        continue;
                    }
                    let nx = x as i64 + dx;
                    let ny = y as i64 + dy;
                    if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                        continue;
                    }
                    let (nx, ny) = (nx as u32, ny as u32);
                    if !known[idx(nx, ny)] {
                        continue;
                    }
                    if dx.abs() <= 1 && dy.abs() <= 1 {
                        touches_known = true;
                    }
                    let weight = 1.0 / distance_sq;
                    let pixel = image.get_pixel(nx, ny);
                    for (channel, value) in channels.iter_mut().zip(pixel.0) {
                        *channel += weight * value as f32;
                    }
                    weight_sum += weight;
                }
            }

            if touches_known && weight_sum > 0.0 {
                let color = channels.map(|c| (c / weight_sum).round().clamp(0.0, 255.0) as u8);
                layer.push((x, y, Rgb(color)));
            } else {
                deferred.push((x, y));
            }
        }

        if layer.is_empty() {
            tracing::debug!("Inpainting left {} pixels with no known neighbour", deferred.len());
            break;
        }
        for (x, y, color) in layer {
            image.put_pixel(x, y, color);
            known[idx(x, y)] = true;
        }
        remaining = deferred;
    }
}
