use geo::Simplify;
use geo_types::{Coord, LineString};
use imageproc::contours::{BorderType, find_contours};

use crate::types::RegionMask;

/// Outer border of the largest connected component, simplified with Douglas-Peucker.
///
/// Returns an open ring (the closing vertex is dropped), or `None` when the
/// mask is empty or collapses to fewer than three vertices.
pub fn largest_outline(mask: &RegionMask, tolerance: f32) -> Option<Vec<[i32; 2]>> {
    let contours = find_contours::<i32>(mask.as_image());
    let outer = contours
        .into_iter()
        .filter(|contour| contour.border_type == BorderType::Outer)
        .max_by_key(|contour| contour.points.len())?;

    let mut coords: Vec<Coord<f64>> = outer
        .points
        .iter()
        .map(|p| Coord {
            x: p.x as f64,
            y: p.y as f64,
        })
        .collect();
    if let Some(&first) = coords.first() {
        coords.push(first);
    }

    let simplified = LineString::new(coords).simplify(&(tolerance.max(0.0) as f64));
    let mut vertices: Vec<[i32; 2]> = simplified
        .coords()
        .map(|c| [c.x.round() as i32, c.y.round() as i32])
        .collect();
    vertices.dedup();
    if vertices.len() > 1 && vertices.first() == vertices.last() {
        vertices.pop();
    }

    (vertices.len() >= 3).then_some(vertices)
}
