pub mod polygons;

pub use polygons::*;
