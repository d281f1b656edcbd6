pub mod raster;

pub use raster::*;
