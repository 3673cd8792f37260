//! Volume textures and the materials that render them.
//!
//! - [`VolumeTextureParams`]: voxel data and geometry
//! - [`load_raw_file`]: headerless raw volume files
//! - [`VolumeMaterial`]: data source plus ray-marching parameters, realized
//!   lazily into shader views

mod material;
mod params;
mod raw;

pub use material::*;
pub use params::*;
pub use raw::*;
