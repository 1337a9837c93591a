pub mod cluster;
pub mod color;
pub mod contour;
pub mod frame;
pub mod range_mask;
pub mod region;
