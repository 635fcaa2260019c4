pub mod bounding_box;
pub mod coordinate_space;
pub mod error;
pub mod space_registry;
pub mod transform;
