pub mod detection;
pub mod geometry;
pub mod imaging;
pub mod pipeline;
pub mod shared;
