pub mod resampler;
pub mod scratch_pool;
