pub mod classified_result;
pub mod config;
pub mod constants;
pub mod frame;
