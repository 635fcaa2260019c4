pub mod admission_gate;
pub mod cycle_error;
pub mod detection_mapper;
pub mod frame_scheduler;
pub mod infrastructure;
pub mod pipeline_logger;
pub mod result_sink;
