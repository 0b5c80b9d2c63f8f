pub mod display;
pub mod format;
pub mod postprocess;
pub mod service;
