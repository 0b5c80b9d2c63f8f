pub mod adapter;
pub mod decoding;
pub mod generation_config;
pub mod logits;
pub mod models;
pub mod text_pipeline;
