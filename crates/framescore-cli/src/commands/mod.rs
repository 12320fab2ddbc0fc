pub mod banding;
pub mod config;
pub mod info;
pub mod plot;
pub mod score;
pub mod stats;
