pub mod consts;
pub mod error;
pub mod frame;
pub mod filters;
pub mod sequence;
pub mod io;
pub mod validate;
pub mod naming;
pub mod metrics;
pub mod scored;
pub mod aggregate;
pub mod compose;
pub mod config;
