pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod errors;
pub mod model;
pub mod normalize;
pub mod parse;
pub mod storage;
