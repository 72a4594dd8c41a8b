pub mod command;
pub mod config;
pub mod error;
pub mod execute;
pub mod log;
pub mod normalize;
pub mod options;
pub mod package;
pub mod plan;
pub mod recipe;
pub mod source;
pub mod store;
pub mod upload;
pub mod validate;
