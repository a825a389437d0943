pub mod app;
pub mod atomic;
pub mod audit;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod fs_util;
pub mod media;
pub mod output;
pub mod providers;
pub mod store;
