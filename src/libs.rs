pub mod config;
pub mod core;
pub mod messenger;
pub mod presence;
pub mod storage;
