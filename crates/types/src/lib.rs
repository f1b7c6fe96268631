pub mod base_data;
pub mod cash;
pub mod config;
pub mod keys;
pub mod securities;
