pub mod client;
pub mod commands;
pub mod config;
pub mod decode;
pub mod logger;
pub mod operations;
pub mod output;
pub mod record;
pub mod tags;
pub mod transport;
pub mod value;
