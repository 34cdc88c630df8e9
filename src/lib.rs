pub mod config;
pub mod error;
pub mod logging;
pub mod refine;
pub mod server;
pub mod session;
pub mod table;
