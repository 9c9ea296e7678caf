//! Process-level infrastructure shared by the server binary and the web layer:
//! command line / environment configuration and console logging.

pub mod config;
pub mod logging;
