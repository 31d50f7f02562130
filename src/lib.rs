// Library surface for headless/integration tests and reuse.
// Terminal rendering stays in the binary (main.rs, ui.rs).
pub mod app_dirs;
pub mod config;
pub mod db;
pub mod demo;
pub mod error;
pub mod generate;
pub mod ghost;
pub mod logging;
pub mod matcher;
pub mod model;
pub mod runtime;
pub mod session;
pub mod session_log;
pub mod store;
pub mod timer;
pub mod typing_policy;
pub mod util;
