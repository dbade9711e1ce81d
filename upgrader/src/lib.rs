//! swupgrade library
//!
//! Drives a single network device through a software upgrade: package
//! pre-flight, session open, install with live progress, conditional reboot.

pub mod app;
pub mod device;
pub mod errors;
pub mod filesys;
pub mod logs;
pub mod package;
pub mod upgrade;
pub mod utils;
