//! Upgrade workflow

pub mod fsm;
pub mod install;
pub mod progress;
pub mod reboot;
pub mod report;
