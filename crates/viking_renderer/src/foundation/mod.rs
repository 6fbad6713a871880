//! Foundation module - math aliases and wall-clock helpers

pub mod math;
pub mod time;
