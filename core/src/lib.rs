extern crate self as batchwire_core;

pub mod log;
pub mod time;
