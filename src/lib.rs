#[macro_use]
extern crate log;
#[macro_use]
extern crate derive_builder;
#[macro_use]
extern crate lazy_static;

pub mod browser_controller;
pub mod extraction;
pub mod extractor;
pub mod runner;
pub mod sheet;
pub mod types;
pub mod utils;
