#[macro_use]
extern crate log;
#[macro_use]
extern crate derive_builder;
#[macro_use]
extern crate lazy_static;

pub mod annotator;
pub mod cache;
pub mod classifier;
pub mod control;
pub mod document;
pub mod scanner;
pub mod settings;
pub mod types;
pub mod utils;
