#[macro_use]
extern crate log;
#[macro_use]
extern crate derive_builder;

pub mod browser_controller;
pub mod crawler;
pub mod links;
pub mod paginator;
pub mod runner;
pub mod store;
pub mod types;
pub mod utils;
