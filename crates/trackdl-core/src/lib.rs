pub mod config;
pub mod logging;

pub mod batch;
pub mod browser;
pub mod error;
pub mod fetcher;
pub mod ledger;
pub mod model;
pub mod naming;
pub mod progress;
pub mod resolver;
