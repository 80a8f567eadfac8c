// Library for tests to access modules

pub mod aggregator;
pub mod archive;
pub mod artifacts;
pub mod config;
pub mod fetcher;
pub mod health_repo;
pub mod history_repo;
pub mod lock;
pub mod models;
pub mod publisher;
pub mod registry;
pub mod series;
pub mod status_parser;
pub mod version;
pub mod worker;
