// Library for tests to access modules

pub mod config;
pub mod executor;
pub mod models;
pub mod probes;
pub mod sampler;
pub mod services;
pub mod store;
pub mod vault;
