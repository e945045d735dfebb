pub mod analyzers;
pub mod artifacts;
pub mod config;
pub mod documents;
pub mod error;
pub mod fetch;
pub mod lms;
pub mod output;
pub mod pages;
pub mod roster;
pub mod services;
