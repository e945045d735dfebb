//! HTTP plumbing shared by the remote clients.

mod basic;
mod client;
mod pagination;
pub mod auth;

pub use basic::BasicClient;
pub use client::HttpClient;
pub use pagination::next_link;
