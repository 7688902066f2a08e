//! HTTP adapters built on reqwest

pub mod client;
pub mod refresher;

pub use client::{HttpClient, HttpClientBuilder};
pub use refresher::HttpSessionRefresher;
