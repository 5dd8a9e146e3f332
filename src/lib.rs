//! A multi-platform crawler that discovers and records competitive
//! programming submissions across supported judges (Codeforces, CSES).

pub mod backoff;
pub mod config;
pub mod crawler;
pub mod domain;
pub mod error;
pub mod identity;
pub mod manager;
pub mod paste;
pub mod platforms;
pub mod rate_limit;
pub mod store;

pub use config::Config;
pub use crawler::Crawler;
pub use error::{CrawlerError, PassError, UploadError};
pub use manager::Manager;
pub use store::{Store, StoreError};
