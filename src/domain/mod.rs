//! The crawler's domain model: platforms, integrations, problems and
//! submissions, as described by the data model this crate implements.

pub mod integration;
pub mod platform;
pub mod problem;
pub mod submission;
pub mod user_config;

pub use integration::{CodeforcesIntegration, CsesIntegration, Integration};
pub use platform::Platform;
pub use problem::Problem;
pub use submission::{CrawledSubmission, Submission, Verdict};
pub use user_config::UserConfig;
