//! User registration records.
//!
//! Modeled for parity with the `configs` document collection, but not read
//! anywhere on the crawl path: the core loop is driven by `integrations()`,
//! not by this collection. Registration of new users/integrations happens
//! through some external flow this crate does not implement.

use serde::{Deserialize, Serialize};

use super::integration::Integration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    pub name: String,
    pub email: String,
    pub integrations: Vec<Integration>,
}
