mod account;
mod analysis;
mod case_library;
mod cme_topic;
mod page;
mod stats;
mod token;

pub use account::*;
pub use analysis::*;
pub use case_library::*;
pub use cme_topic::*;
pub use page::*;
pub use stats::*;
pub use token::*;

use serde::{Deserialize, Deserializer};

/// Distinguishes an absent field (`None`) from an explicit `null`
/// (`Some(None)`) in partial updates.
pub(crate) fn deserialize_some<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}
