pub mod error;
pub mod merger;
pub mod topology;
pub mod union_find;

#[cfg(target_arch = "wasm32")]
pub mod wasm;


pub use error::{MergeError, Result};
pub use merger::{GroupFailure, MergeOutput, MergedFeature, Merger, Properties, PropertyPolicy};
