pub mod props;
pub mod types;

pub use types::*;
