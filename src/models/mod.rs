pub mod prediction;
pub mod record;

pub use prediction::*;
pub use record::*;
