pub mod date;
pub mod duration;
pub mod fuzzy;

pub use date::*;
pub use duration::*;
