pub mod display;
pub mod product;

pub use display::filter_orders;
pub use product::{tally_products, ProductFocus, ProductTally};
