pub mod stage;
pub mod display;
pub mod catalog;
pub mod order;
pub mod bus;

pub use stage::*;
pub use display::*;
pub use catalog::*;
pub use order::*;
pub use bus::*;
