// Core data models for the kitchen board
// These structs represent the domain entities

pub mod stage;
pub mod display;
pub mod order;

pub use stage::*;
pub use display::*;
pub use order::*;
