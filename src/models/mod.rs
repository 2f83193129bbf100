//! Data models

pub mod attack;
pub mod node;

pub use attack::*;
pub use node::*;
