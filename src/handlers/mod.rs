//! HTTP handlers

pub mod health;
pub mod simulation;
pub mod attacks;
pub mod nodes;
pub mod stats;
pub mod stream;
