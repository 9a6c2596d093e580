//! Time effect handlers

pub mod real;
pub mod simulated;

pub use real::SystemTimeHandler;
pub use simulated::SimulatedTimeHandler;
