//! Request handlers.

pub mod health;
pub mod highlight;

pub use health::*;
pub use highlight::*;
