//! Components
//!
//! The rumor aggregate plus the ECS components the demo simulation attaches
//! to agents.

pub mod agent;
pub mod rumor;
pub mod world;

pub use agent::*;
pub use rumor::*;
pub use world::*;
