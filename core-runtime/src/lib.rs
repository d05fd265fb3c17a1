//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the player core:
//! - Logging and tracing setup
//! - Configuration builder and player settings
//! - Event bus
//!
//! Other crates depend on this one for the conventions they share: how
//! events are broadcast, how logging is filtered and where configuration
//! comes from.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder, NavigationPolicy, PlayerSettings};
pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus, EventStream};
