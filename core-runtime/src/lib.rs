//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the sync core:
//! - Logging and tracing infrastructure
//! - Configuration management and host bridge wiring
//! - Event bus for sync lifecycle notifications
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the other crates depend on. It
//! establishes the logging conventions, the fail-fast configuration builder
//! and the event broadcasting used throughout the system.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder, FeatureFlags};
pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus, EventStream, QueueEvent, SyncEvent};
