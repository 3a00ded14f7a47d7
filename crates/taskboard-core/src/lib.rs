//! # taskboard-core
//!
//! Foundation types for the taskboard real-time layer.
//!
//! This crate provides the shared vocabulary that the channel and its
//! consumers depend on:
//!
//! - **Domain records**: [`model::Project`], [`model::Task`] and their field patches
//! - **Events**: [`events::Event`] with the typed [`events::EventBody`] payloads
//! - **Credentials**: [`auth::CredentialStore`] contract, [`auth::Role`] ordering
//! - **Retry**: [`retry::BackoffPolicy`] and backoff calculation
//! - **Logging**: [`logging::init_subscriber`] for the `tracing` stack
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other taskboard crates.

#![deny(unsafe_code)]

pub mod auth;
pub mod events;
pub mod logging;
pub mod model;
pub mod retry;

pub use auth::{Credential, CredentialStore, Identity, MemoryCredentialStore, Role, has_permission};
pub use events::{Event, EventBody, EventKind, Timestamp, now_ms};
pub use model::{Project, ProjectPatch, ProjectStatus, Task, TaskPatch, TaskPriority, TaskStatus};
pub use retry::BackoffPolicy;
