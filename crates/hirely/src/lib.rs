//! Job board lifecycle coordination.
//!
//! Listings are created as drafts, activated by a verified payment webhook, and
//! expired by a durable timer started at creation. New job seekers receive a
//! periodic digest of fresh listings.

pub mod board;
pub mod config;
pub mod error;
pub mod notifications;
pub mod payments;
pub mod persistence;
pub mod telemetry;
pub mod workflows;
