// SPDX-License-Identifier: MPL-2.0
//! `lens_refine` enhances images and removes their backgrounds through a
//! tiered pipeline: a primary learned model, a secondary learned model, and
//! a deterministic classical algorithm that always produces a result.
//!
//! Processing runs in an isolated worker (see [`worker`]) that callers drive
//! with messages and observe through ordered progress events.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod media;
pub mod worker;
