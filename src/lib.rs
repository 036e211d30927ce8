//! Greenhouse controller firmware library.
//!
//! Exposes the domain core, the drivers and the adapters so the binary
//! and the host integration tests share one build.  All ESP-IDF-specific
//! code is guarded by `#[cfg(target_os = "espidf")]` within each module;
//! on other targets the same modules compile against simulation backends.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod control;
pub mod drivers;
pub mod error;
pub mod http;
pub mod pins;
pub mod provisioning;
pub mod safety;
pub mod sensors;
