//! This crate exposes the internal functionality of the surfscan
//! attack-surface discovery pipeline.
//!
//! surfscan orchestrates the projectdiscovery toolchain (subfinder, dnsx,
//! httpx, naabu, katana) into a single sequential pipeline that maps the web
//! attack surface of a domain and writes one JSON report.
//!
//! ## Architecture Overview
//!
//! A run is driven by [`engine::DiscoveryEngine`], configured by a
//! [`profile::DepthProfile`] preset (shallow, normal or deep):
//!
//! 1. **Passive**: subdomain enumeration, DNS resolution and WHOIS
//! 2. **Active**: HTTP probing of every discovered name
//! 3. **Port discovery**: port scanning of the resolved addresses
//! 4. **Deep**: crawling of live services
//! 5. **Authenticated**: re-crawl with credentials, when configured
//! 6. **Enrichment**: cloud and CDN classification
//!
//! External tools sit behind the [`tools::Tools`] trait, so the pipeline
//! can be exercised end to end against canned outputs.
//!
//! ## Basic Usage Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use surfscan::engine::DiscoveryEngine;
//! use surfscan::model::extract_root_domain;
//! use surfscan::profile::{resolve, Depth, ProfileOverrides};
//! use surfscan::tools::runner::ProcessRunner;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let profile = resolve(Depth::Normal, &ProfileOverrides::default())?;
//!     let root = extract_root_domain("https://example.com")?;
//!
//!     let engine = DiscoveryEngine::new(profile, Arc::new(ProcessRunner));
//!     let report = engine.discover("https://example.com", &root).await?;
//!
//!     println!("{}", serde_json::to_string_pretty(&report)?);
//!     Ok(())
//! }
//! ```
#![warn(missing_docs)]

pub mod auth;

pub mod engine;

pub mod errors;

pub mod input;

pub mod model;

pub mod profile;

pub mod stage;

pub mod tools;
