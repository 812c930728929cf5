//! Core library for the `weather` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Abstraction over temperature providers, with two HTTP-backed implementations
//! - The aggregator that queries every provider concurrently and averages the answers
//! - Shared domain models (locations, Kelvin measurements, reports) and error types
//!
//! It is used by `weather-cli`, but can also be reused by other binaries or services.

pub mod aggregator;
pub mod config;
pub mod error;
pub mod model;
pub mod provider;

pub use aggregator::Aggregator;
pub use config::{Config, ProviderConfig};
pub use error::{AggregateError, ProviderError};
pub use model::{AggregateResult, Kelvin, Location, WeatherReport};
pub use provider::{ProviderId, TemperatureProvider, providers_from_config};
