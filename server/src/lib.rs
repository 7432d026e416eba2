//! Ratewatch Server
//!
//! Service wiring around the FX core: environment configuration, the HTTP
//! read API and the `fetch-rates` write trigger.

pub mod config;
pub mod app;
pub mod api;
pub mod fetch;

pub use api::RatesApi;
pub use app::{App, LogFormat};
pub use config::{NotifierKind, ServiceConfig};
pub use fetch::{FetchArgs, FetchRequest};
