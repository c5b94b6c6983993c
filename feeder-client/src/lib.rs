//! Metro feeder ride-sharing client.
//!
//! Riders ask to be picked up at a metro station, drivers run a simulated
//! route past the stations, and an admin maintains the station list. The
//! shared state lives in five independent backend services that push
//! nothing, so each role's dashboard polls the services and keeps its own
//! projection consistent with what it last saw.

pub mod config;
pub mod domain;
pub mod error;
pub mod services;
pub mod session;
pub mod sync;
pub mod views;

pub use error::FeederError;
