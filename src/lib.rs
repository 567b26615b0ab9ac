//! Typed client for the AirThings consumer API: fetch devices, locations
//! and their latest sensor readings using a client-credentials API
//! integration. Token acquisition and refresh are handled internally.

pub mod auth;
pub mod client;
pub mod error;
pub mod models;

pub use client::{AirthingsClient, ClientConfig, DeviceFilter};
pub use error::{Error, Result};
pub use models::{
    Device, DeviceSamples, Location, LocationInfo, LocationSamples, Samples, Segment,
};
