//! Driving event detection from a vehicle-mounted IMU and GNSS receiver.
//!
//! Raw accelerometer samples are mapped into the vehicle frame, levelled against the
//! mount tilt, smoothed, and fed to a set of hysteresis trackers that emit turn,
//! acceleration, braking and stop events. [`engine::DriveEngine`] runs the whole chain
//! synchronously; [`pipeline::Pipeline`] runs it as tokio tasks joined by feeds.

pub mod adapter;
pub mod calibration;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod feed;
pub mod filters;
pub mod live_status;
pub mod orientation;
pub mod pipeline;
pub mod sensors;
pub mod sink;
pub mod trackers;
pub mod types;

pub use config::{DeliveryPolicy, EventConfig, PipelineConfig};
pub use engine::DriveEngine;
pub use error::{FilterError, PipelineError};
pub use events::{DrivingEvent, EventKind, Record};
pub use types::{AccelerationSample, GnssFix, ImuRecord};
