pub mod kalman;

pub use kalman::{AccelerationSmoother, PositionSmoother, ScalarKalman, ScalarModel};
