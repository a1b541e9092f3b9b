//! Device drivers for the gauge head.
//!
//! The simulated rig is always available. The GPIO laser switch needs the
//! `hardware` feature and a Linux target.

pub mod error;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;
pub mod sim;
pub mod util;

pub use error::HwError;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub use gpio::GpioLaser;
pub use sim::{SimCamera, SimLaser, SimParams, SimPositioner, SimRig};
