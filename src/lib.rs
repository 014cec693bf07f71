//! Bring-up sequencing for a board whose power peripherals hang off one
//! shared I2C bus: a recursive bus lock, a TCA9554 expander driver for the
//! display reset line and the audio amplifier, and the sequencer tying the
//! bus, the PMU and the reset pulse together.
#![cfg_attr(not(test), no_std)]

#[cfg(all(not(test), feature = "std"))]
extern crate std;

mod bus;
mod error;
mod lock;
mod mutex;
mod sequencer;

pub mod dev;

pub use bus::I2cBus;
pub use error::{Error, ResourceError};
pub use lock::{BusConfig, BusError, BusGuard, BusLock};
pub use mutex::BusMutex;
#[cfg(any(test, feature = "std"))]
pub use mutex::ReentrantMutex;
pub use sequencer::{BringUpError, Pmu, PowerSequencer};

pub use dev::tca9554::Tca9554;

pub(crate) use bus::I2cExt;
