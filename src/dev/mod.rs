//! Drivers for the chips reached over the shared bus.
//!
//! Only the expander taking part in bring-up lives here; the exposed types
//! at the root of the crate should be enough for most uses.

pub mod tca9554;
