//! Support for the `TCA9554` "8-bit I2C and SMBus I/O expander" wired to the
//! display controller's reset input and the audio power amplifier's enable.
use embedded_hal::delay::DelayNs;

use crate::error::Error;
use crate::lock::{BusError, BusLock};
use crate::mutex::BusMutex;
use crate::{I2cBus, I2cExt};

/// Fixed 7-bit bus address of the expander.
pub const ADDRESS: u8 = 0x20;

/// Expander output wired to the display controller's reset input.
const DISPLAY_RESET_BIT: u8 = 1 << 1;
/// Expander output wired to the audio power amplifier's enable.
const AMP_ENABLE_BIT: u8 = 1 << 7;

/// How long the reset line is held low.
const RESET_ASSERT_MS: u32 = 100;
/// How long the display controller gets to come out of reset.
const RESET_RELEASE_MS: u32 = 200;

#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Regs {
    InputPort = 0x00,
    OutputPort = 0x01,
    PolarityInversion = 0x02,
    Configuration = 0x03,
}

impl From<Regs> for u8 {
    fn from(r: Regs) -> u8 {
        r as u8
    }
}

/// `TCA9554` expander on the shared bus.
///
/// The driver keeps no shadow of the device registers: every mutation
/// re-reads the live register and writes back only the targeted bits, so
/// the other port lines keep whatever state the device reports.
pub struct Tca9554<'a, M> {
    bus: &'a BusLock<M>,
}

impl<'a, M> Tca9554<'a, M>
where
    M: BusMutex,
    M::Bus: I2cBus,
{
    pub fn new(bus: &'a BusLock<M>) -> Self {
        Self { bus }
    }

    fn read_register(&mut self, reg: Regs) -> Result<u8, Error<BusError<M>>> {
        self.bus.transaction(|i2c| i2c.read_reg(ADDRESS, reg))
    }

    fn write_register(&mut self, reg: Regs, value: u8) -> Result<(), Error<BusError<M>>> {
        self.bus.transaction(|i2c| i2c.write_reg(ADDRESS, reg, value))
    }

    fn update_register(
        &mut self,
        reg: Regs,
        mask_set: u8,
        mask_clear: u8,
    ) -> Result<(), Error<BusError<M>>> {
        self.bus
            .transaction(|i2c| i2c.update_reg(ADDRESS, reg, mask_set, mask_clear))
    }

    /// Pulse the display controller's reset line.
    ///
    /// Marks the line as a driven output, holds it low for 100 ms, then
    /// releases it and waits 200 ms for the controller to leave reset.  The
    /// whole pulse runs under one outer lock acquisition, so no other
    /// context can interleave accesses to the expander's registers; the
    /// first failing step aborts the sequence with that step's error.
    pub fn reset_display<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error<BusError<M>>> {
        let _outer = self.bus.lock(0)?;

        self.update_register(Regs::Configuration, 0, DISPLAY_RESET_BIT)?;

        let output = self.read_register(Regs::OutputPort)?;
        self.write_register(Regs::OutputPort, output & !DISPLAY_RESET_BIT)?;
        delay.delay_ms(RESET_ASSERT_MS);

        self.write_register(Regs::OutputPort, output | DISPLAY_RESET_BIT)?;
        delay.delay_ms(RESET_RELEASE_MS);

        #[cfg(feature = "defmt")]
        defmt::info!("display reset pulse complete");

        Ok(())
    }

    /// Switch the audio power amplifier on or off.
    ///
    /// Marks the control line as a driven output, then drives it to the
    /// requested level.  Aborts on the first failing step.
    pub fn set_amplifier(&mut self, enable: bool) -> Result<(), Error<BusError<M>>> {
        let _outer = self.bus.lock(0)?;

        self.update_register(Regs::Configuration, 0, AMP_ENABLE_BIT)?;

        let (mask_set, mask_clear) = if enable {
            (AMP_ENABLE_BIT, 0)
        } else {
            (0, AMP_ENABLE_BIT)
        };
        self.update_register(Regs::OutputPort, mask_set, mask_clear)?;

        #[cfg(feature = "defmt")]
        defmt::info!("audio amplifier enabled: {}", enable);

        Ok(())
    }
}
