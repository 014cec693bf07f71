//! Board bring-up orchestration.
use embedded_hal::delay::DelayNs;

use crate::dev::tca9554::Tca9554;
use crate::error::Error;
use crate::lock::{BusConfig, BusError, BusLock};
use crate::mutex::BusMutex;
use crate::I2cBus;

/// Contract of the external power-management chip.
///
/// Rail sequencing and the chip's interrupt handling stay with the
/// implementation; bring-up only requires that `init` has completed before
/// the display reset pulse is issued.
pub trait Pmu {
    type Error;

    /// Bring the regulated rails up.
    fn init(&mut self) -> Result<(), Self::Error>;
}

/// Bring-up failure, tagged with the collaborator that aborted the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BringUpError<E, P> {
    /// Bus setup or an expander register transaction failed.
    Bus(Error<E>),
    /// The power-management chip did not come up.
    Pmu(P),
}

/// Orchestrates board bring-up: shared bus, power rails, display reset.
pub struct PowerSequencer<M, P, D> {
    bus: BusLock<M>,
    pmu: P,
    delay: D,
}

impl<M, P, D> PowerSequencer<M, P, D>
where
    M: BusMutex,
    M::Bus: I2cBus,
    P: Pmu,
    D: DelayNs,
{
    pub fn new(config: BusConfig, pmu: P, delay: D) -> Self {
        Self {
            bus: BusLock::new(config),
            pmu,
            delay,
        }
    }

    /// The shared-bus context, for wiring further peripheral drivers onto
    /// the same lock.
    pub fn bus(&self) -> &BusLock<M> {
        &self.bus
    }

    /// Run the bring-up sequence.
    ///
    /// Strict order: bring the bus online first, then the power rails, and
    /// only then pulse the display reset.  The rails must be stable before
    /// the reset sequence, and the bus must be usable before either chip is
    /// touched.  The first failing step aborts and surfaces its error.
    pub fn init<F>(&mut self, install: F) -> Result<(), BringUpError<BusError<M>, P::Error>>
    where
        F: FnOnce(&BusConfig) -> Result<M::Bus, BusError<M>>,
    {
        self.bus.init(install).map_err(BringUpError::Bus)?;
        self.pmu.init().map_err(BringUpError::Pmu)?;

        let mut expander = Tca9554::new(&self.bus);
        expander
            .reset_display(&mut self.delay)
            .map_err(BringUpError::Bus)?;

        #[cfg(feature = "defmt")]
        defmt::info!("board power and display reset sequencing complete");

        Ok(())
    }

    /// Switch the audio power amplifier after bring-up.
    pub fn set_amplifier(&mut self, enable: bool) -> Result<(), Error<BusError<M>>> {
        Tca9554::new(&self.bus).set_amplifier(enable)
    }
}

#[cfg(test)]
mod tests {
    use super::{BringUpError, Pmu, PowerSequencer};
    use crate::error::{Error, ResourceError};
    use crate::lock::BusConfig;
    use embedded_hal::delay::DelayNs;
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::i2c as mock_i2c;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct NullDelay;

    impl DelayNs for NullDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    struct FakePmu {
        log: Rc<RefCell<Vec<&'static str>>>,
        fail: bool,
    }

    impl Pmu for FakePmu {
        type Error = &'static str;

        fn init(&mut self) -> Result<(), Self::Error> {
            self.log.borrow_mut().push("pmu-init");
            if self.fail {
                Err("pmu failed")
            } else {
                Ok(())
            }
        }
    }

    type TestSequencer = PowerSequencer<RefCell<mock_i2c::Mock>, FakePmu, NullDelay>;

    fn reset_pulse_expectations() -> Vec<mock_i2c::Transaction> {
        vec![
            mock_i2c::Transaction::write_read(0x20, vec![0x03], vec![0xff]),
            mock_i2c::Transaction::write(0x20, vec![0x03, 0xfd]),
            mock_i2c::Transaction::write_read(0x20, vec![0x01], vec![0xff]),
            mock_i2c::Transaction::write(0x20, vec![0x01, 0xfd]),
            mock_i2c::Transaction::write(0x20, vec![0x01, 0xff]),
        ]
    }

    #[test]
    fn bring_up_runs_bus_then_pmu_then_reset() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut i2c = mock_i2c::Mock::new(&reset_pulse_expectations());
        let pmu = FakePmu {
            log: Rc::clone(&log),
            fail: false,
        };
        let mut seq: TestSequencer = PowerSequencer::new(BusConfig::default(), pmu, NullDelay);

        seq.init(|_| {
            log.borrow_mut().push("bus-install");
            Ok(i2c.clone())
        })
        .unwrap();

        assert_eq!(*log.borrow(), ["bus-install", "pmu-init"]);
        assert!(seq.bus().is_initialized());
        i2c.done();
    }

    #[test]
    fn pmu_failure_aborts_before_the_reset_pulse() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut i2c = mock_i2c::Mock::new(&[]);
        let pmu = FakePmu {
            log: Rc::clone(&log),
            fail: true,
        };
        let mut seq: TestSequencer = PowerSequencer::new(BusConfig::default(), pmu, NullDelay);

        let err = seq
            .init(|_| {
                log.borrow_mut().push("bus-install");
                Ok(i2c.clone())
            })
            .unwrap_err();

        assert_eq!(err, BringUpError::Pmu("pmu failed"));
        assert_eq!(*log.borrow(), ["bus-install", "pmu-init"]);
        i2c.done();
    }

    #[test]
    fn install_failure_aborts_before_the_pmu() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let pmu = FakePmu {
            log: Rc::clone(&log),
            fail: false,
        };
        let mut seq: TestSequencer = PowerSequencer::new(BusConfig::default(), pmu, NullDelay);

        let err = seq.init(|_| Err(ErrorKind::Other)).unwrap_err();

        assert_eq!(
            err,
            BringUpError::Bus(Error::Resource(ResourceError::BusInstall))
        );
        assert!(log.borrow().is_empty());
        assert!(!seq.bus().is_initialized());
    }

    #[test]
    fn amplifier_control_runs_on_the_shared_bus() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut expectations = reset_pulse_expectations();
        expectations.extend([
            mock_i2c::Transaction::write_read(0x20, vec![0x03], vec![0xfd]),
            mock_i2c::Transaction::write(0x20, vec![0x03, 0x7d]),
            mock_i2c::Transaction::write_read(0x20, vec![0x01], vec![0x7f]),
            mock_i2c::Transaction::write(0x20, vec![0x01, 0xff]),
        ]);
        let mut i2c = mock_i2c::Mock::new(&expectations);
        let pmu = FakePmu {
            log: Rc::clone(&log),
            fail: false,
        };
        let mut seq: TestSequencer = PowerSequencer::new(BusConfig::default(), pmu, NullDelay);

        seq.init(|_| Ok(i2c.clone())).unwrap();
        seq.set_amplifier(true).unwrap();

        i2c.done();
    }
}
