use crate::error::{Error, ResourceError};
use crate::mutex::BusMutex;
use crate::I2cBus;

/// Error type of the bus handle guarded by the mutex `M`.
pub type BusError<M> = <<M as BusMutex>::Bus as embedded_hal::i2c::ErrorType>::Error;

/// Static configuration of the shared bus.
///
/// Covers what the platform needs to bring the bus controller up: which
/// instance to use, clock and pull-up configuration, and the bound the
/// platform driver applies to every register transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusConfig {
    /// Index of the bus controller instance.
    pub port: u8,
    /// Bus clock in Hertz.
    pub frequency_hz: u32,
    /// Enable internal pull-ups on both bus lines.
    pub pullups: bool,
    /// Per-transaction timeout applied by the platform bus driver.
    pub transaction_timeout_ms: u32,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            port: 0,
            frequency_hz: 400_000,
            pullups: true,
            transaction_timeout_ms: 200,
        }
    }
}

/// Serialized access to the shared bus.
///
/// One `BusLock` exists per physical bus.  After [`init`] it owns the bus
/// handle behind a recursive lock; every register transaction of every
/// driver on the bus goes through [`transaction`] and therefore serializes
/// on that lock.  The context object is created by the board's sequencer,
/// passed to drivers by reference, and lives for the rest of the process.
///
/// [`init`]: BusLock::init
/// [`transaction`]: BusLock::transaction
pub struct BusLock<M> {
    config: BusConfig,
    inner: Option<M>,
}

impl<M> BusLock<M>
where
    M: BusMutex,
    M::Bus: I2cBus,
{
    /// Create the context object.  The bus stays offline until [`BusLock::init`].
    pub fn new(config: BusConfig) -> Self {
        Self {
            config,
            inner: None,
        }
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.is_some()
    }

    /// Bring the bus online.
    ///
    /// `install` configures and installs the platform bus driver from the
    /// [`BusConfig`]; the lock primitive is then allocated around the
    /// returned handle.  Calling `init` on an initialized bus is a no-op
    /// returning success, and the install hook does not run a second time.
    pub fn init<F>(&mut self, install: F) -> Result<(), Error<BusError<M>>>
    where
        F: FnOnce(&BusConfig) -> Result<M::Bus, BusError<M>>,
    {
        if self.inner.is_some() {
            return Ok(());
        }

        let bus = install(&self.config).map_err(|_| Error::Resource(ResourceError::BusInstall))?;
        let mutex = M::try_create(bus).ok_or(Error::Resource(ResourceError::LockAlloc))?;
        self.inner = Some(mutex);
        Ok(())
    }

    /// Hold the lock across multiple transactions.
    ///
    /// `timeout_ms == 0` waits indefinitely, any other value bounds the wait
    /// in milliseconds.  Returns `Ok(None)` when the lock was not acquired
    /// within the bound.  The lock is recursive, so transactions issued
    /// while the guard is alive nest below it; the guard releases its level
    /// on drop.
    pub fn lock(&self, timeout_ms: u32) -> Result<Option<BusGuard<'_, M>>, Error<BusError<M>>> {
        let mutex = self.inner.as_ref().ok_or(Error::Precondition)?;
        if mutex.acquire(timeout_ms) {
            Ok(Some(BusGuard { mutex }))
        } else {
            Ok(None)
        }
    }

    /// Run one bus transaction while holding the lock.
    ///
    /// Blocks until the bus is available.  Transport failures from the
    /// closure surface as [`Error::Transport`].
    pub fn transaction<R, F>(&self, f: F) -> Result<R, Error<BusError<M>>>
    where
        F: FnOnce(&mut M::Bus) -> Result<R, BusError<M>>,
    {
        let mutex = self.inner.as_ref().ok_or(Error::Precondition)?;
        let acquired = mutex.acquire(0);
        debug_assert!(acquired);
        let result = mutex.with_bus(f);
        mutex.release();
        result.map_err(Error::Transport)
    }
}

/// Holds one level of the recursive bus lock; released on drop.
pub struct BusGuard<'a, M: BusMutex> {
    mutex: &'a M,
}

impl<M: BusMutex> Drop for BusGuard<'_, M> {
    fn drop(&mut self) {
        self.mutex.release();
    }
}
