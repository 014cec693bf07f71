/// Failure of a bus or bring-up operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// The device did not respond to a register transaction (timeout or
    /// no-acknowledge), reported by the underlying bus.
    Transport(E),
    /// A platform resource could not be set up during initialization.
    Resource(ResourceError),
    /// The operation ran before [`BusLock::init`] completed.
    ///
    /// [`BusLock::init`]: crate::BusLock::init
    Precondition,
}

/// The platform resource that failed during [`BusLock::init`].
///
/// [`BusLock::init`]: crate::BusLock::init
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResourceError {
    /// The recursive lock primitive could not be allocated.
    LockAlloc,
    /// The bus driver could not be configured or installed.
    BusInstall,
}
