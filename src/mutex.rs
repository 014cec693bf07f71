/// Common interface for the lock guarding the shared bus.
///
/// The bus is physically shared by several peripheral drivers, so every
/// register transaction must hold this lock.  The lock is recursive: the
/// owning execution context may acquire it again while already holding it,
/// which lets a logical sequence of transactions nest below one outer
/// acquisition.  Each successful [`acquire`] must be balanced by one
/// [`release`].
///
/// Two implementations ship with the crate:
///
/// | Mutex | Availability | Notes |
/// | --- | --- | --- |
/// | [`core::cell::RefCell`] | _always_ | For sharing within a single execution context; never blocks. |
/// | [`ReentrantMutex`] | `std` | Blocking, timed, recursive; for preemptive threads. |
///
/// For other platforms (RTOS semaphores and the like), implement the trait
/// on a newtype wrapping the native primitive.
///
/// [`acquire`]: BusMutex::acquire
/// [`release`]: BusMutex::release
pub trait BusMutex {
    /// The bus handle protected by this lock.
    type Bus;

    /// Wrap `bus` in a new lock.
    ///
    /// Returns `None` when the platform cannot allocate the lock primitive.
    fn try_create(bus: Self::Bus) -> Option<Self>
    where
        Self: Sized;

    /// Acquire the lock, waiting at most `timeout_ms` milliseconds.
    ///
    /// A timeout of `0` waits indefinitely.  Returns whether the lock was
    /// acquired.  Re-acquisition by the current owner succeeds immediately.
    fn acquire(&self, timeout_ms: u32) -> bool;

    /// Release one level of the lock.
    ///
    /// Must be paired 1:1 with a prior successful [`acquire`] by the same
    /// context.
    ///
    /// [`acquire`]: BusMutex::acquire
    fn release(&self);

    /// Access the bus handle.  Only call while holding the lock.
    fn with_bus<R, F: FnOnce(&mut Self::Bus) -> R>(&self, f: F) -> R;
}

impl<T> BusMutex for core::cell::RefCell<T> {
    type Bus = T;

    fn try_create(bus: Self::Bus) -> Option<Self> {
        Some(core::cell::RefCell::new(bus))
    }

    fn acquire(&self, _timeout_ms: u32) -> bool {
        // A single execution context cannot contend with itself.
        true
    }

    fn release(&self) {}

    fn with_bus<R, F: FnOnce(&mut Self::Bus) -> R>(&self, f: F) -> R {
        let mut bus = self.borrow_mut();
        f(&mut bus)
    }
}

#[cfg(any(test, feature = "std"))]
mod reentrant {
    use std::cell::UnsafeCell;
    use std::sync::{Condvar, Mutex};
    use std::thread::{self, ThreadId};
    use std::time::{Duration, Instant};

    struct State {
        owner: Option<ThreadId>,
        depth: usize,
        bus_borrowed: bool,
    }

    /// Blocking, timed, recursive mutex around the bus handle.
    ///
    /// The owning thread may re-acquire the lock without deadlocking; each
    /// acquisition must be balanced by one release.  Contending threads
    /// suspend on a condition variable until the owner fully releases.  The
    /// bus handle is handed out one exclusive borrow at a time, checked at
    /// runtime; violating that (or releasing a lock you do not hold) is a
    /// programming defect and panics.
    pub struct ReentrantMutex<T> {
        bus: UnsafeCell<T>,
        state: Mutex<State>,
        released: Condvar,
    }

    // The bus handle only crosses threads together with lock ownership,
    // which `state` serializes.
    unsafe impl<T: Send> Send for ReentrantMutex<T> {}
    unsafe impl<T: Send> Sync for ReentrantMutex<T> {}

    impl<T> super::BusMutex for ReentrantMutex<T> {
        type Bus = T;

        fn try_create(bus: T) -> Option<Self> {
            Some(ReentrantMutex {
                bus: UnsafeCell::new(bus),
                state: Mutex::new(State {
                    owner: None,
                    depth: 0,
                    bus_borrowed: false,
                }),
                released: Condvar::new(),
            })
        }

        fn acquire(&self, timeout_ms: u32) -> bool {
            let me = thread::current().id();
            let mut state = self.state.lock().unwrap();

            if state.owner == Some(me) {
                state.depth += 1;
                return true;
            }

            if timeout_ms == 0 {
                while state.owner.is_some() {
                    state = self.released.wait(state).unwrap();
                }
            } else {
                let deadline = Instant::now() + Duration::from_millis(u64::from(timeout_ms));
                while state.owner.is_some() {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    let (guard, _) = self.released.wait_timeout(state, deadline - now).unwrap();
                    state = guard;
                }
            }

            state.owner = Some(me);
            state.depth = 1;
            true
        }

        fn release(&self) {
            let mut state = self.state.lock().unwrap();
            assert_eq!(
                state.owner,
                Some(thread::current().id()),
                "release() from a context that does not hold the lock"
            );
            state.depth -= 1;
            if state.depth == 0 {
                state.owner = None;
                self.released.notify_all();
            }
        }

        fn with_bus<R, F: FnOnce(&mut T) -> R>(&self, f: F) -> R {
            {
                let mut state = self.state.lock().unwrap();
                assert_eq!(
                    state.owner,
                    Some(thread::current().id()),
                    "bus access without holding the lock"
                );
                assert!(!state.bus_borrowed, "bus handle already borrowed");
                state.bus_borrowed = true;
            }
            // Owner check plus borrow flag make this the only live borrow.
            let result = f(unsafe { &mut *self.bus.get() });
            self.state.lock().unwrap().bus_borrowed = false;
            result
        }
    }
}

#[cfg(any(test, feature = "std"))]
pub use reentrant::ReentrantMutex;
