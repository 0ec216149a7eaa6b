/*!
Mutex driven through a thread callback table.

Libraries written in Rust use [`NativeMutex`] the same way a C library uses
the callbacks it was given: one slot per mutex, created with `mutex_init`,
locked and unlocked through the table, destroyed on drop.
*/

use std::cell::UnsafeCell;
use std::fmt;
use std::ptr;

use libc::c_void;

use super::callbacks::ThreadCallbacks;
use crate::core::error::ErrorCode;

pub struct NativeMutex {
    table: &'static ThreadCallbacks,
    slot: UnsafeCell<*mut c_void>,
}

// The slot holds a handle created by the table's mutex_init, which the table
// contract requires to be usable from any thread.
unsafe impl Send for NativeMutex {}
unsafe impl Sync for NativeMutex {}

impl NativeMutex {
    /// Create a mutex through `table`
    pub fn new(table: &'static ThreadCallbacks) -> Result<Self, ErrorCode> {
        let mutex = NativeMutex {
            table,
            slot: UnsafeCell::new(ptr::null_mut()),
        };
        let rc = unsafe { table.call_mutex_init(mutex.slot.get()) };
        if rc != 0 {
            // Nothing to destroy
            std::mem::forget(mutex);
            return Err(ErrorCode::from_errno(rc));
        }
        Ok(mutex)
    }

    /// Block until the mutex is held by the calling thread
    pub fn lock(&self) -> Result<NativeMutexGuard<'_>, ErrorCode> {
        let rc = unsafe { self.table.call_mutex_lock(self.slot.get()) };
        if rc != 0 {
            return Err(ErrorCode::from_errno(rc));
        }
        Ok(NativeMutexGuard { mutex: self })
    }

    /// Table the mutex was created from
    pub fn table(&self) -> &'static ThreadCallbacks {
        self.table
    }
}

impl Drop for NativeMutex {
    fn drop(&mut self) {
        let rc = unsafe { self.table.call_mutex_destroy(self.slot.get()) };
        if rc != 0 {
            log::warn!("thread callback mutex_destroy failed with errno {}", rc);
        }
    }
}

impl fmt::Debug for NativeMutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeMutex")
            .field("table", &self.table.as_ptr())
            .finish()
    }
}

/// Held lock; unlocks on drop
#[must_use = "the mutex is released as soon as the guard is dropped"]
pub struct NativeMutexGuard<'a> {
    mutex: &'a NativeMutex,
}

impl Drop for NativeMutexGuard<'_> {
    fn drop(&mut self) {
        let rc = unsafe { self.mutex.table.call_mutex_unlock(self.mutex.slot.get()) };
        if rc != 0 {
            log::error!("thread callback mutex_unlock failed with errno {}", rc);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::threading::thread_callback_table;
    use std::cell::UnsafeCell;
    use std::sync::Arc;
    use std::thread;

    struct Shared {
        mutex: NativeMutex,
        value: UnsafeCell<u64>,
    }

    unsafe impl Sync for Shared {}

    #[test]
    fn test_lock_and_unlock() {
        let mutex = NativeMutex::new(thread_callback_table()).unwrap();
        {
            let _guard = mutex.lock().unwrap();
        }
        let _guard = mutex.lock().unwrap();
    }

    #[test]
    fn test_mutual_exclusion() {
        let shared = Arc::new(Shared {
            mutex: NativeMutex::new(thread_callback_table()).unwrap(),
            value: UnsafeCell::new(0),
        });

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        let _guard = shared.mutex.lock().unwrap();
                        unsafe { *shared.value.get() += 1 };
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let _guard = shared.mutex.lock().unwrap();
        assert_eq!(unsafe { *shared.value.get() }, 8000);
    }
}
