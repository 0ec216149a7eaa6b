/*!
POSIX threads callback table.

The table is a `#[repr(C)]` block of function pointers that a native
cryptographic library calls to create, lock and destroy its internal mutexes
and to identify the calling thread. One static instance exists per process;
[`thread_callback_table`] hands out a reference to it.
*/

use std::fmt;
use std::ptr;

use libc::{c_int, c_uint, c_ulong, c_void};

use crate::core::constants::thread_option;

#[cfg(not(unix))]
compile_error!("thread callbacks require a pthread-compatible threading model");

/// Library-side initialization hook
pub type InitFn = unsafe extern "C" fn() -> c_int;

/// Mutex lifecycle callback operating on a library-owned mutex slot
pub type MutexFn = unsafe extern "C" fn(*mut *mut c_void) -> c_int;

/// Returns an identifier for the calling thread
pub type ThreadIdFn = unsafe extern "C" fn() -> c_ulong;

/// Threading model encoded in a callback table's option tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadingModel {
    Default,
    User,
    Pth,
    Pthread,
    Unknown(u32),
}

impl ThreadingModel {
    fn from_option(option: u32) -> Self {
        match option & 0xFF {
            thread_option::DEFAULT => ThreadingModel::Default,
            thread_option::USER => ThreadingModel::User,
            thread_option::PTH => ThreadingModel::Pth,
            thread_option::PTHREAD => ThreadingModel::Pthread,
            other => ThreadingModel::Unknown(other),
        }
    }
}

/// Opaque thread callback table.
///
/// Fields are private. Code outside this module only ever sees a
/// `&'static ThreadCallbacks` and passes it to a library's control interface.
#[repr(C)]
pub struct ThreadCallbacks {
    option: c_uint,
    init: Option<InitFn>,
    mutex_init: Option<MutexFn>,
    mutex_destroy: Option<MutexFn>,
    mutex_lock: Option<MutexFn>,
    mutex_unlock: Option<MutexFn>,
    thread_id: Option<ThreadIdFn>,
}

static PTHREAD_CALLBACKS: ThreadCallbacks = ThreadCallbacks {
    option: thread_option::PTHREAD | (thread_option::VERSION << thread_option::VERSION_SHIFT),
    init: Some(pthread_init),
    mutex_init: Some(pthread_mutex_init),
    mutex_destroy: Some(pthread_mutex_destroy),
    mutex_lock: Some(pthread_mutex_lock),
    mutex_unlock: Some(pthread_mutex_unlock),
    thread_id: Some(pthread_thread_id),
};

/// Reference to the process-wide pthread callback table.
///
/// The table lives in static storage: the reference is never null, is the
/// same on every call from every thread, and the call neither allocates nor
/// blocks. Registering it with a library is a separate step that must happen
/// before the library allocates any thread-sensitive state.
#[inline]
pub fn thread_callback_table() -> &'static ThreadCallbacks {
    &PTHREAD_CALLBACKS
}

impl ThreadCallbacks {
    /// Assemble a table from raw callbacks.
    ///
    /// A table missing any of the four mutex callbacks can be built but is
    /// rejected with `INV_ARG` when registered.
    ///
    /// # Safety
    ///
    /// `mutex_init` must store a handle in the slot that the other mutex
    /// callbacks accept, `mutex_lock` must provide mutual exclusion between
    /// threads, and all callbacks must be callable from any thread.
    pub const unsafe fn from_parts(
        option: u32,
        init: Option<InitFn>,
        mutex_init: Option<MutexFn>,
        mutex_destroy: Option<MutexFn>,
        mutex_lock: Option<MutexFn>,
        mutex_unlock: Option<MutexFn>,
        thread_id: Option<ThreadIdFn>,
    ) -> Self {
        ThreadCallbacks {
            option,
            init,
            mutex_init,
            mutex_destroy,
            mutex_lock,
            mutex_unlock,
            thread_id,
        }
    }

    /// Raw option tag (model in the low byte, layout version in bits 8..16)
    #[inline]
    pub fn option(&self) -> u32 {
        self.option
    }

    #[inline]
    pub fn threading_model(&self) -> ThreadingModel {
        ThreadingModel::from_option(self.option)
    }

    #[inline]
    pub fn version(&self) -> u32 {
        (self.option >> thread_option::VERSION_SHIFT) & 0xFF
    }

    /// Address handed to a native library's control call
    #[inline]
    pub fn as_ptr(&self) -> *const ThreadCallbacks {
        self as *const ThreadCallbacks
    }

    /// Identity comparison
    #[inline]
    pub fn ptr_eq(&self, other: &ThreadCallbacks) -> bool {
        ptr::eq(self, other)
    }

    /// Whether every mutex callback is present
    pub fn is_complete(&self) -> bool {
        self.mutex_init.is_some()
            && self.mutex_destroy.is_some()
            && self.mutex_lock.is_some()
            && self.mutex_unlock.is_some()
    }

    /// Identifier of the calling thread as reported by the table, 0 if absent
    pub fn current_thread_id(&self) -> u64 {
        match self.thread_id {
            Some(f) => unsafe { f() as u64 },
            None => 0,
        }
    }

    pub(crate) fn call_init(&self) -> c_int {
        match self.init {
            Some(f) => unsafe { f() },
            None => 0,
        }
    }

    pub(crate) unsafe fn call_mutex_init(&self, slot: *mut *mut c_void) -> c_int {
        match self.mutex_init {
            Some(f) => unsafe { f(slot) },
            None => libc::ENOSYS,
        }
    }

    pub(crate) unsafe fn call_mutex_destroy(&self, slot: *mut *mut c_void) -> c_int {
        match self.mutex_destroy {
            Some(f) => unsafe { f(slot) },
            None => libc::ENOSYS,
        }
    }

    pub(crate) unsafe fn call_mutex_lock(&self, slot: *mut *mut c_void) -> c_int {
        match self.mutex_lock {
            Some(f) => unsafe { f(slot) },
            None => libc::ENOSYS,
        }
    }

    pub(crate) unsafe fn call_mutex_unlock(&self, slot: *mut *mut c_void) -> c_int {
        match self.mutex_unlock {
            Some(f) => unsafe { f(slot) },
            None => libc::ENOSYS,
        }
    }
}

impl fmt::Debug for ThreadCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadCallbacks")
            .field("address", &self.as_ptr())
            .field("model", &self.threading_model())
            .field("version", &self.version())
            .finish()
    }
}

unsafe extern "C" fn pthread_init() -> c_int {
    0
}

unsafe extern "C" fn pthread_mutex_init(slot: *mut *mut c_void) -> c_int {
    if slot.is_null() {
        return libc::EINVAL;
    }
    let mutex = Box::into_raw(Box::new(libc::PTHREAD_MUTEX_INITIALIZER));
    let rc = unsafe { libc::pthread_mutex_init(mutex, ptr::null()) };
    if rc != 0 {
        drop(unsafe { Box::from_raw(mutex) });
        return rc;
    }
    unsafe { *slot = mutex.cast() };
    0
}

unsafe extern "C" fn pthread_mutex_destroy(slot: *mut *mut c_void) -> c_int {
    if slot.is_null() {
        return libc::EINVAL;
    }
    let mutex = unsafe { *slot } as *mut libc::pthread_mutex_t;
    if mutex.is_null() {
        return libc::EINVAL;
    }
    let rc = unsafe { libc::pthread_mutex_destroy(mutex) };
    if rc != 0 {
        return rc;
    }
    drop(unsafe { Box::from_raw(mutex) });
    unsafe { *slot = ptr::null_mut() };
    0
}

unsafe extern "C" fn pthread_mutex_lock(slot: *mut *mut c_void) -> c_int {
    if slot.is_null() {
        return libc::EINVAL;
    }
    let mutex = unsafe { *slot } as *mut libc::pthread_mutex_t;
    if mutex.is_null() {
        return libc::EINVAL;
    }
    unsafe { libc::pthread_mutex_lock(mutex) }
}

unsafe extern "C" fn pthread_mutex_unlock(slot: *mut *mut c_void) -> c_int {
    if slot.is_null() {
        return libc::EINVAL;
    }
    let mutex = unsafe { *slot } as *mut libc::pthread_mutex_t;
    if mutex.is_null() {
        return libc::EINVAL;
    }
    unsafe { libc::pthread_mutex_unlock(mutex) }
}

unsafe extern "C" fn pthread_thread_id() -> c_ulong {
    unsafe { libc::pthread_self() as c_ulong }
}
