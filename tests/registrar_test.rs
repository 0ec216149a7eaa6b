use crypto_threading::{
    thread_callback_table, Algorithm, Control, CryptoLibrary, Error, ErrorCode, InitConfig,
    LibraryInitState, Registrar, Result, SecureMemory, SoftwareLibrary, ThreadCallbacks,
    ThreadingModel,
};
use libc::{c_int, c_ulong, c_void};
use std::collections::HashSet;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ----- Callback table -----

#[test]
fn test_table_identity_across_calls() {
    let first = thread_callback_table() as *const ThreadCallbacks;
    for _ in 0..1000 {
        assert_eq!(thread_callback_table() as *const ThreadCallbacks, first);
    }
    assert!(!first.is_null());
}

#[test]
fn test_table_identity_across_threads() {
    let barrier = Arc::new(Barrier::new(100));
    let handles: Vec<_> = (0..100)
        .map(|_| {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                thread_callback_table() as *const ThreadCallbacks as usize
            })
        })
        .collect();

    let addresses: HashSet<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(addresses.len(), 1);
    assert!(addresses.contains(&(thread_callback_table() as *const ThreadCallbacks as usize)));
}

#[test]
fn test_table_describes_pthreads() {
    let table = thread_callback_table();
    assert_eq!(table.threading_model(), ThreadingModel::Pthread);
    assert_eq!(table.version(), 1);
    assert!(table.is_complete());
}

// ----- Counting table -----

static MUTEX_INITS: AtomicUsize = AtomicUsize::new(0);
static MUTEX_LOCKS: AtomicUsize = AtomicUsize::new(0);

unsafe extern "C" fn counting_init(slot: *mut *mut c_void) -> c_int {
    MUTEX_INITS.fetch_add(1, Ordering::SeqCst);
    let mutex = Box::into_raw(Box::new(libc::PTHREAD_MUTEX_INITIALIZER));
    unsafe { *slot = mutex.cast() };
    0
}

unsafe extern "C" fn counting_destroy(slot: *mut *mut c_void) -> c_int {
    let mutex = unsafe { *slot } as *mut libc::pthread_mutex_t;
    drop(unsafe { Box::from_raw(mutex) });
    unsafe { *slot = ptr::null_mut() };
    0
}

unsafe extern "C" fn counting_lock(slot: *mut *mut c_void) -> c_int {
    MUTEX_LOCKS.fetch_add(1, Ordering::SeqCst);
    unsafe { libc::pthread_mutex_lock(*slot as *mut libc::pthread_mutex_t) }
}

unsafe extern "C" fn counting_unlock(slot: *mut *mut c_void) -> c_int {
    unsafe { libc::pthread_mutex_unlock(*slot as *mut libc::pthread_mutex_t) }
}

unsafe extern "C" fn counting_thread_id() -> c_ulong {
    unsafe { libc::pthread_self() as c_ulong }
}

static COUNTING_TABLE: ThreadCallbacks = unsafe {
    ThreadCallbacks::from_parts(
        1 | (1 << 8),
        None,
        Some(counting_init),
        Some(counting_destroy),
        Some(counting_lock),
        Some(counting_unlock),
        Some(counting_thread_id),
    )
};

#[test]
fn test_library_locks_through_registered_table() -> Result<()> {
    init_logging();
    let registrar = Registrar::with_table(SoftwareLibrary::new(), &COUNTING_TABLE);
    let crypto = registrar.init_default()?;

    assert_eq!(COUNTING_TABLE.threading_model(), ThreadingModel::User);
    assert_eq!(MUTEX_INITS.load(Ordering::SeqCst), 1);

    let before = MUTEX_LOCKS.load(Ordering::SeqCst);
    crypto.hash(Algorithm::Sha256, b"counted")?;
    crypto.random_bytes(16, Default::default())?;
    assert!(MUTEX_LOCKS.load(Ordering::SeqCst) >= before + 2);
    Ok(())
}

// ----- Rejected tables -----

// Pth model with a valid layout version
static PTH_TABLE: ThreadCallbacks = unsafe {
    ThreadCallbacks::from_parts(
        2 | (1 << 8),
        None,
        Some(counting_init),
        Some(counting_destroy),
        Some(counting_lock),
        Some(counting_unlock),
        Some(counting_thread_id),
    )
};

// Pthread model with a layout version the library does not know
static FUTURE_VERSION_TABLE: ThreadCallbacks = unsafe {
    ThreadCallbacks::from_parts(
        3 | (2 << 8),
        None,
        Some(counting_init),
        Some(counting_destroy),
        Some(counting_lock),
        Some(counting_unlock),
        Some(counting_thread_id),
    )
};

static INCOMPLETE_TABLE: ThreadCallbacks = unsafe {
    ThreadCallbacks::from_parts(
        1 | (1 << 8),
        None,
        Some(counting_init),
        Some(counting_destroy),
        None,
        Some(counting_unlock),
        Some(counting_thread_id),
    )
};

fn assert_rejected(table: &'static ThreadCallbacks, expected: u32) {
    init_logging();

    // Direct registration reports the raw status
    let library = SoftwareLibrary::new();
    let status = library.control(Control::SetThreadCallbacks(table));
    assert_eq!(status, ErrorCode::from_code(expected));
    assert!(library.registered_callbacks().is_none());

    // Through the registrar the status is kept unchanged and is terminal
    let registrar = Registrar::with_table(SoftwareLibrary::new(), table);
    match registrar.init_default() {
        Err(Error::InitializationFailed { code }) => {
            assert_eq!(code, ErrorCode::from_code(expected));
            assert_eq!(code.raw(), ErrorCode::from_code(expected).raw());
        }
        other => panic!("unexpected: {:?}", other.map(|_| ())),
    }
    assert_eq!(registrar.state(), LibraryInitState::Failed);
    assert!(registrar.library().registered_callbacks().is_none());
    match registrar.handle() {
        Err(Error::InitializationFailed { code }) => {
            assert_eq!(code, ErrorCode::from_code(expected))
        }
        other => panic!("unexpected: {:?}", other.map(|_| ())),
    }
    assert_eq!(registrar.registrations(), 1);
}

#[test]
fn test_wrong_threading_model_rejected() {
    assert_eq!(PTH_TABLE.threading_model(), ThreadingModel::Pth);
    assert_rejected(&PTH_TABLE, ErrorCode::NOT_SUPPORTED);
}

#[test]
fn test_wrong_table_version_rejected() {
    assert_eq!(FUTURE_VERSION_TABLE.threading_model(), ThreadingModel::Pthread);
    assert_eq!(FUTURE_VERSION_TABLE.version(), 2);
    assert_rejected(&FUTURE_VERSION_TABLE, ErrorCode::NOT_SUPPORTED);
}

#[test]
fn test_incomplete_table_rejected() {
    assert!(!INCOMPLETE_TABLE.is_complete());
    assert_rejected(&INCOMPLETE_TABLE, ErrorCode::INV_ARG);
}

// ----- One-time guard -----

#[test]
fn test_registration_body_runs_once_under_contention() {
    init_logging();
    let registrar = Arc::new(Registrar::new(SoftwareLibrary::new()));
    let body_runs = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(32));

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let registrar = Arc::clone(&registrar);
            let body_runs = Arc::clone(&body_runs);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                registrar
                    .init(|x| {
                        body_runs.fetch_add(1, Ordering::SeqCst);
                        x.disable_secmem();
                        Ok(())
                    })
                    .map(|_| ())
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    assert_eq!(body_runs.load(Ordering::SeqCst), 1);
    assert_eq!(registrar.registrations(), 1);
    assert_eq!(registrar.state(), LibraryInitState::Initialized);
    assert_eq!(registrar.library().self_initializations(), 1);
}

#[test]
fn test_operations_refused_before_init() {
    let registrar = Registrar::new(SoftwareLibrary::new());
    assert!(matches!(registrar.handle(), Err(Error::NotInitialized)));
    assert_eq!(registrar.state(), LibraryInitState::Uninitialized);
    assert!(!registrar.library().is_any_initialization_started());
}

#[test]
fn test_failed_configuration_is_reported_and_sticky() {
    init_logging();
    let registrar = Registrar::new(SoftwareLibrary::new());
    let config = InitConfig::new()
        .with_secure_memory(SecureMemory::Fixed(1024))
        .with_min_version("1.0");

    // Secure memory cannot be enabled once it has been disabled
    let result = registrar.init(|x| {
        x.disable_secmem();
        config.apply(x)
    });
    let code = match result {
        Err(Error::InitializationFailed { code }) => code,
        other => panic!("unexpected: {:?}", other.map(|_| ())),
    };
    assert_eq!(code.code(), ErrorCode::NOT_SUPPORTED);
    assert_eq!(registrar.state(), LibraryInitState::Failed);

    match registrar.handle() {
        Err(Error::InitializationFailed { code: again }) => assert_eq!(again, code),
        other => panic!("unexpected: {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_version_requirement_not_met() {
    let registrar = Registrar::new(SoftwareLibrary::new());
    let config = InitConfig::new().with_min_version("42.0");
    match registrar.init_with_config(&config) {
        Err(Error::VersionMismatch { required }) => assert_eq!(required, "42.0"),
        other => panic!("unexpected: {:?}", other.map(|_| ())),
    }
    assert!(matches!(
        registrar.handle(),
        Err(Error::VersionMismatch { .. })
    ));
}

#[test]
fn test_library_used_before_registration() {
    init_logging();
    let registrar = Registrar::new(SoftwareLibrary::new());

    // Bypass the guard: the library initializes itself without callbacks
    registrar.library().check_version(None);

    let crypto = registrar.init_default().unwrap();
    assert!(registrar.library().registered_callbacks().is_none());
    assert!(!registrar.library().uses_callback_locks());
    assert_eq!(crypto.hash(Algorithm::Sha256, b"abc").unwrap().len(), 32);
}

#[test]
fn test_config_self_test() -> Result<()> {
    let registrar = Registrar::new(SoftwareLibrary::new());
    let config = InitConfig::new()
        .with_self_test(true)
        .with_secure_memory(SecureMemory::AutoExpand(4096));
    let crypto = registrar.init_with_config(&config)?;
    crypto.run_self_tests()?;
    assert_eq!(registrar.library().secmem_size(), 4096);
    assert!(registrar.library().is_secure_rndpool());
    Ok(())
}
