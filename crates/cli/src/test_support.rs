use std::sync::{Mutex, MutexGuard, OnceLock};

fn env_lock() -> MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    // A panicking config test must not poison every test after it.
    LOCK.get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Runs `run` while holding the process-wide env lock.
///
/// Config tests read and write `HOME`, `OPENAI_*`, `ARCADE_*` and
/// `TOLLGATE_USER_ID`, so they must not run in parallel.
pub(crate) fn with_locked_env<R>(run: impl FnOnce() -> R) -> R {
    let _guard = env_lock();
    run()
}

/// Sets an environment variable. Call inside [`with_locked_env`].
pub(crate) fn set_env_var(key: &str, value: &str) {
    // SAFETY: callers hold the env lock, so no other test thread touches the environment.
    unsafe {
        std::env::set_var(key, value);
    }
}

/// Removes an environment variable. Call inside [`with_locked_env`].
pub(crate) fn remove_env_var(key: &str) {
    // SAFETY: callers hold the env lock, so no other test thread touches the environment.
    unsafe {
        std::env::remove_var(key);
    }
}
