#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::{Mutex, MutexGuard, OnceLock};

#[cfg(test)]
fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

/// Serializes and restores process-environment mutation across tests.
///
/// Holding the guard takes a process-wide lock so environment-dependent
/// tests cannot interleave; dropped guards restore every touched variable.
#[cfg(test)]
pub struct TestEnvVarGuard {
    saved: HashMap<String, Option<String>>,
    _lock: MutexGuard<'static, ()>,
}

#[cfg(test)]
impl TestEnvVarGuard {
    pub fn new() -> Self {
        let lock = env_lock().lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Self {
            saved: HashMap::new(),
            _lock: lock,
        }
    }

    pub fn set_var(&mut self, name: &str, value: &str) {
        self.remember(name);
        std::env::set_var(name, value);
    }

    pub fn remove_var(&mut self, name: &str) {
        self.remember(name);
        std::env::remove_var(name);
    }

    fn remember(&mut self, name: &str) {
        self.saved
            .entry(name.to_string())
            .or_insert_with(|| std::env::var(name).ok());
    }
}

#[cfg(test)]
impl Drop for TestEnvVarGuard {
    fn drop(&mut self) {
        for (name, value) in self.saved.drain() {
            match value {
                Some(value) => std::env::set_var(&name, value),
                None => std::env::remove_var(&name),
            }
        }
    }
}
