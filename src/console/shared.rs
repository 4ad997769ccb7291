use std::sync::{Arc, Mutex, MutexGuard};

use lazy_static::lazy_static;

use crate::console::eval::Value;
use crate::console::{Console, ConsoleConfig, ConsoleError};

/// A console that several threads can reach. One mutex guards all of it:
/// objects, namespaces and the string tables change together or not at all.
#[derive(Debug, Clone)]
pub struct SharedConsole {
    inner: Arc<Mutex<Console>>,
}

impl SharedConsole {
    pub fn new(console: Console) -> Self {
        SharedConsole { inner: Arc::new(Mutex::new(console)) }
    }

    /// Locks the console. A thread that panicked while holding the lock
    /// does not make the console unusable; script errors never leave it
    /// half-updated.
    pub fn lock(&self) -> MutexGuard<Console> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut Console) -> R) -> R {
        let mut console = self.lock();
        f(&mut console)
    }

    pub fn eval(&self, source: &str) -> Result<Value, ConsoleError> {
        self.lock().eval(source)
    }
}

lazy_static! {
    static ref GLOBAL_CONSOLE: SharedConsole = SharedConsole::new(Console::with_config(ConsoleConfig::default()));
}

/// The process-wide console, created on first use.
pub fn global_console() -> &'static SharedConsole {
    &GLOBAL_CONSOLE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::logging::DummyLogger;

    #[test]
    fn test_threads_share_one_console() {
        let shared = SharedConsole::new(Console::with_logger(ConsoleConfig::default(), Box::new(DummyLogger)));
        shared.eval("$counter = 0;").unwrap();

        crossbeam_utils::thread::scope(|s| {
            for _ in 0..4 {
                let shared = shared.clone();
                s.spawn(move |_| {
                    for _ in 0..25 {
                        shared.eval("$counter++;").unwrap();
                    }
                });
            }
        }).unwrap();

        assert_eq!(shared.with(|console| console.get_global("counter")).to_int(), 100);
    }

    #[test]
    fn test_global_console_is_shared() {
        global_console().with(|console| console.set_global("$sharedConsoleProbe", Value::Int(7)));
        let seen = global_console().lock().get_global("sharedConsoleProbe");
        assert_eq!(seen.to_int(), 7);
    }
}
