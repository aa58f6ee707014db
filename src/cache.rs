//! Init-once holders for artifacts that are read-only after their first load.

use std::sync::{Arc, Mutex, OnceLock};

/// Lazily loaded, shared, immutable value.
///
/// The first successful `get_or_try_init` stores the value; later calls hand
/// out the same `Arc` without running the loader. Concurrent first calls are
/// serialized so the loader runs at most once per successful load. A failed
/// load stores nothing, so the next call retries.
#[derive(Debug)]
pub struct Memoized<T> {
    value: OnceLock<Arc<T>>,
    init: Mutex<()>,
}

impl<T> Memoized<T> {
    pub const fn new() -> Self {
        Self {
            value: OnceLock::new(),
            init: Mutex::new(()),
        }
    }

    pub fn get(&self) -> Option<Arc<T>> {
        self.value.get().cloned()
    }

    pub fn get_or_try_init<E>(&self, load: impl FnOnce() -> Result<T, E>) -> Result<Arc<T>, E> {
        if let Some(value) = self.value.get() {
            return Ok(value.clone());
        }

        // A poisoned guard only means another loader panicked; the slot is
        // still either empty or fully set.
        let _guard = self.init.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(value) = self.value.get() {
            return Ok(value.clone());
        }

        let loaded = Arc::new(load()?);
        let _ = self.value.set(loaded.clone());
        Ok(loaded)
    }
}

impl<T> Default for Memoized<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn loader_runs_once() {
        let memo = Memoized::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = memo
                .get_or_try_init(|| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(7)
                })
                .unwrap();
            assert_eq!(*value, 7);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_load_is_retried() {
        let memo: Memoized<i32> = Memoized::new();
        assert!(memo.get_or_try_init(|| Err("boom")).is_err());
        assert!(memo.get().is_none());

        let value = memo.get_or_try_init(|| Ok::<_, &str>(3)).unwrap();
        assert_eq!(*value, 3);
    }

    #[test]
    fn concurrent_first_access_loads_once() {
        let memo = Arc::new(Memoized::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let memo = memo.clone();
                let calls = calls.clone();
                std::thread::spawn(move || {
                    memo.get_or_try_init(|| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(std::time::Duration::from_millis(10));
                        Ok::<_, String>(String::from("table"))
                    })
                    .map(|v| v.len())
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), Ok(5));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
