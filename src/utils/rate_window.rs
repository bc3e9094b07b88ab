use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Sliding-window failure counter. Used to block meeting-code verification
/// after too many failed attempts per (user, road).
pub struct RateWindow {
    max_fails: u32,
    window: Duration,
    hits: Mutex<HashMap<(i32, i32), Vec<Instant>>>,
}

impl RateWindow {
    pub fn new(max_fails: u32, window: Duration) -> Self {
        Self {
            max_fails,
            window,
            hits: Mutex::new(HashMap::new()),
        }
    }

    pub fn register_failure(&self, key: (i32, i32)) {
        let mut hits = self.hits.lock().unwrap();
        let entry = hits.entry(key).or_default();
        let cutoff = Instant::now() - self.window;
        entry.retain(|t| *t > cutoff);
        entry.push(Instant::now());
    }

    pub fn is_blocked(&self, key: (i32, i32)) -> bool {
        let mut hits = self.hits.lock().unwrap();
        let Some(entry) = hits.get_mut(&key) else {
            return false;
        };
        let cutoff = Instant::now() - self.window;
        entry.retain(|t| *t > cutoff);
        entry.len() >= self.max_fails as usize
    }

    /// Forget failures for a key, e.g. after a successful verification.
    pub fn clear(&self, key: (i32, i32)) {
        self.hits.lock().unwrap().remove(&key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_after_max_failures() {
        let w = RateWindow::new(3, Duration::from_secs(60));
        let key = (21, 99);
        assert!(!w.is_blocked(key));
        w.register_failure(key);
        w.register_failure(key);
        assert!(!w.is_blocked(key));
        w.register_failure(key);
        assert!(w.is_blocked(key));
    }

    #[test]
    fn keys_are_independent() {
        let w = RateWindow::new(1, Duration::from_secs(60));
        w.register_failure((1, 1));
        assert!(w.is_blocked((1, 1)));
        assert!(!w.is_blocked((1, 2)));
    }

    #[test]
    fn clear_resets_the_counter() {
        let w = RateWindow::new(1, Duration::from_secs(60));
        w.register_failure((1, 1));
        assert!(w.is_blocked((1, 1)));
        w.clear((1, 1));
        assert!(!w.is_blocked((1, 1)));
    }

    #[test]
    fn old_failures_expire() {
        let w = RateWindow::new(1, Duration::from_millis(10));
        w.register_failure((1, 1));
        std::thread::sleep(Duration::from_millis(20));
        assert!(!w.is_blocked((1, 1)));
    }
}
