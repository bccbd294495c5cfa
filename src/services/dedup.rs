use std::{collections::HashMap, time::Duration};
use tokio::time::Instant;

// a single file drop was observed to fire 8-9 identical events back to back.
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(100);

/// Lets the first occurrence of a key through and swallows repeats until its window expires.
#[derive(Debug)]
pub struct DedupGuard {
    window: Duration,
    expiries: HashMap<String, Instant>,
}

impl Default for DedupGuard {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl DedupGuard {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            expiries: HashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn should_process(&mut self, key: &str) -> bool {
        self.should_process_at(key, Instant::now())
    }

    /// Same as [DedupGuard::should_process] with an explicit clock reading.
    /// The window starts at the accepted call and is not extended by the repeats it swallows.
    pub fn should_process_at(&mut self, key: &str, now: Instant) -> bool {
        self.evict_expired(now);
        if self.expiries.contains_key(key) {
            return false;
        }
        self.expiries.insert(key.to_owned(), now + self.window);
        true
    }

    /// Keys currently being suppressed.
    pub fn pending(&self) -> usize {
        self.expiries.len()
    }

    fn evict_expired(&mut self, now: Instant) {
        self.expiries.retain(|_, expiry| *expiry > now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_call_wins_until_window_elapses() {
        let mut guard = DedupGuard::new(Duration::from_millis(100));
        let start = Instant::now();

        assert!(guard.should_process_at("/tmp/scene.blend", start));
        for ms in [0, 1, 20, 50, 99] {
            let now = start + Duration::from_millis(ms);
            assert!(!guard.should_process_at("/tmp/scene.blend", now));
        }
        assert!(guard.should_process_at("/tmp/scene.blend", start + Duration::from_millis(100)));
    }

    #[test]
    fn repeats_do_not_extend_the_window() {
        let mut guard = DedupGuard::new(Duration::from_millis(100));
        let start = Instant::now();
        assert!(guard.should_process_at("k", start));
        assert!(!guard.should_process_at("k", start + Duration::from_millis(90)));
        assert!(guard.should_process_at("k", start + Duration::from_millis(101)));
    }

    #[test]
    fn keys_are_independent_and_evicted() {
        let mut guard = DedupGuard::default();
        let start = Instant::now();
        assert!(guard.should_process_at("a", start));
        assert!(guard.should_process_at("b", start));
        assert_eq!(guard.pending(), 2);
        assert!(guard.should_process_at("c", start + guard.window() * 2));
        assert_eq!(guard.pending(), 1);
    }

    #[tokio::test]
    async fn uses_the_runtime_clock() {
        let mut guard = DedupGuard::new(Duration::from_millis(20));
        assert!(guard.should_process("drop"));
        assert!(!guard.should_process("drop"));
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(guard.should_process("drop"));
    }
}
