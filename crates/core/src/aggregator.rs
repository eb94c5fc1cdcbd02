use std::sync::{Mutex, MutexGuard};

/// Buffer of raw candidate input waiting for the next batch.
///
/// Producers (transcript callbacks, the code-delta watcher) call `push` from any
/// task; the scheduler calls `drain_all` once per tick. The lock is only held
/// for a `Vec::push` or a `mem::take`, so neither side blocks for long, and a
/// push is either in the snapshot taken by a drain or in the next one.
#[derive(Debug, Default)]
pub struct FragmentAggregator {
    fragments: Mutex<Vec<String>>,
}

impl FragmentAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, fragment: impl Into<String>) {
        let fragment = fragment.into();
        tracing::trace!("Buffered fragment: {:?}", fragment);
        self.lock().push(fragment);
    }

    /// Takes every buffered fragment in push order and leaves the buffer empty.
    pub fn drain_all(&self) -> Vec<String> {
        std::mem::take(&mut *self.lock())
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A producer panicking mid-push cannot leave the Vec half-written, so a
    // poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.fragments
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_drain_returns_fragments_in_push_order() {
        let aggregator = FragmentAggregator::new();
        aggregator.push("public class");
        aggregator.push("Solution");

        assert_eq!(aggregator.drain_all(), vec!["public class", "Solution"]);
        assert!(aggregator.is_empty());
    }

    #[test]
    fn test_drain_on_empty_buffer_is_a_no_op() {
        let aggregator = FragmentAggregator::new();
        assert!(aggregator.drain_all().is_empty());
        assert!(aggregator.drain_all().is_empty());
    }

    #[test]
    fn test_fragments_pushed_after_a_drain_belong_to_the_next_one() {
        let aggregator = FragmentAggregator::new();
        aggregator.push("a");
        let first = aggregator.drain_all();
        aggregator.push("b");
        aggregator.push("c");
        let second = aggregator.drain_all();

        assert_eq!(first, vec!["a"]);
        assert_eq!(second, vec!["b", "c"]);
    }

    #[test]
    fn test_concurrent_pushes_are_neither_lost_nor_duplicated() {
        const PRODUCERS: usize = 4;
        const PER_PRODUCER: usize = 500;

        let aggregator = Arc::new(FragmentAggregator::new());
        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let aggregator = aggregator.clone();
                std::thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        aggregator.push(format!("{p}:{i}"));
                    }
                })
            })
            .collect();

        let mut drained = Vec::new();
        while producers.iter().any(|h| !h.is_finished()) {
            drained.extend(aggregator.drain_all());
        }
        for handle in producers {
            handle.join().unwrap();
        }
        drained.extend(aggregator.drain_all());

        assert_eq!(drained.len(), PRODUCERS * PER_PRODUCER);

        // Each producer's fragments must come out in the order it pushed them.
        for p in 0..PRODUCERS {
            let prefix = format!("{p}:");
            let seen: Vec<usize> = drained
                .iter()
                .filter_map(|f| f.strip_prefix(&prefix))
                .map(|i| i.parse().unwrap())
                .collect();
            assert_eq!(seen, (0..PER_PRODUCER).collect::<Vec<_>>());
        }
    }
}
