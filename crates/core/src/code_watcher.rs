/// Minimum number of new lines before typed code is submitted as a fragment.
pub const DEFAULT_LINE_THRESHOLD: usize = 3;

/// Turns editor change notifications into input fragments.
///
/// The watcher remembers a baseline line count. When the code grows by at least
/// `threshold` lines past it, the lines beyond the baseline are returned and the
/// baseline moves up. Smaller growth accumulates; deletions lower the baseline.
#[derive(Debug, Clone)]
pub struct CodeDeltaWatcher {
    baseline_lines: usize,
    threshold: usize,
}

impl CodeDeltaWatcher {
    pub fn new(initial_code: &str) -> Self {
        Self::with_threshold(initial_code, DEFAULT_LINE_THRESHOLD)
    }

    pub fn with_threshold(initial_code: &str, threshold: usize) -> Self {
        Self {
            baseline_lines: initial_code.lines().count(),
            threshold: threshold.max(1),
        }
    }

    pub fn observe(&mut self, code: &str) -> Option<String> {
        let lines: Vec<&str> = code.lines().collect();

        if lines.len() < self.baseline_lines {
            self.baseline_lines = lines.len();
            return None;
        }
        if lines.len() - self.baseline_lines < self.threshold {
            return None;
        }

        let added = lines[self.baseline_lines..].join("\n");
        self.baseline_lines = lines.len();
        Some(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_new_lines_are_submitted() {
        let mut watcher = CodeDeltaWatcher::new("class Solution {\n}");
        let code = "class Solution {\n}\nint a = 1;\nint b = 2;\nint c = 3;";

        assert_eq!(
            watcher.observe(code),
            Some("int a = 1;\nint b = 2;\nint c = 3;".to_string())
        );
        // Same code again: nothing new.
        assert_eq!(watcher.observe(code), None);
    }

    #[test]
    fn test_small_edits_accumulate_until_threshold() {
        let mut watcher = CodeDeltaWatcher::new("");
        assert_eq!(watcher.observe("a"), None);
        assert_eq!(watcher.observe("a\nb"), None);
        assert_eq!(watcher.observe("a\nb\nc"), Some("a\nb\nc".to_string()));
    }

    #[test]
    fn test_deleting_lines_lowers_the_baseline() {
        let mut watcher = CodeDeltaWatcher::new("1\n2\n3\n4\n5");
        assert_eq!(watcher.observe("1\n2"), None);
        assert_eq!(watcher.observe("1\n2\nx\ny\nz"), Some("x\ny\nz".to_string()));
    }
}
