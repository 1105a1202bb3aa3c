//! Readiness marker detection over noisy device logs
//!
//! The receiver announces itself with one of a few log lines. Device output
//! arrives in arbitrary pieces, so the scanner keeps a bounded trailing window
//! of lower-cased text and searches that instead of individual reads.

/// Substrings that mean the receiver is waiting for BEGIN
pub const READY_MARKERS: [&str; 3] = [
    "pocketctl serialrx_ready",
    "serialrx ready:",
    "serialrx: waiting for begin",
];

/// Maximum bytes of trailing text kept for matching
pub const WINDOW_SIZE: usize = 4096;

/// Bounded trailing-window matcher for readiness markers
#[derive(Debug, Clone)]
pub struct MarkerScanner {
    window: String,
    markers: Vec<String>,
    capacity: usize,
}

impl Default for MarkerScanner {
    fn default() -> Self {
        Self::new(READY_MARKERS, WINDOW_SIZE)
    }
}

impl MarkerScanner {
    /// Create a scanner for the given markers
    ///
    /// The capacity is raised to the longest marker if needed so a marker can
    /// always fit in the window.
    pub fn new<I, S>(markers: I, capacity: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let markers: Vec<String> = markers
            .into_iter()
            .map(|m| m.as_ref().to_lowercase())
            .filter(|m| !m.is_empty())
            .collect();
        let longest = markers.iter().map(String::len).max().unwrap_or(0);
        Self {
            window: String::new(),
            markers,
            capacity: capacity.max(longest),
        }
    }

    /// Append decoded text and test the window
    ///
    /// Returns the first marker found in the window, if any.
    pub fn push(&mut self, text: &str) -> Option<&str> {
        self.window.push_str(&text.to_lowercase());
        self.trim();
        self.matched()
    }

    /// First marker present in the current window
    pub fn matched(&self) -> Option<&str> {
        self.markers
            .iter()
            .find(|m| self.window.contains(m.as_str()))
            .map(String::as_str)
    }

    /// Current window contents
    pub fn window(&self) -> &str {
        &self.window
    }

    fn trim(&mut self) {
        if self.window.len() <= self.capacity {
            return;
        }
        let mut cut = self.window.len() - self.capacity;
        while !self.window.is_char_boundary(cut) {
            cut += 1;
        }
        self.window.drain(..cut);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_each_marker_case_insensitively() {
        for line in [
            "I (1234) ssh: POCKETCTL serialrx_ready target=/sdcard/x.bin\n",
            "I (1234) ssh: SerialRX Ready: target=/sdcard/x.bin\n",
            "serialrx: waiting for BEGIN <size> <crc32hex>\n",
        ] {
            let mut scanner = MarkerScanner::default();
            assert!(scanner.push(line).is_some(), "no match in {:?}", line);
        }
    }

    #[test]
    fn test_marker_split_across_reads() {
        let mut scanner = MarkerScanner::default();
        assert_eq!(scanner.push("boot ok\nserialrx rea"), None);
        assert_eq!(scanner.push("dy: target=/sd/a"), Some("serialrx ready:"));
    }

    #[test]
    fn test_unrelated_output_does_not_match() {
        let mut scanner = MarkerScanner::default();
        assert_eq!(scanner.push("serialrx: invalid target filename\n"), None);
        assert_eq!(scanner.push("serialrx_ready without prefix"), None);
    }

    #[test]
    fn test_window_is_bounded() {
        let mut scanner = MarkerScanner::new(["needle"], 16);
        scanner.push(&"x".repeat(100));
        assert_eq!(scanner.window().len(), 16);
        scanner.push("needle");
        assert_eq!(scanner.window(), "xxxxxxxxxxneedle");
        assert_eq!(scanner.matched(), Some("needle"));
    }

    #[test]
    fn test_old_text_falls_out_of_window() {
        let mut scanner = MarkerScanner::new(["needle"], 8);
        scanner.push("nee");
        scanner.push("--------");
        assert_eq!(scanner.push("dle"), None);
    }

    #[test]
    fn test_capacity_fits_longest_marker() {
        let mut scanner = MarkerScanner::new(["a-long-marker"], 4);
        assert_eq!(scanner.push("a-long-marker"), Some("a-long-marker"));
    }

    #[test]
    fn test_trim_respects_char_boundaries() {
        let mut scanner = MarkerScanner::new(["zz"], 5);
        scanner.push("ééééé");
        assert!(scanner.window().len() <= 5);
        assert!(scanner.window().chars().all(|c| c == 'é'));
    }
}
