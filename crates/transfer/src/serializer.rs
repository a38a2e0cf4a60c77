use std::time::{Duration, Instant};

use printpush_protocol::constants::SERIALIZE_PROGRESS_INTERVAL;
use tracing::debug;

/// Concatenates G-code lines into a byte buffer without starving the runtime.
///
/// Progress is reported at most once per `interval` of wall-clock time, and
/// the task yields to the scheduler each time it reports, so network and UI
/// work queued on the same runtime keeps running during long jobs.
#[derive(Debug, Clone, Copy)]
pub struct Serializer {
    interval: Duration,
}

impl Default for Serializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Serializer {
    /// Creates a serializer reporting every 50 ms.
    pub fn new() -> Self {
        Self {
            interval: SERIALIZE_PROGRESS_INTERVAL,
        }
    }

    /// Creates a serializer with a custom reporting interval.
    ///
    /// A zero interval reports (and yields) after every line.
    pub fn with_interval(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Serializes `lines` in order, byte for byte.
    ///
    /// `progress` receives the fraction of lines written so far and is always
    /// called one last time with `1.0`, including for an empty input.
    pub async fn serialize<S, F>(&self, lines: &[S], mut progress: F) -> Vec<u8>
    where
        S: AsRef<str>,
        F: FnMut(f64),
    {
        let total = lines.len();
        let capacity = lines.iter().map(|l| l.as_ref().len()).sum();
        let mut buf = Vec::with_capacity(capacity);

        let mut next_yield = Instant::now() + self.interval;
        for (i, line) in lines.iter().enumerate() {
            buf.extend_from_slice(line.as_ref().as_bytes());

            if Instant::now() >= next_yield {
                progress((i + 1) as f64 / total as f64);
                tokio::task::yield_now().await;
                next_yield = Instant::now() + self.interval;
            }
        }

        progress(1.0);
        debug!(lines = total, bytes = buf.len(), "serialized gcode");
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn output_is_concatenation() {
        let lines = ["G28\n", "G1 X0 Y0\n", "", "M104 S200\n"];
        let out = Serializer::new().serialize(&lines[..], |_| {}).await;
        assert_eq!(out, b"G28\nG1 X0 Y0\nM104 S200\n");
    }

    #[tokio::test]
    async fn keeps_non_ascii_bytes() {
        let lines = vec!["; Düse\n".to_string(), "; 温度\n".to_string()];
        let out = Serializer::new().serialize(&lines, |_| {}).await;
        assert_eq!(out, "; Düse\n; 温度\n".as_bytes());
    }

    #[tokio::test]
    async fn empty_input_reports_once() {
        let lines: Vec<String> = Vec::new();
        let mut calls = Vec::new();
        let out = Serializer::new()
            .serialize(&lines, |p| calls.push(p))
            .await;
        assert!(out.is_empty());
        assert_eq!(calls, vec![1.0]);
    }

    #[tokio::test]
    async fn coarse_interval_reports_only_completion() {
        let lines: Vec<String> = (0..1000).map(|i| format!("G1 X{i}\n")).collect();
        let mut calls = Vec::new();
        Serializer::with_interval(Duration::from_secs(3600))
            .serialize(&lines, |p| calls.push(p))
            .await;
        assert_eq!(calls, vec![1.0]);
    }

    #[tokio::test]
    async fn zero_interval_reports_every_line_monotonically() {
        let lines: Vec<String> = (0..10).map(|i| format!("G1 Z{i}\n")).collect();
        let mut calls = Vec::new();
        Serializer::with_interval(Duration::ZERO)
            .serialize(&lines, |p| calls.push(p))
            .await;

        // One per line plus the final completion.
        assert_eq!(calls.len(), 11);
        assert!(calls.windows(2).all(|w| w[0] <= w[1]));
        assert!(calls.iter().all(|p| (0.0..=1.0).contains(p)));
        assert_eq!(calls[0], 0.1);
        assert_eq!(*calls.last().unwrap(), 1.0);
    }

    #[tokio::test]
    async fn yields_to_other_tasks() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicBool, Ordering};

        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        // Current-thread runtime: the spawned task only runs if serialize yields.
        let other = tokio::spawn(async move { flag.store(true, Ordering::SeqCst) });

        let lines: Vec<String> = (0..3).map(|i| format!("G1 E{i}\n")).collect();
        let mut seen_during = false;
        Serializer::with_interval(Duration::ZERO)
            .serialize(&lines, |_| seen_during |= ran.load(Ordering::SeqCst))
            .await;

        assert!(seen_during);
        other.await.unwrap();
    }
}
