// Call-log instrumentation for the data gateway
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// One underlying backend call.
#[derive(Debug, Clone)]
pub struct CallRecord {
    pub key: String,
    pub at: Instant,
    pub duration: Duration,
    pub ok: bool,
}

/// A key that was fetched more than once inside the observed window. An
/// early-warning signal for accidental repeated-fetch loops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepeatedFetch {
    pub key: String,
    pub count: usize,
}

/// Bounded in-memory log of underlying calls. Recording must never affect
/// user-visible behavior, so every lock failure here is swallowed.
#[derive(Debug)]
pub struct CallLog {
    records: Mutex<VecDeque<CallRecord>>,
    capacity: usize,
}

impl CallLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&self, key: &str, duration: Duration, ok: bool) {
        tracing::debug!(key, duration_ms = duration.as_millis() as u64, ok, "backend call");
        if let Ok(mut records) = self.records.lock() {
            if records.len() == self.capacity {
                records.pop_front();
            }
            records.push_back(CallRecord {
                key: key.to_string(),
                at: Instant::now(),
                duration,
                ok,
            });
        }
    }

    /// Aggregate calls sharing a key within `window` of now and flag counts
    /// greater than one.
    pub fn repeated_fetches(&self, window: Duration) -> Vec<RepeatedFetch> {
        let now = Instant::now();
        let mut counts: HashMap<String, usize> = HashMap::new();
        if let Ok(records) = self.records.lock() {
            for record in records.iter() {
                if now.duration_since(record.at) <= window {
                    *counts.entry(record.key.clone()).or_default() += 1;
                }
            }
        }

        let mut flagged: Vec<RepeatedFetch> = counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(key, count)| RepeatedFetch { key, count })
            .collect();
        flagged.sort_by(|a, b| a.key.cmp(&b.key));

        for repeat in &flagged {
            tracing::warn!(key = %repeat.key, count = repeat.count, "repeated fetch within window");
        }
        flagged
    }

    pub fn snapshot(&self) -> Vec<CallRecord> {
        self.records
            .lock()
            .map(|records| records.iter().cloned().collect())
            .unwrap_or_default()
    }
}
