//! Bucket keys and per-window request timestamps.

/// A key that identifies one identifier's bucket within one fixed window.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    /// The caller-supplied identifier, usually a client address
    pub identifier: String,
    /// Window index, `floor(now / window_ms)`
    pub window: u64,
}

impl BucketKey {
    /// Create a new bucket key.
    pub fn new(identifier: &str, window: u64) -> Self {
        Self {
            identifier: identifier.to_string(),
            window,
        }
    }
}

impl std::fmt::Display for BucketKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.identifier, self.window)
    }
}

/// Admitted request timestamps for one bucket, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bucket {
    timestamps: Vec<u64>,
}

impl Bucket {
    /// Drop any timestamp earlier than `window_start`.
    pub fn retain_from(&mut self, window_start: u64) {
        self.timestamps.retain(|&ts| ts >= window_start);
    }

    /// Record an admitted request.
    pub fn record(&mut self, now: u64) {
        self.timestamps.push(now);
    }

    pub fn count(&self) -> u64 {
        self.timestamps.len() as u64
    }

    /// Earliest recorded timestamp, if any.
    pub fn oldest(&self) -> Option<u64> {
        self.timestamps.iter().copied().min()
    }
}
