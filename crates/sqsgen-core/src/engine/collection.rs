use num_bigint::BigUint;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::warn;

/// One candidate structure discovered by the search.
///
/// Workers push results with `rank: None`; the driver attaches the rank when
/// it drains the collection after the workers join. Inside the driver the
/// `parameters` buffer holds the reduced `K * P` snapshot; at emission it is
/// expanded to the full `K * S * S` layout.
#[derive(Debug, Clone, PartialEq)]
pub struct SqsResult {
    pub objective: f64,
    pub rank: Option<BigUint>,
    pub configuration: Vec<u8>,
    pub parameters: Vec<f64>,
}

/// Bounded, concurrently written buffer of the best candidates found so far.
///
/// The buffer is a ring ordered by discovery time: when full, the oldest
/// entry is evicted, which biases the contents toward configurations found
/// near the current minimum. The best-objective watermark is shared through
/// a relaxed atomic; it is a pruning heuristic, so stale reads merely admit
/// a few extra candidates that the drain step filters out again.
///
/// A poisoned buffer lock degrades instead of cascading: further pushes are
/// dropped with a warning and the drain reports no results.
#[derive(Debug)]
pub struct ResultCollection {
    buffer: Mutex<VecDeque<SqsResult>>,
    best_objective: AtomicU64,
    capacity: usize,
}

impl ResultCollection {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: Mutex::new(VecDeque::with_capacity(capacity)),
            best_objective: AtomicU64::new(f64::MAX.to_bits()),
            capacity,
        }
    }

    /// Current best-objective watermark (relaxed load).
    pub fn best_objective(&self) -> f64 {
        f64::from_bits(self.best_objective.load(Ordering::Relaxed))
    }

    /// Publishes a new watermark (relaxed store). Writes are not required to
    /// be monotonic; the drain step does not depend on it.
    pub fn update_best_objective(&self, objective: f64) {
        self.best_objective.store(objective.to_bits(), Ordering::Relaxed);
    }

    pub fn push(&self, result: SqsResult) {
        let Ok(mut buffer) = self.buffer.lock() else {
            warn!("result buffer mutex poisoned; dropping a candidate");
            return;
        };
        if buffer.len() == self.capacity {
            buffer.pop_front();
        }
        buffer.push_back(result);
    }

    /// Takes a snapshot of the current contents, oldest first. Must only be
    /// called after all workers have joined.
    pub fn drain(&self) -> Vec<SqsResult> {
        let Ok(mut buffer) = self.buffer.lock() else {
            warn!("result buffer mutex poisoned; no results can be recovered");
            return Vec::new();
        };
        buffer.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().map_or(0, |buffer| buffer.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
