use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Default)]
pub struct LookupMetrics {
    pub total_lookups: u64,
    pub cache_hits: u64,
    pub fetches: u64,
    pub fetch_failures: u64,
    pub fetch_latencies: VecDeque<u64>, // milliseconds
}

#[derive(Debug, Clone, Default)]
pub struct ExpansionTotals {
    pub expansions: u64,
    pub unresolved_nodes: u64,
}

#[derive(Clone)]
pub struct MetricsCollector {
    state: Arc<Mutex<MetricsState>>,
}

struct MetricsState {
    lookups: LookupMetrics,
    expansions: ExpansionTotals,
    max_history: usize,
}

impl MetricsCollector {
    pub fn new(max_history: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(MetricsState {
                lookups: LookupMetrics::default(),
                expansions: ExpansionTotals::default(),
                max_history: max_history.max(1),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MetricsState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record_cache_hit(&self) {
        let mut state = self.lock();
        state.lookups.total_lookups += 1;
        state.lookups.cache_hits += 1;
    }

    pub fn record_fetch(&self, latency_ms: u64, succeeded: bool) {
        let mut state = self.lock();
        state.lookups.total_lookups += 1;
        state.lookups.fetches += 1;
        if !succeeded {
            state.lookups.fetch_failures += 1;
        }
        state.lookups.fetch_latencies.push_back(latency_ms);
        if state.lookups.fetch_latencies.len() > state.max_history {
            state.lookups.fetch_latencies.pop_front();
        }
    }

    pub fn record_expansion(&self, unresolved: usize) {
        let mut state = self.lock();
        state.expansions.expansions += 1;
        state.expansions.unresolved_nodes += unresolved as u64;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let state = self.lock();
        let l = &state.lookups;

        let mut sorted_latencies: Vec<u64> = l.fetch_latencies.iter().copied().collect();
        sorted_latencies.sort_unstable();

        let hit_rate = if l.total_lookups > 0 {
            l.cache_hits as f32 / l.total_lookups as f32
        } else {
            0.0
        };

        MetricsSnapshot {
            total_lookups: l.total_lookups,
            cache_hits: l.cache_hits,
            fetches: l.fetches,
            fetch_failures: l.fetch_failures,
            hit_rate,
            fetch_p50_ms: percentile(&sorted_latencies, 50.0),
            fetch_p95_ms: percentile(&sorted_latencies, 95.0),
            fetch_p99_ms: percentile(&sorted_latencies, 99.0),
            expansions: state.expansions.expansions,
            unresolved_nodes: state.expansions.unresolved_nodes,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(1024)
    }
}

fn percentile(sorted: &[u64], p: f32) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let idx = ((p / 100.0) * (sorted.len() as f32)).ceil() as usize;
    sorted[idx.saturating_sub(1).min(sorted.len() - 1)]
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MetricsSnapshot {
    pub total_lookups: u64,
    pub cache_hits: u64,
    pub fetches: u64,
    pub fetch_failures: u64,
    pub hit_rate: f32,
    pub fetch_p50_ms: u64,
    pub fetch_p95_ms: u64,
    pub fetch_p99_ms: u64,
    pub expansions: u64,
    pub unresolved_nodes: u64,
}
