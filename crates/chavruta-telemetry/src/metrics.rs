//! Request and tool counters surfaced through `/healthz`

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Process-wide counters
///
/// Every MCP request observes its wall time; `tools/call` additionally
/// observes per-tool. The web counters track fetch activity.
#[derive(Default)]
pub struct Metrics {
    total_requests: AtomicU64,
    lat_sum_ms: AtomicU64,
    lat_count: AtomicU64,
    errors: AtomicU64,
    tools: Mutex<HashMap<String, ToolStats>>,
    fetches: AtomicU64,
    cache_hits: AtomicU64,
    robots_blocked: AtomicU64,
    fetch_errors: AtomicU64,
    python_heartbeat: Mutex<Option<PythonHeartbeat>>,
}

#[derive(Debug, Default, Clone)]
struct ToolStats {
    count: u64,
    lat_sum_ms: u64,
    lat_count: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PythonHeartbeat {
    pub status: String,
    pub checked_at: String,
}

impl Metrics {
    /// Record one MCP request with its wall-clock duration
    pub fn observe_request(&self, elapsed_ms: u64) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.lat_sum_ms.fetch_add(elapsed_ms, Ordering::Relaxed);
        self.lat_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one tool invocation with its wall-clock duration
    pub fn observe_tool(&self, tool: &str, elapsed_ms: u64) {
        let mut tools = self.tools.lock().expect("metrics lock poisoned");
        let stats = tools.entry(tool.to_owned()).or_default();
        stats.count += 1;
        stats.lat_sum_ms += elapsed_ms;
        stats.lat_count += 1;
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch(&self) {
        self.fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_robots_blocked(&self) {
        self.robots_blocked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch_error(&self) {
        self.fetch_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Update the downstream chain heartbeat
    pub fn set_python_heartbeat(&self, status: &str) {
        let mut hb = self.python_heartbeat.lock().expect("metrics lock poisoned");
        *hb = Some(PythonHeartbeat {
            status: status.to_owned(),
            checked_at: chrono::Utc::now().to_rfc3339(),
        });
    }

    #[must_use]
    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    /// Point-in-time snapshot for `/healthz`
    ///
    /// `cache_size` is supplied by the caller since the response cache
    /// lives outside this registry.
    pub fn snapshot(&self, cache_size: usize) -> MetricsSnapshot {
        let tools = self.tools.lock().expect("metrics lock poisoned");

        let tool_counts = tools.iter().map(|(k, v)| (k.clone(), v.count)).collect();
        let tool_latencies = tools
            .iter()
            .map(|(k, v)| {
                (
                    k.clone(),
                    ToolLatency {
                        sum: v.lat_sum_ms,
                        count: v.lat_count,
                    },
                )
            })
            .collect();

        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            tool_counts,
            lat_sum_ms: self.lat_sum_ms.load(Ordering::Relaxed),
            lat_count: self.lat_count.load(Ordering::Relaxed),
            tool_latencies,
            errors: self.errors.load(Ordering::Relaxed),
            cache_size,
            counters: WebCounters {
                fetches: self.fetches.load(Ordering::Relaxed),
                cache_hits: self.cache_hits.load(Ordering::Relaxed),
                robots_blocked: self.robots_blocked.load(Ordering::Relaxed),
                errors: self.fetch_errors.load(Ordering::Relaxed),
            },
            python_chain_heartbeat: self.python_heartbeat.lock().expect("metrics lock poisoned").clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub tool_counts: HashMap<String, u64>,
    pub lat_sum_ms: u64,
    pub lat_count: u64,
    pub tool_latencies: HashMap<String, ToolLatency>,
    pub errors: u64,
    pub cache_size: usize,
    pub counters: WebCounters,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub python_chain_heartbeat: Option<PythonHeartbeat>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolLatency {
    pub sum: u64,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebCounters {
    pub fetches: u64,
    pub cache_hits: u64,
    pub robots_blocked: u64,
    pub errors: u64,
}
