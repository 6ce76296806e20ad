use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use serde::Serialize;

pub fn init_logging(max_level: &str) {
    // a second init (tests, embedding) keeps the first logger
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(max_level))
        .try_init();
}

#[derive(Debug, Serialize)]
pub struct HistogramStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Mapping from percentile label (e.g., "p90", "p99") to value.
    pub percentiles: BTreeMap<String, f64>,
}

impl HistogramStats {
    pub fn compute(samples: &[ordered_float::OrderedFloat<f64>]) -> Self {
        let len = samples.len();
        let mut values: Vec<f64> = samples.iter().map(|v| v.into_inner()).collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        if len == 0 {
            return Self {
                count: 0,
                min: 0.0,
                max: 0.0,
                mean: 0.0,
                percentiles: BTreeMap::new(),
            };
        }

        let mean = values.iter().sum::<f64>() / len as f64;
        let percentile = |pct: f64| -> f64 {
            let idx = ((pct / 100.0) * (len as f64 - 1.0)).round() as usize;
            values[idx]
        };

        const PCTS: &[(f64, &str)] = &[
            (10.0, "p10"),
            (50.0, "p50"),
            (90.0, "p90"),
            (99.0, "p99"),
        ];
        let percentiles = PCTS
            .iter()
            .map(|(pct, label)| ((*label).to_string(), percentile(*pct)))
            .collect();

        Self {
            count: len,
            min: values[0],
            max: values[len - 1],
            mean,
            percentiles,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MetricDump {
    pub name: String,
    pub unit: Option<String>,
    pub description: Option<String>,
    /// For counters and gauges, holds the raw numeric value. `None` for histograms.
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub histogram: Option<HistogramStats>,
}

/// Snapshot side of a `metrics-util` debugging recorder.
pub struct MetricsRecorder {
    snapshotter: Snapshotter,
}

impl MetricsRecorder {
    /// Snapshots whatever `recorder` records, whether it is installed globally afterwards or
    /// used through `metrics::with_local_recorder`.
    pub fn with_recorder(recorder: &DebuggingRecorder) -> Self {
        Self {
            snapshotter: recorder.snapshotter(),
        }
    }

    /// Installs a fresh debugging recorder as the process-global recorder.
    pub fn install() -> Result<Self> {
        let recorder = DebuggingRecorder::new();
        let me = Self::with_recorder(&recorder);
        recorder
            .install()
            .map_err(|e| anyhow::anyhow!("cannot install metrics recorder: {}", e))?;
        Ok(me)
    }

    pub fn snapshot_metrics(&self) -> HashMap<String, MetricDump> {
        self.snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .map(|(ckey, unit, description, value)| {
                let name = ckey.key().name().to_owned();
                let (value, histogram) = match value {
                    DebugValue::Counter(v) => (Some(v.to_string()), None),
                    DebugValue::Gauge(v) => (Some(v.into_inner().to_string()), None),
                    DebugValue::Histogram(samples) => {
                        (None, Some(HistogramStats::compute(&samples)))
                    }
                };
                let dump = MetricDump {
                    name: name.clone(),
                    unit: unit.map(|u| u.as_str().to_owned()),
                    description: description.map(|d| d.to_string()),
                    value,
                    histogram,
                };
                (name, dump)
            })
            .collect()
    }

    /// Counter and gauge values by name. Histograms are skipped.
    pub fn snapshot_values(&self) -> HashMap<String, f64> {
        self.snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .filter_map(|(ckey, _unit, _descr, value)| {
                let name = ckey.key().name().to_owned();
                match value {
                    DebugValue::Counter(v) => Some((name, v as f64)),
                    DebugValue::Gauge(v) => Some((name, v.into_inner())),
                    DebugValue::Histogram(_) => None,
                }
            })
            .collect()
    }
}
