pub mod benchmark;
pub mod clock;
pub mod collector;
pub mod concurrent;
pub mod metric;
pub mod report;
pub mod store;
pub mod trend;

pub use clock::{Clock, ManualClock, SystemClock};
pub use collector::{MetricsCollector, RealTimeStats};
pub use concurrent::{ConcurrencyReport, ConcurrentMetricsCollector, ThreadStats, WorkerId};
pub use metric::{Observation, RequestMetric};
pub use report::PerformanceReport;
pub use trend::{classify_trend, Trend};
