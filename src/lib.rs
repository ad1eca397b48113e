/*!
piidigger: a multi-threaded filesystem scanner for PII.

A fixed pipeline of worker pools connected by bounded queues walks the
filesystem, admits candidate files, streams their text through pluggable
detectors, and fans redacted findings out to structured result sinks.
*/

pub mod config;
pub mod console;
pub mod counters;
pub mod detect;
pub mod dispatch;
pub mod error;
pub mod extract;
pub mod findings;
pub mod logging;
pub mod manager;
pub mod mime;
pub mod output;
pub mod pipeline;
pub mod platform;
pub mod progress;
pub mod queue;
pub mod registry;
pub mod scan;

pub use config::{Config, OutputFormat};
pub use counters::{CounterSnapshot, ScanCounters};
pub use error::{ConfigError, ExtractError, PipelineError, exit_code};
pub use findings::Finding;
pub use manager::{StopFlag, WorkerManager};
pub use pipeline::{ScanSummary, run};
pub use queue::{Envelope, WorkQueue};
pub use scan::FileRef;
