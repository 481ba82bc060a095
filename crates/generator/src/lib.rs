#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/rill-stream/rill/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod config;
pub use config::{GeneratorConfig, GeneratorConfigBuilder};

mod error;
pub use error::{GeneratorError, ListenerError};

mod state;
pub use state::GeneratorState;

mod listener;
pub use listener::BlockListener;

mod metrics;
pub use metrics::{GeneratorMetrics, MetricsSnapshot};

mod queue;

mod generator;
pub use generator::BlockGenerator;
