#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/rill-stream/rill/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod sink;
pub use sink::{JsonBlock, JsonSinkData, LocalBlockSink};
