//! rill demo binary.
//!
//! Wires a block generator to a local sink, feeds it synthetic items, and
//! logs a summary of the blocks produced.

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/rill-stream/rill/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

use std::{sync::Arc, time::Duration};

use clap::Parser;
use eyre::Result;
use rill_generator::{BlockGenerator, BlockListener, GeneratorConfig, ListenerError};
use rill_local::LocalBlockSink;
use rill_pipeline::{Block, BlockId, BlockSink, Bytes};
use tokio::sync::Mutex;
use tracing::{debug, error, info, trace, Level};
use tracing_subscriber::EnvFilter;

/// rill demo CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "rill")]
#[command(about = "Streaming-ingest block generator demo")]
#[command(version)]
struct Args {
    /// Number of synthetic items to feed through the generator.
    #[arg(long, default_value_t = 5_000)]
    items: usize,

    /// Size of each synthetic item in bytes.
    #[arg(long, default_value_t = 64)]
    item_size: usize,

    /// Roll period in milliseconds.
    #[arg(long, default_value_t = 200)]
    block_interval_ms: u64,

    /// Block queue capacity.
    #[arg(long, default_value_t = 10)]
    queue_capacity: usize,

    /// Admission cap in items per second (0 = unlimited).
    #[arg(long, default_value_t = 0)]
    rate: u32,

    /// Mirror stored blocks to this JSON file.
    #[arg(long)]
    output: Option<std::path::PathBuf>,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Initialize the tracing subscriber with the given verbosity level.
///
/// `RUST_LOG` overrides the default filter when set.
fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Listener that forwards completed blocks to a local sink.
struct SinkListener {
    sink: Mutex<LocalBlockSink>,
}

#[async_trait::async_trait]
impl BlockListener for SinkListener {
    type Item = Bytes;
    type Metadata = u64;

    fn on_add_data(&self, items: &[Bytes], metadata: &u64) -> Result<(), ListenerError> {
        trace!(items = items.len(), offset = metadata, "Admitted items");
        Ok(())
    }

    fn on_generate_block(&self, block_id: BlockId) -> Result<(), ListenerError> {
        debug!(%block_id, "Sealed block");
        Ok(())
    }

    async fn on_push_block(&self, block: Block<Bytes>) -> Result<(), ListenerError> {
        let receipt = self.sink.lock().await.store(block).await?;
        debug!(block_id = %receipt.block_id, sequence = receipt.sequence, "Stored block");
        Ok(())
    }

    fn on_error(&self, message: &str, cause: &ListenerError) {
        error!(error = %cause, "{}", message);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let sink = match &args.output {
        Some(path) => LocalBlockSink::new(path),
        None => LocalBlockSink::in_memory(),
    };
    let listener = Arc::new(SinkListener { sink: Mutex::new(sink) });

    let config = GeneratorConfig::builder()
        .block_interval_ms(args.block_interval_ms)
        .block_queue_capacity(args.queue_capacity)
        .max_rate_per_second(args.rate)
        .build();
    let generator = BlockGenerator::new(Arc::clone(&listener), 0, config)?;

    generator.start()?;
    info!(items = args.items, item_size = args.item_size, rate = args.rate, "Feeding synthetic items");

    for offset in 0..args.items {
        let payload = Bytes(vec![(offset % 256) as u8; args.item_size]);
        generator.add_with_callback(payload, offset as u64).await?;
    }

    generator.stop().await;

    let metrics = generator.metrics();
    let stored_blocks = listener.sink.lock().await.block_count();
    info!(
        items_admitted = metrics.items_admitted,
        blocks_pushed = metrics.blocks_pushed,
        stored_blocks,
        "Demo complete"
    );
    Ok(())
}
