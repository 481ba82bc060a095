//! Local file-based block sink implementation.

use std::{path::PathBuf, sync::Mutex};

use async_trait::async_trait;
use rill_pipeline::{Block, BlockSink, Bytes, SinkError, StoreReceipt};
use serde::{Deserialize, Serialize};

/// JSON representation of a stored block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonBlock {
    /// Block id rendered as `input-<receiver>-<timestamp>`.
    pub block_id: String,
    /// Accept-order position of the block.
    pub sequence: u64,
    /// Item payloads (hex-encoded).
    pub items: Vec<String>,
}

/// JSON representation of the sink output file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JsonSinkData {
    /// Stored blocks in accept order.
    pub blocks: Vec<JsonBlock>,
}

/// A block sink that records blocks in memory and optionally mirrors them to
/// a JSON file.
#[derive(Debug)]
pub struct LocalBlockSink {
    output_path: Option<PathBuf>,
    data: Mutex<JsonSinkData>,
}

impl LocalBlockSink {
    /// Create a new local block sink that writes to a file.
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self { output_path: Some(output_path.into()), data: Mutex::new(JsonSinkData::default()) }
    }

    /// Create a new in-memory local block sink (no file output).
    pub fn in_memory() -> Self {
        Self { output_path: None, data: Mutex::new(JsonSinkData::default()) }
    }

    /// Get the current sink data.
    pub fn data(&self) -> JsonSinkData {
        self.data.lock().unwrap().clone()
    }

    /// Get the number of stored blocks.
    pub fn block_count(&self) -> usize {
        self.data.lock().unwrap().blocks.len()
    }

    /// Get the total number of items across all stored blocks.
    pub fn item_count(&self) -> usize {
        self.data.lock().unwrap().blocks.iter().map(|block| block.items.len()).sum()
    }

    /// Convert bytes to hex string.
    fn bytes_to_hex(bytes: &[u8]) -> String {
        format!("0x{}", bytes.iter().map(|b| format!("{:02x}", b)).collect::<String>())
    }

    /// Write data to file if output path is set.
    fn write_to_file(&self) -> Result<(), SinkError> {
        if let Some(ref path) = self.output_path {
            let data = self.data.lock().unwrap();
            let json = serde_json::to_string_pretty(&*data)
                .map_err(|e| SinkError::StoreFailed(format!("JSON serialization error: {}", e)))?;
            std::fs::write(path, json)
                .map_err(|e| SinkError::StoreFailed(format!("File write error: {}", e)))?;
        }
        Ok(())
    }
}

#[async_trait]
impl BlockSink for LocalBlockSink {
    type Item = Bytes;

    async fn store(&mut self, block: Block<Bytes>) -> Result<StoreReceipt, SinkError> {
        let block_id = block.id;

        let sequence = {
            let mut data = self.data.lock().unwrap();
            let sequence = data.blocks.len() as u64 + 1;
            data.blocks.push(JsonBlock {
                block_id: block_id.to_string(),
                sequence,
                items: block.items.iter().map(|item| Self::bytes_to_hex(item)).collect(),
            });
            sequence
        };

        self.write_to_file()?;

        Ok(StoreReceipt { block_id, sequence })
    }

    async fn health_check(&self) -> Result<(), SinkError> {
        Ok(())
    }
}
