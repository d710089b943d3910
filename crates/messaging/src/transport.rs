use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, watch};

use crate::{Delivery, Headers, OutboundMessage, RecordMetadata, TransportError};

/// Moves keyed messages to a broker.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// Sends one message. Messages with equal keys keep their relative order.
    async fn send(&self, message: OutboundMessage) -> Result<RecordMetadata, TransportError>;
}

#[derive(Debug, Clone)]
struct StoredRecord {
    key: String,
    payload: Vec<u8>,
    headers: Headers,
    timestamp: DateTime<Utc>,
}

/// Retained tail of one partition's log.
#[derive(Debug, Clone, Default)]
struct Partition {
    /// Offset of the first retained record.
    base: u64,
    records: VecDeque<StoredRecord>,
}

impl Partition {
    fn end(&self) -> u64 {
        self.base + self.records.len() as u64
    }

    /// Drops every record below `offset`.
    fn truncate_before(&mut self, offset: u64) {
        let drop = offset.saturating_sub(self.base).min(self.records.len() as u64);
        self.records.drain(..drop as usize);
        self.base += drop;
    }
}

#[derive(Debug, Default)]
struct TransportState {
    partitions: Vec<Partition>,
    /// Next offset to read, per (group, partition).
    committed: HashMap<(String, usize), u64>,
    /// Groups whose progress holds records back from being dropped.
    groups: Vec<String>,
    fail_on_send: bool,
}

impl TransportState {
    fn committed(&self, group: &str, partition: usize) -> u64 {
        let base = self.partitions.get(partition).map_or(0, |p| p.base);
        self.committed
            .get(&(group.to_string(), partition))
            .copied()
            .unwrap_or(0)
            .max(base)
    }

    /// Drops records every registered group has committed.
    fn reclaim(&mut self, partition: usize) {
        let Some(low_water) = self
            .groups
            .iter()
            .map(|group| self.committed(group, partition))
            .min()
        else {
            return;
        };
        if let Some(log) = self.partitions.get_mut(partition) {
            log.truncate_before(low_water);
        }
    }
}

/// In-memory partitioned log.
///
/// Behaves like a single topic: a message's key picks its partition, each
/// partition is a sequence of offsets, and consumer groups commit the next
/// offset they want to read per partition.
///
/// Once every group registered through [`InMemoryTransport::join_group`]
/// has committed past a record, the record is dropped. Offsets keep
/// counting from where they were. Without any registered group nothing is
/// dropped.
#[derive(Debug, Clone)]
pub struct InMemoryTransport {
    state: Arc<RwLock<TransportState>>,
    appended: Arc<watch::Sender<u64>>,
    partition_count: usize,
}

impl InMemoryTransport {
    /// Creates a transport with `partitions` partitions (at least one).
    pub fn new(partitions: usize) -> Self {
        let partition_count = partitions.max(1);
        let (appended, _) = watch::channel(0);
        Self {
            state: Arc::new(RwLock::new(TransportState {
                partitions: vec![Partition::default(); partition_count],
                ..Default::default()
            })),
            appended: Arc::new(appended),
            partition_count,
        }
    }

    pub fn partition_count(&self) -> usize {
        self.partition_count
    }

    /// Partition a key maps to. Stable across runs (FNV-1a).
    pub fn partition_for(&self, key: &str) -> usize {
        let mut hash: u32 = 0x811c_9dc5;
        for byte in key.bytes() {
            hash ^= u32::from(byte);
            hash = hash.wrapping_mul(0x0100_0193);
        }
        hash as usize % self.partition_count
    }

    /// Makes every following send fail.
    pub async fn set_fail_on_send(&self, fail: bool) {
        self.state.write().await.fail_on_send = fail;
    }

    /// Registers `group` so records are kept until it has committed them.
    ///
    /// A new group starts at the oldest retained record.
    pub async fn join_group(&self, group: &str) {
        let mut state = self.state.write().await;
        if !state.groups.iter().any(|known| known == group) {
            state.groups.push(group.to_string());
        }
    }

    /// Returns the record at `offset` in `partition`, if it exists.
    ///
    /// An offset that was already dropped yields the oldest retained record;
    /// the delivery carries its real offset.
    pub async fn fetch(
        &self,
        partition: usize,
        offset: u64,
    ) -> Result<Option<Delivery>, TransportError> {
        let state = self.state.read().await;
        let log = state
            .partitions
            .get(partition)
            .ok_or(TransportError::UnknownPartition(partition))?;

        let offset = offset.max(log.base);
        let Ok(index) = usize::try_from(offset - log.base) else {
            return Ok(None);
        };
        Ok(log.records.get(index).map(|record| Delivery {
            key: record.key.clone(),
            payload: record.payload.clone(),
            headers: record.headers.clone(),
            partition,
            offset,
            timestamp: record.timestamp,
        }))
    }

    /// Next offset `group` will read from `partition`.
    pub async fn committed_offset(&self, group: &str, partition: usize) -> u64 {
        self.state.read().await.committed(group, partition)
    }

    /// Marks `offset` as processed for `group`; the next read starts after it.
    ///
    /// Commits never move a group backwards.
    pub async fn commit(
        &self,
        group: &str,
        partition: usize,
        offset: u64,
    ) -> Result<(), TransportError> {
        let mut state = self.state.write().await;
        if partition >= state.partitions.len() {
            return Err(TransportError::UnknownPartition(partition));
        }
        let next = state
            .committed
            .entry((group.to_string(), partition))
            .or_insert(0);
        *next = (*next).max(offset + 1);
        state.reclaim(partition);
        Ok(())
    }

    /// Number of records still held in `partition`.
    pub async fn partition_len(&self, partition: usize) -> usize {
        self.state
            .read()
            .await
            .partitions
            .get(partition)
            .map_or(0, |log| log.records.len())
    }

    /// Offset of the oldest record still held in `partition`.
    pub async fn base_offset(&self, partition: usize) -> u64 {
        self.state
            .read()
            .await
            .partitions
            .get(partition)
            .map_or(0, |log| log.base)
    }

    /// Number of records held across all partitions.
    pub async fn len(&self) -> usize {
        self.state
            .read()
            .await
            .partitions
            .iter()
            .map(|log| log.records.len())
            .sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Number of records `group` has not committed yet, across partitions.
    pub async fn lag(&self, group: &str) -> u64 {
        let state = self.state.read().await;
        state
            .partitions
            .iter()
            .enumerate()
            .map(|(partition, log)| log.end().saturating_sub(state.committed(group, partition)))
            .sum()
    }

    /// Receiver that changes every time a record is appended.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.appended.subscribe()
    }
}

#[async_trait]
impl MessageTransport for InMemoryTransport {
    async fn send(&self, message: OutboundMessage) -> Result<RecordMetadata, TransportError> {
        let partition = self.partition_for(&message.key);
        let offset = {
            let mut state = self.state.write().await;
            if state.fail_on_send {
                return Err(TransportError::Unavailable(
                    "broker is not accepting messages".to_string(),
                ));
            }
            let log = state
                .partitions
                .get_mut(partition)
                .ok_or(TransportError::UnknownPartition(partition))?;
            log.records.push_back(StoredRecord {
                key: message.key,
                payload: message.payload,
                headers: message.headers,
                timestamp: Utc::now(),
            });
            log.end() - 1
        };

        self.appended.send_modify(|count| *count += 1);
        Ok(RecordMetadata { partition, offset })
    }
}
