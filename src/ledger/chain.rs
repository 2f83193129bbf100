//! Hash-chained attack ledger
//!
//! Every block commits to its predecessor through `prev_hash`, and its own
//! `block_hash` covers the whole block. Editing or dropping any earlier block
//! breaks every hash after it, which `verify` detects.
//!
//! File-backed appends are serialized on an async journal lock and written with
//! `tokio::fs`, so a slow disk never blocks a runtime worker. The in-memory
//! chain lock is only held for short, non-I/O sections.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader};
use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;

use super::{LedgerAttack, LedgerClient, LedgerEntry, LedgerError};

/// One ledger block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerBlock {
    pub index: u64,
    pub entry: LedgerEntry,
    pub reporter: String,
    pub recorded_at: DateTime<Utc>,
    pub prev_hash: Option<String>,
    pub block_hash: String,
}

impl LedgerBlock {
    fn compute_hash(&self) -> Result<String, serde_json::Error> {
        let mut hashable = self.clone();
        hashable.block_hash = String::new();

        let json = serde_json::to_vec(&hashable)?;
        let mut hasher = Sha256::new();
        hasher.update(&json);
        Ok(hex::encode(hasher.finalize()))
    }

    pub fn tx_hash(&self) -> String {
        format!("0x{}", self.block_hash)
    }

    fn to_attack(&self) -> LedgerAttack {
        LedgerAttack {
            id: self.index,
            fingerprint: self.entry.fingerprint.clone(),
            attack_type: self.entry.attack_type.clone(),
            severity: self.entry.severity,
            timestamp: self.entry.timestamp,
            reporter: self.reporter.clone(),
            tx_hash: self.tx_hash(),
            recorded_at: self.recorded_at,
        }
    }
}

#[derive(Debug, Default)]
struct ChainState {
    blocks: Vec<LedgerBlock>,
    known: HashSet<String>,
}

impl ChainState {
    fn next_block(&self, entry: LedgerEntry, reporter: &str) -> Result<LedgerBlock, serde_json::Error> {
        let mut block = LedgerBlock {
            index: self.blocks.len() as u64,
            entry,
            reporter: reporter.to_string(),
            recorded_at: Utc::now(),
            prev_hash: self.blocks.last().map(|b| b.block_hash.clone()),
            block_hash: String::new(),
        };
        block.block_hash = block.compute_hash()?;
        Ok(block)
    }

    fn commit(&mut self, block: LedgerBlock) {
        self.known.insert(block.entry.fingerprint.clone());
        self.blocks.push(block);
    }
}

pub struct ChainLedger {
    reporter: String,
    state: Mutex<ChainState>,
    journal: Option<tokio::sync::Mutex<tokio::fs::File>>,
}

impl ChainLedger {
    /// Memory-only ledger
    pub fn new(reporter: &str) -> Self {
        Self {
            reporter: reporter.to_string(),
            state: Mutex::new(ChainState::default()),
            journal: None,
        }
    }

    /// Ledger backed by a JSONL file; existing blocks are replayed and verified
    pub fn open(path: &Path, reporter: &str) -> Result<Self, LedgerError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut blocks = Vec::new();
        if path.exists() {
            let reader = BufReader::new(fs::File::open(path)?);
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                blocks.push(serde_json::from_str::<LedgerBlock>(&line)?);
            }
        }

        verify_chain(&blocks)?;
        let known = blocks.iter().map(|b| b.entry.fingerprint.clone()).collect();
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        tracing::info!("Chain ledger opened at {} ({} blocks)", path.display(), blocks.len());

        Ok(Self {
            reporter: reporter.to_string(),
            state: Mutex::new(ChainState { blocks, known }),
            journal: Some(tokio::sync::Mutex::new(tokio::fs::File::from_std(file))),
        })
    }

    /// Append one block and return it. A block is only visible once its
    /// journal line is flushed.
    pub async fn append(&self, entry: LedgerEntry) -> Result<LedgerBlock, LedgerError> {
        let Some(journal) = &self.journal else {
            let mut state = self.state.lock();
            let block = state.next_block(entry, &self.reporter)?;
            state.commit(block.clone());
            return Ok(block);
        };

        // Holding the journal lock makes this the only appender until commit
        let mut file = journal.lock().await;
        let block = self.state.lock().next_block(entry, &self.reporter)?;

        let mut line = serde_json::to_vec(&block)?;
        line.push(b'\n');
        file.write_all(&line).await?;
        file.flush().await?;

        self.state.lock().commit(block.clone());
        Ok(block)
    }

    /// Re-walk the whole chain
    pub fn verify(&self) -> Result<(), LedgerError> {
        verify_chain(&self.state.lock().blocks)
    }

    pub fn len(&self) -> usize {
        self.state.lock().blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn head_hash(&self) -> Option<String> {
        self.state.lock().blocks.last().map(|b| b.block_hash.clone())
    }
}

fn verify_chain(blocks: &[LedgerBlock]) -> Result<(), LedgerError> {
    let mut prev: Option<&str> = None;
    for (i, block) in blocks.iter().enumerate() {
        if block.index != i as u64 {
            return Err(LedgerError::Integrity(format!("block {} has index {}", i, block.index)));
        }
        if block.prev_hash.as_deref() != prev {
            return Err(LedgerError::Integrity(format!("block {} does not link to its predecessor", i)));
        }
        if block.compute_hash()? != block.block_hash {
            return Err(LedgerError::Integrity(format!("block {} hash mismatch", i)));
        }
        prev = Some(block.block_hash.as_str());
    }
    Ok(())
}

#[axum::async_trait]
impl LedgerClient for ChainLedger {
    fn name(&self) -> &'static str {
        "chain"
    }

    async fn is_connected(&self) -> bool {
        true
    }

    async fn log_attack(&self, entry: LedgerEntry) -> Result<Option<String>, LedgerError> {
        let block = self.append(entry).await?;
        tracing::debug!("Ledger block {} appended ({})", block.index, block.tx_hash());
        Ok(Some(block.tx_hash()))
    }

    async fn attack_count(&self) -> Result<u64, LedgerError> {
        Ok(self.len() as u64)
    }

    async fn get_attack(&self, id: u64) -> Result<Option<LedgerAttack>, LedgerError> {
        let state = self.state.lock();
        Ok(usize::try_from(id)
            .ok()
            .and_then(|i| state.blocks.get(i))
            .map(LedgerBlock::to_attack))
    }

    async fn is_threat_known(&self, fingerprint: &str) -> Result<bool, LedgerError> {
        Ok(self.state.lock().known.contains(fingerprint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(fp: &str, severity: u8) -> LedgerEntry {
        LedgerEntry {
            fingerprint: fp.to_string(),
            attack_type: "DDoS".to_string(),
            severity,
            timestamp: 1_700_000_000,
        }
    }

    #[tokio::test]
    async fn test_append_links_blocks() {
        let ledger = ChainLedger::new("node-a");
        let tx1 = ledger.log_attack(entry("aa", 7)).await.unwrap().unwrap();
        let tx2 = ledger.log_attack(entry("bb", 9)).await.unwrap().unwrap();

        assert!(tx1.starts_with("0x") && tx1.len() == 66);
        assert_ne!(tx1, tx2);

        let second = ledger.get_attack(1).await.unwrap().unwrap();
        assert_eq!(second.fingerprint, "bb");
        assert_eq!(second.reporter, "node-a");
        assert_eq!(second.tx_hash, tx2);

        assert_eq!(ledger.attack_count().await.unwrap(), 2);
        assert!(ledger.get_attack(2).await.unwrap().is_none());
        assert!(ledger.verify().is_ok());
    }

    #[tokio::test]
    async fn test_threat_lookup() {
        let ledger = ChainLedger::new("node-a");
        ledger.log_attack(entry("cafe", 6)).await.unwrap();
        assert!(ledger.is_threat_known("cafe").await.unwrap());
        assert!(!ledger.is_threat_known("beef").await.unwrap());
    }

    #[tokio::test]
    async fn test_recent_attacks_window() {
        let ledger = ChainLedger::new("node-a");
        for i in 0..5 {
            ledger.log_attack(entry(&format!("fp{}", i), 5)).await.unwrap();
        }
        let recent = ledger.recent_attacks(3).await.unwrap();
        let ids: Vec<u64> = recent.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn test_file_backed_replay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");

        let head = {
            let ledger = ChainLedger::open(&path, "node-a").unwrap();
            ledger.append(entry("aa", 5)).await.unwrap();
            ledger.append(entry("bb", 6)).await.unwrap();
            ledger.head_hash()
        };

        let reopened = ChainLedger::open(&path, "node-a").unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.head_hash(), head);

        // New blocks keep chaining after replay
        let block = reopened.append(entry("cc", 7)).await.unwrap();
        assert_eq!(block.index, 2);
        assert_eq!(block.prev_hash, head);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_file_appends_stay_chained() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        let ledger = std::sync::Arc::new(ChainLedger::open(&path, "node-a").unwrap());

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let ledger = std::sync::Arc::clone(&ledger);
                tokio::spawn(async move { ledger.log_attack(entry(&format!("fp{}", i), 5)).await })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap().unwrap().is_some());
        }

        assert_eq!(ledger.len(), 32);
        assert!(ledger.verify().is_ok());

        let reopened = ChainLedger::open(&path, "node-a").unwrap();
        assert_eq!(reopened.len(), 32);
        assert_eq!(reopened.head_hash(), ledger.head_hash());
    }

    #[tokio::test]
    async fn test_tampered_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        {
            let ledger = ChainLedger::open(&path, "node-a").unwrap();
            ledger.append(entry("aa", 5)).await.unwrap();
            ledger.append(entry("bb", 6)).await.unwrap();
        }

        let content = fs::read_to_string(&path).unwrap();
        fs::write(&path, content.replacen("\"severity\":5", "\"severity\":1", 1)).unwrap();

        assert!(matches!(
            ChainLedger::open(&path, "node-a"),
            Err(LedgerError::Integrity(_))
        ));
    }

    #[tokio::test]
    async fn test_dropped_block_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        {
            let ledger = ChainLedger::open(&path, "node-a").unwrap();
            for fp in ["aa", "bb", "cc"] {
                ledger.append(entry(fp, 5)).await.unwrap();
            }
        }

        let content = fs::read_to_string(&path).unwrap();
        let kept: Vec<&str> = content.lines().enumerate().filter(|(i, _)| *i != 1).map(|(_, l)| l).collect();
        fs::write(&path, kept.join("\n")).unwrap();

        assert!(ChainLedger::open(&path, "node-a").is_err());
    }
}
