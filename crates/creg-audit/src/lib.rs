//! creg-audit
//!
//! Append-only JSON Lines audit log of submission lifecycle events.
//!
//! With the hash chain enabled each record carries `hash_prev` (the previous
//! record's `hash_self`) and `hash_self` (SHA-256 of the record's canonical
//! JSON without `hash_self`). Record ids are UUIDv5 values derived from the
//! chain position, so replaying the same events into an empty log yields the
//! same ids.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use creg_schemas::{LifecycleEvent, SubmissionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Namespace for record id derivation.
const RECORD_ID_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6b, 0x1e, 0x2a, 0x90, 0x4d, 0x3c, 0x5f, 0x71, 0x8a, 0x12, 0xc4, 0x07, 0x5e, 0x9d, 0x21, 0xb3,
]);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub record_id: Uuid,
    pub seq: u64,
    pub submission_id: SubmissionId,
    pub ts_utc: DateTime<Utc>,
    pub topic: String,
    pub payload: Value,
    pub hash_prev: Option<String>,
    pub hash_self: Option<String>,
}

/// Append-only audit writer.
pub struct AuditWriter {
    path: PathBuf,
    hash_chain: bool,
    last_hash: Option<String>,
    seq: u64,
}

impl AuditWriter {
    /// Start a fresh log at `path`, creating parent directories.
    pub fn new(path: impl AsRef<Path>, hash_chain: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create_dir_all {:?}", parent))?;
        }
        Ok(Self {
            path,
            hash_chain,
            last_hash: None,
            seq: 0,
        })
    }

    /// Continue an existing log: sequence and chain head are restored from
    /// its last record. A missing file starts a fresh log.
    pub fn resume(path: impl AsRef<Path>, hash_chain: bool) -> Result<Self> {
        let mut w = Self::new(path, hash_chain)?;
        if w.path.exists() {
            let records = read_records(&w.path)?;
            if let Some(last) = records.last() {
                w.seq = last.seq + 1;
                w.last_hash = last.hash_self.clone();
            }
        }
        Ok(w)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn last_hash(&self) -> Option<&str> {
        self.last_hash.as_deref()
    }

    /// Number of records written (including resumed ones).
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn append(
        &mut self,
        submission_id: SubmissionId,
        topic: &str,
        payload: Value,
    ) -> Result<AuditRecord> {
        let record_id = derive_record_id(self.last_hash.as_deref(), self.seq, submission_id, topic);

        let mut rec = AuditRecord {
            record_id,
            seq: self.seq,
            submission_id,
            ts_utc: Utc::now(),
            topic: topic.to_string(),
            payload,
            hash_prev: None,
            hash_self: None,
        };

        if self.hash_chain {
            rec.hash_prev = self.last_hash.clone();
            let h = compute_record_hash(&rec)?;
            rec.hash_self = Some(h.clone());
            self.last_hash = Some(h);
        }

        let line = canonical_json(&rec)?;
        append_line(&self.path, &line)?;
        self.seq += 1;
        Ok(rec)
    }

    pub fn append_event(&mut self, ev: &LifecycleEvent) -> Result<AuditRecord> {
        let payload = serde_json::to_value(ev).context("serialize lifecycle event")?;
        self.append(ev.submission_id, ev.topic(), payload)
    }
}

fn derive_record_id(prev: Option<&str>, seq: u64, submission_id: SubmissionId, topic: &str) -> Uuid {
    let name = format!("{}|{}|{}|{}", prev.unwrap_or("-"), seq, submission_id, topic);
    Uuid::new_v5(&RECORD_ID_NAMESPACE, name.as_bytes())
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open audit log {:?}", path))?;
    writeln!(f, "{line}").context("write audit line failed")?;
    Ok(())
}

fn canonical_json<T: Serialize>(v: &T) -> Result<String> {
    let raw = serde_json::to_value(v).context("serialize audit record failed")?;
    serde_json::to_string(&sort_keys(raw)).context("json stringify failed")
}

// Independent of serde_json's map ordering feature.
fn sort_keys(v: Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(entries.into_iter().map(|(k, v)| (k, sort_keys(v))).collect())
        }
        Value::Array(arr) => Value::Array(arr.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// SHA-256 over the canonical JSON of `rec` with `hash_self` cleared.
pub fn compute_record_hash(rec: &AuditRecord) -> Result<String> {
    let unsealed = AuditRecord {
        hash_self: None,
        ..rec.clone()
    };
    let canonical = canonical_json(&unsealed)?;
    Ok(hex::encode(Sha256::digest(canonical.as_bytes())))
}

pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<AuditRecord>> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("read audit log {:?}", path.as_ref()))?;
    parse_records(&content)
}

pub fn parse_records(content: &str) -> Result<Vec<AuditRecord>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty())
        .map(|(i, l)| {
            serde_json::from_str(l.trim())
                .with_context(|| format!("parse audit record at line {}", i + 1))
        })
        .collect()
}

/// Records for one submission, in log order.
pub fn history_for(records: &[AuditRecord], submission_id: SubmissionId) -> Vec<&AuditRecord> {
    records
        .iter()
        .filter(|r| r.submission_id == submission_id)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    Valid { lines: usize },
    /// First broken line (1-based).
    Broken { line: usize, reason: String },
}

pub fn verify_hash_chain(path: impl AsRef<Path>) -> Result<VerifyResult> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("read audit log {:?}", path.as_ref()))?;
    verify_hash_chain_str(&content)
}

/// Checks linkage, self hashes and sequence continuity.
pub fn verify_hash_chain_str(content: &str) -> Result<VerifyResult> {
    let mut prev_hash: Option<String> = None;
    let mut expected_seq: Option<u64> = None;
    let mut count = 0usize;

    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let line_no = i + 1;

        let rec: AuditRecord = match serde_json::from_str(trimmed) {
            Ok(r) => r,
            Err(e) => {
                return Ok(VerifyResult::Broken {
                    line: line_no,
                    reason: format!("unparseable record: {e}"),
                })
            }
        };
        count += 1;

        if let Some(seq) = expected_seq {
            if rec.seq != seq {
                return Ok(VerifyResult::Broken {
                    line: line_no,
                    reason: format!("seq gap: expected {seq}, got {}", rec.seq),
                });
            }
        }
        expected_seq = Some(rec.seq + 1);

        if rec.hash_prev != prev_hash {
            return Ok(VerifyResult::Broken {
                line: line_no,
                reason: format!(
                    "hash_prev mismatch: expected {:?}, got {:?}",
                    prev_hash, rec.hash_prev
                ),
            });
        }

        if let Some(claimed) = &rec.hash_self {
            let recomputed = compute_record_hash(&rec)?;
            if *claimed != recomputed {
                return Ok(VerifyResult::Broken {
                    line: line_no,
                    reason: format!("hash_self mismatch: claimed {claimed}, recomputed {recomputed}"),
                });
            }
        }

        prev_hash = rec.hash_self.clone();
    }

    Ok(VerifyResult::Valid { lines: count })
}
