use anyhow::{bail, Result};
use creg_audit::{history_for, read_records, verify_hash_chain, VerifyResult};
use creg_schemas::SubmissionId;

pub fn verify(path: &str) -> Result<()> {
    match verify_hash_chain(path)? {
        VerifyResult::Valid { lines } => {
            println!("audit_chain=VALID lines={lines}");
            Ok(())
        }
        VerifyResult::Broken { line, reason } => {
            println!("audit_chain=BROKEN line={line} reason={reason}");
            bail!("audit chain broken at line {line}");
        }
    }
}

pub fn history(path: &str, submission_id: SubmissionId) -> Result<()> {
    let records = read_records(path)?;
    let mine = history_for(&records, submission_id);
    if mine.is_empty() {
        bail!("no audit records for submission {submission_id}");
    }
    for r in mine {
        println!("{} seq={} topic={} {}", r.ts_utc.to_rfc3339(), r.seq, r.topic, r.payload);
    }
    Ok(())
}
