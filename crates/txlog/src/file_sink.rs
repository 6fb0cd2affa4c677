//! Day-rotated newline-delimited JSON file sink. Generalizes
//! `audit_logging::AuditLogger`'s single append-only `BufWriter<File>` to
//! one file per day bucket, since the transaction log is a much
//! higher-volume stream than the admin audit trail it was grounded on.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use crate::error::TxLogError;
use crate::event::TransactionEvent;

pub struct DailyFileSink {
    dir: PathBuf,
    current_day: parking_lot::Mutex<Option<(String, BufWriter<File>)>>,
}

impl DailyFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            current_day: parking_lot::Mutex::new(None),
        })
    }

    fn path_for(&self, day: &str) -> PathBuf {
        self.dir.join(format!("{day}.jsonl"))
    }

    pub fn append(&self, event: &TransactionEvent) -> Result<(), TxLogError> {
        let day = event.day_bucket();
        let mut guard = self.current_day.lock();
        let needs_new = match guard.as_ref() {
            Some((open_day, _)) => open_day != &day,
            None => true,
        };
        if needs_new {
            let file = OpenOptions::new().create(true).append(true).open(self.path_for(&day))?;
            *guard = Some((day.clone(), BufWriter::new(file)));
        }
        let (_, writer) = guard.as_mut().expect("just populated");
        let line = serde_json::to_string(event)? + "\n";
        writer.write_all(line.as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    pub fn rotated_path(&self, day: &str) -> PathBuf {
        self.path_for(day)
    }
}

/// Compresses a day's rotated JSONL file with zstd and removes the
/// uncompressed original, leaving `{day}.jsonl.zst` behind.
pub fn compress_rotated_file(path: &std::path::Path) -> Result<(), TxLogError> {
    if !path.exists() {
        return Ok(());
    }
    let input = std::fs::read(path)?;
    let compressed = zstd::encode_all(input.as_slice(), 3)?;
    let mut target = path.to_path_buf();
    target.set_extension("jsonl.zst");
    std::fs::write(&target, compressed)?;
    std::fs::remove_file(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::TransactionEvent;

    #[test]
    fn append_creates_day_file_and_rotates() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DailyFileSink::new(dir.path()).unwrap();
        let event = TransactionEvent::new("queue:agent-a:enqueue", "enqueue", 1_705_276_800_000);
        sink.append(&event).unwrap();
        let path = sink.rotated_path("2024-01-15");
        assert!(path.exists());
        let contents = std::fs::read_to_string(path).unwrap();
        assert!(contents.contains("\"event_type\":\"enqueue\""));
    }

    #[test]
    fn compress_rotated_file_replaces_with_zst() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DailyFileSink::new(dir.path()).unwrap();
        let event = TransactionEvent::new("queue:agent-a:enqueue", "enqueue", 1_705_276_800_000);
        sink.append(&event).unwrap();
        let path = sink.rotated_path("2024-01-15");
        compress_rotated_file(&path).unwrap();
        assert!(!path.exists());
        assert!(path.with_extension("jsonl.zst").exists());
    }
}
