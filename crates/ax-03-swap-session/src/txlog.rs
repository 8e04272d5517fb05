//! # TXLOG
//!
//! Best-effort append-only journal of every raw deposit/refund/redeem
//! transaction this node produces, rotated daily by date in the filename.
//! If the process dies mid-swap, the operator can submit the logged raw
//! transactions manually with `sendrawtransaction`.

use chrono::Local;
use shared_types::OrderId;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

/// Daily-rotated raw transaction journal.
pub struct TxLog {
    dir: PathBuf,
}

impl TxLog {
    /// Open (creating the directory if needed) a journal under `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Path of today's journal file.
    pub fn current_file(&self) -> PathBuf {
        let day = Local::now().format("%Y-%m-%d");
        self.dir.join(format!("txlog-{day}.log"))
    }

    /// Append one journal line. Failures are logged and swallowed; the
    /// journal must never take a swap down with it.
    pub fn append(&self, kind: &str, order: &OrderId, detail: &str, raw_tx: &str) {
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let line = format!(
            "{stamp} {kind} for order {order} (submit manually using sendrawtransaction) {detail}\n{raw_tx}\n"
        );
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.current_file())
            .and_then(|mut file| file.write_all(line.as_bytes()));
        if let Err(err) = result {
            tracing::warn!(error = %err, "txlog append failed");
        }
    }
}
