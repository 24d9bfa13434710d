use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::model::{Asset, FundingAction, Side, TopupMode};

/// One audited fact. String ids keep the journal readable and decoupled from
/// the in-memory newtypes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JournalEvent {
    OrderPlaced {
        user_id: String,
        order_id: u64,
        side: Side,
        quantity: Decimal,
        price: Decimal,
    },
    BalanceAdjusted {
        user_id: String,
        asset: Asset,
        amount: Decimal,
        mode: TopupMode,
        note: Option<String>,
    },
    FundingResolved {
        request_id: String,
        action: FundingAction,
    },
    AccountCreated {
        user_id: String,
        username: String,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct JournalLine {
    at: DateTime<Utc>,
    #[serde(flatten)]
    event: JournalEvent,
}

/// Append-only JSON-lines audit trail for everything that moves money or
/// creates an account. The live state is never rebuilt from it; the ledger
/// is in-memory by design.
#[derive(Debug)]
pub struct Journal {
    file: BufWriter<File>,
    path: PathBuf,
}

impl Journal {
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating journal dir {}", dir.display()))?;
        let path = dir.join("journal.jsonl");
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&path)
            .with_context(|| format!("opening journal {}", path.display()))?;
        Ok(Self {
            file: BufWriter::new(file),
            path,
        })
    }

    pub fn append(&mut self, event: JournalEvent) -> Result<()> {
        let line = JournalLine {
            at: Utc::now(),
            event,
        };
        serde_json::to_writer(&mut self.file, &line)?;
        writeln!(self.file)?;
        self.file.flush()?;
        Ok(())
    }

    /// Reads the whole trail back, oldest first. Used by audits and tests.
    pub fn read_all(&self) -> Result<Vec<JournalEvent>> {
        let file = File::open(&self.path)
            .with_context(|| format!("reading journal {}", self.path.display()))?;
        let reader = BufReader::new(file);

        let mut events = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let parsed: JournalLine = serde_json::from_str(&line)?;
            events.push(parsed.event);
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn temp_journal_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("openbookpro-journal-{}-{}", tag, std::process::id()))
    }

    #[test]
    fn should_append_and_read_back_events() {
        let dir = temp_journal_dir("roundtrip");
        let _ = std::fs::remove_dir_all(&dir);

        let mut journal = Journal::open(&dir).unwrap();
        journal
            .append(JournalEvent::OrderPlaced {
                user_id: "u-1".into(),
                order_id: 1,
                side: Side::Buy,
                quantity: dec!(2),
                price: dec!(100),
            })
            .unwrap();
        journal
            .append(JournalEvent::FundingResolved {
                request_id: "r-1".into(),
                action: FundingAction::Approve,
            })
            .unwrap();

        let events = journal.read_all().unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], JournalEvent::OrderPlaced { order_id: 1, .. }));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn should_tolerate_blank_lines() {
        let dir = temp_journal_dir("blanks");
        let _ = std::fs::remove_dir_all(&dir);

        let mut journal = Journal::open(&dir).unwrap();
        journal
            .append(JournalEvent::AccountCreated {
                user_id: "u-2".into(),
                username: "alice".into(),
            })
            .unwrap();
        writeln!(journal.file).unwrap();
        journal.file.flush().unwrap();

        assert_eq!(journal.read_all().unwrap().len(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
