#![forbid(unsafe_code)]

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use certus_contracts::certificate::{CertificateId, CertificateRecord, CertificateStatus};
use certus_contracts::identity::{UserId, UserRecord};
use certus_contracts::registry::OriginalRecord;
use certus_contracts::UnixTimeMs;
use serde::{Deserialize, Serialize};

use crate::tables::{LedgerTables, StorageError};

const JOURNAL_SCHEMA_VERSION: u8 = 1;

/// One committed ledger mutation. Replaying every entry in order rebuilds the tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JournalEntry {
    UserInserted {
        record: UserRecord,
    },
    CertificateInserted {
        record: CertificateRecord,
    },
    CertificateAdjudicated {
        certificate_id: CertificateId,
        status: CertificateStatus,
        verified_at: UnixTimeMs,
        verified_by: UserId,
    },
    OriginalInserted {
        record: OriginalRecord,
    },
}

impl JournalEntry {
    pub fn apply(self, tables: &mut LedgerTables) -> Result<(), StorageError> {
        match self {
            Self::UserInserted { record } => tables.insert_user(record),
            Self::CertificateInserted { record } => tables.insert_certificate(record),
            Self::CertificateAdjudicated {
                certificate_id,
                status,
                verified_at,
                verified_by,
            } => {
                let write = tables.compare_and_set_status(
                    &certificate_id,
                    status,
                    verified_at,
                    &verified_by,
                )?;
                if write.was_applied() {
                    Ok(())
                } else {
                    Err(StorageError::Journal(format!(
                        "adjudication of '{}' replayed onto a terminal row",
                        certificate_id.as_str()
                    )))
                }
            }
            Self::OriginalInserted { record } => tables.insert_original(record),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct JournalLine {
    schema_version: u8,
    entry: JournalEntry,
}

/// Append-only JSON-lines file. Each append is flushed to disk before it returns.
#[derive(Debug, Clone)]
pub struct LedgerJournal {
    path: PathBuf,
}

impl LedgerJournal {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| {
                StorageError::Journal(format!(
                    "failed to create ledger journal directory '{}': {}",
                    parent.display(),
                    err
                ))
            })?;
        }
        if !path.exists() {
            File::create(&path).map_err(|err| {
                StorageError::Journal(format!(
                    "failed to create ledger journal '{}': {}",
                    path.display(),
                    err
                ))
            })?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_entries(&self) -> Result<Vec<JournalEntry>, StorageError> {
        let file = File::open(&self.path).map_err(|err| {
            StorageError::Journal(format!(
                "failed to open ledger journal '{}': {}",
                self.path.display(),
                err
            ))
        })?;
        let mut entries = Vec::new();
        for (line_no, line_result) in BufReader::new(file).lines().enumerate() {
            let line = line_result.map_err(|err| {
                StorageError::Journal(format!(
                    "failed reading ledger journal '{}' at line {}: {}",
                    self.path.display(),
                    line_no + 1,
                    err
                ))
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let parsed: JournalLine = serde_json::from_str(&line).map_err(|err| {
                StorageError::Journal(format!(
                    "failed parsing ledger journal '{}' at line {}: {}",
                    self.path.display(),
                    line_no + 1,
                    err
                ))
            })?;
            if parsed.schema_version != JOURNAL_SCHEMA_VERSION {
                return Err(StorageError::Journal(format!(
                    "unsupported ledger journal schema_version={} at line {}",
                    parsed.schema_version,
                    line_no + 1
                )));
            }
            entries.push(parsed.entry);
        }
        Ok(entries)
    }

    pub fn append(&self, entry: &JournalEntry) -> Result<(), StorageError> {
        let line = JournalLine {
            schema_version: JOURNAL_SCHEMA_VERSION,
            entry: entry.clone(),
        };
        let json = serde_json::to_string(&line).map_err(|err| {
            StorageError::Journal(format!("failed to encode ledger journal entry: {err}"))
        })?;
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(|err| {
                StorageError::Journal(format!(
                    "failed opening ledger journal '{}' for append: {}",
                    self.path.display(),
                    err
                ))
            })?;
        let mut bytes = json.into_bytes();
        bytes.push(b'\n');
        write_line_or_truncate(&mut file, &bytes, File::sync_data).map_err(|err| {
            StorageError::Journal(format!(
                "failed writing ledger journal '{}': {}",
                self.path.display(),
                err
            ))
        })
    }
}

/// Appends one full line or nothing: on any failure the file is cut back to
/// its prior length so no torn entry survives for replay.
fn write_line_or_truncate<S>(file: &mut File, line: &[u8], sync: S) -> io::Result<()>
where
    S: FnOnce(&File) -> io::Result<()>,
{
    let prior_len = file.metadata()?.len();
    let Err(err) = file.write_all(line).and_then(|_| sync(&*file)) else {
        return Ok(());
    };
    match file.set_len(prior_len).and_then(|_| file.sync_data()) {
        Ok(()) => Err(err),
        Err(truncate_err) => Err(io::Error::new(
            err.kind(),
            format!("{err}; truncating the torn entry also failed: {truncate_err}"),
        )),
    }
}
