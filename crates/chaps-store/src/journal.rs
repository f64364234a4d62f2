use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chaps_types::{InternalBlobId, StoreId};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::config::SyncMode;
use crate::error::{StoreError, StoreResult};

/// One mutation of the store, as persisted in the journal.
///
/// On-disk framing of each record:
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (bincode-serialized JournalRecord)]
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalRecord {
    SetInternal { id: InternalBlobId, blob: Vec<u8> },
    /// `data` is ciphertext when `is_private` is set.
    PutObject {
        store_id: StoreId,
        is_private: bool,
        data: Vec<u8>,
    },
    DeleteObject { store_id: StoreId },
    DeleteAllObjects,
    /// Lower bound for the next store id; written by compaction so ids are
    /// not reused once their records are gone.
    NextId { next: StoreId },
}

impl std::fmt::Debug for JournalRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SetInternal { id, blob } => write!(f, "SetInternal({id}, {} bytes)", blob.len()),
            Self::PutObject {
                store_id,
                is_private,
                data,
            } => write!(
                f,
                "PutObject({store_id}, private={is_private}, {} bytes)",
                data.len()
            ),
            Self::DeleteObject { store_id } => write!(f, "DeleteObject({store_id})"),
            Self::DeleteAllObjects => write!(f, "DeleteAllObjects"),
            Self::NextId { next } => write!(f, "NextId({next})"),
        }
    }
}

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

/// Append-only record journal backing a [`FileObjectStore`](crate::FileObjectStore).
///
/// Records are serialized with bincode, framed with a length prefix and a
/// CRC32 checksum, and appended to a single file. On open the file is read
/// front-to-back: records failing the CRC check are skipped, and a torn tail
/// left by a crash is cut off so later appends start on a clean boundary.
/// A damaged frame with intact frames after it is not a torn tail; the file
/// is then copied to `<path>.corrupt` and opening fails without truncating.
pub struct Journal {
    path: PathBuf,
    file: File,
    /// Current write offset (= file length).
    offset: u64,
    sync_mode: SyncMode,
    /// Set when a failed append left bytes past `offset` that could not be
    /// cut off. Appends are refused until the journal is reopened or rewritten.
    poisoned: bool,
}

impl Journal {
    /// Open (or create) the journal at `path` and replay its records.
    pub fn open(path: &Path, sync_mode: SyncMode) -> StoreResult<(Self, Vec<JournalRecord>)> {
        // Ensure parent directory exists.
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;
        let file_len = file.metadata()?.len();

        let (records, valid_len) = replay(path, file_len)?;
        if valid_len < file_len {
            if let Some(intact) = find_intact_frame(path, valid_len + 1)? {
                let backup = corrupt_copy_path(path);
                fs::copy(path, &backup)?;
                error!(
                    path = %path.display(),
                    offset = valid_len,
                    intact,
                    backup = %backup.display(),
                    "journal damaged before its last frame; not truncating"
                );
                return Err(StoreError::CorruptJournal {
                    path: path.to_path_buf(),
                    offset: valid_len,
                    backup,
                });
            }
            warn!(
                path = %path.display(),
                valid_len,
                file_len,
                "discarding torn journal tail"
            );
            file.set_len(valid_len)?;
            file.sync_all()?;
        }

        debug!(path = %path.display(), records = records.len(), "journal opened");
        let journal = Self {
            path: path.to_path_buf(),
            file,
            offset: valid_len,
            sync_mode,
            poisoned: false,
        };
        Ok((journal, records))
    }

    /// Append a single record. Returns the byte offset of the record.
    pub fn append(&mut self, record: &JournalRecord) -> StoreResult<u64> {
        if self.poisoned {
            return Err(StoreError::JournalPoisoned(self.path.clone()));
        }
        let frame = encode_frame(record)?;
        let record_offset = self.offset;

        let written = self.file.write_all(&frame).and_then(|()| match self.sync_mode {
            SyncMode::EveryWrite => self.file.sync_data(),
            SyncMode::OsDefault => Ok(()),
        });
        if let Err(e) = written {
            // Drop whatever part of the frame reached the file.
            if let Err(rollback) = self.file.set_len(record_offset) {
                warn!(
                    path = %self.path.display(),
                    offset = record_offset,
                    error = %rollback,
                    "failed to roll back partial journal append; refusing further appends"
                );
                self.poisoned = true;
            }
            return Err(e.into());
        }

        self.offset += frame.len() as u64;
        debug!(offset = record_offset, len = frame.len(), ?record, "journal append");
        Ok(record_offset)
    }

    /// Atomically replace the journal contents with `records`.
    ///
    /// The records are written to a temporary file in the same directory,
    /// synced, and renamed over the journal.
    pub fn rewrite(&mut self, records: &[JournalRecord]) -> StoreResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut temp = tempfile::NamedTempFile::new_in(&dir)?;
        let mut len = 0u64;
        {
            let mut out = BufWriter::new(temp.as_file_mut());
            for record in records {
                let frame = encode_frame(record)?;
                out.write_all(&frame)?;
                len += frame.len() as u64;
            }
            out.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| e.error)?;

        self.file = OpenOptions::new().read(true).append(true).open(&self.path)?;
        self.offset = len;
        self.poisoned = false;

        debug!(path = %self.path.display(), records = records.len(), len, "journal rewritten");
        Ok(())
    }

    /// Current write offset, which is also the journal size in bytes.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Path to the journal file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn encode_frame(record: &JournalRecord) -> StoreResult<Vec<u8>> {
    let payload =
        bincode::serialize(record).map_err(|e| StoreError::Serialization(e.to_string()))?;
    let length = u32::try_from(payload.len())
        .map_err(|_| StoreError::Serialization(format!("record too large: {} bytes", payload.len())))?;
    let crc = crc32fast::hash(&payload);

    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
    frame.extend_from_slice(&length.to_le_bytes());
    frame.extend_from_slice(&crc.to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decode the frame at the start of `buf`, if it is complete and intact.
fn decode_frame(buf: &[u8]) -> Option<JournalRecord> {
    let header = buf.get(..HEADER_SIZE)?;
    let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
    let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    if length == 0 {
        return None;
    }
    let payload = buf.get(HEADER_SIZE..HEADER_SIZE.checked_add(length)?)?;
    if crc32fast::hash(payload) != expected_crc {
        return None;
    }
    bincode::deserialize(payload).ok()
}

/// Offset of the first intact frame starting at or after `from`.
fn find_intact_frame(path: &Path, from: u64) -> StoreResult<Option<u64>> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(from))?;
    let mut rest = Vec::new();
    file.read_to_end(&mut rest)?;
    Ok((0..rest.len())
        .find(|&start| decode_frame(&rest[start..]).is_some())
        .map(|start| from + start as u64))
}

fn corrupt_copy_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".corrupt");
    PathBuf::from(name)
}

/// Read all valid records and return them with the length of the valid prefix.
fn replay(path: &Path, file_len: u64) -> StoreResult<(Vec<JournalRecord>, u64)> {
    let mut file = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    let mut offset: u64 = 0;

    while offset + HEADER_SIZE as u64 <= file_len {
        // Read header
        let mut header_buf = [0u8; HEADER_SIZE];
        match file.read_exact(&mut header_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }

        let length = u32::from_le_bytes([header_buf[0], header_buf[1], header_buf[2], header_buf[3]]);
        let expected_crc =
            u32::from_le_bytes([header_buf[4], header_buf[5], header_buf[6], header_buf[7]]);

        // Validate length
        if length == 0 || (offset + HEADER_SIZE as u64 + length as u64) > file_len {
            warn!(offset, length, file_len, "invalid journal record length; stopping replay");
            break;
        }

        // Read payload
        let mut payload = vec![0u8; length as usize];
        match file.read_exact(&mut payload) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                warn!(offset, "truncated journal record; stopping replay");
                break;
            }
            Err(e) => return Err(e.into()),
        }
        let next_offset = offset + HEADER_SIZE as u64 + length as u64;

        // CRC check
        let actual_crc = crc32fast::hash(&payload);
        if actual_crc != expected_crc {
            warn!(
                offset,
                expected = expected_crc,
                actual = actual_crc,
                "CRC mismatch; skipping journal record"
            );
            offset = next_offset;
            continue;
        }

        // Deserialize
        match bincode::deserialize::<JournalRecord>(&payload) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(offset, error = %e, "failed to deserialize journal record; skipping");
            }
        }

        offset = next_offset;
    }

    debug!(recovered = records.len(), "journal replay complete");
    Ok((records, offset))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put(id: u64, data: &[u8]) -> JournalRecord {
        JournalRecord::PutObject {
            store_id: StoreId::new(id),
            is_private: false,
            data: data.to_vec(),
        }
    }

    #[test]
    fn append_and_replay_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.journal");
        let (mut journal, records) = Journal::open(&path, SyncMode::default()).unwrap();
        assert!(records.is_empty());

        let internal = JournalRecord::SetInternal {
            id: InternalBlobId::EncryptedMasterKey,
            blob: b"wrapped".to_vec(),
        };
        journal.append(&internal).unwrap();
        journal.append(&put(1, b"one")).unwrap();
        journal.append(&JournalRecord::DeleteObject { store_id: StoreId::new(1) }).unwrap();
        drop(journal);

        let (_journal, records) = Journal::open(&path, SyncMode::default()).unwrap();
        assert_eq!(
            records,
            vec![
                internal,
                put(1, b"one"),
                JournalRecord::DeleteObject { store_id: StoreId::new(1) }
            ]
        );
    }

    #[test]
    fn open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("db.journal");
        let (journal, _) = Journal::open(&path, SyncMode::OsDefault).unwrap();
        assert!(path.exists());
        assert_eq!(journal.offset(), 0);
        assert_eq!(journal.path(), path.as_path());
    }

    #[test]
    fn append_returns_increasing_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offsets.journal");
        let (mut journal, _) = Journal::open(&path, SyncMode::OsDefault).unwrap();

        let off1 = journal.append(&put(1, b"a")).unwrap();
        let off2 = journal.append(&put(2, b"b")).unwrap();
        assert_eq!(off1, 0);
        assert!(off2 > off1);
        assert_eq!(journal.offset(), fs::metadata(&path).unwrap().len());
    }

    #[test]
    fn crc_mismatch_skips_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.journal");
        let (mut journal, _) = Journal::open(&path, SyncMode::default()).unwrap();
        journal.append(&put(1, b"first")).unwrap();
        journal.append(&put(2, b"second")).unwrap();
        drop(journal);

        // Flip a byte in the payload of the first record.
        {
            let mut file = OpenOptions::new().write(true).read(true).open(&path).unwrap();
            file.seek(SeekFrom::Start(HEADER_SIZE as u64)).unwrap();
            let mut buf = [0u8; 1];
            file.read_exact(&mut buf).unwrap();
            buf[0] ^= 0xFF;
            file.seek(SeekFrom::Start(HEADER_SIZE as u64)).unwrap();
            file.write_all(&buf).unwrap();
            file.sync_all().unwrap();
        }

        let (_journal, records) = Journal::open(&path, SyncMode::default()).unwrap();
        assert_eq!(records, vec![put(2, b"second")]);
    }

    #[test]
    fn torn_tail_is_truncated_and_appends_continue() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tail.journal");
        let (mut journal, _) = Journal::open(&path, SyncMode::default()).unwrap();
        journal.append(&put(1, b"complete")).unwrap();
        let good_len = journal.offset();
        journal.append(&put(2, b"torn")).unwrap();
        let total_len = journal.offset();
        drop(journal);

        {
            let file = OpenOptions::new().write(true).open(&path).unwrap();
            file.set_len(total_len - 3).unwrap();
        }

        let (mut journal, records) = Journal::open(&path, SyncMode::default()).unwrap();
        assert_eq!(records, vec![put(1, b"complete")]);
        assert_eq!(journal.offset(), good_len);
        assert_eq!(fs::metadata(&path).unwrap().len(), good_len);

        journal.append(&put(3, b"after")).unwrap();
        drop(journal);
        let (_journal, records) = Journal::open(&path, SyncMode::default()).unwrap();
        assert_eq!(records, vec![put(1, b"complete"), put(3, b"after")]);
    }

    #[test]
    fn damaged_header_before_intact_records_is_not_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("middle.journal");
        let (mut journal, _) = Journal::open(&path, SyncMode::default()).unwrap();
        journal.append(&put(1, b"one")).unwrap();
        let second = journal.append(&put(2, b"two")).unwrap();
        journal.append(&put(3, b"three")).unwrap();
        let total_len = journal.offset();
        drop(journal);

        // Record 1 now claims to run far past the end of the file.
        {
            let mut file = OpenOptions::new().write(true).open(&path).unwrap();
            file.write_all(&u32::MAX.to_le_bytes()).unwrap();
            file.sync_all().unwrap();
        }
        let damaged = fs::read(&path).unwrap();

        let err = Journal::open(&path, SyncMode::default()).err().unwrap();
        match err {
            StoreError::CorruptJournal { offset, backup, .. } => {
                assert_eq!(offset, 0);
                assert_eq!(backup, dir.path().join("middle.journal.corrupt"));
                assert_eq!(fs::read(&backup).unwrap(), damaged);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(fs::metadata(&path).unwrap().len(), total_len);
        assert_eq!(fs::read(&path).unwrap(), damaged);
        assert_eq!(find_intact_frame(&path, 1).unwrap(), Some(second));

        // Opening again still refuses and still leaves the file alone.
        assert!(matches!(
            Journal::open(&path, SyncMode::default()),
            Err(StoreError::CorruptJournal { .. })
        ));
        assert_eq!(fs::metadata(&path).unwrap().len(), total_len);
    }

    #[test]
    fn short_trailing_garbage_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.journal");
        let (mut journal, _) = Journal::open(&path, SyncMode::default()).unwrap();
        journal.append(&put(1, b"kept")).unwrap();
        let good_len = journal.offset();
        drop(journal);

        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(&[0xff, 0xff, 0xff]).unwrap();
        }

        let (journal, records) = Journal::open(&path, SyncMode::default()).unwrap();
        assert_eq!(records, vec![put(1, b"kept")]);
        assert_eq!(journal.offset(), good_len);
        assert_eq!(fs::metadata(&path).unwrap().len(), good_len);
        assert!(!dir.path().join("garbage.journal.corrupt").exists());
    }

    #[test]
    fn poisoned_journal_refuses_appends_until_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("poisoned.journal");
        let (mut journal, _) = Journal::open(&path, SyncMode::default()).unwrap();
        journal.append(&put(1, b"one")).unwrap();
        let len = journal.offset();

        journal.poisoned = true;
        assert!(matches!(
            journal.append(&put(2, b"two")),
            Err(StoreError::JournalPoisoned(p)) if p == path
        ));
        assert_eq!(journal.offset(), len);
        assert_eq!(fs::metadata(&path).unwrap().len(), len);

        journal.rewrite(&[put(1, b"one")]).unwrap();
        journal.append(&put(2, b"two")).unwrap();
        drop(journal);
        let (_journal, records) = Journal::open(&path, SyncMode::default()).unwrap();
        assert_eq!(records, vec![put(1, b"one"), put(2, b"two")]);
    }

    #[test]
    fn rewrite_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rewrite.journal");
        let (mut journal, _) = Journal::open(&path, SyncMode::default()).unwrap();
        for i in 1..=5 {
            journal.append(&put(i, b"old")).unwrap();
        }
        let before = journal.offset();

        let compacted = vec![JournalRecord::NextId { next: StoreId::new(6) }, put(5, b"old")];
        journal.rewrite(&compacted).unwrap();
        assert!(journal.offset() < before);

        journal.append(&put(6, b"new")).unwrap();
        drop(journal);

        let (_journal, records) = Journal::open(&path, SyncMode::default()).unwrap();
        assert_eq!(
            records,
            vec![
                JournalRecord::NextId { next: StoreId::new(6) },
                put(5, b"old"),
                put(6, b"new")
            ]
        );
    }

    #[test]
    fn debug_hides_payloads() {
        let record = JournalRecord::SetInternal {
            id: InternalBlobId::EncryptedAuthKey,
            blob: b"secret".to_vec(),
        };
        let debug = format!("{record:?}");
        assert_eq!(debug, "SetInternal(encrypted-auth-key, 6 bytes)");
    }
}
