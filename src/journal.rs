//! Append-only receipt spill file.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::Result;
use crate::receipt::{Receipt, RECEIPT_LEN};

/// Byte storage under a [`ReceiptLog`].
pub trait LogStorage: Read + Write + Seek {
    /// Current length in bytes.
    fn byte_len(&mut self) -> io::Result<u64>;

    /// Truncate or extend to `len` bytes.
    fn set_len(&mut self, len: u64) -> io::Result<()>;

    /// Push written bytes to stable storage.
    fn sync_data(&self) -> io::Result<()>;
}

impl LogStorage for File {
    fn byte_len(&mut self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn set_len(&mut self, len: u64) -> io::Result<()> {
        File::set_len(self, len)
    }

    fn sync_data(&self) -> io::Result<()> {
        File::sync_data(self)
    }
}

/// Receipts persisted one fixed-width record after another.
///
/// The storage only ever holds whole records: a failed append is cut back to
/// the last record boundary before the error is returned.
#[derive(Debug)]
pub struct ReceiptLog<S = File> {
    storage: S,
    records: u64,
}

impl ReceiptLog<File> {
    /// Open or create the log file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        tracing::debug!(path = %path.display(), "receipt log opened");
        Self::with_storage(file)
    }
}

impl<S: LogStorage> ReceiptLog<S> {
    /// Wrap existing storage. A trailing partial record left by an abandoned
    /// write is cut off so appends resume at a record boundary.
    pub fn with_storage(mut storage: S) -> Result<Self> {
        let len = storage.byte_len()?;
        let complete = len - len % RECEIPT_LEN as u64;
        if complete != len {
            tracing::warn!(dropped = len - complete, "truncating partial receipt record");
            storage.set_len(complete)?;
        }
        storage.seek(SeekFrom::End(0))?;
        Ok(Self {
            storage,
            records: complete / RECEIPT_LEN as u64,
        })
    }

    pub fn len(&self) -> u64 {
        self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    /// Write one full record and flush it. On failure the partial record is
    /// removed again.
    pub fn append(&mut self, receipt: &Receipt) -> Result<()> {
        let written = self
            .storage
            .write_all(&receipt.to_bytes())
            .and_then(|()| self.storage.flush());
        if let Err(e) = written {
            self.rollback();
            return Err(e.into());
        }
        self.records += 1;
        Ok(())
    }

    fn rollback(&mut self) {
        let boundary = self.records * RECEIPT_LEN as u64;
        let restored = self
            .storage
            .set_len(boundary)
            .and_then(|()| self.storage.seek(SeekFrom::Start(boundary)));
        if let Err(e) = restored {
            tracing::warn!(records = self.records, error = %e, "partial receipt record left behind");
        }
    }

    /// Flush file contents to stable storage.
    pub fn sync(&self) -> Result<()> {
        self.storage.sync_data()?;
        Ok(())
    }

    /// Reload every record.
    pub fn read_all(&mut self) -> Result<Vec<Receipt>> {
        self.storage.seek(SeekFrom::Start(0))?;
        let mut bytes = Vec::with_capacity(self.records as usize * RECEIPT_LEN);
        self.storage.read_to_end(&mut bytes)?;
        self.storage.seek(SeekFrom::End(0))?;
        let receipts = bytes
            .chunks_exact(RECEIPT_LEN)
            .map(Receipt::from_bytes)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(receipts)
    }
}
