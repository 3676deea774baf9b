//! Append-only record log backing the local store.
//!
//! Each record is a 16-byte header (`lsn: u64`, `crc32: u32`, `len: u32`,
//! big-endian) followed by `len` payload bytes.

use citegraph_core::error::{CitegraphError, ErrorCode};
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::warn;

const HEADER_LEN: usize = 16;

#[derive(Error, Debug)]
pub enum WalError {
    #[error("log io: {0}")]
    Io(#[from] std::io::Error),
    #[error("checksum mismatch in record {lsn}")]
    ChecksumMismatch { lsn: u64 },
    #[error("record {lsn} could not be decoded")]
    UndecodableRecord { lsn: u64 },
    #[error("log is closed")]
    Closed,
}

impl CitegraphError for WalError {
    fn error_code(&self) -> ErrorCode {
        match self {
            WalError::Io(_) | WalError::Closed => ErrorCode::Unavailable,
            WalError::ChecksumMismatch { .. } | WalError::UndecodableRecord { .. } => {
                ErrorCode::DataLoss
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RecordHeader {
    lsn: u64,
    crc: u32,
    len: u32,
}

impl RecordHeader {
    fn for_payload(lsn: u64, payload: &[u8]) -> Self {
        Self {
            lsn,
            crc: crc32fast::hash(payload),
            len: payload.len() as u32,
        }
    }

    fn to_bytes(self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[..8].copy_from_slice(&self.lsn.to_be_bytes());
        bytes[8..12].copy_from_slice(&self.crc.to_be_bytes());
        bytes[12..].copy_from_slice(&self.len.to_be_bytes());
        bytes
    }

    fn from_bytes(bytes: [u8; HEADER_LEN]) -> Self {
        let [l0, l1, l2, l3, l4, l5, l6, l7, c0, c1, c2, c3, n0, n1, n2, n3] = bytes;
        Self {
            lsn: u64::from_be_bytes([l0, l1, l2, l3, l4, l5, l6, l7]),
            crc: u32::from_be_bytes([c0, c1, c2, c3]),
            len: u32::from_be_bytes([n0, n1, n2, n3]),
        }
    }
}

/// `Ok(None)` at a clean end of file or a torn trailing record.
async fn read_record<R>(reader: &mut R) -> Result<Option<(u64, Vec<u8>)>, WalError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    if !read_full(reader, &mut header).await? {
        return Ok(None);
    }
    let header = RecordHeader::from_bytes(header);

    let mut payload = vec![0u8; header.len as usize];
    if !read_full(reader, &mut payload).await? {
        return Ok(None);
    }
    if crc32fast::hash(&payload) != header.crc {
        return Err(WalError::ChecksumMismatch { lsn: header.lsn });
    }
    Ok(Some((header.lsn, payload)))
}

async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> Result<bool, WalError>
where
    R: AsyncRead + Unpin,
{
    match reader.read_exact(buf).await {
        Ok(_) => Ok(true),
        Err(err) if err.kind() == ErrorKind::UnexpectedEof => Ok(false),
        Err(err) => Err(err.into()),
    }
}

async fn write_record<W>(writer: &mut W, lsn: u64, payload: &[u8]) -> Result<(), WalError>
where
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(&RecordHeader::for_payload(lsn, payload).to_bytes())
        .await?;
    writer.write_all(payload).await?;
    Ok(())
}

pub struct Wal {
    path: PathBuf,
    file: BufWriter<File>,
    last_lsn: u64,
}

impl Wal {
    /// Opens or creates the log. Call [`Wal::replay`] before appending so
    /// sequence numbers continue from the last stored record.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, WalError> {
        let path = path.as_ref().to_path_buf();
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                tokio::fs::create_dir_all(parent).await?
            }
            _ => {}
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .await?;

        Ok(Self {
            path,
            file: BufWriter::new(file),
            last_lsn: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current_lsn(&self) -> u64 {
        self.last_lsn
    }

    /// Buffers one record and returns its sequence number. Not durable until
    /// [`Wal::flush`].
    pub async fn append(&mut self, payload: &[u8]) -> Result<u64, WalError> {
        let lsn = self.last_lsn + 1;
        write_record(&mut self.file, lsn, payload).await?;
        self.last_lsn = lsn;
        Ok(lsn)
    }

    pub async fn flush(&mut self) -> Result<(), WalError> {
        self.file.flush().await?;
        self.file.get_ref().sync_all().await?;
        Ok(())
    }

    /// Feeds every intact record to `apply` in order and returns the last
    /// sequence number. A torn trailing record is cut off the file.
    pub async fn replay<F>(&mut self, mut apply: F) -> Result<u64, WalError>
    where
        F: FnMut(u64, Vec<u8>) -> Result<(), WalError>,
    {
        self.file.flush().await?;
        let file = self.file.get_mut();
        file.seek(SeekFrom::Start(0)).await?;

        let mut last_lsn = 0;
        let mut intact_len = 0;
        while let Some((lsn, payload)) = read_record(&mut *file).await? {
            apply(lsn, payload)?;
            last_lsn = lsn;
            intact_len = file.stream_position().await?;
        }

        let file_len = file.metadata().await?.len();
        if intact_len < file_len {
            warn!(
                path = %self.path.display(),
                intact_len,
                dropped = file_len - intact_len,
                "truncating torn log tail"
            );
            file.set_len(intact_len).await?;
        }
        file.seek(SeekFrom::End(0)).await?;

        self.last_lsn = last_lsn;
        Ok(last_lsn)
    }

    /// Replaces the log with `payloads` numbered from 1. The new contents are
    /// written and synced to a sibling file that is then renamed over the
    /// log, so a failure leaves the old log in place.
    pub async fn rewrite(self, payloads: &[Vec<u8>]) -> Result<Self, WalError> {
        let Self { path, file, .. } = self;
        drop(file);
        let staging = path.with_extension("compact");

        let mut writer = BufWriter::new(File::create(&staging).await?);
        for (lsn, payload) in (1u64..).zip(payloads) {
            write_record(&mut writer, lsn, payload).await?;
        }
        writer.flush().await?;
        writer.get_ref().sync_all().await?;
        drop(writer);
        tokio::fs::rename(&staging, &path).await?;

        let mut wal = Self::open(&path).await?;
        wal.last_lsn = payloads.len() as u64;
        Ok(wal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn append_numbers_records_from_one() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.wal");

        let mut wal = Wal::open(&path).await.unwrap();

        let entry1 = b"first record";
        let entry2 = b"second";
        assert_eq!(wal.append(entry1).await.unwrap(), 1);
        assert_eq!(wal.append(entry2).await.unwrap(), 2);
        wal.flush().await.unwrap();

        // 16-byte header per record plus payloads
        let metadata = tokio::fs::metadata(&path).await.unwrap();
        assert_eq!(
            metadata.len(),
            (HEADER_LEN as u64 * 2) + entry1.len() as u64 + entry2.len() as u64
        );
    }

    #[tokio::test]
    async fn replay_returns_records_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("replay.wal");

        {
            let mut wal = Wal::open(&path).await.unwrap();
            wal.append(b"Entry 1").await.unwrap();
            wal.append(b"Entry 2").await.unwrap();
            wal.flush().await.unwrap();
        }

        {
            let mut wal = Wal::open(&path).await.unwrap();
            let mut recovered = Vec::new();

            let last_lsn = wal
                .replay(|lsn, payload| {
                    recovered.push((lsn, payload));
                    Ok(())
                })
                .await
                .unwrap();

            assert_eq!(last_lsn, 2);
            assert_eq!(recovered.len(), 2);
            assert_eq!(recovered[0].1, b"Entry 1");
            assert_eq!(recovered[1].1, b"Entry 2");
            assert_eq!(wal.current_lsn(), 2);
        }
    }

    #[tokio::test]
    async fn torn_tail_is_truncated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("torn.wal");

        {
            let mut wal = Wal::open(&path).await.unwrap();
            wal.append(b"complete").await.unwrap();
            wal.flush().await.unwrap();
        }
        let complete_len = tokio::fs::metadata(&path).await.unwrap().len();

        // Header claiming 100 bytes followed by only 3.
        {
            let mut file = OpenOptions::new().append(true).open(&path).await.unwrap();
            file.write_u64(2).await.unwrap();
            file.write_u32(0).await.unwrap();
            file.write_u32(100).await.unwrap();
            file.write_all(b"abc").await.unwrap();
            file.sync_all().await.unwrap();
        }

        let mut wal = Wal::open(&path).await.unwrap();
        let mut count = 0;
        let last = wal
            .replay(|_, _| {
                count += 1;
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(count, 1);
        assert_eq!(last, 1);
        assert_eq!(tokio::fs::metadata(&path).await.unwrap().len(), complete_len);
    }

    #[tokio::test]
    async fn rewrite_replaces_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rewrite.wal");

        let mut wal = Wal::open(&path).await.unwrap();
        for i in 0..5u8 {
            wal.append(&[i]).await.unwrap();
        }
        wal.flush().await.unwrap();

        let mut wal = wal.rewrite(&[b"only".to_vec()]).await.unwrap();
        assert_eq!(wal.current_lsn(), 1);

        let mut recovered = Vec::new();
        wal.replay(|_, payload| {
            recovered.push(payload);
            Ok(())
        })
        .await
        .unwrap();
        assert_eq!(recovered, vec![b"only".to_vec()]);
    }
}
