//! Per-monitor shared-memory reader.
//!
//! Each running monitor has a fixed-layout control block at
//! `/dev/shm/zm.mmap.<id>`, written by the zmc capture process. Only the
//! leading `SharedData` struct is decoded here; the layout below matches
//! ZoneMinder 1.36+ on a 64-bit little-endian host.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShmError {
    #[error("shared memory segment {0} does not exist")]
    Missing(PathBuf),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("segment {path} too short: {len} bytes, need {need}")]
    Truncated {
        path: PathBuf,
        len: usize,
        need: usize,
    },
    #[error("segment {path} has implausible size field {size}")]
    BadLayout { path: PathBuf, size: u32 },
}

/// Decoded `SharedData` fields consumed by the collector.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SharedData {
    pub last_write_index: i32,
    pub last_read_index: i32,
    pub state: u32,
    pub last_event: u64,
    pub action: u32,
    pub active: bool,
    pub signal: bool,
    pub format: bool,
    pub imagesize: u32,
    pub last_frame_score: u32,
    pub audio_frequency: u32,
    pub audio_channels: u32,
    pub startup_time: i64,
    pub heartbeat_time: i64,
    pub last_write_time: i64,
    pub last_read_time: i64,
}

/// Byte offsets into the `SharedData` block.
mod offset {
    pub const SIZE: usize = 0;
    pub const LAST_WRITE_INDEX: usize = 4;
    pub const LAST_READ_INDEX: usize = 8;
    pub const STATE: usize = 12;
    pub const LAST_EVENT: usize = 32;
    pub const ACTION: usize = 40;
    pub const VALID: usize = 68;
    pub const ACTIVE: usize = 69;
    pub const SIGNAL: usize = 70;
    pub const FORMAT: usize = 71;
    pub const IMAGESIZE: usize = 72;
    pub const LAST_FRAME_SCORE: usize = 76;
    pub const AUDIO_FREQUENCY: usize = 80;
    pub const AUDIO_CHANNELS: usize = 84;
    pub const STARTUP_TIME: usize = 96;
    pub const HEARTBEAT_TIME: usize = 104;
    pub const LAST_WRITE_TIME: usize = 112;
    pub const LAST_READ_TIME: usize = 120;
}

/// Minimum bytes needed to decode every field above.
pub const SHARED_DATA_LEN: usize = 128;

fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes(buf[at..at + 4].try_into().unwrap())
}

fn read_i32(buf: &[u8], at: usize) -> i32 {
    i32::from_le_bytes(buf[at..at + 4].try_into().unwrap())
}

fn read_u64(buf: &[u8], at: usize) -> u64 {
    u64::from_le_bytes(buf[at..at + 8].try_into().unwrap())
}

fn read_i64(buf: &[u8], at: usize) -> i64 {
    i64::from_le_bytes(buf[at..at + 8].try_into().unwrap())
}

/// Decode a `SharedData` block from raw bytes.
pub fn decode_shared_data(buf: &[u8], path: &Path) -> Result<SharedData, ShmError> {
    if buf.len() < SHARED_DATA_LEN {
        return Err(ShmError::Truncated {
            path: path.to_path_buf(),
            len: buf.len(),
            need: SHARED_DATA_LEN,
        });
    }
    let size = read_u32(buf, offset::SIZE);
    // The struct self-describes its size; a value below the decoded span
    // means a layout this reader does not understand.
    if (size as usize) < SHARED_DATA_LEN {
        return Err(ShmError::BadLayout {
            path: path.to_path_buf(),
            size,
        });
    }
    if buf[offset::VALID] == 0 {
        tracing::debug!(?path, "shared data block not flagged valid");
    }
    Ok(SharedData {
        last_write_index: read_i32(buf, offset::LAST_WRITE_INDEX),
        last_read_index: read_i32(buf, offset::LAST_READ_INDEX),
        state: read_u32(buf, offset::STATE),
        last_event: read_u64(buf, offset::LAST_EVENT),
        action: read_u32(buf, offset::ACTION),
        active: buf[offset::ACTIVE] != 0,
        signal: buf[offset::SIGNAL] != 0,
        format: buf[offset::FORMAT] != 0,
        imagesize: read_u32(buf, offset::IMAGESIZE),
        last_frame_score: read_u32(buf, offset::LAST_FRAME_SCORE),
        audio_frequency: read_u32(buf, offset::AUDIO_FREQUENCY),
        audio_channels: read_u32(buf, offset::AUDIO_CHANNELS),
        startup_time: read_i64(buf, offset::STARTUP_TIME),
        heartbeat_time: read_i64(buf, offset::HEARTBEAT_TIME),
        last_write_time: read_i64(buf, offset::LAST_WRITE_TIME),
        last_read_time: read_i64(buf, offset::LAST_READ_TIME),
    })
}

/// Read access to per-monitor shared-memory segments.
pub trait ShmReader {
    /// Whether a segment exists for the monitor. Disabled or never-started
    /// monitors have none.
    fn exists(&self, monitor_id: u32) -> bool;

    /// Open, decode, and release the segment for the monitor.
    fn read(&self, monitor_id: u32) -> Result<SharedData, ShmError>;
}

/// File-backed reader over `/dev/shm`.
pub struct MmapShm {
    root: PathBuf,
}

impl MmapShm {
    pub fn new() -> Self {
        Self::with_root("/dev/shm")
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn segment_path(&self, monitor_id: u32) -> PathBuf {
        self.root.join(format!("zm.mmap.{monitor_id}"))
    }
}

impl Default for MmapShm {
    fn default() -> Self {
        Self::new()
    }
}

impl ShmReader for MmapShm {
    fn exists(&self, monitor_id: u32) -> bool {
        self.segment_path(monitor_id).exists()
    }

    fn read(&self, monitor_id: u32) -> Result<SharedData, ShmError> {
        let path = self.segment_path(monitor_id);
        if !path.exists() {
            return Err(ShmError::Missing(path));
        }
        // The file handle is dropped at the end of this scope whether the
        // decode succeeds or fails.
        let mut file = File::open(&path).map_err(|e| ShmError::Io {
            path: path.clone(),
            source: e,
        })?;
        let mut buf = vec![0u8; SHARED_DATA_LEN];
        file.read_exact(&mut buf).map_err(|e| ShmError::Io {
            path: path.clone(),
            source: e,
        })?;
        decode_shared_data(&buf, &path)
    }
}

#[cfg(test)]
pub(crate) fn encode_shared_data(data: &SharedData) -> Vec<u8> {
    let mut buf = vec![0u8; SHARED_DATA_LEN];
    buf[offset::SIZE..offset::SIZE + 4].copy_from_slice(&(SHARED_DATA_LEN as u32).to_le_bytes());
    buf[offset::LAST_WRITE_INDEX..offset::LAST_WRITE_INDEX + 4]
        .copy_from_slice(&data.last_write_index.to_le_bytes());
    buf[offset::LAST_READ_INDEX..offset::LAST_READ_INDEX + 4]
        .copy_from_slice(&data.last_read_index.to_le_bytes());
    buf[offset::STATE..offset::STATE + 4].copy_from_slice(&data.state.to_le_bytes());
    buf[offset::LAST_EVENT..offset::LAST_EVENT + 8].copy_from_slice(&data.last_event.to_le_bytes());
    buf[offset::ACTION..offset::ACTION + 4].copy_from_slice(&data.action.to_le_bytes());
    buf[offset::VALID] = 1;
    buf[offset::ACTIVE] = data.active as u8;
    buf[offset::SIGNAL] = data.signal as u8;
    buf[offset::FORMAT] = data.format as u8;
    buf[offset::IMAGESIZE..offset::IMAGESIZE + 4].copy_from_slice(&data.imagesize.to_le_bytes());
    buf[offset::LAST_FRAME_SCORE..offset::LAST_FRAME_SCORE + 4]
        .copy_from_slice(&data.last_frame_score.to_le_bytes());
    buf[offset::AUDIO_FREQUENCY..offset::AUDIO_FREQUENCY + 4]
        .copy_from_slice(&data.audio_frequency.to_le_bytes());
    buf[offset::AUDIO_CHANNELS..offset::AUDIO_CHANNELS + 4]
        .copy_from_slice(&data.audio_channels.to_le_bytes());
    buf[offset::STARTUP_TIME..offset::STARTUP_TIME + 8]
        .copy_from_slice(&data.startup_time.to_le_bytes());
    buf[offset::HEARTBEAT_TIME..offset::HEARTBEAT_TIME + 8]
        .copy_from_slice(&data.heartbeat_time.to_le_bytes());
    buf[offset::LAST_WRITE_TIME..offset::LAST_WRITE_TIME + 8]
        .copy_from_slice(&data.last_write_time.to_le_bytes());
    buf[offset::LAST_READ_TIME..offset::LAST_READ_TIME + 8]
        .copy_from_slice(&data.last_read_time.to_le_bytes());
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_data() -> SharedData {
        SharedData {
            last_write_index: 7,
            last_read_index: 6,
            state: 2,
            last_event: 4021,
            action: 1,
            active: true,
            signal: true,
            format: false,
            imagesize: 6_220_800,
            last_frame_score: 17,
            audio_frequency: 8000,
            audio_channels: 1,
            startup_time: 1_700_000_000,
            heartbeat_time: 1_700_003_600,
            last_write_time: 1_700_003_601,
            last_read_time: 1_700_003_602,
        }
    }

    #[test]
    fn test_decode_round_layout() {
        let data = sample_data();
        let buf = encode_shared_data(&data);
        let decoded = decode_shared_data(&buf, Path::new("zm.mmap.1")).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_decode_rejects_short_buffer() {
        let err = decode_shared_data(&[0u8; 64], Path::new("zm.mmap.1")).unwrap_err();
        assert!(matches!(err, ShmError::Truncated { len: 64, .. }));
    }

    #[test]
    fn test_decode_rejects_implausible_size_field() {
        let mut buf = encode_shared_data(&sample_data());
        buf[0..4].copy_from_slice(&16u32.to_le_bytes());
        let err = decode_shared_data(&buf, Path::new("zm.mmap.1")).unwrap_err();
        assert!(matches!(err, ShmError::BadLayout { size: 16, .. }));
    }

    #[test]
    fn test_file_backed_reader() {
        let dir = tempfile::tempdir().unwrap();
        let reader = MmapShm::with_root(dir.path());
        assert!(!reader.exists(5));
        assert!(matches!(reader.read(5), Err(ShmError::Missing(_))));

        let data = sample_data();
        let mut f = File::create(dir.path().join("zm.mmap.5")).unwrap();
        f.write_all(&encode_shared_data(&data)).unwrap();
        drop(f);

        assert!(reader.exists(5));
        assert_eq!(reader.read(5).unwrap(), data);
    }
}
