//! Trace-file scanning and frame indexing.
//!
//! A trace file is a plain concatenation of frames, each a 16-byte storage
//! header followed by one message. [`FrameIndex`] records where every frame
//! starts so a file can be reopened without rescanning:
//!
//! ```no_run
//! use dlt_core::{FrameIndex, TraceFile, Result};
//!
//! fn replay() -> Result<()> {
//!     // Scan once and keep the index next to the trace
//!     let trace = TraceFile::open("trace.dlt", false)?;
//!     trace.index().save_to_file("trace.dlt.index")?;
//!
//!     // Later: reuse the index
//!     let index = FrameIndex::load_from_file("trace.dlt.index")?;
//!     let trace = TraceFile::open_with_index("trace.dlt", index, false)?;
//!     for message in trace.messages() {
//!         println!("{}", message?.counter());
//!     }
//!     Ok(())
//! }
//! ```

use log::{debug, warn};

use crate::filter::FilterSet;
use crate::message::{Message, STORAGE_HEADER_SIZE, STORAGE_PATTERN};
use crate::{Error, Result};

/// Position of one frame (storage header included) in a trace file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrameLocation {
    pub offset: u64,
    pub len: u32,
}

/// Offsets of all decodable frames of a trace file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrameIndex {
    /// Size of the file the index was built from.
    pub file_size: u64,
    pub frames: Vec<FrameLocation>,
    /// Number of candidate frames that failed to decode.
    pub skipped: u64,
}

fn next_marker(data: &[u8], from: usize) -> Option<usize> {
    data.get(from..)?
        .windows(STORAGE_PATTERN.len())
        .position(|window| window == STORAGE_PATTERN)
        .map(|position| from + position)
}

impl FrameIndex {
    /// Scan `data` for frames.
    ///
    /// Bytes before the first storage header are ignored. A frame that fails
    /// to decode is counted in `skipped` and scanning resumes at the next
    /// storage-header marker.
    pub fn scan(data: &[u8], verbose_hint: bool) -> Self {
        let mut index = Self {
            file_size: data.len() as u64,
            ..Self::default()
        };
        let mut cursor = next_marker(data, 0);
        while let Some(offset) = cursor {
            match Message::decode_with_storage_header(&data[offset..], verbose_hint) {
                Ok(message) => {
                    let len = message.total_len();
                    index.frames.push(FrameLocation {
                        offset: offset as u64,
                        len: len as u32,
                    });
                    cursor = next_marker(data, offset + len);
                }
                Err(err) => {
                    warn!("skipping frame at offset {offset}: {err}");
                    index.skipped += 1;
                    cursor = next_marker(data, offset + 1);
                }
            }
        }
        debug!(
            "indexed {} frames ({} skipped) in {} bytes",
            index.frames.len(),
            index.skipped,
            data.len()
        );
        index
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Save the index as JSON.
    #[cfg(feature = "serde_json")]
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, index_path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(index_path, json)?;
        Ok(())
    }

    /// Load an index from a JSON file.
    #[cfg(feature = "serde_json")]
    pub fn load_from_file<P: AsRef<std::path::Path>>(index_path: P) -> Result<Self> {
        let json = std::fs::read_to_string(index_path)?;
        let index: FrameIndex = serde_json::from_str(&json)?;
        Ok(index)
    }

    /// Check that every frame lies inside `data` and that sizes agree.
    fn validate(&self, data: &[u8]) -> Result<()> {
        if self.file_size != data.len() as u64 {
            return Err(Error::IndexError(format!(
                "index built for {} bytes, file has {}",
                self.file_size,
                data.len()
            )));
        }
        for frame in &self.frames {
            let end = frame.offset.checked_add(u64::from(frame.len));
            if end.is_none_or(|end| end > data.len() as u64)
                || (frame.len as usize) < STORAGE_HEADER_SIZE
            {
                return Err(Error::IndexError(format!(
                    "frame at offset {} with length {} is outside the file",
                    frame.offset, frame.len
                )));
            }
        }
        Ok(())
    }
}

/// A trace file held in memory together with its frame index.
#[derive(Debug, Clone)]
pub struct TraceFile {
    data: Vec<u8>,
    index: FrameIndex,
    verbose_hint: bool,
}

impl TraceFile {
    /// Index the frames of in-memory trace data.
    pub fn from_bytes(data: Vec<u8>, verbose_hint: bool) -> Self {
        let index = FrameIndex::scan(&data, verbose_hint);
        Self {
            data,
            index,
            verbose_hint,
        }
    }

    /// Use a previously built index instead of scanning.
    pub fn with_index(data: Vec<u8>, index: FrameIndex, verbose_hint: bool) -> Result<Self> {
        index.validate(&data)?;
        Ok(Self {
            data,
            index,
            verbose_hint,
        })
    }

    /// Read and index a trace file.
    pub fn open<P: AsRef<std::path::Path>>(path: P, verbose_hint: bool) -> Result<Self> {
        let data = std::fs::read(path)?;
        Ok(Self::from_bytes(data, verbose_hint))
    }

    /// Read a trace file and apply a saved index.
    pub fn open_with_index<P: AsRef<std::path::Path>>(
        path: P,
        index: FrameIndex,
        verbose_hint: bool,
    ) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::with_index(data, index, verbose_hint)
    }

    pub fn index(&self) -> &FrameIndex {
        &self.index
    }

    /// Number of indexed frames.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Decode the frame at `position` in the index.
    pub fn message(&self, position: usize) -> Result<Message<'_>> {
        let frame = self
            .index
            .frames
            .get(position)
            .ok_or(Error::NotPresent("frame"))?;
        let start = frame.offset as usize;
        let end = start + frame.len as usize;
        Message::decode_with_storage_header(&self.data[start..end], self.verbose_hint)
    }

    /// Decode all indexed frames in file order.
    pub fn messages(&self) -> impl Iterator<Item = Result<Message<'_>>> + '_ {
        (0..self.len()).map(move |position| self.message(position))
    }

    /// Decoded frames that pass `filters`. Frames that fail to decode are skipped.
    pub fn filtered<'s>(&'s self, filters: &'s FilterSet) -> impl Iterator<Item = Message<'s>> + 's {
        self.messages()
            .filter_map(|message| message.ok())
            .filter(move |message| filters.matches(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::MessageBuilder;
    use crate::message::StorageHeader;

    fn frame(counter: u8) -> Vec<u8> {
        MessageBuilder::new()
            .counter(counter)
            .storage_header(StorageHeader {
                seconds: 100,
                microseconds: 0,
                ecu: "ECU".parse().unwrap(),
            })
            .non_verbose(7, &[counter; 3])
            .build()
            .unwrap()
    }

    #[test]
    fn test_scan_skips_garbage() {
        let mut data = vec![0xEE; 5];
        data.extend_from_slice(&frame(1));
        data.extend_from_slice(b"DLT\x01broken");
        data.extend_from_slice(&frame(2));

        let index = FrameIndex::scan(&data, false);
        assert_eq!(index.len(), 2);
        assert_eq!(index.skipped, 1);
        assert_eq!(index.frames[0].offset, 5);
        assert_eq!(index.file_size, data.len() as u64);
    }

    #[test]
    fn test_index_must_match_data() {
        let data = frame(1);
        let mut index = FrameIndex::scan(&data, false);
        index.frames[0].len += 1;
        assert!(matches!(
            TraceFile::with_index(data.clone(), index, false),
            Err(Error::IndexError(_))
        ));

        let index = FrameIndex::scan(&data, false);
        let mut longer = data.clone();
        longer.push(0);
        assert!(matches!(
            TraceFile::with_index(longer, index, false),
            Err(Error::IndexError(_))
        ));
    }

    #[test]
    fn test_message_out_of_range() {
        let trace = TraceFile::from_bytes(frame(1), false);
        assert!(trace.message(0).is_ok());
        assert!(matches!(trace.message(1), Err(Error::NotPresent(_))));
    }
}
