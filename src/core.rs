use std::collections::HashSet;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;

use crate::errors::PrepError;


pub const FIELD_DELIMITER: char = '\t';


// Returns the line without its trailing `\n` or `\r\n`.
pub fn strip_line_ending(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}


/// Identifier of a record: everything before the first tab. A line without
/// a tab is its own identifier.
pub fn record_id(line: &str) -> &str {
    let line = strip_line_ending(line);
    match line.split_once(FIELD_DELIMITER) {
        Some((id, _)) => id,
        None => line
    }
}


/// State of a file we either fetched or extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    Absent,
    // Present but zero bytes; a previous attempt failed.
    Empty,
    Complete,
}


impl ResourceState {
    pub fn of(path: &Path) -> ResourceState {
        match fs::metadata(path) {
            Ok(meta) if meta.len() > 0 => ResourceState::Complete,
            Ok(_) => ResourceState::Empty,
            Err(_) => ResourceState::Absent
        }
    }

    pub fn is_complete(&self) -> bool {
        *self == ResourceState::Complete
    }
}


impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            ResourceState::Absent => "absent",
            ResourceState::Empty => "empty",
            ResourceState::Complete => "complete"
        };
        write!(f, "{}", s)
    }
}


/// The set of SNP identifiers rows are kept for (e.g. the HapMap3 list).
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReferenceIdSet {
    ids: HashSet<String>
}


impl ReferenceIdSet {
    /// Builds the set from a list with one identifier per line. Only the
    /// first tab-delimited field is used and blank lines are skipped.
    pub fn from_reader<R: BufRead>(reader: R) -> std::io::Result<ReferenceIdSet> {
        let mut ids = HashSet::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            ids.insert(record_id(&line).to_string());
        }

        Ok(ReferenceIdSet { ids })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}


impl<S: Into<String>> FromIterator<S> for ReferenceIdSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        ReferenceIdSet { ids: iter.into_iter().map(Into::into).collect() }
    }
}


/// Tallies accumulated over one pass of the filter.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FilterCounts {
    // Data rows seen, the header excluded.
    pub rows_read: u64,
    pub rows_written: u64,
}


/// Lazy, single pass iterator over the lines of a delimited text stream.
///
/// Every item keeps its line terminator so a row can be written back out
/// exactly as it was read. Read failures (bad compression, invalid UTF-8)
/// are reported as `StreamCorrupt` against `source`.
pub struct DelimitedRecordReader<R: BufRead> {
    reader: R,
    source: PathBuf,
    done: bool
}


impl DelimitedRecordReader<BufReader<MultiGzDecoder<File>>> {
    /// Opens a gzip compressed file. Concatenated gzip members (bgzip
    /// output) are read through as one stream.
    pub fn open_gz(path: &Path) -> Result<Self, PrepError> {
        let f = File::open(path)
            .map_err(|e| PrepError::on_open(path.to_path_buf(), e))?;

        Ok(DelimitedRecordReader::from_reader(
            BufReader::new(MultiGzDecoder::new(f)),
            path
        ))
    }
}


impl<R: BufRead> DelimitedRecordReader<R> {
    pub fn from_reader(reader: R, source: &Path) -> Self {
        DelimitedRecordReader {
            reader,
            source: source.to_path_buf(),
            done: false
        }
    }
}


impl<R: BufRead> Iterator for DelimitedRecordReader<R> {
    type Item = Result<String, PrepError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => {
                self.done = true;
                None
            },
            Ok(_) => Some(Ok(line)),
            Err(e) => {
                // Nothing sensible can follow a broken stream.
                self.done = true;
                Some(Err(PrepError::StreamCorrupt {
                    path: self.source.clone(),
                    source: e
                }))
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use super::*;

    #[test]
    fn test_record_id() {
        assert_eq!(record_id("rs1\tA\tB\n"), "rs1");
        assert_eq!(record_id("rs2\t\n"), "rs2");
        assert_eq!(record_id("rs3\r\n"), "rs3");
        assert_eq!(record_id("rs4"), "rs4");
        assert_eq!(record_id("\tA\n"), "");
    }

    #[test]
    fn test_reference_set_skips_blanks_and_dedups() {
        let list = "SNP\tA1\tA2\nrs1\tA\tG\n\n   \nrs2\tC\tT\nrs1\tA\tG\nrs3\n";
        let ids = ReferenceIdSet::from_reader(Cursor::new(list)).unwrap();

        assert_eq!(ids.len(), 4);
        assert!(ids.contains("SNP"));
        assert!(ids.contains("rs1"));
        assert!(ids.contains("rs3"));
        assert!(!ids.contains("rs3\n"));
        assert!(!ids.contains(""));
    }

    #[test]
    fn test_reader_keeps_line_endings() {
        let data = "H\tX\nrs1\tA\r\nrs2\tB";
        let reader = DelimitedRecordReader::from_reader(
            Cursor::new(data),
            Path::new("mem")
        );
        let lines: Vec<String> = reader.map(|l| l.unwrap()).collect();

        assert_eq!(lines, vec!["H\tX\n", "rs1\tA\r\n", "rs2\tB"]);
    }

    #[test]
    fn test_reader_reports_invalid_utf8_once() {
        let data: &[u8] = b"H\nrs1\t\xff\xfe\nrs2\n";
        let mut reader = DelimitedRecordReader::from_reader(
            Cursor::new(data),
            Path::new("bad.tsv")
        );

        assert_eq!(reader.next().unwrap().unwrap(), "H\n");
        match reader.next() {
            Some(Err(PrepError::StreamCorrupt { path, .. })) => {
                assert_eq!(path, PathBuf::from("bad.tsv"));
            },
            other => panic!("Expected a corrupt stream, got {:?}", other)
        }
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_resource_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("res.bin");

        assert_eq!(ResourceState::of(&path), ResourceState::Absent);
        fs::write(&path, b"").unwrap();
        assert_eq!(ResourceState::of(&path), ResourceState::Empty);
        fs::write(&path, b"x").unwrap();
        assert!(ResourceState::of(&path).is_complete());
    }

    #[test]
    fn test_open_gz_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.tsv.gz");

        match DelimitedRecordReader::open_gz(&path) {
            Err(PrepError::SourceFileMissing { path: p }) => assert_eq!(p, path),
            Err(e) => panic!("Unexpected error: {}", e),
            Ok(_) => panic!("Opening a missing file should fail.")
        }
    }
}
