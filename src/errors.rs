use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Error type for fetching, extracting and filtering failures.
#[derive(Debug, Error)]
pub enum PrepError {
    #[error("download failed or produced empty file: {}", .path.display())]
    DownloadIncomplete { path: PathBuf },
    #[error("archive not found: {}", .path.display())]
    ArchiveMissing { path: PathBuf },
    #[error("source file not found: {}", .path.display())]
    SourceFileMissing { path: PathBuf },
    #[error("corrupt or unreadable stream in {}: {source}", .path.display())]
    StreamCorrupt {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not fetch '{url}': {reason}")]
    Transport { url: String, reason: String },
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}


impl PrepError {
    // Maps an open failure to the missing-file case when that is what it is.
    pub(crate) fn on_open(path: PathBuf, err: io::Error) -> PrepError {
        if err.kind() == io::ErrorKind::NotFound {
            PrepError::SourceFileMissing { path }
        } else {
            PrepError::Io(err)
        }
    }
}
