/*!
 * Download the summary statistics and the LD reference panel, then unpack
 * the panel. Every step is skipped when its output is already in place.
 */

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use flate2::read::MultiGzDecoder;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{debug, info, warn};
use reqwest::blocking::Client;
use tar::Archive;

use crate::config::PrepConfig;
use crate::core::ResourceState;
use crate::errors::PrepError;


const COPY_BUF_SIZE: usize = 64 * 1024;
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;


/// An open remote resource.
pub struct RemoteBody {
    /// Size announced by the remote, if any. Progress is only shown when
    /// this is known.
    pub total_bytes: Option<u64>,
    pub reader: Box<dyn Read>,
}


/// Something that can open a URL for reading.
pub trait Transport {
    fn open(&self, url: &str) -> Result<RemoteBody, PrepError>;
}


/// Plain blocking HTTP(S) transport.
pub struct HttpTransport {
    client: Client,
}


impl HttpTransport {
    pub fn new(timeout: Option<Duration>) -> Result<HttpTransport, PrepError> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| {
                PrepError::Configuration(format!("could not build http client: {}", e))
            })?;

        Ok(HttpTransport { client })
    }
}


impl Transport for HttpTransport {
    fn open(&self, url: &str) -> Result<RemoteBody, PrepError> {
        let resp = self.client.get(url)
            .send()
            .map_err(|e| PrepError::Transport {
                url: url.to_string(),
                reason: e.to_string()
            })?;

        if !resp.status().is_success() {
            return Err(PrepError::Transport {
                url: url.to_string(),
                reason: format!("server returned {}", resp.status())
            });
        }

        Ok(RemoteBody {
            total_bytes: resp.content_length(),
            reader: Box::new(resp)
        })
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    AlreadyPresent,
    Downloaded { bytes: u64 },
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionOutcome {
    AlreadyExtracted,
    Extracted,
    // The archive unpacked but the marker file is not where we expect it.
    // Reported, not raised.
    MarkerMissing,
}


#[derive(Debug, Clone, PartialEq)]
pub struct FetchReport {
    pub gwas_path: PathBuf,
    pub gwas: DownloadOutcome,
    pub archive_path: PathBuf,
    pub archive: DownloadOutcome,
    pub reference_dir: PathBuf,
    pub extraction: ExtractionOutcome,
}


fn transfer_progress(total_bytes: Option<u64>) -> ProgressBar {
    let total = match total_bytes {
        Some(total) if total > 0 => total,
        _ => return ProgressBar::hidden()
    };

    let pb = ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::stdout());
    if let Ok(style) = ProgressStyle::with_template(
        "    {percent:>3}% {bytes}/{total_bytes} ({bytes_per_sec})"
    ) {
        pb.set_style(style);
    }
    pb
}


/// Makes sure `dest` exists and is non-empty, fetching `url` only when it
/// does not. A zero-byte `dest` counts as a failed earlier attempt.
pub fn download<T: Transport + ?Sized>(transport: &T, url: &str, dest: &Path)
    -> Result<DownloadOutcome, PrepError>
{
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    let state = ResourceState::of(dest);
    if state.is_complete() {
        info!("Already exists, skipping download: {}", dest.display());
        return Ok(DownloadOutcome::AlreadyPresent);
    }
    debug!("{} is {}, fetching", dest.display(), state);

    info!("Downloading {}", url);
    info!("    -> {}", dest.display());

    let mut body = transport.open(url)?;
    let progress = transfer_progress(body.total_bytes);
    let mut out = BufWriter::new(File::create(dest)?);

    let mut buf = vec![0u8; COPY_BUF_SIZE];
    loop {
        let n = match body.reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                progress.abandon();
                return Err(PrepError::Transport {
                    url: url.to_string(),
                    reason: e.to_string()
                });
            }
        };
        out.write_all(&buf[..n])?;
        progress.inc(n as u64);
    }
    out.flush()?;
    drop(out);
    progress.finish();

    // A short body from the server is not detected, only an empty one.
    let bytes = match fs::metadata(dest) {
        Ok(meta) if meta.len() > 0 => meta.len(),
        _ => return Err(PrepError::DownloadIncomplete { path: dest.to_path_buf() })
    };

    info!("Downloaded: {} ({:.1} MB)", dest.display(), bytes as f64 / BYTES_PER_MB);
    Ok(DownloadOutcome::Downloaded { bytes })
}


/// Unpacks a `.tar.gz` into the parent of `out_dir`, unless
/// `out_dir/marker_name` already exists and is non-empty.
///
/// The archive is expected to hold a single top level folder named like
/// `out_dir`. If the marker is still missing after unpacking, a warning is
/// logged and `MarkerMissing` is returned; this is not treated as an error.
pub fn ensure_extracted(archive: &Path, out_dir: &Path, marker_name: &str)
    -> Result<ExtractionOutcome, PrepError>
{
    fs::create_dir_all(out_dir)?;

    let marker = out_dir.join(marker_name);
    if ResourceState::of(&marker).is_complete() {
        info!("Reference panel already extracted: {}", out_dir.display());
        return Ok(ExtractionOutcome::AlreadyExtracted);
    }

    if !archive.exists() {
        return Err(PrepError::ArchiveMissing { path: archive.to_path_buf() });
    }

    let target = match out_dir.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from(".")
    };
    info!("Extracting {} -> {}", archive.display(), target.display());

    let f = File::open(archive)?;
    let mut tar = Archive::new(MultiGzDecoder::new(BufReader::new(f)));
    tar.unpack(&target).map_err(|e| PrepError::StreamCorrupt {
        path: archive.to_path_buf(),
        source: e
    })?;

    if !marker.exists() {
        warn!("Extraction finished, but {} was not found where expected.", marker_name);
        warn!("Check {} contents.", out_dir.display());
        return Ok(ExtractionOutcome::MarkerMissing);
    }

    info!("Extracted reference panel to: {}", out_dir.display());
    Ok(ExtractionOutcome::Extracted)
}


/// Fetch stage: both downloads in order, then the extraction.
pub fn prepare_inputs<T: Transport + ?Sized>(config: &PrepConfig, transport: &T)
    -> Result<FetchReport, PrepError>
{
    config.validate()?;

    let gwas_path = config.gwas_path()?;
    let archive_path = config.archive_path()?;
    let reference_dir = config.reference_dir()?;

    info!("Working directory: {}", config.working_dir.display());

    let gwas = download(transport, &config.gwas_url, &gwas_path)?;
    let archive = download(transport, &config.reference_url, &archive_path)?;
    let extraction = ensure_extracted(
        &archive_path,
        &reference_dir,
        &config.reference_marker_filename
    )?;

    Ok(FetchReport { gwas_path, gwas, archive_path, archive, reference_dir, extraction })
}
