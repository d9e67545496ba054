use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::errors::PrepError;


pub const GWAS_URL: &str = "https://ftp.ebi.ac.uk/pub/databases/gwas/summary_statistics/\
                            GCST007001-GCST008000/GCST007140/GERA-sqrtHDL.tsv.gz";
pub const REFERENCE_URL: &str = "https://zenodo.org/records/8182036/files/eur_w_ld_chr.tar.gz";
pub const REFERENCE_MARKER: &str = "w_hm3.snplist";
pub const WORKING_SUBDIR: &str = "tmp";

// Appended to the GWAS file stem to name the filtered output.
const FILTERED_SUFFIX: &str = "-hm3";
const ARCHIVE_EXTENSIONS: [&str; 2] = [".tar.gz", ".tgz"];
const TABLE_EXTENSIONS: [&str; 3] = [".tsv.gz", ".txt.gz", ".gz"];


/// Where every artifact lives and where it comes from. Passed to both the
/// fetch and the filter stage.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PrepConfig {
    /// Root for all downloaded, extracted and filtered files.
    pub working_dir: PathBuf,
    /// Gzip compressed, tab separated summary statistics.
    pub gwas_url: String,
    /// Gzip compressed tar of the LD reference panel.
    pub reference_url: String,
    /// File inside the extracted panel marking a finished extraction. It is
    /// also the list of reference SNP identifiers.
    pub reference_marker_filename: String,
    /// Whole-request timeout. `None` leaves transfers unbounded.
    pub request_timeout_secs: Option<u64>,
}


impl Default for PrepConfig {
    fn default() -> Self {
        PrepConfig {
            working_dir: default_working_dir(),
            gwas_url: GWAS_URL.to_string(),
            reference_url: REFERENCE_URL.to_string(),
            reference_marker_filename: REFERENCE_MARKER.to_string(),
            request_timeout_secs: None,
        }
    }
}


// `tmp/` beside the running executable, or under the current directory
// when the executable location can't be resolved.
fn default_working_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(WORKING_SUBDIR)
}


// Last path segment of a URL, ignoring any query or fragment.
fn url_file_name(url: &str) -> Option<&str> {
    let without_query = url.split(|c| c == '?' || c == '#').next()?;
    let name = without_query.rsplit('/').next()?;
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}


fn strip_any_suffix<'a>(name: &'a str, suffixes: &[&str]) -> Option<&'a str> {
    suffixes.iter().find_map(|s| name.strip_suffix(s))
}


impl PrepConfig {
    /// Reads a TOML file. Missing keys fall back to the defaults.
    pub fn from_toml_file(path: &Path) -> Result<PrepConfig, PrepError> {
        let text = fs::read_to_string(path)
            .map_err(|e| PrepError::on_open(path.to_path_buf(), e))?;
        PrepConfig::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<PrepConfig, PrepError> {
        let config: PrepConfig = toml::from_str(text)
            .map_err(|e| PrepError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PrepError> {
        if self.reference_marker_filename.trim().is_empty() {
            return Err(PrepError::Configuration(
                "reference marker filename is empty".to_string()
            ));
        }
        self.gwas_file_name()?;
        self.reference_dir_name()?;
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    fn gwas_file_name(&self) -> Result<&str, PrepError> {
        url_file_name(&self.gwas_url).ok_or_else(|| {
            PrepError::Configuration(
                format!("gwas url has no file name: '{}'", self.gwas_url)
            )
        })
    }

    fn archive_file_name(&self) -> Result<&str, PrepError> {
        url_file_name(&self.reference_url).ok_or_else(|| {
            PrepError::Configuration(
                format!("reference url has no file name: '{}'", self.reference_url)
            )
        })
    }

    fn reference_dir_name(&self) -> Result<&str, PrepError> {
        let archive = self.archive_file_name()?;
        match strip_any_suffix(archive, &ARCHIVE_EXTENSIONS) {
            Some(stem) if !stem.is_empty() => Ok(stem),
            _ => Err(PrepError::Configuration(format!(
                "reference archive '{}' is not a .tar.gz", archive
            )))
        }
    }

    pub fn gwas_path(&self) -> Result<PathBuf, PrepError> {
        Ok(self.working_dir.join(self.gwas_file_name()?))
    }

    pub fn archive_path(&self) -> Result<PathBuf, PrepError> {
        Ok(self.working_dir.join(self.archive_file_name()?))
    }

    /// Directory the archive unpacks to. The archive nests a single top
    /// level folder with this name.
    pub fn reference_dir(&self) -> Result<PathBuf, PrepError> {
        Ok(self.working_dir.join(self.reference_dir_name()?))
    }

    pub fn marker_path(&self) -> Result<PathBuf, PrepError> {
        Ok(self.reference_dir()?.join(&self.reference_marker_filename))
    }

    /// `GERA-sqrtHDL.tsv.gz` becomes `GERA-sqrtHDL-hm3.tsv.gz`.
    pub fn filtered_path(&self) -> Result<PathBuf, PrepError> {
        let name = self.gwas_file_name()?;
        let filtered = TABLE_EXTENSIONS.iter()
            .find_map(|ext| {
                name.strip_suffix(ext)
                    .map(|stem| format!("{}{}{}", stem, FILTERED_SUFFIX, ext))
            })
            .unwrap_or_else(|| format!("{}{}.tsv.gz", name, FILTERED_SUFFIX));

        Ok(self.working_dir.join(filtered))
    }
}
