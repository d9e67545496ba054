/*!
 * Prepare GWAS summary statistics for LD score regression: fetch the
 * summary statistics and the LD reference panel, unpack the panel, and
 * keep only the rows for SNPs in the panel's HapMap3 list.
 */

pub mod config;
pub mod core;
pub mod errors;
pub mod fetch;
pub mod filter;

pub use crate::config::PrepConfig;
pub use crate::core::{DelimitedRecordReader, FilterCounts, ReferenceIdSet, ResourceState};
pub use crate::errors::PrepError;
pub use crate::fetch::{
    download, ensure_extracted, prepare_inputs, DownloadOutcome, ExtractionOutcome,
    FetchReport, HttpTransport, RemoteBody, Transport,
};
pub use crate::filter::{
    filter_gwas_file, filter_records, load_reference_ids, run_filter, FilterReport,
};
