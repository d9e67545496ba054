/*!
 * Restrict a summary statistics table to the SNPs of a reference list.
 */

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use log::info;

use crate::config::PrepConfig;
use crate::core::{DelimitedRecordReader, FilterCounts, ReferenceIdSet, record_id};
use crate::errors::PrepError;


#[derive(Debug, Clone, PartialEq)]
pub struct FilterReport {
    pub reference_ids: usize,
    pub counts: FilterCounts,
    pub output: PathBuf,
}


/// Reads the reference SNP list into memory.
pub fn load_reference_ids(path: &Path) -> Result<ReferenceIdSet, PrepError> {
    let f = File::open(path)
        .map_err(|e| PrepError::on_open(path.to_path_buf(), e))?;

    ReferenceIdSet::from_reader(BufReader::new(f))
        .map_err(|e| PrepError::StreamCorrupt { path: path.to_path_buf(), source: e })
}


/// Copies the header of `records` and every following row whose identifier
/// is in `ids` to `writer`, unchanged and in input order.
pub fn filter_records<R: BufRead, W: Write>(
    ids: &ReferenceIdSet,
    mut records: DelimitedRecordReader<R>,
    writer: &mut W
) -> Result<FilterCounts, PrepError> {
    let mut counts = FilterCounts::default();

    // The header goes through without looking at it.
    match records.next() {
        Some(header) => writer.write_all(header?.as_bytes())?,
        None => return Ok(counts)
    }

    for line in records {
        let line = line?;
        counts.rows_read += 1;

        if ids.contains(record_id(&line)) {
            writer.write_all(line.as_bytes())?;
            counts.rows_written += 1;
        }
    }

    Ok(counts)
}


/// Filters a gzip compressed table into a new gzip compressed table.
pub fn filter_gwas_file(ids: &ReferenceIdSet, input: &Path, output: &Path)
    -> Result<FilterCounts, PrepError>
{
    let records = DelimitedRecordReader::open_gz(input)?;

    let f = File::create(output)?;
    let mut encoder = GzEncoder::new(BufWriter::new(f), Compression::default());

    let counts = filter_records(ids, records, &mut encoder)?;

    let mut inner = encoder.finish()?;
    inner.flush()?;

    Ok(counts)
}


/// Filter stage: the extracted reference list applied to the downloaded
/// GWAS file.
pub fn run_filter(config: &PrepConfig) -> Result<FilterReport, PrepError> {
    config.validate()?;

    let marker = config.marker_path()?;
    let input = config.gwas_path()?;
    let output = config.filtered_path()?;

    let ids = load_reference_ids(&marker)?;
    info!("Loaded {} reference snps from {}", ids.len(), marker.display());

    let counts = filter_gwas_file(&ids, &input, &output)?;
    info!("Read {} snps.", counts.rows_read);
    info!("Wrote {} reference snps to {}", counts.rows_written, output.display());

    Ok(FilterReport { reference_ids: ids.len(), counts, output })
}
