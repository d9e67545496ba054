use std::cell::Cell;
use std::fs::{self, File};
use std::io::{Cursor, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use pretty_assertions::assert_eq;

use rshm3preplib::{
    prepare_inputs, run_filter, DownloadOutcome, ExtractionOutcome, FilterCounts, PrepConfig,
    PrepError, RemoteBody, Transport,
};

const GWAS_URL: &str = "https://example.org/sumstats/TRAIT.tsv.gz";
const PANEL_URL: &str = "https://example.org/panels/eur_panel.tar.gz";

const GWAS_TABLE: &str = "SNP_ID\tCHR\tPOS\tBETA\n\
                          rs10\t1\t100\t0.1\n\
                          rs11\t1\t200\t0.2\n\
                          rs12\t2\t300\t-0.3\n\
                          rs13\t2\t400\t0.4\n\
                          rs14\t3\t500\t0.0\n";

const SNP_LIST: &str = "SNP\tA1\tA2\nrs14\tA\tG\nrs11\tC\tT\nrs99\tA\tC\n";


struct StaticTransport {
    gwas: Vec<u8>,
    panel: Vec<u8>,
    calls: Cell<usize>,
}

impl Transport for StaticTransport {
    fn open(&self, url: &str) -> Result<RemoteBody, PrepError> {
        self.calls.set(self.calls.get() + 1);
        let body = match url {
            GWAS_URL => self.gwas.clone(),
            PANEL_URL => self.panel.clone(),
            _ => return Err(PrepError::Transport {
                url: url.to_string(),
                reason: "unknown url".to_string(),
            }),
        };
        Ok(RemoteBody {
            total_bytes: Some(body.len() as u64),
            reader: Box::new(Cursor::new(body)),
        })
    }
}


fn gzip(text: &str) -> Vec<u8> {
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(text.as_bytes()).unwrap();
    enc.finish().unwrap()
}

fn panel_archive(top_dir: &str) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (name, data) in [("w_hm3.snplist", SNP_LIST), ("1.l2.ldscore.gz", "ld")] {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        builder
            .append_data(&mut header, format!("{}/{}", top_dir, name), data.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

fn read_gz(path: &Path) -> String {
    let mut text = String::new();
    GzDecoder::new(File::open(path).unwrap())
        .read_to_string(&mut text)
        .unwrap();
    text
}

fn config_in(dir: &Path) -> PrepConfig {
    PrepConfig {
        working_dir: dir.join("tmp"),
        gwas_url: GWAS_URL.to_string(),
        reference_url: PANEL_URL.to_string(),
        ..PrepConfig::default()
    }
}


#[test]
fn fetch_then_filter_keeps_reference_snps() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let transport = StaticTransport {
        gwas: gzip(GWAS_TABLE),
        panel: panel_archive("eur_panel"),
        calls: Cell::new(0),
    };

    let fetched = prepare_inputs(&config, &transport).unwrap();
    assert_eq!(fetched.extraction, ExtractionOutcome::Extracted);
    assert!(dir.path().join("tmp/eur_panel/w_hm3.snplist").is_file());

    let report = run_filter(&config).unwrap();

    assert_eq!(report.output, dir.path().join("tmp/TRAIT-hm3.tsv.gz"));
    assert_eq!(report.reference_ids, 4);
    assert_eq!(report.counts, FilterCounts { rows_read: 5, rows_written: 2 });
    assert_eq!(
        read_gz(&report.output),
        "SNP_ID\tCHR\tPOS\tBETA\nrs11\t1\t200\t0.2\nrs14\t3\t500\t0.0\n"
    );

    // A second run touches nothing remote.
    let again = prepare_inputs(&config, &transport).unwrap();
    assert_eq!(again.gwas, DownloadOutcome::AlreadyPresent);
    assert_eq!(again.archive, DownloadOutcome::AlreadyPresent);
    assert_eq!(again.extraction, ExtractionOutcome::AlreadyExtracted);
    assert_eq!(transport.calls.get(), 2);
}


#[test]
fn misplaced_marker_only_fails_at_filter_time() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let transport = StaticTransport {
        gwas: gzip(GWAS_TABLE),
        panel: panel_archive("some_other_name"),
        calls: Cell::new(0),
    };

    // Extraction lands in the wrong folder; the fetch stage still succeeds.
    let fetched = prepare_inputs(&config, &transport).unwrap();
    assert_eq!(fetched.extraction, ExtractionOutcome::MarkerMissing);

    match run_filter(&config) {
        Err(PrepError::SourceFileMissing { path }) => {
            assert_eq!(path, dir.path().join("tmp/eur_panel/w_hm3.snplist"));
        }
        other => panic!("expected a missing reference list, got {:?}", other),
    }
}


#[test]
fn empty_leftover_download_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    fs::create_dir_all(&config.working_dir).unwrap();
    fs::write(config.gwas_path().unwrap(), b"").unwrap();

    let transport = StaticTransport {
        gwas: gzip(GWAS_TABLE),
        panel: panel_archive("eur_panel"),
        calls: Cell::new(0),
    };

    let fetched = prepare_inputs(&config, &transport).unwrap();
    assert!(matches!(fetched.gwas, DownloadOutcome::Downloaded { .. }));
    assert_eq!(read_gz(&fetched.gwas_path), GWAS_TABLE);
}
