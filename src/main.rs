use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use env_logger::{Env, Target};

use rshm3preplib::{prepare_inputs, run_filter, HttpTransport, PrepConfig};


#[derive(Parser, Debug)]
#[command(
    name = "hm3prep",
    version,
    about = "Fetch GWAS summary statistics and the LD reference panel, then \
             restrict the statistics to HapMap3 SNPs"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// TOML file with any of the settings below.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Root directory for all downloaded and generated files.
    #[arg(long, global = true, env = "HM3PREP_WORKING_DIR")]
    working_dir: Option<PathBuf>,

    #[arg(long, global = true)]
    gwas_url: Option<String>,

    #[arg(long, global = true)]
    reference_url: Option<String>,

    /// File in the extracted panel that lists the reference SNPs.
    #[arg(long, global = true)]
    marker: Option<String>,

    /// Per-request timeout in seconds. Unbounded by default.
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    #[arg(short, long, global = true)]
    verbose: bool,
}


#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Download both datasets and unpack the reference panel.
    Fetch,
    /// Filter the downloaded statistics to the reference SNP list.
    Filter,
    /// Fetch, then filter (the default).
    Run,
}


impl Cli {
    fn resolve_config(&self) -> Result<PrepConfig> {
        let mut config = match &self.config {
            Some(path) => PrepConfig::from_toml_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => PrepConfig::default()
        };

        if let Some(dir) = &self.working_dir {
            config.working_dir = dir.clone();
        }
        if let Some(url) = &self.gwas_url {
            config.gwas_url = url.clone();
        }
        if let Some(url) = &self.reference_url {
            config.reference_url = url.clone();
        }
        if let Some(marker) = &self.marker {
            config.reference_marker_filename = marker.clone();
        }
        if self.timeout_secs.is_some() {
            config.request_timeout_secs = self.timeout_secs;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}


fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level))
        .target(Target::Stdout)
        .format_timestamp(None)
        .format_target(false)
        .init();
}


fn fetch(config: &PrepConfig) -> Result<()> {
    let transport = HttpTransport::new(config.request_timeout())?;
    let report = prepare_inputs(config, &transport).context("fetch stage failed")?;

    println!();
    println!("All set");
    println!("- GWAS: {}", report.gwas_path.display());
    println!("- Ref:  {}", report.reference_dir.display());
    Ok(())
}


fn filter(config: &PrepConfig) -> Result<()> {
    let report = run_filter(config).context("filter stage failed")?;

    println!("loaded in {} hapmap3 snps.", report.reference_ids);
    println!("read in {} snps.", report.counts.rows_read);
    println!("wrote out {} hapmap3 snps.", report.counts.rows_written);
    println!("- Output: {}", report.output.display());
    Ok(())
}


fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.resolve_config()?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Fetch => fetch(&config),
        Command::Filter => filter(&config),
        Command::Run => {
            fetch(&config)?;
            filter(&config)
        }
    }
}
