//! CLI for pagegrab: one page URL in, one file out.

mod progress;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use pagegrab_core::config;
use pagegrab_core::{Downloader, GrabRequest};

use progress::{BarProgress, ConsoleReporter};

/// Download the file a web page leads to, resolved through a real browser.
#[derive(Debug, Parser)]
#[command(name = "pagegrab", version)]
#[command(
    about = "Resolve a page URL in a browser, then download what it points to",
    long_about = None
)]
pub struct Cli {
    /// Page URL to open in the browser.
    pub url: String,

    /// Where to save the download. Must not exist unless --force is given.
    pub output: PathBuf,

    /// Overwrite the output file if it already exists.
    #[arg(long)]
    pub force: bool,

    /// Resume an interrupted download from the temporary file at PATH.
    #[arg(short = 'C', long, value_name = "PATH")]
    pub continue_at: Option<PathBuf>,

    /// Enable verbose transfer logging.
    #[arg(long)]
    pub verbose: bool,

    /// WebDriver endpoint (overrides the config file).
    #[arg(long, value_name = "URL")]
    pub webdriver: Option<String>,
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    fn request(&self) -> GrabRequest {
        GrabRequest {
            page_url: self.url.clone(),
            output: self.output.clone(),
            force: self.force,
            continue_at: self.continue_at.clone(),
            verbose: self.verbose,
        }
    }

    pub fn run(&self) -> Result<()> {
        let mut cfg = config::load_or_init().context("load config")?;
        if let Some(endpoint) = &self.webdriver {
            cfg.webdriver_url = endpoint.clone();
        }
        tracing::debug!("loaded config: {:?}", cfg);

        let mut downloader = Downloader::from_config(&cfg)?;
        let mut bar = BarProgress::new();
        let saved = downloader.run(&self.request(), &mut bar, &mut ConsoleReporter)?;
        println!("saved {}", saved.display());
        Ok(())
    }
}
