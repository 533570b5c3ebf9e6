use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use pubmill_core::ExtractionRecord;
use pubmill_xml::{ConvertOptions, SynthesizerConfig, convert};

mod output;

use output::ColorMode;

/// Convert scholarly extraction records into schema-referenced publisher XML
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the primary extraction record (JSON). When omitted, runs in
    /// fallback-only mode from the raw text alone.
    #[arg(long)]
    primary: Option<PathBuf>,

    /// Path to the fallback extractor's plain-text output
    #[arg(long)]
    fallback_text: Option<PathBuf>,

    /// Where to write the XML document (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory holding the journal publishing DTD and entity files
    #[arg(long)]
    dtd_dir: Option<PathBuf>,

    /// Article type, e.g. research-article, case-report
    #[arg(long)]
    article_type: Option<String>,

    /// Write the validation report as JSON to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Keep the extracted journal identity instead of the canonical one
    #[arg(long)]
    keep_extracted_journal: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(valid) => {
            if valid {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<bool> {
    if cli.primary.is_none() && cli.fallback_text.is_none() {
        anyhow::bail!("at least one of --primary or --fallback-text is required");
    }

    let primary = match &cli.primary {
        Some(path) => {
            let data = std::fs::read_to_string(path)
                .with_context(|| format!("reading primary record {}", path.display()))?;
            serde_json::from_str(&data)
                .with_context(|| format!("parsing primary record {}", path.display()))?
        }
        None => ExtractionRecord::default(),
    };

    let fallback = match &cli.fallback_text {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading fallback text {}", path.display()))?;
            fallback_record(text)
        }
        None => ExtractionRecord::default(),
    };

    let options = ConvertOptions {
        article_type: cli.article_type.clone(),
        synthesizer: SynthesizerConfig {
            force_canonical_journal: !cli.keep_extracted_journal,
            ..SynthesizerConfig::default()
        },
        dtd_dir: cli.dtd_dir.clone(),
    };

    let conversion = convert(primary, fallback, &options)?;

    match &cli.output {
        Some(path) => {
            std::fs::write(path, &conversion.xml)
                .with_context(|| format!("writing {}", path.display()))?;
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(conversion.xml.as_bytes())?;
            writeln!(stdout)?;
        }
    }

    if let Some(path) = &cli.report {
        let json = serde_json::to_string_pretty(&conversion.report)?;
        std::fs::write(path, json)
            .with_context(|| format!("writing report {}", path.display()))?;
    }

    let color = ColorMode(!cli.no_color);
    let mut stderr = std::io::stderr().lock();
    output::print_report(&mut stderr, &conversion.report, color)?;

    Ok(conversion.report.valid)
}

/// The fallback extractor produces page-segmented plain text; pages are
/// separated by form feeds.
fn fallback_record(text: String) -> ExtractionRecord {
    let pages: Vec<String> = text
        .split('\u{0C}')
        .map(|p| p.trim_matches('\n').to_string())
        .filter(|p| !p.is_empty())
        .collect();
    ExtractionRecord {
        pages: if pages.is_empty() && !text.is_empty() {
            vec![text.clone()]
        } else {
            pages
        },
        raw_text: text,
        ..ExtractionRecord::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_record_splits_pages_on_form_feed() {
        let record = fallback_record("page one\u{0C}page two".to_string());
        assert_eq!(record.pages, vec!["page one", "page two"]);
        assert!(record.raw_text.contains("page one"));
    }

    #[test]
    fn fallback_record_single_page_without_form_feeds() {
        let record = fallback_record("just one page".to_string());
        assert_eq!(record.pages.len(), 1);
    }

    #[test]
    fn empty_fallback_record_has_no_pages() {
        let record = fallback_record(String::new());
        assert!(record.pages.is_empty());
        assert!(record.raw_text.is_empty());
    }
}
