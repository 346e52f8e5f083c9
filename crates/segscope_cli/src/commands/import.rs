//! Import command implementation.

use segscope_core::{import_into_dir, parse_items, CoreError, ImportConfig, ImportSummary};
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Where an import payload comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportSource {
    /// Standard input.
    Stdin,
    /// The `--json` argument.
    CommandLine(String),
    /// A file.
    File(PathBuf),
}

impl fmt::Display for ImportSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdin => f.write_str("stdin"),
            Self::CommandLine(_) => f.write_str("command line"),
            Self::File(path) => write!(f, "file {}", path.display()),
        }
    }
}

impl ImportSource {
    fn read(&self) -> Result<String, CoreError> {
        match self {
            Self::Stdin => {
                let mut input = String::new();
                std::io::stdin().read_to_string(&mut input)?;
                Ok(input)
            }
            Self::CommandLine(json) => Ok(json.clone()),
            Self::File(path) => Ok(std::fs::read_to_string(path)?),
        }
    }
}

/// An import run that failed, naming its source.
#[derive(Debug, Error)]
#[error("import from {origin} failed: {cause}")]
pub struct ImportFailed {
    origin: ImportSource,
    #[source]
    cause: CoreError,
}

/// Orders the requested sources: stdin, then command line, then file.
pub fn sources(
    stdin: bool,
    json: Option<String>,
    file: Option<PathBuf>,
) -> Result<Vec<ImportSource>, Box<dyn std::error::Error>> {
    let sources: Vec<_> = [
        stdin.then_some(ImportSource::Stdin),
        json.map(ImportSource::CommandLine),
        file.map(ImportSource::File),
    ]
    .into_iter()
    .flatten()
    .collect();

    if sources.is_empty() {
        return Err("One of --stdin, --json or --file required for import".into());
    }
    Ok(sources)
}

/// Runs the import command, one import run per source.
pub fn run(
    dir: &Path,
    sources: &[ImportSource],
    batch_size: usize,
    timeout: Option<Duration>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = ImportConfig::new()
        .batch_size(batch_size)
        .durability_timeout(timeout);
    for source in sources {
        let summary = import_source(dir, source, config).map_err(|cause| ImportFailed {
            origin: source.clone(),
            cause,
        })?;
        info!(
            source = %source,
            items = summary.items_written,
            batches = summary.batches_written,
            "import done"
        );
    }
    Ok(())
}

fn import_source(
    dir: &Path,
    source: &ImportSource,
    config: ImportConfig,
) -> Result<ImportSummary, CoreError> {
    let items = parse_items(&source.read()?)?;
    import_into_dir(dir, &items, config)
}
