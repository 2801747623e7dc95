use crate::cli::ScoreArgs;
use crate::config::ScoringConfig;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use molreward::{
    core::{io::smiles::parse_smiles, models::molecule::Molecule},
    scoring::{factory::build_components, summary::ComponentSummary},
    workflows::{self, progress::ProgressReporter},
};
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

/// One parsed input line.
#[derive(Debug)]
struct InputRecord {
    smiles: String,
    name: String,
    molecule: Molecule,
}

pub fn run(args: ScoreArgs) -> Result<()> {
    let config = ScoringConfig::from_file(&args.config)?;
    let labels = config.labels();
    info!(
        "Loaded {} scoring component(s) from {:?}",
        labels.len(),
        &args.config
    );

    let components = build_components(config.components)?;

    info!("Reading molecules from {:?}", &args.input);
    let records = read_records(&args.input)?;
    if records.is_empty() {
        warn!("No valid molecules found in {:?}.", &args.input);
    }
    let molecules: Vec<Molecule> = records.iter().map(|r| r.molecule.clone()).collect();

    let progress_handler = CliProgressHandler::new();
    let reporter = if args.no_progress {
        ProgressReporter::new()
    } else {
        ProgressReporter::with_callback(progress_handler.get_callback())
    };

    info!("Invoking the scoring workflow...");
    let summaries = workflows::score::run(&components, &molecules, &reporter);

    match &args.output {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            write_scores(file, &labels, &records, &summaries)?;
            eprintln!(
                "Scored {} molecule(s) with {} component(s), written to: {}",
                records.len(),
                labels.len(),
                path.display()
            );
        }
        None => write_scores(std::io::stdout().lock(), &labels, &records, &summaries)?,
    }
    Ok(())
}

fn read_records(path: &Path) -> Result<Vec<InputRecord>> {
    let content = std::fs::read_to_string(path)?;
    let mut records = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        match parse_line(idx + 1, line) {
            Ok(Some(record)) => records.push(record),
            Ok(None) => {}
            Err(e) => warn!("Skipping input: {}", e),
        }
    }
    Ok(records)
}

/// Parses `SMILES [name]`; blank lines and `#` comments yield `None`.
fn parse_line(line_number: usize, line: &str) -> Result<Option<InputRecord>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let (smiles, name) = match line.split_once(char::is_whitespace) {
        Some((smiles, name)) => (smiles, name.trim()),
        None => (line, ""),
    };
    let molecule = parse_smiles(smiles).map_err(|source| CliError::Smiles {
        line: line_number,
        source,
    })?;
    Ok(Some(InputRecord {
        smiles: smiles.to_string(),
        name: name.to_string(),
        molecule,
    }))
}

fn write_scores<W: Write>(
    writer: W,
    labels: &[String],
    records: &[InputRecord],
    summaries: &[ComponentSummary],
) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    let mut header = vec!["smiles".to_string(), "name".to_string()];
    header.extend(labels.iter().cloned());
    csv_writer.write_record(&header)?;

    for (row, record) in records.iter().enumerate() {
        let mut fields = vec![record.smiles.clone(), record.name.clone()];
        fields.extend(
            summaries
                .iter()
                .map(|summary| format!("{:.6}", summary.total_score[row])),
        );
        csv_writer.write_record(&fields)?;
    }
    csv_writer.flush()?;
    Ok(())
}
