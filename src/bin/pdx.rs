use std::{
    error::Error,
    io::{self, Write},
};

use ortho_config::OrthoConfig;
use provisional_dx::{
    ConfigError, DiagnosisEngine, DiagnosisPredictor, ReferenceCatalog, SymptomInput,
    cli::PdxArgs,
};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// One line of the prediction report written to stdout.
#[derive(Serialize)]
struct AdvisedDiagnosis<'a> {
    label: &'a str,
    confidence: f32,
    advises: &'a [String],
}

fn init_tracing(debug_mode: bool) {
    let level = if debug_mode { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<(), Box<dyn Error>> {
    // CLI flags override environment variables, which override config files.
    let args = PdxArgs::load()?;
    init_tracing(args.debug_mode);
    info!(?args, "loaded configuration");

    let config = args.engine_config()?;
    let reference = args
        .reference_file
        .as_deref()
        .ok_or(ConfigError::Missing("reference_file"))?;
    let catalog = ReferenceCatalog::load(reference)?;
    let engine = DiagnosisEngine::load(config, catalog.feature_schema()?)?;
    if args.dry_run {
        info!("artefacts verified; dry run requested");
        return Ok(());
    }

    let input: SymptomInput = serde_json::from_reader(io::stdin().lock())?;
    let diagnoses = engine.predict(&input)?;
    let causes = engine.causes_vocabulary();
    let report: Vec<_> = diagnoses
        .iter()
        .filter(|diagnosis| !causes.is_reserved(&diagnosis.label))
        .map(|diagnosis| AdvisedDiagnosis {
            label: &diagnosis.label,
            confidence: diagnosis.confidence,
            advises: catalog.read_advises(&diagnosis.label),
        })
        .collect();

    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &report)?;
    writeln!(stdout)?;
    Ok(())
}
