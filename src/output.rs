use std::io::{self, Write};

use serde::Serialize;

use crate::app::{DeliveryResult, ProgressEvent, ProgressSink};
use crate::planner::{DeliveryLog, TransferOutcome};
use crate::results::ResultsDelivery;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Text,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_delivery(result: &DeliveryResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_results(result: &ResultsDelivery) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

pub struct TextOutput;

impl TextOutput {
    pub fn print_delivery(result: &DeliveryResult) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        write_dry_run(&mut stdout, &result.log)?;
        for record in &result.records {
            if let Some(content) = &record.content {
                writeln!(stdout, "DRY_RUN: {}", record.path)?;
                stdout.write_all(content.as_bytes())?;
            }
        }
        writeln!(
            stdout,
            "Delivered flowcell {} ({}) for {}: {} lane(s), {} sample(s)",
            result.flowcell_id, result.alias, result.selector, result.lanes, result.samples
        )?;
        writeln!(stdout, "  data:     {}", result.data_dir)?;
        writeln!(stdout, "  analysis: {}", result.analysis_dir)?;
        write_counts(&mut stdout, &result.log)?;
        for record in result.records.iter().filter(|record| record.written) {
            writeln!(stdout, "  run info: {} ({} lane(s))", record.path, record.lanes)?;
        }
        Ok(())
    }

    pub fn print_results(result: &ResultsDelivery) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        write_dry_run(&mut stdout, &result.log)?;
        writeln!(stdout, "Delivered results for {} lane(s)", result.lanes)?;
        write_counts(&mut stdout, &result.log)
    }
}

impl ProgressSink for TextOutput {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => tracing::debug!("{} ({:.2?})", event.message, elapsed),
            None => tracing::debug!("{}", event.message),
        }
    }
}

fn write_dry_run(out: &mut impl Write, log: &DeliveryLog) -> io::Result<()> {
    for record in log.outcomes(TransferOutcome::DryRun) {
        let transfer = &record.transfer;
        writeln!(
            out,
            "DRY_RUN: {} file {} to {}",
            transfer.action, transfer.source, transfer.target
        )?;
    }
    Ok(())
}

fn write_counts(out: &mut impl Write, log: &DeliveryLog) -> io::Result<()> {
    let count = |outcome| log.outcomes(outcome).count();
    writeln!(
        out,
        "  transfers: {} performed, {} dry-run, {} skipped, {} suppressed",
        count(TransferOutcome::Performed),
        count(TransferOutcome::DryRun),
        count(TransferOutcome::SkippedExisting),
        count(TransferOutcome::Suppressed)
    )?;
    for warning in &log.warnings {
        writeln!(out, "  warning: {}", warning.message)?;
    }
    Ok(())
}
