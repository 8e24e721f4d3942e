use camino::{Utf8Path, Utf8PathBuf};
use glob::Pattern;
use serde::Serialize;

use crate::config::{DeliveryOptions, TransferMode};
use crate::error::DeliveryError;
use crate::fs_util;
use crate::planner::{DeliveryLog, DeliveryPlanner, FileAction, Transfer};
use crate::run_info::RunInfoRecord;

pub const VCF_PATTERNS: &[&str] = &["*.vcf", "*.idx", "*.tranches", "*.eval", "*.tsv"];
pub const SUMMARY_FILES: &[&str] = &["project-summary.csv", "run_summary.yaml"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    Vcf,
    Bam,
    Bigwig,
    Metrics,
}

#[derive(Debug, Clone)]
pub struct ResultsOptions {
    pub analysis_dir: Utf8PathBuf,
    pub transfer: TransferMode,
    pub vcf: bool,
    pub metrics: bool,
    pub bigwig: bool,
    pub bam: bool,
    pub bam_glob: String,
    pub rename: bool,
    pub dry_run: bool,
}

impl ResultsOptions {
    pub fn new(analysis_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            analysis_dir: analysis_dir.into(),
            transfer: TransferMode::Copy,
            vcf: true,
            metrics: true,
            bigwig: true,
            bam: false,
            bam_glob: "*-sort-dup-gatkrecal-realign*.bam".to_string(),
            rename: true,
            dry_run: false,
        }
    }

    fn patterns(&self) -> Vec<(ResultKind, String)> {
        let mut patterns = Vec::new();
        if self.vcf {
            patterns.extend(VCF_PATTERNS.iter().map(|p| (ResultKind::Vcf, p.to_string())));
        }
        if self.bam {
            patterns.push((ResultKind::Bam, self.bam_glob.clone()));
        }
        if self.bigwig {
            patterns.push((ResultKind::Bigwig, "*.bigwig".to_string()));
        }
        if self.metrics {
            patterns.push((ResultKind::Metrics, "*metrics".to_string()));
        }
        patterns
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultsDelivery {
    pub lanes: usize,
    pub log: DeliveryLog,
}

pub fn collect_lane_results(
    lane: &str,
    options: &ResultsOptions,
) -> Result<Vec<(ResultKind, Utf8PathBuf)>, DeliveryError> {
    let dir = Pattern::escape(options.analysis_dir.as_str());
    let mut found = Vec::new();
    for (kind, pattern) in options.patterns() {
        let glob = format!("{dir}/{}_{pattern}", Pattern::escape(lane));
        found.extend(
            fs_util::glob_sorted(&glob)?
                .into_iter()
                .map(|path| (kind, path)),
        );
    }
    Ok(found)
}

/// `LANE_...` -> `LANE_SAMPLE_...` on the first occurrence of `LANE_`.
pub fn renamed_target(
    source: &Utf8Path,
    lane: &str,
    sample: &str,
    delivery_dir: &Utf8Path,
    rename: bool,
) -> Utf8PathBuf {
    let name = source.file_name().unwrap_or_default();
    if !rename {
        return delivery_dir.join(name);
    }
    let renamed = name.replacen(&format!("{lane}_"), &format!("{lane}_{sample}_"), 1);
    delivery_dir.join(renamed)
}

pub fn deliver_results(
    record: &RunInfoRecord,
    delivery_dir: &Utf8Path,
    options: &ResultsOptions,
) -> Result<ResultsDelivery, DeliveryError> {
    if !options.analysis_dir.is_dir() {
        return Err(DeliveryError::MissingAnalysisDirectory(
            options.analysis_dir.to_string(),
        ));
    }
    let delivery_options = DeliveryOptions {
        transfer: options.transfer,
        dry_run: options.dry_run,
        ..DeliveryOptions::default()
    };
    let planner = DeliveryPlanner::new(&delivery_options);
    let action = FileAction::for_file(options.transfer);
    let mut log = DeliveryLog::default();
    planner.ensure_dir(delivery_dir, "delivery", &mut log)?;

    let mut transfers = Vec::new();
    for name in SUMMARY_FILES {
        let source = options.analysis_dir.join(name);
        if !source.is_file() {
            log.warn(&source, format!("{source} not found: skipping"));
            continue;
        }
        transfers.push(Transfer {
            source,
            target: delivery_dir.join(name),
            action,
        });
    }

    for lane in &record.details {
        let sample = lane.description.as_deref().unwrap_or(&lane.lane);
        for (_, source) in collect_lane_results(&lane.lane, options)? {
            let target = renamed_target(&source, &lane.lane, sample, delivery_dir, options.rename);
            transfers.push(Transfer {
                source,
                target,
                action,
            });
        }
    }

    planner.execute_all(&transfers, &mut log)?;
    Ok(ResultsDelivery {
        lanes: record.details.len(),
        log,
    })
}
