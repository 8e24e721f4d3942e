use std::collections::HashMap;
use std::fmt;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use glob::Pattern;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{DeliveryOptions, TransferMode};
use crate::domain::{FlowcellRun, Lane};
use crate::error::DeliveryError;
use crate::fs_util;
use crate::naming::{self, BarcodeNames};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileAction {
    Copy,
    CopyTree,
    Move,
    Symlink,
}

impl FileAction {
    pub fn for_file(mode: TransferMode) -> Self {
        match mode {
            TransferMode::Copy => FileAction::Copy,
            TransferMode::Move => FileAction::Move,
            TransferMode::Symlink => FileAction::Symlink,
        }
    }

    pub fn for_tree(mode: TransferMode) -> Self {
        match mode {
            TransferMode::Copy => FileAction::CopyTree,
            other => Self::for_file(other),
        }
    }
}

impl fmt::Display for FileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileAction::Copy => write!(f, "copy"),
            FileAction::CopyTree => write!(f, "copytree"),
            FileAction::Move => write!(f, "move"),
            FileAction::Symlink => write!(f, "symlink"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transfer {
    pub source: Utf8PathBuf,
    pub target: Utf8PathBuf,
    pub action: FileAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferOutcome {
    Performed,
    DryRun,
    SkippedExisting,
    Suppressed,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferRecord {
    #[serde(flatten)]
    pub transfer: Transfer,
    pub outcome: TransferOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryWarning {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DeliveryLog {
    pub transfers: Vec<TransferRecord>,
    pub warnings: Vec<DeliveryWarning>,
    pub created_dirs: Vec<String>,
}

impl DeliveryLog {
    pub fn warn(&mut self, path: &Utf8Path, message: impl Into<String>) {
        let message = message.into();
        warn!("{message}");
        self.warnings.push(DeliveryWarning {
            path: path.to_string(),
            message,
        });
    }

    /// Number of changes made to the filesystem so far.
    pub fn mutations(&self) -> usize {
        let performed = self
            .transfers
            .iter()
            .filter(|record| record.outcome == TransferOutcome::Performed)
            .count();
        performed + self.created_dirs.len()
    }

    pub fn outcomes(&self, outcome: TransferOutcome) -> impl Iterator<Item = &TransferRecord> {
        self.transfers
            .iter()
            .filter(move |record| record.outcome == outcome)
    }
}

/// Read files of one sample (or of a plain lane), in read order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastqGroup {
    pub barcode_id: Option<String>,
    pub files: Vec<Utf8PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct LanePlan {
    pub transfers: Vec<Transfer>,
    pub delivered: Vec<Utf8PathBuf>,
}

pub fn barcode_dir(fc: &FlowcellRun, lane: &Lane) -> Utf8PathBuf {
    fc.directory()
        .join(format!("{}_{}_{}_barcode", lane.name, fc.date(), fc.name()))
}

pub fn resolve_fastq_sources(
    fc: &FlowcellRun,
    lane: &Lane,
) -> Result<Vec<FastqGroup>, DeliveryError> {
    let bc_dir = barcode_dir(fc, lane);
    if !lane.is_multiplexed() {
        let pattern = format!(
            "{}_*{}*_fastq.txt",
            Pattern::escape(&lane.name),
            Pattern::escape(fc.name())
        );
        let files = fastq_files(&bc_dir, &pattern, &lane.name)?;
        return Ok(vec![FastqGroup {
            barcode_id: None,
            files,
        }]);
    }

    if !bc_dir.is_dir() {
        return Err(DeliveryError::MissingBarcodeDirectory(bc_dir.to_string()));
    }
    lane.multiplex
        .iter()
        .map(|sample| {
            let pattern = format!(
                "{}_*{}_{}_*_fastq.txt",
                Pattern::escape(&lane.name),
                Pattern::escape(fc.name()),
                Pattern::escape(&sample.barcode_id)
            );
            Ok(FastqGroup {
                barcode_id: Some(sample.barcode_id.clone()),
                files: fastq_files(&bc_dir, &pattern, &lane.name)?,
            })
        })
        .collect()
}

fn fastq_files(
    directory: &Utf8Path,
    file_pattern: &str,
    lane: &str,
) -> Result<Vec<Utf8PathBuf>, DeliveryError> {
    let pattern = format!("{}/{file_pattern}", Pattern::escape(directory.as_str()));
    let files = fs_util::glob_sorted(&pattern)?;
    if files.is_empty() || files.len() > 2 {
        return Err(DeliveryError::FastqFilesNotFound {
            directory: directory.to_string(),
            lane: lane.to_string(),
            found: files.iter().map(|path| path.to_string()).collect(),
        });
    }
    Ok(files)
}

/// Prior analysis output for a lane: `LANE_FCID*.*` files and the matching
/// entries of the `fastqc` report directory.
pub fn analysis_results(
    fc: &FlowcellRun,
    lane: &Lane,
) -> Result<(Vec<Utf8PathBuf>, Vec<Utf8PathBuf>), DeliveryError> {
    let prefix = Pattern::escape(&format!("{}_{}", lane.name, fc.id()));
    let results_dir = Pattern::escape(fc.results_dir().as_str());
    let data = fs_util::glob_sorted(&format!("{results_dir}/{prefix}*.*"))?
        .into_iter()
        .filter(|path| path.is_file())
        .collect();
    let fastqc = fs_util::glob_sorted(&format!("{results_dir}/fastqc/{prefix}*"))?;
    Ok((data, fastqc))
}

/// Fails when two transfers would write the same target path.
pub fn ensure_unique_targets<'t>(
    transfers: impl IntoIterator<Item = &'t Transfer>,
) -> Result<(), DeliveryError> {
    let mut claimed = HashMap::new();
    for transfer in transfers {
        if let Some(first) = claimed.insert(&transfer.target, &transfer.source) {
            return Err(DeliveryError::DuplicateTarget {
                target: transfer.target.to_string(),
                first: first.to_string(),
                second: transfer.source.to_string(),
            });
        }
    }
    Ok(())
}

pub struct DeliveryPlanner<'a> {
    options: &'a DeliveryOptions,
}

impl<'a> DeliveryPlanner<'a> {
    pub fn new(options: &'a DeliveryOptions) -> Self {
        Self { options }
    }

    pub fn plan_lane(
        &self,
        source: &FlowcellRun,
        lane: &Lane,
        data_dir: &Utf8Path,
        analysis_dir: &Utf8Path,
    ) -> Result<LanePlan, DeliveryError> {
        let naming = self.options.effective_naming();
        let names = BarcodeNames::from_lane(lane, naming.barcode_full_names);
        if lane.is_multiplexed() {
            debug!(
                "Project {} is multiplexed as: {:?}",
                lane.description,
                lane.barcode_ids()
            );
        }
        let groups = resolve_fastq_sources(source, lane)?;

        let mut plan = LanePlan::default();
        if self.options.install_data {
            let (data, fastqc) = analysis_results(source, lane)?;
            for src in data {
                let target = analysis_dir.join(src.file_name().unwrap_or_default());
                plan.transfers.push(Transfer {
                    source: src,
                    target,
                    action: FileAction::for_file(self.options.transfer),
                });
            }
            for src in fastqc {
                let target = analysis_dir
                    .join("fastqc")
                    .join(src.file_name().unwrap_or_default());
                let action = if src.is_dir() {
                    FileAction::for_tree(self.options.transfer)
                } else {
                    FileAction::for_file(self.options.transfer)
                };
                plan.transfers.push(Transfer {
                    source: src,
                    target,
                    action,
                });
            }
        }

        for group in groups {
            for src in group.files {
                let source_name = src.file_name().unwrap_or_default();
                let target_name = naming::target_file_name(&names, source_name, &naming)?;
                let target = data_dir.join(target_name);
                plan.delivered.push(target.clone());
                plan.transfers.push(Transfer {
                    source: src,
                    target,
                    action: FileAction::for_file(self.options.transfer),
                });
            }
        }
        ensure_unique_targets(&plan.transfers)?;
        Ok(plan)
    }

    pub fn ensure_dir(
        &self,
        dir: &Utf8Path,
        label: &str,
        log: &mut DeliveryLog,
    ) -> Result<(), DeliveryError> {
        if dir.is_dir() {
            debug!("{dir} already exists: not creating new directory");
            return Ok(());
        }
        if self.options.dry_run {
            info!("DRY_RUN: create {label} directory {dir}");
            return Ok(());
        }
        fs::create_dir_all(dir.as_std_path())
            .map_err(|err| DeliveryError::Filesystem(format!("create {dir}: {err}")))?;
        info!("Creating {label} directory {dir}");
        log.created_dirs.push(dir.to_string());
        Ok(())
    }

    pub fn execute(
        &self,
        transfer: &Transfer,
        log: &mut DeliveryLog,
    ) -> Result<TransferOutcome, DeliveryError> {
        let outcome = self.dispatch(transfer, log)?;
        log.transfers.push(TransferRecord {
            transfer: transfer.clone(),
            outcome,
        });
        Ok(outcome)
    }

    pub fn execute_all(
        &self,
        transfers: &[Transfer],
        log: &mut DeliveryLog,
    ) -> Result<(), DeliveryError> {
        for transfer in transfers {
            self.execute(transfer, log)?;
        }
        Ok(())
    }

    fn dispatch(
        &self,
        transfer: &Transfer,
        log: &mut DeliveryLog,
    ) -> Result<TransferOutcome, DeliveryError> {
        let Transfer {
            source,
            target,
            action,
        } = transfer;
        if self.options.only_run_info {
            return Ok(TransferOutcome::Suppressed);
        }
        if fs_util::path_exists(target) {
            log.warn(target, format!("{target} already exists: not doing anything!"));
            return Ok(TransferOutcome::SkippedExisting);
        }
        if self.options.dry_run {
            info!("DRY_RUN: {action} file {source} to {target}");
            return Ok(TransferOutcome::DryRun);
        }

        if let Some(parent) = target.parent()
            && !parent.is_dir()
        {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| DeliveryError::Filesystem(format!("create {parent}: {err}")))?;
            log.created_dirs.push(parent.to_string());
        }
        info!("{action} file {source} to {target}");
        match action {
            FileAction::Copy => fs_util::copy_file_atomic(source, target)?,
            FileAction::CopyTree => fs_util::copy_dir_atomic(source, target)?,
            FileAction::Move => fs_util::move_path(source, target)?,
            FileAction::Symlink => fs_util::symlink(&fs_util::absolute(source)?, target)?,
        }
        Ok(TransferOutcome::Performed)
    }
}
