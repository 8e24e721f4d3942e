use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::info;

use crate::config::{DeliveryOptions, ResolvedConfig};
use crate::domain::{FlowcellRun, LaneSelector};
use crate::error::DeliveryError;
use crate::fs_util;
use crate::planner::{
    DeliveryLog, DeliveryPlanner, FileAction, LanePlan, Transfer, ensure_unique_targets,
};
use crate::prune::prune;
use crate::results::{self, ResultsDelivery, ResultsOptions};
use crate::rewrite::flatten;
use crate::run_info;

#[derive(Debug, Clone)]
pub struct DeliveryRequest {
    pub flowcell_dir: Utf8PathBuf,
    pub project_dir: Utf8PathBuf,
    pub run_info: Option<Utf8PathBuf>,
    pub selector: LaneSelector,
    pub flowcell_alias: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SavedRecord {
    pub path: String,
    pub lanes: usize,
    pub written: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryResult {
    pub flowcell_id: String,
    pub alias: String,
    pub selector: String,
    pub data_dir: String,
    pub analysis_dir: String,
    pub lanes: usize,
    pub samples: usize,
    pub records: Vec<SavedRecord>,
    pub log: DeliveryLog,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Clone)]
struct DeliveryLayout {
    data_dir: Utf8PathBuf,
    analysis_dir: Utf8PathBuf,
    alias: Option<String>,
}

#[derive(Debug, Clone)]
pub struct App {
    config: ResolvedConfig,
}

impl App {
    pub fn new(config: ResolvedConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn deliver(
        &self,
        request: DeliveryRequest,
        options: &DeliveryOptions,
        sink: &dyn ProgressSink,
    ) -> Result<DeliveryResult, DeliveryError> {
        let started = Instant::now();
        let fc_dir = fs_util::absolute(&request.flowcell_dir)?;
        let project_dir = fs_util::absolute(&request.project_dir)?;
        let run_info_path = request
            .run_info
            .clone()
            .unwrap_or_else(|| fc_dir.join(&self.config.run_info_name));

        sink.event(ProgressEvent {
            message: format!("phase=Resolve; loading {run_info_path}"),
            elapsed: None,
        });
        let original = run_info::load_flowcell(&run_info_path, &fc_dir)?;
        let pruned = prune(&original, &request.selector, self.config.selector_policy).ok_or_else(
            || DeliveryError::NoMatchingLanes {
                selector: request.selector.to_string(),
            },
        )?;

        let layout = self.layout(&pruned, &project_dir, request.flowcell_alias, options);
        let planner = DeliveryPlanner::new(options);

        sink.event(ProgressEvent {
            message: format!(
                "phase=Plan; {} lane(s) of {} selected by {}",
                pruned.lanes().len(),
                pruned.id(),
                request.selector
            ),
            elapsed: Some(started.elapsed()),
        });
        let plans = pruned
            .lanes()
            .iter()
            .map(|lane| planner.plan_lane(&pruned, lane, &layout.data_dir, &layout.analysis_dir))
            .collect::<Result<Vec<LanePlan>, DeliveryError>>()?;
        ensure_unique_targets(plans.iter().flat_map(|plan| &plan.transfers))?;

        let mut log = DeliveryLog::default();
        planner.ensure_dir(&layout.data_dir, "flowcell delivery", &mut log)?;
        planner.ensure_dir(&layout.analysis_dir, "analysis delivery", &mut log)?;
        if let Some(alias) = &layout.alias {
            for dir in [&layout.data_dir, &layout.analysis_dir] {
                if let Some(parent) = dir.parent() {
                    let link = Transfer {
                        source: dir.clone(),
                        target: parent.join(alias),
                        action: FileAction::Symlink,
                    };
                    planner.execute(&link, &mut log)?;
                }
            }
        }

        sink.event(ProgressEvent {
            message: format!("phase=Deliver; {} into {}", options.transfer, layout.data_dir),
            elapsed: Some(started.elapsed()),
        });
        let mut lanes = Vec::with_capacity(plans.len());
        for (lane, plan) in pruned.lanes().iter().zip(plans) {
            info!(
                "Processing project: {}; lane {}; reference genome {}",
                lane.description,
                lane.name,
                lane.genome_build.as_deref().unwrap_or("unknown")
            );
            planner.execute_all(&plan.transfers, &mut log)?;
            let mut delivered = lane.clone();
            delivered.files = plan.delivered;
            lanes.push(delivered);
        }

        let delivered = FlowcellRun::new(pruned.name(), pruned.date(), &layout.data_dir, lanes)
            .with_alias(layout.alias.clone());
        let samples = flatten(&delivered, &options.effective_naming());

        sink.event(ProgressEvent {
            message: "phase=Store; saving run information".to_string(),
            elapsed: Some(started.elapsed()),
        });
        let records = vec![
            self.save_record(&delivered, &self.config.project_run_info_name, options)?,
            self.save_record(&samples, &self.config.sample_run_info_name, options)?,
        ];

        Ok(DeliveryResult {
            flowcell_id: delivered.id(),
            alias: delivered.alias(),
            selector: request.selector.to_string(),
            data_dir: layout.data_dir.to_string(),
            analysis_dir: layout.analysis_dir.to_string(),
            lanes: delivered.lanes().len(),
            samples: samples.lanes().len(),
            records,
            log,
        })
    }

    pub fn deliver_results(
        &self,
        run_info_path: &Utf8Path,
        delivery_dir: &Utf8Path,
        options: &ResultsOptions,
        sink: &dyn ProgressSink,
    ) -> Result<ResultsDelivery, DeliveryError> {
        sink.event(ProgressEvent {
            message: format!("phase=Resolve; loading {run_info_path}"),
            elapsed: None,
        });
        let record = run_info::load_run_info(run_info_path)?;
        sink.event(ProgressEvent {
            message: format!("phase=Deliver; results from {}", options.analysis_dir),
            elapsed: None,
        });
        results::deliver_results(&record, delivery_dir, options)
    }

    fn layout(
        &self,
        fc: &FlowcellRun,
        project_dir: &Utf8Path,
        alias: Option<String>,
        options: &DeliveryOptions,
    ) -> DeliveryLayout {
        if options.customer_delivery {
            if alias.as_deref().is_some_and(|value| !value.is_empty()) {
                info!("Ignoring flowcell alias when doing customer delivery");
            }
            return DeliveryLayout {
                data_dir: project_dir.to_path_buf(),
                analysis_dir: project_dir.to_path_buf(),
                alias: None,
            };
        }
        let alias = alias.filter(|value| !value.trim().is_empty() && *value != fc.id());
        DeliveryLayout {
            data_dir: project_dir.join(&self.config.data_subdir).join(fc.id()),
            analysis_dir: project_dir
                .join(&self.config.intermediate_subdir)
                .join(fc.id()),
            alias,
        }
    }

    fn save_record(
        &self,
        fc: &FlowcellRun,
        file_name: &str,
        options: &DeliveryOptions,
    ) -> Result<SavedRecord, DeliveryError> {
        let path = fc.directory().join(file_name);
        if options.dry_run {
            info!("DRY_RUN: write {path}");
            return Ok(SavedRecord {
                path: path.to_string(),
                lanes: fc.lanes().len(),
                written: false,
                content: Some(run_info::render_run_info(fc)?),
            });
        }
        run_info::write_run_info(&path, fc)?;
        info!("Saved run information to {path}");
        Ok(SavedRecord {
            path: path.to_string(),
            lanes: fc.lanes().len(),
            written: true,
            content: None,
        })
    }
}
