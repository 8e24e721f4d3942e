use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;

use crate::error::DeliveryError;

/// Project description that selects every lane of a flowcell.
pub const ALL_PROJECTS: &str = "ALL";

static SAMPLE_INDEX_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(.+?)[.\-_]?ind?(?:ex)?[.\-_]?\d+$").expect("valid sample index regex")
});

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Short sample name derived from a raw barcode label, e.g. `P1_101_index3` -> `P1_101`.
pub fn normalize_sample_name(raw: &str) -> String {
    let trimmed = raw.trim();
    let stripped = SAMPLE_INDEX_SUFFIX
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(trimmed);
    WHITESPACE.replace_all(stripped, "_").into_owned()
}

pub fn validate_flowcell_date(date: &str) -> Result<(), DeliveryError> {
    NaiveDate::parse_from_str(date, "%y%m%d")
        .map(|_| ())
        .map_err(|_| DeliveryError::InvalidFlowcellDate(date.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BarcodedSample {
    pub barcode_id: String,
    pub barcode_name: String,
    pub full_name: Option<String>,
    pub genome_build: Option<String>,
    pub sequence: Option<String>,
    pub barcode_type: Option<String>,
}

impl BarcodedSample {
    pub fn new(barcode_id: impl Into<String>, barcode_name: impl Into<String>) -> Self {
        Self {
            barcode_id: barcode_id.into(),
            barcode_name: barcode_name.into(),
            full_name: None,
            genome_build: None,
            sequence: None,
            barcode_type: None,
        }
    }

    pub fn sample_name(&self) -> String {
        normalize_sample_name(&self.barcode_name)
    }

    pub fn full_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(&self.barcode_name)
    }

    /// Name used for files and synthetic lanes: the full display name, or the normalized short name.
    pub fn display_name(&self, full_names: bool) -> String {
        if full_names {
            self.full_name().to_string()
        } else {
            self.sample_name()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lane {
    pub name: String,
    pub description: String,
    pub genome_build: Option<String>,
    pub analysis: Option<String>,
    pub multiplex: Vec<BarcodedSample>,
    pub files: Vec<Utf8PathBuf>,
}

impl Lane {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            genome_build: None,
            analysis: None,
            multiplex: Vec::new(),
            files: Vec::new(),
        }
    }

    pub fn with_samples(mut self, samples: Vec<BarcodedSample>) -> Self {
        self.multiplex = samples;
        self
    }

    pub fn is_multiplexed(&self) -> bool {
        !self.multiplex.is_empty()
    }

    pub fn barcode_ids(&self) -> Vec<&str> {
        self.multiplex
            .iter()
            .map(|sample| sample.barcode_id.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowcellRun {
    name: String,
    date: String,
    directory: Utf8PathBuf,
    alias: Option<String>,
    results_dir: Option<Utf8PathBuf>,
    lanes: Vec<Lane>,
}

impl FlowcellRun {
    pub fn new(
        name: impl Into<String>,
        date: impl Into<String>,
        directory: impl Into<Utf8PathBuf>,
        lanes: Vec<Lane>,
    ) -> Self {
        Self {
            name: name.into(),
            date: date.into(),
            directory: directory.into(),
            alias: None,
            results_dir: None,
            lanes,
        }
    }

    pub fn with_alias(mut self, alias: Option<String>) -> Self {
        self.alias = alias.filter(|value| !value.trim().is_empty());
        self
    }

    pub fn with_results_dir(mut self, results_dir: impl Into<Utf8PathBuf>) -> Self {
        self.results_dir = Some(results_dir.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    /// `DATE_NAME`, the canonical flowcell id.
    pub fn id(&self) -> String {
        format!("{}_{}", self.date, self.name)
    }

    pub fn alias(&self) -> String {
        self.alias.clone().unwrap_or_else(|| self.id())
    }

    pub fn directory(&self) -> &Utf8Path {
        &self.directory
    }

    pub fn results_dir(&self) -> &Utf8Path {
        self.results_dir.as_deref().unwrap_or(&self.directory)
    }

    pub fn lanes(&self) -> &[Lane] {
        &self.lanes
    }
}

/// Which lanes of a flowcell belong to a delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaneSelector {
    Description(String),
    Lanes(BTreeSet<String>),
}

impl LaneSelector {
    pub fn all() -> Self {
        LaneSelector::Description(ALL_PROJECTS.to_string())
    }

    pub fn from_options(
        project_desc: Option<&str>,
        lanes: Option<&str>,
    ) -> Result<Self, DeliveryError> {
        match (project_desc, lanes) {
            (Some(desc), _) => Ok(LaneSelector::Description(desc.to_string())),
            (None, Some(lanes)) => lanes.parse(),
            (None, None) => Err(DeliveryError::NoSelectorProvided),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, LaneSelector::Description(desc) if desc == ALL_PROJECTS)
    }
}

impl FromStr for LaneSelector {
    type Err = DeliveryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut lanes = BTreeSet::new();
        for part in value.split(',') {
            let lane = part.trim();
            if lane.is_empty() || !lane.chars().all(|ch| ch.is_ascii_digit()) {
                return Err(DeliveryError::InvalidLaneList(value.to_string()));
            }
            lanes.insert(lane.to_string());
        }
        Ok(LaneSelector::Lanes(lanes))
    }
}

impl fmt::Display for LaneSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaneSelector::Description(desc) => write!(f, "description {desc}"),
            LaneSelector::Lanes(lanes) => {
                let joined = lanes.iter().cloned().collect::<Vec<_>>().join(" ");
                write!(f, "lane numbers {joined}")
            }
        }
    }
}
