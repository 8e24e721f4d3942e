use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::{BarcodedSample, FlowcellRun, Lane, validate_flowcell_date};
use crate::error::DeliveryError;
use crate::fs_util;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunInfoRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fc_name: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "optional_scalar"
    )]
    pub fc_date: Option<String>,
    #[serde(default)]
    pub details: Vec<LaneRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneRecord {
    #[serde(deserialize_with = "scalar")]
    pub lane: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genome_build: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
    #[serde(default)]
    pub multiplex: Vec<SampleRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleRecord {
    #[serde(deserialize_with = "scalar")]
    pub barcode_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genome_build: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barcode_type: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RunInfoDocument {
    Detailed(RunInfoRecord),
    Lanes(Vec<LaneRecord>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Int(i64),
    Text(String),
}

impl Scalar {
    fn into_string(self) -> String {
        match self {
            Scalar::Int(value) => value.to_string(),
            Scalar::Text(value) => value,
        }
    }
}

fn scalar<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Scalar::deserialize(deserializer)?.into_string())
}

fn optional_scalar<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<Scalar>::deserialize(deserializer)?.map(Scalar::into_string))
}

impl From<SampleRecord> for BarcodedSample {
    fn from(record: SampleRecord) -> Self {
        let barcode_name = record.name.unwrap_or_else(|| record.barcode_id.clone());
        Self {
            barcode_id: record.barcode_id,
            barcode_name,
            full_name: record.full_name,
            genome_build: record.genome_build,
            sequence: record.sequence,
            barcode_type: record.barcode_type,
        }
    }
}

impl From<&BarcodedSample> for SampleRecord {
    fn from(sample: &BarcodedSample) -> Self {
        Self {
            barcode_id: sample.barcode_id.clone(),
            name: Some(sample.barcode_name.clone()),
            full_name: sample.full_name.clone(),
            genome_build: sample.genome_build.clone(),
            sequence: sample.sequence.clone(),
            barcode_type: sample.barcode_type.clone(),
        }
    }
}

impl From<LaneRecord> for Lane {
    fn from(record: LaneRecord) -> Self {
        Self {
            name: record.lane,
            description: record.description.unwrap_or_default(),
            genome_build: record.genome_build,
            analysis: record.analysis,
            multiplex: record.multiplex.into_iter().map(BarcodedSample::from).collect(),
            files: record.files.into_iter().map(Utf8PathBuf::from).collect(),
        }
    }
}

impl From<&Lane> for LaneRecord {
    fn from(lane: &Lane) -> Self {
        Self {
            lane: lane.name.clone(),
            description: (!lane.description.is_empty()).then(|| lane.description.clone()),
            genome_build: lane.genome_build.clone(),
            analysis: lane.analysis.clone(),
            multiplex: lane.multiplex.iter().map(SampleRecord::from).collect(),
            files: lane.files.iter().map(|path| path.to_string()).collect(),
        }
    }
}

pub fn to_record(fc: &FlowcellRun) -> RunInfoRecord {
    RunInfoRecord {
        fc_name: Some(fc.name().to_string()),
        fc_date: Some(fc.date().to_string()),
        details: fc.lanes().iter().map(LaneRecord::from).collect(),
    }
}

pub fn parse_run_info(content: &str) -> Result<RunInfoRecord, DeliveryError> {
    let document: RunInfoDocument = serde_yaml::from_str(content)
        .map_err(|err| DeliveryError::RunInfoParse(err.to_string()))?;
    Ok(match document {
        RunInfoDocument::Detailed(record) => record,
        RunInfoDocument::Lanes(details) => RunInfoRecord {
            fc_name: None,
            fc_date: None,
            details,
        },
    })
}

pub fn load_run_info(path: &Utf8Path) -> Result<RunInfoRecord, DeliveryError> {
    let content = fs::read_to_string(path.as_std_path())
        .map_err(|_| DeliveryError::RunInfoRead(path.as_std_path().to_path_buf()))?;
    parse_run_info(&content)
}

/// Builds the flowcell model for `fc_dir`, inferring name and date from the
/// delivered fastq files when the record does not carry them.
pub fn flowcell_from_record(
    record: RunInfoRecord,
    fc_dir: &Utf8Path,
) -> Result<FlowcellRun, DeliveryError> {
    let (name, date) = match (record.fc_name, record.fc_date) {
        (Some(name), Some(date)) => (name, date),
        _ => infer_flowcell_id(fc_dir, &record.details)?,
    };
    validate_flowcell_date(&date)?;
    let lanes = record.details.into_iter().map(Lane::from).collect();
    Ok(FlowcellRun::new(name, date, fc_dir, lanes))
}

pub fn load_flowcell(path: &Utf8Path, fc_dir: &Utf8Path) -> Result<FlowcellRun, DeliveryError> {
    flowcell_from_record(load_run_info(path)?, fc_dir)
}

/// Returns `(name, date)` from `LANE_DATE_NAME_..._fastq.txt` files under the
/// last lane's barcode directory, or from a `DATE_NAME` flowcell directory.
pub fn infer_flowcell_id(
    fc_dir: &Utf8Path,
    lanes: &[LaneRecord],
) -> Result<(String, String), DeliveryError> {
    let not_found = || DeliveryError::FlowcellIdNotFound(fc_dir.to_string());
    if let Some(lane) = lanes.last() {
        let pattern = format!(
            "{}/{}_*_barcode/*_fastq.txt",
            glob::Pattern::escape(fc_dir.as_str()),
            glob::Pattern::escape(&lane.lane)
        );
        let files = fs_util::glob_sorted(&pattern)?;
        if let Some(first) = files.first() {
            let parts = first.file_name().unwrap_or_default().split('_').collect::<Vec<_>>();
            if parts.len() > 2 {
                return Ok((parts[2].to_string(), parts[1].to_string()));
            }
        }
    }

    let dir_name = fc_dir.file_name().ok_or_else(not_found)?;
    let (date, name) = dir_name.split_once('_').ok_or_else(not_found)?;
    if validate_flowcell_date(date).is_err() || name.is_empty() {
        return Err(not_found());
    }
    Ok((name.to_string(), date.to_string()))
}

pub fn render_run_info(fc: &FlowcellRun) -> Result<String, DeliveryError> {
    serde_yaml::to_string(&to_record(fc)).map_err(|err| DeliveryError::RunInfoParse(err.to_string()))
}

pub fn write_run_info(path: &Utf8Path, fc: &FlowcellRun) -> Result<(), DeliveryError> {
    let content = render_run_info(fc)?;
    fs_util::write_bytes_atomic(path, content.as_bytes())
}
