use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum DeliveryError {
    #[error("no project description or lanes provided: cannot deliver files without this information")]
    #[diagnostic(help("pass --project-desc <DESC> (or ALL) or --lanes 1,2,..."))]
    NoSelectorProvided,

    #[error("no lanes found matching {selector}: please check your flowcell run information")]
    NoMatchingLanes { selector: String },

    #[error("no barcode directory found: {0}")]
    MissingBarcodeDirectory(String),

    #[error("file name {0} does not conform to format LANE_DATE_FLOWCELL_BARCODEID_READ_fastq.txt")]
    MalformedFilename(String),

    #[error("no sample name for barcode id {barcode_id} (file {filename})")]
    MissingBarcodeMapping { barcode_id: String, filename: String },

    #[error("{first} and {second} would both be delivered as {target}")]
    #[diagnostic(help("sample names must be unique within a lane; try --barcode-full-names"))]
    DuplicateTarget {
        target: String,
        first: String,
        second: String,
    },

    #[error("did not find correct fastq files for lane {lane} in {directory}: found {found:?}")]
    FastqFilesNotFound {
        directory: String,
        lane: String,
        found: Vec<String>,
    },

    #[error("no flowcell information found in {0}")]
    FlowcellIdNotFound(String),

    #[error("invalid lane list: {0}")]
    InvalidLaneList(String),

    #[error("invalid flowcell date {0}: expected YYMMDD")]
    InvalidFlowcellDate(String),

    #[error("--move and --symlink are mutually exclusive")]
    ConflictingTransferModes,

    #[error("failed to read run information at {0}")]
    RunInfoRead(PathBuf),

    #[error("failed to parse run information: {0}")]
    RunInfoParse(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("no analysis directory found: {0}")]
    MissingAnalysisDirectory(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
