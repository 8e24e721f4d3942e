use std::fmt;
use std::fs;
use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::DeliveryError;

pub const DEFAULT_CONFIG_FILE: &str = "fc-deliver.json";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    #[default]
    Copy,
    Move,
    Symlink,
}

impl TransferMode {
    pub fn from_flags(move_data: bool, symlink: bool) -> Result<Self, DeliveryError> {
        match (move_data, symlink) {
            (true, true) => Err(DeliveryError::ConflictingTransferModes),
            (true, false) => Ok(TransferMode::Move),
            (false, true) => Ok(TransferMode::Symlink),
            (false, false) => Ok(TransferMode::Copy),
        }
    }
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferMode::Copy => write!(f, "copy"),
            TransferMode::Move => write!(f, "move"),
            TransferMode::Symlink => write!(f, "symlink"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NamingOptions {
    pub sample_prefix: bool,
    pub barcode_id_to_name: bool,
    pub barcode_full_names: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DeliveryOptions {
    pub transfer: TransferMode,
    pub install_data: bool,
    pub only_run_info: bool,
    pub customer_delivery: bool,
    pub naming: NamingOptions,
    pub dry_run: bool,
}

impl DeliveryOptions {
    /// Naming actually applied to delivered files; customer deliveries always
    /// convert barcode ids to sample names.
    pub fn effective_naming(&self) -> NamingOptions {
        NamingOptions {
            barcode_id_to_name: self.naming.barcode_id_to_name || self.customer_delivery,
            ..self.naming
        }
    }
}

/// How the "ALL" project description treats lanes without a description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SelectorPolicy {
    pub all_includes_undescribed: bool,
}

impl Default for SelectorPolicy {
    fn default() -> Self {
        Self {
            all_includes_undescribed: true,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub run_info_name: Option<String>,
    #[serde(default)]
    pub project_run_info_name: Option<String>,
    #[serde(default)]
    pub sample_run_info_name: Option<String>,
    #[serde(default)]
    pub data_subdir: Option<String>,
    #[serde(default)]
    pub intermediate_subdir: Option<String>,
    #[serde(default)]
    pub all_includes_undescribed: Option<bool>,
    #[serde(default)]
    pub bam_glob: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub run_info_name: String,
    pub project_run_info_name: String,
    pub sample_run_info_name: String,
    pub data_subdir: String,
    pub intermediate_subdir: String,
    pub selector_policy: SelectorPolicy,
    pub bam_glob: String,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        ConfigLoader::resolve_config(Config::default())
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, DeliveryError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(ResolvedConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| DeliveryError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| DeliveryError::ConfigParse(err.to_string()))?;

        Ok(Self::resolve_config(config))
    }

    pub fn resolve_config(config: Config) -> ResolvedConfig {
        ResolvedConfig {
            schema_version: config.schema_version.unwrap_or(1),
            run_info_name: config
                .run_info_name
                .unwrap_or_else(|| "run_info.yaml".to_string()),
            project_run_info_name: config
                .project_run_info_name
                .unwrap_or_else(|| "project_run_info.yaml".to_string()),
            sample_run_info_name: config
                .sample_run_info_name
                .unwrap_or_else(|| "sample_project_run_info.yaml".to_string()),
            data_subdir: config
                .data_subdir
                .unwrap_or_else(|| "nobackup/data".to_string()),
            intermediate_subdir: config
                .intermediate_subdir
                .unwrap_or_else(|| "nobackup/intermediate".to_string()),
            selector_policy: SelectorPolicy {
                all_includes_undescribed: config.all_includes_undescribed.unwrap_or(true),
            },
            bam_glob: config
                .bam_glob
                .unwrap_or_else(|| "*-sort-dup-gatkrecal-realign*.bam".to_string()),
        }
    }
}
