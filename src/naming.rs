use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::NamingOptions;
use crate::domain::Lane;
use crate::error::DeliveryError;

/// Barcode segment used by lanes that were never demultiplexed.
pub const NO_BARCODE_PLACEHOLDER: &str = "nobc";

// Grammar of a delivered read file: LANE_DATE_FLOWCELL_BARCODEID_READ_fastq.txt
const LANE: &str = r"(\d+)";
const DATE: &str = r"(\d{6})";
const FLOWCELL: &str = r"([A-Za-z0-9]+)";
const BARCODE_ID: &str = r"(\d+|nobc)";
const READ: &str = r"(\d+)";
const SUFFIX: &str = r"_fastq\.txt";

static FASTQ_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        "^{LANE}_{DATE}_{FLOWCELL}_{BARCODE_ID}_{READ}{SUFFIX}$"
    ))
    .expect("valid fastq name grammar")
});

static FASTQ_TAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("_{BARCODE_ID}_{READ}{SUFFIX}$")).expect("valid fastq tail grammar")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastqName {
    pub lane: String,
    pub date: String,
    pub flowcell: String,
    pub barcode_id: String,
    pub read: String,
}

impl FromStr for FastqName {
    type Err = DeliveryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let caps = FASTQ_NAME
            .captures(value)
            .ok_or_else(|| DeliveryError::MalformedFilename(value.to_string()))?;
        Ok(Self {
            lane: caps[1].to_string(),
            date: caps[2].to_string(),
            flowcell: caps[3].to_string(),
            barcode_id: caps[4].to_string(),
            read: caps[5].to_string(),
        })
    }
}

impl fmt::Display for FastqName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}_{}_fastq.txt",
            self.lane, self.date, self.flowcell, self.barcode_id, self.read
        )
    }
}

/// Barcode id to sample name lookup for one lane.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BarcodeNames(HashMap<String, String>);

impl BarcodeNames {
    pub fn from_lane(lane: &Lane, full_names: bool) -> Self {
        lane.multiplex
            .iter()
            .map(|sample| (sample.barcode_id.clone(), sample.display_name(full_names)))
            .collect()
    }

    pub fn get(&self, barcode_id: &str) -> Option<&str> {
        self.0.get(barcode_id).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn resolve(&self, barcode_id: &str, filename: &str) -> Result<&str, DeliveryError> {
        self.get(barcode_id)
            .ok_or_else(|| DeliveryError::MissingBarcodeMapping {
                barcode_id: barcode_id.to_string(),
                filename: filename.to_string(),
            })
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for BarcodeNames {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(id, name)| (id.into(), name.into()))
                .collect(),
        )
    }
}

/// `LANE_DATE_...` -> `LANE_SAMPLE_DATE_...`.
pub fn add_sample_prefix(names: &BarcodeNames, filename: &str) -> Result<String, DeliveryError> {
    let parsed: FastqName = filename.parse()?;
    let sample = names.resolve(&parsed.barcode_id, filename)?;
    let rest = &filename[parsed.lane.len() + 1..];
    Ok(format!("{}_{sample}_{rest}", parsed.lane))
}

/// `..._BARCODEID_READ_fastq.txt` -> `SAMPLE_READ.fastq`.
pub fn convert_barcode_id_to_name(
    names: &BarcodeNames,
    filename: &str,
) -> Result<String, DeliveryError> {
    let caps = FASTQ_TAIL
        .captures(filename)
        .ok_or_else(|| DeliveryError::MalformedFilename(filename.to_string()))?;
    let sample = names.resolve(&caps[1], filename)?;
    Ok(format!("{sample}_{}.fastq", &caps[2]))
}

/// Delivered name for `source_name`; prefixing runs before barcode conversion.
/// Lanes without barcoded samples keep their original names.
pub fn target_file_name(
    names: &BarcodeNames,
    source_name: &str,
    naming: &NamingOptions,
) -> Result<String, DeliveryError> {
    if names.is_empty() {
        return Ok(source_name.to_string());
    }
    let mut target = source_name.to_string();
    if naming.sample_prefix {
        target = add_sample_prefix(names, &target)?;
    }
    if naming.barcode_id_to_name {
        target = convert_barcode_id_to_name(names, &target)?;
    }
    Ok(target)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn names() -> BarcodeNames {
        [("7", "SampleA")].into_iter().collect()
    }

    #[test]
    fn parse_fastq_name() {
        let name: FastqName = "1_120101_FC1_7_1_fastq.txt".parse().unwrap();
        assert_eq!(name.lane, "1");
        assert_eq!(name.date, "120101");
        assert_eq!(name.flowcell, "FC1");
        assert_eq!(name.barcode_id, "7");
        assert_eq!(name.read, "1");
        assert_eq!(name.to_string(), "1_120101_FC1_7_1_fastq.txt");

        let plain: FastqName = "2_120101_FC1_nobc_2_fastq.txt".parse().unwrap();
        assert_eq!(plain.barcode_id, NO_BARCODE_PLACEHOLDER);
    }

    #[test]
    fn prefix_rewrites_lane_and_date() {
        let out = add_sample_prefix(&names(), "1_120101_FC1_7_1_fastq.txt").unwrap();
        assert_eq!(out, "1_SampleA_120101_FC1_7_1_fastq.txt");
    }

    #[test]
    fn prefix_twice_is_rejected() {
        let once = add_sample_prefix(&names(), "1_120101_FC1_7_1_fastq.txt").unwrap();
        let err = add_sample_prefix(&names(), &once).unwrap_err();
        assert_matches!(err, DeliveryError::MalformedFilename(_));
    }

    #[test]
    fn convert_uses_sample_name() {
        let out = convert_barcode_id_to_name(&names(), "1_120101_FC1_7_1_fastq.txt").unwrap();
        assert_eq!(out, "SampleA_1.fastq");
    }

    #[test]
    fn unknown_barcode_is_reported() {
        let err = convert_barcode_id_to_name(&names(), "1_120101_FC1_8_2_fastq.txt").unwrap_err();
        assert_matches!(err, DeliveryError::MissingBarcodeMapping { barcode_id, .. } if barcode_id == "8");
    }

    #[test]
    fn target_name_applies_prefix_then_conversion() {
        let naming = NamingOptions {
            sample_prefix: true,
            barcode_id_to_name: true,
            barcode_full_names: false,
        };
        let out = target_file_name(&names(), "1_120101_FC1_7_2_fastq.txt", &naming).unwrap();
        assert_eq!(out, "SampleA_2.fastq");

        let untouched =
            target_file_name(&BarcodeNames::default(), "1_120101_FC1_nobc_1_fastq.txt", &naming)
                .unwrap();
        assert_eq!(untouched, "1_120101_FC1_nobc_1_fastq.txt");
    }

    #[test]
    fn full_names_come_from_the_lane_samples() {
        use crate::domain::BarcodedSample;

        let mut sample = BarcodedSample::new("7", "P1_101_index7");
        sample.full_name = Some("Patient1-Tumour".to_string());
        let lane = Lane::new("1", "ProjectX").with_samples(vec![
            sample,
            BarcodedSample::new("8", "P1_102_index8"),
        ]);
        let naming = NamingOptions {
            barcode_id_to_name: true,
            barcode_full_names: true,
            ..NamingOptions::default()
        };

        let full = BarcodeNames::from_lane(&lane, true);
        let out = target_file_name(&full, "1_120101_FC1_7_1_fastq.txt", &naming).unwrap();
        assert_eq!(out, "Patient1-Tumour_1.fastq");
        let fallback = target_file_name(&full, "1_120101_FC1_8_2_fastq.txt", &naming).unwrap();
        assert_eq!(fallback, "P1_102_index8_2.fastq");

        let short = BarcodeNames::from_lane(&lane, false);
        assert_eq!(short.get("7"), Some("P1_101"));
    }
}
