use regex::{Regex, RegexBuilder};

use crate::config::NamingOptions;
use crate::domain::{BarcodedSample, FlowcellRun, Lane};

pub const SAMPLE_LANE_ANALYSIS: &str = "Minimal";

/// Matches the delivered read files of one sample within `lane`, with or
/// without the leading `LANE_..._` part of the name.
pub fn sample_file_pattern(lane: &Lane, sample_key: &str) -> Regex {
    let pattern = format!(
        r"^(?:{}_.*_)?{}_[12](?:[._]|$)",
        regex::escape(&lane.name),
        regex::escape(sample_key)
    );
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .expect("escaped sample file pattern")
}

fn sample_key(sample: &BarcodedSample, naming: &NamingOptions) -> String {
    if naming.barcode_id_to_name {
        sample.display_name(naming.barcode_full_names)
    } else {
        sample.barcode_id.clone()
    }
}

/// One synthetic, already demultiplexed lane per barcoded sample, numbered
/// from 1 across the whole flowcell.
pub fn flatten(fc: &FlowcellRun, naming: &NamingOptions) -> FlowcellRun {
    let mut lanes = Vec::new();
    for lane in fc.lanes() {
        for sample in &lane.multiplex {
            let pattern = sample_file_pattern(lane, &sample_key(sample, naming));
            let files = lane
                .files
                .iter()
                .filter(|path| pattern.is_match(path.file_name().unwrap_or_default()))
                .cloned()
                .collect();
            let mut synthetic = Lane::new(
                (lanes.len() + 1).to_string(),
                sample.display_name(naming.barcode_full_names),
            );
            synthetic.genome_build = sample
                .genome_build
                .clone()
                .or_else(|| lane.genome_build.clone());
            synthetic.analysis = Some(SAMPLE_LANE_ANALYSIS.to_string());
            synthetic.files = files;
            lanes.push(synthetic);
        }
    }
    FlowcellRun::new(fc.name(), fc.date(), fc.directory(), lanes).with_alias(Some(fc.alias()))
}
