use std::fs;

use assert_matches::assert_matches;
use camino::{Utf8Path, Utf8PathBuf};

use flowcell_delivery::app::{App, DeliveryRequest};
use flowcell_delivery::config::{DeliveryOptions, NamingOptions, ResolvedConfig, TransferMode};
use flowcell_delivery::domain::LaneSelector;
use flowcell_delivery::error::DeliveryError;
use flowcell_delivery::output::JsonOutput;
use flowcell_delivery::planner::TransferOutcome;
use flowcell_delivery::run_info::load_run_info;

const RUN_INFO: &str = r#"
fc_name: FC1
fc_date: 120101
details:
  - lane: 1
    description: ProjectX
    genome_build: hg19
    multiplex:
      - barcode_id: 1
        name: SampleA_index1
      - barcode_id: 2
        name: SampleB_index2
  - lane: 2
    description: ProjectY
    genome_build: mm9
"#;

struct Fixture {
    _temp: tempfile::TempDir,
    flowcell_dir: Utf8PathBuf,
    project_dir: Utf8PathBuf,
}

fn touch(path: &Utf8Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, path.file_name().unwrap()).unwrap();
}

fn fixture() -> Fixture {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let flowcell_dir = root.join("runs").join("120101_FC1");
    fs::create_dir_all(&flowcell_dir).unwrap();
    fs::write(flowcell_dir.join("run_info.yaml"), RUN_INFO).unwrap();

    let lane1 = flowcell_dir.join("1_120101_FC1_barcode");
    for name in [
        "1_120101_FC1_1_1_fastq.txt",
        "1_120101_FC1_1_2_fastq.txt",
        "1_120101_FC1_2_1_fastq.txt",
        "1_120101_FC1_2_2_fastq.txt",
    ] {
        touch(&lane1.join(name));
    }
    let lane2 = flowcell_dir.join("2_120101_FC1_barcode");
    for name in ["2_120101_FC1_nobc_1_fastq.txt", "2_120101_FC1_nobc_2_fastq.txt"] {
        touch(&lane2.join(name));
    }

    Fixture {
        project_dir: root.join("projects").join("project_x"),
        flowcell_dir,
        _temp: temp,
    }
}

fn request(fixture: &Fixture, selector: LaneSelector, alias: Option<&str>) -> DeliveryRequest {
    DeliveryRequest {
        flowcell_dir: fixture.flowcell_dir.clone(),
        project_dir: fixture.project_dir.clone(),
        run_info: None,
        selector,
        flowcell_alias: alias.map(str::to_string),
    }
}

fn description(value: &str) -> LaneSelector {
    LaneSelector::Description(value.to_string())
}

#[test]
fn deliver_copies_project_lanes_and_saves_run_info() {
    let fixture = fixture();
    let app = App::new(ResolvedConfig::default());

    let result = app
        .deliver(
            request(&fixture, description("ProjectX"), None),
            &DeliveryOptions::default(),
            &JsonOutput,
        )
        .unwrap();

    let data_dir = fixture.project_dir.join("nobackup/data/120101_FC1");
    assert_eq!(result.flowcell_id, "120101_FC1");
    assert_eq!(result.data_dir, data_dir.to_string());
    assert_eq!(result.lanes, 1);
    assert_eq!(result.samples, 2);
    assert!(data_dir.join("1_120101_FC1_1_1_fastq.txt").is_file());
    assert!(data_dir.join("1_120101_FC1_2_2_fastq.txt").is_file());
    assert!(!data_dir.join("2_120101_FC1_nobc_1_fastq.txt").exists());
    assert!(
        fixture
            .project_dir
            .join("nobackup/intermediate/120101_FC1")
            .is_dir()
    );
    assert!(
        fixture
            .flowcell_dir
            .join("1_120101_FC1_barcode/1_120101_FC1_1_1_fastq.txt")
            .is_file()
    );

    let project = load_run_info(&data_dir.join("project_run_info.yaml")).unwrap();
    assert_eq!(project.fc_name.as_deref(), Some("FC1"));
    assert_eq!(project.details.len(), 1);
    assert_eq!(project.details[0].lane, "1");
    assert_eq!(project.details[0].multiplex.len(), 2);
    assert_eq!(project.details[0].files.len(), 4);

    let samples = load_run_info(&data_dir.join("sample_project_run_info.yaml")).unwrap();
    let lanes = samples
        .details
        .iter()
        .map(|lane| (lane.lane.as_str(), lane.description.as_deref()))
        .collect::<Vec<_>>();
    assert_eq!(lanes, vec![("1", Some("SampleA")), ("2", Some("SampleB"))]);
    for lane in &samples.details {
        assert!(lane.multiplex.is_empty());
        assert_eq!(lane.analysis.as_deref(), Some("Minimal"));
        assert_eq!(lane.genome_build.as_deref(), Some("hg19"));
        assert_eq!(lane.files.len(), 2);
    }
}

#[test]
fn deliver_by_lane_number_keeps_plain_lane_names() {
    let fixture = fixture();
    let app = App::new(ResolvedConfig::default());
    let options = DeliveryOptions {
        naming: NamingOptions {
            sample_prefix: true,
            barcode_id_to_name: true,
            barcode_full_names: false,
        },
        ..DeliveryOptions::default()
    };

    let result = app
        .deliver(
            request(&fixture, "2".parse().unwrap(), None),
            &options,
            &JsonOutput,
        )
        .unwrap();

    let data_dir = fixture.project_dir.join("nobackup/data/120101_FC1");
    assert_eq!(result.lanes, 1);
    assert_eq!(result.samples, 0);
    assert!(data_dir.join("2_120101_FC1_nobc_1_fastq.txt").is_file());
    assert!(data_dir.join("2_120101_FC1_nobc_2_fastq.txt").is_file());
}

#[test]
fn customer_delivery_renames_into_project_dir() {
    let fixture = fixture();
    let app = App::new(ResolvedConfig::default());
    let options = DeliveryOptions {
        customer_delivery: true,
        ..DeliveryOptions::default()
    };

    let result = app
        .deliver(
            request(&fixture, description("ProjectX"), Some("ignored_alias")),
            &options,
            &JsonOutput,
        )
        .unwrap();

    assert_eq!(result.data_dir, fixture.project_dir.to_string());
    assert_eq!(result.alias, "120101_FC1");
    for name in [
        "SampleA_1.fastq",
        "SampleA_2.fastq",
        "SampleB_1.fastq",
        "SampleB_2.fastq",
    ] {
        assert!(fixture.project_dir.join(name).is_file(), "{name}");
    }
    assert!(!fixture.project_dir.join("ignored_alias").exists());

    let samples = load_run_info(&fixture.project_dir.join("sample_project_run_info.yaml")).unwrap();
    assert!(samples.details.iter().all(|lane| lane.files.len() == 2));
}

#[cfg(unix)]
#[test]
fn alias_links_point_at_delivery_dirs() {
    let fixture = fixture();
    let app = App::new(ResolvedConfig::default());

    app.deliver(
        request(&fixture, description("ProjectX"), Some("20120101A_hiseq2000")),
        &DeliveryOptions::default(),
        &JsonOutput,
    )
    .unwrap();

    for subdir in ["nobackup/data", "nobackup/intermediate"] {
        let link = fixture.project_dir.join(subdir).join("20120101A_hiseq2000");
        let target = fs::read_link(&link).unwrap();
        assert_eq!(
            target,
            fixture.project_dir.join(subdir).join("120101_FC1").into_std_path_buf()
        );
    }
}

#[test]
fn only_run_info_suppresses_every_transfer() {
    let fixture = fixture();
    let app = App::new(ResolvedConfig::default());
    let options = DeliveryOptions {
        only_run_info: true,
        ..DeliveryOptions::default()
    };

    let result = app
        .deliver(
            request(&fixture, description("ProjectX"), None),
            &options,
            &JsonOutput,
        )
        .unwrap();

    let data_dir = fixture.project_dir.join("nobackup/data/120101_FC1");
    assert!(!data_dir.join("1_120101_FC1_1_1_fastq.txt").exists());
    assert!(data_dir.join("project_run_info.yaml").is_file());
    assert!(data_dir.join("sample_project_run_info.yaml").is_file());
    assert_eq!(result.log.outcomes(TransferOutcome::Suppressed).count(), 4);
    assert_eq!(result.log.outcomes(TransferOutcome::Performed).count(), 0);
}

#[test]
fn dry_run_leaves_filesystem_untouched() {
    let fixture = fixture();
    let app = App::new(ResolvedConfig::default());
    let options = DeliveryOptions {
        dry_run: true,
        ..DeliveryOptions::default()
    };

    let result = app
        .deliver(
            request(&fixture, description("ALL"), Some("alias")),
            &options,
            &JsonOutput,
        )
        .unwrap();

    assert!(!fixture.project_dir.exists());
    assert_eq!(result.log.mutations(), 0);
    assert_eq!(result.lanes, 2);
    assert_eq!(result.log.outcomes(TransferOutcome::DryRun).count(), 6 + 2);
    assert!(result.records.iter().all(|record| !record.written));
    let rendered = result.records[0].content.as_deref().unwrap();
    assert!(rendered.contains("ProjectY"));
}

#[test]
fn repeated_delivery_skips_existing_files() {
    let fixture = fixture();
    let app = App::new(ResolvedConfig::default());
    let options = DeliveryOptions::default();

    app.deliver(
        request(&fixture, description("ProjectX"), None),
        &options,
        &JsonOutput,
    )
    .unwrap();
    let again = app
        .deliver(
            request(&fixture, description("ProjectX"), None),
            &options,
            &JsonOutput,
        )
        .unwrap();

    assert_eq!(again.log.outcomes(TransferOutcome::Performed).count(), 0);
    assert_eq!(again.log.outcomes(TransferOutcome::SkippedExisting).count(), 4);
    assert_eq!(again.log.warnings.len(), 4);
    assert!(again.log.created_dirs.is_empty());
}

#[test]
fn move_empties_the_barcode_directory() {
    let fixture = fixture();
    let app = App::new(ResolvedConfig::default());
    let options = DeliveryOptions {
        transfer: TransferMode::Move,
        ..DeliveryOptions::default()
    };

    app.deliver(
        request(&fixture, description("ProjectY"), None),
        &options,
        &JsonOutput,
    )
    .unwrap();

    let barcode_dir = fixture.flowcell_dir.join("2_120101_FC1_barcode");
    assert_eq!(fs::read_dir(&barcode_dir).unwrap().count(), 0);
    assert!(
        fixture
            .project_dir
            .join("nobackup/data/120101_FC1/2_120101_FC1_nobc_2_fastq.txt")
            .is_file()
    );
}

#[test]
fn unknown_project_is_an_error() {
    let fixture = fixture();
    let app = App::new(ResolvedConfig::default());

    let err = app
        .deliver(
            request(&fixture, description("ProjectZ"), None),
            &DeliveryOptions::default(),
            &JsonOutput,
        )
        .unwrap_err();

    assert_matches!(err, DeliveryError::NoMatchingLanes { .. });
    assert!(!fixture.project_dir.exists());
}

#[test]
fn missing_barcode_dir_fails_before_any_copy() {
    let fixture = fixture();
    fs::remove_dir_all(fixture.flowcell_dir.join("1_120101_FC1_barcode")).unwrap();
    let app = App::new(ResolvedConfig::default());

    let err = app
        .deliver(
            request(&fixture, description("ALL"), None),
            &DeliveryOptions::default(),
            &JsonOutput,
        )
        .unwrap_err();

    assert_matches!(err, DeliveryError::MissingBarcodeDirectory(_));
    assert!(!fixture.project_dir.exists());
}
