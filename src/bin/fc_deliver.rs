use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use flowcell_delivery::app::{App, DeliveryRequest};
use flowcell_delivery::config::{ConfigLoader, DeliveryOptions, NamingOptions, TransferMode};
use flowcell_delivery::domain::LaneSelector;
use flowcell_delivery::error::DeliveryError;
use flowcell_delivery::output::{JsonOutput, OutputMode, TextOutput};
use flowcell_delivery::results::ResultsOptions;

#[derive(Parser)]
#[command(name = "fc-deliver")]
#[command(about = "Deliver flowcell fastq data and analysis results into project directories")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    json: bool,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Deliver the lanes of one project from a flowcell directory")]
    Deliver(DeliverArgs),
    #[command(about = "Deliver project analysis results (vcf, metrics, bigwig, bam)")]
    Results(ResultsArgs),
}

#[derive(Args)]
struct DeliverArgs {
    flowcell_dir: Utf8PathBuf,

    project_dir: Utf8PathBuf,

    run_info: Option<Utf8PathBuf>,

    #[arg(short = 'y', long)]
    project_desc: Option<String>,

    #[arg(short, long)]
    lanes: Option<String>,

    #[arg(short = 'a', long)]
    flowcell_alias: Option<String>,

    #[arg(short = 'd', long)]
    install_data: bool,

    #[arg(short, long = "move")]
    move_data: bool,

    #[arg(short = 'L', long)]
    symlink: bool,

    #[arg(short = 'f', long)]
    only_run_info: bool,

    #[arg(short, long)]
    customer_delivery: bool,

    #[arg(short = 'p', long)]
    sample_prefix: bool,

    #[arg(short = 'b', long)]
    barcode_id_to_name: bool,

    #[arg(long)]
    barcode_full_names: bool,

    #[arg(short = 'n', long)]
    dry_run: bool,
}

#[derive(Args)]
struct ResultsArgs {
    run_info: Utf8PathBuf,

    delivery_dir: Utf8PathBuf,

    #[arg(short, long)]
    analysis_dir: Option<Utf8PathBuf>,

    #[arg(short, long = "move")]
    move_data: bool,

    #[arg(short = 'V', long)]
    no_vcf: bool,

    #[arg(short = 'M', long)]
    no_metrics: bool,

    #[arg(short = 'B', long)]
    no_bigwig: bool,

    #[arg(short = 'R', long)]
    no_rename: bool,

    #[arg(short, long)]
    bam: bool,

    #[arg(short = 'g', long)]
    bam_glob: Option<String>,

    #[arg(short = 'n', long)]
    dry_run: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<DeliveryError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &DeliveryError) -> u8 {
    match error {
        DeliveryError::NoSelectorProvided
        | DeliveryError::NoMatchingLanes { .. }
        | DeliveryError::FlowcellIdNotFound(_)
        | DeliveryError::MissingAnalysisDirectory(_) => 2,
        DeliveryError::MissingBarcodeDirectory(_)
        | DeliveryError::FastqFilesNotFound { .. }
        | DeliveryError::MalformedFilename(_)
        | DeliveryError::MissingBarcodeMapping { .. }
        | DeliveryError::DuplicateTarget { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };
    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let app = App::new(config);

    match cli.command {
        Commands::Deliver(args) => run_deliver(args, &app, output_mode),
        Commands::Results(args) => run_results(args, &app, output_mode),
    }
}

fn run_deliver(args: DeliverArgs, app: &App, output_mode: OutputMode) -> miette::Result<()> {
    let selector = LaneSelector::from_options(args.project_desc.as_deref(), args.lanes.as_deref())?;
    let options = DeliveryOptions {
        transfer: TransferMode::from_flags(args.move_data, args.symlink)?,
        install_data: args.install_data,
        only_run_info: args.only_run_info,
        customer_delivery: args.customer_delivery,
        naming: NamingOptions {
            sample_prefix: args.sample_prefix,
            barcode_id_to_name: args.barcode_id_to_name,
            barcode_full_names: args.barcode_full_names,
        },
        dry_run: args.dry_run,
    };
    let request = DeliveryRequest {
        flowcell_dir: args.flowcell_dir,
        project_dir: args.project_dir,
        run_info: args.run_info,
        selector,
        flowcell_alias: args.flowcell_alias,
    };

    match output_mode {
        OutputMode::Json => {
            let result = app.deliver(request, &options, &JsonOutput)?;
            JsonOutput::print_delivery(&result).into_diagnostic()
        }
        OutputMode::Text => {
            let result = app.deliver(request, &options, &TextOutput)?;
            TextOutput::print_delivery(&result).into_diagnostic()
        }
    }
}

fn run_results(args: ResultsArgs, app: &App, output_mode: OutputMode) -> miette::Result<()> {
    let analysis_dir = match args.analysis_dir {
        Some(dir) => dir,
        None => Utf8PathBuf::from_path_buf(std::env::current_dir().into_diagnostic()?)
            .map_err(|_| miette::Report::msg("current directory is not valid UTF-8"))?,
    };
    let options = ResultsOptions {
        transfer: TransferMode::from_flags(args.move_data, false)?,
        vcf: !args.no_vcf,
        metrics: !args.no_metrics,
        bigwig: !args.no_bigwig,
        bam: args.bam,
        bam_glob: args
            .bam_glob
            .unwrap_or_else(|| app.config().bam_glob.clone()),
        rename: !args.no_rename,
        dry_run: args.dry_run,
        ..ResultsOptions::new(analysis_dir)
    };

    match output_mode {
        OutputMode::Json => {
            let result =
                app.deliver_results(&args.run_info, &args.delivery_dir, &options, &JsonOutput)?;
            JsonOutput::print_results(&result).into_diagnostic()
        }
        OutputMode::Text => {
            let result =
                app.deliver_results(&args.run_info, &args.delivery_dir, &options, &TextOutput)?;
            TextOutput::print_results(&result).into_diagnostic()
        }
    }
}
