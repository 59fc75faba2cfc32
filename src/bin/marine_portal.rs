use std::fs::{self, File};
use std::process::ExitCode;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use marine_portal::access::{Decision, RequestStatus};
use marine_portal::app::Portal;
use marine_portal::assembler::{BatchMetadata, SingleEntry};
use marine_portal::catalog::ExportCategory;
use marine_portal::config::{ConfigLoader, ResolvedConfig, StorageConfig};
use marine_portal::domain::{
    Clock, Email, FieldValue, Profession, Record, RequestContext, Role, SystemClock,
};
use marine_portal::error::PortalError;
use marine_portal::export::ExportRequest;
use marine_portal::notify::LogNotifier;
use marine_portal::output::{JsonOutput, LogProgress};
use marine_portal::postgrest::PostgrestStorage;
use marine_portal::regions::{self, RegionSelection};
use marine_portal::research::ResearchDraft;
use marine_portal::storage::{FileStorage, MemoryStorage, Storage};

type CliPortal = Portal<Arc<dyn Storage>, LogNotifier, SystemClock>;

#[derive(Parser)]
#[command(name = "marine-portal")]
#[command(about = "Coastal water-quality data portal")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    #[arg(long, global = true, help = "Email of the person issuing the command")]
    email: Option<String>,

    #[arg(long, global = true)]
    name: Option<String>,

    #[arg(long, global = true, value_enum, default_value_t = Role::User)]
    role: Role,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(subcommand, about = "Add, upload, list and manage observation records")]
    Record(RecordCommand),
    #[command(about = "Export one region's data as CSV (requires approved access)")]
    Export(ExportArgs),
    #[command(subcommand, about = "Request data access and review requests")]
    Access(AccessCommand),
    #[command(about = "List regions with stored data")]
    Regions(RegionsArgs),
    #[command(subcommand, about = "Publish and list research papers and news")]
    Research(ResearchCommand),
}

#[derive(Subcommand)]
enum RecordCommand {
    #[command(about = "Submit one observation")]
    Add(AddArgs),
    #[command(about = "Upload a CSV sheet of observations")]
    Upload(UploadArgs),
    #[command(about = "Print every stored observation")]
    List,
    #[command(about = "Delete observations by id (admin)")]
    Delete { ids: Vec<i64> },
    #[command(about = "Reset coordinates from region names (admin)")]
    RepairCoords,
}

#[derive(Args, Clone)]
struct LocationArgs {
    #[arg(long)]
    state: String,

    #[arg(long)]
    coast: String,

    #[arg(long, help = "Region name when the coast or state is \"Other\"")]
    custom: Option<String>,

    #[arg(long, default_value = "")]
    spot: String,

    #[arg(long, value_enum, default_value_t = Profession::Other)]
    profession: Profession,

    #[arg(long, default_value = "")]
    designation: String,
}

impl LocationArgs {
    fn region(&self) -> RegionSelection {
        let selection = RegionSelection::new(&self.state, &self.coast);
        match &self.custom {
            Some(custom) => selection.with_custom(custom),
            None => selection,
        }
    }
}

#[derive(Args)]
struct AddArgs {
    #[command(flatten)]
    location: LocationArgs,

    #[arg(long)]
    lat: Option<f64>,

    #[arg(long)]
    lon: Option<f64>,

    #[arg(long)]
    date: Option<NaiveDate>,

    #[arg(long)]
    time: Option<NaiveTime>,

    #[arg(long = "value", value_parser = parse_measurement, help = "Measurement as KEY=VALUE, e.g. Water_Temp=28.4")]
    values: Vec<(String, FieldValue)>,
}

#[derive(Args)]
struct UploadArgs {
    file: String,

    #[command(flatten)]
    location: LocationArgs,

    #[arg(long)]
    lat: Option<f64>,

    #[arg(long)]
    lon: Option<f64>,
}

#[derive(Args)]
struct ExportArgs {
    #[arg(long)]
    region: String,

    #[arg(long = "category", help = "Category name such as \"Physical Parameters\"; repeatable")]
    categories: Vec<ExportCategory>,

    #[arg(long, help = "Output path; defaults to NCCR_<region>_Data.csv")]
    out: Option<String>,
}

#[derive(Subcommand)]
enum AccessCommand {
    #[command(about = "Ask an admin for data access")]
    Request {
        #[arg(long)]
        purpose: String,
    },
    #[command(about = "Show the status of your latest request")]
    Status,
    #[command(about = "List pending requests (admin)")]
    Pending,
    #[command(about = "Approve a pending request (admin)")]
    Approve { id: i64 },
    #[command(about = "Reject a pending request (admin)")]
    Reject { id: i64 },
    #[command(about = "Overwrite a request's status (admin)")]
    SetStatus { id: i64, status: RequestStatus },
}

#[derive(Args)]
struct RegionsArgs {
    #[arg(long)]
    state: Option<String>,

    #[arg(long, help = "Report which coastal segments have coordinates instead")]
    coverage: bool,
}

#[derive(Subcommand)]
enum ResearchCommand {
    #[command(about = "Publish a paper or news item")]
    Publish {
        #[arg(long)]
        title: String,

        #[arg(long, default_value = "")]
        summary: String,

        #[arg(long)]
        attach: Option<String>,
    },
    #[command(about = "List published items, newest first")]
    List,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<PortalError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &PortalError) -> u8 {
    match error {
        PortalError::RequestNotFound(_) | PortalError::AccessNotGranted { .. } => 2,
        PortalError::StorageHttp(_)
        | PortalError::StorageStatus { .. }
        | PortalError::Storage(_)
        | PortalError::Filesystem(_)
        | PortalError::UnreadableUpload { .. }
        | PortalError::UnsupportedUpload(_)
        | PortalError::Notification(_)
        | PortalError::Certificate(_)
        | PortalError::ConfigRead(_)
        | PortalError::ConfigParse(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let portal = build_portal(config)?;

    match &cli.command {
        Commands::Record(command) => run_record(&cli, command, &portal),
        Commands::Export(args) => run_export(&cli, args, &portal),
        Commands::Access(command) => run_access(&cli, command, &portal),
        Commands::Regions(args) => run_regions(args, &portal),
        Commands::Research(command) => run_research(&cli, command, &portal),
    }
}

fn build_portal(config: ResolvedConfig) -> Result<CliPortal, PortalError> {
    let storage: Arc<dyn Storage> = match &config.storage {
        StorageConfig::File { path: Some(path) } => {
            Arc::new(FileStorage::new_with_root(path.clone()))
        }
        StorageConfig::File { path: None } => Arc::new(FileStorage::new()?),
        StorageConfig::Postgrest { url, api_key } => Arc::new(PostgrestStorage::new(url, api_key)?),
        StorageConfig::Memory => Arc::new(MemoryStorage::new()),
    };
    Ok(Portal::new(storage, LogNotifier, SystemClock, config))
}

fn context(cli: &Cli) -> miette::Result<RequestContext> {
    let email: Email = cli
        .email
        .as_deref()
        .ok_or_else(|| miette::Report::msg("this command needs --email"))?
        .parse()?;
    let name = cli
        .name
        .clone()
        .unwrap_or_else(|| email.as_str().split('@').next().unwrap_or_default().to_string());
    Ok(RequestContext::new(name, email, cli.role))
}

fn parse_measurement(raw: &str) -> Result<(String, FieldValue), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {raw}"))?;
    Ok((key.trim().to_string(), FieldValue::from_cell(value)))
}

fn run_record(cli: &Cli, command: &RecordCommand, portal: &CliPortal) -> miette::Result<()> {
    match command {
        RecordCommand::Add(args) => {
            let ctx = context(cli)?;
            let region = args.location.region();
            let (default_lat, default_lon) = region.default_coords();
            let now = SystemClock.now();
            let entry = SingleEntry {
                region,
                spot: args.location.spot.clone(),
                latitude: args.lat.unwrap_or(default_lat),
                longitude: args.lon.unwrap_or(default_lon),
                profession: args.location.profession,
                designation: args.location.designation.clone(),
                date: args.date.unwrap_or(now.date()),
                time: args.time.unwrap_or(now.time()),
                measurements: args.values.iter().cloned().collect::<Record>(),
            };
            let result = portal.submit_entry(&ctx, &entry)?;
            if let Some(certificate) = &result.certificate {
                let config = portal.config();
                match certificate.render_pdf(
                    &config.certificate_font_dir,
                    &config.certificate_font_family,
                ) {
                    Ok(pdf) => fs::write(certificate.file_name(), pdf).into_diagnostic()?,
                    Err(err) => tracing::warn!(error = %err, "certificate not written"),
                }
            }
            JsonOutput::print(&result).into_diagnostic()
        }
        RecordCommand::Upload(args) => {
            let ctx = context(cli)?;
            let batch = BatchMetadata {
                region: args.location.region(),
                spot: args.location.spot.clone(),
                latitude: args.lat,
                longitude: args.lon,
                profession: args.location.profession,
                designation: args.location.designation.clone(),
            };
            let file = File::open(&args.file).into_diagnostic()?;
            let report = portal.upload_bulk(&ctx, &batch, &args.file, file, &LogProgress)?;
            JsonOutput::print(&report).into_diagnostic()?;
            match report.failure {
                Some(failure) => Err(PortalError::Storage(failure).into()),
                None => Ok(()),
            }
        }
        RecordCommand::List => {
            let records = portal.fetch_dataset()?.records();
            JsonOutput::print(&records).into_diagnostic()
        }
        RecordCommand::Delete { ids } => {
            let result = portal.delete_records(&context(cli)?, ids)?;
            JsonOutput::print(&result).into_diagnostic()
        }
        RecordCommand::RepairCoords => {
            let report = portal.repair_coordinates(&context(cli)?)?;
            JsonOutput::print(&report).into_diagnostic()
        }
    }
}

fn run_export(cli: &Cli, args: &ExportArgs, portal: &CliPortal) -> miette::Result<()> {
    let ctx = context(cli)?;
    let request = ExportRequest::new(&args.region, args.categories.clone());
    let result = portal.export(&ctx, &request)?;
    let path = args.out.clone().unwrap_or_else(|| result.file_name.clone());
    let file = File::create(&path).into_diagnostic()?;
    result.table.write_csv(file)?;
    JsonOutput::print(&result).into_diagnostic()
}

fn run_access(cli: &Cli, command: &AccessCommand, portal: &CliPortal) -> miette::Result<()> {
    let ctx = context(cli)?;
    match command {
        AccessCommand::Request { purpose } => {
            let result = portal.request_access(&ctx, purpose)?;
            JsonOutput::print(&result).into_diagnostic()
        }
        AccessCommand::Status => {
            let result = portal.access_status(&ctx.email)?;
            JsonOutput::print(&result).into_diagnostic()
        }
        AccessCommand::Pending => {
            let pending = portal.pending_requests(&ctx)?;
            JsonOutput::print(&pending).into_diagnostic()
        }
        AccessCommand::Approve { id } => {
            let result = portal.decide_request(&ctx, *id, Decision::Approve)?;
            JsonOutput::print(&result).into_diagnostic()
        }
        AccessCommand::Reject { id } => {
            let result = portal.decide_request(&ctx, *id, Decision::Reject)?;
            JsonOutput::print(&result).into_diagnostic()
        }
        AccessCommand::SetStatus { id, status } => {
            let request = portal.override_status(&ctx, *id, *status)?;
            JsonOutput::print(&request).into_diagnostic()
        }
    }
}

fn run_regions(args: &RegionsArgs, portal: &CliPortal) -> miette::Result<()> {
    if args.coverage {
        return JsonOutput::print(&regions::coverage()).into_diagnostic();
    }
    let regions = portal.regions_with_data(args.state.as_deref())?;
    JsonOutput::print(&regions).into_diagnostic()
}

fn run_research(cli: &Cli, command: &ResearchCommand, portal: &CliPortal) -> miette::Result<()> {
    match command {
        ResearchCommand::Publish {
            title,
            summary,
            attach,
        } => {
            let ctx = context(cli)?;
            let mut draft = ResearchDraft::new(title, summary);
            if let Some(path) = attach {
                let bytes = fs::read(path).into_diagnostic()?;
                let file_name = std::path::Path::new(path)
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.clone());
                draft = draft.with_attachment(file_name, bytes);
            }
            let item = portal.publish_research(&ctx, &draft)?;
            JsonOutput::print(&item).into_diagnostic()
        }
        ResearchCommand::List => {
            let items = portal.research_items()?;
            JsonOutput::print(&items).into_diagnostic()
        }
    }
}
