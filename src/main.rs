use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};

use landlord_lib::config::{AppConfig, DATA_DIR_ENV};
use landlord_lib::export::inspection::build_report;
use landlord_lib::export::timeline::{portfolio_timeline, PortfolioSnapshot};
use landlord_lib::lifecycle::LifecycleError;
use landlord_lib::model::contractor::Contractor;
use landlord_lib::model::profile::BillingPlan;
use landlord_lib::model::property::{Address, Property, PropertyType};
use landlord_lib::model::tenant::{DepositScheme, Tenant, TenantStatus};
use landlord_lib::mutation::{
    AccessErrorContext, AccessErrorReporter, ConfirmPrompt, Confirmer, MutationPipeline,
    Navigator, Notifier, SubmitError, Toast, ToastTone, UiPorts,
};
use landlord_lib::repo::{contractors, inspections, maintenance, profile, properties, tenants};
use landlord_lib::route::Route;
use landlord_lib::time::DateLike;
use landlord_lib::uploads::{self, FsObjectStore};
use landlord_lib::{OwnerId, SqliteStore};

const EXIT_INVALID: i32 = 2;
const EXIT_DECLINED: i32 = 3;

#[derive(Debug, Parser)]
#[command(name = "landlord", about = "Landlord portfolio manager", version)]
struct Cli {
    /// Owner whose records are read and written.
    #[arg(long)]
    owner: String,
    /// Data directory (database, uploaded images, exports, logs).
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Answer yes to every confirmation prompt.
    #[arg(long, short = 'y')]
    yes: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(subcommand)]
    Property(PropertyCommand),
    #[command(subcommand)]
    Contractor(ContractorCommand),
    #[command(subcommand)]
    Tenant(TenantCommand),
    #[command(subcommand)]
    Export(ExportCommand),
    /// Recent activity across the portfolio, newest first.
    Timeline {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Switch billing plan (Free, Starter, Portfolio).
    Plan { plan: String },
}

#[derive(Debug, Subcommand)]
enum PropertyCommand {
    Add {
        #[arg(long)]
        line1: String,
        #[arg(long)]
        line2: Option<String>,
        #[arg(long)]
        city: String,
        #[arg(long)]
        postcode: String,
        #[arg(long = "type", default_value = "House")]
        property_type: String,
        #[arg(long, default_value_t = 1)]
        bedrooms: u32,
        #[arg(long, default_value_t = 1)]
        bathrooms: u32,
    },
    List {
        /// Show the deleted (archived) list instead.
        #[arg(long)]
        deleted: bool,
    },
    /// Move a property to the deleted list.
    Archive { id: String },
    Restore { id: String },
    /// Permanently delete a property from the deleted list.
    Purge { id: String },
    /// Upload a photo and attach it to the property.
    Image { id: String, file: PathBuf },
}

#[derive(Debug, Subcommand)]
enum ContractorCommand {
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        trade: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        email: Option<String>,
    },
    List {
        #[arg(long)]
        archived: bool,
    },
    Archive { id: String },
}

#[derive(Debug, Subcommand)]
enum TenantCommand {
    Add {
        #[arg(long)]
        property: String,
        #[arg(long)]
        name: String,
        /// Tenancy start, `YYYY-MM-DD`.
        #[arg(long)]
        start: String,
        #[arg(long)]
        rent: f64,
        #[arg(long, default_value = "Active")]
        status: String,
        #[arg(long)]
        deposit: Option<f64>,
        #[arg(long)]
        scheme: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum ExportCommand {
    /// Write an inspection report to the exports directory.
    Inspection {
        #[arg(long)]
        property: String,
        #[arg(long)]
        inspection: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

/// Toasts on stdout, access reports on stderr, prompts on the terminal.
struct TerminalUi {
    assume_yes: bool,
}

impl Notifier for TerminalUi {
    fn notify(&self, toast: Toast) {
        match toast.tone {
            ToastTone::Success => println!("{}. {}", toast.title, toast.description),
            ToastTone::Error => eprintln!("{}: {}", toast.title, toast.description),
        }
    }
}

impl Navigator for TerminalUi {
    fn navigate(&self, route: Route) {
        tracing::debug!(target: "landlord", event = "navigate", path = %route.path());
    }
}

impl AccessErrorReporter for TerminalUi {
    fn report(&self, context: AccessErrorContext) {
        eprintln!(
            "Access denied: {:?} on {}. Check that --owner matches the signed-in account.",
            context.operation, context.path
        );
    }
}

impl Confirmer for TerminalUi {
    fn confirm(&self, prompt: &ConfirmPrompt) -> bool {
        if self.assume_yes {
            return true;
        }
        eprint!("{} {} [{}? y/N] ", prompt.title, prompt.description, prompt.confirm_label);
        let _ = io::stderr().flush();
        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            Err(_) => false,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("Error: {err:#}");
            process::exit(1);
        }
    }
}

fn resolve_config(data_dir: Option<PathBuf>) -> Result<AppConfig> {
    let config = AppConfig::from_lookup(|key| {
        if key == DATA_DIR_ENV {
            if let Some(dir) = &data_dir {
                return Some(dir.display().to_string());
            }
        }
        std::env::var(key).ok()
    })?;
    Ok(config)
}

fn run(cli: Cli) -> Result<i32> {
    let config = resolve_config(cli.data_dir.clone()).context("resolve configuration")?;
    let _log_guard = match landlord_lib::init_file_logging(config.log_json, &config.log_dir()) {
        Ok(guard) => Some(guard),
        Err(err) => {
            landlord_lib::init_logging(config.log_json);
            tracing::warn!(target: "landlord", event = "file_logging_unavailable", error = %err);
            None
        }
    };
    let owner = OwnerId::parse(&cli.owner).ok_or_else(|| anyhow!("--owner must be a non-empty id"))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("start async runtime")?;
    runtime.block_on(async move {
        let store = SqliteStore::open(&config.db_path())
            .await
            .context("open database")?;
        let ui = Arc::new(TerminalUi {
            assume_yes: cli.yes,
        });
        let ports = UiPorts {
            notifier: ui.clone(),
            navigator: ui.clone(),
            reporter: ui.clone(),
            confirmer: ui,
        };
        let pipeline = MutationPipeline::new(store.as_principal(owner.clone()), ports);
        let code = dispatch(&config, &pipeline, &owner, cli.command).await?;
        store.pool().close().await;
        Ok::<i32, anyhow::Error>(code)
    })
}

fn submit_code<T>(result: std::result::Result<T, SubmitError>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(SubmitError::Invalid(errors)) => {
            for field in errors.fields() {
                eprintln!("{field}: {}", errors.get(field).unwrap_or_default());
            }
            EXIT_INVALID
        }
        Err(SubmitError::Declined) => EXIT_DECLINED,
        Err(SubmitError::Rejected(_)) => 1,
    }
}

fn lifecycle_code<T>(result: std::result::Result<T, LifecycleError>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(LifecycleError::Declined) => EXIT_DECLINED,
        Err(LifecycleError::Write(err)) => submit_code::<()>(Err(err)),
        Err(other) => {
            eprintln!("{other}");
            1
        }
    }
}

async fn dispatch(
    config: &AppConfig,
    pipeline: &MutationPipeline<SqliteStore>,
    owner: &OwnerId,
    command: Commands,
) -> Result<i32> {
    match command {
        Commands::Property(cmd) => property_command(config, pipeline, owner, cmd).await,
        Commands::Contractor(cmd) => contractor_command(pipeline, owner, cmd).await,
        Commands::Tenant(TenantCommand::Add {
            property,
            name,
            start,
            rent,
            status,
            deposit,
            scheme,
        }) => {
            let mut tenant = Tenant::new(name, DateLike::Text(start), rent);
            tenant.status = status.parse::<TenantStatus>()?;
            tenant.deposit_amount = deposit;
            tenant.deposit_scheme = scheme.map(|s| s.parse::<DepositScheme>()).transpose()?;
            Ok(submit_code(tenants::assign(pipeline, owner, &property, tenant).await))
        }
        Commands::Export(ExportCommand::Inspection {
            property,
            inspection,
            out,
        }) => {
            let store = pipeline.store();
            let (found_property, found_inspection) = tokio::join!(
                properties::get(store, owner, &property),
                inspections::get(store, owner, &property, &inspection),
            );
            let Some(found_inspection) = found_inspection? else {
                eprintln!("Inspection {inspection} was not found.");
                return Ok(1);
            };
            let found_property = found_property?.map(|record| record.value);
            let artifact = build_report(found_property.as_ref(), &found_inspection.value).render();
            let dir = out.unwrap_or_else(|| config.exports_dir());
            let path = artifact.write_to(&dir).await?;
            println!("{}  sha256:{}", path.display(), artifact.sha256);
            Ok(0)
        }
        Commands::Timeline { limit } => {
            let snapshot = load_portfolio(pipeline.store(), owner).await?;
            for item in portfolio_timeline(&snapshot, limit) {
                println!("{}  {}", item.at.format("%Y-%m-%d"), item.title);
            }
            Ok(0)
        }
        Commands::Plan { plan } => {
            let plan = plan.parse::<BillingPlan>()?;
            Ok(submit_code(profile::select_plan(pipeline, owner, plan).await))
        }
    }
}

async fn property_command(
    config: &AppConfig,
    pipeline: &MutationPipeline<SqliteStore>,
    owner: &OwnerId,
    command: PropertyCommand,
) -> Result<i32> {
    match command {
        PropertyCommand::Add {
            line1,
            line2,
            city,
            postcode,
            property_type,
            bedrooms,
            bathrooms,
        } => {
            let address = Address {
                line1,
                line2,
                city,
                county: None,
                postcode,
            };
            let property = Property::new(address, property_type.parse::<PropertyType>()?, bedrooms, bathrooms);
            let result = properties::create(pipeline, owner, property).await;
            if let Ok(written) = &result {
                println!("{}", written.id());
            }
            Ok(submit_code(result))
        }
        PropertyCommand::List { deleted } => {
            let store = pipeline.store();
            let rows = if deleted {
                properties::list_deleted(store, owner).await?
            } else {
                properties::list_active(store, owner).await?
            };
            for row in rows {
                let open = maintenance::open_maintenance_count(store, owner, &row.id).await?;
                println!(
                    "{}\t{}\t{}\t{} open issues",
                    row.id,
                    row.value.status,
                    row.value.address.one_line(),
                    open
                );
            }
            Ok(0)
        }
        PropertyCommand::Archive { id } => {
            Ok(lifecycle_code(properties::archive(pipeline, owner, &id).await))
        }
        PropertyCommand::Restore { id } => {
            Ok(lifecycle_code(properties::restore(pipeline, owner, &id).await))
        }
        PropertyCommand::Purge { id } => {
            match properties::request_purge(pipeline, owner, &id).await {
                Ok(ticket) => Ok(lifecycle_code(properties::purge(pipeline, ticket).await)),
                Err(err) => Ok(lifecycle_code::<()>(Err(err))),
            }
        }
        PropertyCommand::Image { id, file } => {
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("read {}", file.display()))?;
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let objects = FsObjectStore::new(config.objects_dir(), config.public_base_url.clone());
            let result =
                uploads::upload_property_image(pipeline, &objects, owner, &id, &name, &bytes).await;
            if let Ok(url) = &result {
                println!("{url}");
            }
            Ok(submit_code(result))
        }
    }
}

async fn contractor_command(
    pipeline: &MutationPipeline<SqliteStore>,
    owner: &OwnerId,
    command: ContractorCommand,
) -> Result<i32> {
    match command {
        ContractorCommand::Add {
            name,
            trade,
            phone,
            email,
        } => {
            let mut contractor = Contractor::new(name, trade, phone);
            contractor.email = email;
            let result = contractors::create(pipeline, owner, contractor).await;
            if let Ok(written) = &result {
                println!("{}", written.id());
            }
            Ok(submit_code(result))
        }
        ContractorCommand::List { archived } => {
            let store = pipeline.store();
            let rows = if archived {
                contractors::list_archived(store, owner).await?
            } else {
                contractors::list_active(store, owner).await?
            };
            for row in rows {
                println!("{}\t{}\t{}\t{}", row.id, row.value.name, row.value.trade, row.value.phone);
            }
            Ok(0)
        }
        ContractorCommand::Archive { id } => {
            Ok(lifecycle_code(contractors::archive(pipeline, owner, &id).await))
        }
    }
}

/// Everything the timeline folds, loaded property by property.
async fn load_portfolio(store: &SqliteStore, owner: &OwnerId) -> Result<PortfolioSnapshot> {
    let mut snapshot = PortfolioSnapshot {
        contractors: contractors::list_active(store, owner).await?,
        ..PortfolioSnapshot::default()
    };
    for property in properties::list_active(store, owner).await? {
        let id = property.id;
        let (t, i, m) = tokio::join!(
            tenants::list(store, owner, &id),
            inspections::list(store, owner, &id),
            maintenance::list(store, owner, &id),
        );
        snapshot.tenants.extend(t?.into_iter().map(|r| (id.clone(), r)));
        snapshot.inspections.extend(i?.into_iter().map(|r| (id.clone(), r)));
        snapshot.maintenance.extend(m?.into_iter().map(|r| (id.clone(), r)));
    }
    Ok(snapshot)
}
