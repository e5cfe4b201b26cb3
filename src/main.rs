use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use shop_scorecard::config::{Config, ConfigOverrides};
use shop_scorecard::evaluation::history::{record_from_recommendation, summarize_timeline};
use shop_scorecard::evaluation::{
    EvaluationRecord, MissingJobsPolicy, ModuleDeficit, Scorecard, TrainingModule,
};
use shop_scorecard::jobs::assign::{suggest_assignment, AssigneeSuggestion};
use shop_scorecard::metrics::collector::{apply_overrides, MetricOverrides};
use shop_scorecard::metrics::normalize::normalize;
use shop_scorecard::metrics::TechnicianMetrics;
use shop_scorecard::notify::{
    build_sinks, dispatch, event_for_assignment, events_for_recommendation, NotificationEvent,
};
use shop_scorecard::output::csv::{
    history_to_csv, ranking_to_csv, report_to_csv, roster_to_csv, scorecard_to_csv,
    trainings_to_csv,
};
use shop_scorecard::output::json::render_json;
use shop_scorecard::output::table::{
    render_history_table, render_metrics_table, render_ranking_table, render_report_table,
    render_roster_table, render_scorecard_table, render_suggestion_table, render_trainings_table,
};
use shop_scorecard::reports::snapshot::{snapshot_for, TechnicianSnapshot};
use shop_scorecard::reports::{build_report, JobReport, ReportFilter};
use shop_scorecard::roster::{sort_by_display_name, Technician};
use shop_scorecard::server::run_server;
use shop_scorecard::source::export::ExportSource;
use shop_scorecard::source::DashboardSource;
use shop_scorecard::storage::ScorecardStore;
use shop_scorecard::training::{
    assign_training, list_trainings, update_status, TrainingAssignment, TrainingStatus,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Debug, Parser)]
#[command(
    name = "shop-scorecard",
    about = "Technician performance scoring and training recommendations"
)]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// JSON export of the shop's realtime database.
    #[arg(short, long)]
    export: Option<String>,
    #[arg(long)]
    db: Option<String>,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    /// Operator uid recorded on training assignments.
    #[arg(long)]
    operator: Option<String>,
    #[arg(long = "missing-jobs")]
    missing_jobs: Option<MissingJobsPolicy>,
    #[command(flatten)]
    metrics: MetricArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, clap::Args, Clone, Default)]
struct MetricArgs {
    #[arg(long = "available-minutes")]
    available_minutes: Option<u64>,
    #[arg(long = "actual-minutes")]
    actual_minutes: Option<u64>,
    #[arg(long = "billed-minutes")]
    billed_minutes: Option<u64>,
    #[arg(long)]
    efficiency: Option<f64>,
    #[arg(long)]
    productivity: Option<f64>,
    #[arg(long)]
    proficiency: Option<f64>,
    #[arg(long = "avg-rating")]
    avg_rating: Option<f64>,
    #[arg(long = "jobs-completed")]
    jobs_completed: Option<u64>,
}

impl From<MetricArgs> for MetricOverrides {
    fn from(value: MetricArgs) -> Self {
        Self {
            available_minutes: value.available_minutes,
            actual_minutes: value.actual_minutes,
            billed_minutes: value.billed_minutes,
            efficiency: value.efficiency,
            productivity: value.productivity,
            proficiency: value.proficiency,
            avg_rating: value.avg_rating,
            jobs_completed: value.jobs_completed,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Normalize a raw daily snapshot (and optional stats rollup) file.
    Normalize {
        #[arg(long)]
        daily: Option<PathBuf>,
        #[arg(long)]
        fallback: Option<PathBuf>,
    },
    Evaluate {
        #[arg(short, long)]
        technician: Option<String>,
        /// Fill missing minutes and job counts from raw work sessions.
        #[arg(long)]
        sessions: bool,
        #[arg(long)]
        record: bool,
        #[arg(long)]
        notify: bool,
    },
    Rank {
        #[arg(short, long)]
        technician: Option<String>,
    },
    Technicians {
        #[arg(long)]
        search: Option<String>,
        #[arg(long = "sort-by-name")]
        sort_by_name: bool,
    },
    Report {
        #[arg(short, long)]
        technician: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    Assign {
        #[arg(short, long)]
        technician: String,
        #[arg(long = "assigned-by")]
        assigned_by: Option<String>,
    },
    Trainings {
        #[arg(short, long)]
        technician: String,
        /// Assignment id to move to `--status`.
        #[arg(long, requires = "status")]
        update: Option<i64>,
        #[arg(long, requires = "update")]
        status: Option<TrainingStatus>,
    },
    History {
        #[arg(short, long)]
        technician: String,
        #[arg(long, default_value_t = 50)]
        limit: usize,
        #[arg(long)]
        module: Option<TrainingModule>,
    },
    /// Least-loaded technician and booking length for a new job.
    SuggestAssignee {
        #[arg(long)]
        service: Option<String>,
    },
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(Some(&config_path))?;
    config.apply_overrides(ConfigOverrides {
        export_path: cli.export.clone(),
        db_path: cli.db.clone(),
        operator_uid: cli.operator.clone(),
        missing_jobs: cli.missing_jobs,
        infer_from_sessions: matches!(cli.command, Commands::Evaluate { sessions: true, .. })
            .then_some(true),
    });

    if matches!(cli.command, Commands::Config { .. }) {
        return handle_config_command(&cli.command, &config, &config_path);
    }
    if let Commands::Serve { host, port } = &cli.command {
        let host = host.clone().unwrap_or_else(|| config.server.host.clone());
        let port = port.unwrap_or(config.server.port);
        let bind = format!("{host}:{port}");
        let addr: SocketAddr = bind
            .parse()
            .map_err(|e| anyhow!("invalid bind address {bind}: {e}"))?;
        return run_server(config, addr).await;
    }

    let overrides: MetricOverrides = cli.metrics.clone().into();

    match &cli.command {
        Commands::Normalize { daily, fallback } => {
            let daily = daily.as_deref().map(read_json).transpose()?;
            let fallback = fallback.as_deref().map(read_json).transpose()?;
            let mut metrics = normalize(daily.as_ref(), fallback.as_ref());
            apply_overrides(&mut metrics, &overrides);
            print_metrics(&metrics, cli.output)?;
        }
        Commands::Evaluate {
            technician,
            record,
            notify,
            ..
        } => {
            let card = build_scorecard(&config, technician.as_deref(), &overrides).await?;
            if *record {
                let uid = card
                    .technician_uid
                    .as_deref()
                    .context("--record needs --technician")?;
                let store = ScorecardStore::open(&config.resolved_db_path())?;
                store.insert_evaluation(&record_from_recommendation(uid, &card.recommendation))?;
                info!(technician = uid, "evaluation recorded");
            }
            if *notify {
                let events = events_for_recommendation(
                    card.label(),
                    &card.recommendation,
                    &config.notifications.rules,
                );
                send_notifications(&config, &events).await?;
            }
            print_scorecard(&card, cli.output)?;
        }
        Commands::Rank { technician } => {
            let card = build_scorecard(&config, technician.as_deref(), &overrides).await?;
            print_ranking(&card.ranking, cli.output)?;
        }
        Commands::Technicians {
            search,
            sort_by_name,
        } => {
            let source = open_source(&config)?;
            let mut roster = source.technicians().await?;
            if let Some(search) = search.as_deref() {
                roster.retain(|tech| tech.matches_search(search));
            }
            if *sort_by_name {
                sort_by_display_name(&mut roster);
            }
            print_roster(&roster, cli.output)?;
        }
        Commands::Report {
            technician,
            status,
            from,
            to,
        } => {
            let filter = ReportFilter {
                technician: technician.clone(),
                status: status.clone(),
                from: *from,
                to: *to,
            };
            if let (Some(from), Some(to)) = (from, to) {
                if from > to {
                    bail!("--from {from} is after --to {to}");
                }
            }
            let source = open_source(&config)?;
            let jobs = source.jobs().await?;
            let report = build_report(&jobs, &filter);
            let snapshot = snapshot_for(&source, &report).await?;
            print_report(&report, &snapshot, cli.output)?;
        }
        Commands::Assign {
            technician,
            assigned_by,
        } => {
            let card = build_scorecard(&config, Some(technician.as_str()), &overrides).await?;
            let assigned_by = assigned_by
                .clone()
                .unwrap_or_else(|| config.operator.uid.clone());
            let store = ScorecardStore::open(&config.resolved_db_path())?;
            let assignment =
                assign_training(&store, technician, &assigned_by, &card.recommendation)?;
            let events: Vec<NotificationEvent> =
                event_for_assignment(card.label(), &assignment, &config.notifications.rules)
                    .into_iter()
                    .collect();
            send_notifications(&config, &events).await?;
            print_trainings(&[assignment], cli.output)?;
        }
        Commands::Trainings {
            technician,
            update,
            status,
        } => {
            let store = ScorecardStore::open(&config.resolved_db_path())?;
            if let (Some(id), Some(status)) = (update, status) {
                if !update_status(&store, *id, *status)? {
                    warn!(id, "no training assignment with that id");
                }
            }
            let items = list_trainings(&store, technician)?;
            print_trainings(&items, cli.output)?;
        }
        Commands::History {
            technician,
            limit,
            module,
        } => {
            let store = ScorecardStore::open(&config.resolved_db_path())?;
            let records = store.load_evaluations(technician, (*limit).max(1))?;
            let summary = summarize_timeline(&records, *module);
            print_history(&records, &summary, cli.output)?;
        }
        Commands::SuggestAssignee { service } => {
            let source = open_source(&config)?;
            let technicians = source.technicians().await?;
            let jobs = source.jobs().await?;
            let suggestion = suggest_assignment(&technicians, &jobs, service.as_deref());
            print_suggestion(&suggestion, cli.output)?;
        }
        Commands::Serve { .. } | Commands::Config { .. } => {}
    }

    Ok(())
}

fn handle_config_command(command: &Commands, config: &Config, config_path: &Path) -> Result<()> {
    let Commands::Config { init, show } = command else {
        return Ok(());
    };
    if *init {
        Config::write_template(config_path)?;
        println!("Wrote config template to {}", config_path.display());
    }
    if *show || !*init {
        println!("{}", render_json(config)?);
    }
    Ok(())
}

fn read_json(path: &Path) -> Result<Value> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed reading {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn open_source(config: &Config) -> Result<ExportSource> {
    ExportSource::open(&config.resolved_export_path())
}

/// Scorecard for a technician from the export, or for the metric flags
/// alone when no technician is named.
async fn build_scorecard(
    config: &Config,
    technician: Option<&str>,
    overrides: &MetricOverrides,
) -> Result<Scorecard> {
    match technician {
        Some(uid) => {
            let source = open_source(config)?;
            Scorecard::collect(
                &source,
                uid,
                &config.thresholds,
                config.session_inference().as_ref(),
                overrides,
            )
            .await
        }
        None => {
            if overrides.is_empty() {
                bail!("pass --technician or at least one metric flag");
            }
            let mut metrics = TechnicianMetrics::default();
            apply_overrides(&mut metrics, overrides);
            Ok(Scorecard::build(None, None, metrics, &config.thresholds))
        }
    }
}

async fn send_notifications(config: &Config, events: &[NotificationEvent]) -> Result<()> {
    if events.is_empty() {
        return Ok(());
    }
    let sinks = build_sinks(&config.notifications)?;
    dispatch(&sinks, events).await;
    Ok(())
}

fn print_metrics(metrics: &TechnicianMetrics, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_metrics_table(metrics)),
        OutputFormat::Json => println!("{}", render_json(metrics)?),
        OutputFormat::Csv => {
            warn!("CSV output for normalize not implemented, using JSON");
            println!("{}", render_json(metrics)?);
        }
    }
    Ok(())
}

fn print_scorecard(card: &Scorecard, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_scorecard_table(card)),
        OutputFormat::Json => println!("{}", render_json(card)?),
        OutputFormat::Csv => println!("{}", scorecard_to_csv(card)?),
    }
    Ok(())
}

fn print_ranking(ranking: &[ModuleDeficit], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_ranking_table(ranking)),
        OutputFormat::Json => println!("{}", render_json(ranking)?),
        OutputFormat::Csv => println!("{}", ranking_to_csv(ranking)?),
    }
    Ok(())
}

fn print_roster(roster: &[Technician], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_roster_table(roster)),
        OutputFormat::Json => println!("{}", render_json(roster)?),
        OutputFormat::Csv => println!("{}", roster_to_csv(roster)?),
    }
    Ok(())
}

fn print_report(
    report: &JobReport,
    snapshot: &TechnicianSnapshot,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_report_table(report, Some(snapshot))),
        OutputFormat::Json => println!(
            "{}",
            render_json(&serde_json::json!({ "report": report, "snapshot": snapshot }))?
        ),
        OutputFormat::Csv => println!("{}", report_to_csv(report)?),
    }
    Ok(())
}

fn print_trainings(items: &[TrainingAssignment], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_trainings_table(items)),
        OutputFormat::Json => println!("{}", render_json(items)?),
        OutputFormat::Csv => println!("{}", trainings_to_csv(items)?),
    }
    Ok(())
}

fn print_history(records: &[EvaluationRecord], summary: &str, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            println!("{}", render_history_table(records));
            println!("{summary}");
        }
        OutputFormat::Json => println!(
            "{}",
            render_json(&serde_json::json!({ "summary": summary, "records": records }))?
        ),
        OutputFormat::Csv => println!("{}", history_to_csv(records)?),
    }
    Ok(())
}

fn print_suggestion(suggestion: &AssigneeSuggestion, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_suggestion_table(suggestion)),
        OutputFormat::Json => println!("{}", render_json(suggestion)?),
        OutputFormat::Csv => {
            warn!("CSV output for suggest-assignee not implemented, using JSON");
            println!("{}", render_json(suggestion)?);
        }
    }
    Ok(())
}
