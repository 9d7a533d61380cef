use std::error::Error;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::{Args, Parser, Subcommand};
use engine::{Direction, Engine, MoneyCents, NewTransaction, TransactionUpdate};
use migration::{Migrator, MigratorTrait};
use serde::Serialize;
use settings::{Database, Settings};

mod settings;

type AppResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

#[derive(Parser, Debug)]
#[command(name = "finance")]
#[command(about = "Operate the personal-finance ledger")]
struct Cli {
    /// Settings file, without extension (defaults to `settings`).
    #[arg(long)]
    config: Option<String>,

    /// Owner of the records (also read from `FINANCE_USER`).
    #[arg(long, env = "FINANCE_USER")]
    user: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Origin(Origin),
    Tx(Tx),
    /// Income and expenses of one month.
    Report(ReportArgs),
}

#[derive(Args, Debug)]
struct Origin {
    #[command(subcommand)]
    command: OriginCommand,
}

#[derive(Subcommand, Debug)]
enum OriginCommand {
    Create {
        #[arg(long)]
        name: String,
    },
    List,
    /// Rename an origin or overwrite its total.
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        total: Option<MoneyCents>,
    },
    Delete {
        id: String,
    },
}

#[derive(Args, Debug)]
struct Tx {
    #[command(subcommand)]
    command: TxCommand,
}

#[derive(Subcommand, Debug)]
enum TxCommand {
    Add(TxAddArgs),
    Edit(TxEditArgs),
    Delete { id: String },
    Show { id: String },
    List(TxListArgs),
}

#[derive(Args, Debug)]
struct TxAddArgs {
    #[arg(long)]
    amount: MoneyCents,
    #[arg(long, value_parser = parse_direction)]
    direction: Direction,
    #[arg(long)]
    origin: Option<String>,
    #[arg(long, default_value = "")]
    subject: String,
    #[arg(long, default_value = "")]
    counterparty: String,
    #[arg(long, default_value = "")]
    description: String,
    /// Creation day (YYYY-MM-DD), defaults to now.
    #[arg(long)]
    date: Option<NaiveDate>,
}

#[derive(Args, Debug)]
struct TxEditArgs {
    id: String,
    #[arg(long)]
    amount: Option<MoneyCents>,
    #[arg(long, value_parser = parse_direction)]
    direction: Option<Direction>,
    #[arg(long, conflicts_with = "detach")]
    origin: Option<String>,
    /// Remove the origin reference.
    #[arg(long)]
    detach: bool,
    #[arg(long)]
    subject: Option<String>,
    #[arg(long)]
    counterparty: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    label: Option<String>,
}

#[derive(Args, Debug)]
struct TxListArgs {
    #[arg(long, default_value_t = 1)]
    page: u64,
    /// Page size, defaults to `app.page_size`.
    #[arg(long)]
    limit: Option<u64>,
    #[arg(long, conflicts_with = "subject")]
    year: Option<i32>,
    /// Month 1-12, 0 or absent for the whole year.
    #[arg(long, requires = "year")]
    month: Option<u32>,
    #[arg(long)]
    subject: Option<String>,
    #[arg(long, requires = "subject")]
    counterparty: Option<String>,
}

#[derive(Args, Debug)]
struct ReportArgs {
    #[arg(long)]
    year: i32,
    #[arg(long)]
    month: u32,
}

fn parse_direction(raw: &str) -> Result<Direction, String> {
    Direction::try_from(raw.to_ascii_lowercase().as_str()).map_err(|err| err.to_string())
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();
    let settings = Settings::new(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "finance={level},engine={level}",
            level = settings.app.level
        ))
        .with_writer(std::io::stderr)
        .init();

    let db = parse_database(&settings.database).await?;
    let mut builder = Engine::builder().database(db);
    if let Some(limit) = settings.app.storage_timeout() {
        builder = builder.storage_timeout(limit);
    }
    let engine = builder.build().await?;

    if let Err(err) = run(&engine, &settings, &cli.user, cli.command).await {
        tracing::error!("command failed: {err}");
        return Err(err);
    }
    Ok(())
}

async fn run(engine: &Engine, settings: &Settings, user: &str, command: Command) -> AppResult<()> {
    match command {
        Command::Origin(origin) => match origin.command {
            OriginCommand::Create { name } => print(&engine.new_origin(user, &name).await?),
            OriginCommand::List => print(&engine.origins(user).await?),
            OriginCommand::Update { id, name, total } => print(
                &engine
                    .update_origin(&id, user, name.as_deref(), total)
                    .await?,
            ),
            OriginCommand::Delete { id } => {
                engine.delete_origin(&id, user).await?;
                Ok(())
            }
        },
        Command::Tx(tx) => match tx.command {
            TxCommand::Add(args) => {
                let created_at = args.date.map(start_of_day).unwrap_or_else(Utc::now);
                let mut draft = NewTransaction::new(user, args.amount, args.direction, created_at)
                    .subject(&args.subject, &args.counterparty)
                    .description(&args.description);
                draft.origin_id = args.origin;
                print(&engine.create_transaction(draft).await?)
            }
            TxCommand::Edit(args) => {
                let current = engine.transaction(&args.id, user).await?.transaction;
                let mut update = TransactionUpdate::from(&current);
                if let Some(amount) = args.amount {
                    update.amount = amount;
                }
                if let Some(direction) = args.direction {
                    update.direction = direction;
                }
                if args.detach {
                    update.origin_id = None;
                } else if let Some(origin) = args.origin {
                    update.origin_id = Some(origin);
                }
                if let Some(subject) = args.subject {
                    update.subject = subject;
                }
                if let Some(counterparty) = args.counterparty {
                    update.counterparty = counterparty;
                }
                if let Some(description) = args.description {
                    update.description = description;
                }
                if let Some(label) = args.label {
                    update.created_label = label;
                }
                print(&engine.update_transaction(&args.id, user, update).await?)
            }
            TxCommand::Delete { id } => {
                engine.delete_transaction(&id, user).await?;
                Ok(())
            }
            TxCommand::Show { id } => print(&engine.transaction(&id, user).await?),
            TxCommand::List(args) => {
                let limit = args.limit.unwrap_or(settings.app.page_size);
                let page = if let Some(year) = args.year {
                    engine
                        .transactions_by_date(user, args.page, limit, year, args.month)
                        .await?
                } else if let Some(subject) = args.subject.as_deref() {
                    engine
                        .transactions_by_subject(
                            user,
                            args.page,
                            limit,
                            subject,
                            args.counterparty.as_deref(),
                        )
                        .await?
                } else {
                    engine.transactions_by_user(user, args.page, limit).await?
                };
                print(&page)
            }
        },
        Command::Report(args) => print(&engine.monthly_rollup(user, args.year, args.month).await?),
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn print(value: &impl Serialize) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn parse_database(config: &Database) -> AppResult<sea_orm::DatabaseConnection> {
    let url = match config {
        Database::Memory => String::from("sqlite::memory:"),
        Database::Sqlite { path } => format!("sqlite:{path}?mode=rwc"),
    };

    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}
