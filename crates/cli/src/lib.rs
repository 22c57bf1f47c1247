pub mod bootstrap;
pub mod commands;
pub mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use orderflow_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use rust_decimal::Decimal;

#[derive(Debug, Parser)]
#[command(
    name = "orderflow",
    about = "Purchase-order approval operator CLI",
    long_about = concat!(
        "Create purchase orders, record multi-level approval decisions, and inspect approval ",
        "progress. Every command prints one JSON result on stdout."
    ),
    after_help = concat!(
        "Examples:\n",
        "  orderflow levels 1500\n",
        "  orderflow actor add alice --role admin --level 1\n",
        "  orderflow order create --number PO-1 --description chairs --amount 1500 \\\n",
        "      --requested-by bob\n",
        "  orderflow order decide <ORDER_ID> --actor alice --decision approve\n",
        "  orderflow order update <ORDER_ID> --description \"office chairs\""
    )
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to an orderflow.toml config file")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Override database.url for this invocation")]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and report applied versions")]
    Migrate,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Preview which admin levels an amount requires")]
    Levels {
        #[arg(allow_negative_numbers = true, help = "Order amount, e.g. 1999.99")]
        amount: Decimal,
    },
    #[command(about = "Manage actors who submit and decide orders")]
    Actor {
        #[command(subcommand)]
        command: ActorCommand,
    },
    #[command(about = "Create, decide, and inspect purchase orders")]
    Order {
        #[command(subcommand)]
        command: OrderCommand,
    },
}

#[derive(Debug, Subcommand)]
enum ActorCommand {
    #[command(about = "Register or update an actor")]
    Add {
        id: String,
        #[arg(long, default_value = "standard", help = "standard | admin")]
        role: String,
        #[arg(long, help = "Admin level 1, 2 or 3 (admins only)")]
        level: Option<u8>,
    },
}

#[derive(Debug, Subcommand)]
enum OrderCommand {
    #[command(about = "Submit a new order and create its approval plan")]
    Create {
        #[arg(long)]
        number: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        amount: Decimal,
        #[arg(long)]
        requested_by: String,
    },
    #[command(about = "Record an approve or reject decision at the actor's level")]
    Decide {
        order_id: String,
        #[arg(long)]
        actor: String,
        #[arg(long, help = "approve | reject")]
        decision: String,
        #[arg(long)]
        comments: Option<String>,
    },
    #[command(about = "Replace an order's description")]
    Update {
        order_id: String,
        #[arg(long)]
        description: String,
    },
    #[command(about = "Show approval progress")]
    Status { order_id: String },
    #[command(about = "Show the order with all approval slots")]
    Show { order_id: String },
    #[command(about = "List orders, newest first")]
    List {
        #[arg(long, help = "pending | approved | rejected | cancelled")]
        status: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
    },
    #[command(about = "Delete an order nobody has decided on yet")]
    Delete { order_id: String },
}

impl Cli {
    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config.clone(),
            require_file: self.config.is_some(),
            overrides: ConfigOverrides {
                database_url: self.database_url.clone(),
                ..ConfigOverrides::default()
            },
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = cli.load_options();

    // A broken config is reported by the command itself; logging just stays off.
    if let Ok(config) = AppConfig::load(options.clone()) {
        if let Err(error) = logging::init_logging(&config) {
            eprintln!("{error}");
        }
    }

    let result = dispatch(cli.command, &options);
    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

fn dispatch(command: Command, options: &LoadOptions) -> commands::CommandResult {
    match command {
        Command::Migrate => commands::migrate::run(options),
        Command::Config => commands::config::run(options),
        Command::Levels { amount } => commands::levels::run(amount),
        Command::Actor { command: ActorCommand::Add { id, role, level } } => {
            commands::actor::add(options, &id, &role, level)
        }
        Command::Order { command } => match command {
            OrderCommand::Create { number, description, amount, requested_by } => {
                commands::order::create(options, &number, &description, amount, &requested_by)
            }
            OrderCommand::Decide { order_id, actor, decision, comments } => {
                commands::order::decide(options, &order_id, &actor, &decision, comments)
            }
            OrderCommand::Update { order_id, description } => {
                commands::order::update(options, &order_id, &description)
            }
            OrderCommand::Status { order_id } => commands::order::status(options, &order_id),
            OrderCommand::Show { order_id } => commands::order::show(options, &order_id),
            OrderCommand::List { status, limit } => {
                commands::order::list(options, status.as_deref(), limit)
            }
            OrderCommand::Delete { order_id } => commands::order::delete(options, &order_id),
        },
    }
}
