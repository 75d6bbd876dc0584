use anyhow::{Context, Result};
use chrono::DateTime;
use tokio_util::sync::CancellationToken;
use std::env;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use vaultmail::app::Controller;
use vaultmail::cache::ArchiveStore;
use vaultmail::config::{AccountConfig, Config};
use vaultmail::mail::Uid;
use vaultmail::provider::Offline;
use vaultmail::reconcile::{DisplayRecord, ViewMode};
use vaultmail::search::{LocalSearch, SearchFilters};

fn setup_logging() {
    use std::fs::OpenOptions;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,vaultmail=debug"));

    // Try to create a log file in the config directory
    let log_file = Config::config_dir()
        .ok()
        .map(|dir| dir.join("vaultmail.log"))
        .and_then(|path| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .ok()
        });

    if let Some(file) = log_file {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false),
            )
            .init();
    } else {
        // Fallback to stderr if file logging fails
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn print_usage() {
    eprintln!(
        r#"vaultmail - Local-first mail archive

Usage: vaultmail <command> [args]

Commands:
    list [server|local|all] [folder]   Show the reconciled message list
    archived [folder]                  Show archived messages only
    search <query> [folder]            Search archived headers
    archive <uid>[,<uid>...] [folder]  Keep durable copies of messages
    unarchive <uid> [folder]           Drop the archived mark of a message
    forget <uid> [folder]              Remove a cached copy that is not archived
    setup                              Create the configuration file
    help                               Show this help message

Nothing is fetched from the server; lists are built from the local store
and the last saved server listing.

Configuration file: ~/.config/vaultmail/config.toml
"#
    );
}

fn run_setup() -> Result<()> {
    use std::io::{self, Write};

    println!("Vaultmail Setup");
    println!("===============\n");

    let config_path = Config::config_path()?;
    if config_path.exists() {
        print!("Configuration already exists. Overwrite? [y/N]: ");
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Setup cancelled.");
            return Ok(());
        }
    }

    let email = loop {
        print!("Email address: ");
        io::stdout().flush()?;
        let mut email = String::new();
        io::stdin().read_line(&mut email)?;
        let email = email.trim().to_string();

        if let Some((local, domain)) = email.split_once('@')
            && !local.is_empty()
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
        {
            break email;
        }
        println!(
            "Invalid email format. Please enter a valid email address (e.g., user@example.com)"
        );
    };

    print!("Display name (optional): ");
    io::stdout().flush()?;
    let mut display_name = String::new();
    io::stdin().read_line(&mut display_name)?;
    let display_name = Some(display_name.trim().to_string()).filter(|n| !n.is_empty());

    let config = Config {
        accounts: vec![AccountConfig {
            email,
            display_name,
        }],
        default_account: Some(0),
        view: Default::default(),
        cache: Default::default(),
    };

    config.ensure_dirs()?;
    config.save()?;
    println!("Configuration saved to {}", config_path.display());
    Ok(())
}

fn format_date(record: &DisplayRecord) -> String {
    record
        .header
        .timestamp()
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn print_records(records: &[DisplayRecord]) {
    if records.is_empty() {
        println!("(no messages)");
        return;
    }

    for record in records {
        println!(
            "{:>7}  {:<10} {} {:<16}  {:<24}  {}",
            record.header.uid,
            record.source,
            if record.is_archived { "A" } else { " " },
            format_date(record),
            record.header.from.display(),
            record.header.subject
        );
    }
}

fn parse_uid(arg: Option<&String>) -> Result<Uid> {
    let arg = arg.context("Missing message uid")?;
    arg.parse()
        .with_context(|| format!("Invalid message uid: {}", arg))
}

fn parse_uids(arg: Option<&String>) -> Result<Vec<Uid>> {
    let arg = arg.context("Missing message uid")?;
    arg.split(',')
        .map(|part| {
            part.trim()
                .parse()
                .with_context(|| format!("Invalid message uid: {}", part))
        })
        .collect()
}

async fn run_command(command: &str, args: &[String]) -> Result<()> {
    let config = Config::load()?;
    config.ensure_dirs()?;

    let account = config
        .default_account()
        .context("No accounts configured. Run 'vaultmail setup' first.")?;
    let folder_arg = |idx: usize| {
        args.get(idx)
            .cloned()
            .unwrap_or_else(|| config.view.default_folder.clone())
    };

    let store = ArchiveStore::open(&Config::database_path()?).await?;
    let mut controller = Controller::new(
        Offline,
        LocalSearch::new(store.clone()),
        store,
        &config.cache,
        config.view.default_mode,
    );

    match command {
        "list" => {
            let (mode, folder) = match args.first().map(|a| a.parse::<ViewMode>()) {
                Some(Ok(mode)) => (mode, folder_arg(1)),
                _ => (config.view.default_mode, folder_arg(0)),
            };
            controller.open_mailbox(&account.email, &folder).await?;
            controller.set_mode(mode);
            println!(
                "{} / {} ({} view)",
                account.display_name_or_email(),
                folder,
                mode
            );
            print_records(&controller.display());
        }
        "archived" => {
            controller.open_mailbox(&account.email, &folder_arg(0)).await?;
            controller.set_mode(ViewMode::Local);
            print_records(&controller.display());
        }
        "search" => {
            let query = args.first().context("Missing search query")?;
            controller.open_mailbox(&account.email, &folder_arg(1)).await?;
            let hits = controller.search(query, &SearchFilters::default()).await?;
            tracing::debug!("CLI search matched {} messages", hits);
            print_records(&controller.display());
        }
        "archive" => {
            let uids = parse_uids(args.first())?;
            controller.open_mailbox(&account.email, &folder_arg(1)).await?;

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_interrupt.cancel();
                }
            });

            let progress = controller
                .archive_many(&uids, &cancel, |p| {
                    eprint!("\rArchiving {}/{}", p.completed + p.errors, p.total);
                })
                .await;
            eprintln!();

            println!(
                "Archived {} of {} messages, {} failed{}.",
                progress.completed,
                progress.total,
                progress.errors,
                if progress.cancelled { " (interrupted)" } else { "" }
            );
            if let Some(err) = &progress.last_error {
                println!("Last error: {}", err);
            }
        }
        "unarchive" => {
            let uid = parse_uid(args.first())?;
            controller.open_mailbox(&account.email, &folder_arg(1)).await?;
            if controller.unarchive(uid).await? {
                println!("Message {} is no longer archived.", uid);
            } else {
                println!("Message {} was not archived.", uid);
            }
        }
        "forget" => {
            let uid = parse_uid(args.first())?;
            controller.open_mailbox(&account.email, &folder_arg(1)).await?;
            if controller.forget(uid).await? {
                println!("Removed cached copy of message {}.", uid);
            } else {
                println!("Message {} is archived or not cached; nothing removed.", uid);
            }
        }
        other => anyhow::bail!("Unknown command: {}", other),
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        None | Some("help") | Some("--help") | Some("-h") => {
            print_usage();
            Ok(())
        }
        Some("setup") => run_setup(),
        Some(cmd @ ("list" | "archived" | "search" | "archive" | "unarchive" | "forget")) => {
            setup_logging();
            run_command(cmd, &args[2..]).await
        }
        Some(cmd) => {
            eprintln!("Unknown command: {}", cmd);
            print_usage();
            std::process::exit(1);
        }
    }
}
