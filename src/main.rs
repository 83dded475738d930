use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use tracing_appender::non_blocking::WorkerGuard;
use multichat_core::export::{export_file_name, export_text};
use multichat_core::markup::to_html;
use multichat_core::{
    AttachmentKind, BackendClient, ChatController, Config, LocalStore, MessageRecord, Role,
    StatusLevel,
};

mod app;
mod handler;
mod tui;
mod ui;

use app::App;

#[derive(Parser)]
#[command(name = "multichat")]
#[command(about = "Chat with an AI backend, analyze images and CSV data")]
#[command(version)]
struct Cli {
    /// Backend base URL (overrides MULTICHAT_BASE_URL and the config file)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Directory for chat history, preferences and logs
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one message and print the reply
    Send {
        /// Message text (may be empty when a file is attached)
        #[arg(default_value = "")]
        message: String,
        /// Attach an image
        #[arg(long, conflicts_with = "csv")]
        image: Option<PathBuf>,
        /// Attach a CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Ask the backend to load a CSV file from a URL
    LoadUrl {
        url: String,
    },
    /// Export the conversation
    Export {
        /// Write HTML markup instead of plain text
        #[arg(long)]
        html: bool,
        /// Output path (defaults to chat-export-YYYY-MM-DD.txt)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Clear the conversation locally and on the backend
    Clear,
    /// Print the conversation
    History {
        /// Fetch the backend's copy instead of the local one
        #[arg(long)]
        server: bool,
    },
    /// Show or toggle the color theme
    Theme {
        #[arg(long)]
        toggle: bool,
    },
    /// Show the configuration, or save a new backend URL
    Config {
        #[arg(long)]
        set_base_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load().unwrap_or_else(|e| {
        eprintln!("{} {}", "Ignoring unreadable config:".yellow(), e);
        Config::new()
    });
    if let Some(dir) = cli.data_dir.clone() {
        config.data_dir = Some(dir);
    }
    let base_url = cli.base_url.clone().unwrap_or_else(|| config.base_url());
    let data_dir = config.data_dir()?;

    let store = LocalStore::open(data_dir.join("store"))
        .with_context(|| format!("Failed to open store in {}", data_dir.display()))?;
    let client = BackendClient::new(&base_url);

    let Some(command) = cli.command else {
        // The TUI owns the terminal, so logs go to a file
        let _log_guard = init_file_logging(&config, &data_dir)?;
        tracing::info!(version = env!("CARGO_PKG_VERSION"), base_url = %client.base_url(), "multichat starting");
        let chat = ChatController::open(store)?;
        return run_tui(chat, client).await;
    };

    init_stderr_logging(&config);
    let mut chat = ChatController::open(store)?;

    match command {
        Commands::Send {
            message,
            image,
            csv,
        } => send(&mut chat, &client, &message, image, csv).await?,
        Commands::LoadUrl { url } => load_url(&mut chat, &client, &url).await,
        Commands::Export { html, out } => export(&chat, html, out)?,
        Commands::Clear => {
            chat.clear(&client).await;
            print_status(&chat);
        }
        Commands::History { server } => {
            if server {
                server_history(&chat, &client).await?;
            } else {
                print_history(chat.records());
            }
        }
        Commands::Theme { toggle } => {
            let theme = if toggle { chat.toggle_theme() } else { chat.theme() };
            println!("Theme: {}", theme.as_str().bold());
        }
        Commands::Config { set_base_url } => {
            if let Some(url) = set_base_url {
                Config::save_base_url(&url)?;
                println!("{} {}", "Saved backend URL:".green(), url);
            } else {
                println!("Backend URL: {}", client.base_url().cyan());
                println!("Data dir:    {}", data_dir.display());
                println!("Log level:   {}", config.log_level());
            }
        }
    }

    Ok(())
}

fn env_filter(config: &Config) -> tracing_subscriber::EnvFilter {
    match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match config.log_level().parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: log level '{}' is not a valid tracing filter ({}); falling back to 'info'",
                    config.log_level(),
                    e
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    }
}

fn init_stderr_logging(config: &Config) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Daily rolling log under `<data_dir>/logs`. Keep the guard alive until exit so
/// buffered lines are flushed.
fn init_file_logging(config: &Config, data_dir: &Path) -> Result<WorkerGuard> {
    let log_dir = data_dir.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let appender = tracing_appender::rolling::daily(&log_dir, "multichat.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .init();
    Ok(guard)
}

async fn run_tui(chat: ChatController, client: BackendClient) -> Result<()> {
    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();
    let mut app = App::new(chat, client);

    let result: Result<()> = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;
            if let Some(event) = events.next().await {
                handler::handle_event(&mut app, event).await?;
            }
        }
        Ok(())
    }
    .await;

    tui::restore()?;
    tracing::info!("multichat exiting");
    result
}

async fn send(
    chat: &mut ChatController,
    client: &BackendClient,
    message: &str,
    image: Option<PathBuf>,
    csv: Option<PathBuf>,
) -> Result<()> {
    let attachment = image
        .map(|p| (p, AttachmentKind::Image))
        .or_else(|| csv.map(|p| (p, AttachmentKind::Csv)));
    if let Some((path, kind)) = attachment {
        if chat.attach_path_as(&path, kind).is_err() {
            print_status(chat);
            return Ok(());
        }
    }

    if !chat.send(client, message).await {
        print_status(chat);
        return Ok(());
    }
    print_last_reply(chat.records());
    Ok(())
}

async fn load_url(chat: &mut ChatController, client: &BackendClient, url: &str) {
    let sent = chat.load_csv_url(client, url).await;
    print_status(chat);
    if sent {
        print_last_reply(chat.records());
    }
}

fn export(chat: &ChatController, html: bool, out: Option<PathBuf>) -> Result<()> {
    let (content, default_name) = if html {
        (to_html(chat.records()), "chat-export.html".to_string())
    } else {
        (
            export_text(chat.records()),
            export_file_name(chrono::Local::now().date_naive()),
        )
    };
    let path = out.unwrap_or_else(|| PathBuf::from(default_name));
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("{} {}", "Chat exported to".green(), path.display());
    Ok(())
}

async fn server_history(chat: &ChatController, client: &BackendClient) -> Result<()> {
    let messages = client.history(chat.session()).await?;
    if messages.is_empty() {
        println!("{}", "No messages on the server".dimmed());
        return Ok(());
    }
    for msg in messages {
        let label = if msg.role == "user" {
            "User".bold().cyan()
        } else {
            "AI".bold().yellow()
        };
        match msg.filename {
            Some(name) => println!("{} [{}]", label, name.dimmed()),
            None => println!("{}", label),
        }
        println!("{}\n", msg.content);
    }
    Ok(())
}

fn print_status(chat: &ChatController) {
    let Some(status) = chat.status().last() else {
        return;
    };
    let text = match status.level {
        StatusLevel::Success => status.message.green(),
        StatusLevel::Error => status.message.red(),
        StatusLevel::Warning => status.message.yellow(),
        StatusLevel::Info => status.message.blue(),
    };
    eprintln!("{}", text);
}

fn print_record(record: &MessageRecord) {
    let label = match record.role {
        Role::User => "User".bold().cyan(),
        Role::Bot => "AI".bold().yellow(),
    };
    println!("{} {}", label, record.time_label().dimmed());
    println!("{}\n", record.content);
}

fn print_history(records: &[MessageRecord]) {
    if records.is_empty() {
        println!("{}", "No messages yet".dimmed());
        return;
    }
    for record in records {
        print_record(record);
    }
}

fn print_last_reply(records: &[MessageRecord]) {
    if let Some(record) = records.iter().rev().find(|r| r.role == Role::Bot) {
        print_record(record);
    }
}
