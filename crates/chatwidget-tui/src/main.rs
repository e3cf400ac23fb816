use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use chatwidget_core::{voice, Config, HttpEndpoint, PayloadEncoding, Widget};
use clap::{Parser, Subcommand};

mod app;
mod handler;
mod logging;
mod tui;
mod ui;

use app::App;
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "chatwidget")]
#[command(about = "Terminal chat widget for a conversational backend", version)]
struct Cli {
    /// Chat endpoint URL
    #[arg(long)]
    url: Option<String>,

    /// Send `prompt=<text>` form bodies instead of JSON
    #[arg(long)]
    form: bool,

    /// Site identifier sent with JSON bodies
    #[arg(long)]
    project_name: Option<String>,

    /// Config file (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Disable voice input and read-aloud
    #[arg(long)]
    no_voice: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one message and print the reply
    Ask {
        /// Message text
        message: String,
    },
    /// Write the config file with flag overrides applied
    Init,
}

impl Cli {
    fn config_path(&self) -> Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => Config::get_config_path(),
        }
    }

    /// File, then environment, then flags
    fn resolve_config(&self) -> Result<Config> {
        self.resolve(true)
    }

    /// File and flags only, so environment secrets never end up on disk
    fn persistable_config(&self) -> Result<Config> {
        self.resolve(false)
    }

    fn resolve(&self, with_env: bool) -> Result<Config> {
        let mut config = Config::load_from(&self.config_path()?)?;
        if with_env {
            config.apply_env();
        }

        if let Some(url) = &self.url {
            config.endpoint.url = url.clone();
        }
        if self.form {
            config.endpoint.encoding = PayloadEncoding::Form;
        } else if let Some(project_name) = &self.project_name {
            config.endpoint.encoding = PayloadEncoding::Json {
                project_name: project_name.clone(),
            };
        }
        if self.no_voice {
            config.speech.enabled = false;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Ask { ref message }) => ask(cli.resolve_config()?, message).await,
        Some(Commands::Init) => init_config(&cli.persistable_config()?, cli.config_path()?),
        None => run_tui(cli.resolve_config()?).await,
    }
}

async fn ask(config: Config, message: &str) -> Result<()> {
    logging::init_stderr(config.log_level.as_deref())?;

    let endpoint = HttpEndpoint::new(config.endpoint.clone());
    let mut widget = Widget::new(config.admin_key);

    if !widget.send(message, &endpoint).await {
        bail!("Nothing to send: the message is empty");
    }

    if let Some(reply) = widget.messages().last() {
        println!("{}", reply.text);
    }
    Ok(())
}

fn init_config(config: &Config, path: PathBuf) -> Result<()> {
    config.save_to(&path)?;
    println!("Wrote configuration to {}", path.display());
    Ok(())
}

async fn run_tui(config: Config) -> Result<()> {
    let (log_path, _log_guard) = logging::init_file(config.log_level.as_deref())?;
    tracing::info!(url = %config.endpoint.url, "starting chat widget");

    // Kept alive here so the voice receiver never reports a closed channel
    let (voice_tx, mut voice_rx) = voice::channel();
    let (recognizer, synthesizer) = config.speech.backends(voice_tx.clone());
    let widget = Widget::new(config.admin_key.clone()).with_voice(recognizer, synthesizer);

    let endpoint = HttpEndpoint::new(config.endpoint.clone());
    let mut app = App::new(widget, Arc::new(endpoint), config.endpoint.clone());
    app.log_path = Some(log_path);

    tui::install_panic_hook();
    let (mut terminal, key_releases) = tui::init()?;
    app.hold_to_record = key_releases;

    let mut events = EventHandler::new();

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;

            tokio::select! {
                event = events.next() => match event {
                    Some(event) => handler::handle_event(&mut app, event).await?,
                    None => break,
                },
                Some(event) = voice_rx.recv() => app.handle_voice_event(event),
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    tui::restore()?;
    drop(voice_tx);
    tracing::info!("chat widget closed");
    result
}
