use std::{
    fs,
    io,
    path::PathBuf,
    thread,
    time::{Duration, Instant},
};

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use typewriter_core::{
    ManualFrames, MemoryBackend, Script, Session, Speed, Strings, TypewriterConfig, TypewriterError,
};

mod painter;

use painter::Painter;

const CONTAINER: &str = "#typewriter";
const FRAME_INTERVAL: Duration = Duration::from_millis(16);

fn main() -> typewriter_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play(args) => run_play(args),
        Commands::DefaultConfig => print_default_config(),
    }
}

fn run_play(args: PlayArgs) -> typewriter_core::Result<()> {
    let config = args.resolve_config()?;
    tracing::info!(config = ?args.config, script = ?args.script, looping = config.looping, "starting typewriter");

    let mut backend = MemoryBackend::new();
    backend.add_container(CONTAINER);
    let cursor_class = config.cursor_class_name.clone();
    let mut session = Session::new(backend, ManualFrames::new(), CONTAINER, config)?;

    match &args.script {
        Some(path) => Script::from_json_str(&fs::read_to_string(path)?)?.apply(&mut session)?,
        None if session.options().strings.is_empty() => {
            return Err(TypewriterError::msg("nothing to type: pass strings, --config or --script"));
        }
        None => {
            session.type_out_all_strings();
        }
    }
    session.start();

    let mut painter = Painter::new(io::stdout(), cursor_class);
    let deadline = args.duration.map(Duration::from_secs_f64);
    let started = Instant::now();

    loop {
        let elapsed = started.elapsed();
        if deadline.is_some_and(|deadline| elapsed >= deadline) {
            session.stop();
            break;
        }

        session.tick(elapsed.as_millis() as u64)?;
        painter.paint(session.backend(), session.elements().container)?;

        if !session.is_scheduled() {
            break;
        }
        thread::sleep(FRAME_INTERVAL);
    }

    painter.finish()?;
    tracing::info!(elapsed = ?started.elapsed(), "typewriter finished");
    Ok(())
}

fn print_default_config() -> typewriter_core::Result<()> {
    println!("{}", TypewriterConfig::default().to_json_pretty()?);
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Typewriter effect for the terminal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Type out strings (or a script) in the terminal.
    Play(PlayArgs),
    /// Print the default configuration as JSON.
    DefaultConfig,
}

#[derive(Args, Debug)]
struct PlayArgs {
    /// Strings to cycle through. Inline markup such as `<b>` is honoured.
    strings: Vec<String>,
    /// JSON configuration file; flags override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// JSON script of steps to run instead of the configured strings.
    #[arg(short, long)]
    script: Option<PathBuf>,
    /// Typing delay: `natural` or milliseconds.
    #[arg(long)]
    delay: Option<Speed>,
    /// Deleting speed: `natural` or milliseconds.
    #[arg(long)]
    delete_speed: Option<Speed>,
    /// Pause after each string, in milliseconds.
    #[arg(long)]
    pause_for: Option<u64>,
    #[arg(long)]
    cursor: Option<String>,
    /// Replay everything once the queue empties.
    #[arg(short, long = "loop")]
    looping: bool,
    /// Log every executed operation.
    #[arg(long)]
    dev_mode: bool,
    /// Do not blink the cursor.
    #[arg(long)]
    no_blink: bool,
    /// Stop after this many seconds.
    #[arg(short, long)]
    duration: Option<f64>,
}

impl PlayArgs {
    fn resolve_config(&self) -> typewriter_core::Result<TypewriterConfig> {
        let mut config = match &self.config {
            Some(path) => TypewriterConfig::from_json_str(&fs::read_to_string(path)?)?,
            None => TypewriterConfig::default(),
        };

        match self.strings.as_slice() {
            [] => {}
            [single] => config.strings = Strings::from(single.clone()),
            many => config.strings = Strings::from(many.to_vec()),
        }
        if let Some(delay) = self.delay {
            config.delay = delay;
        }
        if let Some(delete_speed) = self.delete_speed {
            config.delete_speed = delete_speed;
        }
        if let Some(pause_for) = self.pause_for {
            config.pause_for = pause_for;
        }
        if let Some(cursor) = &self.cursor {
            config.cursor = cursor.clone();
        }
        config.looping |= self.looping;
        config.dev_mode |= self.dev_mode;
        config.skip_add_styles |= self.no_blink;
        // The host drives the session itself.
        config.auto_start = false;

        Ok(config)
    }
}
