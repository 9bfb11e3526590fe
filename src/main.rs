use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use goal_driven_test::browser::chrome::normalize_url;
use goal_driven_test::browser::{find_device, DEFAULT_DEVICE, KNOWN_DEVICES};
use goal_driven_test::config::DEFAULT_MAX_STEPS;
use goal_driven_test::oracle::Oracle;
use goal_driven_test::{
    AgentConfig, BrowserKind, ChromeDriver, FailureKind, GoalSession, LaunchOptions, OpenAiOracle,
    OracleConfig, PlaybackOracle, SettleConfig, Termination, TraceWriter, Viewport,
};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Goal-driven website testing with a vision oracle", long_about = None)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// List the devices that can be emulated
    #[arg(short, long)]
    list: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open <url> and work towards <goal>
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Starting URL
    url: String,

    /// Goal in plain language, e.g. "Find the opening hours of the library"
    goal: String,

    #[arg(short, long, value_enum, default_value_t = BrowserKind::Chrome)]
    browser: BrowserKind,

    /// The maximum number of steps to take
    #[arg(short, long, default_value_t = DEFAULT_MAX_STEPS)]
    max_steps: usize,

    /// Directory for screenshots and trace.json
    #[arg(short, long, default_value = "./goal-driven-test-output")]
    output: PathBuf,

    /// Replay the oracle answers recorded in this file
    #[arg(long)]
    playback: Option<PathBuf>,

    /// Save the dialogue to this file for later playback
    #[arg(long)]
    store: Option<PathBuf>,

    /// Show the browser window
    #[arg(long)]
    no_headless: bool,

    /// Disable the Chrome sandbox (needed in most containers)
    #[arg(long)]
    no_sandbox: bool,

    /// Path to the Chrome executable
    #[arg(long)]
    chrome_path: Option<String>,

    /// Attach to a Chrome already listening on this debug port
    #[arg(long)]
    debug_port: Option<u16>,

    /// Fixed settle delay after navigation and actions, in milliseconds
    #[arg(long, default_value_t = 4000)]
    settle_ms: u64,

    /// Wait for the page to go idle instead of a fixed delay (settle-ms becomes the timeout)
    #[arg(long)]
    idle: bool,

    /// Device to emulate (see --list)
    #[arg(short, long, default_value = DEFAULT_DEVICE)]
    emulate: String,

    /// Plain viewport size as WIDTHxHEIGHT instead of device emulation
    #[arg(long, value_parser = parse_viewport)]
    viewport: Option<Viewport>,

    /// Send desktop browser headers for sites that block headless browsers
    #[arg(long)]
    stealth: bool,

    /// Oracle timeout in seconds
    #[arg(long, default_value_t = 120)]
    oracle_timeout: u64,
}

fn parse_viewport(value: &str) -> Result<Viewport, String> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", value))?;
    let width = width.trim().parse::<u32>().map_err(|e| format!("invalid width: {}", e))?;
    let height = height.trim().parse::<u32>().map_err(|e| format!("invalid height: {}", e))?;
    if width == 0 || height == 0 {
        return Err("viewport dimensions must be positive".to_string());
    }
    Ok(Viewport::new(width, height))
}

impl RunArgs {
    fn agent_config(&self) -> anyhow::Result<AgentConfig> {
        let mut config = AgentConfig::new(normalize_url(&self.url), &self.goal);
        match self.viewport {
            Some(viewport) => config.viewport = viewport,
            None => {
                let device = find_device(&self.emulate).with_context(|| {
                    format!("Device '{}' not found, see --list", self.emulate)
                })?;
                config = config.with_device(*device);
            }
        }
        config.max_steps = self.max_steps;
        config.oracle_timeout = Duration::from_secs(self.oracle_timeout);
        config.output_dir = self.output.clone();
        config.settle = if self.idle {
            SettleConfig::IdleDetection {
                poll_interval: Duration::from_millis(250),
                quiet_period: Duration::from_millis(1000),
                timeout: Duration::from_millis(self.settle_ms),
            }
        } else {
            SettleConfig::FixedDelay(Duration::from_millis(self.settle_ms))
        };
        config.store_history = match (&self.store, &self.playback) {
            (Some(store), Some(playback)) if store == playback => {
                log::info!("Store path equals playback path, not overwriting the recording");
                None
            }
            (store, _) => store.clone(),
        };
        Ok(config)
    }

    fn launch_options(&self) -> LaunchOptions {
        let defaults = LaunchOptions::default();
        LaunchOptions {
            browser: self.browser,
            headless: !self.no_headless,
            no_sandbox: self.no_sandbox || defaults.no_sandbox,
            chrome_path: self.chrome_path.clone(),
            debug_port: self.debug_port,
            stealth: self.stealth,
        }
    }

    fn oracle(&self) -> anyhow::Result<Box<dyn Oracle>> {
        let oracle: Box<dyn Oracle> = match &self.playback {
            Some(path) => Box::new(
                PlaybackOracle::from_file(path)
                    .with_context(|| format!("Failed to read playback file {}", path.display()))?,
            ),
            None => Box::new(OpenAiOracle::new(OracleConfig::from_env()?)?),
        };
        Ok(oracle)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if cli.list {
        println!("Possible devices to emulate:");
        for device in KNOWN_DEVICES {
            println!("{}", device.name);
        }
        return Ok(());
    }

    let Some(Command::Run(args)) = cli.command else {
        anyhow::bail!("No command given, see --help");
    };
    let termination = run(&args).await?;

    match &termination {
        Termination::Achieved { steps } => {
            println!("Goal achieved in {} {}!", steps, if *steps == 1 { "step" } else { "steps" });
        }
        Termination::MaxStepsReached { steps } => {
            println!("Maximum number of steps ({}) reached.", steps);
        }
        Termination::Failed { kind, message } => {
            eprintln!("Failed ({}): {}", kind, message);
            std::process::exit(1);
        }
    }

    Ok(())
}

async fn run(args: &RunArgs) -> anyhow::Result<Termination> {
    let config = args.agent_config()?;
    let oracle = args.oracle()?;
    let trace = TraceWriter::new(&config.output_dir)
        .with_context(|| format!("Failed to create output directory {}", config.output_dir.display()))?;

    log::info!("Launching {:?}...", args.browser);
    let browser = match ChromeDriver::launch(&args.launch_options()).await {
        Ok(browser) => browser,
        Err(e) => {
            log::error!("Failed to open browser: {}", e);
            return Ok(Termination::Failed {
                kind: FailureKind::DriverError,
                message: e.to_string(),
            });
        }
    };

    let outcome = GoalSession::new(config, Box::new(browser), oracle)
        .with_trace_writer(trace)
        .run()
        .await;

    log::info!(
        "Trace with {} step(s) written to {}",
        outcome.trajectory.len(),
        args.output.display()
    );
    Ok(outcome.termination)
}
