use clap::Parser;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "calcpilot-runner")]
#[command(about = "Run calculator scripts against a desktop calculator")]
#[command(version)]
struct Cli {
    /// Script file to run
    script: PathBuf,

    /// Interface map JSON (overrides the script's session)
    #[arg(long)]
    map: Option<PathBuf>,

    /// X display to use (overrides the script's session)
    #[arg(long)]
    display: Option<String>,

    /// Set a parameter (can be used multiple times)
    #[arg(short = 'P', long = "param", value_name = "KEY=VALUE")]
    params: Vec<String>,

    /// Verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Validate script without running
    #[arg(long)]
    check: bool,

    /// Quiet mode (only errors)
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> calcpilot_runner::Result<()> {
    let cli = Cli::parse();

    let level = if cli.quiet {
        Level::ERROR
    } else {
        match cli.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            _ => Level::DEBUG,
        }
    };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    let params = calcpilot_runner::Params::from_args(&cli.params)?;
    let mut script = calcpilot_runner::Script::load_with_params(&cli.script, &params)?;

    if let Some(map) = cli.map {
        script.session.interface_map.path = map;
    }
    if let Some(display) = cli.display {
        script.session.app.display = Some(display);
    }

    if cli.check {
        println!("Script valid: {}", script.name);
        println!("  App: {} ({})", script.session.app.name, script.session.app.launch);
        println!("  Map: {}", script.session.interface_map.path.display());
        println!("  Steps: {}", script.steps.len());
        for (i, step) in script.steps.iter().enumerate() {
            println!("    {}. {}", i + 1, step);
        }
        if !script.params.is_empty() {
            println!("  Parameters: {}", script.params.len());
            for (name, def) in &script.params {
                let req = if def.required { " (required)" } else { "" };
                let desc = def.description.as_deref().unwrap_or("");
                println!("    - {}{}: {}", name, req, desc);
            }
        }
        let (attempts, _) = script.retry_policy();
        if attempts > 1 {
            println!("  Retry attempts: {}", attempts);
        }
        return Ok(());
    }

    println!("Running: {}", script.name);

    let mut runner = calcpilot_runner::Runner::xdotool(&script)?;
    let result = runner.run(&script).await;

    println!();
    if result.success {
        println!("✓ Success");
    } else {
        println!("✗ Failed");
        if let Some(ref error) = result.error {
            println!("  Error: {}", error);
        }
    }
    println!("  Steps: {}/{}", result.steps_executed, script.steps.len());
    println!("  Clicks: {}", result.clicks);
    if let Some(window) = runner.session().window() {
        println!("  Window: {} \"{}\"", window.id, window.title);
    }
    println!("  Duration: {}ms", result.duration_ms);
    if result.retries > 0 {
        println!("  Retries: {}", result.retries);
    }

    if !result.success {
        std::process::exit(1);
    }

    Ok(())
}
