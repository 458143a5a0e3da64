use std::io::{self, Write};
use std::process;

use clap::Parser;
use tracing::{debug, info};

use happy_probe::cli::{Cli, USAGE};
use happy_probe::config::{LogFormat, ProbeConfig};
use happy_probe::lock::OutputLock;
use happy_probe::{Prober, SystemResolver, TargetList, rank, report};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if cli.help {
        eprintln!("{}", USAGE);
        process::exit(1);
    }

    let config = cli.load_config()?;
    init_tracing(&config)?;
    debug!(?config, "effective configuration");

    let mut targets = TargetList::new();
    for host in &config.targets {
        targets.add_host(&SystemResolver, host, &config.ports)?;
    }
    if targets.is_empty() {
        info!("no targets to probe");
        return Ok(());
    }
    info!(
        targets = targets.len(),
        endpoints = targets.endpoint_count(),
        rounds = config.queries,
        "probing"
    );

    Prober::from_config(&config).run(&mut targets, config.queries)?;

    if config.sort {
        rank::sort_targets(&mut targets);
    }

    let stdout = io::stdout();
    let _lock = OutputLock::acquire(&stdout);
    let mut out = stdout.lock();
    report::render(
        &mut out,
        &targets,
        config.report_format(),
        config.queries as usize,
        chrono::Utc::now().timestamp(),
    )?;
    out.flush()?;

    Ok(())
}

fn init_tracing(config: &ProbeConfig) -> anyhow::Result<()> {
    let level = config.get_tracing_level()?.as_str().to_lowercase();
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("happy_probe={}", level).parse()?)
        .add_directive(format!("happy={}", level).parse()?);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);
    match config.log_format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}
