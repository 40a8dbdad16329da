use anyhow::Context;
use chrono::Utc;
use pr_sentinel::{
    Config, ConsoleSink, CsvSink, GitHub, OutputMode, ReportSpec, parse_args, run_report,
};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    // stdout carries the report; diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    // Help and version exit 0, usage errors exit 2.
    let invocation = match parse_args(std::env::args()) {
        Ok(invocation) => invocation,
        Err(err) => match err.downcast_ref::<clap::Error>() {
            Some(clap_err) => clap_err.exit(),
            None => return Err(err),
        },
    };

    // Configuration problems stop the run before any request is made.
    let config = Config::from_env(invocation.repo.clone(), invocation.env_file.as_deref())?;
    tracing::debug!("Resolved configuration: {:?}", config);

    let forge = GitHub::from_config(&config)?;
    let spec = ReportSpec {
        repo: config.repo.clone(),
        threshold_days: invocation.threshold_days,
        limit: invocation.limit,
        concurrency: invocation.concurrency,
    };

    match &invocation.output {
        OutputMode::Console { detailed } => {
            let mut sink = ConsoleSink::new(std::io::stdout(), spec.threshold_days, *detailed);
            run_report(&spec, &forge, &mut sink, Utc::now()).await?;
        }
        OutputMode::Csv { path, timezone } => {
            let mut sink = CsvSink::create(path, *timezone)?;
            let result = run_report(&spec, &forge, &mut sink, Utc::now()).await;
            let rows = sink.rows_written();
            result.with_context(|| {
                format!(
                    "Report aborted; {} row(s) already written to {}",
                    rows,
                    path.display()
                )
            })?;
            println!("Wrote {} delayed reviewer row(s) to {}", rows, path.display());
        }
    }

    Ok(())
}
