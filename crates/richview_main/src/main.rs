use clap::Parser;
use richview_main::{Cli, run};
use richview_tracker::{LogConfig, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut log = LogConfig::default().verbose(cli.verbose);
    if let Some(directory) = &cli.log_dir {
        log = log.directory(directory.clone());
    }
    let _guard = init_tracing(log)?;

    run(cli).await
}
