//! cloudtrail-relay CLI
//!
//! Imports CloudTrail batches from local files, S3, or an SQS notification queue.

use clap::Parser;

mod args;
mod run;

use args::Cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    // Logs go to stderr
    run::init_logging(args.log_level)?;

    let report = run::execute(args).await?;
    report.print();

    Ok(())
}
