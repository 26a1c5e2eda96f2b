use anyhow::Result;
use clap::Parser;

use qrev::config::Config;
use qrev::{cancel, github, review};

#[derive(Parser, Debug)]
#[command(name = "qrev")]
#[command(about = "Interactive terminal code review for GitHub pull requests")]
#[command(version)]
struct Args {
    /// Pull request number (skips the selection list)
    #[arg(short, long)]
    pr: Option<u32>,

    /// Git remote the pull requests belong to
    #[arg(short, long)]
    remote: Option<String>,

    /// Review mode: quick, diff or checkout
    #[arg(short, long)]
    mode: Option<String>,

    /// Annotate the head file with existing review comments (diff mode)
    #[arg(long)]
    annotate: bool,

    /// Preview comments before sending
    #[arg(long)]
    preview: bool,

    /// Lines of leading context around hunks
    #[arg(long)]
    context_before: Option<usize>,

    /// Lines of trailing context around hunks
    #[arg(long)]
    context_after: Option<usize>,

    /// Print debug logs to stderr
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if args.debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("qrev=debug")),
            )
            .with_writer(std::io::stderr)
            .init();
    }

    if let Err(e) = run(args).await {
        eprintln!("review failed: {e:#}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(remote) = args.remote {
        config.remote = remote;
    }
    if let Some(mode) = args.mode.as_deref() {
        config.mode = mode.parse()?;
    }
    if args.annotate {
        config.annotate = true;
    }
    if args.preview {
        config.preview = true;
    }
    if let Some(n) = args.context_before {
        config.context_before = n;
    }
    if let Some(n) = args.context_after {
        config.context_after = n;
    }

    let (handle, cancel) = cancel::pair();
    cancel::trap_interrupt(handle);

    let repo = github::detect_repo(&config.remote).await?;
    let provider = github::GithubProvider::new(repo, args.pr);
    review::Runner::new(&provider, &config, cancel).start().await
}
