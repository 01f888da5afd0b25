use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use rookery_common::Config;
use rookery_engine::{DiagnosticSink, DirSink, NoopSink, TimelineKind};
use rookery_mirror::{Mirror, MirrorReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TimelineArg {
    Following,
    Mutuals,
    Both,
}

/// Mirror an account's following list and mutual followers into a
/// normalized JSON report.
#[derive(Parser)]
#[command(name = "rookery-mirror")]
struct Args {
    /// Numeric id of the account whose graph to mirror.
    user_id: String,

    #[arg(long, value_enum, default_value_t = TimelineArg::Following)]
    timeline: TimelineArg,

    /// Pages to fetch per timeline (0 = run until the cursor stops).
    #[arg(long, default_value_t = 0)]
    pages: u32,

    /// Keep promoted/sponsored entries instead of dropping them.
    #[arg(long)]
    include_promoted: bool,

    /// Dump each page's raw JSON here, for recognizer debugging.
    #[arg(long)]
    dump_dir: Option<PathBuf>,

    /// Write the aggregate report here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("rookery=info".parse()?))
        .init();

    let args = Args::parse();

    info!("Rookery mirror starting...");
    let config = Config::from_env();
    config.log_redacted();

    let sink: Box<dyn DiagnosticSink> = match &args.dump_dir {
        Some(dir) => Box::new(DirSink::new(dir)?),
        None => Box::new(NoopSink),
    };

    let mirror = Mirror::new(&config);
    let mut report = MirrorReport::new(&args.user_id);

    if matches!(args.timeline, TimelineArg::Following | TimelineArg::Both) {
        report.following = Some(
            mirror
                .mirror_timeline(
                    &args.user_id,
                    TimelineKind::Following,
                    args.pages,
                    args.include_promoted,
                    sink.as_ref(),
                )
                .await,
        );
    }
    if matches!(args.timeline, TimelineArg::Mutuals | TimelineArg::Both) {
        report.mutual_followers = Some(
            mirror
                .mirror_timeline(
                    &args.user_id,
                    TimelineKind::MutualFollowers,
                    args.pages,
                    args.include_promoted,
                    sink.as_ref(),
                )
                .await,
        );
    }

    let json = serde_json::to_string_pretty(&report)?;
    match &args.out {
        Some(path) => {
            std::fs::write(path, &json)?;
            info!(path = %path.display(), "Report written");
        }
        None => println!("{json}"),
    }

    if report.has_empty_failure() {
        anyhow::bail!("run aborted before collecting any results");
    }
    Ok(())
}
