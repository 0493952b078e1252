use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "nearmiss-email-processor", version)]
#[command(about = "Deliver queued near-miss notification email")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Process one batch of due email and exit
    Run,

    /// Process batches until SIGINT/SIGTERM
    Daemon {
        /// Seconds between batches (default: EMAIL_PROCESS_INTERVAL_SECS or 300)
        #[arg(
            short,
            long,
            conflicts_with = "cron",
            value_parser = clap::value_parser!(u64).range(1..)
        )]
        interval: Option<u64>,

        /// Cron expression with seconds, e.g. "0 */5 * * * *"
        #[arg(short, long)]
        cron: Option<String>,

        /// Do not serve the admin API on ADMIN_HOST:ADMIN_PORT
        #[arg(long)]
        no_admin: bool,
    },

    /// Print queue counts and the newest entries as JSON
    Status {
        /// Number of recent entries to include
        #[arg(short, long, default_value_t = domain_notifications::DEFAULT_RECENT_LIMIT)]
        limit: u64,
    },

    /// Probe the configured SMTP server; exits 1 when unreachable
    TestConnection,

    /// Apply pending schema migrations
    Migrate,
}
