//! Roomsync simulation binary.
//!
//! # Usage
//!
//! ```bash
//! # Four students in a small class
//! roomsync-sim
//!
//! # Big class, fixed seed, two speakers at most
//! roomsync-sim --students 12 --seed 7 --room-type big-class --max-speakers 2
//! ```

use clap::{Parser, ValueEnum};
use roomsync_core::RoomType;
use roomsync_sim::{DEFAULT_STUDENTS, LessonConfig, run_lesson};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Room kind on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum RoomTypeArg {
    BigClass,
    SmallClass,
    OneToOne,
}

impl From<RoomTypeArg> for RoomType {
    fn from(arg: RoomTypeArg) -> Self {
        match arg {
            RoomTypeArg::BigClass => Self::BigClass,
            RoomTypeArg::SmallClass => Self::SmallClass,
            RoomTypeArg::OneToOne => Self::OneToOne,
        }
    }
}

/// Roomsync classroom simulator
#[derive(Parser, Debug)]
#[command(name = "roomsync-sim")]
#[command(about = "Run a scripted lesson over simulated room replicas")]
#[command(version)]
struct Args {
    /// Students joining besides the owner
    #[arg(short, long, default_value_t = DEFAULT_STUDENTS)]
    students: usize,

    /// Seed for the simulated environment
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Room kind
    #[arg(long, value_enum, default_value = "small-class")]
    room_type: RoomTypeArg,

    /// Maximum simultaneous speakers (unlimited when omitted)
    #[arg(long)]
    max_speakers: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let config = LessonConfig {
        students: args.students,
        seed: args.seed,
        room_type: args.room_type.into(),
        max_speakers: args.max_speakers,
    };
    tracing::info!(?config, "lesson starting");

    let report = run_lesson(&config)?;

    for replica in &report.last.replicas {
        let roster: Vec<String> =
            replica.statuses.iter().map(|(id, status)| format!("{id}={status}")).collect();
        tracing::info!(
            user_id = replica.user_id.as_str(),
            phase = ?replica.phase,
            lifecycle = ?replica.lifecycle,
            mode = ?replica.mode,
            banned = replica.message_banned,
            roster = roster.join(" "),
            "final replica"
        );
    }
    tracing::info!(
        accepted = ?report.accepted,
        left_waiting = ?report.left_waiting,
        peak_speakers = report.peak_speakers,
        deliveries = report.deliveries,
        "lesson converged"
    );

    Ok(())
}
