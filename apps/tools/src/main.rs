use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use services::notifications::LogNotifier;
use services::{conferences, feedback, notifications, registrations, sessions, ApiContext};
use shared::domain::ConferenceId;

#[derive(Parser, Debug)]
struct Cli {
    /// Falls back to DATABASE_URL, then to a local file database.
    #[arg(long)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send tomorrow's reminders and yesterday's feedback requests.
    ProcessReminders,
    /// Apply a workflow transition to a conference.
    Transition {
        conference_id: ConferenceId,
        name: String,
        /// Conference date, required for to_scheduled.
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// Registration and feedback statistics for a conference.
    Stats { conference_id: ConferenceId },
    /// Rooms free for the whole interval.
    AvailableRooms {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let cli = Cli::parse();
    let database_url = cli
        .database_url
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .unwrap_or_else(|| "sqlite://conferences.db".to_string());
    let ctx = ApiContext::connect(&database_url).await?;

    match cli.command {
        Command::ProcessReminders => {
            let now = Utc::now();
            let reminders = notifications::process_reminders(&ctx, &LogNotifier, now).await?;
            let requests = notifications::process_feedback_requests(&ctx, &LogNotifier, now).await?;
            println!("{}", serde_json::to_string_pretty(&reminders)?);
            println!("{}", serde_json::to_string_pretty(&requests)?);
        }
        Command::Transition {
            conference_id,
            name,
            at,
        } => {
            let applied = match name.as_str() {
                "to_validation" => conferences::submit_for_validation(&ctx, conference_id).await?,
                "to_scheduled" => {
                    let Some(at) = at else {
                        bail!("to_scheduled needs --at <rfc3339 datetime>");
                    };
                    conferences::schedule_conference(&ctx, conference_id, at).await?
                }
                "to_archived" => conferences::archive_conference(&ctx, conference_id).await?,
                "back_to_submitted" => conferences::return_to_submitted(&ctx, conference_id).await?,
                other => bail!("unknown transition {other:?}"),
            };
            if applied {
                let conference = conferences::find_conference(&ctx, conference_id).await?;
                println!("{name} applied, conference is now {}", conference.status);
            } else {
                let enabled = conferences::enabled_transitions(&ctx, conference_id).await?;
                println!("{name} refused, enabled transitions: {enabled:?}");
            }
        }
        Command::Stats { conference_id } => {
            let conference = conferences::find_conference(&ctx, conference_id).await?;
            let registration_stats =
                registrations::conference_statistics(&ctx, conference_id).await?;
            let feedback_stats = feedback::conference_stats(&ctx, conference_id).await?;
            println!("{} [{}]", conference.title, conference.status);
            println!("{}", serde_json::to_string_pretty(&registration_stats)?);
            println!("{}", serde_json::to_string_pretty(&feedback_stats)?);
        }
        Command::AvailableRooms { start, end } => {
            for room in sessions::available_rooms(&ctx, start, end).await? {
                println!("{room}");
            }
        }
    }

    Ok(())
}
