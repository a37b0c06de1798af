//! Command-line host for the conference core.
//!
//! # Responsibility
//! - Map subcommands onto `ConferenceService` calls and print JSON results.
//! - Drain queued background tasks before the process exits.
//! - Host the periodic announcement refresh for `watch`.

use clap::{Args, Parser, Subcommand};
use confcentral_core::model::parse_time;
use confcentral_core::queue::spawn_announcement_refresh;
use confcentral_core::{
    init_logging, ConferenceDraft, ConferenceService, ConferenceUpdate, CoreConfig, CurrentUser,
    Database, DerivedViews, FilterCondition, LogNotifier, MemoryCache, PendingQueue,
    ProfileUpdate, SessionDraft, StaticIdentity, TaskDispatcher, TeeShirtSize,
};
use log::info;
use serde::Serialize;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

type CliResult<T> = Result<T, Box<dyn Error>>;

#[derive(Parser)]
#[command(name = "confcentral")]
#[command(about = "Manage conferences, sessions, registrations and wishlists", version)]
struct Cli {
    /// SQLite database file (overrides the config file)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Acting user id; commands that need a user fail without it
    #[arg(long, global = true)]
    user: Option<String>,

    /// Acting user's email (default: <user>@localhost)
    #[arg(long, global = true)]
    email: Option<String>,

    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Absolute directory for rolling log files
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Conference management and queries
    #[command(subcommand)]
    Conference(ConferenceCommand),
    /// Take a seat at a conference
    Register { conference: String },
    /// Release a seat at a conference
    Unregister { conference: String },
    /// Session management and queries
    #[command(subcommand)]
    Session(SessionCommand),
    /// Session wishlist of the acting user
    #[command(subcommand)]
    Wishlist(WishlistCommand),
    /// Most-wishlisted sessions of a conference
    TopSessions { conference: String },
    /// Speakers with at least two sessions in a conference
    FeaturedSpeakers { conference: String },
    /// Recompute the nearly-sold-out announcement
    Announce,
    /// Print the announcement, scanning first when nothing is cached
    Announcement,
    /// Refresh the announcement on the configured period and print each change
    Watch {
        /// Exit after this many announcements
        #[arg(long)]
        count: Option<usize>,
    },
    /// Profile of the acting user
    #[command(subcommand)]
    Profile(ProfileCommand),
}

#[derive(Subcommand)]
enum ConferenceCommand {
    Create(ConferenceFields),
    Update {
        conference: String,
        #[command(flatten)]
        fields: ConferenceFields,
    },
    Show { conference: String },
    /// Conferences organized by the acting user
    List,
    /// Conferences the acting user registered for
    Attending,
    /// Filter conferences, e.g. `--filter "month = 6" --filter "maxAttendees > 10"`
    Query {
        #[arg(long = "filter")]
        filters: Vec<String>,
    },
}

#[derive(Args)]
struct ConferenceFields {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    city: Option<String>,
    #[arg(long = "topic")]
    topics: Vec<String>,
    #[arg(long)]
    max_attendees: Option<u32>,
    /// YYYY-MM-DD
    #[arg(long)]
    start_date: Option<String>,
    /// YYYY-MM-DD
    #[arg(long)]
    end_date: Option<String>,
}

#[derive(Subcommand)]
enum SessionCommand {
    Create {
        conference: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        highlights: Option<String>,
        #[arg(long)]
        speaker: Option<String>,
        #[arg(long = "type")]
        session_type: Option<String>,
        /// YYYY-MM-DD
        #[arg(long)]
        date: Option<String>,
        /// HH:MM
        #[arg(long)]
        start_time: Option<String>,
        #[arg(long)]
        duration: Option<u32>,
    },
    List {
        conference: String,
        #[arg(long = "type")]
        session_type: Option<String>,
    },
    /// Sessions ordered by date and start time
    Schedule { conference: String },
    /// Sessions of one speaker across conferences
    Speaker { speaker: String },
    /// Non-workshop sessions starting before a cutoff
    Early {
        conference: String,
        #[arg(long, default_value = "19:00")]
        before: String,
    },
}

#[derive(Subcommand)]
enum WishlistCommand {
    Add { session: String },
    Remove { session: String },
    List,
}

#[derive(Subcommand)]
enum ProfileCommand {
    Show,
    Save {
        #[arg(long)]
        display_name: Option<String>,
        /// e.g. NOT_SPECIFIED, M_W, XL_M
        #[arg(long)]
        shirt_size: Option<String>,
    },
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();

    let mut config = match cli.config.as_deref() {
        Some(path) => CoreConfig::from_path(path)?,
        None => CoreConfig::default(),
    };
    if let Some(db) = cli.db.clone() {
        config.database_path = db;
    }
    if let Some(log_dir) = cli.log_dir.clone() {
        config.log_dir = Some(log_dir);
    }
    if let Some(log_dir) = config.log_dir.as_deref() {
        init_logging(&config.log_level, log_dir)?;
    }

    let db = Database::open(&config.database_path)?
        .with_transaction_attempts(config.transaction_attempts);
    let cache = Arc::new(MemoryCache::new());
    let queue = Arc::new(PendingQueue::new());
    let identity = match cli.user.as_deref() {
        Some(user_id) => {
            let email = cli
                .email
                .clone()
                .unwrap_or_else(|| format!("{user_id}@localhost"));
            StaticIdentity::signed_in(CurrentUser::from_email(user_id, email))
        }
        None => StaticIdentity::anonymous(),
    };
    let views = DerivedViews::new(db.clone(), cache.clone(), queue.clone())
        .with_near_sold_out_seats(config.near_sold_out_seats);
    let service = ConferenceService::new(db, cache, queue.clone(), Arc::new(identity))
        .with_views(views.clone());

    let outcome = execute(&service, &config, cli.command);

    let dispatcher = TaskDispatcher::new(views, Arc::new(LogNotifier));
    let report = queue.drain_with(&dispatcher, &config.queue_retry.policy());
    info!(
        "event=cli_exit module=cli status={} drained={} failed={}",
        if outcome.is_ok() { "ok" } else { "error" },
        report.processed,
        report.failed
    );
    outcome
}

fn execute(service: &ConferenceService, config: &CoreConfig, command: Command) -> CliResult<()> {
    match command {
        Command::Conference(command) => conference(service, command),
        Command::Register { conference } => {
            service.register(&conference)?;
            print_json(&true)
        }
        Command::Unregister { conference } => print_json(&service.unregister(&conference)?),
        Command::Session(command) => session(service, command),
        Command::Wishlist(command) => wishlist(service, command),
        Command::TopSessions { conference } => print_json(&service.top_sessions(&conference)?),
        Command::FeaturedSpeakers { conference } => {
            print_json(&service.featured_speakers(&conference)?)
        }
        Command::Announce => print_json(&service.refresh_announcement()?.unwrap_or_default()),
        Command::Announcement => print_json(&announcement_text(service)?),
        Command::Watch { count } => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_time()
                .build()?;
            let period = config.announcement_refresh_period();
            info!(
                "event=cli_watch module=cli status=start period_secs={}",
                period.as_secs()
            );
            runtime
                .block_on(watch_announcements(
                    service.views().clone(),
                    period,
                    count,
                    |text| print_json(text),
                ))
                .map(|_| ())
        }
        Command::Profile(ProfileCommand::Show) => print_json(&service.profile()?),
        Command::Profile(ProfileCommand::Save {
            display_name,
            shirt_size,
        }) => {
            let tee_shirt_size = shirt_size
                .map(|code| {
                    TeeShirtSize::parse(&code).ok_or_else(|| format!("unknown shirt size `{code}`"))
                })
                .transpose()?;
            print_json(&service.save_profile(&ProfileUpdate {
                display_name,
                tee_shirt_size,
            })?)
        }
    }
}

fn conference(service: &ConferenceService, command: ConferenceCommand) -> CliResult<()> {
    match command {
        ConferenceCommand::Create(fields) => {
            let draft = ConferenceDraft {
                name: fields.name.unwrap_or_default(),
                description: fields.description,
                city: fields.city,
                topics: fields.topics,
                max_attendees: fields.max_attendees,
                start_date: fields.start_date,
                end_date: fields.end_date,
            };
            print_json(&service.create_conference(&draft)?)
        }
        ConferenceCommand::Update { conference, fields } => {
            let update = ConferenceUpdate {
                name: fields.name,
                description: fields.description,
                city: fields.city,
                topics: (!fields.topics.is_empty()).then_some(fields.topics),
                max_attendees: fields.max_attendees,
                start_date: fields.start_date,
                end_date: fields.end_date,
            };
            print_json(&service.update_conference(&conference, &update)?)
        }
        ConferenceCommand::Show { conference } => print_json(&service.conference(&conference)?),
        ConferenceCommand::List => print_json(&service.conferences_created()?),
        ConferenceCommand::Attending => print_json(&service.conferences_to_attend()?),
        ConferenceCommand::Query { filters } => {
            let filters = filters
                .iter()
                .map(|raw| parse_filter(raw))
                .collect::<CliResult<Vec<_>>>()?;
            print_json(&service.query_conferences(&filters)?)
        }
    }
}

fn session(service: &ConferenceService, command: SessionCommand) -> CliResult<()> {
    match command {
        SessionCommand::Create {
            conference,
            name,
            highlights,
            speaker,
            session_type,
            date,
            start_time,
            duration,
        } => {
            let draft = SessionDraft {
                name,
                highlights,
                speaker,
                session_type,
                date,
                start_time,
                duration_minutes: duration,
            };
            print_json(&service.create_session(&conference, &draft)?)
        }
        SessionCommand::List {
            conference,
            session_type: Some(session_type),
        } => print_json(&service.conference_sessions_by_type(&conference, &session_type)?),
        SessionCommand::List { conference, .. } => {
            print_json(&service.conference_sessions(&conference)?)
        }
        SessionCommand::Schedule { conference } => {
            print_json(&service.conference_sessions_by_date(&conference)?)
        }
        SessionCommand::Speaker { speaker } => print_json(&service.sessions_by_speaker(&speaker)?),
        SessionCommand::Early { conference, before } => {
            let cutoff = parse_time("before", &before)?;
            print_json(&service.non_workshop_sessions_before(&conference, cutoff)?)
        }
    }
}

fn wishlist(service: &ConferenceService, command: WishlistCommand) -> CliResult<()> {
    match command {
        WishlistCommand::Add { session } => print_json(&service.add_session_to_wishlist(&session)?),
        WishlistCommand::Remove { session } => {
            print_json(&service.remove_session_from_wishlist(&session)?)
        }
        WishlistCommand::List => print_json(&service.sessions_in_wishlist()?),
    }
}

/// Cached announcement; a cold cache runs the nearly-sold-out scan first.
fn announcement_text(service: &ConferenceService) -> CliResult<String> {
    let cached = service.announcement();
    if !cached.is_empty() {
        return Ok(cached);
    }
    Ok(service.refresh_announcement()?.unwrap_or_default())
}

/// Runs the refresher until `limit` changed announcements were reported.
async fn watch_announcements(
    views: DerivedViews,
    period: Duration,
    limit: Option<usize>,
    mut on_change: impl FnMut(&str) -> CliResult<()>,
) -> CliResult<usize> {
    let refresher = spawn_announcement_refresh(views, period);
    let mut updates = refresher.subscribe();
    let mut reported = 0;
    let outcome = loop {
        if limit.is_some_and(|limit| reported >= limit) {
            break Ok(reported);
        }
        if updates.changed().await.is_err() {
            break Ok(reported);
        }
        let text = updates.borrow_and_update().clone();
        if let Err(err) = on_change(&text) {
            break Err(err);
        }
        reported += 1;
    };
    refresher.abort();
    outcome
}

/// Parses `"<field> <operator> <value>"`; the value may contain spaces.
fn parse_filter(raw: &str) -> CliResult<FilterCondition> {
    let mut parts = raw.trim().splitn(3, char::is_whitespace);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(field), Some(operator), Some(value)) if !field.is_empty() => {
            Ok(FilterCondition::new(field, operator, value.trim()))
        }
        _ => Err(format!("filter `{raw}` must look like `<field> <operator> <value>`").into()),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{announcement_text, parse_filter, watch_announcements};
    use confcentral_core::{
        ConferenceDraft, ConferenceService, CurrentUser, Database, MemoryCache, PendingQueue,
        StaticIdentity,
    };
    use std::sync::Arc;
    use std::time::Duration;

    fn organizer_service() -> ConferenceService {
        ConferenceService::new(
            Database::open_in_memory().unwrap(),
            Arc::new(MemoryCache::new()),
            Arc::new(PendingQueue::new()),
            Arc::new(StaticIdentity::signed_in(CurrentUser::from_email(
                "organizer",
                "organizer@example.com".to_string(),
            ))),
        )
    }

    fn tiny_conference(service: &ConferenceService) {
        service
            .create_conference(&ConferenceDraft {
                name: "Tiny".to_string(),
                max_attendees: Some(3),
                ..ConferenceDraft::default()
            })
            .unwrap();
    }

    #[test]
    fn filter_argument_splits_into_three_parts() {
        let filter = parse_filter("city = San Francisco").unwrap();
        assert_eq!(filter.field, "city");
        assert_eq!(filter.operator, "=");
        assert_eq!(filter.value, "San Francisco");
    }

    #[test]
    fn incomplete_filter_is_rejected() {
        assert!(parse_filter("month >").is_err());
    }

    #[test]
    fn announcement_scans_when_the_cache_is_cold() {
        let service = organizer_service();
        assert_eq!(announcement_text(&service).unwrap(), "");

        tiny_conference(&service);
        let text = announcement_text(&service).unwrap();
        assert!(text.ends_with("nearly sold out: Tiny"), "{text}");
        assert_eq!(service.announcement(), text);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn watch_prints_the_refreshed_announcement() {
        let service = organizer_service();
        tiny_conference(&service);

        let mut printed = Vec::new();
        let reported = tokio::time::timeout(
            Duration::from_secs(10),
            watch_announcements(
                service.views().clone(),
                Duration::from_secs(3600),
                Some(1),
                |text| {
                    printed.push(text.to_string());
                    Ok(())
                },
            ),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(reported, 1);
        assert!(printed[0].ends_with("nearly sold out: Tiny"));
    }
}
