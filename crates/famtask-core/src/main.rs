use anyhow::Context;
use chrono::{Duration, Utc};
use clap::{value_parser, Arg, ArgMatches, Command};
use famtask_core::{
    AuthProvider, BoardEntry, ChildBoard, FamilyTaskService, MemoryAuth, MemoryPush, ParentBoard,
    ServiceConfig,
};
use famtask_model::{InviteCode, NewTask, Role, TaskPriority, UserProfile};
use famtask_store::MemoryStore;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use std::sync::Arc;

const CHORES: [&str; 6] = [
    "Clean room",
    "Feed the cat",
    "Homework",
    "Take out the trash",
    "Practice piano",
    "Water the plants",
];

#[tokio::main]
async fn main() {
    famtask_core::logging::init(famtask_core::logging::json_requested());

    let cli = Command::new("famtask")
        .version(famtask_core::VERSION)
        .about("Family task manager service tools")
        .subcommand_required(true)
        .subcommand(
            Command::new("check-config")
                .about("Validate backend settings from FAMTASK_* variables and an optional file")
                .arg(
                    Arg::new("file")
                        .long("file")
                        .value_parser(value_parser!(PathBuf))
                        .help("TOML configuration file"),
                ),
        )
        .subcommand(
            Command::new("invite-code")
                .about("Print freshly generated invite codes")
                .arg(
                    Arg::new("count")
                        .long("count")
                        .default_value("1")
                        .value_parser(value_parser!(usize))
                        .help("Number of codes"),
                ),
        )
        .subcommand(
            Command::new("demo")
                .about("Run a parent/child scenario against in-memory backends")
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for the generated tasks"),
                ),
        );

    let matches = cli.get_matches();
    let outcome = match matches.subcommand() {
        Some(("check-config", args)) => check_config(args),
        Some(("invite-code", args)) => {
            invite_codes(args);
            Ok(0)
        }
        Some(("demo", args)) => demo(args).await,
        _ => Ok(2),
    };

    let code = match outcome {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "command failed");
            eprintln!("error: {e:#}");
            1
        }
    };
    std::process::exit(code);
}

fn check_config(args: &ArgMatches) -> anyhow::Result<i32> {
    let file = args.get_one::<PathBuf>("file");
    let config = ServiceConfig::load(file.map(PathBuf::as_path)).context("loading configuration")?;
    let missing = config.backend.validate();
    if missing.is_empty() {
        println!("configured");
        Ok(0)
    } else {
        println!("not configured; missing:");
        for key in missing {
            println!("  {key} ({}{})", famtask_core::ENV_PREFIX, key.to_uppercase());
        }
        Ok(1)
    }
}

fn invite_codes(args: &ArgMatches) {
    let count = args.get_one::<usize>("count").copied().unwrap_or(1);
    let mut rng = rand::rng();
    for _ in 0..count {
        println!("{}", InviteCode::generate(&mut rng));
    }
}

async fn demo(args: &ArgMatches) -> anyhow::Result<i32> {
    let seed = args.get_one::<u64>("seed").copied().unwrap_or(42);
    let mut rng = StdRng::seed_from_u64(seed);

    let store = Arc::new(MemoryStore::new());
    let auth = Arc::new(MemoryAuth::new());
    let service = FamilyTaskService::init(
        ServiceConfig::local(),
        store,
        auth.clone(),
        Arc::new(MemoryPush::new("demo-device")),
    )?;

    let parent = service.sign_up("parent@example.com", "parent-pass", Some("Pat")).await?;
    let parent = service.select_role(&parent.uid, Role::Parent).await?;
    let family = service.create_family(&parent).await?;
    service.initialize_notifications(&parent.uid).await?;
    println!("family {} created, invite code {}", family.family_id, family.invite_code);

    let child = service.sign_up("kid@example.com", "kid-pass", Some("Kim")).await?;
    let child = service.select_role(&child.uid, Role::Child).await?;
    let lowered = family.invite_code.as_str().to_lowercase();
    service.join_family(&child, &lowered).await?;
    println!("child joined with \"{lowered}\"");

    let parent = reload(&service, &parent).await?;
    let child = reload(&service, &child).await?;

    let count = rng.random_range(3..=5);
    for _ in 0..count {
        let title = CHORES[rng.random_range(0..CHORES.len())];
        let priority = match rng.random_range(0..3) {
            0 => TaskPriority::Red,
            1 => TaskPriority::Orange,
            _ => TaskPriority::Green,
        };
        let mut draft = NewTask::new(title, priority);
        if rng.random_bool(0.3) {
            draft = draft.with_due_date(Utc::now() - Duration::hours(1));
        }
        service.create_task(&parent, None, draft).await?;
    }

    let mut session = service.child_session(&child)?;
    session.wait_ready().await?;
    println!("child session marked {} task(s) seen", session.marked_seen());

    let board = session.board(Utc::now());
    if let Some(first) = board.active.first() {
        service.plan_task(&first.task.id, Utc::now() + Duration::hours(2)).await?;
    }
    if let Some(second) = board.active.get(1) {
        service.complete_task(&second.task.id).await?;
    }

    let mut feed = service.family_feed(parent.family_id.clone())?;
    feed.wait_ready().await;
    let now = Utc::now();
    print_parent(&ParentBoard::from_tasks(feed.tasks(), now));
    print_child(&ChildBoard::for_child(feed.tasks(), &child.uid, now));

    auth.sign_out().await?;
    service.dispose();
    Ok(0)
}

async fn reload(service: &FamilyTaskService, user: &UserProfile) -> anyhow::Result<UserProfile> {
    service
        .profiles()
        .profile(&user.uid)
        .await?
        .with_context(|| format!("profile {} vanished", user.uid))
}

fn print_entries(entries: &[BoardEntry]) {
    for entry in entries {
        println!(
            "    [{:<9}] {:<20} {}",
            format!("{:?}", entry.display).to_lowercase(),
            entry.task.title,
            entry.task.priority.label()
        );
    }
}

fn print_parent(board: &ParentBoard) {
    println!();
    println!("Parent board ({} overdue)", board.overdue_count());
    println!("  active:");
    print_entries(&board.active);
    println!("  completed:");
    print_entries(&board.completed);
}

fn print_child(board: &ChildBoard) {
    println!();
    println!("Child board for {} ({} unseen)", board.child, board.unseen_count());
    println!("  active:");
    print_entries(&board.active);
    println!("  completed:");
    print_entries(&board.completed);
}
