use std::sync::Arc;

use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bibliodesk::auth::{self, LoginRequest};
use bibliodesk::config::Config;
use bibliodesk::domain::{ClientError, UpdateBroadcaster};
use bibliodesk::infrastructure::AppState;
use bibliodesk::models::{Destination, SessionContext};
use bibliodesk::services::{Dashboard, view_model};
use bibliodesk::utils::dates;

/// Value following `flag` on the command line
fn arg_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|pos| args.get(pos + 1))
        .cloned()
}

fn load_env(profile: &str) {
    dotenvy::dotenv().ok();
    if profile != "default" {
        let file = format!(".env.{}", profile);
        if let Err(e) = dotenvy::from_filename(&file) {
            tracing::debug!("No {} loaded: {}", file, e);
        }
    }
}

async fn print_dashboard(dashboard: &Dashboard, genre: &str) {
    let snap = dashboard.snapshot().await;
    let today = dates::today();

    println!("== Featured books ({}) ==", genre);
    if snap.loading {
        println!("Loading...");
    }
    for book in view_model::filter_by_genre(&snap.books, genre) {
        println!(
            "[{}] {} by {} | {} | {} | {} copies{}\n    {}",
            book.book_id,
            book.title,
            book.author_name.as_deref().unwrap_or("Unknown"),
            view_model::genre_label(book),
            view_model::published_year_label(book),
            book.displayed_copies(),
            if book.is_available() { "" } else { " (out of stock)" },
            view_model::description_preview(book),
        );
    }

    println!("\n== My borrowings ==");
    for row in view_model::active_rows(&snap.borrowings, today) {
        println!(
            "{} | borrowed {} | due {} | {} | fine {} | {} days late",
            row.book_title,
            row.borrow_date,
            row.due_date,
            row.status,
            view_model::fine_label(row.fine),
            row.days_late
        );
    }
    if view_model::has_outstanding_borrowings(&snap.borrowings) {
        println!(
            "Total fine: {}",
            view_model::fine_label(view_model::total_outstanding_fine(&snap.borrowings))
        );
    }

    println!("\n== History ==");
    for row in view_model::history_rows(&snap.borrowings, today) {
        let returned = row
            .return_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{} | borrowed {} | due {} | returned {} | fine {} | {} days late",
            row.book_title,
            row.borrow_date,
            row.due_date,
            returned,
            view_model::fine_label(row.fine),
            row.days_late
        );
    }
    println!();
}

async fn borrow(
    state: &AppState,
    dashboard: Arc<Dashboard>,
    broadcaster: Arc<dyn UpdateBroadcaster>,
    book_id: i64,
) -> Result<(), ClientError> {
    let workflow = state.borrow_workflow(dashboard.clone(), broadcaster);

    workflow.select_book(dashboard.book(book_id).await).await?;
    workflow.request_confirm().await?;

    match workflow.confirm().await {
        Ok(record) => {
            println!(
                "Borrowed '{}', due {}",
                record.book_title, record.due_date
            );
            Ok(())
        }
        Err(e) => {
            if let Some(alert) = workflow.last_alert().await {
                eprintln!("{}", alert);
            }
            Err(e)
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bibliodesk=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().collect();

    // Load configuration
    let profile = arg_value(&args, "--profile")
        .or_else(|| std::env::var("PROFILE").ok())
        .unwrap_or_else(|| "default".to_string());
    load_env(&profile);

    let mut config = Config::from_env();
    config.profile = profile;

    let state = match AppState::new(config) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };
    tracing::info!(
        "BiblioDesk ({}) using API {}",
        state.config().profile,
        state.config().api_base_url
    );

    let (Some(email), Some(password)) = (
        arg_value(&args, "--email").or_else(|| std::env::var("LIBRARY_EMAIL").ok()),
        arg_value(&args, "--password").or_else(|| std::env::var("LIBRARY_PASSWORD").ok()),
    ) else {
        eprintln!("Usage: bibliodesk --email <email> --password <password> [--genre <genre>] [--borrow <book id>] [--watch] [--profile <name>]");
        std::process::exit(2);
    };

    // Sign in
    let mut sessions = SessionContext::new();
    let credentials = LoginRequest { email, password };
    let destination = match auth::login(state.api(), &mut sessions, &credentials).await {
        Ok(destination) => destination,
        Err(e) => {
            tracing::error!("Login error: {}", e);
            eprintln!("{}", e.user_message());
            std::process::exit(1);
        }
    };
    let Ok(session) = sessions.require().cloned() else {
        eprintln!("{}", ClientError::Unauthorized.user_message());
        std::process::exit(1);
    };

    tracing::info!("Routing to {}", destination.path());
    if destination == Destination::AdminDashboard {
        println!("Signed in as admin. The administration console is not part of this client.");
        return;
    }

    // Mount the dashboard and its push subscription
    let dashboard = state.dashboard(&session);
    dashboard.mount().await;

    let notifier = state.notifier(&session);
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    if let Err(e) = notifier.start(events_tx).await {
        tracing::error!("SignalR connection failed, continuing without live updates: {}", e);
    }
    let invalidation = tokio::spawn(dashboard.clone().run_invalidation_loop(events_rx));

    let genre = arg_value(&args, "--genre").unwrap_or_else(|| view_model::ALL_GENRES.to_string());
    print_dashboard(&dashboard, &genre).await;

    let mut exit_code = 0;
    if let Some(raw) = arg_value(&args, "--borrow") {
        match raw.parse::<i64>() {
            Ok(book_id) => {
                let broadcaster: Arc<dyn UpdateBroadcaster> = notifier.clone();
                match borrow(&state, dashboard.clone(), broadcaster, book_id).await {
                    Ok(()) => print_dashboard(&dashboard, &genre).await,
                    Err(e) => {
                        tracing::error!("Borrow of {} failed: {}", book_id, e);
                        exit_code = 1;
                    }
                }
            }
            Err(_) => {
                eprintln!("--borrow expects a numeric book id, got {}", raw);
                exit_code = 2;
            }
        }
    }

    if args.iter().any(|arg| arg == "--watch") {
        tracing::info!("Watching for updates, Ctrl-C to stop");
        let mut changes = dashboard.subscribe_changes();
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                changed = changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    print_dashboard(&dashboard, &genre).await;
                }
            }
        }
    }

    // Unmount: stop applying responses, then tear the subscription down
    dashboard.unmount();
    notifier.shutdown().await;
    if let Err(e) = invalidation.await {
        tracing::warn!("Invalidation loop ended abnormally: {}", e);
    }
    sessions.logout();

    std::process::exit(exit_code);
}
