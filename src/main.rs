//! Headless focus dashboard.
//!
//! Usage: `focusdash [--user <id>] [--sync] [--ask <question>] [--once]`
//!
//! The user id can also come from `FOCUSDASH_USER_ID`. Panel output is
//! printed whenever it changes. `RUST_LOG` controls log verbosity.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::Notify;

use focusdash_lib::google_link::{LinkPhase, LinkView};
use focusdash_lib::panels::{cognitive_load, contexts, insights, priority, recommendations, tasks};
use focusdash_lib::panels::{Panel, PanelHandle, PanelView};
use focusdash_lib::session::Panels;
use focusdash_lib::{load_config, DashboardSession, HttpApiClient, IdentitySource, Navigator};

const USER_ENV: &str = "FOCUSDASH_USER_ID";
const RENDER_EVERY: Duration = Duration::from_millis(250);

#[derive(Debug, Default, PartialEq)]
struct Args {
    user: Option<String>,
    sync: bool,
    ask: Option<String>,
    once: bool,
}

fn parse_args(
    mut args: impl Iterator<Item = String>,
    env_user: Option<String>,
) -> Result<Args, String> {
    let mut parsed = Args::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--user" => parsed.user = Some(args.next().ok_or("--user needs a value")?),
            "--ask" => parsed.ask = Some(args.next().ok_or("--ask needs a question")?),
            "--sync" => parsed.sync = true,
            "--once" => parsed.once = true,
            other => return Err(format!("Unknown argument: {}", other)),
        }
    }
    if parsed.user.is_none() {
        parsed.user = env_user.filter(|u| !u.trim().is_empty());
    }
    Ok(parsed)
}

struct ExitOnLeave(Arc<Notify>);

impl Navigator for ExitOnLeave {
    fn leave_dashboard(&self) {
        self.0.notify_one();
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run().await {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let args = parse_args(std::env::args().skip(1), std::env::var(USER_ENV).ok())?;
    let config = load_config()?;

    let client = Arc::new(HttpApiClient::new(&config.api_url)?);
    match client.health().await {
        Ok(true) => log::info!("Backend at {} is healthy", client.base_url()),
        Ok(false) => log::warn!("Backend at {} reports unhealthy", client.base_url()),
        Err(e) => log::warn!("Backend health check failed: {}", e.user_message()),
    }

    if let Some(question) = &args.ask {
        let user = args
            .user
            .as_deref()
            .ok_or_else(|| format!("--ask needs a user (--user or {})", USER_ENV))?;
        let reply = client
            .ask_assistant(user, question)
            .await
            .map_err(|e| e.user_message())?;
        println!("{}", reply.response);
        return Ok(());
    }

    let identity = Arc::new(IdentitySource::new());
    let leave = Arc::new(Notify::new());
    let session = DashboardSession::start(
        &config,
        client,
        identity.clone(),
        Arc::new(ExitOnLeave(leave.clone())),
    );
    identity.resolve(args.user.clone());

    if args.sync {
        match session.sync_google().await {
            Ok(report) => log::info!(
                "Sync {}: {} events, {} emails",
                report.status,
                report.synced.calendar,
                report.synced.emails
            ),
            Err(e) => log::error!("Sync failed: {}", e),
        }
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut ticker = tokio::time::interval(RENDER_EVERY);
    let mut last = String::new();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let link = session.link().view();
                let Some((text, settled)) =
                    session.with_panels(|p| (render(p, &link), p.all_settled()))
                else {
                    break;
                };
                if text != last {
                    println!("{}", text);
                    last = text;
                }
                if args.once && settled {
                    break;
                }
            }
            _ = leave.notified() => {
                log::warn!("No signed-in user. Pass --user or set {}", USER_ENV);
                break;
            }
            _ = &mut ctrl_c => {
                log::info!("Interrupted");
                break;
            }
        }
    }

    session.shutdown();
    Ok(())
}

fn render(panels: &Panels, link: &LinkView) -> String {
    let mut out = String::new();
    render_link(&mut out, link);

    section(&mut out, "Work contexts", &panels.contexts, |out, snapshot| {
        for ctx in contexts::by_urgency(snapshot) {
            out.push_str(&format!("  {} [{}] due {}\n", ctx.name, ctx.urgency, ctx.deadline));
        }
    });

    section(&mut out, "What should I work on next?", &panels.tasks, |out, snapshot| {
        for row in tasks::rows(snapshot) {
            let badge = if row.top_priority { " TOP" } else { "" };
            out.push_str(&format!(
                "  {}. [{}] {} ({:.0}){}\n",
                row.rank,
                row.icon.label(),
                row.task.title,
                row.task.priority_score,
                badge
            ));
        }
    });

    section(&mut out, "Why this task is priority #1", &panels.priority, |out, snapshot| {
        if let Some(explanation) = priority::explain(snapshot, Local::now().date_naive()) {
            out.push_str(&format!("  {}\n", explanation.task.title));
            for row in &explanation.factors {
                out.push_str(&format!("    {}: {}\n", row.factor.label(), row.value));
            }
            out.push_str(&format!("  {}\n", priority::weighting_legend()));
        }
    });

    section(&mut out, "Cognitive load", &panels.cognitive_load, |out, snapshot| {
        if let Some(load) = snapshot {
            out.push_str(&format!(
                "  {:.0}/100 {} - {}\n",
                cognitive_load::gauge_value(load),
                cognitive_load::status_label(load),
                load.breakdown
            ));
        }
    });

    section(&mut out, "Work habit insights", &panels.insights, |out, snapshot| {
        for insight in insights::by_severity(snapshot) {
            out.push_str(&format!(
                "  [{}] {}: {}\n",
                insight.severity,
                insights::kind_label(insight),
                insight.message
            ));
        }
    });

    section(&mut out, "Recommendations", &panels.recommendations, |out, snapshot| {
        for rec in recommendations::actionable(snapshot) {
            out.push_str(&format!("  - {} ({})\n", rec.action, rec.reason));
        }
    });

    out
}

fn render_link(out: &mut String, link: &LinkView) {
    let phase = match link.phase {
        LinkPhase::Unlinked => "not connected",
        LinkPhase::Connecting => "connecting",
        LinkPhase::Linked { syncing: true } => "syncing",
        LinkPhase::Linked { syncing: false } => "connected",
    };
    out.push_str(&format!(
        "Google: {} ({})\n",
        phase,
        link.last_synced_label(chrono::Utc::now())
    ));
    if let Some(err) = &link.error {
        out.push_str(&format!("  ! {}\n", err));
    }
    for warning in link.warnings() {
        out.push_str(&format!("  ~ {}\n", warning));
    }
}

fn section<P: Panel>(
    out: &mut String,
    title: &str,
    handle: &PanelHandle<P>,
    body: impl FnOnce(&mut String, &P::Snapshot),
) {
    out.push_str(&format!("\n== {} ==\n", title));
    handle.with_view(|view| match view {
        PanelView::SignedOut => out.push_str("  (signed out)\n"),
        PanelView::Loading => out.push_str("  Loading...\n"),
        PanelView::Failed(message) => out.push_str(&format!("  ! {}\n", message)),
        PanelView::Empty { message, error } => {
            out.push_str(&format!("  {}\n", message));
            if let Some(error) = error {
                out.push_str(&format!("  ! {}\n", error));
            }
        }
        PanelView::Ready {
            snapshot,
            error,
            refreshing,
        } => {
            body(out, snapshot);
            if let Some(error) = error {
                out.push_str(&format!("  ! {}\n", error));
            }
            if refreshing {
                out.push_str("  (refreshing)\n");
            }
        }
    });
}
