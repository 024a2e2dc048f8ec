//! Insights command

use anyhow::Result;
use chrono::{DateTime, Utc};
use tally_core::insights::backend_from_settings;
use tally_core::{
    generate_insights, Database, InsightBackend, InsightKind, InsightOutcome, InsightResponse,
    InsightSettings, InsightSnapshot, PeriodKey,
};

const RECENT_LIMIT: i64 = 25;

pub async fn cmd_insights(
    db: &Database,
    settings: &InsightSettings,
    key: PeriodKey,
    now: DateTime<Utc>,
) -> Result<InsightOutcome> {
    let snapshot = InsightSnapshot::build(db, key, now, RECENT_LIMIT)?;
    let backend = backend_from_settings(settings);
    if let Some(backend) = &backend {
        println!("🤖 Asking {} ({})...", settings.host.as_deref().unwrap_or_default(), backend.model());
    }

    let outcome = generate_insights(
        backend.as_ref().map(|b| b as &dyn InsightBackend),
        &snapshot,
    )
    .await;
    print_outcome(&outcome);
    Ok(outcome)
}

fn print_outcome(outcome: &InsightOutcome) {
    match outcome {
        InsightOutcome::Unavailable { reason } => {
            println!("💡 Insights unavailable: {}", reason);
            println!("   Tip: Set OLLAMA_HOST to enable insights");
        }
        InsightOutcome::Ready {
            response: InsightResponse::Text(text),
        } => println!("{}", text),
        InsightOutcome::Ready {
            response: InsightResponse::Structured(insights),
        } => {
            for insight in insights {
                let icon = match insight.kind {
                    InsightKind::Tip => "💡",
                    InsightKind::Warning => "⚠️ ",
                    InsightKind::Trend => "📈",
                    InsightKind::Info => "ℹ️ ",
                };
                println!("{} {}", icon, insight.title);
                println!("   {}", insight.content);
            }
        }
    }
}
