//! Database seeder for BudgetGuard development and testing.
//!
//! Seeds a handful of demo subscriptions with details, approvals, finance
//! records and a few weeks of daily usage, then reconciles them.
//!
//! Usage: cargo run --bin seeder

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

use budgetguard_core::recovery::RecoveryMonth;
use budgetguard_core::rules::{NewApproval, NewFinance};
use budgetguard_core::summary::SubscriptionState;
use budgetguard_db::repositories::{SubscriptionDetailsInput, UsageInput};
use budgetguard_db::{
    BudgetRepository, DesiredStateRepository, FinanceRepository, NoopNotifier, Notifier,
    SubscriptionRepository, UsageRepository,
};
use budgetguard_shared::config::SYSTEM_ADMIN;

struct DemoSubscription {
    id: Uuid,
    name: &'static str,
    approved: i64,
    daily_cost: i64,
}

/// Fixed ids so reseeding is idempotent.
const DEMO: [DemoSubscription; 3] = [
    DemoSubscription {
        id: Uuid::from_u128(0x0000_0000_0000_0000_0000_0000_0000_0101),
        name: "Genomics pipeline",
        approved: 5000,
        daily_cost: 40,
    },
    DemoSubscription {
        id: Uuid::from_u128(0x0000_0000_0000_0000_0000_0000_0000_0102),
        name: "Teaching sandbox",
        approved: 300,
        daily_cost: 25,
    },
    DemoSubscription {
        id: Uuid::from_u128(0x0000_0000_0000_0000_0000_0000_0000_0103),
        name: "Climate model",
        approved: 12000,
        daily_cost: 150,
    },
];

const USAGE_DAYS: i64 = 21;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL must be set in environment");
        std::process::exit(1);
    };

    println!("Connecting to database...");
    let db = match budgetguard_db::connect(&database_url).await {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Failed to connect to database: {e}");
            std::process::exit(1);
        }
    };
    let notifier: Arc<dyn Notifier> = Arc::new(NoopNotifier);

    let subscriptions = SubscriptionRepository::new(db.clone(), Arc::clone(&notifier));
    let budgets = BudgetRepository::new(db.clone(), Arc::clone(&notifier));
    let finances = FinanceRepository::new(db.clone());
    let usage = UsageRepository::new(db.clone(), Arc::clone(&notifier));
    let today = Utc::now().date_naive();

    for demo in &DEMO {
        println!("Seeding {}...", demo.name);

        let details = SubscriptionDetailsInput {
            subscription_id: demo.id,
            display_name: Some(demo.name.to_string()),
            state: SubscriptionState::Enabled,
            role_assignments: json!([{
                "role_name": "Contributor",
                "scope": format!("/subscriptions/{}", demo.id),
                "mail": format!("owner+{}@example.com", demo.id.simple()),
            }]),
        };
        if let Err(e) = subscriptions.record_details(SYSTEM_ADMIN, details).await {
            eprintln!("  Failed to record details: {e}");
            continue;
        }

        match budgets.list_approvals(demo.id).await {
            Ok(existing) if !existing.is_empty() => {
                println!("  Approvals already exist, skipping budget...");
            }
            _ => seed_budget(&budgets, &finances, demo, today).await,
        }

        let rows = daily_usage(demo, today);
        match usage.upload_usage(SYSTEM_ADMIN, &rows).await {
            Ok(n) => println!("  Uploaded {n} usage lines"),
            Err(e) => eprintln!("  Failed to upload usage: {e}"),
        }
    }

    println!("Reconciling desired states...");
    match DesiredStateRepository::new(db, notifier)
        .reconcile_desired_states(SYSTEM_ADMIN, None)
        .await
    {
        Ok(report) => println!(
            "  adjusted: {}, disabled: {}, enabled: {}",
            report.adjusted.len(),
            report.disabled.len(),
            report.enabled.len()
        ),
        Err(e) => eprintln!("  Failed to reconcile: {e}"),
    }

    println!("Seeding complete!");
}

async fn seed_budget(
    budgets: &BudgetRepository,
    finances: &FinanceRepository,
    demo: &DemoSubscription,
    today: NaiveDate,
) {
    let approval = NewApproval {
        subscription_id: demo.id,
        ticket: format!("DEMO-{}", demo.id.simple()),
        amount: Decimal::from(demo.approved),
        currency: "GBP".to_string(),
        date_from: today - Duration::days(USAGE_DAYS),
        date_to: today + Duration::days(180),
        allocate: true,
        force: true,
    };
    if let Err(e) = budgets.approve(SYSTEM_ADMIN, approval).await {
        eprintln!("  Failed to approve budget: {e}");
        return;
    }

    let month = RecoveryMonth::containing(today);
    let finance = NewFinance {
        subscription_id: demo.id,
        ticket: format!("FIN-{}", demo.id.simple()),
        amount: Decimal::from(demo.approved),
        priority: 1,
        finance_code: format!("CC-{:04}", demo.approved),
        date_from: month.next().first_day(),
        date_to: month.next().next().next().last_day(),
    };
    match finances.create(SYSTEM_ADMIN, finance).await {
        Ok(saved) => println!("  Created finance record {}", saved.id),
        Err(e) => eprintln!("  Failed to create finance record: {e}"),
    }
}

fn daily_usage(demo: &DemoSubscription, today: NaiveDate) -> Vec<UsageInput> {
    (1..=USAGE_DAYS)
        .map(|offset| {
            let date = today - Duration::days(offset);
            let cost = Decimal::from(demo.daily_cost);
            UsageInput {
                id: format!("{}-{date}", demo.id.simple()),
                subscription_id: demo.id,
                date,
                cost,
                amortised_cost: Decimal::ZERO,
                total_cost: cost,
                invoice_section: "DEMO".to_string(),
                monthly_upload: None,
            }
        })
        .collect()
}
