//! loyalty-runner: headless driver for the loyalty core.
//!
//! Usage:
//!   loyalty-runner --seed 7 --db loyalty.db
//!   loyalty-runner --config loyalty.json --ipc-mode

use anyhow::Result;
use chrono::{Duration, Utc};
use loyalty_core::{
    accrual::{AdjustmentAction, PointsAdjustment},
    analytics::TimeRange,
    config::LoyaltyConfig,
    directory::DirectoryQuery,
    model::{MerchantSession, PaymentMethod},
    service::{LoyaltyService, NewCustomer, NewTransaction},
    store::LoyaltyStore,
};
use rust_decimal::Decimal;
use std::env;
use std::io::{self, BufRead, Write};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    RegisterMerchant {
        business_name: String,
        merchant_code: String,
    },
    RegisterCustomer {
        merchant_id: String,
        #[serde(flatten)]
        customer: NewCustomer,
    },
    Insights {
        merchant_id: String,
    },
    Directory {
        merchant_id: String,
        #[serde(default)]
        query: DirectoryQuery,
    },
    Analytics {
        merchant_id: String,
        #[serde(default)]
        range: TimeRange,
    },
    RecordTransaction {
        merchant_id: String,
        #[serde(flatten)]
        transaction: NewTransaction,
    },
    CompleteTransaction {
        merchant_id: String,
        transaction_id: String,
    },
    AdjustPoints {
        merchant_id: String,
        customer_id: String,
        action: AdjustmentAction,
        points: String,
        #[serde(default)]
        reason: String,
    },
    RedeemPoints {
        merchant_id: String,
        customer_id: String,
        points: i64,
    },
    Scan {
        merchant_id: String,
        code: String,
    },
    Quit,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let db = flag_value(&args, "--db").unwrap_or(":memory:");
    let config = match flag_value(&args, "--config") {
        Some(path) => LoyaltyConfig::load(path)?,
        None => LoyaltyConfig::default(),
    };

    if !ipc_mode {
        println!("loyalty-runner");
        println!("  seed:  {seed}");
        println!("  db:    {db}");
        println!();
    }

    let store = LoyaltyStore::open(db)?;
    store.migrate()?;
    let mut service = LoyaltyService::new(store, config, seed);

    if ipc_mode {
        run_ipc_loop(&mut service)?;
    } else {
        let session = seed_demo(&mut service)?;
        print_summary(&service, &session)?;
    }
    Ok(())
}

fn run_ipc_loop(service: &mut LoyaltyService) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                let err_json = serde_json::json!({ "error": e.to_string() });
                writeln!(stdout, "{}", err_json)?;
                stdout.flush()?;
                continue;
            }
        };
        if matches!(cmd, IpcCommand::Quit) {
            break;
        }

        // Rejected operations answer with an error line; the loop keeps going.
        let reply = match handle_command(service, cmd) {
            Ok(value) => serde_json::json!({ "ok": value }),
            Err(e) => {
                log::warn!("command failed: {e}");
                serde_json::json!({ "error": e.to_string() })
            }
        };
        writeln!(stdout, "{}", reply)?;
        stdout.flush()?;
    }
    Ok(())
}

fn handle_command(service: &mut LoyaltyService, cmd: IpcCommand) -> Result<serde_json::Value> {
    let now = Utc::now();
    let value = match cmd {
        IpcCommand::RegisterMerchant { business_name, merchant_code } => {
            let session = service.register_merchant(&business_name, &merchant_code, now)?;
            serde_json::to_value(session)?
        }
        IpcCommand::RegisterCustomer { merchant_id, customer } => {
            let session = MerchantSession::new(merchant_id, "ipc");
            serde_json::to_value(service.register_customer(&session, customer, now)?)?
        }
        IpcCommand::Insights { merchant_id } => {
            let session = MerchantSession::new(merchant_id, "ipc");
            serde_json::to_value(service.customer_insights(&session, now)?)?
        }
        IpcCommand::Directory { merchant_id, query } => {
            let session = MerchantSession::new(merchant_id, "ipc");
            serde_json::to_value(service.customer_directory(&session, &query, now)?)?
        }
        IpcCommand::Analytics { merchant_id, range } => {
            let session = MerchantSession::new(merchant_id, "ipc");
            serde_json::to_value(service.analytics(&session, range, now)?)?
        }
        IpcCommand::RecordTransaction { merchant_id, transaction } => {
            let session = MerchantSession::new(merchant_id, "ipc");
            serde_json::to_value(service.record_transaction(&session, transaction, now)?)?
        }
        IpcCommand::CompleteTransaction { merchant_id, transaction_id } => {
            let session = MerchantSession::new(merchant_id, "ipc");
            serde_json::to_value(service.complete_transaction(&session, &transaction_id, now)?)?
        }
        IpcCommand::AdjustPoints { merchant_id, customer_id, action, points, reason } => {
            let session = MerchantSession::new(merchant_id, "ipc");
            let adjustment = PointsAdjustment::from_input(action, &points, &reason)?;
            serde_json::to_value(service.adjust_points(&session, &customer_id, &adjustment, now)?)?
        }
        IpcCommand::RedeemPoints { merchant_id, customer_id, points } => {
            let session = MerchantSession::new(merchant_id, "ipc");
            serde_json::to_value(service.redeem_points(&session, &customer_id, points, now)?)?
        }
        IpcCommand::Scan { merchant_id, code } => {
            let session = MerchantSession::new(merchant_id, "ipc");
            serde_json::to_value(service.scan_customer(&session, &code)?)?
        }
        IpcCommand::Quit => serde_json::Value::Null,
    };
    Ok(value)
}

/// A small café with a handful of regulars, backdated so every segment shows up.
fn seed_demo(service: &mut LoyaltyService) -> Result<MerchantSession> {
    let now = Utc::now();
    let opened = now - Duration::days(400);
    let session = service.register_merchant("Demo Coffee", "DEMO-COFFEE", opened)?;

    // (first, last, joined days ago, [(amount, days ago)])
    let roster: [(&str, &str, i64, &[(i64, i64)]); 6] = [
        ("Ada", "Lovelace", 380, &[(420, 2), (310, 12), (95, 45)]),
        ("Grace", "Hopper", 300, &[(48, 5), (52, 20), (30, 50)]),
        ("Alan", "Turing", 250, &[(35, 8), (40, 70)]),
        ("Edsger", "Dijkstra", 360, &[(60, 150)]),
        ("Barbara", "Liskov", 10, &[(12, 1)]),
        ("Ken", "Thompson", 200, &[]),
    ];

    for (first, last, joined, visits) in roster {
        let customer = service.register_customer(
            &session,
            NewCustomer {
                first_name: first.to_string(),
                last_name:  last.to_string(),
                email:      Some(format!("{}@demo.example", first.to_lowercase())),
                phone:      None,
                code:       None,
            },
            now - Duration::days(joined),
        )?;
        for &(amount, days_ago) in visits {
            service.record_transaction(
                &session,
                NewTransaction {
                    customer_id:    customer.customer_id.clone(),
                    amount:         Decimal::from(amount),
                    payment_method: PaymentMethod::Card,
                    notes:          None,
                    currency:       None,
                    pending:        false,
                },
                now - Duration::days(days_ago),
            )?;
        }
    }
    Ok(session)
}

fn print_summary(service: &LoyaltyService, session: &MerchantSession) -> Result<()> {
    let now = Utc::now();
    let merchant = service.store().merchant(&session.merchant_id)?;
    let insights = service.customer_insights(session, now)?;

    println!("=== {} ({}) ===", merchant.business_name, merchant.merchant_code);
    println!();
    println!("=== CUSTOMER INSIGHTS ===");
    for i in &insights {
        let last_visit = i
            .days_since_last_visit
            .map(|d| format!("{d}d ago"))
            .unwrap_or_else(|| "never".to_string());
        println!(
            "  {:<18} {:<8} spent {:>8} | points {:>5} | trend {:?} | last {}",
            format!("{} {}", i.first_name, i.last_name),
            i.segment.label(),
            i.total_spent,
            i.loyalty_points,
            i.spending_trend,
            last_visit
        );
    }

    println!();
    println!("=== LAST 30 DAYS ===");
    match service.analytics(session, TimeRange::Month, now)? {
        Some(report) => {
            println!("  sales:        {}", report.total_sales);
            println!("  transactions: {}", report.total_transactions);
            println!("  customers:    {}", report.unique_customers);
            println!("  avg ticket:   {:.2}", report.avg_transaction_value);
            for top in &report.top_customers {
                println!("    {:<18} {:>8} ({} visits)", top.name, top.total, top.visits);
            }
        }
        None => println!("  (no completed transactions)"),
    }
    Ok(())
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
