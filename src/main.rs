mod config;
mod gateway;
mod protocol;
mod source;

use chrono::{Datelike, NaiveDate};
use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::config::{ConfigRepository, FileConfigRepository};
use crate::gateway::TallyGateway;
use crate::protocol::ConnectionStatus;

/// Dashboard server hosting the bridge, backup and dashboard endpoints.
const SERVER_BASE: &str = "http://localhost:9000";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize tracing subscriber with debug logging for this crate
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tally_data_sync=debug".parse().unwrap())
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::time())
        .init();

    info!("Starting Tally data sync client");

    let repository = FileConfigRepository::new(PathBuf::from("./data"));
    let session_config = match repository.load().await {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load session config: {}", e);
            return;
        }
    };
    info!(
        "Loaded session config ({} mode)",
        session_config.connection_type()
    );

    let mut gateway = TallyGateway::new(session_config, SERVER_BASE);

    // First run in bridge mode: mint a pairing token for the relay.
    if gateway.config().is_bridge_mode() && gateway.config().bridge_token().is_none() {
        let token = config::generate_bridge_token();
        info!("Generated bridge pairing token {}", token);
        gateway.set_bridge_token(Some(token));
    }

    if let Ok(token) = std::env::var("TALLY_AUTH_TOKEN") {
        gateway.set_auth_token(Some(token));
    }

    if gateway.config().is_bridge_mode() {
        match gateway.list_bridges().await {
            Ok(bridges) => info!("{} relays registered with the server", bridges.len()),
            Err(e) => warn!("Could not list relays: {}", e),
        }
    }

    if let Ok(path) = std::env::var("TALLY_BACKUP_FILE") {
        match gateway.upload_backup(std::path::Path::new(&path)).await {
            Ok(receipt) => info!(
                "Uploaded backup ({} companies extracted in {:?})",
                receipt.company_count, receipt.elapsed
            ),
            Err(e) => error!("Backup upload failed: {}", e),
        }
    }

    let status = gateway.test_connection().await;
    info!("Connection status: {}", status);
    if status != ConnectionStatus::Connected {
        warn!("No live connection; fetches will lean on the backup snapshot");
    }

    let companies = gateway.get_companies().await;
    if !companies.success {
        error!(
            "Company fetch failed on every source: {}",
            companies.error.as_deref().unwrap_or("unknown error")
        );
        return;
    }
    info!(
        "Fetched {} companies from {:?} source{}",
        companies.data.len(),
        companies.source,
        if companies.auto_fallback {
            " (cached data after live failure)"
        } else {
            ""
        }
    );

    let Some(company) = companies.data.first() else {
        warn!("No companies available; nothing further to fetch");
        return;
    };
    info!("Using company {:?}", company.name);

    let ledgers = gateway.get_ledgers(&company.name).await;
    info!(
        "Fetched {} ledgers from {:?} source",
        ledgers.data.len(),
        ledgers.source
    );

    let (from, to) = financial_year(company.financial_year_start.as_str());
    let vouchers = gateway.get_vouchers(&company.name, from, to).await;
    info!(
        "Fetched {} vouchers for {} to {} from {:?} source",
        vouchers.data.len(),
        from,
        to,
        vouchers.source
    );

    let sales = gateway.get_dashboard("sales", &company.name, false).await;
    if sales.success {
        info!("Sales dashboard payload ready from {:?} source", sales.source);
    } else {
        warn!(
            "Sales dashboard unavailable: {}",
            sales.error.as_deref().unwrap_or("unknown error")
        );
    }

    // Persist whatever settings the session ended up with.
    if let Err(e) = repository.save(gateway.config()).await {
        error!("Failed to persist session config: {}", e);
    }
}

/// Derive the reporting period from a company's financial year start,
/// defaulting to the year to date when Tally did not report one.
fn financial_year(starting_from: &str) -> (NaiveDate, NaiveDate) {
    match NaiveDate::parse_from_str(starting_from, "%Y%m%d") {
        Ok(start) => {
            let end = start
                .checked_add_months(chrono::Months::new(12))
                .and_then(|d| d.pred_opt())
                .unwrap_or(start);
            (start, end)
        }
        Err(_) => {
            let today = chrono::Utc::now().date_naive();
            (today.with_ordinal(1).unwrap_or(today), today)
        }
    }
}
