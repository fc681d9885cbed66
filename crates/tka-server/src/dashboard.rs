//! Terminal dashboard: polls a running node's `/api/members` endpoint and
//! renders the memberlist as a refreshing table. Pure presentation over
//! the HTTP boundary in `routes::members` - it never touches the gossip
//! engine directly.

use std::time::Duration;

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, ContentArrangement, Table};
use owo_colors::OwoColorize;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct MemberRow {
    id: String,
    address: String,
    advertised_role: String,
    tailscale_ip: String,
    capacity_hint: u32,
    is_local: bool,
    state: String,
}

pub async fn run(base_url: &str, interval_secs: u64) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .context("failed to build HTTP client")?;
    let url = format!("{}/api/members", base_url.trim_end_matches('/'));
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));

    loop {
        ticker.tick().await;
        match fetch(&client, &url).await {
            Ok(rows) => render(&url, &rows),
            Err(e) => eprintln!("{}", format!("failed to poll {url}: {e}").red()),
        }
    }
}

async fn fetch(client: &reqwest::Client, url: &str) -> Result<Vec<MemberRow>> {
    client
        .get(url)
        .send()
        .await
        .context("request failed")?
        .error_for_status()
        .context("non-success response")?
        .json::<Vec<MemberRow>>()
        .await
        .context("failed to decode response body")
}

fn render(url: &str, rows: &[MemberRow]) {
    print!("\x1B[2J\x1B[1;1H");
    println!("{}", format!("tka members  ({url})").bold());

    let mut table = Table::new();
    table
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            "id", "address", "role", "tailscale ip", "capacity", "state",
        ]);

    for row in rows {
        let id = if row.is_local {
            format!("{} (local)", row.id)
        } else {
            row.id.clone()
        };
        let state_cell = Cell::new(&row.state).fg(state_color(&row.state));
        table.add_row(vec![
            Cell::new(id),
            Cell::new(&row.address),
            Cell::new(&row.advertised_role),
            Cell::new(&row.tailscale_ip),
            Cell::new(row.capacity_hint),
            state_cell,
        ]);
    }

    println!("{table}");
}

fn state_color(state: &str) -> Color {
    match state {
        "healthy" => Color::Green,
        "suspected-dead" => Color::Yellow,
        "dead" => Color::Red,
        _ => Color::Grey,
    }
}
