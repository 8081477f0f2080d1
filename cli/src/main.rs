use std::str::FromStr;

use anyhow::Context;
use ori_api::prelude::*;
use ori_app::components::{grid, Overview};
use ori_app::hooks::{Backend, ContractReader, EvmContractReader, HttpBackend, PusherClient};
use ori_app::{AppConfig, RoundSync, RoundView, SyncDeps, SystemClock};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env().context("loading configuration")?;
    let command = std::env::var("COMMAND").unwrap_or_else(|_| "watch".to_string());
    match command.as_str() {
        "watch" => watch(&config).await,
        "events" => log_events(&config).await,
        "round" => log_round(&config).await,
        "winners" => log_winners(&config).await,
        "outcome" => log_outcome(&config).await,
        "contract" => log_contract(&config).await,
        "board" => log_board(&config).await,
        other => anyhow::bail!("unknown COMMAND {other:?}"),
    }
}

fn backend(config: &AppConfig) -> anyhow::Result<HttpBackend> {
    Ok(HttpBackend::new(&config.api_base_url)?)
}

fn contract(config: &AppConfig) -> anyhow::Result<EvmContractReader> {
    Ok(EvmContractReader::from_config(config)?)
}

/// Round id from `ROUND`, or the backend's live round.
async fn round_arg(backend: &HttpBackend) -> anyhow::Result<u64> {
    match std::env::var("ROUND") {
        Ok(id) => u64::from_str(id.trim()).with_context(|| format!("invalid ROUND {id:?}")),
        Err(_) => Ok(backend.latest_events().await?.effective_round_id()),
    }
}

fn amount(config: &AppConfig, amount: Amount) -> String {
    amount.format(
        config.decimals,
        FormatOptions {
            compact: false,
            with_comma: true,
            ..Default::default()
        },
    )
}

async fn watch(config: &AppConfig) -> anyhow::Result<()> {
    let contract = contract(config)?;
    contract.verify_chain().await.context("checking rpc chain")?;
    let handle = RoundSync::spawn(
        SyncDeps {
            backend: backend(config)?,
            contract,
            push: PusherClient::new(&config.push)?,
            clock: SystemClock,
        },
        config,
    );
    let mut view = handle.view();
    let mut last = RoundView::default();
    info!(api = %config.api_base_url, "watching rounds, ctrl-c to stop");

    loop {
        tokio::select! {
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = view.borrow_and_update().clone();
                print_transition(config, &last, &current);
                last = current;
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    handle.shutdown().await;
    Ok(())
}

fn print_transition(config: &AppConfig, last: &RoundView, current: &RoundView) {
    let round_changed = last.round_id != current.round_id;
    let reveal = !last.show_winner && current.show_winner;
    let draw = !last.is_drawing && current.is_drawing;
    if round_changed || reveal || draw || last.countdown != current.countdown {
        println!("{}", Overview::from_view(current, config.decimals));
    }
    if round_changed || reveal {
        print!("{}", grid::render(&grid::cells(current, None, config.decimals)));
    }
    if reveal {
        if let Some(cell) = current.winning_cell {
            println!("  Winning square: #{}", cell + 1);
        }
    }
}

async fn log_events(config: &AppConfig) -> anyhow::Result<()> {
    let events = backend(config)?.latest_events().await?;
    println!("Latest events");
    println!("  Round id: {}", events.round_id);
    println!("  Reset event round id: {}", events.reset_event_round_id);
    match events.timestamp {
        Some(ts) => println!("  Started at: {}", ts),
        None => println!("  Started at: unknown"),
    }
    let round = Round::from_events(&events);
    println!("  Live round: {}", round.round_id);
    match round.ends_at() {
        Some(ts) => println!("  Closes at: {}", ts),
        None => println!("  Closes at: unknown"),
    }
    println!("  Settled: {}", round.is_reset());
    Ok(())
}

async fn log_round(config: &AppConfig) -> anyhow::Result<()> {
    let backend = backend(config)?;
    let round_id = round_arg(&backend).await?;
    let stats = backend
        .round_stats(round_id, config.miner_address.as_deref())
        .await?;
    println!("Round {}", stats.round_id);
    println!("  Miners: {}", stats.total_miners());
    println!("  Total deployed: {}", amount(config, stats.total_deployed()));
    if config.miner_address.is_some() {
        println!("  User deployed: {}", amount(config, stats.user_deployed()));
    }
    for (square, cell) in stats.global.iter().enumerate() {
        if cell.count > 0 || !cell.amount.is_zero() {
            println!(
                "  #{:<2} {:>3} miners  {}",
                square + 1,
                cell.count,
                amount(config, cell.amount)
            );
        }
    }
    Ok(())
}

async fn log_winners(config: &AppConfig) -> anyhow::Result<()> {
    let backend = backend(config)?;
    let round_id = match std::env::var("ROUND") {
        Ok(_) => round_arg(&backend).await?,
        // the live round has no winners yet
        Err(_) => backend.latest_events().await?.reset_event_round_id,
    };
    let winners = backend.round_winners(round_id).await?;
    println!("Round {} winners", winners.round_id);
    for winner in &winners.list {
        let square = winner
            .square
            .map(|s| format!("#{}", s + 1))
            .unwrap_or_else(|| "--".to_string());
        println!("  {} {:>4} {}", winner.address, square, amount(config, winner.amount));
    }
    println!("  Total paid: {}", amount(config, winners.total_paid()));
    Ok(())
}

async fn log_outcome(config: &AppConfig) -> anyhow::Result<()> {
    let round_id = round_arg(&backend(config)?).await?;
    let outcome = contract(config)?.round_outcome(round_id).await?;
    println!("Round {} outcome", round_id);
    println!("  Randomness fulfilled: {}", outcome.randomness_fulfilled);
    match outcome.winner() {
        Some(square) => println!("  Winning square: #{}", square + 1),
        None => println!("  Winning square: pending"),
    }
    Ok(())
}

async fn log_contract(config: &AppConfig) -> anyhow::Result<()> {
    let contract = contract(config)?;
    let chain_id = contract.verify_chain().await?;
    let snapshot = contract.snapshot().await?;
    println!("Contract");
    println!("  Chain id: {}", chain_id);
    println!("  Address: {}", config.read_contract);
    println!("  Current round id: {}", snapshot.current_round_id);
    println!("  Paused: {}", snapshot.game.paused);
    println!("  Round duration: {} sec", snapshot.game.round_duration);
    println!("  Min deploy: {}", amount(config, snapshot.game.min_deploy));
    println!("Treasury");
    println!("  Balance: {}", amount(config, snapshot.treasury.balance));
    println!("  Motherlode: {}", amount(config, snapshot.treasury.motherlode));
    println!("  Total staked: {}", amount(config, snapshot.treasury.total_staked));
    Ok(())
}

async fn log_board(config: &AppConfig) -> anyhow::Result<()> {
    let contract = contract(config)?;
    let round_id = match std::env::var("ROUND") {
        Ok(id) => u64::from_str(id.trim()).with_context(|| format!("invalid ROUND {id:?}"))?,
        Err(_) => contract.snapshot().await?.current_round_id,
    };
    let deployed = contract.round_deployed(round_id).await?;
    let total: Amount = deployed.iter().copied().sum();
    println!("Board");
    println!("  Round id: {}", round_id);
    for row in deployed.chunks(5) {
        let cells: Vec<String> = row.iter().map(|a| format!("{:>10}", amount(config, *a))).collect();
        println!("  {}", cells.join(" "));
    }
    println!("  Total deployed: {}", amount(config, total));
    Ok(())
}
