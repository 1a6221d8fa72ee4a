//! Habit Stake Node
//!
//! `habit-stake serve` (default) runs the WebSocket node.
//! `habit-stake demo` plays a scripted scenario and checks that replaying
//! it reproduces the same ledger digest.

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use habit_stake::{
    core::time::{DAY, HOUR},
    custody::{CommitParams, InMemoryBank, StakeLimits, StakingOrchestrator},
    network::{AuthConfig, HabitNode, NodeConfig, NodeState, ESCROW_LABEL},
    AccountId, Asset, Ledger, Schedule, TokenAddress, UNIT, VERSION,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Habit Stake v{}", VERSION);

    match std::env::args().nth(1).as_deref() {
        None | Some("serve") => serve().await,
        Some("demo") => demo(),
        Some(other) => anyhow::bail!("unknown command {:?} (expected `serve` or `demo`)", other),
    }
}

async fn serve() -> Result<()> {
    let config = NodeConfig::from_env();
    let auth = AuthConfig::from_env();
    if !auth.is_configured() {
        tracing::warn!("no AUTH_SECRET or AUTH_PUBLIC_KEY_PEM set; every write will be refused");
    }

    let state = NodeState::load(&config, auth)
        .await
        .context("failed to load node state")?;
    let node = HabitNode::new(config, state);

    tokio::select! {
        result = node.run() => result.context("node stopped")?,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, shutting down");
            node.shutdown();
        }
    }
    Ok(())
}

/// Scripted scenario: one habit kept, one broken.
fn run_scenario() -> Result<StakingOrchestrator<InMemoryBank>> {
    let start = 1_700_000_000;
    let alice = AccountId::derive("alice");
    let bob = AccountId::derive("bob");
    let charity = AccountId::derive("charity");
    let dai = TokenAddress::derive("DAI");
    let escrow = AccountId::service(ESCROW_LABEL);

    let mut bank = InMemoryBank::new();
    bank.mint_native(alice, 5 * UNIT);
    bank.mint(dai, bob, 100 * UNIT);
    bank.approve(dai, bob, escrow, 100 * UNIT);

    let mut orch = StakingOrchestrator::new(Ledger::new(), bank, escrow, StakeLimits::default())?;

    let kept = orch.commit_native(
        &alice,
        CommitParams {
            name: "Morning run".into(),
            description: "Twice a day for two days".into(),
            beneficiary: charity,
            schedule: Schedule::new(DAY, 2, 2),
        },
        start,
        UNIT,
        start,
    )?;
    let broken = orch.commit(
        &bob,
        CommitParams {
            name: "Read".into(),
            description: "Once a day for a week".into(),
            beneficiary: charity,
            schedule: Schedule::new(DAY, 1, 7),
        },
        start,
        dai,
        50 * UNIT,
        start,
    )?;

    for day in 0..2 {
        for slot in 1..=2 {
            let now = start + day * DAY + slot * HOUR;
            let proof = format!("run-{}-{}", day, slot);
            orch.register_progress(&alice, kept, proof, now)?;
        }
    }
    orch.register_progress(&bob, broken, "chapter-1".into(), start + HOUR)?;

    let later = start + 3 * DAY;
    for id in [kept, broken] {
        let status = orch.status(id, later)?;
        info!(
            "record {}: chain {}/{}, verdict {:?}",
            id, status.chain, status.chain_commitment, status.verdict
        );
    }

    let paid = orch.claim(&alice, kept, later)?;
    info!("record {} paid {} to owner {}", kept, paid.amount, paid.recipient.short());

    // Anyone may trigger the beneficiary payout.
    let paid = orch.claim(&alice, broken, later)?;
    info!("record {} paid {} to beneficiary {}", broken, paid.amount, paid.recipient.short());

    for event in orch.drain_events() {
        info!("event at {} on record {}: {:?}", event.at, event.record_id, event.data);
    }

    info!(
        "custody now holds {} native, {} DAI",
        orch.custodied(&Asset::Native),
        orch.custodied(&Asset::Token(dai))
    );
    Ok(orch)
}

fn demo() -> Result<()> {
    info!("=== Running Demo Scenario ===");
    let first = run_scenario()?;
    let digest = first.ledger().state_digest();
    info!("Final Ledger Digest: {}", hex::encode(digest));

    info!("=== Verifying Determinism ===");
    let replay = run_scenario()?;
    let replay_digest = replay.ledger().state_digest();
    info!("Replay Ledger Digest: {}", hex::encode(replay_digest));

    anyhow::ensure!(digest == replay_digest, "replay produced a different ledger digest");
    info!("DETERMINISM VERIFIED: digests match");
    Ok(())
}
