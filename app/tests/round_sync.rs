use std::sync::{Arc, Mutex};

use ori_api::prelude::*;
use ori_app::hooks::{Backend, ContractReader, PushMessage, PushSource};
use ori_app::{
    AppConfig, CellSet, Countdown, ManualClock, Result, RoundSync, RoundView, SyncDeps,
    SyncHandle,
};
use rand::{rngs::StdRng, SeedableRng};
use tokio::{
    sync::{mpsc, watch},
    time::{Duration, Instant},
};

#[derive(Clone, Default)]
struct FakeBackend {
    events: Arc<Mutex<LatestEvents>>,
}

impl FakeBackend {
    fn set_events(&self, round_id: u64, reset_event_round_id: u64) {
        *self.events.lock().unwrap() = LatestEvents {
            round_id,
            reset_event_round_id,
            timestamp: None,
        };
    }
}

impl Backend for FakeBackend {
    async fn latest_events(&self) -> Result<LatestEvents> {
        Ok(*self.events.lock().unwrap())
    }

    async fn round_stats(&self, round_id: u64, _miner: Option<&str>) -> Result<BetStatistics> {
        Ok(BetStatistics::empty(round_id))
    }

    async fn round_winners(&self, round_id: u64) -> Result<RoundWinners> {
        Ok(RoundWinners {
            round_id,
            list: vec![],
        })
    }
}

#[derive(Clone, Default)]
struct FakeContract {
    outcome: Arc<Mutex<Option<(u64, RoundOutcome)>>>,
}

impl FakeContract {
    fn resolve(&self, round_id: u64, winning_square: u8) {
        *self.outcome.lock().unwrap() = Some((
            round_id,
            RoundOutcome {
                randomness_fulfilled: true,
                winning_square,
            },
        ));
    }
}

impl ContractReader for FakeContract {
    async fn snapshot(&self) -> Result<ContractSnapshot> {
        Ok(ContractSnapshot {
            current_round_id: 40,
            ..Default::default()
        })
    }

    async fn round_outcome(&self, round_id: u64) -> Result<RoundOutcome> {
        let outcome = *self.outcome.lock().unwrap();
        Ok(match outcome {
            Some((id, outcome)) if id == round_id => outcome,
            _ => RoundOutcome::default(),
        })
    }

    async fn round_deployed(&self, _round_id: u64) -> Result<[Amount; GRID_SIZE]> {
        Ok([Amount::ZERO; GRID_SIZE])
    }
}

struct FakePush {
    messages: mpsc::UnboundedReceiver<PushMessage>,
}

impl PushSource for FakePush {
    async fn subscribe(&mut self, _channel: &str) -> Result<()> {
        Ok(())
    }

    async fn unsubscribe(&mut self, _channel: &str) -> Result<()> {
        Ok(())
    }

    async fn next_message(&mut self) -> Result<PushMessage> {
        match self.messages.recv().await {
            Some(message) => Ok(message),
            None => std::future::pending().await,
        }
    }
}

struct Fixture {
    backend: FakeBackend,
    contract: FakeContract,
    push: mpsc::UnboundedSender<PushMessage>,
    clock: ManualClock,
    handle: SyncHandle,
    view: watch::Receiver<RoundView>,
}

impl Fixture {
    fn start(events: (u64, u64)) -> Self {
        let backend = FakeBackend::default();
        backend.set_events(events.0, events.1);
        let contract = FakeContract::default();
        let (push, messages) = mpsc::unbounded_channel();
        let clock = ManualClock::new(1_000);

        let handle = RoundSync::spawn_with_rng(
            SyncDeps {
                backend: backend.clone(),
                contract: contract.clone(),
                push: FakePush { messages },
                clock: clock.clone(),
            },
            &AppConfig::default(),
            StdRng::seed_from_u64(7),
        );
        let view = handle.view();
        Self {
            backend,
            contract,
            push,
            clock,
            handle,
            view,
        }
    }

    fn push(&self, channel: &str, event: &str, data: &str) {
        self.push
            .send(PushMessage {
                channel: channel.to_string(),
                event: event.to_string(),
                data: data.to_string(),
            })
            .unwrap();
    }

    async fn wait_for(&mut self, what: &str, pred: impl Fn(&RoundView) -> bool) -> RoundView {
        let view = &mut self.view;
        tokio::time::timeout(Duration::from_secs(30), async {
            loop {
                {
                    let current = view.borrow_and_update();
                    if pred(&current) {
                        return current.clone();
                    }
                }
                view.changed().await.unwrap();
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
    }
}

#[tokio::test(start_paused = true)]
async fn full_round_lifecycle() {
    let mut fx = Fixture::start((40, 40));

    let view = fx.wait_for("round 41", |v| v.round_id == Some(41)).await;
    assert_eq!(view.countdown, Countdown::Waiting);

    fx.handle.toggle_cell(7);
    fx.handle.record_deploy([7].into_iter().collect(), Amount(10));
    fx.wait_for("bet intent", |v| {
        v.selected_cells.contains(7) && v.cell_amounts.get(&7) == Some(&Amount(10))
    })
    .await;

    fx.push("round.new_round", "round.data.started", r#"{"timestamp":1000}"#);
    fx.wait_for("countdown", |v| v.countdown == Countdown::Remaining(60))
        .await;

    fx.clock.set(1_060);
    let view = fx.wait_for("expiry", |v| v.countdown.is_expired()).await;
    assert_eq!(view.countdown.label(), "00:00");

    // the backend has seen bets for 41 but not yet reset it
    fx.backend.set_events(41, 40);
    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(fx.handle.current().round_id, Some(41));

    fx.contract.resolve(41, 7);
    let view = fx.wait_for("draw start", |v| v.is_drawing).await;
    let drawn_at = Instant::now();
    assert_eq!(view.winning_cell, Some(7));
    assert!(!view.show_winner);

    // the round advances mid-draw; it must wait
    fx.backend.set_events(41, 41);

    let view = fx.wait_for("reveal", |v| v.show_winner).await;
    let revealed_after = drawn_at.elapsed();
    assert!(revealed_after >= Duration::from_millis(3_600), "{revealed_after:?}");
    assert!(revealed_after < Duration::from_millis(3_700), "{revealed_after:?}");
    assert_eq!(view.faded_cells.len(), GRID_SIZE - 1);
    assert!(!view.faded_cells.contains(7));
    assert_eq!(view.round_id, Some(41));

    let revealed_at = Instant::now();
    let view = fx
        .wait_for("next round", |v| v.is_idle() && v.round_id == Some(42))
        .await;
    assert!(revealed_at.elapsed() >= Duration::from_secs(5));
    assert_eq!(view.selected_cells, CellSet::EMPTY);
    assert!(view.cell_amounts.is_empty());
    assert_eq!(view.winning_cell, None);

    let mut view = fx.handle.view();
    fx.handle.shutdown().await;
    assert!(view.changed().await.is_err());
}

#[tokio::test(start_paused = true)]
async fn reset_push_draws_and_fetches_winners() {
    let mut fx = Fixture::start((41, 40));
    fx.wait_for("round 41", |v| v.round_id == Some(41)).await;

    fx.push(
        "round.reset",
        "round.data.reset",
        r#"{"round_id":"41","winning_square":3}"#,
    );
    let view = fx
        .wait_for("draw", |v| v.is_drawing && v.winning_cell == Some(3))
        .await;
    assert!(view.faded_cells.len() < GRID_SIZE - 1);

    let view = fx
        .wait_for("winners", |v| v.winners.as_ref().map(|w| w.round_id) == Some(41))
        .await;
    assert!(view.winners.is_some());

    // a late outcome for the same round does not start a second draw
    fx.contract.resolve(41, 9);
    let view = fx.wait_for("draw finished", |v| v.is_idle()).await;
    assert_eq!(view.round_id, Some(41));
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(fx.handle.current().is_idle());

    fx.handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn user_actions_are_ignored_after_shutdown() {
    let mut fx = Fixture::start((40, 40));
    fx.wait_for("round 41", |v| v.round_id == Some(41)).await;
    fx.handle.toggle_select_all();
    let view = fx.wait_for("select all", |v| v.selected_cells.is_full()).await;
    assert_eq!(view.selected_cells.len(), GRID_SIZE);

    let Fixture { handle, push, .. } = fx;
    handle.shutdown().await;
    // the listener has exited and dropped its receiver
    assert!(push
        .send(PushMessage {
            channel: "round.reset".to_string(),
            event: "round.data.reset".to_string(),
            data: "{}".to_string(),
        })
        .is_err());
}
