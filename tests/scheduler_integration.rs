//! Integration tests for the cycle scheduler over an in-memory transport

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rcss_agent::core::config::AgentConfig;
use rcss_agent::policy::{ChaseBallPolicy, DecisionPolicy};
use rcss_agent::protocol::Command;
use rcss_agent::scheduler::{CycleScheduler, SchedulerState};
use rcss_agent::transport::{channel_pair, ChannelPeer};
use rcss_agent::world::{Registry, WorldSnapshot};

/// What the policy saw on one firing
#[derive(Debug, Clone, Copy)]
struct Seen {
    time: u32,
    stale: bool,
    ball: bool,
}

#[derive(Default)]
struct RecordingPolicy {
    seen: Mutex<Vec<Seen>>,
    flood: bool,
}

impl RecordingPolicy {
    fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }
}

impl DecisionPolicy for RecordingPolicy {
    fn decide(&self, snapshot: &WorldSnapshot) -> Vec<Command> {
        self.seen.lock().unwrap().push(Seen {
            time: snapshot.time(),
            stale: snapshot.is_stale(),
            ball: snapshot.ball().is_some(),
        });
        if !self.flood {
            return Vec::new();
        }
        vec![
            Command::Dash { power: 10.0, direction: None },
            Command::Dash { power: 20.0, direction: None },
            Command::Turn { moment: 5.0 },
            Command::Turn { moment: 6.0 },
            Command::Kick { power: 50.0, direction: 0.0 },
            Command::Kick { power: 60.0, direction: 0.0 },
            Command::Bye,
        ]
    }
}

fn setup(
    config: AgentConfig,
    policy: Arc<dyn DecisionPolicy>,
) -> (CycleScheduler, ChannelPeer) {
    let config = Arc::new(config);
    let registry = Registry::new(Arc::clone(&config)).into_shared();
    let (transport, peer) = channel_pair();
    let scheduler = CycleScheduler::new(config, registry, Arc::new(transport), policy);
    (scheduler, peer)
}

#[tokio::test(start_paused = true)]
async fn test_at_most_one_command_per_category() {
    let policy = Arc::new(RecordingPolicy {
        flood: true,
        ..Default::default()
    });
    let (mut scheduler, mut peer) = setup(AgentConfig::default(), policy.clone());

    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_millis(550)).await;
    let report = scheduler.stop().await.unwrap();

    let firings = policy.seen().len() as u64;
    assert!(firings >= 5);
    assert_eq!(report.actuation.firings, firings);
    assert_eq!(report.actuation.max_sent_per_firing, 3);
    assert_eq!(report.actuation.commands_sent, firings * 3);
    assert_eq!(report.actuation.commands_dropped, firings * 4);

    let sent = peer.drain_sent();
    let (body, tail) = sent.split_at(sent.len() - 1);
    assert_eq!(tail, ["(bye)".to_string()]);
    for firing in body.chunks(3) {
        assert_eq!(firing, ["(dash 10)", "(turn 5)", "(kick 50 0)"]);
    }
}

#[tokio::test(start_paused = true)]
async fn test_policy_sees_ingested_perception() {
    let policy = Arc::new(RecordingPolicy::default());
    let (mut scheduler, peer) = setup(AgentConfig::default(), policy.clone());

    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(peer.deliver("(see 7 ((b) 3.0 10.0))\0"));
    tokio::time::sleep(Duration::from_millis(200)).await;
    let report = scheduler.stop().await.unwrap();

    let seen = policy.seen();
    assert!(!seen.first().unwrap().ball);
    let first_with_ball = seen.iter().position(|s| s.ball).expect("ball never seen");
    assert_eq!(seen[first_with_ball].time, 7);
    assert!(seen[first_with_ball..].iter().all(|s| s.ball));
    assert_eq!(report.ingest.perceptions, 1);
    assert_eq!(report.latest_time, Some(7));
}

#[tokio::test(start_paused = true)]
async fn test_silence_marks_snapshots_stale() {
    let mut config = AgentConfig::default();
    config.schedule.stale_after_cycles = 3;
    let policy = Arc::new(RecordingPolicy::default());
    let (mut scheduler, peer) = setup(config, policy.clone());

    assert!(peer.deliver("(see 20 ((b) 3.0 10.0))"));
    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_millis(750)).await;
    scheduler.stop().await.unwrap();

    let seen = policy.seen();
    assert!(seen.len() >= 6);
    assert!(!seen[0].stale);
    assert!(seen.last().unwrap().stale);
    // Time keeps advancing while the server is silent
    let times: Vec<u32> = seen.iter().map(|s| s.time).collect();
    assert!(times.windows(2).all(|w| w[1] >= w[0]));
    assert!(*times.last().unwrap() > 20);
}

#[tokio::test(start_paused = true)]
async fn test_body_states_without_perception_go_stale() {
    let mut config = AgentConfig::default();
    config.schedule.stale_after_cycles = 3;
    let policy = Arc::new(RecordingPolicy::default());
    let (mut scheduler, peer) = setup(config, policy.clone());

    assert!(peer.deliver("(see 20 ((b) 3.0 10.0))"));
    scheduler.start().unwrap();
    for time in 21..29 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(peer.deliver(&format!("(sense_body {} (stamina 8000 1) (head_angle 0))", time)));
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    let report = scheduler.stop().await.unwrap();

    let seen = policy.seen();
    assert!(!seen[0].stale);
    assert!(seen.last().unwrap().stale);
    assert_eq!(report.ingest.body_states, 8);
    assert_eq!(report.latest_time, Some(28));
}

#[tokio::test(start_paused = true)]
async fn test_garbage_does_not_stop_the_loop() {
    let policy = Arc::new(RecordingPolicy::default());
    let (mut scheduler, peer) = setup(AgentConfig::default(), policy.clone());
    let mut states = scheduler.watch_state();

    scheduler.start().unwrap();
    for junk in ["", "((((", ")(", "(see x)", "(see 3 ((zz 1 2) 1 2) ((b) q 4))", "(hear 3 referee)"] {
        assert!(peer.deliver(junk));
    }
    assert!(peer.deliver("(see 4 ((b) 1 1))"));
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(*states.borrow_and_update(), SchedulerState::Running);

    let report = scheduler.stop().await.unwrap();
    assert_eq!(report.ingest.messages, 7);
    assert_eq!(report.ingest.parse_errors, 4);
    assert_eq!(report.ingest.perceptions, 2);
    assert_eq!(report.latest_time, Some(4));
    assert_eq!(*states.borrow_and_update(), SchedulerState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_peer_disconnect_is_not_fatal() {
    let policy = Arc::new(RecordingPolicy {
        flood: true,
        ..Default::default()
    });
    let (mut scheduler, peer) = setup(AgentConfig::default(), policy.clone());

    scheduler.start().unwrap();
    drop(peer);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(scheduler.state(), SchedulerState::Running);

    let report = scheduler.stop().await.unwrap();
    assert!(report.actuation.send_failures >= 3);
    assert_eq!(report.actuation.commands_sent, 0);
    assert!(!report.bye_sent);
    assert!(policy.seen().len() >= 3);
}

#[tokio::test(start_paused = true)]
async fn test_chase_policy_turns_then_dashes() {
    let mut config = AgentConfig::default();
    config.schedule.send_bye_on_stop = false;
    let (mut scheduler, mut peer) = setup(config, Arc::new(ChaseBallPolicy::default()));

    assert!(peer.deliver("(see 1 ((b) 12 40))"));
    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(peer.deliver("(see 2 ((b) 11 2))"));
    tokio::time::sleep(Duration::from_millis(100)).await;
    let report = scheduler.stop().await.unwrap();

    assert!(!report.bye_sent);
    let sent = peer.drain_sent();
    assert!(sent.contains(&"(dash 80)".to_string()));
    assert!(sent.iter().all(|c| c.starts_with("(turn") || c == "(dash 80)"));
}
