//! Two pump sessions sharing one simulated controller line.

use nemesys::sim::{Command, SimulatedEpos};
use nemesys::{HomingDirection, NodeId, PumpConfig, PumpSession, SharedBus};

const PUMP_A: NodeId = NodeId(2);
const PUMP_B: NodeId = NodeId(3);

async fn open(bus: &SharedBus<SimulatedEpos>, name: &str, node: NodeId) -> PumpSession {
    PumpSession::open(Box::new(bus.clone()), PumpConfig::new(name, node))
        .await
        .expect("session should open")
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_sessions_stay_independent() {
    let bus = SharedBus::new(SimulatedEpos::new());
    let mut pump_a = open(&bus, "pump_a", PUMP_A).await;
    let mut pump_b = open(&bus, "pump_b", PUMP_B).await;
    assert_eq!(bus.open_handles(), 2);

    let (a, b) = tokio::join!(pump_a.aspirate(100.0, 10.0), pump_b.aspirate(40.0, 20.0));
    a.unwrap();
    b.unwrap();

    assert_eq!(pump_a.position().await.unwrap(), -100.0);
    assert_eq!(pump_b.position().await.unwrap(), -40.0);

    let (journal_a, journal_b) = bus
        .with_transport(|sim| (sim.journal(PUMP_A), sim.journal(PUMP_B)))
        .await;
    assert!(journal_a.contains(&Command::MoveToPosition {
        target: -77_800,
        absolute: true,
        immediately: true
    }));
    assert!(journal_b.contains(&Command::MoveToPosition {
        target: -31_120,
        absolute: true,
        immediately: true
    }));

    pump_a.close().await.unwrap();
    pump_b.close().await.unwrap();
}

#[tokio::test]
async fn test_last_handle_closes_the_line() {
    let bus = SharedBus::new(SimulatedEpos::new());
    let pump_a = open(&bus, "pump_a", PUMP_A).await;
    let pump_b = open(&bus, "pump_b", PUMP_B).await;

    pump_a.close().await.unwrap();
    assert_eq!(bus.open_handles(), 1);
    assert!(bus.with_transport(|sim| sim.is_open()).await);

    // The remaining session still talks to its node.
    assert_eq!(pump_b.raw_position().await.unwrap(), 0);

    pump_b.close().await.unwrap();
    assert_eq!(bus.open_handles(), 0);
    assert!(!bus.with_transport(|sim| sim.is_open()).await);
}

#[tokio::test(start_paused = true)]
async fn test_sessions_move_across_tasks() {
    let bus = SharedBus::new(SimulatedEpos::new());
    let handles: Vec<_> = [("pump_a", PUMP_A), ("pump_b", PUMP_B)]
        .into_iter()
        .map(|(name, node)| {
            let bus = bus.clone();
            tokio::spawn(async move {
                let mut pump = open(&bus, name, node).await;
                pump.home(HomingDirection::Positive, true).await?;
                pump.toggle_valve().await?;
                pump.move_to(-50.0, 50.0, true).await?;
                let position = pump.position().await?;
                pump.close().await?;
                Ok::<_, nemesys::PumpError>(position)
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), -50.0);
    }
    assert_eq!(bus.open_handles(), 0);

    let outputs = bus
        .with_transport(|sim| (sim.digital_outputs(PUMP_A), sim.digital_outputs(PUMP_B)))
        .await;
    assert_eq!(outputs, (0x1000, 0x1000));
}
