use lightflow_control::{
    ChannelTable, ControlError, EffectConfig, EffectContext, EffectHost, EffectRegistry,
    EffectState, EventBus, LightEffect, PipelineEvent, Result,
};
use lightflow_core::{BandEnergy, BeatEvent};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Effect whose audio callbacks always fail
struct Faulty {
    state: EffectState,
    calls: Arc<AtomicU32>,
}

impl LightEffect for Faulty {
    fn name(&self) -> &str {
        "Faulty"
    }

    fn description(&self) -> &str {
        "fails every audio callback"
    }

    fn state(&self) -> EffectState {
        self.state
    }

    fn initialize(&mut self, _config: EffectConfig) -> Result<()> {
        self.state = EffectState::Initialized;
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        self.state = EffectState::Running;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.state = EffectState::Stopped;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.state = EffectState::Paused;
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        self.state = EffectState::Running;
        Ok(())
    }

    fn update_config(&mut self, _config: EffectConfig) -> Result<()> {
        Ok(())
    }

    fn on_band_energy(&mut self, _bands: &BandEnergy) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ControlError::effect("Faulty", "band energy rejected"))
    }

    fn on_beat(&mut self, _beat: &BeatEvent) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ControlError::effect("Faulty", "beat rejected"))
    }
}

fn host_with_faulty(calls: Arc<AtomicU32>, bus: &EventBus) -> EffectHost {
    let mut registry = EffectRegistry::with_builtin();
    registry
        .register(
            "Faulty",
            "fails every audio callback",
            Arc::new(move |_ctx: EffectContext| {
                Box::new(Faulty {
                    state: EffectState::Uninitialized,
                    calls: calls.clone(),
                }) as Box<dyn LightEffect>
            }),
        )
        .unwrap();
    let context = EffectContext::new(Arc::new(ChannelTable::new(4)));
    EffectHost::new(registry, context).with_events(bus.clone())
}

fn bands() -> BandEnergy {
    BandEnergy::new(0.2, 0.1, 0.05, 0.0)
}

fn state_changes(events: &[PipelineEvent], name: &str) -> Vec<EffectState> {
    events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::EffectStateChanged { effect, state } if effect == name => Some(*state),
            _ => None,
        })
        .collect()
}

#[test]
fn test_pulse_lifecycle_and_reactivation() {
    let bus = EventBus::new(128);
    let table = Arc::new(ChannelTable::new(5));
    let mut host = EffectHost::new(
        EffectRegistry::with_builtin(),
        EffectContext::new(table.clone()),
    )
    .with_events(bus.clone());

    host.activate("Pulse", EffectConfig::default()).unwrap();
    assert_eq!(host.active_state(), Some(EffectState::Running));

    // The timing loop writes magenta into every channel
    thread::sleep(Duration::from_millis(100));
    let frame = table.snapshot();
    assert!(frame.iter().all(|s| s.color.r == 255 && s.color.b == 255));

    // Re-activating replaces the instance: old one stopped before the new one starts
    host.activate("Pulse", EffectConfig::default()).unwrap();
    assert_eq!(host.active_state(), Some(EffectState::Running));

    host.deactivate().unwrap();
    assert_eq!(host.active_state(), None);

    let events: Vec<_> = bus.subscribe().try_iter().collect();
    assert_eq!(
        state_changes(&events, "Pulse"),
        vec![
            EffectState::Initialized,
            EffectState::Running,
            EffectState::Stopped,
            EffectState::Initialized,
            EffectState::Running,
            EffectState::Stopped,
        ]
    );
    assert!(matches!(
        events.last(),
        Some(PipelineEvent::ActiveEffectChanged { name: None })
    ));
}

#[test]
fn test_failures_are_isolated_then_auto_deactivate() {
    let bus = EventBus::new(128);
    let calls = Arc::new(AtomicU32::new(0));
    let mut host = host_with_faulty(calls.clone(), &bus);
    host.activate("Faulty", EffectConfig::default()).unwrap();

    for _ in 0..4 {
        host.dispatch_band_energy(&bands());
    }
    assert_eq!(host.consecutive_failures(), 4);
    assert_eq!(host.active_name(), Some("Faulty"));

    host.dispatch_band_energy(&bands());
    assert_eq!(host.active_name(), None);

    // Nothing active, nothing dispatched
    host.dispatch_band_energy(&bands());
    assert_eq!(calls.load(Ordering::SeqCst), 5);

    let events: Vec<_> = bus.subscribe().try_iter().collect();
    let errors: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::EffectError { consecutive, .. } => Some(*consecutive),
            _ => None,
        })
        .collect();
    assert_eq!(errors, vec![1, 2, 3, 4, 5]);
    assert!(events.contains(&PipelineEvent::ActiveEffectChanged { name: None }));
}

#[test]
fn test_custom_failure_threshold() {
    let bus = EventBus::new(64);
    let calls = Arc::new(AtomicU32::new(0));
    let mut host = host_with_faulty(calls, &bus).with_max_failures(2);
    host.activate("Faulty", EffectConfig::default()).unwrap();

    let beat = BeatEvent {
        energy: 1.0,
        bpm: 0.0,
        confidence: 0.1,
        timestamp: 0.0,
    };
    host.dispatch_beat(&beat);
    assert!(host.active_name().is_some());
    host.dispatch_beat(&beat);
    assert!(host.active_name().is_none());
}

#[test]
fn test_every_builtin_runs() {
    let table = Arc::new(ChannelTable::new(6));
    let mut host = EffectHost::new(
        EffectRegistry::with_builtin(),
        EffectContext::new(table.clone()),
    );
    let beat = BeatEvent {
        energy: 1.0,
        bpm: 120.0,
        confidence: 0.5,
        timestamp: 0.0,
    };
    let names: Vec<_> = host.available().into_iter().map(|i| i.name).collect();
    for name in names {
        host.activate(&name, EffectConfig::default()).unwrap();
        for _ in 0..3 {
            host.dispatch_band_energy(&bands());
            host.dispatch_beat(&beat);
        }
        thread::sleep(Duration::from_millis(20));
        assert_eq!(host.consecutive_failures(), 0, "{} failed", name);
        assert_eq!(host.active_state(), Some(EffectState::Running));
    }
    host.shutdown();
    assert!(table.snapshot().iter().all(|s| s.brightness == 0.0));
}
