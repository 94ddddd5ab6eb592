//! Owner of the single active effect
//!
//! The host isolates effect failures from the pipeline: a failing callback is
//! logged and published, and after `max_failures` consecutive failures the
//! effect is deactivated. Activation always fully stops (joins) the previous
//! effect before the new one is initialized.

use super::{EffectConfig, EffectContext, EffectInfo, EffectRegistry, EffectState, LightEffect};
use crate::error::{ControlError, Result};
use crate::events::{EventBus, PipelineEvent};
use lightflow_core::{BandEnergy, BeatEvent};
use tracing::{debug, error, info, warn};

/// Consecutive callback failures before auto-deactivation
pub const DEFAULT_MAX_FAILURES: u32 = 5;

/// Effect lifecycle manager
pub struct EffectHost {
    registry: EffectRegistry,
    context: EffectContext,
    active: Option<Box<dyn LightEffect>>,
    events: Option<EventBus>,
    consecutive_failures: u32,
    max_failures: u32,
}

impl EffectHost {
    /// Host creating effects from `registry` that write into `context`
    pub fn new(registry: EffectRegistry, context: EffectContext) -> Self {
        Self {
            registry,
            context,
            active: None,
            events: None,
            consecutive_failures: 0,
            max_failures: DEFAULT_MAX_FAILURES,
        }
    }

    /// Publish lifecycle and error events on `events`
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Move event publishing to `events`. The active effect, if any, keeps
    /// running and its later transitions go to the new bus.
    pub fn set_events(&mut self, events: EventBus) {
        self.events = Some(events);
    }

    /// Consecutive failures tolerated before deactivation, at least 1
    pub fn with_max_failures(mut self, max_failures: u32) -> Self {
        self.max_failures = max_failures.max(1);
        self
    }

    /// Effects that can be activated
    pub fn available(&self) -> Vec<EffectInfo> {
        self.registry.available()
    }

    /// Registry, for adding custom effects
    pub fn registry_mut(&mut self) -> &mut EffectRegistry {
        &mut self.registry
    }

    /// Name of the active effect
    pub fn active_name(&self) -> Option<&str> {
        self.active.as_ref().map(|e| e.name())
    }

    /// State of the active effect
    pub fn active_state(&self) -> Option<EffectState> {
        self.active.as_ref().map(|e| e.state())
    }

    /// Failures since the last successful callback
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Replace the active effect with a new instance of `name`.
    ///
    /// An unknown name leaves the current effect untouched. If the new effect
    /// fails to initialize or start, no effect is active afterwards.
    pub fn activate(&mut self, name: &str, config: EffectConfig) -> Result<()> {
        if !self.registry.contains(name) {
            warn!("Cannot activate unknown effect '{}'", name);
            return Err(ControlError::UnknownEffect(name.to_string()));
        }

        // Best-effort: a previous effect that fails to stop is still dropped
        let _ = self.teardown();

        let mut effect = self.registry.create(name, self.context.clone())?;
        if let Err(e) = effect.initialize(config) {
            error!("Effect '{}' failed to initialize: {}", name, e);
            self.publish_state(effect.as_ref());
            self.publish(PipelineEvent::ActiveEffectChanged { name: None });
            return Err(e);
        }
        self.publish_state(effect.as_ref());

        if let Err(e) = effect.start() {
            error!("Effect '{}' failed to start: {}", name, e);
            self.publish_state(effect.as_ref());
            self.publish(PipelineEvent::ActiveEffectChanged { name: None });
            return Err(e);
        }
        self.publish_state(effect.as_ref());

        info!("Activated effect '{}'", name);
        self.consecutive_failures = 0;
        self.active = Some(effect);
        self.publish(PipelineEvent::ActiveEffectChanged {
            name: Some(name.to_string()),
        });
        Ok(())
    }

    /// Stop and drop the active effect, then black out the table
    pub fn deactivate(&mut self) -> Result<()> {
        if self.active.is_none() {
            return Ok(());
        }
        let result = self.teardown();
        self.publish(PipelineEvent::ActiveEffectChanged { name: None });
        result
    }

    /// Push a new config to the active effect. No-op when nothing is active.
    pub fn update_config(&mut self, config: EffectConfig) -> Result<()> {
        match self.active.as_mut() {
            Some(effect) => effect.update_config(config),
            None => {
                warn!("update_config with no active effect ignored");
                Ok(())
            }
        }
    }

    /// Pause the active effect
    pub fn pause(&mut self) -> Result<()> {
        let effect = self.require_active("pause")?;
        effect.pause()?;
        let event = state_event(effect);
        self.publish(event);
        Ok(())
    }

    /// Resume the active effect
    pub fn resume(&mut self) -> Result<()> {
        let effect = self.require_active("resume")?;
        effect.resume()?;
        let event = state_event(effect);
        self.publish(event);
        Ok(())
    }

    /// Forward band energy to a running effect
    pub fn dispatch_band_energy(&mut self, bands: &BandEnergy) {
        self.dispatch(|effect| effect.on_band_energy(bands));
    }

    /// Forward a beat to a running effect
    pub fn dispatch_beat(&mut self, beat: &BeatEvent) {
        self.dispatch(|effect| effect.on_beat(beat));
    }

    /// Stop everything; used on engine shutdown
    pub fn shutdown(&mut self) {
        if let Err(e) = self.deactivate() {
            warn!("Effect shutdown failed: {}", e);
        }
    }

    fn dispatch(&mut self, call: impl FnOnce(&mut dyn LightEffect) -> Result<()>) {
        let Some(effect) = self.active.as_mut() else {
            return;
        };
        if effect.state() != EffectState::Running {
            return;
        }
        match call(effect.as_mut()) {
            Ok(()) => self.consecutive_failures = 0,
            Err(e) => {
                self.consecutive_failures += 1;
                let name = effect.name().to_string();
                error!(
                    "Effect '{}' callback failed ({} in a row): {}",
                    name, self.consecutive_failures, e
                );
                self.publish(PipelineEvent::EffectError {
                    effect: name.clone(),
                    message: e.to_string(),
                    consecutive: self.consecutive_failures,
                });
                if self.consecutive_failures >= self.max_failures {
                    warn!(
                        "Deactivating effect '{}' after {} consecutive failures",
                        name, self.consecutive_failures
                    );
                    if let Err(e) = self.deactivate() {
                        warn!("Auto-deactivation of '{}' failed: {}", name, e);
                    }
                }
            }
        }
    }

    /// Stop the active effect best-effort and clear the output
    fn teardown(&mut self) -> Result<()> {
        let Some(mut effect) = self.active.take() else {
            return Ok(());
        };
        let result = effect.stop();
        match &result {
            Ok(()) => debug!("Stopped effect '{}'", effect.name()),
            Err(e) => warn!("Effect '{}' did not stop cleanly: {}", effect.name(), e),
        }
        self.publish_state(effect.as_ref());
        drop(effect);
        self.consecutive_failures = 0;
        self.context.channels.clear();
        result
    }

    fn require_active(&mut self, op: &str) -> Result<&mut dyn LightEffect> {
        match self.active.as_deref_mut() {
            Some(effect) => Ok(effect),
            None => Err(ControlError::InvalidState(format!(
                "cannot {} without an active effect",
                op
            ))),
        }
    }

    fn publish_state(&self, effect: &dyn LightEffect) {
        self.publish(state_event(effect));
    }

    fn publish(&self, event: PipelineEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }
}

impl Drop for EffectHost {
    fn drop(&mut self) {
        if let Some(mut effect) = self.active.take() {
            let _ = effect.stop();
        }
    }
}

fn state_event(effect: &dyn LightEffect) -> PipelineEvent {
    PipelineEvent::EffectStateChanged {
        effect: effect.name().to_string(),
        state: effect.state(),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[test]
    fn test_activate_and_replace() {
        let bus = EventBus::new(64);
        let mut host =
            EffectHost::new(EffectRegistry::with_builtin(), context(4)).with_events(bus.clone());

        host.activate("Pulse", EffectConfig::default()).unwrap();
        assert_eq!(host.active_name(), Some("Pulse"));
        assert_eq!(host.active_state(), Some(EffectState::Running));

        host.activate("Chase", EffectConfig::default()).unwrap();
        assert_eq!(host.active_name(), Some("Chase"));

        let events: Vec<_> = bus.subscribe().try_iter().collect();
        let stopped = PipelineEvent::EffectStateChanged {
            effect: "Pulse".to_string(),
            state: EffectState::Stopped,
        };
        let chase_init = PipelineEvent::EffectStateChanged {
            effect: "Chase".to_string(),
            state: EffectState::Initialized,
        };
        let stop_at = events.iter().position(|e| *e == stopped).unwrap();
        let init_at = events.iter().position(|e| *e == chase_init).unwrap();
        assert!(stop_at < init_at);

        host.deactivate().unwrap();
        assert!(host.active_name().is_none());
    }

    #[test]
    fn test_unknown_effect_keeps_current() {
        let mut host = EffectHost::new(EffectRegistry::with_builtin(), context(2));
        host.activate("Strobe", EffectConfig::default()).unwrap();
        assert!(matches!(
            host.activate("Nope", EffectConfig::default()),
            Err(ControlError::UnknownEffect(_))
        ));
        assert_eq!(host.active_name(), Some("Strobe"));
        assert_eq!(host.active_state(), Some(EffectState::Running));
    }

    #[test]
    fn test_invalid_config_leaves_nothing_active() {
        let mut host = EffectHost::new(EffectRegistry::with_builtin(), context(2));
        let config = EffectConfig {
            speed: f64::NAN,
            ..Default::default()
        };
        assert!(host.activate("Pulse", config).is_err());
        assert!(host.active_name().is_none());
    }

    #[test]
    fn test_update_config_without_effect_is_noop() {
        let mut host = EffectHost::new(EffectRegistry::with_builtin(), context(2));
        assert!(host.update_config(EffectConfig::default()).is_ok());
        assert!(matches!(host.pause(), Err(ControlError::InvalidState(_))));
    }

    #[test]
    fn test_paused_effect_gets_no_audio() {
        let mut host = EffectHost::new(EffectRegistry::with_builtin(), context(3));
        host.activate("FrequencyReactive", EffectConfig::default())
            .unwrap();
        host.pause().unwrap();
        assert_eq!(host.active_state(), Some(EffectState::Paused));

        host.dispatch_band_energy(&bands(1.0, 1.0, 1.0));
        assert!(host.context.channels.snapshot().iter().all(|s| s.brightness == 0.0));

        host.resume().unwrap();
        host.dispatch_band_energy(&bands(1.0, 1.0, 1.0));
        assert!(host.context.channels.snapshot().iter().all(|s| s.brightness > 0.0));
    }

    #[test]
    fn test_deactivate_blacks_out() {
        let mut host = EffectHost::new(EffectRegistry::with_builtin(), context(3));
        host.activate("FrequencyReactive", EffectConfig::default())
            .unwrap();
        host.dispatch_band_energy(&bands(1.0, 1.0, 1.0));
        host.deactivate().unwrap();
        assert!(host.context.channels.snapshot().iter().all(|s| s.brightness == 0.0));
    }
}
