//! Name → factory lookup for effects

use super::{
    chase, fade, frequency_reactive, pulse, rainbow, sparkle, strobe, EffectContext, LightEffect,
};
use crate::error::{ControlError, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Builds a fresh, uninitialized effect instance
pub type EffectFactory = Arc<dyn Fn(EffectContext) -> Box<dyn LightEffect> + Send + Sync>;

/// Name and description of a registered effect
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectInfo {
    /// Registry name
    pub name: String,
    /// One-line description
    pub description: String,
}

/// Wrap a plain constructor as an [`EffectFactory`]
pub fn factory<E>(create: fn(EffectContext) -> E) -> EffectFactory
where
    E: LightEffect + 'static,
{
    Arc::new(move |ctx| Box::new(create(ctx)) as Box<dyn LightEffect>)
}

struct Entry {
    description: String,
    factory: EffectFactory,
}

/// Registered effect factories, ordered by name
#[derive(Default)]
pub struct EffectRegistry {
    entries: BTreeMap<String, Entry>,
}

impl fmt::Debug for EffectRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectRegistry")
            .field("effects", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl EffectRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the seven built-in effects
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        let builtins: [(&str, &str, EffectFactory); 7] = [
            (pulse::NAME, pulse::DESCRIPTION, factory(pulse::create)),
            (chase::NAME, chase::DESCRIPTION, factory(chase::create)),
            (sparkle::NAME, sparkle::DESCRIPTION, factory(sparkle::create)),
            (rainbow::NAME, rainbow::DESCRIPTION, factory(rainbow::create)),
            (fade::NAME, fade::DESCRIPTION, factory(fade::create)),
            (strobe::NAME, strobe::DESCRIPTION, factory(strobe::create)),
            (
                frequency_reactive::NAME,
                frequency_reactive::DESCRIPTION,
                factory(frequency_reactive::create),
            ),
        ];
        for (name, description, factory) in builtins {
            registry.entries.insert(
                name.to_string(),
                Entry {
                    description: description.to_string(),
                    factory,
                },
            );
        }
        registry
    }

    /// Add a factory. Names are unique.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        factory: EffectFactory,
    ) -> Result<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(ControlError::InvalidConfig(
                "effect name must not be empty".to_string(),
            ));
        }
        if self.entries.contains_key(&name) {
            return Err(ControlError::InvalidConfig(format!(
                "effect '{}' is already registered",
                name
            )));
        }
        self.entries.insert(
            name,
            Entry {
                description: description.into(),
                factory,
            },
        );
        Ok(())
    }

    /// Whether `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered effects in name order
    pub fn available(&self) -> Vec<EffectInfo> {
        self.entries
            .iter()
            .map(|(name, entry)| EffectInfo {
                name: name.clone(),
                description: entry.description.clone(),
            })
            .collect()
    }

    /// New instance of `name`
    pub fn create(&self, name: &str, context: EffectContext) -> Result<Box<dyn LightEffect>> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| ControlError::UnknownEffect(name.to_string()))?;
        Ok((entry.factory)(context))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::EffectState;
    use super::*;

    #[test]
    fn test_builtin_effects() {
        let registry = EffectRegistry::with_builtin();
        let names: Vec<_> = registry.available().into_iter().map(|i| i.name).collect();
        assert_eq!(
            names,
            vec![
                "Chase",
                "Fade",
                "FrequencyReactive",
                "Pulse",
                "Rainbow",
                "Sparkle",
                "Strobe"
            ]
        );
        for name in names {
            let effect = registry.create(&name, context(4)).unwrap();
            assert_eq!(effect.name(), name);
            assert_eq!(effect.state(), EffectState::Uninitialized);
        }
    }

    #[test]
    fn test_unknown_effect() {
        let registry = EffectRegistry::with_builtin();
        assert!(matches!(
            registry.create("Lava", context(1)),
            Err(ControlError::UnknownEffect(name)) if name == "Lava"
        ));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = EffectRegistry::with_builtin();
        let pulse_factory = factory(pulse::create);
        assert!(matches!(
            registry.register("Pulse", "again", pulse_factory.clone()),
            Err(ControlError::InvalidConfig(_))
        ));
        registry.register("Pulse2", "a second pulse", pulse_factory).unwrap();
        assert!(registry.contains("Pulse2"));
    }
}
