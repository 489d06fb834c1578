//! Fluent construction of an [`Engine`].

use crate::config::EngineConfig;
use crate::core::{Engine, EngineError, Notifier, Processor, Store};
use crate::infra::LogNotifier;

/// Collects the store, notifier, processor and configuration, then starts
/// the engine.
///
/// The notifier defaults to [`LogNotifier`] and the configuration to
/// [`EngineConfig::default`].
#[derive(Debug)]
pub struct EngineBuilder<S, N, P> {
    config: EngineConfig,
    store: S,
    notifier: N,
    processor: P,
}

impl<S, P> EngineBuilder<S, LogNotifier, P>
where
    S: Store,
    P: Processor,
{
    /// Start from a store and a processor.
    pub fn new(store: S, processor: P) -> Self {
        Self {
            config: EngineConfig::default(),
            store,
            notifier: LogNotifier,
            processor,
        }
    }
}

impl<S, N, P> EngineBuilder<S, N, P>
where
    S: Store,
    N: Notifier,
    P: Processor,
{
    /// Replace the configuration.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the notifier.
    pub fn with_notifier<M: Notifier>(self, notifier: M) -> EngineBuilder<S, M, P> {
        EngineBuilder {
            config: self.config,
            store: self.store,
            notifier,
            processor: self.processor,
        }
    }

    /// Configuration the engine will start with.
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Recover pending work and start both pools.
    ///
    /// # Errors
    ///
    /// See [`Engine::start`].
    pub fn start(self) -> Result<Engine<S, N, P>, EngineError> {
        Engine::start(self.config, self.store, self.notifier, self.processor)
    }
}
