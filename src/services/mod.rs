// marksync services
// Stateless or narrowly stateful helpers: validation, health tracking, reconciliation, settings.

pub mod health_monitor;
pub mod reconciler;
pub mod settings_engine;
pub mod validation;
