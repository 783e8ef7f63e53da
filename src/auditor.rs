use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use itertools::Itertools;
use tracing::{info, warn};

use crate::config::AuditConfig;
use crate::error::AuditError;
use crate::loader::compile_config;
use crate::rules::{ensure_section, evaluate_entity};
use crate::sink::{AuditSink, ReloadStats};
use crate::timers::RunTimer;
use crate::types::{AuditReport, EntityRecord, EntityReport};

/// The main auditor handle. Cloneable and thread-safe.
///
/// Every evaluation works on one immutable snapshot of the configuration, so a
/// reload never changes the rules underneath a run that is already in progress.
#[derive(Clone)]
pub struct Auditor {
    config: Arc<RwLock<Arc<AuditConfig>>>,
    sink: Option<Arc<dyn AuditSink>>,
}

impl Auditor {
    pub fn new(config: AuditConfig) -> Self {
        Auditor {
            config: Arc::new(RwLock::new(Arc::new(config))),
            sink: None,
        }
    }

    pub fn new_from_str(config_text: &str) -> Result<Self, AuditError> {
        Ok(Self::new(compile_config(config_text)?))
    }

    /// Attach a sink receiving every verdict and run summary from this handle.
    pub fn with_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn reload(&self, config: AuditConfig) -> Result<(), AuditError> {
        let providers = config.provider_names().count();
        *self.config.write()? = Arc::new(config);

        info!(event = "Config", phase = "Reloaded", providers = providers);
        if let Some(sink) = &self.sink {
            sink.on_reload(&ReloadStats {
                reload_time: SystemTime::now(),
                providers,
            });
        }
        Ok(())
    }

    /// Compile and swap in new configuration. On error the current one stays active.
    pub fn reload_from_str(&self, config_text: &str) -> Result<(), AuditError> {
        self.reload(compile_config(config_text)?)
    }

    /// The configuration currently in effect.
    pub fn snapshot(&self) -> Result<Arc<AuditConfig>, AuditError> {
        Ok(Arc::clone(&*self.config.read()?))
    }

    pub fn providers(&self) -> Result<Vec<String>, AuditError> {
        Ok(self
            .snapshot()?
            .provider_names()
            .map(str::to_string)
            .collect())
    }

    pub fn evaluate(
        &self,
        provider: &str,
        entity: &EntityRecord,
    ) -> Result<EntityReport, AuditError> {
        self.evaluate_at(provider, entity, Utc::now())
    }

    /// Evaluate a single entity as of `now`.
    pub fn evaluate_at(
        &self,
        provider: &str,
        entity: &EntityRecord,
        now: DateTime<Utc>,
    ) -> Result<EntityReport, AuditError> {
        let config = self.snapshot()?;
        let policy = config.provider(provider)?;
        let report = evaluate_entity(provider, policy, entity, now)?;
        self.record(provider, &report);
        Ok(report)
    }

    pub fn audit(
        &self,
        provider: &str,
        entities: &[EntityRecord],
    ) -> Result<AuditReport, AuditError> {
        self.audit_at(provider, entities, Utc::now())
    }

    /// Evaluate a batch of entities, producing exactly one report per entity in input
    /// order. A configuration error aborts the run before any entity is evaluated or
    /// reported to the sink; entity faults never abort.
    pub fn audit_at(
        &self,
        provider: &str,
        entities: &[EntityRecord],
        now: DateTime<Utc>,
    ) -> Result<AuditReport, AuditError> {
        let config = self.snapshot()?;
        let policy = config.provider(provider)?;

        for kind in entities.iter().map(EntityRecord::kind).unique() {
            ensure_section(provider, policy, kind)?;
        }

        let timer = RunTimer::start(provider);
        let reports = entities
            .iter()
            .map(|entity| {
                let report = evaluate_entity(provider, policy, entity, now)?;
                self.record(provider, &report);
                Ok(report)
            })
            .collect::<Result<Vec<_>, AuditError>>()?;

        let report = AuditReport {
            provider: provider.to_string(),
            evaluated_at: now,
            entities: reports,
        };
        let stats = timer.finish(&report);

        info!(
            event = "Audit",
            phase = "Summary",
            provider = provider,
            evaluated = stats.evaluated,
            non_compliant = stats.non_compliant,
            duration_us = stats.duration.as_micros() as u64
        );
        if let Some(sink) = &self.sink {
            sink.on_run(&stats);
        }
        Ok(report)
    }

    fn record(&self, provider: &str, report: &EntityReport) {
        if !report.is_compliant() {
            warn!(
                event = "Audit",
                phase = "NonCompliant",
                provider = provider,
                kind = report.kind.as_ref(),
                key = report.key.as_str(),
                failures = report.failures.len(),
                detail = %report
            );
        }
        if let Some(sink) = &self.sink {
            sink.on_entity(provider, report);
        }
    }
}

#[cfg(test)]
mod tests;
