//! Concurrent fan-out of one location query to every provider.
//!
//! Each provider runs in its own task. Results are folded in as they arrive
//! and the first failure ends the query with that provider's error; every
//! task still running at that point is aborted before `query` returns.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tokio::{task::JoinSet, time::Instant};
use tokio_util::sync::CancellationToken;

use crate::{AggregateError, AggregateResult, Kelvin, Location, TemperatureProvider};

type ProviderSet = Arc<[Arc<dyn TemperatureProvider>]>;

/// Averages the readings of a fixed set of providers.
#[derive(Debug, Clone)]
pub struct Aggregator {
    providers: ProviderSet,
    deadline: Option<Duration>,
}

impl Aggregator {
    pub fn new(providers: impl IntoIterator<Item = Arc<dyn TemperatureProvider>>) -> Self {
        Self { providers: providers.into_iter().collect(), deadline: None }
    }

    /// Fail queries that take longer than `deadline` as a whole.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    pub async fn query(&self, location: &Location) -> Result<AggregateResult, AggregateError> {
        self.query_until(location, &CancellationToken::new()).await
    }

    /// Like [`Aggregator::query`], but gives up with [`AggregateError::Cancelled`]
    /// as soon as `cancel` fires.
    pub async fn query_until(
        &self,
        location: &Location,
        cancel: &CancellationToken,
    ) -> Result<AggregateResult, AggregateError> {
        if self.providers.is_empty() {
            return Err(AggregateError::NoProviders);
        }

        let queried_at = Utc::now();
        let started = Instant::now();
        let total = self.providers.len();

        let mut tasks = JoinSet::new();
        for provider in self.providers.iter() {
            let provider = Arc::clone(provider);
            let location = location.clone();
            tasks.spawn(async move { provider.measure(&location).await });
        }

        let mut readings = Vec::with_capacity(total);
        let outcome = self
            .collect(&mut tasks, &mut readings, started, cancel)
            .await
            .and_then(|()| mean(&readings).ok_or(AggregateError::NoProviders));

        // Nothing may outlive the query, whatever the outcome.
        tasks.shutdown().await;

        let elapsed = started.elapsed();
        match outcome {
            Ok(temperature) => {
                tracing::info!(
                    %location,
                    %temperature,
                    contributors = readings.len(),
                    ?elapsed,
                    "aggregate temperature"
                );
                Ok(AggregateResult { temperature, contributors: readings.len(), elapsed, queried_at })
            }
            Err(err) => {
                let provider = match &err {
                    AggregateError::Provider(e) => Some(e.provider()),
                    _ => None,
                };
                tracing::warn!(%location, provider, error = %err, ?elapsed, "aggregate query failed");
                Err(err)
            }
        }
    }

    async fn collect(
        &self,
        tasks: &mut JoinSet<Result<Kelvin, crate::ProviderError>>,
        readings: &mut Vec<Kelvin>,
        started: Instant,
        cancel: &CancellationToken,
    ) -> Result<(), AggregateError> {
        let total = self.providers.len();
        let deadline_at = self.deadline.map(|d| started + d);

        while readings.len() < total {
            let joined = tokio::select! {
                joined = tasks.join_next() => joined,
                _ = cancel.cancelled() => return Err(AggregateError::Cancelled),
                _ = sleep_until(deadline_at) => {
                    return Err(AggregateError::DeadlineExceeded {
                        deadline: self.deadline.unwrap_or_default(),
                        completed: readings.len(),
                        total,
                    });
                }
            };

            match joined {
                Some(Ok(Ok(kelvin))) => readings.push(kelvin),
                Some(Ok(Err(err))) => return Err(err.into()),
                Some(Err(join_err)) => return Err(join_err.into()),
                None => break,
            }
        }

        Ok(())
    }
}

async fn sleep_until(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Arithmetic mean, summed in ascending order so the result does not depend
/// on the order the readings arrived in.
fn mean(readings: &[Kelvin]) -> Option<Kelvin> {
    if readings.is_empty() {
        return None;
    }

    let mut values: Vec<f64> = readings.iter().map(|k| k.value()).collect();
    values.sort_by(f64::total_cmp);

    let sum: f64 = values.iter().sum();
    Some(Kelvin(sum / values.len() as f64))
}
