use std::time::Duration;

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why a single provider could not produce a measurement.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider}: request failed")]
    Transport {
        provider: String,
        #[source]
        source: BoxError,
    },

    #[error("{provider}: could not decode response")]
    Decode {
        provider: String,
        #[source]
        source: BoxError,
    },

    #[error("{provider}: upstream error{}: {message}", status_suffix(.status))]
    Upstream {
        provider: String,
        status: Option<u16>,
        message: String,
    },
}

impl ProviderError {
    pub fn transport(provider: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Transport { provider: provider.into(), source: source.into() }
    }

    pub fn decode(provider: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Decode { provider: provider.into(), source: source.into() }
    }

    pub fn upstream(
        provider: impl Into<String>,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        Self::Upstream { provider: provider.into(), status, message: message.into() }
    }

    pub fn provider(&self) -> &str {
        match self {
            Self::Transport { provider, .. }
            | Self::Decode { provider, .. }
            | Self::Upstream { provider, .. } => provider,
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {s})")).unwrap_or_default()
}

/// Why an aggregate query produced no temperature.
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("no weather providers configured")]
    NoProviders,

    /// First provider failure, relayed as-is.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("query deadline of {deadline:?} exceeded ({completed}/{total} providers answered)")]
    DeadlineExceeded { deadline: Duration, completed: usize, total: usize },

    #[error("query cancelled")]
    Cancelled,

    #[error("provider task failed")]
    TaskFailed(#[from] tokio::task::JoinError),
}
