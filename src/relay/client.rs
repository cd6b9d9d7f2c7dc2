//! Relay client
//!
//! Sends a feature vector to the relay server and decodes its verdict. One
//! request per submission, no retries: every failure is terminal for the
//! attempt.

use crate::config::ClientConfig;
use crate::error::RelayError;
use crate::features::FeatureVector;
use crate::relay::types::{CheckHumanRequest, CheckHumanResponse, ErrorBody, Verdict};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::future::Future;
use std::time::Duration;

/// Something that can turn a feature vector into a verdict
pub trait Relay {
    fn check(
        &self,
        features: &FeatureVector,
    ) -> impl Future<Output = Result<Verdict, RelayError>> + Send;
}

/// HTTP client for the relay server
#[derive(Debug, Clone)]
pub struct RelayClient {
    config: ClientConfig,
    http: reqwest::Client,
}

impl RelayClient {
    pub fn new(config: ClientConfig) -> Result<Self, RelayError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RelayError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, http })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

impl Relay for RelayClient {
    fn check(
        &self,
        features: &FeatureVector,
    ) -> impl Future<Output = Result<Verdict, RelayError>> + Send {
        let url = self.config.check_url();
        let request = self
            .http
            .post(&url)
            .json(&CheckHumanRequest { features: *features });

        async move {
            let response = request
                .send()
                .await
                .map_err(|e| RelayError::Transport(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let detail = response
                    .json::<ErrorBody>()
                    .await
                    .map(|b| b.error)
                    .unwrap_or_default();
                tracing::warn!(%url, status = status.as_u16(), %detail, "relay rejected check");
                return Err(RelayError::Status(status.as_u16()));
            }

            let body: CheckHumanResponse = response
                .json()
                .await
                .map_err(|e| RelayError::Decode(e.to_string()))?;

            Verdict::from_wire(&body.result).ok_or(RelayError::UnexpectedVerdict(body.result))
        }
    }
}

/// Probability of a bot verdict in simulation mode
pub const SIMULATED_BOT_PROBABILITY: f64 = 0.3;

/// Local random verdicts for demos and UI work; never contacts a relay
pub struct SimulatedRelay {
    rng: Mutex<StdRng>,
    bot_probability: f64,
}

impl SimulatedRelay {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Deterministic verdict sequence for a given seed
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    pub fn bot_probability(mut self, probability: f64) -> Self {
        self.bot_probability = probability.clamp(0.0, 1.0);
        self
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            rng: Mutex::new(rng),
            bot_probability: SIMULATED_BOT_PROBABILITY,
        }
    }
}

impl Default for SimulatedRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl Relay for SimulatedRelay {
    fn check(
        &self,
        _features: &FeatureVector,
    ) -> impl Future<Output = Result<Verdict, RelayError>> + Send {
        let draw: f64 = self.rng.lock().gen();
        let verdict = if draw < self.bot_probability {
            Verdict::Bot
        } else {
            Verdict::Human
        };
        tracing::debug!(?verdict, "simulated relay verdict");
        std::future::ready(Ok(verdict))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zero_vector() -> FeatureVector {
        FeatureVector::try_from(vec![0.0; 20]).unwrap()
    }

    #[tokio::test]
    async fn test_simulated_relay_is_deterministic_per_seed() {
        let first = SimulatedRelay::with_seed(7);
        let second = SimulatedRelay::with_seed(7);
        for _ in 0..20 {
            let a = first.check(&zero_vector()).await.unwrap();
            let b = second.check(&zero_vector()).await.unwrap();
            assert_eq!(a, b);
        }
    }

    #[tokio::test]
    async fn test_simulated_relay_extremes() {
        let always_bot = SimulatedRelay::with_seed(1).bot_probability(1.0);
        let never_bot = SimulatedRelay::with_seed(1).bot_probability(0.0);
        for _ in 0..10 {
            assert_eq!(always_bot.check(&zero_vector()).await.unwrap(), Verdict::Bot);
            assert_eq!(never_bot.check(&zero_vector()).await.unwrap(), Verdict::Human);
        }
    }

    #[tokio::test]
    async fn test_unreachable_relay_is_transport_error() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let client = RelayClient::new(ClientConfig {
            relay_url: format!("http://127.0.0.1:{}", port),
            timeout_secs: 2,
        })
        .unwrap();

        let err = client.check(&zero_vector()).await.unwrap_err();
        assert!(matches!(err, RelayError::Transport(_)));
    }
}
