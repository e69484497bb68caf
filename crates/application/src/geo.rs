//! Geocoding adapters.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use domain::Location;
use tokio::sync::RwLock;

use crate::error::GeoError;
use crate::ports::GeoResolver;

/// Places every street at a random grid location.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomGeoResolver;

#[async_trait]
impl GeoResolver for RandomGeoResolver {
    async fn resolve(&self, street: &str) -> Result<Location, GeoError> {
        let location = Location::random();
        tracing::debug!(street, %location, "street resolved to random location");
        Ok(location)
    }
}

#[derive(Debug, Default)]
struct InMemoryGeoState {
    streets: HashMap<String, Location>,
    delay: Option<Duration>,
    unavailable: bool,
}

/// Resolver backed by a fixed street table, for tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGeoResolver {
    state: Arc<RwLock<InMemoryGeoState>>,
}

impl InMemoryGeoResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_street(&self, street: impl Into<String>, location: Location) {
        self.state.write().await.streets.insert(street.into(), location);
    }

    /// Delays every lookup, to exercise timeouts.
    pub async fn set_delay(&self, delay: Option<Duration>) {
        self.state.write().await.delay = delay;
    }

    /// Configures the service to fail every lookup.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.write().await.unavailable = unavailable;
    }
}

#[async_trait]
impl GeoResolver for InMemoryGeoResolver {
    async fn resolve(&self, street: &str) -> Result<Location, GeoError> {
        let (delay, result) = {
            let state = self.state.read().await;
            let result = if state.unavailable {
                Err(GeoError::Unavailable("geo service down".to_string()))
            } else {
                state
                    .streets
                    .get(street)
                    .copied()
                    .ok_or_else(|| GeoError::UnknownStreet(street.to_string()))
            };
            (state.delay, result)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        result
    }
}

/// Bounds the latency of another resolver; a slow lookup fails closed.
#[derive(Debug, Clone)]
pub struct TimeoutGeoResolver<G> {
    inner: G,
    timeout: Duration,
}

impl<G: GeoResolver> TimeoutGeoResolver<G> {
    pub fn new(inner: G, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl<G: GeoResolver> GeoResolver for TimeoutGeoResolver<G> {
    async fn resolve(&self, street: &str) -> Result<Location, GeoError> {
        match tokio::time::timeout(self.timeout, self.inner.resolve(street)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(street, timeout = ?self.timeout, "geo lookup timed out");
                Err(GeoError::Timeout(self.timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn random_resolver_returns_grid_location() {
        let location = RandomGeoResolver.resolve("Main St").await.unwrap();
        assert!(Location::new(location.x(), location.y()).is_ok());
    }

    #[tokio::test]
    async fn in_memory_resolver_looks_up_streets() {
        let geo = InMemoryGeoResolver::new();
        let location = Location::new(3, 9).unwrap();
        geo.add_street("Baker St", location).await;

        assert_eq!(geo.resolve("Baker St").await.unwrap(), location);
        assert!(matches!(
            geo.resolve("Nowhere").await,
            Err(GeoError::UnknownStreet(_))
        ));
    }

    #[tokio::test]
    async fn unavailable_resolver_fails() {
        let geo = InMemoryGeoResolver::new();
        geo.add_street("Baker St", Location::new(1, 1).unwrap()).await;
        geo.set_unavailable(true).await;

        assert!(matches!(
            geo.resolve("Baker St").await,
            Err(GeoError::Unavailable(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_lookup_times_out() {
        let geo = InMemoryGeoResolver::new();
        geo.add_street("Baker St", Location::new(1, 1).unwrap()).await;
        geo.set_delay(Some(Duration::from_secs(10))).await;
        let bounded = TimeoutGeoResolver::new(geo, Duration::from_secs(5));

        let err = bounded.resolve("Baker St").await.unwrap_err();
        assert!(matches!(err, GeoError::Timeout(d) if d == Duration::from_secs(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn fast_lookup_passes_through() {
        let geo = InMemoryGeoResolver::new();
        let location = Location::new(6, 2).unwrap();
        geo.add_street("Baker St", location).await;
        geo.set_delay(Some(Duration::from_secs(1))).await;
        let bounded = TimeoutGeoResolver::new(geo, Duration::from_secs(5));

        assert_eq!(bounded.resolve("Baker St").await.unwrap(), location);
    }
}
