//! Ratekeeper FX Engine
//!
//! Resolves currency exchange rates from several unreliable upstream
//! providers into one answer.
//!
//! # Features
//!
//! - Ordered provider failover (first success wins)
//! - Rate caching with a shared TTL and lazy expiry
//! - Inverse and cross rates triangulated through the provider's base
//! - Conversion at a fixed six-decimal scale
//! - Percentage-change trends over persisted history
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ratekeeper_fx::{ConversionCalculator, ProviderAggregator, RateCache, RateResolver};
//!
//! let aggregator = ProviderAggregator::new(vec![primary, fallback]);
//! let resolver = Arc::new(RateResolver::new(
//!     Arc::new(RateCache::new()),
//!     aggregator,
//!     store,
//!     Default::default(),
//! ));
//!
//! let calculator = ConversionCalculator::new(resolver.clone());
//! let conversion = calculator.convert(dec!(100), "USD", "EUR").await?;
//! ```

pub mod cache;
pub mod conversion;
pub mod error;
pub mod maintenance;
pub mod metrics;
pub mod provider;
pub mod resolver;
pub mod store;
pub mod trends;

pub use cache::{CacheStats, CachedRate, RateCache, RateCacheConfig, SharedRateCache};
pub use conversion::{Conversion, ConversionCalculator, ConversionRequest, RateSource};
pub use error::{FxError, FxResult, ProviderError, ProviderFailure};
pub use maintenance::{Maintenance, MaintenanceConfig};
pub use metrics::{EngineMetrics, MetricsSnapshot};
pub use provider::{ProviderAggregator, RateProvider, SourcedSnapshot};
pub use resolver::{triangulate, RateResolver, RefreshReport, ResolverConfig};
pub use store::{InMemoryRateStore, RateStore};
pub use trends::{percentage_change, TrendResult, TrendsAnalyzer};

#[cfg(any(test, feature = "test-utils"))]
pub use provider::MockRateProvider;
