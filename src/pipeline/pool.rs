//! Process-wide rendering engine pool.
//!
//! The engine is created once at startup and injected into the
//! [`crate::Extractor`]; requests borrow it through an [`EngineLease`] which
//! returns its permit when dropped. Acquisition is a bounded wait:
//!
//! * at startup, [`EnginePool::warm_up`] waits up to the startup timeout and
//!   its failure is meant to abort the process;
//! * per request, [`EnginePool::acquire`] waits up to the acquire timeout and
//!   reports [`ExtractError::EngineBusy`] so the caller can retry.

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::pipeline::render::{PdfiumEngine, RenderEngine};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

/// Owns the rendering engine and limits how many requests use it at once.
#[derive(Clone)]
pub struct EnginePool {
    engine: Arc<dyn RenderEngine>,
    permits: Arc<Semaphore>,
    size: usize,
    acquire_timeout: Duration,
}

impl EnginePool {
    pub fn new(engine: Arc<dyn RenderEngine>, size: usize, acquire_timeout: Duration) -> Self {
        let size = size.max(1);
        Self {
            engine,
            permits: Arc::new(Semaphore::new(size)),
            size,
            acquire_timeout,
        }
    }

    /// Bind pdfium and wrap it in a pool sized by `config`.
    pub fn pdfium(config: &ExtractionConfig) -> Result<Self, ExtractError> {
        let engine = PdfiumEngine::bind(config.pdfium_lib_path.as_deref())?;
        Ok(Self::new(
            Arc::new(engine),
            config.pool_size,
            config.acquire_timeout(),
        ))
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of leases that could be handed out right now.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Acquire and immediately release one lease within `timeout`.
    ///
    /// Called once at process start: an engine that cannot be acquired here
    /// will not serve any request.
    pub async fn warm_up(&self, timeout: Duration) -> Result<(), ExtractError> {
        let lease = self.acquire_within(timeout).await?;
        drop(lease);
        info!("Rendering engine pool ready ({} instance(s))", self.size);
        Ok(())
    }

    /// Acquire a lease within the configured per-request timeout.
    pub async fn acquire(&self) -> Result<EngineLease, ExtractError> {
        self.acquire_within(self.acquire_timeout).await
    }

    async fn acquire_within(&self, timeout: Duration) -> Result<EngineLease, ExtractError> {
        let start = Instant::now();
        let permit = tokio::time::timeout(timeout, Arc::clone(&self.permits).acquire_owned())
            .await
            .map_err(|_| {
                warn!("No rendering engine free after {:?}", timeout);
                ExtractError::EngineBusy {
                    waited_ms: timeout.as_millis() as u64,
                }
            })?
            .map_err(|_| ExtractError::EngineFailure {
                detail: "engine pool has been shut down".to_string(),
            })?;

        debug!("Engine lease acquired after {:?}", start.elapsed());
        Ok(EngineLease {
            engine: Arc::clone(&self.engine),
            _permit: permit,
        })
    }
}

/// Exclusive use of one pool slot. Released on drop.
pub struct EngineLease {
    engine: Arc<dyn RenderEngine>,
    _permit: OwnedSemaphorePermit,
}

impl EngineLease {
    pub fn engine(&self) -> &dyn RenderEngine {
        self.engine.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::render::DocumentHandle;

    struct NullEngine;

    impl RenderEngine for NullEngine {
        fn open_document<'a>(
            &'a self,
            _bytes: &'a [u8],
        ) -> Result<Box<dyn DocumentHandle + 'a>, ExtractError> {
            Err(ExtractError::InvalidDocument {
                detail: "null engine".into(),
            })
        }
    }

    fn pool(size: usize, timeout_ms: u64) -> EnginePool {
        EnginePool::new(Arc::new(NullEngine), size, Duration::from_millis(timeout_ms))
    }

    #[tokio::test]
    async fn lease_is_returned_on_drop() {
        let pool = pool(1, 50);
        let lease = pool.acquire().await.expect("first lease");
        assert_eq!(pool.available(), 0);
        drop(lease);
        assert_eq!(pool.available(), 1);
        pool.acquire().await.expect("second lease after release");
    }

    #[tokio::test]
    async fn exhausted_pool_reports_engine_busy() {
        let pool = pool(1, 30);
        let _held = pool.acquire().await.unwrap();
        let err = pool.acquire().await.err().expect("should time out");
        assert!(matches!(err, ExtractError::EngineBusy { waited_ms: 30 }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn warm_up_fails_when_held() {
        let pool = pool(1, 1_000);
        let _held = pool.acquire().await.unwrap();
        let err = pool.warm_up(Duration::from_millis(20)).await.unwrap_err();
        assert!(matches!(err, ExtractError::EngineBusy { .. }));
    }

    #[tokio::test]
    async fn size_zero_is_raised_to_one() {
        let pool = pool(0, 10);
        assert_eq!(pool.size(), 1);
        pool.warm_up(Duration::from_millis(10)).await.unwrap();
    }
}
