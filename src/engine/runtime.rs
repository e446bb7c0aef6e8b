//! Single-writer runtime for sharing one engine across threads.
//!
//! The engine performs no locking of its own. `EngineRuntime` moves it onto
//! a dedicated worker thread fed by a bounded queue, so every call (mutating
//! or not) is applied in submission order and never overlaps another.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::debug;

use crate::anomaly::DataAnomaly;
use crate::config::RuntimeConfig;
use crate::engine::{IngestReport, UnificationEngine, UnificationStats};
use crate::entity::{EntityId, EntityType, UnifiedEntity};
use crate::error::{ExecutionError, UnifyError, UnifyResult};
use crate::query::TimelineEvent;
use crate::record::RawRecord;
use crate::relationship::DataRelationship;

/// A call to be applied to the engine.
#[derive(Debug, Clone)]
pub enum EngineRequest {
    Ingest {
        platform: String,
        records: Vec<RawRecord>,
    },
    DetectAnomalies,
    Search {
        query: String,
        types: Option<Vec<EntityType>>,
    },
    EntityRelationships {
        entity_id: EntityId,
        relationship_type: Option<String>,
    },
    PlatformEntities {
        platform: String,
        entity_type: Option<EntityType>,
    },
    Timeline {
        entity_id: EntityId,
    },
    Stats,
}

/// Result of an [`EngineRequest`].
#[derive(Debug, Clone, PartialEq)]
pub enum EngineResponse {
    Ingested(IngestReport),
    Anomalies(Vec<DataAnomaly>),
    Entities(Vec<UnifiedEntity>),
    Relationships(Vec<DataRelationship>),
    Timeline(Vec<TimelineEvent>),
    Stats(UnificationStats),
}

impl UnificationEngine {
    /// Applies one request and returns an owned response.
    pub fn handle(&mut self, request: EngineRequest) -> EngineResponse {
        match request {
            EngineRequest::Ingest { platform, records } => {
                EngineResponse::Ingested(self.ingest_platform_data_with_report(&platform, &records))
            }
            EngineRequest::DetectAnomalies => EngineResponse::Anomalies(self.detect_anomalies()),
            EngineRequest::Search { query, types } => EngineResponse::Entities(
                self.search_unified_entities(&query, types.as_deref())
                    .into_iter()
                    .cloned()
                    .collect(),
            ),
            EngineRequest::EntityRelationships {
                entity_id,
                relationship_type,
            } => EngineResponse::Relationships(
                self.get_entity_relationships(entity_id, relationship_type.as_deref())
                    .into_iter()
                    .cloned()
                    .collect(),
            ),
            EngineRequest::PlatformEntities {
                platform,
                entity_type,
            } => EngineResponse::Entities(
                self.get_platform_entities(&platform, entity_type)
                    .into_iter()
                    .cloned()
                    .collect(),
            ),
            EngineRequest::Timeline { entity_id } => {
                EngineResponse::Timeline(self.get_entity_timeline(entity_id))
            }
            EngineRequest::Stats => EngineResponse::Stats(self.stats()),
        }
    }
}

enum Job {
    Execute {
        request: EngineRequest,
        reply: Sender<EngineResponse>,
    },

    #[cfg(test)]
    Sleep {
        duration: Duration,
        reply: Sender<()>,
    },
}

/// Handle returned by [`EngineRuntime::submit`].
#[derive(Debug)]
pub struct RequestHandle {
    rx: Receiver<EngineResponse>,
}

impl RequestHandle {
    /// Waits for the request to complete.
    ///
    /// # Errors
    /// `Disconnected` if the worker exits without replying.
    pub fn join(self) -> UnifyResult<EngineResponse> {
        self.rx
            .recv()
            .map_err(|_| UnifyError::Execution(ExecutionError::Disconnected))
    }

    /// Waits for the request to complete with a timeout.
    ///
    /// # Errors
    /// `Timeout` when no reply arrives in time, `Disconnected` if the worker
    /// exits without replying.
    pub fn join_timeout(self, timeout: Duration) -> UnifyResult<EngineResponse> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            crossbeam_channel::RecvTimeoutError::Timeout => {
                UnifyError::Execution(ExecutionError::Timeout {
                    duration_ms: timeout.as_millis().min(u128::from(u64::MAX)) as u64,
                })
            }
            crossbeam_channel::RecvTimeoutError::Disconnected => {
                UnifyError::Execution(ExecutionError::Disconnected)
            }
        })
    }
}

/// Owns an engine on a worker thread and serializes access to it.
pub struct EngineRuntime {
    tx: Option<Sender<Job>>,
    worker: Option<JoinHandle<UnificationEngine>>,
    queue_capacity: usize,
}

impl EngineRuntime {
    /// Moves `engine` onto a new worker thread.
    ///
    /// # Errors
    /// Returns an internal error if the thread cannot be spawned.
    pub fn new(engine: UnificationEngine, config: RuntimeConfig) -> UnifyResult<Self> {
        let queue_capacity = config.queue_capacity.max(1);
        let (tx, rx) = bounded::<Job>(queue_capacity);

        let worker = thread::Builder::new()
            .name("entity-unify-worker".to_string())
            .spawn(move || {
                let mut engine = engine;
                while let Ok(job) = rx.recv() {
                    match job {
                        Job::Execute { request, reply } => {
                            let _ = reply.send(engine.handle(request));
                        }

                        #[cfg(test)]
                        Job::Sleep { duration, reply } => {
                            thread::sleep(duration);
                            let _ = reply.send(());
                        }
                    }
                }
                debug!("runtime worker drained, exiting");
                engine
            })
            .map_err(|e| UnifyError::internal(format!("failed to spawn runtime worker: {e}")))?;

        Ok(Self {
            tx: Some(tx),
            worker: Some(worker),
            queue_capacity,
        })
    }

    fn try_submit(&self, job: Job) -> UnifyResult<()> {
        let tx = self
            .tx
            .as_ref()
            .ok_or(UnifyError::Execution(ExecutionError::Disconnected))?;
        match tx.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(UnifyError::Execution(ExecutionError::QueueFull {
                capacity: self.queue_capacity,
            })),
            Err(TrySendError::Disconnected(_)) => {
                Err(UnifyError::Execution(ExecutionError::Disconnected))
            }
        }
    }

    /// Queues a request without waiting for it.
    ///
    /// # Errors
    /// `QueueFull` when the queue is at capacity, `Disconnected` when the
    /// worker is gone.
    pub fn submit(&self, request: EngineRequest) -> UnifyResult<RequestHandle> {
        let (reply, rx) = bounded::<EngineResponse>(1);
        self.try_submit(Job::Execute { request, reply })?;
        Ok(RequestHandle { rx })
    }

    /// Queues a request and waits for its response.
    ///
    /// # Errors
    /// Submission errors as for [`Self::submit`], and `Disconnected` if the
    /// worker stops before replying.
    pub fn execute(&self, request: EngineRequest) -> UnifyResult<EngineResponse> {
        self.submit(request)?.join()
    }

    /// See [`UnificationEngine::ingest_platform_data`].
    ///
    /// # Errors
    /// Submission errors as for [`Self::submit`], and `Disconnected` if the
    /// worker stops before replying.
    pub fn ingest_platform_data(
        &self,
        platform: impl Into<String>,
        records: Vec<RawRecord>,
    ) -> UnifyResult<Vec<UnifiedEntity>> {
        match self.execute(EngineRequest::Ingest {
            platform: platform.into(),
            records,
        })? {
            EngineResponse::Ingested(report) => Ok(report.entities),
            other => Err(unexpected(&other)),
        }
    }

    /// See [`UnificationEngine::detect_anomalies`].
    ///
    /// # Errors
    /// Submission errors as for [`Self::submit`], and `Disconnected` if the
    /// worker stops before replying.
    pub fn detect_anomalies(&self) -> UnifyResult<Vec<DataAnomaly>> {
        match self.execute(EngineRequest::DetectAnomalies)? {
            EngineResponse::Anomalies(found) => Ok(found),
            other => Err(unexpected(&other)),
        }
    }

    /// See [`UnificationEngine::search_unified_entities`].
    ///
    /// # Errors
    /// Submission errors as for [`Self::submit`], and `Disconnected` if the
    /// worker stops before replying.
    pub fn search_unified_entities(
        &self,
        query: impl Into<String>,
        types: Option<Vec<EntityType>>,
    ) -> UnifyResult<Vec<UnifiedEntity>> {
        match self.execute(EngineRequest::Search {
            query: query.into(),
            types,
        })? {
            EngineResponse::Entities(found) => Ok(found),
            other => Err(unexpected(&other)),
        }
    }

    /// See [`UnificationEngine::get_entity_relationships`].
    ///
    /// # Errors
    /// Submission errors as for [`Self::submit`], and `Disconnected` if the
    /// worker stops before replying.
    pub fn get_entity_relationships(
        &self,
        entity_id: EntityId,
        relationship_type: Option<String>,
    ) -> UnifyResult<Vec<DataRelationship>> {
        match self.execute(EngineRequest::EntityRelationships {
            entity_id,
            relationship_type,
        })? {
            EngineResponse::Relationships(found) => Ok(found),
            other => Err(unexpected(&other)),
        }
    }

    /// See [`UnificationEngine::get_platform_entities`].
    ///
    /// # Errors
    /// Submission errors as for [`Self::submit`], and `Disconnected` if the
    /// worker stops before replying.
    pub fn get_platform_entities(
        &self,
        platform: impl Into<String>,
        entity_type: Option<EntityType>,
    ) -> UnifyResult<Vec<UnifiedEntity>> {
        match self.execute(EngineRequest::PlatformEntities {
            platform: platform.into(),
            entity_type,
        })? {
            EngineResponse::Entities(found) => Ok(found),
            other => Err(unexpected(&other)),
        }
    }

    /// See [`UnificationEngine::get_entity_timeline`].
    ///
    /// # Errors
    /// Submission errors as for [`Self::submit`], and `Disconnected` if the
    /// worker stops before replying.
    pub fn get_entity_timeline(&self, entity_id: EntityId) -> UnifyResult<Vec<TimelineEvent>> {
        match self.execute(EngineRequest::Timeline { entity_id })? {
            EngineResponse::Timeline(events) => Ok(events),
            other => Err(unexpected(&other)),
        }
    }

    /// See [`UnificationEngine::stats`].
    ///
    /// # Errors
    /// Submission errors as for [`Self::submit`], and `Disconnected` if the
    /// worker stops before replying.
    pub fn stats(&self) -> UnifyResult<UnificationStats> {
        match self.execute(EngineRequest::Stats)? {
            EngineResponse::Stats(stats) => Ok(stats),
            other => Err(unexpected(&other)),
        }
    }

    /// Drains queued requests, stops the worker and returns the engine.
    ///
    /// # Errors
    /// Returns an internal error if the worker panicked.
    pub fn shutdown(mut self) -> UnifyResult<UnificationEngine> {
        drop(self.tx.take());
        let worker = self
            .worker
            .take()
            .ok_or_else(|| UnifyError::internal("runtime worker already joined"))?;
        worker
            .join()
            .map_err(|_| UnifyError::internal("runtime worker panicked"))
    }

    #[cfg(test)]
    fn submit_sleep(&self, duration: Duration) -> UnifyResult<Receiver<()>> {
        let (reply, rx) = bounded::<()>(1);
        self.try_submit(Job::Sleep { duration, reply })?;
        Ok(rx)
    }
}

impl Drop for EngineRuntime {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain queued jobs then exit.
        drop(self.tx.take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn unexpected(response: &EngineResponse) -> UnifyError {
    UnifyError::internal(format!("unexpected runtime response: {response:?}"))
}
