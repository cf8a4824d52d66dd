//! # Map-Reduce
//!
//! Ships a custom job to every peer and folds the responses locally.
//!
//! There is no completion signal. Responses stream in for as long as the
//! returned handle is alive; the caller decides when enough have arrived,
//! e.g. by counting against the known neighbour set, and then cancels.

use std::collections::BTreeMap;

use meshrpc::Command;
use meshrpc::JobId;
use meshrpc::ResponseShape;
use meshrpc::Val;
use tracing::debug;

use crate::events::Event;
use crate::events::EventKind;
use crate::events::Subscription;
use crate::interpreter::Interpreter;
use crate::interpreter::Result;

/// A running map-reduce. Dropping it stops the reducer.
#[must_use = "dropping a MapReduce stops its reducer"]
#[derive(Debug)]
pub struct MapReduce {
    job: JobId,
    subscription: Subscription,
}

impl MapReduce {
    pub fn job(&self) -> &JobId {
        &self.job
    }

    /// Stops feeding responses to the reducer. Late responses are still
    /// emitted as events; they just no longer reach it.
    pub fn cancel(self) {
        debug!(job = %self.job, "map-reduce cancelled");
        self.subscription.cancel();
    }
}

impl Interpreter {
    /// Runs the mapper registered as `mapper` on every peer that can resolve
    /// `key`, calling `reducer` once per response to this job.
    pub async fn map_reduce<F>(&self, key: &str, mapper: &str, reducer: F) -> Result<MapReduce>
    where
        F: Fn(&BTreeMap<String, Val>, &Command) + Send + Sync + 'static,
    {
        self.map_reduce_with_shape(key, mapper, ResponseShape::Stream, reducer).await
    }

    /// Like `map_reduce`, with an explicit response shape.
    pub async fn map_reduce_with_shape<F>(
        &self,
        key: &str,
        mapper: &str,
        shape: ResponseShape,
        reducer: F,
    ) -> Result<MapReduce>
    where
        F: Fn(&BTreeMap<String, Val>, &Command) + Send + Sync + 'static,
    {
        let job = self.next_job();

        // Subscribe before sending so no response can outrun the reducer.
        let wanted = job.clone();
        let subscription = self.on(EventKind::BroadcastCustomResult, move |event| {
            if let Event::BroadcastCustomResult { value, command } = event {
                if command.job() == Some(&wanted) {
                    reducer(value, command);
                }
            }
        });

        self.send_custom(job.clone(), key, mapper, shape).await?;
        Ok(MapReduce { job, subscription })
    }
}
