//! Scale-up step: grow a pool by one replica.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{info, warn};

use crest_core::{Annotation, DynEventSink, DynPool, PoolRef};

use crate::graph::{Context, StateId};

/// Grows its pool by one replica per visit.
///
/// The target is read fresh from the pool each visit, so converging
/// edges from several states keep working on the true current count.
/// Once one more replica would exceed the ceiling the ramp finishes
/// without touching the pool.
pub struct ScaleUp {
    pool: DynPool,
    events: DynEventSink,
    /// Highest replica count this state may request.
    limit: u32,
    /// Follow-up state after a successful scale-up; `None` finishes.
    pub(crate) next: Option<StateId>,
}

impl ScaleUp {
    pub fn new(pool: DynPool, events: DynEventSink, limit: u32) -> Self {
        Self {
            pool,
            events,
            limit,
            next: None,
        }
    }

    pub(crate) async fn check(&mut self, ctx: &mut Context) -> anyhow::Result<()> {
        let current = self.pool.replicas().await?;
        let target = current + 1;

        if target > self.limit {
            info!(
                pool = %self.pool.target(),
                limit = self.limit,
                "replica ceiling reached, finishing ramp"
            );
            ctx.advance(None);
            return Ok(());
        }

        info!(
            pool = %self.pool.target(),
            from = current,
            to = target,
            "scaling up"
        );
        self.pool.scale_to(target).await?;

        let event = Annotation {
            epoch_ms: epoch_millis(),
            title: "Scaling up".to_string(),
            description: format!("Scaling {} to {target} replicas", self.pool.target()),
            tags: pool_tags(self.pool.target()),
        };
        if let Err(e) = self.events.write_event(&event).await {
            warn!(pool = %self.pool.target(), error = %e, "failed to record scale event");
        }

        ctx.advance(self.next);
        Ok(())
    }
}

fn pool_tags(pool: &PoolRef) -> HashMap<String, String> {
    HashMap::from([
        ("namespace".to_string(), pool.namespace.clone()),
        ("kind".to_string(), pool.kind.clone()),
        ("name".to_string(), pool.name.clone()),
    ])
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
