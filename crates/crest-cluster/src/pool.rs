//! `ScalablePool` backed by the cluster's scale subresource.

use async_trait::async_trait;
use tracing::debug;

use crest_core::{PoolRef, ResourceError, ScalablePool};

use crate::client::ClusterClient;

/// A deployment-like object resized through its scale subresource.
pub struct ScaledPool {
    client: ClusterClient,
    target: PoolRef,
}

impl ScaledPool {
    pub fn new(client: ClusterClient, target: PoolRef) -> Self {
        Self { client, target }
    }
}

#[async_trait]
impl ScalablePool for ScaledPool {
    fn target(&self) -> &PoolRef {
        &self.target
    }

    async fn replicas(&self) -> Result<u32, ResourceError> {
        Ok(self.client.get_scale(&self.target).await?.spec.replicas)
    }

    async fn observed_replicas(&self) -> Result<u32, ResourceError> {
        Ok(self.client.get_scale(&self.target).await?.status.replicas)
    }

    async fn scale_to(&self, replicas: u32) -> Result<(), ResourceError> {
        // Write back the scale we just read; its resourceVersion makes
        // the PUT fail if someone else resized the object in between.
        let mut scale = self.client.get_scale(&self.target).await?;
        scale.spec.replicas = replicas;
        debug!(pool = %self.target, replicas, "writing scale");
        self.client.put_scale(&self.target, &scale).await?;
        Ok(())
    }
}
