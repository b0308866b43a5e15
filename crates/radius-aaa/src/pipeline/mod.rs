//! Access-Request processing as a named, ordered list of stages
//!
//! Stages share one [`AuthRequestContext`]. Any stage may finish the request
//! early by setting `ctx.stopped`; the first error aborts the run and is
//! tagged with the name of the stage that raised it.

pub mod context;
pub mod stages;

pub use context::AuthRequestContext;
pub use stages::PipelineDeps;

use crate::error::AuthError;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("pipeline stage not found: {0}")]
    StageNotFound(String),
}

#[async_trait]
pub trait PipelineStage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(&self, ctx: &mut AuthRequestContext) -> Result<(), AuthError>;
}

#[derive(Clone, Default)]
pub struct AuthPipeline {
    stages: Vec<Arc<dyn PipelineStage>>,
}

impl AuthPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// The seven built-in stages in their default order
    pub fn with_default_stages(deps: &PipelineDeps) -> Self {
        let mut pipeline = Self::new();
        for stage in stages::default_stages(deps) {
            pipeline.append(stage);
        }
        pipeline
    }

    fn position(&self, name: &str) -> Result<usize, PipelineError> {
        self.stages
            .iter()
            .position(|s| s.name() == name)
            .ok_or_else(|| PipelineError::StageNotFound(name.to_string()))
    }

    pub fn append(&mut self, stage: Arc<dyn PipelineStage>) {
        self.stages.push(stage);
    }

    pub fn insert_before(
        &mut self,
        name: &str,
        stage: Arc<dyn PipelineStage>,
    ) -> Result<(), PipelineError> {
        let index = self.position(name)?;
        self.stages.insert(index, stage);
        Ok(())
    }

    pub fn insert_after(
        &mut self,
        name: &str,
        stage: Arc<dyn PipelineStage>,
    ) -> Result<(), PipelineError> {
        let index = self.position(name)?;
        self.stages.insert(index + 1, stage);
        Ok(())
    }

    pub fn replace(
        &mut self,
        name: &str,
        stage: Arc<dyn PipelineStage>,
    ) -> Result<(), PipelineError> {
        let index = self.position(name)?;
        self.stages[index] = stage;
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<(), PipelineError> {
        let index = self.position(name)?;
        self.stages.remove(index);
        Ok(())
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub async fn execute(&self, ctx: &mut AuthRequestContext) -> Result<(), AuthError> {
        for stage in &self.stages {
            if ctx.stopped {
                break;
            }
            trace!(stage = stage.name(), username = %ctx.username, "running stage");
            stage
                .execute(ctx)
                .await
                .map_err(|e| e.in_stage(stage.name()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::context::test_context;
    use radius_wire::{Code, Packet};

    struct Mark(&'static str);

    #[async_trait]
    impl PipelineStage for Mark {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn execute(&self, ctx: &mut AuthRequestContext) -> Result<(), AuthError> {
            let mut trail = ctx.metadata_str("trail").unwrap_or_default().to_string();
            trail.push_str(self.0);
            ctx.set_metadata("trail", trail);
            Ok(())
        }
    }

    struct Stop;

    #[async_trait]
    impl PipelineStage for Stop {
        fn name(&self) -> &'static str {
            "stop"
        }

        async fn execute(&self, ctx: &mut AuthRequestContext) -> Result<(), AuthError> {
            ctx.stopped = true;
            Ok(())
        }
    }

    struct Fail;

    #[async_trait]
    impl PipelineStage for Fail {
        fn name(&self) -> &'static str {
            "fail"
        }

        async fn execute(&self, _ctx: &mut AuthRequestContext) -> Result<(), AuthError> {
            Err(AuthError::PasswordMismatch)
        }
    }

    fn ctx() -> AuthRequestContext {
        test_context(Packet::new(Code::AccessRequest, 1, [0; 16]), b"s")
    }

    #[test]
    fn test_composition() {
        let mut pipeline = AuthPipeline::new();
        pipeline.append(Arc::new(Mark("a")));
        pipeline.append(Arc::new(Mark("c")));
        pipeline.insert_before("c", Arc::new(Mark("b"))).unwrap();
        pipeline.insert_after("c", Arc::new(Mark("d"))).unwrap();
        assert_eq!(pipeline.stage_names(), ["a", "b", "c", "d"]);

        pipeline.replace("b", Arc::new(Mark("x"))).unwrap();
        pipeline.remove("a").unwrap();
        assert_eq!(pipeline.stage_names(), ["x", "c", "d"]);

        assert_eq!(
            pipeline.remove("nope"),
            Err(PipelineError::StageNotFound("nope".into()))
        );
        assert!(pipeline.insert_before("nope", Arc::new(Stop)).is_err());
        assert!(pipeline.insert_after("nope", Arc::new(Stop)).is_err());
        assert!(pipeline.replace("nope", Arc::new(Stop)).is_err());
    }

    #[tokio::test]
    async fn test_stopped_skips_remaining_stages() {
        let mut pipeline = AuthPipeline::new();
        pipeline.append(Arc::new(Mark("a")));
        pipeline.append(Arc::new(Stop));
        pipeline.append(Arc::new(Mark("b")));

        let mut ctx = ctx();
        pipeline.execute(&mut ctx).await.unwrap();
        assert_eq!(ctx.metadata_str("trail"), Some("a"));
    }

    #[tokio::test]
    async fn test_error_carries_stage_name() {
        let mut pipeline = AuthPipeline::new();
        pipeline.append(Arc::new(Mark("a")));
        pipeline.append(Arc::new(Fail));
        pipeline.append(Arc::new(Mark("b")));

        let mut ctx = ctx();
        let err = pipeline.execute(&mut ctx).await.unwrap_err();
        assert_eq!(err.stage(), Some("fail"));
        assert!(matches!(err.root(), AuthError::PasswordMismatch));
        assert_eq!(ctx.metadata_str("trail"), Some("a"));
    }
}
