use std::sync::Arc;

use crate::pipeline::PipelineOrchestrator;

#[derive(Clone, Debug)]
pub struct HandlerState {
    pub pipeline: Arc<PipelineOrchestrator>,
}

impl HandlerState {
    pub fn new(pipeline: Arc<PipelineOrchestrator>) -> Self {
        Self { pipeline }
    }
}
