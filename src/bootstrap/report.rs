//! Record of a shutdown sequence.

use std::fmt;

/// Shutdown stages, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ShutdownStage {
    ServerStop,
    EndpointDestroy,
    ConsumerStop,
    ConsumerDestroy,
    TaskQueueDestroy,
    ProducerDestroy,
    StorageManagerDestroy,
    EngineClose,
}

impl ShutdownStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShutdownStage::ServerStop => "server_stop",
            ShutdownStage::EndpointDestroy => "endpoint_destroy",
            ShutdownStage::ConsumerStop => "consumer_stop",
            ShutdownStage::ConsumerDestroy => "consumer_destroy",
            ShutdownStage::TaskQueueDestroy => "task_queue_destroy",
            ShutdownStage::ProducerDestroy => "producer_destroy",
            ShutdownStage::StorageManagerDestroy => "storage_manager_destroy",
            ShutdownStage::EngineClose => "engine_close",
        }
    }
}

impl fmt::Display for ShutdownStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One executed step: which stage, which component, and any error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownStep {
    pub stage: ShutdownStage,
    pub component: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ShutdownReport {
    steps: Vec<ShutdownStep>,
}

impl ShutdownReport {
    pub(crate) fn record<E: fmt::Display>(
        &mut self,
        stage: ShutdownStage,
        component: impl Into<String>,
        result: Result<(), E>,
    ) {
        let component = component.into();
        let error = result.err().map(|e| e.to_string());
        match &error {
            Some(e) => tracing::warn!(step = %stage, component = %component, error = %e, "Shutdown step failed"),
            None => tracing::debug!(step = %stage, component = %component, "Shutdown step done"),
        }
        self.steps.push(ShutdownStep {
            stage,
            component,
            error,
        });
    }

    pub fn steps(&self) -> &[ShutdownStep] {
        &self.steps
    }

    pub fn is_clean(&self) -> bool {
        self.steps.iter().all(|step| step.error.is_none())
    }

    pub fn failures(&self) -> impl Iterator<Item = &ShutdownStep> {
        self.steps.iter().filter(|step| step.error.is_some())
    }

    /// Stages in execution order.
    pub fn stages(&self) -> Vec<ShutdownStage> {
        self.steps.iter().map(|step| step.stage).collect()
    }
}
