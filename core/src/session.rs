//! Shared environment requests are started in.

use std::sync::Arc;

use crate::context::{ContextHandle, MainContext};
use crate::transport::{Transport, TransportConfig, UreqTransport};

/// A transport plus the main context completions are delivered to.
///
/// Cheap to clone; every `Request` keeps its own copy.
#[derive(Clone)]
pub struct Session {
    transport: Arc<dyn Transport>,
    context: ContextHandle,
}

impl Session {
    pub fn new(transport: Arc<dyn Transport>, context: ContextHandle) -> Self {
        Self { transport, context }
    }

    /// Session using a `UreqTransport` configured from the environment.
    pub fn with_default_transport(context: &MainContext) -> Self {
        Self::new(
            Arc::new(UreqTransport::new(TransportConfig::from_env())),
            context.handle(),
        )
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn context(&self) -> &ContextHandle {
        &self.context
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}
