//! Shared resources handed to every composed tool.

use std::sync::{Arc, Mutex};

use act_bridge::ExtensionBridge;
use act_visual::BaselineStore;

use crate::session::TestSession;

/// Long-lived process resources the tool handlers share by reference.
///
/// The session is behind a sync mutex: handlers only touch it briefly after
/// their command round-trips complete, never across an await.
pub struct ToolContext {
    pub bridge: ExtensionBridge,
    pub session: Mutex<TestSession>,
    pub store: BaselineStore,
}

impl ToolContext {
    pub fn new(bridge: ExtensionBridge, store: BaselineStore) -> Arc<Self> {
        Arc::new(Self {
            bridge,
            session: Mutex::new(TestSession::new()),
            store,
        })
    }

    /// Record one assertion outcome on the shared session.
    pub fn record_assertion(&self, passed: bool, message: impl Into<String>) {
        self.session
            .lock()
            .expect("session lock poisoned")
            .add_assertion(passed, message);
    }
}
