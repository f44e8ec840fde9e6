use actix_web::dev::{Server, ServerHandle};
use actix_web::web::Data;
use parking_lot::Mutex;

use crate::cache::{IdentityCache, SessionCache};
use crate::logger::Logger;
use crate::memorydb::interface::MemoryDB;
use crate::Result;

/// Process-wide runtime surface: the caches, the logger and the server
/// stop handle. Built once at start-up and shared read-only (plus
/// interior-mutable cache/handle state) across every request.
pub struct GlobalState<M>
where
    M: MemoryDB,
{
    pub sessions: SessionCache<M>,
    pub identities: IdentityCache<M>,

    /// Global logger.
    pub logger: Logger,

    /// Handle stop state.
    pub stop_handle: StopHandle,
}

impl<M> GlobalState<M>
where
    M: MemoryDB,
{
    pub fn build(self) -> Data<Self> {
        Data::new(self)
    }
}

#[derive(Default)]
pub struct StopHandle {
    inner: Mutex<Option<ServerHandle>>,
}

impl StopHandle {
    /// Sets the server handle and start blocking.
    pub async fn start(&self, server: Server) -> Result<()> {
        *self.inner.lock() = Some(server.handle());
        server.await.map_err(Into::into)
    }

    /// Sends stop signal through contained server handle.
    pub fn stop(&self, graceful: bool) {
        #[allow(clippy::let_underscore_future)]
        let _ = self.inner.lock().as_ref().unwrap().stop(graceful);
    }
}
