//! Scripted backend used by the pool integration tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use parking_lot::Mutex;

use shardproxy_pool::{Connector, DEFAULT_CHARSET, Session, SessionError, Target};

/// Per-session knobs the test flips from outside the pool.
#[derive(Debug, Default)]
pub struct Script {
    pub in_tx: AtomicBool,
    pub protocol_error: AtomicBool,
    pub closed: AtomicBool,
    /// Mutating calls issued by sanitation.
    pub resets: AtomicUsize,
}

#[derive(Debug)]
pub struct FakeSession {
    id: u32,
    autocommit: bool,
    charset: String,
    script: Arc<Script>,
}

impl Session for FakeSession {
    fn connection_id(&self) -> u32 {
        self.id
    }

    fn ping(&mut self) -> Result<(), SessionError> {
        if self.script.closed.load(Ordering::SeqCst) {
            return Err(SessionError::Closed);
        }
        Ok(())
    }

    fn close(&mut self) {
        self.script.closed.store(true, Ordering::SeqCst);
    }

    fn in_transaction(&self) -> bool {
        self.script.in_tx.load(Ordering::SeqCst)
    }

    fn rollback(&mut self) -> Result<(), SessionError> {
        self.script.resets.fetch_add(1, Ordering::SeqCst);
        self.script.in_tx.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn autocommit(&self) -> bool {
        self.autocommit
    }

    fn set_autocommit(&mut self, on: bool) -> Result<(), SessionError> {
        self.script.resets.fetch_add(1, Ordering::SeqCst);
        self.autocommit = on;
        Ok(())
    }

    fn charset(&self) -> &str {
        &self.charset
    }

    fn set_charset(&mut self, charset: &str) -> Result<(), SessionError> {
        self.script.resets.fetch_add(1, Ordering::SeqCst);
        self.charset = charset.to_string();
        Ok(())
    }

    fn has_protocol_error(&self) -> bool {
        self.script.protocol_error.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct FakeBackend {
    next_id: AtomicU32,
    scripts: Mutex<HashMap<u32, Arc<Script>>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, id: u32) -> Arc<Script> {
        Arc::clone(&self.scripts.lock()[&id])
    }

    pub fn sessions_opened(&self) -> usize {
        self.scripts.lock().len()
    }
}

impl Connector for FakeBackend {
    fn connect(&self, target: &Target) -> Result<Box<dyn Session>, SessionError> {
        if target.addr.is_empty() {
            return Err(SessionError::Other("empty address".into()));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let script = Arc::new(Script::default());
        self.scripts.lock().insert(id, Arc::clone(&script));
        Ok(Box::new(FakeSession {
            id,
            autocommit: true,
            charset: DEFAULT_CHARSET.to_string(),
            script,
        }))
    }
}
