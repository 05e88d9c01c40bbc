//! The shared link to one modbus server.
//!
//! Every module and device of a network holds the same `Arc<ModbusLink>`. A connection
//! scope is opened with [`ModbusLink::acquire`]: it locks the transport, connects with a
//! timeout and hands back a [`LinkGuard`]. The lock is released on every exit path: a
//! failed or timed-out connect drops it right away, [`LinkGuard::release`] disconnects and
//! unlocks, and dropping the guard without releasing aborts the connection and unlocks.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::timeout;

use super::traits::ModbusTransport;
use crate::common::error::DriftError;
use crate::{debug, trace, warn};

const LOG_TAG: &str = "modbus_link";

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

static NEXT_LINK_ID: AtomicUsize = AtomicUsize::new(1);

pub struct ModbusLink {
    id: usize,
    host: String,
    port: u16,
    connect_timeout: Duration,
    transport: Arc<Mutex<Box<dyn ModbusTransport>>>,
}

impl ModbusLink {
    pub fn new(host: &str, port: u16, transport: Box<dyn ModbusTransport>) -> Self {
        ModbusLink {
            id: NEXT_LINK_ID.fetch_add(1, Ordering::Relaxed),
            host: host.to_string(),
            port,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            transport: Arc::new(Mutex::new(transport)),
        }
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// 当前是否有连接作用域被占用
    pub fn is_locked(&self) -> bool {
        self.transport.try_lock().is_err()
    }

    /// Lock the transport and connect. Waits for any other scope to be released first.
    pub async fn acquire(&self) -> Result<LinkGuard, DriftError> {
        let mut transport = self.transport.clone().lock_owned().await;
        trace!(LOG_TAG, "link lock acquired for {}:{}", self.host, self.port);

        match timeout(self.connect_timeout, transport.connect()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                transport.abort();
                warn!(LOG_TAG, "connect to {}:{} failed: {}", self.host, self.port, e);
                return Err(DriftError::Connection(format!("failed connecting to server at {}:{}: {}", self.host, self.port, e)));
            }
            Err(_) => {
                transport.abort();
                warn!(LOG_TAG, "connect to {}:{} timed out after {:?}", self.host, self.port, self.connect_timeout);
                return Err(DriftError::Connection(format!(
                    "timed out connecting to server at {}:{} after {:?}",
                    self.host, self.port, self.connect_timeout
                )));
            }
        }

        if !transport.is_connected() {
            transport.abort();
            return Err(DriftError::Connection(format!("failed connecting to server at {}:{}", self.host, self.port)));
        }

        debug!(LOG_TAG, "connected to {}:{}", self.host, self.port);
        Ok(LinkGuard { link_id: self.id, transport, released: false })
    }
}

impl fmt::Debug for ModbusLink {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ModbusLink")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// An open connection scope; derefs to the transport.
pub struct LinkGuard {
    link_id: usize,
    transport: OwnedMutexGuard<Box<dyn ModbusTransport>>,
    released: bool,
}

impl LinkGuard {
    /// the guard was opened on `link`
    pub fn belongs_to(&self, link: &ModbusLink) -> bool {
        self.link_id == link.id
    }

    pub fn ensure_belongs_to(&self, link: &ModbusLink) -> Result<(), DriftError> {
        if self.belongs_to(link) {
            Ok(())
        } else {
            Err(DriftError::Connection(format!("connection scope was not opened on {}:{}", link.host, link.port)))
        }
    }

    /// 断开连接并释放锁
    pub async fn release(mut self) -> Result<(), DriftError> {
        let result = self.transport.disconnect().await;
        self.released = true;
        result
    }
}

impl Deref for LinkGuard {
    type Target = dyn ModbusTransport;

    fn deref(&self) -> &Self::Target {
        &**self.transport
    }
}

impl DerefMut for LinkGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut **self.transport
    }
}

impl Drop for LinkGuard {
    fn drop(&mut self) {
        if !self.released {
            trace!(LOG_TAG, "connection scope dropped without release");
        }
        if self.transport.is_connected() {
            self.transport.abort();
        }
    }
}
