//! # Service Registry
//!
//! The local-process namespace of connectable services. Registration claims a
//! unique name; resolution is a synchronous map lookup with no side effects.
//! Opening an endpoint mints a fresh duplex link and spawns the service loop
//! for that one client.
//!
//! `shutdown` is the service-death switch: it unregisters the name and severs
//! every live link, which is how bound clients come to observe
//! `Disconnected`.

use std::borrow::Borrow;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::channel::ChannelTransport;
use crate::connection;
use crate::connection::ConnEvents;
use crate::connection::Connection;
use crate::error::Error;
use crate::error::Result;
use crate::service;
use crate::service::Service;
use crate::transport::Transport;

/// A namespaced service identity, e.g. `"tether.demo.Info"`.
///
/// Immutable once chosen and unique within a registry.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct ServiceName(String);

impl ServiceName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ServiceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ServiceName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ServiceName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for ServiceName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

pub(crate) struct ServiceEntry {
    service: Arc<dyn Service>,
    /// Set by `shutdown`; a stale Endpoint must not open new links after.
    closed: AtomicBool,
    /// Per-client service loops, aborted wholesale on shutdown.
    loops: StdMutex<Vec<JoinHandle<()>>>,
}

/// A resolved, connectable service endpoint.
pub struct Endpoint {
    name: ServiceName,
    entry: Arc<ServiceEntry>,
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint").field("name", &self.name).finish()
    }
}

impl Endpoint {
    /// The name this endpoint resolved from.
    pub fn name(&self) -> &ServiceName {
        &self.name
    }

    /// Opens a fresh link to the service and spawns its service loop.
    pub(crate) fn open(&self) -> Result<Arc<dyn Transport>> {
        if self.entry.closed.load(Ordering::Acquire) {
            return Err(Error::NotFound(self.name.clone()));
        }
        let (client_end, server_end) = ChannelTransport::pair();
        let handle = tokio::spawn(service::serve(
            Arc::new(server_end) as Arc<dyn Transport>,
            self.entry.service.clone(),
        ));
        self.entry
            .loops
            .lock()
            .expect("service loop list lock poisoned")
            .push(handle);
        Ok(Arc::new(client_end))
    }
}

/// The central registry of named services.
///
/// Cheap to clone; all clones share one namespace.
#[derive(Clone)]
pub struct Registry {
    services: Arc<DashMap<ServiceName, Arc<ServiceEntry>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self { services: Arc::new(DashMap::new()) }
    }

    /// Registers a service under a unique name.
    pub fn register(&self, name: impl Into<ServiceName>, service: impl Service) -> Result<()> {
        let name = name.into();
        match self.services.entry(name.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(Error::AlreadyRegistered(name)),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                debug!(service = %name, "Service registered");
                slot.insert(Arc::new(ServiceEntry {
                    service: Arc::new(service),
                    closed: AtomicBool::new(false),
                    loops: StdMutex::new(Vec::new()),
                }));
                Ok(())
            }
        }
    }

    /// Resolves a name to an endpoint, synchronously and without side effects.
    pub fn resolve(&self, name: &str) -> Result<Endpoint> {
        self.services
            .get(name)
            .map(|entry| Endpoint {
                name: entry.key().clone(),
                entry: entry.value().clone(),
            })
            .ok_or_else(|| Error::NotFound(ServiceName::from(name)))
    }

    /// Unregisters a service and severs every live link to it.
    ///
    /// Bound clients observe `Disconnected`; their in-flight calls resolve
    /// with `ConnectionLost`. Returns `false` if the name was not registered.
    pub fn shutdown(&self, name: &str) -> bool {
        let Some((name, entry)) = self.services.remove(name) else {
            return false;
        };
        entry.closed.store(true, Ordering::Release);
        let handles = std::mem::take(
            &mut *entry.loops.lock().expect("service loop list lock poisoned"),
        );
        for handle in &handles {
            handle.abort();
        }
        debug!(service = %name, loops = handles.len(), "Service shut down");
        true
    }

    /// Initiates binding to a named service.
    ///
    /// Returns immediately with a connection in `Binding` state and the
    /// ordered event channel for its lifecycle notifications.
    pub fn connect(&self, name: impl Into<ServiceName>) -> (Connection, ConnEvents) {
        connection::connect(self.clone(), name.into())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
