//! In-memory connector for unit tests

use std::sync::Mutex;

use tokio::sync::mpsc::{self, error::TryRecvError};
use url::Url;

use crate::events::ConnectionEvent;
use crate::transport::{ConnectionHandle, ConnectionId, Connector, Outbound};

struct MockConnection {
    id: ConnectionId,
    uri: Url,
    events: mpsc::Sender<ConnectionEvent>,
    outbound: mpsc::UnboundedReceiver<Outbound>,
    log: Vec<Outbound>,
    closed: bool,
}

impl MockConnection {
    fn drain(&mut self) {
        loop {
            match self.outbound.try_recv() {
                Ok(message) => {
                    if message == Outbound::Close {
                        self.closed = true;
                    }
                    self.log.push(message);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
    }
}

/// Records every connection instead of dialing
///
/// With `auto_open`, each connection reports `Opened` immediately.
pub(crate) struct MockConnector {
    auto_open: bool,
    connections: Mutex<Vec<MockConnection>>,
}

impl MockConnector {
    pub(crate) fn new() -> Self {
        Self {
            auto_open: false,
            connections: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn auto_open() -> Self {
        Self {
            auto_open: true,
            connections: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn connection_count(&self) -> usize {
        self.connections.lock().unwrap().len()
    }

    /// Connections that have not been told to close
    pub(crate) fn live_count(&self) -> usize {
        let mut connections = self.connections.lock().unwrap();
        connections.iter_mut().for_each(MockConnection::drain);
        connections.iter().filter(|c| !c.closed).count()
    }

    pub(crate) fn id(&self, index: usize) -> ConnectionId {
        self.connections.lock().unwrap()[index].id
    }

    pub(crate) fn uri(&self, index: usize) -> Url {
        self.connections.lock().unwrap()[index].uri.clone()
    }

    /// Everything written to connection `index` so far
    pub(crate) fn outbound(&self, index: usize) -> Vec<Outbound> {
        let mut connections = self.connections.lock().unwrap();
        let connection = &mut connections[index];
        connection.drain();
        connection.log.clone()
    }

    /// Text messages written to connection `index` so far
    pub(crate) fn sent(&self, index: usize) -> Vec<String> {
        self.outbound(index)
            .into_iter()
            .filter_map(|m| match m {
                Outbound::Text(text) => Some(text),
                Outbound::Close => None,
            })
            .collect()
    }

    /// Report an event as connection `index`
    pub(crate) fn emit(&self, index: usize, event: ConnectionEvent) {
        let events = self.connections.lock().unwrap()[index].events.clone();
        events.try_send(event).unwrap();
    }
}

impl Connector for MockConnector {
    fn connect(
        &self,
        id: ConnectionId,
        uri: Url,
        events: mpsc::Sender<ConnectionEvent>,
    ) -> ConnectionHandle {
        let (tx, rx) = mpsc::unbounded_channel();

        if self.auto_open {
            events.try_send(ConnectionEvent::Opened { id }).unwrap();
        }

        self.connections.lock().unwrap().push(MockConnection {
            id,
            uri,
            events,
            outbound: rx,
            log: Vec::new(),
            closed: false,
        });

        ConnectionHandle::new(id, tx)
    }
}
