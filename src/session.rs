//! One attacker↔container pairing: two shared socket handles and the two
//! copier tasks operating on them, keyed by container id.

use std::sync::Arc;

use socket2::SockRef;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::debug;

/// Lifecycle state per the state machine in the connection manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Starting,
    Active,
    Closing,
    Closed,
}

/// A registered session. Lives in the manager's session table from the
/// moment both copier tasks are spawned until `end_session` detaches
/// it. The two sockets are also held (via `Arc`) by the copier tasks
/// themselves, so closing them here is what unblocks whichever
/// direction is still parked in a pending read — the tasks are never
/// cancelled out from under themselves; they run their own teardown
/// (including the direction-gated "connection ended" log) after
/// observing EOF.
pub struct Session {
    pub container_id: String,
    client_socket: Arc<TcpStream>,
    honeypot_socket: Arc<TcpStream>,
    pub c2h_task: JoinHandle<()>,
    pub h2c_task: JoinHandle<()>,
    pub state: SessionState,
}

impl Session {
    pub fn new(
        container_id: String,
        client_socket: Arc<TcpStream>,
        honeypot_socket: Arc<TcpStream>,
        c2h_task: JoinHandle<()>,
        h2c_task: JoinHandle<()>,
    ) -> Self {
        Self {
            container_id,
            client_socket,
            honeypot_socket,
            c2h_task,
            h2c_task,
            state: SessionState::Active,
        }
    }

    /// Shut down both directions of both sockets, idempotently. Safe to
    /// call more than once: a socket already shut down just yields an
    /// OS error that is swallowed here. This is what makes the peer
    /// copier's blocked `read()` return EOF rather than aborting it.
    pub fn close_sockets_once(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closing;

        for socket in [&self.client_socket, &self.honeypot_socket] {
            if let Err(e) = SockRef::from(socket.as_ref()).shutdown(std::net::Shutdown::Both) {
                debug!(error = %e, "socket already shut down");
            }
        }

        self.state = SessionState::Closed;
    }

    /// The two copier tasks, consumed for joining during drain.
    pub fn into_joinable(self) -> (JoinHandle<()>, JoinHandle<()>) {
        (self.c2h_task, self.h2c_task)
    }
}
