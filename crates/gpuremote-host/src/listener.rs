use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use gpuremote_transport::{GpuSocket, IpcStream};

use crate::backend::Backend;
use crate::config::HostConfig;
use crate::error::{HostError, Result};
use crate::session::{Session, SessionReport};

/// Accepts client connections on the host socket.
pub struct HostListener {
    socket: GpuSocket,
    backend: Arc<dyn Backend>,
    config: HostConfig,
    next_session: AtomicU64,
}

impl HostListener {
    /// Bind the host socket at `path`. Every session drives `backend`.
    pub fn bind(path: impl AsRef<Path>, backend: Arc<dyn Backend>) -> Result<Self> {
        let socket = GpuSocket::bind(path)?;
        Ok(Self {
            socket,
            backend,
            config: HostConfig::default(),
            next_session: AtomicU64::new(1),
        })
    }

    pub fn with_config(mut self, config: HostConfig) -> Self {
        self.config = config;
        self
    }

    /// Accept the next client and run its handshake. The session id is
    /// generated.
    pub fn accept(&self) -> Result<Session> {
        let n = self.next_session.fetch_add(1, Ordering::Relaxed);
        self.accept_with_id(&format!("session-{n}"))
    }

    pub fn accept_with_id(&self, session_id: &str) -> Result<Session> {
        let stream = self.socket.accept()?;
        Session::establish(stream, session_id, Arc::clone(&self.backend), &self.config)
    }

    pub fn path(&self) -> &Path {
        self.socket.path()
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }
}

/// Run a host session in a background thread of this process.
///
/// Returns the client end of the connection, ready for a client handshake,
/// and the thread running the session.
pub fn spawn_local(
    backend: Arc<dyn Backend>,
    config: HostConfig,
) -> Result<(IpcStream, JoinHandle<Result<SessionReport>>)> {
    let (host_end, client_end) = IpcStream::pair()?;
    let handle = thread::Builder::new()
        .name("gpuremote-local-host".to_string())
        .spawn(move || {
            let session = Session::establish(host_end, "session-local", backend, &config)?;
            Ok(session.run())
        })
        .map_err(|source| HostError::Spawn {
            what: "local host".to_string(),
            source,
        })?;
    Ok((client_end, handle))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use gpuremote_frame::FrameConfig;
    use gpuremote_peer::{establish_client, HandshakeConfig};

    use super::*;
    use crate::memory::MemoryBackend;
    use crate::session::SessionEnd;

    fn make_sock_path(tag: &str) -> PathBuf {
        let dir = PathBuf::from(format!(
            "/tmp/gpuremote-host-{}-{}-{}",
            tag,
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        dir.join("host.sock")
    }

    fn connect(path: &Path, streams: u16) -> gpuremote_peer::Established {
        let stream = GpuSocket::connect(path).expect("client should connect");
        establish_client(stream, streams, &HandshakeConfig::default(), &FrameConfig::default())
            .expect("handshake should succeed")
    }

    #[test]
    fn sessions_get_sequential_ids_and_capped_streams() {
        let sock_path = make_sock_path("accept");
        let listener = HostListener::bind(&sock_path, Arc::new(MemoryBackend::new()))
            .expect("listener should bind")
            .with_config(HostConfig::default().with_max_streams(2));

        let server = thread::spawn(move || {
            let first = listener.accept().expect("first accept should succeed");
            let second = listener.accept().expect("second accept should succeed");
            (
                first.id().to_string(),
                second.id().to_string(),
                second.handshake().streams,
            )
        });

        let first = connect(&sock_path, 1);
        let second = connect(&sock_path, 6);
        assert_eq!(first.handshake.session_id, "session-1");
        assert_eq!(second.handshake.streams, 2);

        let (a, b, streams) = server.join().expect("server thread should finish");
        assert_eq!((a.as_str(), b.as_str(), streams), ("session-1", "session-2", 2));

        if let Some(parent) = sock_path.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }
    }

    #[test]
    fn spawn_local_runs_until_the_client_leaves() {
        let (stream, host) =
            spawn_local(Arc::new(MemoryBackend::new()), HostConfig::default()).unwrap();
        let est = establish_client(stream, 3, &HandshakeConfig::default(), &FrameConfig::default())
            .unwrap();
        assert_eq!(est.handshake.session_id, "session-local");
        drop(est);

        let report = host.join().unwrap().unwrap();
        assert_eq!(report.end, SessionEnd::PeerClosed);
        assert_eq!(report.streams, 3);
    }
}
