use std::fmt;
use std::marker::PhantomData;

use gpuremote_frame::StreamId;
use gpuremote_wire::{Command, CommonOp, Identifier, ObjectOp, ReplyValue, ResourceKind};
use tracing::debug;

use crate::connection::Connection;
use crate::error::Result;

/// Client stand-in for one host object of kind `K`.
///
/// A proxy owns its identifier. Dropping it (or calling
/// [`Proxy::release`]) posts exactly one `Release` on the proxy's stream;
/// after that the host treats the identifier as unknown.
pub struct Proxy<K: ResourceKind> {
    id: Identifier,
    stream: StreamId,
    conn: Connection,
    released: bool,
    _kind: PhantomData<fn() -> K>,
}

impl<K: ResourceKind> Proxy<K> {
    pub(crate) fn new(id: Identifier, stream: StreamId, conn: Connection) -> Self {
        Self {
            id,
            stream,
            conn,
            released: false,
            _kind: PhantomData,
        }
    }

    pub fn id(&self) -> Identifier {
        self.id
    }

    /// Every operation on this proxy travels on this stream.
    pub fn stream(&self) -> StreamId {
        self.stream
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn command(&self, op: ObjectOp) -> Command {
        Command::Object {
            target: self.id,
            op,
        }
    }

    /// Post a kind-specific operation.
    pub fn post_op(&self, op: K::Op) -> Result<()> {
        self.conn.post(self.stream, self.command(K::wrap(op)))
    }

    /// Send a kind-specific operation and wait for the reply.
    pub fn request_op(&self, op: K::Op) -> Result<ReplyValue> {
        self.conn.request(self.stream, self.command(K::wrap(op)))
    }

    pub fn set_label(&self, label: impl Into<String>) -> Result<()> {
        self.conn.post(
            self.stream,
            self.command(ObjectOp::Common(CommonOp::SetLabel {
                label: label.into(),
            })),
        )
    }

    /// Post a child creation and hand back the child's proxy. No proxy is
    /// created when the post fails.
    pub(crate) fn create_child<C: ResourceKind>(
        &self,
        build: impl FnOnce(Identifier) -> K::Op,
    ) -> Result<Proxy<C>> {
        let child = self.conn.generate_id();
        self.post_op(build(child))?;
        Ok(Proxy::new(child, self.stream, self.conn.clone()))
    }

    /// Release the host object now and report whether the post went out.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.post_release()
    }

    fn post_release(&self) -> Result<()> {
        self.conn
            .post(self.stream, self.command(ObjectOp::Common(CommonOp::Release)))
    }
}

impl<K: ResourceKind> Drop for Proxy<K> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if self.conn.is_closed() {
            return;
        }
        if let Err(err) = self.post_release() {
            debug!(id = %self.id, kind = %K::KIND, error = %err, "release not delivered");
        }
    }
}

impl<K: ResourceKind> fmt::Debug for Proxy<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("kind", &K::KIND)
            .field("id", &self.id)
            .field("stream", &self.stream)
            .finish()
    }
}
