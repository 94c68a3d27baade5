//! Asynchronous confirmation before destructive or connecting operations.
//!
//! Each request runs in three steps: a synchronous check that can already
//! refuse, an awaited veto (a confirmation dialog, for instance), and a
//! synchronous re-check plus commit. No state is touched before the final
//! step, so a declined or abandoned future leaves the graph as it was.

use crate::connection::{ConnectRejection, Validation};
use crate::model::{Connection, Node, PortRef};
use crate::Editor;
use log::debug;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

pub type VetoFuture = Pin<Box<dyn Future<Output = bool>>>;

#[derive(Clone, Debug, PartialEq)]
pub enum DeleteRequest {
    Connection(Connection),
    /// The node plus every connection that would be removed with it.
    Node { node: Node, connections: Vec<Connection> },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeleteRejection {
    #[error("{0} not found")]
    NotFound(String),
    #[error("connection {0} is locked")]
    Locked(String),
    #[error("deletion of {0} was declined")]
    Declined(String),
}

pub trait DeleteVeto {
    fn confirm(&self, request: &DeleteRequest) -> VetoFuture;
}

impl<F> DeleteVeto for F
where
    F: Fn(&DeleteRequest) -> VetoFuture,
{
    fn confirm(&self, request: &DeleteRequest) -> VetoFuture {
        self(request)
    }
}

pub trait ConnectVeto {
    fn confirm(&self, source: &PortRef, target: &PortRef) -> VetoFuture;
}

impl<F> ConnectVeto for F
where
    F: Fn(&PortRef, &PortRef) -> VetoFuture,
{
    fn confirm(&self, source: &PortRef, target: &PortRef) -> VetoFuture {
        self(source, target)
    }
}

impl Editor {
    pub fn check_delete_connection(&self, id: &str) -> Result<DeleteRequest, DeleteRejection> {
        let c = self.store.connection(id).ok_or_else(|| DeleteRejection::NotFound(id.to_string()))?;
        if c.locked {
            return Err(DeleteRejection::Locked(id.to_string()));
        }
        Ok(DeleteRequest::Connection(c.clone()))
    }

    pub fn check_delete_node(&self, id: &str) -> Result<DeleteRequest, DeleteRejection> {
        let n = self.store.node(id).ok_or_else(|| DeleteRejection::NotFound(id.to_string()))?;
        let connections = self.store.connections_for_node(id).into_iter().cloned().collect();
        Ok(DeleteRequest::Node { node: n.clone(), connections })
    }

    /// Delete a connection if it exists, is unlocked and the delete veto (if
    /// any) agrees. Returns whether it was removed.
    pub async fn request_delete_connection(&mut self, id: &str) -> bool {
        match self.try_delete_connection(id).await {
            Ok(()) => true,
            Err(reason) => {
                debug!("delete of connection {} refused: {}", id, reason);
                false
            }
        }
    }

    pub async fn try_delete_connection(&mut self, id: &str) -> Result<(), DeleteRejection> {
        let request = self.check_delete_connection(id)?;
        if let Some(veto) = self.delete_veto.clone() {
            if !veto.confirm(&request).await {
                return Err(DeleteRejection::Declined(id.to_string()));
            }
        }
        self.check_delete_connection(id)?;
        self.remove_connection(id).map_err(|_| DeleteRejection::NotFound(id.to_string()))?;
        Ok(())
    }

    /// Node counterpart of [`request_delete_connection`](Self::request_delete_connection).
    /// Locks on its connections do not block a node delete.
    pub async fn request_delete_node(&mut self, id: &str) -> bool {
        let request = match self.check_delete_node(id) {
            Ok(r) => r,
            Err(reason) => {
                debug!("delete of node {} refused: {}", id, reason);
                return false;
            }
        };
        if let Some(veto) = self.delete_veto.clone() {
            if !veto.confirm(&request).await {
                debug!("delete of node {} declined", id);
                return false;
            }
        }
        self.remove_node(id).is_ok()
    }

    /// [`complete_connection_drag`](Self::complete_connection_drag) with the
    /// connect veto awaited between validation and commit. The drag stays
    /// active (and the canvas locked) while the veto is pending.
    pub async fn complete_connection_drag_confirmed(
        &mut self,
        node: &str,
        port: &str,
    ) -> Result<Connection, ConnectRejection> {
        let (source, target) = match self.resolve_connection(node, port, Validation::Full) {
            Ok(pair) => pair,
            Err(reason) => {
                self.abort_connection_drag();
                return Err(reason);
            }
        };
        if let Some(veto) = self.connect_veto.clone() {
            if !veto.confirm(&source, &target).await {
                self.abort_connection_drag();
                return Err(ConnectRejection::Vetoed(format!("{} -> {} declined", source, target)));
            }
        }
        self.complete_connection_drag(node, port)
    }
}
