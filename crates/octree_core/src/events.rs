//! Structural and query events delivered to registered observers.
//!
//! Handlers run synchronously inside the triggering operation. A handler that
//! panics is logged and skipped; the operation itself always completes.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use web_time::{SystemTime, UNIX_EPOCH};

use crate::octree::{Bounds3D, NodeId};
use crate::types::Point3D;

/// Kind of event.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum OctreeEventKind {
  /// A point was stored.
  PointInserted,
  /// A point was removed.
  PointRemoved,
  /// A leaf split into 8 children.
  NodeSubdivided,
  /// 8 empty children collapsed back into their parent.
  NodeMerged,
  /// A query finished.
  QueryExecuted,
}

/// Which query produced a [`OctreeEventKind::QueryExecuted`] event.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum QueryKind {
  /// Axis-aligned box query.
  Bounds,
  /// Radius query.
  Sphere,
  /// Ray pick.
  Ray,
  /// Frustum culling.
  Frustum,
}

/// Event payload.
#[derive(Clone, Debug, PartialEq)]
pub enum EventData<T> {
  /// The point that was inserted or removed.
  Point(Point3D<T>),
  /// The node that subdivided or merged.
  Node {
    /// Arena id of the node.
    id: NodeId,
    /// Depth of the node.
    depth: u32,
    /// Region covered by the node.
    bounds: Bounds3D,
  },
  /// Summary of a finished query.
  Query {
    /// Query type.
    query: QueryKind,
    /// Number of points returned.
    results: usize,
    /// Nodes whose bounds were tested.
    nodes_visited: usize,
  },
}

/// An event as seen by handlers.
#[derive(Clone, Debug, PartialEq)]
pub struct OctreeEvent<T> {
  /// What happened.
  pub kind: OctreeEventKind,
  /// Wall-clock time since the UNIX epoch.
  pub timestamp: Duration,
  /// Details.
  pub data: EventData<T>,
}

/// Registration handle returned by [`EventBus::add`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct HandlerId(u64);

type Handler<T> = Box<dyn Fn(&OctreeEvent<T>)>;

/// Ordered list of handlers.
pub struct EventBus<T> {
  handlers: Vec<(HandlerId, Handler<T>)>,
  next_id: u64,
}

impl<T> EventBus<T> {
  /// Create an empty bus.
  pub fn new() -> Self {
    Self {
      handlers: Vec::new(),
      next_id: 1,
    }
  }

  /// Register a handler. Handlers run in registration order.
  pub fn add(&mut self, handler: impl Fn(&OctreeEvent<T>) + 'static) -> HandlerId {
    let id = HandlerId(self.next_id);
    self.next_id += 1;
    self.handlers.push((id, Box::new(handler)));
    id
  }

  /// Unregister a handler. Returns false if it was not registered.
  pub fn remove(&mut self, id: HandlerId) -> bool {
    let before = self.handlers.len();
    self.handlers.retain(|(h, _)| *h != id);
    self.handlers.len() != before
  }

  /// Number of registered handlers.
  pub fn len(&self) -> usize {
    self.handlers.len()
  }

  /// Check if no handler is registered.
  pub fn is_empty(&self) -> bool {
    self.handlers.is_empty()
  }

  /// Deliver an event to every handler.
  ///
  /// `data` is only evaluated when at least one handler is registered, so
  /// payload clones are skipped for silent trees.
  pub fn emit(&self, kind: OctreeEventKind, data: impl FnOnce() -> EventData<T>) {
    if self.handlers.is_empty() {
      return;
    }
    let event = OctreeEvent {
      kind,
      timestamp: SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default(),
      data: data(),
    };
    for (id, handler) in &self.handlers {
      if catch_unwind(AssertUnwindSafe(|| handler(&event))).is_err() {
        tracing::warn!(handler = id.0, ?kind, "event handler panicked; ignoring");
      }
    }
  }
}

impl<T> Default for EventBus<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T> fmt::Debug for EventBus<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("EventBus")
      .field("handlers", &self.handlers.len())
      .finish()
  }
}
