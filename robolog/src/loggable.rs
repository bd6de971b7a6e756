//! The trait shared by entries, groups and every other node of a telemetry tree.

use std::cell::RefCell;
use std::rc::Rc;

use crate::frame::Frame;

/// Shared handle to an object that exposes telemetry.
pub type Shared<T> = Rc<RefCell<T>>;

/// Wrap a value in a [`Shared`] handle.
pub fn shared<T>(value: T) -> Shared<T> {
    Rc::new(RefCell::new(value))
}

/// A node in a telemetry tree.
///
/// Nodes are attached to their parent before they are run; `attach`
/// recomputes the node's path and the paths of everything below it.
pub trait Loggable {
    /// Name of this node, used as its path segment.
    fn name(&self) -> &str;

    /// Full `/`-joined path of this node.
    fn path(&self) -> &str;

    /// Recompute this node's path under `parent`.
    fn attach(&mut self, parent: Option<&str>);

    /// Registration hook, called once before the first `run`.
    fn init(&mut self, _frame: &mut Frame<'_>) {}

    /// Read and publish this frame's values.
    fn run(&mut self, frame: &mut Frame<'_>);

    /// Tear down every sink. Later `run` calls do nothing.
    fn unpublish(&mut self, frame: &mut Frame<'_>);

    /// Append the paths of every value this node publishes.
    fn collect_paths(&self, out: &mut Vec<String>) {
        out.push(self.path().to_string());
    }

    /// Number of value entries in this node.
    fn entry_count(&self) -> usize {
        1
    }
}

impl std::fmt::Debug for dyn Loggable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loggable")
            .field("path", &self.path())
            .finish()
    }
}
