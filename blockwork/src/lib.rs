pub mod block;
pub mod codec;
pub mod editor;
pub mod graph;
pub mod program;

pub use block::{Block, BlockId, Form, Input};
pub use codec::LoadError;
pub use editor::{EditError, Editor, Fragment, Placement, Target, insert, move_block, remove};
pub use graph::{Graph, GraphNode, GraphViolation, Link, PortRef};
pub use program::validate::SlotRef;
pub use program::{KindCatalog, Program, Violation};
