//! Atoll render tasks
//!
//! Partitions a rectangular pixel domain into a grid of independent
//! rectangular sub-tasks, executes each against a [`Scene`], and
//! recomposes the results into one RGBA frame. Tasks share no mutable
//! state and carry no ordering requirement, so they can run sequentially,
//! on worker threads, or - in a future distributed variant - on remote
//! peers.

mod runner;
mod scene;
mod task;

pub use runner::{render, render_parallel, Frame, TaskResult};
pub use scene::{RayScene, Scene, TestPattern};
pub use task::{split, Task};
