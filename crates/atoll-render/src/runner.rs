//! Task execution and frame recomposition.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use tracing::debug;

use crate::scene::Scene;
use crate::task::{split, Task};

/// Pixels produced for one task: flat RGB, row-major within the task's
/// rectangle, length `3 * width * height` of the task.
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub task: Task,
    pub data: Vec<u8>,
}

/// Run one task against a scene.
pub fn run_task(scene: &dyn Scene, task: Task) -> TaskResult {
    let mut data = Vec::with_capacity(task.pixel_count() * 3);
    for y in task.begin_y..task.end_y {
        for x in task.begin_x..task.end_x {
            data.extend_from_slice(&scene.shade(x, y, task.frame));
        }
    }
    TaskResult { task, data }
}

/// A full RGBA frame buffer. Alpha is fixed at 255.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// RGBA, row-major, `4 * width * height` bytes.
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; 4 * width as usize * height as usize],
        }
    }

    /// Copy a task's pixels into the frame at the task's offset. Tasks
    /// cover disjoint rectangles, so blit order is irrelevant.
    pub fn blit(&mut self, result: &TaskResult) {
        let task = &result.task;
        debug_assert_eq!(result.data.len(), task.pixel_count() * 3);

        let mut src = 0;
        for y in task.begin_y..task.end_y {
            for x in task.begin_x..task.end_x {
                let dst = (y as usize * self.width as usize + x as usize) * 4;
                self.data[dst] = result.data[src];
                self.data[dst + 1] = result.data[src + 1];
                self.data[dst + 2] = result.data[src + 2];
                self.data[dst + 3] = 255;
                src += 3;
            }
        }
    }
}

/// Render a scene sequentially through a `grid * grid` split.
pub fn render(scene: &dyn Scene, grid: u32) -> Frame {
    let started = Instant::now();
    let tasks = split(scene.width(), scene.height(), grid);

    let mut frame = Frame::new(scene.width(), scene.height());
    for task in tasks {
        frame.blit(&run_task(scene, task));
    }

    debug!(
        grid,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "sequential render finished"
    );
    frame
}

/// Render a scene with `workers` scoped threads pulling tasks from a
/// shared cursor.
///
/// Tasks are independent and write disjoint frame regions, so the only
/// coordination is task dispatch and result collection.
pub fn render_parallel(scene: &dyn Scene, grid: u32, workers: usize) -> Frame {
    let started = Instant::now();
    let tasks = split(scene.width(), scene.height(), grid);
    let workers = workers.max(1).min(tasks.len().max(1));

    let cursor = AtomicUsize::new(0);
    let results: Mutex<Vec<TaskResult>> = Mutex::new(Vec::with_capacity(tasks.len()));

    std::thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| loop {
                let i = cursor.fetch_add(1, Ordering::Relaxed);
                let Some(task) = tasks.get(i) else { break };
                let result = run_task(scene, *task);
                results.lock().expect("results lock poisoned").push(result);
            });
        }
    });

    let mut frame = Frame::new(scene.width(), scene.height());
    for result in results.into_inner().expect("results lock poisoned") {
        frame.blit(&result);
    }

    debug!(
        grid,
        workers,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "parallel render finished"
    );
    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{RayScene, TestPattern};

    #[test]
    fn task_result_is_row_major_rgb() {
        let scene = TestPattern {
            width: 10,
            height: 10,
        };
        let task = Task {
            begin_x: 2,
            end_x: 4,
            begin_y: 5,
            end_y: 6,
            frame: 0,
        };
        let result = run_task(&scene, task);
        assert_eq!(result.data, vec![2, 5, 0, 3, 5, 0]);

        let animated = run_task(&scene, task.with_frame(9));
        assert_eq!(animated.data, vec![2, 5, 9, 3, 5, 9]);
    }

    #[test]
    fn recomposition_matches_whole_frame_run() {
        let scene = TestPattern {
            width: 101,
            height: 53,
        };

        // One task covering the whole image.
        let whole = render(&scene, 1);

        // Many uneven tasks, blitted out of order.
        let tasks = split(scene.width, scene.height, 7);
        let mut results: Vec<TaskResult> =
            tasks.into_iter().map(|t| run_task(&scene, t)).collect();
        results.reverse();

        let mut recomposed = Frame::new(scene.width, scene.height);
        for result in &results {
            recomposed.blit(result);
        }

        assert_eq!(recomposed, whole);
    }

    #[test]
    fn alpha_is_opaque_everywhere() {
        let scene = TestPattern {
            width: 16,
            height: 16,
        };
        let frame = render(&scene, 4);
        for pixel in frame.data.chunks_exact(4) {
            assert_eq!(pixel[3], 255);
        }
    }

    #[test]
    fn parallel_render_matches_sequential() {
        let scene = RayScene::new(96, 64);
        let sequential = render(&scene, 5);
        let parallel = render_parallel(&scene, 5, 4);
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn parallel_render_with_more_workers_than_tasks() {
        let scene = TestPattern {
            width: 8,
            height: 8,
        };
        let frame = render_parallel(&scene, 2, 32);
        assert_eq!(frame, render(&scene, 2));
    }

    #[test]
    fn empty_domain_renders_empty_frame() {
        let scene = TestPattern {
            width: 0,
            height: 8,
        };
        let frame = render(&scene, 4);
        assert!(frame.data.is_empty());
    }
}
