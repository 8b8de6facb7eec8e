//! Rectangular sub-tasks and the grid split.

/// An independent unit of rendering work: a half-open pixel rectangle
/// `[begin_x, end_x) x [begin_y, end_y)` plus a frame index.
///
/// Immutable once created. A task owns nothing shared; its runner returns
/// a pixel buffer scoped to exactly this rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Task {
    pub begin_x: u32,
    pub end_x: u32,
    pub begin_y: u32,
    pub end_y: u32,
    pub frame: u32,
}

impl Task {
    pub fn width(&self) -> u32 {
        self.end_x - self.begin_x
    }

    pub fn height(&self) -> u32 {
        self.end_y - self.begin_y
    }

    pub fn pixel_count(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    /// The same rectangle for a different animation frame.
    pub fn with_frame(self, frame: u32) -> Self {
        Self { frame, ..self }
    }
}

/// Partition `[0,width) x [0,height)` into `grid * grid` rectangles.
///
/// Each axis is divided into `grid` contiguous spans of `len / grid`
/// pixels; the last span absorbs the integer-division remainder, so the
/// union of all rectangles covers the domain exactly, with no overlap and
/// no dropped boundary pixels. A `grid` of zero (or an empty domain)
/// yields no tasks.
pub fn split(width: u32, height: u32, grid: u32) -> Vec<Task> {
    if grid == 0 || width == 0 || height == 0 {
        return Vec::new();
    }

    let step_x = width / grid;
    let step_y = height / grid;

    let mut tasks = Vec::with_capacity(grid as usize * grid as usize);
    for gy in 0..grid {
        let begin_y = gy * step_y;
        let end_y = if gy == grid - 1 { height } else { (gy + 1) * step_y };
        for gx in 0..grid {
            let begin_x = gx * step_x;
            let end_x = if gx == grid - 1 { width } else { (gx + 1) * step_x };
            tasks.push(Task {
                begin_x,
                end_x,
                begin_y,
                end_y,
                frame: 0,
            });
        }
    }
    tasks
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    /// Every pixel of the domain appears in exactly one task.
    fn assert_exact_cover(width: u32, height: u32, grid: u32) {
        let tasks = split(width, height, grid);
        let mut seen = HashSet::new();
        for task in &tasks {
            for y in task.begin_y..task.end_y {
                for x in task.begin_x..task.end_x {
                    assert!(
                        seen.insert((x, y)),
                        "pixel ({x},{y}) covered twice ({width}x{height}, grid {grid})"
                    );
                }
            }
        }
        assert_eq!(
            seen.len(),
            width as usize * height as usize,
            "coverage gap ({width}x{height}, grid {grid})"
        );
    }

    #[test]
    fn even_split_produces_expected_rectangles() {
        let tasks = split(100, 100, 2);
        assert_eq!(tasks.len(), 4);

        let rects: Vec<(u32, u32, u32, u32)> = tasks
            .iter()
            .map(|t| (t.begin_x, t.end_x, t.begin_y, t.end_y))
            .collect();
        assert_eq!(
            rects,
            vec![
                (0, 50, 0, 50),
                (50, 100, 0, 50),
                (0, 50, 50, 100),
                (50, 100, 50, 100),
            ]
        );
    }

    #[test]
    fn remainder_goes_to_the_last_span() {
        let tasks = split(101, 7, 3);
        assert_eq!(tasks.len(), 9);

        // x spans: 0..33, 33..66, 66..101; y spans: 0..2, 2..4, 4..7
        let last = tasks.last().unwrap();
        assert_eq!((last.begin_x, last.end_x), (66, 101));
        assert_eq!((last.begin_y, last.end_y), (4, 7));
    }

    #[test]
    fn uneven_domains_are_covered_exactly() {
        assert_exact_cover(100, 100, 2);
        assert_exact_cover(101, 7, 3);
        assert_exact_cover(13, 29, 5);
        assert_exact_cover(64, 64, 64);
    }

    #[test]
    fn grid_larger_than_domain_still_covers() {
        // step is 0; every non-final span is empty and the last absorbs
        // the whole axis.
        assert_exact_cover(3, 3, 8);
    }

    #[test]
    fn degenerate_inputs_yield_no_tasks() {
        assert!(split(0, 10, 2).is_empty());
        assert!(split(10, 0, 2).is_empty());
        assert!(split(10, 10, 0).is_empty());
    }

    #[test]
    fn task_dimensions() {
        let task = Task {
            begin_x: 10,
            end_x: 30,
            begin_y: 5,
            end_y: 15,
            frame: 0,
        };
        assert_eq!(task.width(), 20);
        assert_eq!(task.height(), 10);
        assert_eq!(task.pixel_count(), 200);
    }
}
