//! Scenes: per-pixel color sources for task runners.

/// A renderable scene.
///
/// `shade` must be a pure function of `(x, y, frame)` so tasks covering
/// disjoint rectangles can run in any order, concurrently, and still
/// compose into the same image as a single whole-frame task.
pub trait Scene: Send + Sync {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// RGB color of the pixel at `(x, y)` for the given frame index.
    fn shade(&self, x: u32, y: u32, frame: u32) -> [u8; 3];
}

/// Debug scene that encodes each pixel's own coordinates into its color.
///
/// Recomposing split-task output of this scene and comparing against a
/// whole-frame run catches any offset, ordering, or boundary mistake.
#[derive(Debug, Clone, Copy)]
pub struct TestPattern {
    pub width: u32,
    pub height: u32,
}

impl Scene for TestPattern {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn shade(&self, x: u32, y: u32, frame: u32) -> [u8; 3] {
        [(x % 256) as u8, (y % 256) as u8, (frame % 256) as u8]
    }
}

/// A small procedural ray-traced scene: one diffuse sphere over a
/// checkerboard floor under a directional light, sky gradient behind.
///
/// The frame index nudges the sphere along x so animations exercise the
/// per-task `frame` field.
#[derive(Debug, Clone, Copy)]
pub struct RayScene {
    width: u32,
    height: u32,
}

impl RayScene {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    fn trace(&self, dir: [f64; 3], frame: u32) -> [f64; 3] {
        let origin = [0.0, 0.0, 0.0];
        let center = [(frame as f64 * 0.05).sin() * 0.8, 0.0, -3.0];
        let radius = 1.0;
        let light = normalize([-0.5, 1.0, 0.5]);

        // Sphere intersection.
        if let Some(t) = hit_sphere(origin, dir, center, radius) {
            let hit = add(origin, scale(dir, t));
            let normal = normalize(sub(hit, center));
            let diffuse = dot(normal, light).max(0.0);
            let base = [0.9, 0.25, 0.2];
            return scale(base, 0.1 + 0.9 * diffuse);
        }

        // Floor plane at y = -1, z < 0.
        if dir[1] < 0.0 {
            let t = (-1.0 - origin[1]) / dir[1];
            let hit = add(origin, scale(dir, t));
            if hit[2] < 0.0 && hit[2] > -20.0 {
                let check =
                    ((hit[0].floor() as i64 + hit[2].floor() as i64).rem_euclid(2)) == 0;
                let base = if check { 0.85 } else { 0.25 };
                // Fade with distance.
                let fade = (1.0 - (-hit[2] / 20.0)).clamp(0.0, 1.0);
                return [base * fade; 3];
            }
        }

        // Sky gradient.
        let t = 0.5 * (dir[1] + 1.0);
        [
            (1.0 - t) + t * 0.5,
            (1.0 - t) + t * 0.7,
            (1.0 - t) + t * 1.0,
        ]
    }
}

impl Scene for RayScene {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn shade(&self, x: u32, y: u32, frame: u32) -> [u8; 3] {
        let aspect = self.width as f64 / self.height as f64;
        // Pixel center to normalized device coordinates, y up.
        let ndc_x = ((x as f64 + 0.5) / self.width as f64 * 2.0 - 1.0) * aspect;
        let ndc_y = 1.0 - (y as f64 + 0.5) / self.height as f64 * 2.0;
        let dir = normalize([ndc_x, ndc_y, -1.5]);

        let color = self.trace(dir, frame);
        [
            (color[0].clamp(0.0, 1.0) * 255.0) as u8,
            (color[1].clamp(0.0, 1.0) * 255.0) as u8,
            (color[2].clamp(0.0, 1.0) * 255.0) as u8,
        ]
    }
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn add(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn scale(a: [f64; 3], s: f64) -> [f64; 3] {
    [a[0] * s, a[1] * s, a[2] * s]
}

fn normalize(a: [f64; 3]) -> [f64; 3] {
    let len = dot(a, a).sqrt();
    scale(a, 1.0 / len)
}

/// Nearest positive intersection distance of a ray with a sphere.
fn hit_sphere(origin: [f64; 3], dir: [f64; 3], center: [f64; 3], radius: f64) -> Option<f64> {
    let oc = sub(origin, center);
    let b = dot(oc, dir);
    let c = dot(oc, oc) - radius * radius;
    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }
    let t = -b - disc.sqrt();
    if t > 1e-6 {
        Some(t)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_encodes_coordinates() {
        let scene = TestPattern {
            width: 300,
            height: 300,
        };
        assert_eq!(scene.shade(7, 11, 2), [7, 11, 2]);
        assert_eq!(scene.shade(257, 0, 0), [1, 0, 0]);
    }

    #[test]
    fn ray_scene_is_deterministic() {
        let scene = RayScene::new(64, 48);
        assert_eq!(scene.shade(10, 10, 0), scene.shade(10, 10, 0));
    }

    #[test]
    fn ray_scene_distinguishes_sphere_and_sky() {
        let scene = RayScene::new(200, 200);
        let center = scene.shade(100, 100, 0);
        let corner = scene.shade(0, 0, 0);
        assert_ne!(center, corner);
        // The sphere is red-dominant, the sky blue-dominant.
        assert!(center[0] > center[2]);
        assert!(corner[2] >= corner[0]);
    }

    #[test]
    fn frame_index_moves_the_sphere() {
        let scene = RayScene::new(200, 200);
        // A pixel near the sphere's left edge changes as it slides.
        let a = scene.shade(55, 100, 0);
        let b = scene.shade(55, 100, 30);
        assert_ne!(a, b);
    }
}
