use std::collections::HashMap;
use std::rc::Rc;

use eframe::egui::{Vec2, vec2};
use rand::Rng;

pub const POOL_CAPACITY: usize = 2000;

const LIFE_DRAIN: f32 = 0.01;
const MAX_CURVE_OFFSET: f32 = 80.0;

/// Quadratic Bézier between two layout positions, bowed sideways by a random
/// perpendicular offset at the midpoint. Computed once per ordered endpoint
/// pair and cached for the lifetime of the topology.
pub struct FlowPath {
    start: Vec2,
    control: Vec2,
    end: Vec2,
}

impl FlowPath {
    fn between(start: Vec2, end: Vec2, rng: &mut impl Rng) -> Self {
        let mid = (start + end) * 0.5;
        let delta = end - start;
        let length = delta.length().max(1.0);
        let normal = vec2(-delta.y, delta.x) / length;
        let curve = rng.gen_range(-0.5..0.5) * MAX_CURVE_OFFSET.min(length * 0.4);

        Self {
            start,
            control: mid + normal * curve,
            end,
        }
    }

    pub fn point_at(&self, t: f32) -> Vec2 {
        let u = 1.0 - t;
        self.start * (u * u) + self.control * (2.0 * u * t) + self.end * (t * t)
    }
}

pub struct Particle {
    pub active: bool,
    pub position: Vec2,
    pub source: u32,
    pub target: u32,
    pub path: Option<Rc<FlowPath>>,
    pub progress: f32,
    pub life: f32,
    pub speed: f32,
    pub size: f32,
}

impl Particle {
    fn idle() -> Self {
        Self {
            active: false,
            position: Vec2::ZERO,
            source: 0,
            target: 0,
            path: None,
            progress: 0.0,
            life: 0.0,
            speed: 0.02,
            size: 1.0,
        }
    }

    fn activate(
        &mut self,
        source: u32,
        target: u32,
        source_pos: Vec2,
        path: Rc<FlowPath>,
        rng: &mut impl Rng,
    ) {
        self.active = true;
        self.source = source;
        self.target = target;
        self.position = source_pos;
        self.path = Some(path);
        self.progress = 0.0;
        self.life = 1.0;
        self.speed = rng.gen_range(0.015..0.03);
        self.size = rng.gen_range(0.8..1.4);
    }

    fn deactivate(&mut self) {
        self.active = false;
        self.path = None;
        self.progress = 0.0;
        self.life = 0.0;
    }

    /// Returns true exactly once, on the step where progress first reaches 1.
    fn advance(&mut self, speed_multiplier: f32) -> bool {
        self.progress += self.speed * speed_multiplier;
        if self.progress >= 1.0 {
            return true;
        }

        if let Some(path) = &self.path {
            self.position = path.point_at(self.progress);
        }

        self.life -= LIFE_DRAIN * speed_multiplier;
        if self.life <= 0.0 {
            self.deactivate();
        }
        false
    }
}

/// An arrival reported from `ParticlePool::update`, carrying the node the
/// particle reached so the caller can trigger a destination pulse.
pub struct Arrival {
    pub target: u32,
}

/// Fixed-capacity pool; slots are recycled, never reallocated. Spawns beyond
/// capacity are dropped.
pub struct ParticlePool {
    particles: Vec<Particle>,
    active_count: usize,
}

impl ParticlePool {
    pub fn new(capacity: usize) -> Self {
        Self {
            particles: (0..capacity).map(|_| Particle::idle()).collect(),
            active_count: 0,
        }
    }

    pub fn spawn(
        &mut self,
        source: u32,
        target: u32,
        source_pos: Vec2,
        path: Rc<FlowPath>,
    ) -> Option<usize> {
        let slot = self.particles.iter().position(|particle| !particle.active)?;
        let mut rng = rand::thread_rng();
        self.particles[slot].activate(source, target, source_pos, path, &mut rng);
        self.active_count += 1;
        Some(slot)
    }

    /// Advances every active particle and collects arrivals. Particles whose
    /// life runs out are retired without an arrival report.
    pub fn update(&mut self, speed_multiplier: f32) -> Vec<Arrival> {
        let mut arrivals = Vec::new();

        for particle in &mut self.particles {
            if !particle.active {
                continue;
            }

            let arrived = particle.advance(speed_multiplier);
            if arrived {
                arrivals.push(Arrival {
                    target: particle.target,
                });
                particle.deactivate();
            }
            if !particle.active {
                self.active_count -= 1;
            }
        }

        arrivals
    }

    pub fn active(&self) -> impl Iterator<Item = &Particle> {
        self.particles.iter().filter(|particle| particle.active)
    }

    pub fn active_count(&self) -> usize {
        self.active_count
    }

    pub fn capacity(&self) -> usize {
        self.particles.len()
    }
}

/// Memoized motion paths keyed by ordered `(source, target)` node indices;
/// `(a, b)` and `(b, a)` are independent entries. Cleared on topology reload.
#[derive(Default)]
pub struct PathCache {
    cache: HashMap<(u32, u32), Rc<FlowPath>>,
}

impl PathCache {
    pub fn get_path(
        &mut self,
        source: u32,
        target: u32,
        source_pos: Vec2,
        target_pos: Vec2,
    ) -> Rc<FlowPath> {
        Rc::clone(self.cache.entry((source, target)).or_insert_with(|| {
            let mut rng = rand::thread_rng();
            Rc::new(FlowPath::between(source_pos, target_pos, &mut rng))
        }))
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_path() -> Rc<FlowPath> {
        let mut rng = rand::thread_rng();
        Rc::new(FlowPath::between(vec2(0.0, 0.0), vec2(100.0, 0.0), &mut rng))
    }

    #[test]
    fn path_endpoints_are_exact() {
        let path = test_path();
        assert_eq!(path.point_at(0.0), vec2(0.0, 0.0));
        assert_eq!(path.point_at(1.0), vec2(100.0, 0.0));
    }

    #[test]
    fn path_curve_offset_is_bounded() {
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let path = FlowPath::between(vec2(0.0, 0.0), vec2(100.0, 0.0), &mut rng);
            // Perpendicular offset at the midpoint is half the control offset,
            // bounded by 0.5 * min(80, 0.4 * 100) = 20.
            let midpoint = path.point_at(0.5);
            assert!(midpoint.y.abs() <= 20.0 + 1e-4);
        }
    }

    #[test]
    fn pool_never_exceeds_capacity() {
        let mut pool = ParticlePool::new(8);
        for _ in 0..8 {
            assert!(pool.spawn(0, 1, Vec2::ZERO, test_path()).is_some());
        }
        assert_eq!(pool.active_count(), 8);

        // Full pool: the spawn is dropped and the count is unchanged.
        assert!(pool.spawn(0, 1, Vec2::ZERO, test_path()).is_none());
        assert_eq!(pool.active_count(), 8);
    }

    #[test]
    fn particle_reports_exactly_one_arrival() {
        let mut pool = ParticlePool::new(4);
        pool.spawn(3, 7, Vec2::ZERO, test_path());

        let mut total_arrivals = 0;
        let mut previous_progress = 0.0;
        for _ in 0..200 {
            let progress = pool.particles[0].progress;
            assert!(progress >= previous_progress);
            previous_progress = progress;

            for arrival in pool.update(1.0) {
                assert_eq!(arrival.target, 7);
                total_arrivals += 1;
            }
        }

        assert_eq!(total_arrivals, 1);
        assert_eq!(pool.active_count(), 0);
    }

    #[test]
    fn expired_particles_retire_without_arrival() {
        let mut pool = ParticlePool::new(1);
        pool.spawn(0, 1, Vec2::ZERO, test_path());
        // Force a speed too slow to ever arrive before life runs out.
        pool.particles[0].speed = 0.001;

        let mut arrivals = 0;
        for _ in 0..200 {
            arrivals += pool.update(1.0).len();
        }

        assert_eq!(arrivals, 0);
        assert_eq!(pool.active_count(), 0);
    }

    #[test]
    fn freed_slots_are_reused() {
        let mut pool = ParticlePool::new(1);
        pool.spawn(0, 1, Vec2::ZERO, test_path());
        for _ in 0..200 {
            pool.update(1.0);
        }
        assert_eq!(pool.active_count(), 0);
        assert!(pool.spawn(2, 3, Vec2::ZERO, test_path()).is_some());
        assert_eq!(pool.active_count(), 1);
    }

    #[test]
    fn path_cache_is_ordered_pair_keyed() {
        let mut cache = PathCache::default();
        let a = vec2(0.0, 0.0);
        let b = vec2(50.0, 50.0);

        let forward = cache.get_path(1, 2, a, b);
        let forward_again = cache.get_path(1, 2, a, b);
        let reverse = cache.get_path(2, 1, b, a);

        assert!(Rc::ptr_eq(&forward, &forward_again));
        assert!(!Rc::ptr_eq(&forward, &reverse));
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert_eq!(cache.len(), 0);
    }
}
