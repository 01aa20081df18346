use eframe::egui::{Vec2, vec2};

const QUADTREE_LEAF_CAPACITY: usize = 12;
const QUADTREE_MAX_DEPTH: usize = 10;

#[derive(Clone, Copy)]
pub(super) struct QuadBounds {
    pub(super) center: Vec2,
    pub(super) half_extent: f32,
}

impl QuadBounds {
    fn from_points(points: &[Vec2]) -> Option<Self> {
        let mut min = vec2(f32::INFINITY, f32::INFINITY);
        let mut max = vec2(f32::NEG_INFINITY, f32::NEG_INFINITY);

        for point in points {
            min.x = min.x.min(point.x);
            min.y = min.y.min(point.y);
            max.x = max.x.max(point.x);
            max.y = max.y.max(point.y);
        }

        if !min.x.is_finite() || !min.y.is_finite() || !max.x.is_finite() || !max.y.is_finite() {
            return None;
        }

        let center = (min + max) * 0.5;
        let span_x = (max.x - min.x).max(1.0);
        let span_y = (max.y - min.y).max(1.0);
        let half_extent = (span_x.max(span_y) * 0.5) + 1.0;

        Some(Self {
            center,
            half_extent,
        })
    }

    pub(super) fn contains(self, point: Vec2) -> bool {
        let min = self.center - vec2(self.half_extent, self.half_extent);
        let max = self.center + vec2(self.half_extent, self.half_extent);
        point.x >= min.x && point.x <= max.x && point.y >= min.y && point.y <= max.y
    }

    fn child(self, quadrant: usize) -> Self {
        let quarter = self.half_extent * 0.5;
        let offset = match quadrant {
            0 => vec2(-quarter, -quarter),
            1 => vec2(quarter, -quarter),
            2 => vec2(-quarter, quarter),
            _ => vec2(quarter, quarter),
        };

        Self {
            center: self.center + offset,
            half_extent: quarter,
        }
    }

    fn quadrant_for(self, point: Vec2) -> usize {
        let right = point.x >= self.center.x;
        let upper = point.y >= self.center.y;
        match (right, upper) {
            (false, false) => 0,
            (true, false) => 1,
            (false, true) => 2,
            (true, true) => 3,
        }
    }

    pub(super) fn side_length(self) -> f32 {
        self.half_extent * 2.0
    }

    pub(super) fn distance_sq_to(self, other: Self) -> f32 {
        let dx = (self.center.x - other.center.x).abs() - (self.half_extent + other.half_extent);
        let dy = (self.center.y - other.center.y).abs() - (self.half_extent + other.half_extent);
        let clamped_dx = dx.max(0.0);
        let clamped_dy = dy.max(0.0);
        (clamped_dx * clamped_dx) + (clamped_dy * clamped_dy)
    }
}

pub(super) struct QuadNode {
    pub(super) bounds: QuadBounds,
    pub(super) center_of_mass: Vec2,
    pub(super) mass: f32,
    pub(super) indices: Vec<usize>,
    pub(super) children: [Option<Box<QuadNode>>; 4],
}

impl QuadNode {
    pub(super) fn build(positions: &[Vec2]) -> Option<Self> {
        let bounds = QuadBounds::from_points(positions)?;
        let indices = (0..positions.len()).collect::<Vec<_>>();
        Some(Self::build_node(bounds, indices, positions, 0))
    }

    fn build_node(
        bounds: QuadBounds,
        indices: Vec<usize>,
        positions: &[Vec2],
        depth: usize,
    ) -> Self {
        let mut center_of_mass = Vec2::ZERO;
        for &index in &indices {
            center_of_mass += positions[index];
        }

        let mass = indices.len() as f32;
        if mass > 0.0 {
            center_of_mass /= mass;
        }

        let mut node = Self {
            bounds,
            center_of_mass,
            mass,
            indices,
            children: std::array::from_fn(|_| None),
        };

        if depth >= QUADTREE_MAX_DEPTH || node.indices.len() <= QUADTREE_LEAF_CAPACITY {
            return node;
        }

        let mut buckets = std::array::from_fn::<_, 4, _>(|_| Vec::new());
        for &index in &node.indices {
            let quadrant = bounds.quadrant_for(positions[index]);
            buckets[quadrant].push(index);
        }

        let non_empty = buckets.iter().filter(|bucket| !bucket.is_empty()).count();
        if non_empty <= 1 {
            return node;
        }

        for (quadrant, bucket) in buckets.into_iter().enumerate() {
            if bucket.is_empty() {
                continue;
            }

            let child_bounds = bounds.child(quadrant);
            node.children[quadrant] = Some(Box::new(Self::build_node(
                child_bounds,
                bucket,
                positions,
                depth + 1,
            )));
        }
        node.indices.clear();
        node
    }

    pub(super) fn is_leaf(&self) -> bool {
        self.children.iter().all(|child| child.is_none())
    }
}

/// Inverse-square repulsion between one node and every other, approximated
/// through the tree. Interactions beyond `distance_max` are skipped entirely,
/// so distant clusters never push on each other.
#[allow(clippy::too_many_arguments)]
pub(super) fn accumulate_repulsion(
    node: &QuadNode,
    index: usize,
    positions: &[Vec2],
    strength_alpha: f32,
    distance_max_sq: f32,
    theta: f32,
    velocity: &mut Vec2,
) {
    if node.mass <= 0.0 {
        return;
    }

    let point = positions[index];

    if node.is_leaf() {
        for &other_index in &node.indices {
            if other_index == index {
                continue;
            }
            let delta = positions[other_index] - point;
            let distance_sq = delta.length_sq().max(1.0);
            if distance_sq >= distance_max_sq {
                continue;
            }
            *velocity += delta * (strength_alpha / distance_sq);
        }
        return;
    }

    let delta = node.center_of_mass - point;
    let distance_sq = delta.length_sq().max(1.0);
    let can_approximate = !node.bounds.contains(point)
        && ((node.bounds.side_length() / distance_sq.sqrt()) < theta);

    if can_approximate {
        if distance_sq < distance_max_sq {
            *velocity += delta * (strength_alpha * node.mass / distance_sq);
        }
        return;
    }

    for child in node.children.iter().flatten() {
        accumulate_repulsion(
            child,
            index,
            positions,
            strength_alpha,
            distance_max_sq,
            theta,
            velocity,
        );
    }
}

#[derive(Clone, Copy)]
pub(super) struct CollisionParams {
    pub(super) radius: f32,
    pub(super) strength: f32,
}

/// Dual-tree traversal pushing apart node pairs closer than twice the
/// collision radius. Velocity-space, split evenly between both nodes.
pub(super) fn accumulate_collisions(
    node_a: &QuadNode,
    node_b: &QuadNode,
    same_node: bool,
    positions: &[Vec2],
    params: CollisionParams,
    velocities: &mut [Vec2],
) {
    let min_distance = params.radius * 2.0;
    if node_a.bounds.distance_sq_to(node_b.bounds) > min_distance * min_distance {
        return;
    }

    if node_a.is_leaf() && node_b.is_leaf() {
        if same_node {
            for i in 0..node_a.indices.len() {
                for j in (i + 1)..node_a.indices.len() {
                    collide_pair(
                        node_a.indices[i],
                        node_a.indices[j],
                        positions,
                        params,
                        velocities,
                    );
                }
            }
        } else {
            for &from in &node_a.indices {
                for &to in &node_b.indices {
                    collide_pair(from, to, positions, params, velocities);
                }
            }
        }
        return;
    }

    if same_node {
        for first in 0..4 {
            let Some(child_a) = node_a.children[first].as_ref() else {
                continue;
            };

            accumulate_collisions(child_a, child_a, true, positions, params, velocities);

            for second in (first + 1)..4 {
                let Some(child_b) = node_a.children[second].as_ref() else {
                    continue;
                };
                accumulate_collisions(child_a, child_b, false, positions, params, velocities);
            }
        }
        return;
    }

    let split_a = if node_a.is_leaf() {
        false
    } else if node_b.is_leaf() {
        true
    } else {
        node_a.bounds.half_extent >= node_b.bounds.half_extent
    };

    if split_a {
        for child in node_a.children.iter().flatten() {
            accumulate_collisions(child, node_b, false, positions, params, velocities);
        }
    } else {
        for child in node_b.children.iter().flatten() {
            accumulate_collisions(node_a, child, false, positions, params, velocities);
        }
    }
}

fn collide_pair(
    from: usize,
    to: usize,
    positions: &[Vec2],
    params: CollisionParams,
    velocities: &mut [Vec2],
) {
    let delta = positions[from] - positions[to];
    let distance_sq = delta.length_sq();
    let min_distance = params.radius * 2.0;
    if distance_sq >= min_distance * min_distance {
        return;
    }

    let distance = distance_sq.sqrt();
    let direction = if distance > 0.0001 {
        delta / distance
    } else {
        let angle = ((from as f32) * 0.618_034 + (to as f32) * 0.414_214) * std::f32::consts::TAU;
        vec2(angle.cos(), angle.sin())
    };

    let push = direction * ((min_distance - distance) * params.strength * 0.5);
    velocities[from] += push;
    velocities[to] -= push;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_covers_all_points() {
        let positions: Vec<Vec2> = (0..64)
            .map(|index| vec2((index % 8) as f32 * 10.0, (index / 8) as f32 * 10.0))
            .collect();
        let tree = QuadNode::build(&positions).unwrap();

        fn count(node: &QuadNode) -> usize {
            if node.is_leaf() {
                node.indices.len()
            } else {
                node.children
                    .iter()
                    .flatten()
                    .map(|child| count(child))
                    .sum()
            }
        }

        assert_eq!(count(&tree), positions.len());
        assert_eq!(tree.mass, positions.len() as f32);
    }

    #[test]
    fn build_rejects_non_finite_positions() {
        let positions = vec![vec2(f32::NAN, 0.0), vec2(1.0, 1.0)];
        assert!(QuadNode::build(&positions).is_none());
    }

    #[test]
    fn repulsion_pushes_nodes_apart() {
        let positions = vec![vec2(0.0, 0.0), vec2(4.0, 0.0)];
        let tree = QuadNode::build(&positions).unwrap();

        let mut velocity = Vec2::ZERO;
        accumulate_repulsion(&tree, 0, &positions, -90.0, 220.0 * 220.0, 0.9, &mut velocity);
        assert!(velocity.x < 0.0, "left node should be pushed further left");
    }

    #[test]
    fn repulsion_ignores_pairs_beyond_distance_cap() {
        let positions = vec![vec2(0.0, 0.0), vec2(500.0, 0.0)];
        let tree = QuadNode::build(&positions).unwrap();

        let mut velocity = Vec2::ZERO;
        accumulate_repulsion(&tree, 0, &positions, -90.0, 220.0 * 220.0, 0.9, &mut velocity);
        assert_eq!(velocity, Vec2::ZERO);
    }

    #[test]
    fn collisions_separate_overlapping_pairs_only() {
        let positions = vec![vec2(0.0, 0.0), vec2(3.0, 0.0), vec2(100.0, 0.0)];
        let tree = QuadNode::build(&positions).unwrap();
        let mut velocities = vec![Vec2::ZERO; positions.len()];

        accumulate_collisions(
            &tree,
            &tree,
            true,
            &positions,
            CollisionParams {
                radius: 5.0,
                strength: 0.7,
            },
            &mut velocities,
        );

        assert!(velocities[0].x < 0.0);
        assert!(velocities[1].x > 0.0);
        assert_eq!(velocities[2], Vec2::ZERO);
    }
}
