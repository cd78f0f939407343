// Copyright @yucwang 2026

use crate::core::mesh::Triangle;
use crate::math::aabb::AABB;
use crate::math::aabb4::Aabb4;
use crate::math::constants::{Float, Vector3f};
use crate::math::ray::Ray3f;

const NUM_SPLITS: usize = 5;
const MAX_LEAF_TRIANGLES: usize = 4;
const DETERMINANT_EPSILON: Float = 5e-7;

/// Triangle as stored for traversal: positions plus the index of the
/// triangle in its owning mesh. Construction reorders these.
#[derive(Clone, Copy)]
struct BvhTriangle {
    positions: [Vector3f; 3],
    idx: usize,
}

impl BvhTriangle {
    fn center(&self) -> Vector3f {
        (self.positions[0] + self.positions[1] + self.positions[2]) / 3.0
    }
}

/// `num_triangles == 0` marks an internal node: `idx` is the first child
/// index and the four children live at `idx .. idx + 4`. Otherwise the node
/// is a leaf over `triangles[idx .. idx + num_triangles]`.
#[derive(Clone, Copy)]
struct Node {
    child_bounds: Aabb4,
    idx: u32,
    num_triangles: u32,
}

impl Node {
    fn is_leaf(&self) -> bool {
        self.num_triangles != 0
    }
}

/// A 4-ary bounding volume hierarchy over one mesh primitive, built with a
/// greedy surface-area heuristic.
pub struct Bvh {
    triangles: Vec<BvhTriangle>,
    nodes: Vec<Node>,
    root_bounds: AABB,
}

#[derive(Clone, Copy, Debug)]
pub struct BvhHit {
    /// Index of the hit triangle in the owning mesh.
    pub triangle_idx: usize,
    pub distance: Float,
    pub position: Vector3f,
    /// Barycentric weights ordered (alpha, beta, gamma).
    pub barycentric: Vector3f,
}

struct SplitInfo {
    axis: usize,
    position: Float,
    left_bbox: AABB,
    right_bbox: AABB,
    num_left: usize,
    num_right: usize,
    left_cost: Float,
    right_cost: Float,
}

fn evaluate_split(
        triangles: &[BvhTriangle],
        centers: &[Vector3f],
        axis: usize,
        split_position: Float) -> SplitInfo {
    let mut info = SplitInfo {
        axis,
        position: split_position,
        left_bbox: AABB::default(),
        right_bbox: AABB::default(),
        num_left: 0,
        num_right: 0,
        left_cost: 0.0,
        right_cost: 0.0,
    };
    for i in 0..triangles.len() {
        if centers[i][axis] < split_position {
            for position in &triangles[i].positions {
                info.left_bbox.expand_by_point(position);
            }
            info.num_left += 1;
        } else {
            for position in &triangles[i].positions {
                info.right_bbox.expand_by_point(position);
            }
        }
    }
    info.num_right = triangles.len() - info.num_left;
    info.left_cost = info.num_left as Float * info.left_bbox.half_area();
    info.right_cost = info.num_right as Float * info.right_bbox.half_area();
    info
}

/// Try to find a two-way SAH split of `triangles[first..first + count]`
/// costing strictly less than `best_cost`. On success the subrange is
/// partitioned in place around the chosen plane.
fn try_split_and_partition(
        bounds: &AABB,
        first: usize,
        count: usize,
        triangles: &mut [BvhTriangle],
        centers: &mut [Vector3f],
        mut best_cost: Float) -> Option<SplitInfo> {
    let triangles = &mut triangles[first..first + count];
    let centers = &mut centers[first..first + count];

    let mut best_split: Option<SplitInfo> = None;
    for axis in 0..3 {
        let split_separation = bounds.size()[axis] / (NUM_SPLITS as Float + 1.0);
        for split in 0..NUM_SPLITS {
            let split_position =
                bounds.p_min[axis] + (split as Float + 1.0) * split_separation;
            let info = evaluate_split(triangles, centers, axis, split_position);
            let cost = info.left_cost + info.right_cost;
            if cost < best_cost {
                best_cost = cost;
                best_split = Some(info);
            }
        }
    }

    let best_split = best_split?;

    let mut num_left = 0;
    for i in 0..triangles.len() {
        if centers[i][best_split.axis] < best_split.position {
            triangles.swap(i, num_left);
            centers.swap(i, num_left);
            num_left += 1;
        }
    }

    Some(best_split)
}

fn intersect_triangle(ray: &Ray3f, triangle: &BvhTriangle) -> Option<BvhHit> {
    let ab = triangle.positions[0] - triangle.positions[1];
    let ac = triangle.positions[0] - triangle.positions[2];
    let ao = triangle.positions[0] - ray.origin();
    let geometric_normal = ab.cross(&ac);
    let determinant = geometric_normal.dot(&ray.dir());

    if determinant.abs() < DETERMINANT_EPSILON {
        return None; // The ray is parallel to the triangle.
    }

    let inv_determinant = 1.0 / determinant;

    let beta = ao.cross(&ac).dot(&ray.dir()) * inv_determinant;
    if beta < 0.0 || beta > 1.0 {
        return None;
    }

    let gamma = ab.cross(&ao).dot(&ray.dir()) * inv_determinant;
    if gamma < 0.0 || beta + gamma > 1.0 {
        return None;
    }

    let alpha = 1.0 - beta - gamma;

    let t = geometric_normal.dot(&ao) * inv_determinant;
    if t < ray.min_t || t > ray.max_t {
        return None;
    }

    Some(BvhHit {
        triangle_idx: triangle.idx,
        distance: t,
        position: ray.at(t),
        barycentric: Vector3f::new(alpha, beta, gamma),
    })
}

impl Bvh {
    /// Builds the hierarchy over `mesh_triangles[start_idx..start_idx + count]`.
    pub fn new(mesh_triangles: &[Triangle], start_idx: usize, count: usize) -> Self {
        let mut triangles = Vec::with_capacity(count);
        let mut centers = Vec::with_capacity(count);
        let mut root_bounds = AABB::default();
        for i in start_idx..start_idx + count {
            let triangle = BvhTriangle { positions: mesh_triangles[i].positions, idx: i };
            for position in &triangle.positions {
                root_bounds.expand_by_point(position);
            }
            centers.push(triangle.center());
            triangles.push(triangle);
        }

        let root = Node {
            child_bounds: Aabb4::default(),
            idx: 0,
            num_triangles: count as u32,
        };
        let mut bvh = Self { triangles, nodes: vec![root], root_bounds };
        if count > 0 {
            let root_cost = count as Float * bvh.root_bounds.half_area();
            bvh.split(None, 0, root_cost, &mut centers);
        }
        bvh
    }

    pub fn root_bounds(&self) -> &AABB {
        &self.root_bounds
    }

    /// Nearest hit within the ray's `[min_t, max_t]` range.
    pub fn intersect(&self, ray: &Ray3f) -> Option<BvhHit> {
        let root_distance = self.root_bounds.ray_intersect(ray)?;

        let mut closest_hit: Option<BvhHit> = None;
        let mut stack: Vec<(u32, Float)> = Vec::with_capacity(64);
        stack.push((0, root_distance));
        while let Some((index, distance)) = stack.pop() {
            if let Some(closest) = &closest_hit {
                if closest.distance < distance {
                    continue;
                }
            }
            let node = &self.nodes[index as usize];
            if node.is_leaf() {
                for i in node.idx..node.idx + node.num_triangles {
                    if let Some(hit) = intersect_triangle(ray, &self.triangles[i as usize]) {
                        if closest_hit.is_none_or(|closest| hit.distance < closest.distance) {
                            closest_hit = Some(hit);
                        }
                    }
                }
            } else {
                let mut hit_info = node.child_bounds.intersect(ray);
                // Push the hit children ordered by descending distance so
                // the nearest is popped first.
                loop {
                    let mut best_lane = None;
                    let mut best_distance = Float::INFINITY;
                    for lane in 0..4 {
                        if hit_info.is_hit[lane] && hit_info.distances[lane] < best_distance {
                            best_distance = hit_info.distances[lane];
                            best_lane = Some(lane);
                        }
                    }
                    let Some(lane) = best_lane else { break };
                    stack.push((node.idx + lane as u32, best_distance));
                    hit_info.is_hit[lane] = false;
                }
            }
        }

        closest_hit
    }

    fn split(
            &mut self,
            parent_node_idx: Option<usize>,
            child_idx: usize,
            node_cost: Float,
            centers: &mut [Vector3f]) {
        let node_idx = match parent_node_idx {
            Some(parent) => self.nodes[parent].idx as usize + child_idx,
            None => 0,
        };
        let num_triangles = self.nodes[node_idx].num_triangles as usize;
        if num_triangles <= MAX_LEAF_TRIANGLES {
            return;
        }

        let node_bounds = match parent_node_idx {
            Some(parent) => self.nodes[parent].child_bounds.get_aabb(child_idx),
            None => self.root_bounds,
        };
        let first = self.nodes[node_idx].idx as usize;

        // First, an initial split into 2 regions.
        let best_initial = match try_split_and_partition(
                &node_bounds, first, num_triangles,
                &mut self.triangles, centers, node_cost) {
            Some(split) => split,
            None => return,
        };

        // Then try to split each half again for a total of 4 regions, each
        // measured against the current node's cost.
        let best_left = match try_split_and_partition(
                &best_initial.left_bbox, first, best_initial.num_left,
                &mut self.triangles, centers, node_cost) {
            Some(split) => split,
            None => return,
        };

        let best_right = match try_split_and_partition(
                &best_initial.right_bbox, first + best_initial.num_left,
                best_initial.num_right,
                &mut self.triangles, centers, node_cost) {
            Some(split) => split,
            None => return,
        };

        let total_cost = best_left.left_cost + best_left.right_cost
            + best_right.left_cost + best_right.right_cost;
        if total_cost > node_cost {
            // Despite the individual splits looking good, the 4-way split
            // does not beat keeping this node a leaf.
            return;
        }

        let first_child_idx = self.nodes.len() as u32;

        self.nodes[node_idx].child_bounds = Aabb4::new(
            &best_left.left_bbox, &best_left.right_bbox,
            &best_right.left_bbox, &best_right.right_bbox);

        let mut triangles_idx = first as u32;
        for num in [best_left.num_left, best_left.num_right,
                    best_right.num_left, best_right.num_right] {
            self.nodes.push(Node {
                child_bounds: Aabb4::default(),
                idx: triangles_idx,
                num_triangles: num as u32,
            });
            triangles_idx += num as u32;
        }

        self.nodes[node_idx].num_triangles = 0;
        self.nodes[node_idx].idx = first_child_idx;

        self.split(Some(node_idx), 0, best_left.left_cost, centers);
        self.split(Some(node_idx), 1, best_left.right_cost, centers);
        self.split(Some(node_idx), 2, best_right.left_cost, centers);
        self.split(Some(node_idx), 3, best_right.right_cost, centers);
    }
}
