use std::cmp::Ordering;

use crate::types::{Point2D, is_tracked};

#[derive(Debug, Clone, Copy)]
struct Node {
    point: usize,
    axis: usize,
    left: Option<usize>,
    right: Option<usize>,
}

/// Static 2-d tree over a fixed point list.
///
/// Built once in `O(n log n)`, queried in `O(log n)` on average. Untracked
/// (`NaN`) points are left out of the tree. Exact distance ties resolve to the
/// lowest input index.
#[derive(Debug, Clone)]
pub struct KdTree {
    points: Vec<Point2D>,
    nodes: Vec<Node>,
    root: Option<usize>,
}

fn coord(p: &Point2D, axis: usize) -> f64 {
    if axis == 0 { p.x } else { p.y }
}

fn build_node(
    points: &[Point2D],
    indices: &mut [usize],
    depth: usize,
    nodes: &mut Vec<Node>,
) -> Option<usize> {
    if indices.is_empty() {
        return None;
    }
    let axis = depth % 2;
    let mid = indices.len() / 2;
    indices.select_nth_unstable_by(mid, |&a, &b| {
        coord(&points[a], axis)
            .total_cmp(&coord(&points[b], axis))
            .then(a.cmp(&b))
    });
    let point = indices[mid];
    let (lo, hi) = indices.split_at_mut(mid);
    let left = build_node(points, lo, depth + 1, nodes);
    let right = build_node(points, &mut hi[1..], depth + 1, nodes);
    nodes.push(Node {
        point,
        axis,
        left,
        right,
    });
    Some(nodes.len() - 1)
}

impl KdTree {
    pub fn build(points: &[Point2D]) -> KdTree {
        let mut indices: Vec<usize> = (0..points.len())
            .filter(|&k| is_tracked(&points[k]))
            .collect();
        let mut nodes = Vec::with_capacity(indices.len());
        let root = build_node(points, &mut indices, 0, &mut nodes);
        KdTree {
            points: points.to_vec(),
            nodes,
            root,
        }
    }

    /// Number of indexed points.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn point(&self, index: usize) -> Option<Point2D> {
        self.points.get(index).copied()
    }

    /// Input index of the closest point, `None` for an empty tree or `NaN` query.
    pub fn nearest_index(&self, query: &Point2D) -> Option<usize> {
        if !is_tracked(query) {
            return None;
        }
        let mut best: Option<(f64, usize)> = None;
        self.search(self.root, query, &mut best);
        best.map(|(_, k)| k)
    }

    pub fn nearest(&self, query: &Point2D) -> Option<Point2D> {
        self.nearest_index(query).map(|k| self.points[k])
    }

    fn search(&self, node: Option<usize>, query: &Point2D, best: &mut Option<(f64, usize)>) {
        let Some(n) = node else {
            return;
        };
        let node = self.nodes[n];
        let p = self.points[node.point];
        let d = p.distance_squared(*query);
        let closer = match best {
            None => true,
            Some((bd, bk)) => match d.total_cmp(bd) {
                Ordering::Less => true,
                Ordering::Equal => node.point < *bk,
                Ordering::Greater => false,
            },
        };
        if closer {
            *best = Some((d, node.point));
        }

        let diff = coord(query, node.axis) - coord(&p, node.axis);
        let (near, far) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };
        self.search(near, query, best);
        if best.is_none_or(|(bd, _)| diff * diff <= bd) {
            self.search(far, query, best);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brute_force_agrees() {
        let points: Vec<Point2D> = (0..50)
            .map(|k| Point2D::new(((k * 37) % 23) as f64, ((k * 11) % 17) as f64 * 1.5))
            .collect();
        let tree = KdTree::build(&points);
        for q in [
            Point2D::new(3.3, 4.1),
            Point2D::new(-10.0, 100.0),
            Point2D::new(11.5, 12.75),
        ] {
            let brute = (0..points.len())
                .min_by(|&a, &b| {
                    points[a]
                        .distance_squared(q)
                        .total_cmp(&points[b].distance_squared(q))
                        .then(a.cmp(&b))
                })
                .unwrap();
            assert_eq!(tree.nearest_index(&q), Some(brute));
        }
    }

    #[test]
    fn skips_untracked_points() {
        let points = vec![Point2D::NAN, Point2D::new(5.0, 5.0)];
        let tree = KdTree::build(&points);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.nearest_index(&Point2D::ZERO), Some(1));
    }
}
