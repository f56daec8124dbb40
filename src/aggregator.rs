use crate::grid::Grid;
use crate::kdtree::KdTree;
use crate::types::Point2D;

/// Resolves arbitrary query points to the displacement of their nearest grid sample.
///
/// Rebuilt from scratch for every frame; the value table is filled in the same
/// pass as the point list, so a lookup is a tree query plus an index.
pub struct LandmarkAggregator {
    tree: KdTree,
    values: Vec<f64>,
}

impl LandmarkAggregator {
    /// `values[k]` belongs to `grid_points[k]`.
    pub fn build(grid_points: &[Point2D], values: &[f64]) -> LandmarkAggregator {
        debug_assert_eq!(grid_points.len(), values.len());
        LandmarkAggregator {
            tree: KdTree::build(grid_points),
            values: values.to_vec(),
        }
    }

    pub fn from_grid(grid: &Grid) -> LandmarkAggregator {
        let (nx, ny) = (grid.size_x(), grid.size_y());
        let (points, values): (Vec<_>, Vec<_>) = (0..nx)
            .flat_map(|i| (0..ny).map(move |j| (i, j)))
            .map(|(i, j)| (grid.point(i, j), grid.disp_magnitude[(i, j)]))
            .unzip();
        LandmarkAggregator {
            tree: KdTree::build(&points),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Coordinates of the grid sample closest to `query`.
    pub fn nearest(&self, query: &Point2D) -> Option<Point2D> {
        self.tree.nearest(query)
    }

    /// Raw value of the closest sample, may be `NaN` for a sample without data.
    pub fn value_at(&self, query: &Point2D) -> Option<f64> {
        self.tree
            .nearest_index(query)
            .and_then(|k| self.values.get(k).copied())
    }

    /// One value per query; queries that resolve to no data report `0.0`.
    pub fn values_for(&self, queries: &[Point2D]) -> Vec<f64> {
        queries
            .iter()
            .map(|q| {
                self.value_at(q)
                    .filter(|v| v.is_finite())
                    .unwrap_or(0.0)
            })
            .collect()
    }
}
