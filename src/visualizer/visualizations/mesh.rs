//! Planar mesh layouts for the spectral height-field.
//!
//! The mesh is `x_res` vertices wide and `z_res` rows deep. Vertex
//! `col * x_res + row` carries height-history entry of the same index, so
//! history row `col` is drawn at depth `col`. A topology decides which
//! vertices take part; retired vertices are parked at an off-screen sentinel.

use serde::{Deserialize, Serialize};

/// Coordinate used for both x and z of a retired vertex.
pub const RETIRED_COORD: f32 = -200.0;

/// Shape of the active vertex set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum MeshTopology {
    /// Full rectangular grid
    #[default]
    Grid,
    /// All rows collapsed onto a single line at `z = 0`
    Line,
    /// Circular mask centred on the grid
    Circle,
    /// Triangular mask narrowing with depth
    Triangle,
}

impl MeshTopology {
    /// Whether the vertex at `row` (x index) and `col` (z index) is drawn.
    pub fn is_active(self, row: usize, col: usize, z_res: usize) -> bool {
        let row = row as i64;
        let col = col as i64;
        let z_res = z_res as i64;

        match self {
            Self::Grid | Self::Line => true,
            Self::Circle => {
                let half = z_res / 2;
                let radius_sq = half * half - (col - half) * (col - half);
                let offset = (radius_sq.max(0) as f64).sqrt() as i64;
                let dx = row - half;
                dx < offset && dx > -offset
            }
            Self::Triangle => {
                let bottom = col / 2;
                let top = z_res - col / 2;
                row >= bottom && row <= top
            }
        }
    }

    /// Stable slot index, `0..4`.
    pub fn index(self) -> usize {
        match self {
            Self::Grid => 0,
            Self::Line => 1,
            Self::Circle => 2,
            Self::Triangle => 3,
        }
    }
}

impl std::fmt::Display for MeshTopology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Grid => write!(f, "grid"),
            Self::Line => write!(f, "line"),
            Self::Circle => write!(f, "circle"),
            Self::Triangle => write!(f, "triangle"),
        }
    }
}

/// World-space size of the mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshExtents {
    pub x_width: f32,
    pub y_height: f32,
    pub z_depth: f32,
}

/// Precomputed `(x, z)` vertex positions for one topology.
#[derive(Debug, Clone)]
pub struct MeshLayout {
    topology: MeshTopology,
    x_res: usize,
    z_res: usize,
    positions: Vec<[f32; 2]>,
    active: Vec<bool>,
}

impl MeshLayout {
    /// Builds the vertex positions once; they never change afterwards.
    ///
    /// # Panics
    /// - If `x_res < 2` or `z_res < 1`
    pub fn new(topology: MeshTopology, x_res: usize, z_res: usize, extents: MeshExtents) -> Self {
        assert!(x_res >= 2, "mesh needs at least two columns");
        assert!(z_res >= 1, "mesh needs at least one row");

        let x_offset = extents.x_width / (x_res as f32 - 1.0);
        let z_offset = if z_res > 1 {
            extents.z_depth / (z_res as f32 - 1.0)
        } else {
            0.0
        };
        let x_start = -extents.x_width / 2.0;
        let z_start = -extents.z_depth / 2.0;

        let mut positions = Vec::with_capacity(x_res * z_res);
        let mut active = Vec::with_capacity(x_res * z_res);
        for col in 0..z_res {
            for row in 0..x_res {
                let is_active = topology.is_active(row, col, z_res);
                active.push(is_active);
                let position = if !is_active {
                    [RETIRED_COORD, RETIRED_COORD]
                } else if topology == MeshTopology::Line {
                    [x_start + x_offset * row as f32, 0.0]
                } else {
                    [
                        x_start + x_offset * row as f32,
                        z_start + z_offset * col as f32,
                    ]
                };
                positions.push(position);
            }
        }

        let active_count = active.iter().filter(|a| **a).count();
        tracing::debug!(
            "Mesh layout {}: {}x{} vertices, {} active",
            topology,
            x_res,
            z_res,
            active_count
        );

        Self {
            topology,
            x_res,
            z_res,
            positions,
            active,
        }
    }

    pub fn topology(&self) -> MeshTopology {
        self.topology
    }

    pub fn x_res(&self) -> usize {
        self.x_res
    }

    pub fn z_res(&self) -> usize {
        self.z_res
    }

    /// `(x, z)` position per vertex, row-major by depth.
    pub fn positions(&self) -> &[[f32; 2]] {
        &self.positions
    }

    /// Whether vertex `index` is drawn.
    pub fn is_vertex_active(&self, index: usize) -> bool {
        self.active[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXTENTS: MeshExtents = MeshExtents {
        x_width: 3.0,
        y_height: 1.0,
        z_depth: 3.0,
    };

    #[test]
    fn test_grid_spans_extents() {
        let layout = MeshLayout::new(MeshTopology::Grid, 4, 3, EXTENTS);
        let positions = layout.positions();
        assert_eq!(positions.len(), 12);
        assert_eq!(positions[0], [-1.5, -1.5]);
        assert_eq!(positions[3], [1.5, -1.5]);
        assert_eq!(positions[11], [1.5, 1.5]);
        assert!((0..12).all(|i| layout.is_vertex_active(i)));
    }

    #[test]
    fn test_line_collapses_depth() {
        let layout = MeshLayout::new(MeshTopology::Line, 5, 4, EXTENTS);
        assert!(layout.positions().iter().all(|p| p[1] == 0.0));
        assert_eq!(layout.positions()[4][0], layout.positions()[19][0]);
    }

    #[test]
    fn test_circle_masks_corners() {
        let layout = MeshLayout::new(MeshTopology::Circle, 80, 81, EXTENTS);
        // Corner vertices lie outside the circle, the centre lies inside.
        assert!(!layout.is_vertex_active(0));
        assert!(!layout.is_vertex_active(79));
        assert!(layout.is_vertex_active(40 * 80 + 40));
        assert_eq!(layout.positions()[0], [RETIRED_COORD, RETIRED_COORD]);
    }

    #[test]
    fn test_circle_is_symmetric_around_centre_row() {
        let z_res = 21;
        let half = z_res / 2;
        for col in 0..z_res {
            for d in 0..half {
                assert_eq!(
                    MeshTopology::Circle.is_active(half + d, col, z_res),
                    MeshTopology::Circle.is_active(half - d, col, z_res)
                );
            }
        }
    }

    #[test]
    fn test_triangle_narrows_with_depth() {
        let z_res = 10;
        assert!(MeshTopology::Triangle.is_active(0, 0, z_res));
        assert!(MeshTopology::Triangle.is_active(10, 0, z_res));
        assert!(!MeshTopology::Triangle.is_active(0, 4, z_res));
        assert!(MeshTopology::Triangle.is_active(2, 4, z_res));
        assert!(MeshTopology::Triangle.is_active(8, 4, z_res));
        assert!(!MeshTopology::Triangle.is_active(9, 4, z_res));
    }

    #[test]
    fn test_topology_parses_from_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            topology: MeshTopology,
        }
        let parsed: Wrapper = toml::from_str(r#"topology = "triangle""#).unwrap();
        assert_eq!(parsed.topology, MeshTopology::Triangle);
        assert_eq!(MeshTopology::Triangle.to_string(), "triangle");
    }

    #[test]
    fn test_wide_mesh_vertex_at_sentinel_stays_active() {
        let wide = MeshExtents {
            x_width: 800.0,
            y_height: 1.0,
            z_depth: 3.0,
        };
        let layout = MeshLayout::new(MeshTopology::Grid, 5, 2, wide);

        assert_eq!(layout.positions()[1][0], RETIRED_COORD);
        assert!((0..10).all(|i| layout.is_vertex_active(i)));
    }
}
