use ndarray::Array1;

use crate::Error;

/// Uniform structured grid on an axis-aligned box `[0, L_x] x [0, L_y] x [0, L_z]`.
///
/// Degrees of freedom live on the vertices. Each vertex owns the dual box
/// formed by the half-cells around it, which is what the lumped mass and the
/// two-point flux stiffness are built on.
#[derive(Clone, Debug, PartialEq)]
pub struct BoxMesh {
    cells: Vec<usize>,
    lengths: Vec<f64>,
}

/// An edge between two neighbouring vertices, aligned with one coordinate axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Edge {
    pub a: usize,
    pub b: usize,
    pub axis: usize,
    pub midpoint: [f64; 3],
    /// Area of the dual face crossed by the edge divided by the edge length.
    pub weight: f64,
}

impl BoxMesh {
    pub fn new(cells: &[usize], lengths: &[f64]) -> Result<Self, Error> {
        if cells.is_empty() || cells.len() > 3 {
            return Err(Error::InvalidDomain(format!(
                "expected 1 to 3 dimensions, got {}",
                cells.len()
            )));
        }
        if cells.len() != lengths.len() {
            return Err(Error::InvalidDomain(format!(
                "{} cell counts given for {} side lengths",
                cells.len(),
                lengths.len()
            )));
        }
        if let Some(axis) = cells.iter().position(|&n| n == 0) {
            return Err(Error::InvalidDomain(format!("no cells along axis {axis}")));
        }
        if let Some(axis) = lengths.iter().position(|&l| !(l.is_finite() && l > 0.0)) {
            return Err(Error::InvalidDomain(format!(
                "side length {} along axis {axis} is not positive",
                lengths[axis]
            )));
        }
        Ok(Self {
            cells: cells.to_vec(),
            lengths: lengths.to_vec(),
        })
    }

    pub fn unit_interval(nx: usize) -> Result<Self, Error> {
        Self::new(&[nx], &[1.0])
    }

    pub fn unit_square(nx: usize, ny: usize) -> Result<Self, Error> {
        Self::new(&[nx, ny], &[1.0, 1.0])
    }

    pub fn unit_cube(nx: usize, ny: usize, nz: usize) -> Result<Self, Error> {
        Self::new(&[nx, ny, nz], &[1.0, 1.0, 1.0])
    }

    pub fn dim(&self) -> usize {
        self.cells.len()
    }

    pub fn cells(&self) -> &[usize] {
        &self.cells
    }

    pub fn lengths(&self) -> &[f64] {
        &self.lengths
    }

    pub fn spacing(&self, axis: usize) -> f64 {
        self.lengths[axis] / self.cells[axis] as f64
    }

    pub fn num_vertices(&self) -> usize {
        self.cells.iter().map(|n| n + 1).product()
    }

    /// Number of vertices along `axis`, 1 for axes beyond the dimension.
    fn points(&self, axis: usize) -> usize {
        self.cells.get(axis).map_or(1, |n| n + 1)
    }

    /// Vertices are numbered with x varying fastest.
    pub fn vertex_index(&self, ijk: [usize; 3]) -> usize {
        ijk[0] + self.points(0) * (ijk[1] + self.points(1) * ijk[2])
    }

    pub fn vertex_multi_index(&self, idx: usize) -> [usize; 3] {
        let (nx, ny) = (self.points(0), self.points(1));
        [idx % nx, (idx / nx) % ny, idx / (nx * ny)]
    }

    pub fn coordinates(&self, idx: usize) -> [f64; 3] {
        let ijk = self.vertex_multi_index(idx);
        let mut x = [0.0; 3];
        for axis in 0..self.dim() {
            x[axis] = ijk[axis] as f64 * self.spacing(axis);
        }
        x
    }

    /// Width of the dual cell of vertex `i` along `axis`.
    fn dual_width(&self, axis: usize, i: usize) -> f64 {
        let h = self.spacing(axis);
        if i == 0 || i == self.cells[axis] {
            0.5 * h
        } else {
            h
        }
    }

    /// Volumes of the dual cells, i.e. the lumped mass matrix diagonal.
    pub fn vertex_volumes(&self) -> Array1<f64> {
        (0..self.num_vertices())
            .map(|idx| {
                let ijk = self.vertex_multi_index(idx);
                (0..self.dim())
                    .map(|axis| self.dual_width(axis, ijk[axis]))
                    .product::<f64>()
            })
            .collect()
    }

    pub fn edges(&self) -> Vec<Edge> {
        let mut edges = Vec::new();
        for idx in 0..self.num_vertices() {
            let ijk = self.vertex_multi_index(idx);
            for axis in 0..self.dim() {
                if ijk[axis] == self.cells[axis] {
                    continue;
                }
                let mut next = ijk;
                next[axis] += 1;
                let h = self.spacing(axis);
                let area: f64 = (0..self.dim())
                    .filter(|&other| other != axis)
                    .map(|other| self.dual_width(other, ijk[other]))
                    .product();
                let mut midpoint = self.coordinates(idx);
                midpoint[axis] += 0.5 * h;
                edges.push(Edge {
                    a: idx,
                    b: self.vertex_index(next),
                    axis,
                    midpoint,
                    weight: area / h,
                });
            }
        }
        edges
    }
}
