//! Vertex centred finite volume discretization on structured boxes.

mod field;
mod mesh;

pub use field::MixedField;
pub use mesh::{BoxMesh, Edge};

use ndarray::Array1;
use sprs::{CsMat, TriMat};

/// Lumped mass matrix diagonal.
pub fn lumped_mass(mesh: &BoxMesh) -> Array1<f64> {
    mesh.vertex_volumes()
}

/// Assembles the two-point flux stiffness matrix `K` of `-div(sigma grad w)`
/// with natural (no-flux) boundary conditions.
///
/// `sigma(axis, x)` gives the conductivity component along `axis` at the
/// midpoint `x` of an edge. Rows of `K` sum to zero.
pub fn assemble_stiffness<F>(mesh: &BoxMesh, sigma: F) -> CsMat<f64>
where
    F: Fn(usize, [f64; 3]) -> f64,
{
    let n = mesh.num_vertices();
    let edges = mesh.edges();
    let mut tri = TriMat::with_capacity((n, n), 4 * edges.len());
    for edge in edges {
        let c = sigma(edge.axis, edge.midpoint) * edge.weight;
        tri.add_triplet(edge.a, edge.a, c);
        tri.add_triplet(edge.b, edge.b, c);
        tri.add_triplet(edge.a, edge.b, -c);
        tri.add_triplet(edge.b, edge.a, -c);
    }
    tri.to_csr()
}
