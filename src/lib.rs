pub mod bih;
pub mod geometry;
pub mod mesh;
mod util;

pub use bih::{Bih, BihView, Blob, BuildError, LoadError, Options, SaveError, TreeStatistics};
pub use mesh::{LocalFrame, MeshData, StridedMesh, TriangleMesh};
pub use util::Stats;
