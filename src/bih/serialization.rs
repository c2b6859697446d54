//! Relocation-free binary form of the tree.
//!
//! A blob is a [`Header`] followed by the node, triangle and vertex arrays, each
//! starting at a 16 byte aligned offset. Arrays are referenced by offsets relative
//! to the referencing field itself, so a blob can be used in place wherever it is
//! loaded. Loading only validates, it never rewrites anything.

use std::{
    collections::TryReserveError,
    io::{self, Read, Write},
    mem::{offset_of, size_of},
};

use bytemuck::{Pod, PodCastError, Zeroable};
use index_vec::IndexSlice;
use thiserror::Error;

use super::{Bih, BihView, CompressedNode, MAX_TREE_DEPTH, Node, PackedTriangle, QuantizedPoint};
use crate::geometry::{LocalBox, LocalPoint};

const MAGIC: [u8; 4] = *b"QBIH";
const SECTION_ALIGNMENT: usize = 16;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct Header {
    magic: [u8; 4],
    depth: u32,
    bounds_min: [f32; 3],
    bounds_max: [f32; 3],
    nodes: ArrayRef,
    triangles: ArrayRef,
    vertices: ArrayRef,
    reserved: [u32; 2],
}

/// Self-relative reference to an array inside the blob.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct ArrayRef {
    /// Byte offset of the first element, relative to this struct
    offset: i32,
    count: u32,
}

#[repr(C, align(16))]
#[derive(Copy, Clone, Pod, Zeroable)]
struct Align16([u8; SECTION_ALIGNMENT]);

/// Owned byte buffer aligned to 16 bytes, holding a serialized tree.
#[derive(Clone)]
pub struct Blob {
    chunks: Vec<Align16>,
    len: usize,
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("Serialized tree would exceed the 2 GiB offset range")]
    TooLarge,

    #[error("Out of memory: {0}")]
    OutOfMemory(#[from] TryReserveError),
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read blob: {0}")]
    Io(#[from] io::Error),

    #[error("Out of memory: {0}")]
    OutOfMemory(#[from] TryReserveError),

    #[error("Blob is not a serialized tree (bad magic)")]
    BadMagic,

    #[error("Blob is truncated")]
    Truncated,

    #[error("Blob data is not aligned")]
    Misaligned,

    #[error("Array offset points outside of the blob")]
    OffsetOutOfRange,

    #[error("Tree has no nodes or no triangles")]
    EmptyTree,

    #[error("Tree bounds are not a valid box")]
    InvalidBounds,

    #[error("Node {0} has an invalid child link")]
    InvalidChild(usize),

    #[error("Node {0} is not reachable exactly once from the root")]
    InvalidLinkage(usize),

    #[error("Leaf node {0} references triangles outside of the triangle array")]
    InvalidLeafRange(usize),

    #[error("Triangle {0} references a vertex outside of the vertex array")]
    InvalidVertexIndex(usize),

    #[error("Tree depth {0} exceeds the supported maximum")]
    TooDeep(usize),

    #[error("Header depth {stored} doesn't match the tree depth {actual}")]
    DepthMismatch { stored: usize, actual: usize },
}

impl Blob {
    fn zeroed(len: usize) -> Result<Blob, TryReserveError> {
        let mut chunks = Vec::new();
        let chunk_count = len.div_ceil(SECTION_ALIGNMENT);
        chunks.try_reserve_exact(chunk_count)?;
        chunks.resize(chunk_count, Align16::zeroed());
        Ok(Blob { chunks, len })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &bytemuck::cast_slice(&self.chunks)[..self.len]
    }

    fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut bytemuck::cast_slice_mut(&mut self.chunks)[..self.len]
    }

    /// Validates the blob and returns a view into it.
    pub fn view(&self) -> Result<BihView<'_>, LoadError> {
        BihView::from_bytes(self.as_bytes())
    }

    pub fn write_to(&self, writer: &mut impl Write) -> io::Result<()> {
        writer.write_all(self.as_bytes())
    }

    /// Reads all remaining data of the reader into an aligned buffer.
    /// The content is not validated here, use [`Blob::view`].
    pub fn read_from(reader: &mut impl Read) -> Result<Blob, LoadError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;

        let mut blob = Blob::zeroed(bytes.len())?;
        blob.as_bytes_mut().copy_from_slice(&bytes);
        Ok(blob)
    }
}

impl AsRef<[u8]> for Blob {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl std::fmt::Debug for Blob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blob").field("len", &self.len).finish()
    }
}

/// Byte range of one array in the blob being written.
struct Section {
    start: usize,
    count: usize,
}

impl Section {
    fn array_ref(&self, field_offset: usize) -> Result<ArrayRef, SaveError> {
        let offset = i32::try_from(self.start - field_offset).map_err(|_| SaveError::TooLarge)?;
        let count = u32::try_from(self.count).map_err(|_| SaveError::TooLarge)?;
        Ok(ArrayRef { offset, count })
    }
}

fn layout(len: &mut usize, count: usize, element_size: usize) -> Section {
    let start = len.next_multiple_of(SECTION_ALIGNMENT);
    *len = start + count * element_size;
    Section { start, count }
}

fn write_section<T: Pod>(bytes: &mut [u8], section: &Section, data: &[T]) {
    let data: &[u8] = bytemuck::cast_slice(data);
    bytes[section.start..section.start + data.len()].copy_from_slice(data);
}

impl Bih {
    pub fn to_blob(&self) -> Result<Blob, SaveError> {
        let mut len = size_of::<Header>();
        let nodes = layout(&mut len, self.nodes.len(), size_of::<CompressedNode>());
        let triangles = layout(&mut len, self.triangles.len(), size_of::<PackedTriangle>());
        let vertices = layout(&mut len, self.vertices.len(), size_of::<QuantizedPoint>());

        let header = Header {
            magic: MAGIC,
            depth: self.depth,
            bounds_min: self.bounds.min.into(),
            bounds_max: self.bounds.max.into(),
            nodes: nodes.array_ref(offset_of!(Header, nodes))?,
            triangles: triangles.array_ref(offset_of!(Header, triangles))?,
            vertices: vertices.array_ref(offset_of!(Header, vertices))?,
            reserved: [0; 2],
        };

        let mut blob = Blob::zeroed(len)?;
        let bytes = blob.as_bytes_mut();
        bytes[..size_of::<Header>()].copy_from_slice(bytemuck::bytes_of(&header));
        write_section(bytes, &nodes, self.nodes.as_raw_slice());
        write_section(bytes, &triangles, self.triangles.as_raw_slice());
        write_section(bytes, &vertices, self.vertices.as_raw_slice());

        log::debug!("Serialized tree into {len} bytes");
        Ok(blob)
    }

    /// Validates a blob and copies it into an owned tree.
    pub fn from_bytes(bytes: &[u8]) -> Result<Bih, LoadError> {
        Ok(BihView::from_bytes(bytes)?.to_bih())
    }
}

fn map_cast_error(e: PodCastError) -> LoadError {
    match e {
        PodCastError::TargetAlignmentGreaterAndInputNotAligned => LoadError::Misaligned,
        _ => LoadError::Truncated,
    }
}

/// Resolves an array reference located at `field_offset` in the blob.
fn section<T: Pod>(bytes: &[u8], field_offset: usize, array: ArrayRef) -> Result<&[T], LoadError> {
    let start = (field_offset as i64)
        .checked_add(i64::from(array.offset))
        .and_then(|start| usize::try_from(start).ok())
        .filter(|start| *start <= bytes.len())
        .ok_or(LoadError::OffsetOutOfRange)?;
    let end = (array.count as usize)
        .checked_mul(size_of::<T>())
        .and_then(|size| start.checked_add(size))
        .filter(|end| *end <= bytes.len())
        .ok_or(LoadError::Truncated)?;

    bytemuck::try_cast_slice(&bytes[start..end]).map_err(map_cast_error)
}

impl<'a> BihView<'a> {
    /// Validates a serialized tree and returns a view borrowing the bytes.
    pub fn from_bytes(bytes: &'a [u8]) -> Result<BihView<'a>, LoadError> {
        let header_bytes = bytes.get(..size_of::<Header>()).ok_or(LoadError::Truncated)?;
        let header: &Header = bytemuck::try_from_bytes(header_bytes).map_err(map_cast_error)?;

        if header.magic != MAGIC {
            return Err(LoadError::BadMagic);
        }

        let bounds = LocalBox::new(
            LocalPoint::from(header.bounds_min),
            LocalPoint::from(header.bounds_max),
        );
        if bounds.is_empty() || !bounds.min.iter().chain(bounds.max.iter()).all(|x| x.is_finite()) {
            return Err(LoadError::InvalidBounds);
        }

        let view = BihView {
            bounds,
            depth: header.depth,
            nodes: IndexSlice::new(section(bytes, offset_of!(Header, nodes), header.nodes)?),
            triangles: IndexSlice::new(section(
                bytes,
                offset_of!(Header, triangles),
                header.triangles,
            )?),
            vertices: IndexSlice::new(section(
                bytes,
                offset_of!(Header, vertices),
                header.vertices,
            )?),
        };
        view.validate()?;

        Ok(view)
    }

    /// Checks everything traversal relies on.
    fn validate(&self) -> Result<(), LoadError> {
        let nodes = self.nodes.as_raw_slice();
        if nodes.is_empty() || self.triangles.is_empty() {
            return Err(LoadError::EmptyTree);
        }

        // Children always come after their parents, so a single forward pass
        // sees every parent before its children.
        let mut parent_count = vec![0u8; nodes.len()];
        let mut depths = vec![0usize; nodes.len()];
        let mut max_depth = 0;

        for (i, node) in nodes.iter().enumerate() {
            if i > 0 && parent_count[i] != 1 {
                return Err(LoadError::InvalidLinkage(i));
            }
            let depth = depths[i];
            if depth > MAX_TREE_DEPTH {
                return Err(LoadError::TooDeep(depth));
            }
            max_depth = max_depth.max(depth);

            match node.decode() {
                Node::Internal { right_child, .. } => {
                    let left = i + 1;
                    let right = right_child.ok_or(LoadError::InvalidChild(i))?.index();
                    if right <= left || right >= nodes.len() {
                        return Err(LoadError::InvalidChild(i));
                    }
                    for child in [left, right] {
                        parent_count[child] = parent_count[child].saturating_add(1);
                        depths[child] = depth + 1;
                    }
                }
                Node::Leaf {
                    first_triangle,
                    count,
                    ..
                } => {
                    let end = first_triangle.index() + count as usize;
                    if count == 0 || end > self.triangles.len() {
                        return Err(LoadError::InvalidLeafRange(i));
                    }
                }
            }
        }

        if max_depth != self.depth() {
            return Err(LoadError::DepthMismatch {
                stored: self.depth(),
                actual: max_depth,
            });
        }

        let vertex_count = self.vertices.len();
        for (i, triangle) in self.triangles.iter().enumerate() {
            if triangle.unpack().iter().any(|v| v.index() >= vertex_count) {
                return Err(LoadError::InvalidVertexIndex(i));
            }
        }

        Ok(())
    }
}
