use super::{FloatType, LocalBox, LocalPoint, LocalVector, Triangle};

impl Triangle<LocalPoint> {
    /// Exact closed overlap test of the triangle with an axis aligned box, touching counts.
    /// Separating axis test, adapted from Tomas Akenine-Möller, "Fast 3D Triangle-Box Overlap Testing".
    pub fn overlaps_box(&self, b: &LocalBox) -> bool {
        // Box face normals, equivalent to overlap of the triangle bounding box.
        // Done on the original coordinates so that it agrees exactly with box culling.
        let triangle_box = self.bounding_box();
        if !triangle_box.intersects(b) {
            return false;
        }

        // The triangle lies inside its bounding box, so clamping the query to it keeps the
        // result and keeps huge or infinite boxes from swamping the arithmetic.
        let b = LocalBox::new(b.min.sup(&triangle_box.min), b.max.inf(&triangle_box.max));

        let center = b.center();
        let half_size = b.size() / 2.0;
        let v = self.map(|p| p - center);

        // Triangle normal
        let normal = (v[1] - v[0]).cross(&(v[2] - v[0]));
        if normal.dot(&v[0]).abs() > projected_radius(&half_size, &normal) {
            return false;
        }

        // Cross products of box axes and triangle edges
        let edges = [v[1] - v[0], v[2] - v[1], v[0] - v[2]];
        for edge in &edges {
            for box_axis in [LocalVector::x(), LocalVector::y(), LocalVector::z()] {
                let axis = box_axis.cross(edge);
                let projections = v.map(|p| p.dot(&axis));
                let min = projections[0].min(projections[1]).min(projections[2]);
                let max = projections[0].max(projections[1]).max(projections[2]);
                let radius = projected_radius(&half_size, &axis);
                if min > radius || max < -radius {
                    return false;
                }
            }
        }

        true
    }
}

/// Half length of the box projected onto the axis
fn projected_radius(half_size: &LocalVector, axis: &LocalVector) -> FloatType {
    half_size.dot(&axis.abs())
}
