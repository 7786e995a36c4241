//! View Vector Math
//!
//! Coefficients that let a full-screen shader reconstruct each pixel's
//! view-space ray from its NDC position with two multiply-adds instead of a
//! full matrix inverse.
//!
//! The three vectors are obtained by un-projecting clip-space points that lie
//! on the view-space plane `z = +1` (the projection's homogeneous `w` is
//! negative there). A ray through NDC `(x, y)` is therefore
//! `-(offset + coef_x * x + coef_y * y)` in X/Y with `z = -1`, see
//! [`ViewVectors::ray`].
//!
//! Recompute every frame the projection can change; the cost is one 4x4
//! inverse.

use glam::{Mat4, Vec2, Vec3, Vec4};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewVectors {
    pub offset: Vec2,
    pub coef_x: Vec2,
    pub coef_y: Vec2,
}

impl ViewVectors {
    /// Recomputes the coefficients in place from `projection`.
    pub fn update_from_projection(&mut self, projection: &Mat4) {
        let far = *projection * Vec4::new(0.0, 0.0, 1.0, 1.0);
        let inverse = projection.inverse();

        let unproject = |x: f32, y: f32| -> Vec2 {
            let v = inverse * Vec4::new(x, y, far.z, far.w);
            Vec2::new(v.x, v.y)
        };

        // Off-center projections shift every unprojection by the same offset.
        self.offset = unproject(0.0, 0.0);
        self.coef_x = unproject(-1.0, 0.0) - self.offset;
        self.coef_y = unproject(0.0, -1.0) - self.offset;
    }

    /// View-space ray through NDC `(x, y)`, scaled so that `z = -1`.
    ///
    /// Multiplying by a linear (positive) view depth yields the view-space
    /// position of the surface seen at that pixel.
    #[inline]
    #[must_use]
    pub fn ray(&self, ndc: Vec2) -> Vec3 {
        let xy = self.offset + self.coef_x * ndc.x + self.coef_y * ndc.y;
        Vec3::new(-xy.x, -xy.y, -1.0)
    }

    /// Half-extent of the view at unit depth along X and Y.
    ///
    /// Used to shape radial effects independently of the aspect ratio.
    #[inline]
    #[must_use]
    pub fn vignette_scale(&self) -> Vec2 {
        Vec2::new(self.coef_x.length(), self.coef_y.length())
    }
}

/// Computes [`ViewVectors`] for `projection`.
#[must_use]
pub fn compute_view_vector_coef_from_projection_matrix(projection: &Mat4) -> ViewVectors {
    let mut vectors = ViewVectors::default();
    vectors.update_from_projection(projection);
    vectors
}

/// Distance from the eye to the far clip plane, recovered from the
/// projection alone.
#[must_use]
pub fn far_depth_from_projection_matrix(projection: &Mat4) -> f32 {
    let v = projection.inverse() * Vec4::new(0.0, 0.0, 1.0, 1.0);
    -v.z / v.w
}
