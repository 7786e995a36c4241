//! Shadow Utilities
//!
//! Pure math for fitting a directional light's orthographic shadow camera to
//! the visible camera frustum, extracted from the light pass for reuse and
//! testability.
//!
//! # Provided Functions
//!
//! - Frustum fit points (four far-plane corners plus the eye) in world space
//! - Orthonormal light basis with axis-degeneracy avoidance
//! - Axis-aligned light-space bounds of a point set
//! - Orthographic shadow camera construction from those bounds
//! - Camera-view-space to shadow-texture-space matrix

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::scene::ShadowCamera;

use super::view_vectors::ViewVectors;

/// Number of points the shadow volume is fitted around.
pub const FRUSTUM_FIT_POINT_COUNT: usize = 5;

/// Maps clip space to shadow texture space.
///
/// X/Y go from `[-1, 1]` to `[0, 1]` with V pointing down as texture
/// coordinates do. Depth is already in `[0, 1]` and passes through.
pub const CLIP_TO_TEXTURE: Mat4 = Mat4::from_cols_array(&[
    0.5, 0.0, 0.0, 0.0, //
    0.0, -0.5, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.5, 0.5, 0.0, 1.0,
]);

// ============================================================================
// Frustum Fit Points
// ============================================================================

/// Writes the four far-plane frustum corners and the eye position, in world
/// space, into `out`. The eye is always the last point.
pub fn compute_frustum_fit_points(
    view_vectors: &ViewVectors,
    far: f32,
    camera_world: &Mat4,
    out: &mut [Vec3; FRUSTUM_FIT_POINT_COUNT],
) {
    for (i, corner) in out.iter_mut().take(4).enumerate() {
        let ndc = Vec2::new(
            if i & 1 != 0 { 1.0 } else { -1.0 },
            if i & 2 != 0 { 1.0 } else { -1.0 },
        );
        *corner = camera_world.transform_point3(view_vectors.ray(ndc) * far);
    }
    out[4] = camera_world.transform_point3(Vec3::ZERO);
}

// ============================================================================
// Light Basis & Bounds
// ============================================================================

/// Orthonormal basis spanning the shadow map plane (`tex_u`, `tex_v`) and
/// the direction towards the light (`light_dir`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightBasis {
    pub tex_u: Vec3,
    pub tex_v: Vec3,
    pub light_dir: Vec3,
}

impl LightBasis {
    /// Builds the basis for a light placed towards `position`.
    ///
    /// The seed axis is world X when the light is mostly aligned with Z and
    /// world Z otherwise, so the cross products never degenerate.
    /// Returns `None` for a zero-length position.
    #[must_use]
    pub fn from_light_position(position: Vec3) -> Option<Self> {
        let light_dir = position.try_normalize()?;
        let seed = if light_dir.z.abs() > 0.5 { Vec3::X } else { Vec3::Z };

        let u = seed.cross(light_dir).normalize();
        let tex_v = u.cross(light_dir).normalize();
        let tex_u = tex_v.cross(light_dir);

        Some(Self {
            tex_u,
            tex_v,
            light_dir,
        })
    }

    /// Light-space coordinates of `point`: texture U, texture V and depth
    /// along the light's travel direction.
    #[inline]
    #[must_use]
    pub fn project(&self, point: Vec3) -> Vec3 {
        Vec3::new(
            point.dot(self.tex_u),
            point.dot(self.tex_v),
            -point.dot(self.light_dir),
        )
    }
}

/// Axis-aligned bounds in light space. Smaller Z is closer to the light, so
/// `min.z` is the near plane of the shadow camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSpaceBounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl LightSpaceBounds {
    /// Tight bounds of `points` projected into `basis`.
    ///
    /// Returns `None` for an empty slice.
    #[must_use]
    pub fn fit(basis: &LightBasis, points: &[Vec3]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let first = basis.project(*first);
        let mut bounds = Self {
            min: first,
            max: first,
        };
        for p in rest {
            let p = basis.project(*p);
            bounds.min = bounds.min.min(p);
            bounds.max = bounds.max.max(p);
        }
        Some(bounds)
    }

    /// Moves the near plane `distance` further towards the light so casters
    /// between the light and the fitted volume still reach the shadow map.
    pub fn extend_near(&mut self, distance: f32) {
        self.min.z -= distance;
    }

    #[inline]
    #[must_use]
    pub fn center_xy(&self) -> Vec2 {
        Vec2::new(
            (self.min.x + self.max.x) * 0.5,
            (self.min.y + self.max.y) * 0.5,
        )
    }

    #[must_use]
    pub fn contains(&self, light_space_point: Vec3, epsilon: f32) -> bool {
        light_space_point.cmpge(self.min - Vec3::splat(epsilon)).all()
            && light_space_point.cmple(self.max + Vec3::splat(epsilon)).all()
    }
}

// ============================================================================
// Shadow Camera
// ============================================================================

/// Writes an orthographic camera enclosing `bounds` into `camera`.
///
/// The view matrix rotates world space into `basis` and recenters X/Y on the
/// bounds; depth 0 maps to `min.z` (nearest the light), depth 1 to `max.z`.
pub fn fit_shadow_camera(camera: &mut ShadowCamera, basis: &LightBasis, bounds: &LightSpaceBounds) {
    let mid = bounds.center_xy();

    let rows = Mat4::from_cols(
        basis.tex_u.extend(-mid.x),
        basis.tex_v.extend(-mid.y),
        basis.light_dir.extend(0.0),
        Vec4::W,
    );
    camera.view_matrix = rows.transpose();
    camera.world_matrix = camera.view_matrix.inverse();
    camera.projection_matrix = Mat4::orthographic_rh(
        bounds.min.x - mid.x,
        bounds.max.x - mid.x,
        bounds.min.y - mid.y,
        bounds.max.y - mid.y,
        bounds.min.z,
        bounds.max.z,
    );
}

/// Matrix taking a point from the *viewing camera's* view space to the
/// shadow map's texture space (`[0, 1]` UV and depth).
#[must_use]
pub fn shadow_map_matrix(shadow_camera: &ShadowCamera, camera_world: &Mat4) -> Mat4 {
    CLIP_TO_TEXTURE * shadow_camera.view_projection() * *camera_world
}
