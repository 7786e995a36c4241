use glam::{Mat4, Vec3};

/// Orthographic camera a directional light renders its shadow map from.
///
/// Owned by the light. The light pass creates it on first use and refits it
/// in place every frame; only the light's owner ever removes it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowCamera {
    /// World -> light space.
    pub view_matrix: Mat4,
    /// Light space -> world (inverse of `view_matrix`).
    pub world_matrix: Mat4,
    pub projection_matrix: Mat4,
}

impl Default for ShadowCamera {
    fn default() -> Self {
        Self {
            view_matrix: Mat4::IDENTITY,
            world_matrix: Mat4::IDENTITY,
            projection_matrix: Mat4::orthographic_rh(-1.0, 1.0, -1.0, 1.0, 0.1, 2000.0),
        }
    }
}

impl ShadowCamera {
    #[inline]
    #[must_use]
    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix * self.view_matrix
    }
}

#[derive(Debug, Clone)]
pub struct DirectionalLight {
    /// Points from the scene towards the light; only its direction matters.
    pub position: Vec3,
    pub cast_shadow: bool,
    /// Distance the fitted shadow volume is extended past its `minZ` bound
    /// when the legacy extension policy is active.
    pub shadow_camera_near: f32,
    pub(crate) shadow_camera: Option<ShadowCamera>,
}

impl DirectionalLight {
    #[inline]
    #[must_use]
    pub fn shadow_camera(&self) -> Option<&ShadowCamera> {
        self.shadow_camera.as_ref()
    }

    /// Direction towards the light, or `None` for a zero-length position.
    #[must_use]
    pub fn direction(&self) -> Option<Vec3> {
        self.position.try_normalize()
    }
}

#[derive(Debug, Clone)]
pub struct PointLight {
    pub position: Vec3,
    pub range: f32,
}

/// Every light type the renderer knows about.
#[derive(Debug, Clone)]
pub enum LightKind {
    Directional(DirectionalLight),
    Ambient,
    Point(PointLight),
}

#[derive(Debug, Clone)]
pub struct Light {
    pub color: Vec3,
    pub intensity: f32,
    pub kind: LightKind,
}

impl Light {
    #[must_use]
    pub fn new_directional(color: Vec3, intensity: f32, position: Vec3) -> Self {
        Self {
            color,
            intensity,
            kind: LightKind::Directional(DirectionalLight {
                position,
                cast_shadow: false,
                shadow_camera_near: 0.5,
                shadow_camera: None,
            }),
        }
    }

    /// Ambient lights contribute their color unscaled by intensity.
    #[must_use]
    pub fn new_ambient(color: Vec3) -> Self {
        Self {
            color,
            intensity: 1.0,
            kind: LightKind::Ambient,
        }
    }

    #[must_use]
    pub fn new_point(color: Vec3, intensity: f32, position: Vec3, range: f32) -> Self {
        Self {
            color,
            intensity,
            kind: LightKind::Point(PointLight { position, range }),
        }
    }

    /// Enables shadow casting on directional lights; other kinds ignore it.
    #[must_use]
    pub fn with_shadow(mut self, shadow_camera_near: f32) -> Self {
        if let LightKind::Directional(light) = &mut self.kind {
            light.cast_shadow = true;
            light.shadow_camera_near = shadow_camera_near;
        }
        self
    }

    #[must_use]
    pub fn as_directional(&self) -> Option<&DirectionalLight> {
        match &self.kind {
            LightKind::Directional(light) => Some(light),
            _ => None,
        }
    }
}
