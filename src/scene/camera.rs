use glam::{Affine3A, Mat4, Vec2, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionType {
    Perspective,
    Orthographic,
}

/// The viewpoint a frame is rendered from.
///
/// Right-handed, looking down -Z, with wgpu's `[0, 1]` clip depth.
#[derive(Debug, Clone)]
pub struct Camera {
    // === Projection ===
    pub projection_type: ProjectionType,
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub ortho_size: f32,

    // Cached matrices, read-only for the renderer
    pub(crate) world_matrix: Affine3A,
    pub(crate) view_matrix: Mat4,
    pub(crate) projection_matrix: Mat4,
    pub(crate) jitter: Vec2,
    pub(crate) jittered_projection_matrix: Mat4,
}

impl Camera {
    /// `fov` is the vertical field of view in degrees.
    #[must_use]
    pub fn new_perspective(fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut cam = Self {
            projection_type: ProjectionType::Perspective,
            fov: fov.to_radians(),
            aspect,
            near,
            far,
            ortho_size: 10.0,

            world_matrix: Affine3A::IDENTITY,
            view_matrix: Mat4::IDENTITY,
            projection_matrix: Mat4::IDENTITY,
            jitter: Vec2::ZERO,
            jittered_projection_matrix: Mat4::IDENTITY,
        };
        cam.update_projection_matrix();
        cam
    }

    pub fn update_projection_matrix(&mut self) {
        self.projection_matrix = match self.projection_type {
            ProjectionType::Perspective => {
                Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far)
            }
            ProjectionType::Orthographic => {
                let w = self.ortho_size * self.aspect;
                let h = self.ortho_size;
                Mat4::orthographic_rh(-w, w, -h, h, self.near, self.far)
            }
        };
        self.update_jittered_projection();
    }

    pub fn update_view_projection(&mut self, world_transform: &Affine3A) {
        self.world_matrix = *world_transform;
        self.view_matrix = Mat4::from(*world_transform).inverse();
    }

    /// Places the camera at `eye` looking at `target`.
    pub fn look_at(&mut self, eye: Vec3, target: Vec3, up: Vec3) {
        let view = Mat4::look_at_rh(eye, target, up);
        self.world_matrix = Affine3A::from_mat4(view.inverse());
        self.view_matrix = view;
    }

    /// Sets the sub-pixel clip-space offset used for temporal anti-aliasing.
    pub fn set_jitter(&mut self, jitter: Vec2) {
        self.jitter = jitter;
        self.update_jittered_projection();
    }

    fn update_jittered_projection(&mut self) {
        let mut projection = self.projection_matrix;
        match self.projection_type {
            ProjectionType::Perspective => {
                projection.z_axis.x += self.jitter.x;
                projection.z_axis.y += self.jitter.y;
            }
            ProjectionType::Orthographic => {
                projection.w_axis.x += self.jitter.x;
                projection.w_axis.y += self.jitter.y;
            }
        }
        self.jittered_projection_matrix = projection;
    }

    #[inline]
    #[must_use]
    pub fn world_matrix(&self) -> Mat4 {
        Mat4::from(self.world_matrix)
    }

    #[inline]
    #[must_use]
    pub fn view_matrix(&self) -> Mat4 {
        self.view_matrix
    }

    #[inline]
    #[must_use]
    pub fn projection_matrix(&self) -> Mat4 {
        self.projection_matrix
    }

    #[inline]
    #[must_use]
    pub fn jittered_projection_matrix(&self) -> Mat4 {
        self.jittered_projection_matrix
    }

    #[inline]
    #[must_use]
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix * self.view_matrix
    }

    #[inline]
    #[must_use]
    pub fn world_position(&self) -> Vec3 {
        Vec3::from(self.world_matrix.translation)
    }
}
