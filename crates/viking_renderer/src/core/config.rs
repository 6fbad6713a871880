//! # Application Configuration
//!
//! Every tunable the viewer reads at startup: window and Vulkan instance
//! settings, shader and asset locations, and the camera preset tied to the
//! selected model layout.
//!
//! Configuration is plain `serde` data and loads from `.toml` or `.ron`
//! through [`Config`].

use serde::{Deserialize, Serialize};

use crate::foundation::math::Vec3;

pub use crate::config::{Config, ConfigError};

/// # Shader Configuration
///
/// Locations of the pre-compiled SPIR-V blobs for the single graphics pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderConfig {
    /// Path to the vertex shader SPIR-V file
    pub vertex_shader_path: String,
    /// Path to the fragment shader SPIR-V file
    pub fragment_shader_path: String,
}

impl ShaderConfig {
    /// Create a new shader configuration
    pub fn new(vertex_path: impl Into<String>, fragment_path: impl Into<String>) -> Self {
        Self {
            vertex_shader_path: vertex_path.into(),
            fragment_shader_path: fragment_path.into(),
        }
    }
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self::new("shaders/vert.spv", "shaders/frag.spv")
    }
}

/// # Vulkan Renderer Configuration
///
/// Window and instance settings plus frame pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VulkanRendererConfig {
    /// Application name, used for the window title and Vulkan instance
    pub application_name: String,
    /// Initial framebuffer width
    pub window_width: u32,
    /// Initial framebuffer height
    pub window_height: u32,
    /// Shader configuration
    pub shaders: ShaderConfig,
    /// Number of frames the CPU may record ahead of the GPU
    pub max_frames_in_flight: usize,
    /// Whether to enable Vulkan validation layers (`None` follows the build type)
    pub enable_validation: Option<bool>,
}

impl VulkanRendererConfig {
    /// Create a new renderer configuration
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            application_name: app_name.into(),
            window_width: 800,
            window_height: 600,
            shaders: ShaderConfig::default(),
            max_frames_in_flight: 2,
            enable_validation: None,
        }
    }

    /// Set the initial window size
    pub fn with_window_size(mut self, width: u32, height: u32) -> Self {
        self.window_width = width;
        self.window_height = height;
        self
    }

    /// Set custom shader configuration
    pub fn with_shaders(mut self, shaders: ShaderConfig) -> Self {
        self.shaders = shaders;
        self
    }

    /// Set maximum frames in flight
    pub fn with_max_frames_in_flight(mut self, frames: usize) -> Self {
        self.max_frames_in_flight = frames;
        self
    }

    /// Enable or disable validation layers
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.enable_validation = Some(enabled);
        self
    }

    /// Whether validation layers should be requested for this build
    pub fn validation_enabled(&self) -> bool {
        self.enable_validation.unwrap_or(cfg!(debug_assertions))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.application_name.is_empty() {
            return Err("Application name cannot be empty".to_string());
        }

        if self.window_width == 0 || self.window_height == 0 {
            return Err(format!(
                "Window size must be non-zero, got {}x{}",
                self.window_width, self.window_height
            ));
        }

        if self.max_frames_in_flight == 0 {
            return Err("Max frames in flight must be at least 1".to_string());
        }

        if self.max_frames_in_flight > 8 {
            return Err("Max frames in flight should not exceed 8".to_string());
        }

        Ok(())
    }
}

impl Default for VulkanRendererConfig {
    fn default() -> Self {
        Self::new("Vulkan Application")
    }
}

/// # Engine Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default log level, overridden by `RUST_LOG`
    pub log_level: String,
}

impl EngineConfig {
    /// Parsed log level, falling back to `Info` for unknown names
    pub fn level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Which of the bundled model layouts is being displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelLayout {
    /// Small room model, viewed from close by
    VikingRoom,
    /// Larger house model, viewed from further away with a wider lens
    VikingHouse,
}

impl ModelLayout {
    /// Layout selected at build time through the `viking-house` feature
    pub const fn build_default() -> Self {
        if cfg!(feature = "viking-house") {
            Self::VikingHouse
        } else {
            Self::VikingRoom
        }
    }

    /// Camera preset matching the layout
    pub fn camera_preset(self) -> CameraPreset {
        match self {
            Self::VikingRoom => CameraPreset::viking_room(),
            Self::VikingHouse => CameraPreset::viking_house(),
        }
    }

    fn default_model_path(self) -> &'static str {
        match self {
            Self::VikingRoom => "models/viking_room.obj",
            Self::VikingHouse => "models/viking_house.obj",
        }
    }

    fn default_texture_path(self) -> &'static str {
        match self {
            Self::VikingRoom => "textures/viking_room.png",
            Self::VikingHouse => "textures/viking_house.png",
        }
    }
}

impl Default for ModelLayout {
    fn default() -> Self {
        Self::build_default()
    }
}

/// Fixed camera used by the uniform update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraPreset {
    /// Eye position in world space
    pub eye: Vec3,
    /// Point the camera looks at
    pub target: Vec3,
    /// World up direction
    pub up: Vec3,
    /// Vertical field of view in degrees
    pub fov_y_degrees: f32,
    /// Near clip plane distance
    pub near: f32,
    /// Far clip plane distance
    pub far: f32,
}

impl CameraPreset {
    /// Camera for the viking room model
    pub fn viking_room() -> Self {
        Self {
            eye: Vec3::new(2.0, 2.0, 2.0),
            target: Vec3::zeros(),
            up: Vec3::z(),
            fov_y_degrees: 45.0,
            near: 0.1,
            far: 10.0,
        }
    }

    /// Camera for the viking house model
    pub fn viking_house() -> Self {
        Self {
            eye: Vec3::new(0.0, -14.0, 6.0),
            target: Vec3::zeros(),
            up: Vec3::z(),
            fov_y_degrees: 60.0,
            near: 0.1,
            far: 100.0,
        }
    }

    /// Validate the clip planes and field of view
    pub fn validate(&self) -> Result<(), String> {
        if !(self.near > 0.0 && self.far > self.near) {
            return Err(format!(
                "Camera clip planes must satisfy 0 < near < far, got near={} far={}",
                self.near, self.far
            ));
        }
        if !(self.fov_y_degrees > 0.0 && self.fov_y_degrees < 180.0) {
            return Err(format!("Camera fov must be in (0, 180), got {}", self.fov_y_degrees));
        }
        if (self.eye - self.target).norm() == 0.0 {
            return Err("Camera eye and target must differ".to_string());
        }
        Ok(())
    }
}

/// # Asset Configuration
///
/// Model and texture locations for the selected layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetConfig {
    /// Selected model layout
    #[serde(default)]
    pub layout: ModelLayout,
    /// OBJ model path; `None` draws the built-in two-layer quad mesh
    #[serde(default)]
    pub model_path: Option<String>,
    /// Texture image path
    pub texture_path: String,
    /// Camera override; `None` uses the layout's preset
    #[serde(default)]
    pub camera: Option<CameraPreset>,
}

impl AssetConfig {
    /// Default asset locations for a layout
    pub fn for_layout(layout: ModelLayout) -> Self {
        Self {
            layout,
            model_path: Some(layout.default_model_path().to_string()),
            texture_path: layout.default_texture_path().to_string(),
            camera: None,
        }
    }

    /// Camera to render with
    pub fn camera(&self) -> CameraPreset {
        self.camera.clone().unwrap_or_else(|| self.layout.camera_preset())
    }
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self::for_layout(ModelLayout::build_default())
    }
}

/// # Complete Application Configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Engine core configuration
    pub engine: EngineConfig,
    /// Rendering system configuration
    pub renderer: VulkanRendererConfig,
    /// Asset configuration
    pub assets: AssetConfig,
}

impl ApplicationConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.renderer.validate().map_err(ConfigError::Invalid)?;
        self.assets.camera().validate().map_err(ConfigError::Invalid)?;
        Ok(())
    }
}

impl Config for ApplicationConfig {}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_renderer_defaults() {
        let config = VulkanRendererConfig::default();
        assert_eq!(config.application_name, "Vulkan Application");
        assert_eq!((config.window_width, config.window_height), (800, 600));
        assert_eq!(config.max_frames_in_flight, 2);
        assert_eq!(config.shaders.vertex_shader_path, "shaders/vert.spv");
        assert_eq!(config.shaders.fragment_shader_path, "shaders/frag.spv");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_renderer_validation_rejects_bad_values() {
        assert!(VulkanRendererConfig::new("").validate().is_err());
        assert!(VulkanRendererConfig::default().with_max_frames_in_flight(0).validate().is_err());
        assert!(VulkanRendererConfig::default().with_max_frames_in_flight(9).validate().is_err());
        assert!(VulkanRendererConfig::default().with_window_size(0, 600).validate().is_err());
    }

    #[test]
    fn test_camera_presets_differ_by_layout() {
        let room = ModelLayout::VikingRoom.camera_preset();
        let house = ModelLayout::VikingHouse.camera_preset();

        assert_relative_eq!(room.eye, Vec3::new(2.0, 2.0, 2.0));
        assert_relative_eq!(room.fov_y_degrees, 45.0);
        assert_relative_eq!(room.far, 10.0);

        assert_ne!(room.eye, house.eye);
        assert!(house.fov_y_degrees > room.fov_y_degrees);
        assert!(house.far > room.far);
        assert!(room.validate().is_ok());
        assert!(house.validate().is_ok());
    }

    #[test]
    fn test_asset_camera_override() {
        let mut assets = AssetConfig::for_layout(ModelLayout::VikingRoom);
        assert_eq!(assets.camera(), CameraPreset::viking_room());

        let custom = CameraPreset {
            far: 50.0,
            ..CameraPreset::viking_room()
        };
        assets.camera = Some(custom.clone());
        assert_eq!(assets.camera(), custom);
    }

    #[test]
    fn test_layout_paths() {
        let house = AssetConfig::for_layout(ModelLayout::VikingHouse);
        assert_eq!(house.model_path.as_deref(), Some("models/viking_house.obj"));
        assert_eq!(house.texture_path, "textures/viking_house.png");
    }

    #[test]
    fn test_toml_round_trip_keeps_layout() {
        let mut config = ApplicationConfig::default();
        config.assets = AssetConfig::for_layout(ModelLayout::VikingHouse);

        let text = toml::to_string_pretty(&config).unwrap();
        assert!(text.contains("viking_house"));

        let parsed: ApplicationConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.assets.layout, ModelLayout::VikingHouse);
        assert_eq!(parsed.renderer.application_name, "Vulkan Application");
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let parsed: ApplicationConfig = toml::from_str(
            r#"
            [engine]
            log_level = "debug"

            [assets]
            layout = "viking_room"
            texture_path = "textures/custom.png"
            "#,
        )
        .unwrap();

        assert_eq!(parsed.engine.level_filter(), log::LevelFilter::Debug);
        assert_eq!(parsed.assets.texture_path, "textures/custom.png");
        assert!(parsed.assets.model_path.is_none());
        assert_eq!(parsed.renderer.max_frames_in_flight, 2);
        assert!(parsed.validate().is_ok());
    }
}
