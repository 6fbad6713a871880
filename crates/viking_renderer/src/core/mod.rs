//! Core configuration types

pub mod config;

pub use config::{
    ApplicationConfig, AssetConfig, CameraPreset, EngineConfig, ModelLayout, ShaderConfig,
    VulkanRendererConfig,
};
