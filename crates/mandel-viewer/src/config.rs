use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};

/// Deepest iteration count the fractal shader runs per pixel.
pub const MAX_STEPS: u32 = 1024;

/// Viewer settings. Defaults can be overridden from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Directory holding `mandelbrot.vert.wgsl` and `mandelbrot.frag.wgsl`.
    pub shader_dir: PathBuf,
    /// Overlay font; a system font is searched for when unset.
    pub font_path: Option<PathBuf>,
    pub font_size: f32,
    pub max_steps: u32,
    pub vsync: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            title: "Mandelbrot".to_string(),
            width: 1280,
            height: 720,
            shader_dir: PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders")),
            font_path: None,
            font_size: 16.0,
            max_steps: MAX_STEPS,
            vsync: true,
        }
    }
}

impl ViewerConfig {
    /// Defaults overridden by `MANDEL_SHADER_DIR`, `MANDEL_FONT`,
    /// `MANDEL_FONT_SIZE`, `MANDEL_MAX_STEPS` and `MANDEL_VSYNC`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(dir) = lookup("MANDEL_SHADER_DIR") {
            config.shader_dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup("MANDEL_FONT") {
            config.font_path = Some(PathBuf::from(path));
        }
        if let Some(size) = parsed::<f32>(&lookup, "MANDEL_FONT_SIZE")? {
            anyhow::ensure!(size > 0.0, "MANDEL_FONT_SIZE must be positive, got {size}");
            config.font_size = size;
        }
        if let Some(steps) = parsed::<u32>(&lookup, "MANDEL_MAX_STEPS")? {
            anyhow::ensure!(steps > 0, "MANDEL_MAX_STEPS must be at least 1");
            config.max_steps = steps;
        }
        if let Some(value) = lookup("MANDEL_VSYNC") {
            config.vsync = parse_flag(&value).with_context(|| format!("MANDEL_VSYNC={value}"))?;
        }

        Ok(config)
    }

    pub fn vertex_shader(&self) -> PathBuf {
        self.shader_dir.join("mandelbrot.vert.wgsl")
    }

    pub fn fragment_shader(&self) -> PathBuf {
        self.shader_dir.join("mandelbrot.frag.wgsl")
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|v| v.trim().parse::<T>().with_context(|| format!("{key}={v}")))
        .transpose()
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        other => anyhow::bail!("expected a boolean, got {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = ViewerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, ViewerConfig::default());
        assert_eq!(config.max_steps, 1024);
        assert!(config.vsync);
        assert!(config.vertex_shader().ends_with("shaders/mandelbrot.vert.wgsl"));
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = ViewerConfig::from_lookup(lookup(&[
            ("MANDEL_SHADER_DIR", "/tmp/sh"),
            ("MANDEL_FONT", "/tmp/mono.ttf"),
            ("MANDEL_FONT_SIZE", "22"),
            ("MANDEL_MAX_STEPS", " 256 "),
            ("MANDEL_VSYNC", "off"),
        ]))
        .unwrap();

        assert_eq!(config.fragment_shader(), PathBuf::from("/tmp/sh/mandelbrot.frag.wgsl"));
        assert_eq!(config.font_path, Some(PathBuf::from("/tmp/mono.ttf")));
        assert_eq!(config.font_size, 22.0);
        assert_eq!(config.max_steps, 256);
        assert!(!config.vsync);
    }

    #[test]
    fn malformed_values_are_errors() {
        let err = ViewerConfig::from_lookup(lookup(&[("MANDEL_MAX_STEPS", "lots")])).unwrap_err();
        assert!(format!("{err:#}").contains("MANDEL_MAX_STEPS=lots"));

        assert!(ViewerConfig::from_lookup(lookup(&[("MANDEL_MAX_STEPS", "0")])).is_err());
        assert!(ViewerConfig::from_lookup(lookup(&[("MANDEL_FONT_SIZE", "-3")])).is_err());
        assert!(ViewerConfig::from_lookup(lookup(&[("MANDEL_VSYNC", "maybe")])).is_err());
    }
}
