//! Synthetic `stub://` frame source.
//!
//! URL form: `stub://<name>?frames=N&width=W&height=H`. Every query key is
//! optional. Frames are deterministic gradients that change every frame.

use anyhow::{anyhow, Result};

use super::FrameSource;
use crate::frame::Frame;

pub const STUB_SCHEME: &str = "stub://";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyntheticConfig {
    pub url: String,
    pub frames: u64,
    pub width: u32,
    pub height: u32,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            url: format!("{}classroom", STUB_SCHEME),
            frames: 120,
            width: 640,
            height: 480,
        }
    }
}

impl SyntheticConfig {
    pub fn parse(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix(STUB_SCHEME)
            .ok_or_else(|| anyhow!("synthetic sources use the {} scheme", STUB_SCHEME))?;
        let mut cfg = Self {
            url: url.to_string(),
            ..Self::default()
        };
        let Some((_, query)) = rest.split_once('?') else {
            return Ok(cfg);
        };
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("malformed stub query parameter '{}'", pair))?;
            let parse_err = || anyhow!("stub parameter '{}' must be an integer", key);
            match key {
                "frames" => cfg.frames = value.parse().map_err(|_| parse_err())?,
                "width" => cfg.width = value.parse().map_err(|_| parse_err())?,
                "height" => cfg.height = value.parse().map_err(|_| parse_err())?,
                other => return Err(anyhow!("unknown stub parameter '{}'", other)),
            }
        }
        if cfg.width == 0 || cfg.height == 0 {
            return Err(anyhow!("stub frame size must be non-zero"));
        }
        Ok(cfg)
    }
}

pub struct SyntheticSource {
    config: SyntheticConfig,
    frame_count: u64,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        log::info!(
            "SyntheticSource: opened {} ({} frames, {}x{})",
            config.url,
            config.frames,
            config.width,
            config.height
        );
        Self {
            config,
            frame_count: 0,
        }
    }

    pub fn open(url: &str) -> Result<Self> {
        Ok(Self::new(SyntheticConfig::parse(url)?))
    }

    fn generate_pixels(&self) -> Vec<u8> {
        let (width, height) = (self.config.width as u64, self.config.height as u64);
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                let shift = self.frame_count * 3;
                pixels.push(((x + shift) % 256) as u8);
                pixels.push(((y + shift) % 256) as u8);
                pixels.push(((x + y + self.frame_count) % 256) as u8);
            }
        }
        pixels
    }
}

impl FrameSource for SyntheticSource {
    fn describe(&self) -> &str {
        &self.config.url
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.frame_count >= self.config.frames {
            return Ok(None);
        }
        let pixels = self.generate_pixels();
        self.frame_count += 1;
        Frame::new(pixels, self.config.width, self.config.height).map(Some)
    }

    fn frames_read(&self) -> u64 {
        self.frame_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_query_parameters() {
        let cfg = SyntheticConfig::parse("stub://room1?frames=5&width=32&height=16").unwrap();
        assert_eq!(cfg.frames, 5);
        assert_eq!((cfg.width, cfg.height), (32, 16));

        let defaults = SyntheticConfig::parse("stub://room1").unwrap();
        assert_eq!(defaults.frames, 120);
        assert_eq!(defaults.url, "stub://room1");
    }

    #[test]
    fn rejects_bad_queries() {
        assert!(SyntheticConfig::parse("stub://x?frames=abc").is_err());
        assert!(SyntheticConfig::parse("stub://x?fps=3").is_err());
        assert!(SyntheticConfig::parse("stub://x?width=0").is_err());
        assert!(SyntheticConfig::parse("file:///x").is_err());
    }

    #[test]
    fn ends_after_configured_frames() {
        let mut source = SyntheticSource::open("stub://x?frames=3&width=8&height=4").unwrap();
        let first = source.next_frame().unwrap().unwrap();
        let second = source.next_frame().unwrap().unwrap();
        assert_ne!(first, second);
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_none());
        assert_eq!(source.frames_read(), 3);
    }
}
