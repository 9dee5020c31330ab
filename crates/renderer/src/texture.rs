//! Background texture loading off the render thread.
//!
//! Decoding runs on a short-lived worker thread and hands the pixels back
//! through a bounded channel. The render thread only ever polls; a load that
//! never resolves simply keeps its surface in the pending state.

use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use image::imageops::FilterType;
use image::GenericImageView;

use crate::error::RenderError;
use crate::types::TextureData;

type LoadResult = std::result::Result<TextureData, String>;

#[derive(Debug)]
pub enum TexturePoll {
    Pending,
    Ready(TextureData),
    Failed(RenderError),
}

/// In-flight decode of one image file.
pub struct TextureLoad {
    source: Option<PathBuf>,
    receiver: Receiver<LoadResult>,
    // Keeps the channel open for loads that are meant to stay pending.
    _keepalive: Option<Sender<LoadResult>>,
}

impl TextureLoad {
    /// Starts decoding `path`, downscaling so neither edge exceeds
    /// `max_dimension`.
    pub fn spawn(path: impl Into<PathBuf>, max_dimension: u32) -> Result<Self, RenderError> {
        let path = path.into();
        let (sender, receiver) = bounded(1);
        let worker_path = path.clone();
        thread::Builder::new()
            .name("texture-decode".into())
            .spawn(move || {
                let result = decode_texture(&worker_path, max_dimension).map_err(|err| format!("{err:#}"));
                let _ = sender.send(result);
            })
            .map_err(|err| RenderError::AsyncLoad(format!("failed to start decoder thread: {err}")))?;
        tracing::debug!(path = %path.display(), "background texture load started");
        Ok(Self {
            source: Some(path),
            receiver,
            _keepalive: None,
        })
    }

    /// A load that never completes.
    pub fn never() -> Self {
        let (sender, receiver) = bounded(1);
        Self {
            source: None,
            receiver,
            _keepalive: Some(sender),
        }
    }

    /// Wraps an externally driven channel.
    pub fn from_receiver(receiver: Receiver<LoadResult>) -> Self {
        Self {
            source: None,
            receiver,
            _keepalive: None,
        }
    }

    /// Non-blocking check for the decoded image.
    pub fn poll(&mut self) -> TexturePoll {
        match self.receiver.try_recv() {
            Ok(Ok(data)) => TexturePoll::Ready(data),
            Ok(Err(message)) => TexturePoll::Failed(RenderError::AsyncLoad(message)),
            Err(TryRecvError::Empty) => TexturePoll::Pending,
            Err(TryRecvError::Disconnected) => TexturePoll::Failed(RenderError::AsyncLoad(
                "texture decoder disconnected before returning a result".into(),
            )),
        }
    }
}

impl std::fmt::Debug for TextureLoad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureLoad")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// Decodes `path` into RGBA8, fitting it within `max_dimension`.
pub fn decode_texture(path: &Path, max_dimension: u32) -> Result<TextureData> {
    let image = image::open(path).with_context(|| format!("failed to open image {}", path.display()))?;
    let (width, height) = image.dimensions();
    let limit = max_dimension.max(1);
    let image = if width > limit || height > limit {
        tracing::info!(
            path = %path.display(),
            width,
            height,
            limit,
            "downscaling background texture to device limit"
        );
        image.resize(limit, limit, FilterType::Triangle)
    } else {
        image
    };
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(TextureData {
        width,
        height,
        rgba: rgba.into_raw(),
    })
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use image::{Rgba, RgbaImage};
    use tempfile::tempdir;

    use super::*;

    fn wait(load: &mut TextureLoad) -> TexturePoll {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            match load.poll() {
                TexturePoll::Pending if Instant::now() < deadline => {
                    thread::sleep(Duration::from_millis(5));
                }
                other => return other,
            }
        }
    }

    #[test]
    fn decodes_png_on_worker() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bg.png");
        RgbaImage::from_pixel(4, 2, Rgba([10, 20, 30, 255])).save(&path).unwrap();

        let mut load = TextureLoad::spawn(&path, 64).unwrap();
        match wait(&mut load) {
            TexturePoll::Ready(data) => {
                assert_eq!((data.width, data.height), (4, 2));
                assert_eq!(&data.rgba[..4], &[10, 20, 30, 255]);
            }
            other => panic!("unexpected poll result {other:?}"),
        }
    }

    #[test]
    fn large_images_are_downscaled() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wide.png");
        RgbaImage::from_pixel(16, 4, Rgba([255, 255, 255, 255])).save(&path).unwrap();
        let data = decode_texture(&path, 8).unwrap();
        assert_eq!((data.width, data.height), (8, 2));
        assert_eq!(data.rgba.len(), 8 * 2 * 4);
    }

    #[test]
    fn missing_file_fails() {
        let dir = tempdir().unwrap();
        let mut load = TextureLoad::spawn(dir.path().join("missing.png"), 64).unwrap();
        assert!(matches!(wait(&mut load), TexturePoll::Failed(RenderError::AsyncLoad(_))));
    }

    #[test]
    fn never_stays_pending() {
        let mut load = TextureLoad::never();
        for _ in 0..100 {
            assert!(matches!(load.poll(), TexturePoll::Pending));
        }
    }
}
