//! Shared helpers for unit tests.

use axum::Router;
use image::{DynamicImage, Rgb, RgbImage};

use crate::capture::{downsample, CaptureSettings, EncodedImage};

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn spawn_stub(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub listener");
    let addr = listener.local_addr().expect("stub address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("stub server");
    });
    format!("http://{addr}")
}

/// A URL nothing listens on.
pub async fn dead_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind throwaway listener");
    let addr = listener.local_addr().expect("throwaway listener address");
    drop(listener);
    format!("http://{addr}")
}

/// A small striped test frame.
pub fn sample_frame() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(64, 48, |x, _| {
        if x % 8 < 4 {
            Rgb([200, 40, 40])
        } else {
            Rgb([40, 40, 200])
        }
    }))
}

/// `sample_frame` downsampled the way captures are.
pub fn sample_jpeg() -> EncodedImage {
    downsample(&sample_frame(), &CaptureSettings::default()).expect("encode sample frame")
}
