//! Image fetch dispatch.
//!
//! Layers never await a fetch. They hand a [`FetchRequest`] to an
//! [`ImageDispatcher`] and later receive a [`FetchCompletion`], which the
//! owner of the layer state applies with `RasterLayer::complete`.

use std::sync::Arc;

use bytes::Bytes;
use roxmltree::Document;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::error::WmsError;
use super::tile::TileKey;
use crate::http::{AsyncHttpClient, Credentials};
use crate::scene::Texture;

/// Default capacity of the completion channel.
pub const DEFAULT_COMPLETION_CHANNEL_CAPACITY: usize = 256;

/// One image fetch issued by a layer.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Name of the issuing layer.
    pub layer: String,
    pub key: TileKey,
    /// Generation of the layer instance at issue time.
    pub generation: u64,
    pub url: String,
    pub credentials: Option<Credentials>,
    /// Cancelled when the layer is torn down.
    pub cancel: CancellationToken,
}

impl FetchRequest {
    /// Completion for this request carrying `result`.
    pub fn complete(&self, result: Result<Texture, WmsError>) -> FetchCompletion {
        FetchCompletion {
            layer: self.layer.clone(),
            key: self.key,
            generation: self.generation,
            result,
        }
    }
}

/// Outcome of a fetch, routed back to its layer.
#[derive(Debug, Clone)]
pub struct FetchCompletion {
    pub layer: String,
    pub key: TileKey,
    pub generation: u64,
    pub result: Result<Texture, WmsError>,
}

/// Starts image fetches.
pub trait ImageDispatcher {
    fn dispatch(&self, request: FetchRequest);
}

/// Dispatcher spawning one tokio task per fetch and reporting on a channel.
pub struct TokioDispatcher<C> {
    client: Arc<C>,
    handle: Handle,
    completions: mpsc::Sender<FetchCompletion>,
}

impl<C> TokioDispatcher<C>
where
    C: AsyncHttpClient + 'static,
{
    /// Creates a dispatcher on the current runtime and the receiving end of
    /// its completion channel.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn new(client: Arc<C>) -> (Self, mpsc::Receiver<FetchCompletion>) {
        Self::with_handle(client, Handle::current(), DEFAULT_COMPLETION_CHANNEL_CAPACITY)
    }

    pub fn with_handle(
        client: Arc<C>,
        handle: Handle,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<FetchCompletion>) {
        let (completions, rx) = mpsc::channel(capacity);
        (
            Self {
                client,
                handle,
                completions,
            },
            rx,
        )
    }
}

impl<C> ImageDispatcher for TokioDispatcher<C>
where
    C: AsyncHttpClient + 'static,
{
    fn dispatch(&self, request: FetchRequest) {
        let client = Arc::clone(&self.client);
        let completions = self.completions.clone();

        self.handle.spawn(async move {
            let result = tokio::select! {
                biased;

                _ = request.cancel.cancelled() => Err(WmsError::Cancelled),
                result = fetch_image(client.as_ref(), &request.url, request.credentials.as_ref()) => result,
            };
            debug!(
                layer = %request.layer,
                key = %request.key,
                ok = result.is_ok(),
                "Image fetch finished"
            );
            // Receiver gone means the streamer shut down.
            let _ = completions.send(request.complete(result)).await;
        });
    }
}

/// Fetches and decodes one GetMap image.
pub async fn fetch_image<C>(
    client: &C,
    url: &str,
    credentials: Option<&Credentials>,
) -> Result<Texture, WmsError>
where
    C: AsyncHttpClient + ?Sized,
{
    let body = client.get(url, credentials).await?;
    decode_image(&body)
}

/// Decodes an image body into an RGBA8 texture.
///
/// WMS servers report errors as XML with a 200 status; such bodies become
/// [`WmsError::ServiceException`].
pub fn decode_image(body: &[u8]) -> Result<Texture, WmsError> {
    if let Some(message) = service_exception(body) {
        return Err(WmsError::ServiceException(message));
    }
    let image = image::load_from_memory(body).map_err(|e| WmsError::Decode(e.to_string()))?;
    let rgba = image.to_rgba8();
    Ok(Texture {
        width: rgba.width(),
        height: rgba.height(),
        pixels: Bytes::from(rgba.into_raw()),
    })
}

fn service_exception(body: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(body).ok()?;
    if !text.trim_start().starts_with('<') {
        return None;
    }
    let doc = Document::parse(text).ok()?;
    let message = doc
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "ServiceException")
        .map(|n| {
            let text = n.text().unwrap_or_default().trim();
            match n.attribute("code") {
                Some(code) if text.is_empty() => code.to_string(),
                Some(code) => format!("{}: {}", code, text),
                None => text.to_string(),
            }
        })
        .unwrap_or_else(|| format!("unexpected XML response <{}>", doc.root_element().tag_name().name()));
    Some(message)
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Mutex;

    use image::{ImageBuffer, ImageFormat, Rgba};

    use crate::http::{HttpError, MockAsyncHttpClient};

    /// Dispatcher that records requests instead of fetching.
    #[derive(Default)]
    pub struct RecordingDispatcher {
        requests: Mutex<Vec<FetchRequest>>,
    }

    impl RecordingDispatcher {
        pub fn new() -> Self {
            Self::default()
        }

        /// Takes all recorded requests.
        pub fn take(&self) -> Vec<FetchRequest> {
            std::mem::take(&mut *self.requests.lock().unwrap())
        }

        pub fn len(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    impl ImageDispatcher for RecordingDispatcher {
        fn dispatch(&self, request: FetchRequest) {
            self.requests.lock().unwrap().push(request);
        }
    }

    /// A small PNG body.
    pub fn png_bytes(width: u32, height: u32) -> Bytes {
        let img = ImageBuffer::from_pixel(width, height, Rgba([10u8, 20, 30, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        Bytes::from(out.into_inner())
    }

    #[test]
    fn test_decode_png() {
        let texture = decode_image(&png_bytes(4, 2)).unwrap();
        assert_eq!((texture.width, texture.height), (4, 2));
        assert_eq!(texture.pixels.len(), 4 * 2 * 4);
        assert_eq!(&texture.pixels[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn test_decode_service_exception() {
        let xml = br#"<?xml version="1.0"?>
            <ServiceExceptionReport version="1.3.0" xmlns="http://www.opengis.net/ogc">
              <ServiceException code="LayerNotDefined">unknown layer 'x'</ServiceException>
            </ServiceExceptionReport>"#;
        match decode_image(xml) {
            Err(WmsError::ServiceException(msg)) => {
                assert_eq!(msg, "LayerNotDefined: unknown layer 'x'")
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(decode_image(b"not an image"), Err(WmsError::Decode(_))));
    }

    #[tokio::test]
    async fn test_tokio_dispatcher_reports_completion() {
        let client = Arc::new(MockAsyncHttpClient::ok(png_bytes(2, 2)));
        let (dispatcher, mut rx) = TokioDispatcher::new(Arc::clone(&client));

        dispatcher.dispatch(FetchRequest {
            layer: "orto".to_string(),
            key: TileKey::Single,
            generation: 3,
            url: "http://host/wms?REQUEST=GetMap".to_string(),
            credentials: Some(Credentials::new("user", "secret")),
            cancel: CancellationToken::new(),
        });

        let completion = rx.recv().await.unwrap();
        assert_eq!(completion.layer, "orto");
        assert_eq!(completion.generation, 3);
        assert!(completion.result.is_ok());

        let requests = client.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].1.as_ref().map(|c| c.username.as_str()), Some("user"));
    }

    #[tokio::test]
    async fn test_tokio_dispatcher_cancelled() {
        let client = Arc::new(MockAsyncHttpClient::err(HttpError::Timeout("slow".into())));
        let (dispatcher, mut rx) = TokioDispatcher::new(client);
        let cancel = CancellationToken::new();
        cancel.cancel();

        dispatcher.dispatch(FetchRequest {
            layer: "orto".to_string(),
            key: TileKey::grid(500.0, 0, 0),
            generation: 0,
            url: "http://host/wms".to_string(),
            credentials: None,
            cancel,
        });

        let completion = rx.recv().await.unwrap();
        assert!(matches!(completion.result, Err(WmsError::Cancelled)));
    }

    #[tokio::test]
    async fn test_fetch_image_http_error() {
        let client = MockAsyncHttpClient::err(HttpError::Status {
            url: "http://host/wms".into(),
            status: 503,
        });
        let err = fetch_image(&client, "http://host/wms", None).await.unwrap_err();
        assert!(err.is_fetch_failure());
    }
}
