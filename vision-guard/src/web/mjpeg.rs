use crate::detect::pipeline::MediaProcessor;
use bytes::{BufMut, Bytes, BytesMut};
use futures::Stream;
use log::{info, warn};
use std::sync::Arc;
use std::thread;
use tokio::sync::mpsc;
use vision_media::VideoSource;

pub const CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Frames buffered between the camera thread and the HTTP body.
const FEED_CAPACITY: usize = 2;

pub fn frame_part(jpeg: &[u8]) -> Bytes {
    let mut part = BytesMut::with_capacity(jpeg.len() + 48);
    part.put_slice(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n");
    part.put_slice(jpeg);
    part.put_slice(b"\r\n");
    part.freeze()
}

/// Run the processor's live loop on its own thread and expose it as a body stream.
///
/// Dropping the stream closes the channel, which ends the loop and releases the camera.
pub fn live_stream(
    processor: Arc<dyn MediaProcessor>,
    source: VideoSource,
) -> impl Stream<Item = Result<Bytes, actix_web::Error>> {
    let (tx, rx) = mpsc::channel::<Bytes>(FEED_CAPACITY);

    let spawned = thread::Builder::new().name("live-feed".to_string()).spawn(move || {
        let mut sink = |jpeg: Vec<u8>| tx.blocking_send(frame_part(&jpeg)).is_ok();
        match processor.stream_mjpeg(&source, &mut sink) {
            Ok(()) => info!("Live feed for {source} closed"),
            Err(err) => warn!("Live feed for {source} failed: {err:#}"),
        }
    });
    if let Err(err) = spawned {
        warn!("Unable to start live feed thread: {err}");
    }

    futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|part| (Ok(part), rx))
    })
}
