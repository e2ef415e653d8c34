use detection_service::{framing, Detection, DetectionError, ModelService, ReplyServer};
use image::{DynamicImage, ImageBuffer, Rgb};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};

const MAX_FRAME_BYTES: u32 = 1024 * 1024;

struct FixedDetector {
    detections: Vec<Detection>,
}

impl ModelService for FixedDetector {
    fn detect(&self, _image: &DynamicImage) -> Result<Vec<Detection>, DetectionError> {
        Ok(self.detections.clone())
    }
}

struct CountingDetector {
    calls: AtomicUsize,
}

impl ModelService for CountingDetector {
    fn detect(&self, _image: &DynamicImage) -> Result<Vec<Detection>, DetectionError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![Detection {
            label: format!("call-{}", n),
            confidence: 0.9,
            bbox: [0, 0, 1, 1],
        }])
    }
}

async fn spawn_server<M: ModelService>(model: M) -> std::net::SocketAddr {
    let server = ReplyServer::bind("127.0.0.1:0", model, MAX_FRAME_BYTES)
        .await
        .expect("failed to bind test server");
    let addr = server.local_addr().expect("no local addr");
    tokio::spawn(server.run());
    addr
}

fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(width, height, Rgb([128, 128, 128]));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Jpeg)
        .expect("failed to encode fixture");
    bytes
}

async fn request(stream: &mut TcpStream, payload: &[u8]) -> Vec<u8> {
    framing::write_frame(stream, payload)
        .await
        .expect("write failed");
    framing::read_frame(stream, MAX_FRAME_BYTES)
        .await
        .expect("read failed")
}

#[tokio::test]
async fn frame_with_no_objects_replies_with_empty_array() {
    let addr = spawn_server(FixedDetector { detections: vec![] }).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let reply = request(&mut stream, &jpeg_bytes(640, 480)).await;
    assert_eq!(reply, b"[]");
}

#[tokio::test]
async fn detections_round_trip_as_json() {
    let expected = vec![Detection {
        label: "person".to_string(),
        confidence: 0.92,
        bbox: [10, 20, 110, 220],
    }];
    let addr = spawn_server(FixedDetector {
        detections: expected.clone(),
    })
    .await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let reply = request(&mut stream, &jpeg_bytes(640, 480)).await;
    let decoded: Vec<Detection> = serde_json::from_slice(&reply).unwrap();
    assert_eq!(decoded, expected);
}

#[tokio::test]
async fn invalid_frame_gets_error_reply_and_the_loop_survives() {
    let addr = spawn_server(FixedDetector { detections: vec![] }).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let reply = request(&mut stream, b"definitely not an image").await;
    let value: serde_json::Value = serde_json::from_slice(&reply).unwrap();
    assert!(value["error"]
        .as_str()
        .expect("error field missing")
        .contains("decode"));
    assert_eq!(value["detections"], serde_json::json!([]));

    // The next cycle on the same connection is still served.
    let reply = request(&mut stream, &jpeg_bytes(64, 48)).await;
    assert_eq!(reply, b"[]");
}

#[tokio::test]
async fn empty_frame_gets_error_reply() {
    let addr = spawn_server(FixedDetector { detections: vec![] }).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let reply = request(&mut stream, b"").await;
    let value: serde_json::Value = serde_json::from_slice(&reply).unwrap();
    assert!(value["error"].is_string());
}

#[tokio::test]
async fn one_reply_per_request_in_request_order() {
    let addr = spawn_server(CountingDetector {
        calls: AtomicUsize::new(0),
    })
    .await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let frame = jpeg_bytes(32, 32);

    // Two requests written back to back before any reply is read.
    framing::write_frame(&mut stream, &frame).await.unwrap();
    framing::write_frame(&mut stream, &frame).await.unwrap();

    let first = framing::read_frame(&mut stream, MAX_FRAME_BYTES)
        .await
        .unwrap();
    let second = framing::read_frame(&mut stream, MAX_FRAME_BYTES)
        .await
        .unwrap();

    let first: Vec<Detection> = serde_json::from_slice(&first).unwrap();
    let second: Vec<Detection> = serde_json::from_slice(&second).unwrap();
    assert_eq!(first[0].label, "call-0");
    assert_eq!(second[0].label, "call-1");
}

#[tokio::test]
async fn second_client_waits_until_the_first_disconnects() {
    let addr = spawn_server(FixedDetector { detections: vec![] }).await;
    let frame = jpeg_bytes(32, 32);

    // First client completes a cycle, so the server is committed to it.
    let mut first = TcpStream::connect(addr).await.unwrap();
    let reply = request(&mut first, &frame).await;
    assert_eq!(reply, b"[]");

    // Second client's request is not read while the first is connected.
    let mut second = TcpStream::connect(addr).await.unwrap();
    framing::write_frame(&mut second, &frame).await.unwrap();
    let blocked = timeout(
        Duration::from_millis(200),
        framing::read_frame(&mut second, MAX_FRAME_BYTES),
    )
    .await;
    assert!(blocked.is_err(), "second client was served concurrently");

    // Once the first client disconnects, the pending request is served.
    drop(first);
    let reply = timeout(
        Duration::from_secs(5),
        framing::read_frame(&mut second, MAX_FRAME_BYTES),
    )
    .await
    .expect("second client never served")
    .expect("read failed");
    assert_eq!(reply, b"[]");
}

#[tokio::test]
async fn oversized_frame_drops_the_connection_without_a_reply() {
    let addr = spawn_server(FixedDetector { detections: vec![] }).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    // Announce a payload over the limit; the server rejects it before
    // reading the body and drops the connection.
    stream
        .write_all(&(MAX_FRAME_BYTES + 1).to_le_bytes())
        .await
        .unwrap();

    let result = framing::read_frame(&mut stream, MAX_FRAME_BYTES).await;
    assert!(result.is_err());
}
