use std::io::{Cursor, Read, Write};
use std::net::TcpListener;
use std::time::Duration;

use image::{ImageFormat, Rgb, RgbImage};
use url::Url;

use inspection_kernel::{
    fetch_snapshot, run_capture, CaptureError, CaptureStation, Confidence, FetchError,
    ModelConfig, Pipeline, Verdict,
};

fn stub_pipeline() -> Pipeline {
    let config = ModelConfig {
        path: "stub:".to_string(),
        ..ModelConfig::default()
    };
    Pipeline::load(&config).expect("stub pipeline")
}

fn png_bytes() -> Vec<u8> {
    let image = RgbImage::from_pixel(48, 48, Rgb([120, 120, 120]));
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .expect("encode png");
    buffer.into_inner()
}

/// Serve one HTTP response on a loopback listener, then exit.
fn serve_once(status_line: &'static str, body: Vec<u8>) -> (Url, std::thread::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
    let addr = listener.local_addr().unwrap();
    let handle = std::thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let mut request = [0u8; 2048];
            let _ = stream.read(&mut request);
            let header = format!(
                "{}\r\nContent-Type: image/png\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status_line,
                body.len()
            );
            let _ = stream.write_all(header.as_bytes());
            let _ = stream.write_all(&body);
        }
    });
    let url = Url::parse(&format!("http://{}/picture/1/current/", addr)).unwrap();
    (url, handle)
}

#[test]
fn a_live_endpoint_yields_an_image() {
    let (url, server) = serve_once("HTTP/1.1 200 OK", png_bytes());
    let image = fetch_snapshot(&url, Duration::from_secs(2)).expect("fetch snapshot");
    assert_eq!(image.dimensions(), (48, 48));
    server.join().unwrap();
}

#[test]
fn an_unreachable_endpoint_is_a_connection_failure() {
    // Port 1 on loopback refuses connections.
    let url = Url::parse("http://127.0.0.1:1/picture/1/current/").unwrap();
    let err = fetch_snapshot(&url, Duration::from_secs(2)).unwrap_err();
    assert!(matches!(err, FetchError::ConnectionFailure), "got {:?}", err);
}

#[test]
fn an_http_error_status_is_reported_as_such() {
    let (url, server) = serve_once("HTTP/1.1 404 Not Found", Vec::new());
    let err = fetch_snapshot(&url, Duration::from_secs(2)).unwrap_err();
    assert!(matches!(err, FetchError::HttpError(404)), "got {:?}", err);
    server.join().unwrap();
}

#[test]
fn a_silent_endpoint_times_out() {
    // Bound but never accepted: the connection parks in the backlog and no
    // response ever comes.
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let url = Url::parse(&format!("http://{}/picture/1/current/", addr)).unwrap();

    let err = fetch_snapshot(&url, Duration::from_millis(300)).unwrap_err();
    assert!(matches!(err, FetchError::Timeout), "got {:?}", err);
    drop(listener);
}

#[test]
fn a_non_image_body_is_a_bad_image() {
    let (url, server) = serve_once("HTTP/1.1 200 OK", b"hello".to_vec());
    let err = fetch_snapshot(&url, Duration::from_secs(2)).unwrap_err();
    assert!(matches!(err, FetchError::BadImage(_)), "got {:?}", err);
    server.join().unwrap();
}

#[test]
fn one_dead_camera_does_not_block_its_sibling() {
    let (good_url, server) = serve_once("HTTP/1.1 200 OK", png_bytes());
    let stations = vec![
        CaptureStation {
            name: "camera 1".to_string(),
            url: Url::parse("http://127.0.0.1:1/picture/1/current/").unwrap(),
        },
        CaptureStation {
            name: "camera 2".to_string(),
            url: good_url,
        },
    ];

    let pipeline = stub_pipeline();
    let reports = run_capture(
        &pipeline,
        &stations,
        Confidence::from_percent(40).unwrap(),
    );
    server.join().unwrap();

    assert_eq!(reports.len(), 2);
    assert!(matches!(
        reports[0].outcome,
        Err(CaptureError::Fetch(FetchError::ConnectionFailure))
    ));
    let outcome = reports[1].outcome.as_ref().expect("sibling unaffected");
    assert_eq!(outcome.verdict, Verdict::Ok);
}
