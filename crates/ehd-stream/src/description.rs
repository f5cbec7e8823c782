//! GStreamer launch description
//!
//! The description is `<source> ! <caps> ! <payload> ! <sink>`. Clients
//! depend on the exact element names and properties, so keep this grammar
//! stable.

use ehd_core::{EncodeType, StreamInformation, StreamType};

pub fn build_source(info: &StreamInformation) -> String {
    format!("v4l2src device={}", info.device_path)
}

fn media_type(encode_type: EncodeType) -> &'static str {
    match encode_type {
        EncodeType::H264 => "video/x-h264",
        EncodeType::Mjpg => "image/jpeg",
        EncodeType::None => "",
    }
}

/// Caps filter; the framerate is the inverse of the frame interval
pub fn build_caps(info: &StreamInformation) -> String {
    format!(
        "{},width={},height={},framerate={}/{}",
        media_type(info.encode_type),
        info.width,
        info.height,
        info.interval.denominator,
        info.interval.numerator
    )
}

pub fn build_payload(info: &StreamInformation) -> &'static str {
    match info.encode_type {
        EncodeType::H264 => "h264parse ! queue ! rtph264pay name=pay0 config-interval=10 pt=96",
        EncodeType::Mjpg => "rtpjpegpay",
        EncodeType::None => "",
    }
}

pub fn build_sink(info: &StreamInformation) -> String {
    match info.stream_type {
        StreamType::Udp if info.endpoints.is_empty() => "fakesink".to_string(),
        StreamType::Udp => {
            let clients: Vec<String> = info.endpoints.iter().map(|e| e.to_string()).collect();
            format!("multiudpsink clients={}", clients.join(","))
        }
        StreamType::None => String::new(),
    }
}

/// Derive the full launch description from stream information
pub fn build_description(info: &StreamInformation) -> String {
    format!(
        "{} ! {} ! {} ! {}",
        build_source(info),
        build_caps(info),
        build_payload(info),
        build_sink(info)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ehd_core::{Interval, StreamEndpoint};

    fn h264_info() -> StreamInformation {
        StreamInformation {
            device_path: "/dev/video2".to_string(),
            encode_type: EncodeType::H264,
            stream_type: StreamType::Udp,
            width: 1920,
            height: 1080,
            interval: Interval::new(1, 30),
            endpoints: vec![StreamEndpoint::new("127.0.0.1", 5600)],
        }
    }

    #[test]
    fn test_h264_udp_description() {
        let info = h264_info();
        assert_eq!(build_sink(&info), "multiudpsink clients=127.0.0.1:5600");
        assert!(build_caps(&info).contains("framerate=30/1"));
        assert_eq!(
            build_description(&info),
            "v4l2src device=/dev/video2 ! video/x-h264,width=1920,height=1080,framerate=30/1 ! \
             h264parse ! queue ! rtph264pay name=pay0 config-interval=10 pt=96 ! \
             multiudpsink clients=127.0.0.1:5600"
        );
    }

    #[test]
    fn test_mjpg_payload_and_caps() {
        let mut info = h264_info();
        info.encode_type = EncodeType::Mjpg;
        info.interval = Interval::new(1, 15);
        assert_eq!(build_payload(&info), "rtpjpegpay");
        assert_eq!(
            build_caps(&info),
            "image/jpeg,width=1920,height=1080,framerate=15/1"
        );
    }

    #[test]
    fn test_sink_variants() {
        let mut info = h264_info();
        info.endpoints.push(StreamEndpoint::new("192.168.2.1", 5601));
        assert_eq!(
            build_sink(&info),
            "multiudpsink clients=127.0.0.1:5600,192.168.2.1:5601"
        );

        info.endpoints.clear();
        assert_eq!(build_sink(&info), "fakesink");

        info.stream_type = StreamType::None;
        assert_eq!(build_sink(&info), "");
        assert!(build_description(&info).ends_with(" ! "));
    }

    #[test]
    fn test_description_is_deterministic() {
        let info = h264_info();
        assert_eq!(build_description(&info), build_description(&info.clone()));
    }
}
