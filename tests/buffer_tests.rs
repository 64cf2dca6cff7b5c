//! Integration tests for the octet codec

mod common;

use common::{ScriptedTransport, ServerScript};
use firebird_wire::buffer::{padding, WriteBuffer};
use firebird_wire::transport::WireChannel;
use firebird_wire::Error;

/// A channel that reads back `written`, followed by a sentinel word
fn read_back(written: &[u8]) -> WireChannel {
    let (transport, _) = ScriptedTransport::new(ServerScript::new().raw(written).int(0x5a5a5a5a));
    WireChannel::new(Box::new(transport))
}

mod framing_tests {
    use super::*;

    #[tokio::test]
    async fn test_buffer_roundtrip_through_channel() {
        for size in (0usize..=8).chain([13, 255, 1021, 4096]) {
            let data: Vec<u8> = (0..size).map(|i| (i % 251) as u8 + 1).collect();
            let mut write_buf = WriteBuffer::new();
            write_buf.write_buffer(&data).unwrap();

            let written = write_buf.as_slice();
            assert_eq!(written.len() % 4, 0, "unaligned for size {}", size);
            assert_eq!(written.len(), 4 + size + padding(size));
            assert!(written[4 + size..].iter().all(|&b| b == 0), "non-zero padding for size {}", size);

            // The sentinel only lines up if the padding was consumed exactly
            let mut ch = read_back(written);
            assert_eq!(&ch.read_buffer().await.unwrap()[..], &data[..], "size {}", size);
            assert_eq!(ch.read_i32().await.unwrap(), 0x5a5a5a5a, "size {}", size);
        }
    }

    #[tokio::test]
    async fn test_fields_stay_aligned() {
        let mut write_buf = WriteBuffer::new();
        write_buf.write_i32(-7).unwrap();
        write_buf.write_string("abc").unwrap();
        write_buf.write_i64(1 << 40).unwrap();
        write_buf.write_buffer(&[9]).unwrap();
        write_buf.write_i32(42).unwrap();

        let mut ch = read_back(write_buf.as_slice());
        assert_eq!(ch.read_i32().await.unwrap(), -7);
        assert_eq!(ch.read_string().await.unwrap(), "abc");
        assert_eq!(ch.read_i64().await.unwrap(), 1 << 40);
        assert_eq!(&ch.read_buffer().await.unwrap()[..], &[9]);
        assert_eq!(ch.read_i32().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_raw_field_padding() {
        let mut write_buf = WriteBuffer::new();
        write_buf.write_bytes(b"hello").unwrap();
        write_buf.write_padding(5).unwrap();

        let mut ch = read_back(write_buf.as_slice());
        assert_eq!(&ch.read_bytes(5).await.unwrap()[..], b"hello");
        ch.skip_padding(5).await.unwrap();
        assert_eq!(ch.read_i32().await.unwrap(), 0x5a5a5a5a);
    }

    #[tokio::test]
    async fn test_short_read_is_network_error() {
        let mut write_buf = WriteBuffer::new();
        write_buf.write_buffer(b"hello").unwrap();
        let truncated = &write_buf.as_slice()[..6];

        let (transport, _) = ScriptedTransport::new(ServerScript::new().raw(truncated));
        let mut ch = WireChannel::new(Box::new(transport));
        let err = ch.read_buffer().await.unwrap_err();
        assert!(err.is_network_error(), "{:?}", err);
    }

    #[tokio::test]
    async fn test_negative_length_is_rejected() {
        let mut ch = read_back(&[0xff, 0xff, 0xff, 0xfe]);
        assert!(matches!(ch.read_buffer().await, Err(Error::Protocol(_))));
    }
}

mod typed_tests {
    use super::*;

    #[test]
    fn test_typed_block_layout() {
        let mut write_buf = WriteBuffer::new();
        write_buf.write_typed(1, Some(&[28, 1, b'x'])).unwrap();
        assert_eq!(write_buf.as_slice(), &[0, 0, 0, 4, 1, 28, 1, b'x']);
    }

    #[test]
    fn test_set_layout() {
        let mut write_buf = WriteBuffer::new();
        write_buf.write_set(3, &[9, 2, 6]).unwrap();
        assert_eq!(write_buf.as_slice(), &[0, 0, 0, 4, 3, 9, 2, 6]);

        let mut write_buf = WriteBuffer::new();
        write_buf.write_set(3, &[9, 15, 17, 6]).unwrap();
        assert_eq!(write_buf.as_slice(), &[0, 0, 0, 5, 3, 9, 15, 17, 6, 0, 0, 0]);
    }

    #[test]
    fn test_blob_buffer_layout() {
        let mut write_buf = WriteBuffer::new();
        write_buf.write_blob_buffer(b"abc").unwrap();
        assert_eq!(
            write_buf.as_slice(),
            &[0, 0, 0, 5, 0, 0, 0, 5, 3, 0, b'a', b'b', b'c', 0, 0, 0]
        );
    }
}
