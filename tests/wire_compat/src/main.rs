fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use sendme_protocol::{Envelope, FileMetadata, Message, read_frame, write_frame};
    use sendme_ticket::Ticket;

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture as text, without the trailing newline.
    fn load_text(name: &str) -> String {
        let path = fixtures_dir().join(name);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()))
            .trim_end()
            .to_string()
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        serde_json::from_str(&load_text(name))
            .unwrap_or_else(|e| panic!("failed to parse fixture {name}: {e}"))
    }

    /// Deserializes a fixture into a Rust type, re-serializes it, and compares
    /// the JSON values (order-independent comparison).
    fn roundtrip_test<T>(name: &str)
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));

        assert_eq!(
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  Go:   {fixture}\n  Rust: {reserialized}"
        );
    }

    /// Checks that the fixture decodes to `expected` and that encoding
    /// `expected` reproduces the fixture byte for byte.
    fn payload_test(name: &str, expected: Message) {
        let fixture = load_text(name);

        let decoded = Message::from_payload(fixture.as_bytes())
            .unwrap_or_else(|e| panic!("failed to decode {name}: {e}"));
        assert_eq!(decoded, expected, "decode mismatch for {name}");

        let encoded = expected.to_payload().unwrap();
        assert_eq!(
            String::from_utf8(encoded).unwrap(),
            fixture,
            "encode mismatch for {name}"
        );
    }

    fn sample_metadata() -> FileMetadata {
        FileMetadata {
            file_name: "holiday photos.zip".into(),
            file_size: 734_003_200,
            file_hash: "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9".into(),
        }
    }

    // --- Frame payloads ---

    #[test]
    fn fixture_frame_metadata() {
        payload_test("frame_metadata.json", Message::Metadata(sample_metadata()));
        roundtrip_test::<Envelope>("frame_metadata.json");
    }

    #[test]
    fn fixture_frame_chunk() {
        payload_test("frame_chunk.json", Message::Chunk(b"hello world".to_vec()));
        roundtrip_test::<Envelope>("frame_chunk.json");
    }

    #[test]
    fn fixture_frame_error() {
        payload_test(
            "frame_error.json",
            Message::Error("failed to read file: input/output error".into()),
        );
        roundtrip_test::<Envelope>("frame_error.json");
    }

    #[test]
    fn fixture_frame_done() {
        payload_test("frame_done.json", Message::Done);
        roundtrip_test::<Envelope>("frame_done.json");
    }

    #[test]
    fn fixture_metadata_body() {
        let fixture = load_fixture("frame_metadata.json");
        let metadata: FileMetadata = serde_json::from_value(fixture["Metadata"].clone()).unwrap();
        assert_eq!(metadata, sample_metadata());
    }

    #[tokio::test]
    async fn fixture_frame_length_prefix() {
        let fixture = load_text("frame_done.json");

        let mut buf = Vec::new();
        write_frame(&mut buf, &Message::Done).await.unwrap();
        assert_eq!(&buf[..4], &(fixture.len() as u32).to_be_bytes());
        assert_eq!(&buf[4..], fixture.as_bytes());

        let mut cursor = &buf[..];
        assert_eq!(read_frame(&mut cursor).await.unwrap(), Message::Done);
    }

    #[tokio::test]
    async fn fixture_frames_in_sequence() {
        let mut stream = Vec::new();
        for name in ["frame_metadata.json", "frame_chunk.json", "frame_done.json"] {
            let payload = load_text(name);
            stream.extend_from_slice(&(payload.len() as u32).to_be_bytes());
            stream.extend_from_slice(payload.as_bytes());
        }

        let mut cursor = &stream[..];
        assert!(matches!(
            read_frame(&mut cursor).await.unwrap(),
            Message::Metadata(_)
        ));
        assert_eq!(
            read_frame(&mut cursor).await.unwrap(),
            Message::Chunk(b"hello world".to_vec())
        );
        assert_eq!(read_frame(&mut cursor).await.unwrap(), Message::Done);
    }

    // --- Ticket ---

    #[test]
    fn fixture_ticket_json() {
        roundtrip_test::<Ticket>("ticket.json");
    }

    #[test]
    fn fixture_ticket_decode() {
        let ticket = Ticket::decode(&load_text("ticket.txt")).unwrap();
        let expected: Ticket = serde_json::from_value(load_fixture("ticket.json")).unwrap();
        assert_eq!(ticket, expected);
        assert_eq!(
            ticket.peer_addr,
            "192.168.1.20:41234/9f86d081884c7d659a2feaa0c55ad015"
        );
    }

    #[test]
    fn fixture_ticket_encode() {
        let ticket: Ticket = serde_json::from_value(load_fixture("ticket.json")).unwrap();
        assert_eq!(ticket.encode(), load_text("ticket.txt"));
    }
}
