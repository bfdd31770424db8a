use gpuremote_frame::{FrameConfig, FrameReader, FrameWriter};
use gpuremote_transport::IpcStream;
use tracing::info;

use crate::error::Result;
use crate::handshake::{handshake_client, handshake_server, HandshakeConfig, HandshakeResult};

/// A connection that has completed its handshake, split into read and write
/// halves over the same socket.
pub struct Established {
    pub reader: FrameReader<IpcStream>,
    pub writer: FrameWriter<IpcStream>,
    pub handshake: HandshakeResult,
}

/// Handshake frames are held to `max_handshake_payload` and every read is
/// bounded by the handshake timeout; `frame` applies afterwards.
fn handshake_halves(
    stream: IpcStream,
    handshake: &HandshakeConfig,
) -> Result<(FrameReader<IpcStream>, FrameWriter<IpcStream>)> {
    let frame_config = FrameConfig {
        max_payload_size: handshake.max_handshake_payload,
        read_timeout: Some(handshake.timeout),
        write_timeout: Some(handshake.timeout),
    };
    let reader = FrameReader::for_ipc(stream.try_clone()?, frame_config.clone())?;
    let writer = FrameWriter::for_ipc(stream, frame_config)?;
    Ok((reader, writer))
}

/// Bytes the peer pipelined behind its handshake frame stay buffered in the
/// reader.
fn into_runtime(
    mut reader: FrameReader<IpcStream>,
    mut writer: FrameWriter<IpcStream>,
    handshake: HandshakeResult,
    frame: &FrameConfig,
) -> Result<Established> {
    reader.reconfigure(frame.clone())?;
    writer.reconfigure(frame.clone())?;
    Ok(Established {
        reader,
        writer,
        handshake,
    })
}

/// Run the client side of the handshake over `stream`, asking for `streams`
/// command streams.
pub fn establish_client(
    stream: IpcStream,
    streams: u16,
    handshake: &HandshakeConfig,
    frame: &FrameConfig,
) -> Result<Established> {
    let (mut reader, mut writer) = handshake_halves(stream, handshake)?;
    let result = handshake_client(&mut reader, &mut writer, streams, handshake)?;
    info!(
        session = %result.session_id,
        streams = result.streams,
        version = %result.protocol_version,
        "session established"
    );
    into_runtime(reader, writer, result, frame)
}

/// Run the host side of the handshake over `stream`.
pub fn establish_server(
    stream: IpcStream,
    max_streams: u16,
    session_id: &str,
    handshake: &HandshakeConfig,
    frame: &FrameConfig,
) -> Result<Established> {
    let (mut reader, mut writer) = handshake_halves(stream, handshake)?;
    let result = handshake_server(&mut reader, &mut writer, max_streams, session_id, handshake)?;
    info!(
        session = %result.session_id,
        streams = result.streams,
        authenticated = result.client_auth_token.is_some(),
        "client session accepted"
    );
    into_runtime(reader, writer, result, frame)
}

#[cfg(test)]
mod tests {
    use std::thread;

    use gpuremote_frame::{CONTROL, DEFAULT_STREAM};

    use crate::handshake::ClientHello;

    use super::*;

    #[test]
    fn runtime_payloads_are_not_held_to_handshake_cap() {
        let (host_end, client_end) = IpcStream::pair().unwrap();
        let handshake = HandshakeConfig {
            max_handshake_payload: 1024,
            ..HandshakeConfig::default()
        };

        let host_handshake = handshake.clone();
        let host = thread::spawn(move || {
            let mut est = establish_server(
                host_end,
                4,
                "session-1",
                &host_handshake,
                &FrameConfig::default(),
            )
            .unwrap();
            let frame = est.reader.read_frame().unwrap();
            est.writer.send(frame.stream, &frame.payload).unwrap();
        });

        let mut est = establish_client(client_end, 2, &handshake, &FrameConfig::default()).unwrap();
        assert_eq!(est.handshake.streams, 2);

        let payload = vec![0xab; 64 * 1024];
        est.writer.send(DEFAULT_STREAM, &payload).unwrap();
        let echoed = est.reader.read_frame().unwrap();
        assert_eq!(echoed.payload.len(), payload.len());

        host.join().unwrap();
    }

    #[test]
    fn runtime_reads_block_without_handshake_timeout() {
        let (host_end, client_end) = IpcStream::pair().unwrap();
        let host = thread::spawn(move || {
            establish_server(
                host_end,
                1,
                "session-2",
                &HandshakeConfig::default(),
                &FrameConfig::default(),
            )
            .unwrap()
        });
        let est = establish_client(
            client_end,
            1,
            &HandshakeConfig::default(),
            &FrameConfig::default(),
        )
        .unwrap();
        assert!(est.reader.config().read_timeout.is_none());
        host.join().unwrap();
    }

    #[test]
    fn frames_pipelined_behind_the_hello_survive() {
        let (host_end, client_end) = IpcStream::pair().unwrap();
        let mut raw = FrameWriter::new(client_end.try_clone().unwrap());
        let hello = serde_json::to_vec(&ClientHello {
            protocol: "gpuremote".to_string(),
            version: "1.0".to_string(),
            streams: 1,
            auth_token: None,
        })
        .unwrap();
        raw.send(CONTROL, &hello).unwrap();
        raw.send(DEFAULT_STREAM, b"early").unwrap();

        let mut est = establish_server(
            host_end,
            1,
            "session-3",
            &HandshakeConfig::default(),
            &FrameConfig::default(),
        )
        .unwrap();
        let frame = est.reader.read_frame().unwrap();
        assert_eq!(frame.stream, DEFAULT_STREAM);
        assert_eq!(&frame.payload[..], b"early");
        drop(client_end);
    }
}
