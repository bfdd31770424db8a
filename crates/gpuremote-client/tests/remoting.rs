use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use gpuremote_client::kind::{Buffer, Device, Queue};
use gpuremote_client::{ClientError, Connection, ConnectionConfig, Proxy, StreamFault};
use gpuremote_host::{
    spawn_local, HostConfig, HostListener, MemoryBackend, Result as HostResult, SessionEnd,
    SessionReport,
};
use gpuremote_wire::types::{
    BufferDescriptor, BufferUsage, CommandEncoderDescriptor, DeviceDescriptor, Extent3D,
    ExternalImageSource, ImageCopyExternalImage, ImageCopyTexture, ImageCopyTextureTagged,
    PowerPreference, QuerySetDescriptor, QueryType, RenderPassDescriptor,
    RenderPipelineDescriptor, RequestAdapterOptions, TextureDescriptor, TextureDimension,
    TextureFormat, TextureUsage,
};
use gpuremote_wire::{
    CallbackOutcome, Command, FaultReport, GpuOp, Identifier, ObjectKind, ObjectOp, QueueOp,
    RemoteFault,
};

struct Harness {
    backend: Arc<MemoryBackend>,
    conn: Connection,
    host: JoinHandle<HostResult<SessionReport>>,
}

fn harness(backend: MemoryBackend, config: ConnectionConfig) -> Harness {
    let backend = Arc::new(backend);
    let (stream, host) = spawn_local(backend.clone(), HostConfig::default()).unwrap();
    let conn = Connection::establish(stream, config).unwrap();
    Harness {
        backend,
        conn,
        host,
    }
}

fn default_harness() -> Harness {
    harness(MemoryBackend::new(), ConnectionConfig::default())
}

fn staging(size: u64) -> BufferDescriptor {
    BufferDescriptor {
        label: None,
        size,
        usage: BufferUsage::COPY_SRC | BufferUsage::COPY_DST | BufferUsage::MAP_READ,
        mapped_at_creation: false,
    }
}

fn device_and_queue(conn: &Connection, stream: u16) -> (Proxy<Device>, Proxy<Queue>) {
    let device = conn.create_device(stream, &DeviceDescriptor::default()).unwrap();
    let queue = device.create_queue().unwrap();
    (device, queue)
}

fn bogus() -> Identifier {
    Identifier::new(9_999).unwrap()
}

fn faults(conn: &Connection, stream: u16) -> Vec<FaultReport> {
    conn.synchronize(stream).unwrap();
    conn.take_faults()
        .into_iter()
        .map(|StreamFault { report, .. }| report)
        .collect()
}

#[test]
fn posts_on_one_stream_apply_in_order() {
    let h = default_harness();
    let (device, queue) = device_and_queue(&h.conn, 1);
    let buffer: Proxy<Buffer> = device.create_buffer(&staging(8)).unwrap();

    queue.write_buffer(&buffer, 0, vec![1u8; 8]).unwrap();
    queue.write_buffer(&buffer, 4, vec![2u8; 4]).unwrap();
    queue.write_buffer(&buffer, 0, vec![3u8; 4]).unwrap();

    assert_eq!(&buffer.read(0, 8).unwrap()[..], &[3, 3, 3, 3, 2, 2, 2, 2]);
    assert!(h.conn.take_faults().is_empty());
}

#[test]
fn device_from_a_requested_adapter_works_like_any_other() {
    let h = default_harness();
    let adapter = h
        .conn
        .request_adapter(
            2,
            &RequestAdapterOptions {
                power_preference: Some(PowerPreference::LowPower),
                force_fallback_adapter: true,
            },
        )
        .unwrap();
    let device = adapter.request_device(&DeviceDescriptor::default()).unwrap();
    let queue = device.create_queue().unwrap();
    let buffer = device.create_buffer(&staging(4)).unwrap();

    queue.write_buffer(&buffer, 0, vec![9u8; 4]).unwrap();
    assert_eq!(&buffer.read(0, 4).unwrap()[..], &[9, 9, 9, 9]);
    assert!(faults(&h.conn, 2).is_empty());
    assert_eq!(h.backend.handles_of(ObjectKind::Adapter).len(), 1);
}

#[test]
fn write_to_unregistered_buffer_reports_a_fault_and_changes_nothing() {
    let h = default_harness();
    let (device, queue) = device_and_queue(&h.conn, 1);
    let buffer = device.create_buffer(&staging(4)).unwrap();

    h.conn
        .post(
            1,
            Command::Object {
                target: queue.id(),
                op: ObjectOp::Queue(QueueOp::WriteBuffer {
                    buffer: bogus(),
                    offset: 0,
                    data: vec![9u8; 4].into(),
                }),
            },
        )
        .unwrap();

    assert_eq!(
        faults(&h.conn, 1),
        vec![FaultReport {
            target: Some(queue.id()),
            operation: "WriteBuffer".into(),
            fault: RemoteFault::UnresolvedIdentifier { id: bogus() },
        }]
    );
    assert_eq!(h.backend.calls("write_buffer"), 0);
    assert_eq!(&buffer.read(0, 4).unwrap()[..], &[0, 0, 0, 0]);
}

#[test]
fn submit_is_all_or_nothing() {
    let h = default_harness();
    let (device, queue) = device_and_queue(&h.conn, 1);
    let source = device.create_buffer(&staging(4)).unwrap();
    let destination = device.create_buffer(&staging(4)).unwrap();
    queue.write_buffer(&source, 0, vec![5u8; 4]).unwrap();

    let encoder = device
        .create_command_encoder(&CommandEncoderDescriptor::default())
        .unwrap();
    encoder
        .copy_buffer_to_buffer(&source, 0, &destination, 0, 4)
        .unwrap();
    let commands = encoder.finish(Some("copy")).unwrap();

    h.conn
        .post(
            1,
            Command::Object {
                target: queue.id(),
                op: ObjectOp::Queue(QueueOp::Submit {
                    command_buffers: vec![commands.id(), bogus()],
                }),
            },
        )
        .unwrap();
    let reported = faults(&h.conn, 1);
    assert_eq!(reported.len(), 1);
    assert_eq!(
        reported[0].fault,
        RemoteFault::UnresolvedIdentifier { id: bogus() }
    );
    assert_eq!(h.backend.calls("submit"), 0);
    assert_eq!(&destination.read(0, 4).unwrap()[..], &[0, 0, 0, 0]);

    queue.submit(&[&commands]).unwrap();
    assert_eq!(&destination.read(0, 4).unwrap()[..], &[5, 5, 5, 5]);
}

#[test]
fn kind_mismatch_is_reported() {
    let h = default_harness();
    let (device, _queue) = device_and_queue(&h.conn, 1);
    let buffer = device.create_buffer(&staging(4)).unwrap();

    h.conn
        .post(
            1,
            Command::Object {
                target: buffer.id(),
                op: ObjectOp::Queue(QueueOp::Submit {
                    command_buffers: Vec::new(),
                }),
            },
        )
        .unwrap();

    assert!(matches!(
        faults(&h.conn, 1).as_slice(),
        [FaultReport {
            fault: RemoteFault::KindMismatch { .. },
            ..
        }]
    ));
}

#[test]
fn failed_request_comes_back_as_a_remote_error() {
    let h = default_harness();
    let (device, _queue) = device_and_queue(&h.conn, 1);
    let buffer = device.create_buffer(&staging(4)).unwrap();

    assert!(matches!(
        buffer.read(0, 64),
        Err(ClientError::Remote(RemoteFault::Backend { .. }))
    ));
    assert!(h.conn.take_faults().is_empty(), "request faults are not posted");
}

fn texture(size: Extent3D) -> TextureDescriptor {
    TextureDescriptor {
        label: None,
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: TextureFormat::Rgba8Unorm,
        usage: TextureUsage::COPY_DST,
    }
}

fn backend_fault(report: &FaultReport) -> &str {
    match &report.fault {
        RemoteFault::Backend { message } => message,
        other => panic!("expected a backend fault, got {other:?}"),
    }
}

#[test]
fn empty_flipped_bitmap_is_a_fault_not_a_dead_stream() {
    let h = default_harness();
    let (device, queue) = device_and_queue(&h.conn, 1);
    let target = device.create_texture(&texture(Extent3D::new(4, 4, 1))).unwrap();

    queue
        .copy_external_image_to_texture(
            &ImageCopyExternalImage {
                source: ExternalImageSource::Bitmap {
                    width: 0,
                    height: 0,
                    pixels: Vec::new().into(),
                },
                origin: None,
                flip_y: true,
            },
            &ImageCopyTextureTagged {
                texture: ImageCopyTexture::new(target.id()),
                color_space: Default::default(),
                premultiplied_alpha: false,
            },
            Extent3D::new(0, 0, 1),
        )
        .unwrap();

    let reports = faults(&h.conn, 1);
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].operation, "CopyExternalImageToTexture");
    assert_eq!(backend_fault(&reports[0]), "bitmap has no pixels");

    let buffer = device.create_buffer(&staging(4)).unwrap();
    assert_eq!(&buffer.read(0, 4).unwrap()[..], &[0; 4]);
}

#[test]
fn oversized_resources_are_refused_and_the_stream_survives() {
    let h = harness(
        MemoryBackend::new().with_max_allocation(1 << 20),
        ConnectionConfig::default(),
    );
    let (device, _queue) = device_and_queue(&h.conn, 1);

    let _texture = device
        .create_texture(&texture(Extent3D::new(u32::MAX, u32::MAX, u32::MAX)))
        .unwrap();
    let _buffer = device.create_buffer(&staging(u64::MAX - 3)).unwrap();

    let reports = faults(&h.conn, 1);
    let operations: Vec<_> = reports.iter().map(|r| r.operation.as_str()).collect();
    assert_eq!(operations, ["CreateTexture", "CreateBuffer"]);
    assert!(backend_fault(&reports[1]).contains("allocation limit"));

    let buffer = device.create_buffer(&staging(8)).unwrap();
    assert_eq!(buffer.read(0, 8).unwrap().len(), 8);
}

#[test]
fn backend_panic_fails_only_that_operation() {
    let h = harness(
        MemoryBackend::new().with_panic("read_buffer", "driver crashed"),
        ConnectionConfig::default().with_reply_timeout(Duration::from_secs(5)),
    );
    let (device, queue) = device_and_queue(&h.conn, 1);
    let buffer = device.create_buffer(&staging(4)).unwrap();

    let started = Instant::now();
    match buffer.read(0, 4) {
        Err(ClientError::Remote(RemoteFault::Backend { message })) => {
            assert!(message.contains("driver crashed"), "{message}");
        }
        other => panic!("expected a backend fault, got {other:?}"),
    }
    assert!(started.elapsed() < Duration::from_secs(5));

    queue.write_buffer(&buffer, 0, vec![1u8; 4]).unwrap();
    assert!(faults(&h.conn, 1).is_empty());
    assert_eq!(h.backend.calls("write_buffer"), 1);
}

#[test]
fn slow_stream_does_not_hold_up_others() {
    let h = harness(
        MemoryBackend::new().with_latency("read_buffer", Duration::from_millis(800)),
        ConnectionConfig::default().with_reply_timeout(Duration::from_millis(200)),
    );
    let (slow_device, _slow_queue) = device_and_queue(&h.conn, 1);
    let slow = slow_device.create_buffer(&staging(4)).unwrap();
    let (_fast_device, fast_queue) = device_and_queue(&h.conn, 2);

    assert!(matches!(slow.read(0, 4), Err(ClientError::Timeout(_))));

    let started = Instant::now();
    let mut done = fast_queue.on_submitted_work_done().unwrap();
    assert_eq!(
        done.wait_timeout(Duration::from_secs(5)).unwrap(),
        Some(CallbackOutcome::Completed)
    );
    assert!(started.elapsed() < Duration::from_millis(500));

    // Stream 1 catches up once the slow read finishes; its late reply is
    // dropped.
    h.conn
        .request_with_timeout(1, Command::Gpu(GpuOp::Synchronize), Duration::from_secs(5))
        .unwrap();
}

#[test]
fn releasing_an_object_makes_later_use_unresolved() {
    let h = default_harness();
    let (device, queue) = device_and_queue(&h.conn, 1);
    let buffer = device.create_buffer(&staging(4)).unwrap();
    let id = buffer.id();
    drop(buffer);

    h.conn
        .post(
            1,
            Command::Object {
                target: queue.id(),
                op: ObjectOp::Queue(QueueOp::WriteBuffer {
                    buffer: id,
                    offset: 0,
                    data: vec![1u8; 4].into(),
                }),
            },
        )
        .unwrap();

    assert_eq!(
        faults(&h.conn, 1)
            .into_iter()
            .map(|report| report.fault)
            .collect::<Vec<_>>(),
        vec![RemoteFault::UnresolvedIdentifier { id }]
    );
    assert_eq!(h.backend.calls("release"), 1);
}

#[test]
fn releasing_a_queue_cancels_its_callbacks() {
    let h = harness(
        MemoryBackend::new().with_held_completions(),
        ConnectionConfig::default(),
    );
    let (_device, queue) = device_and_queue(&h.conn, 1);
    let done = queue.on_submitted_work_done().unwrap();
    h.conn.synchronize(1).unwrap();
    assert_eq!(h.backend.held_completions(), 1);

    queue.release().unwrap();
    assert_eq!(done.wait().unwrap(), CallbackOutcome::Cancelled);

    // The held completion is spent; completing it now delivers nothing.
    h.backend.complete_held();
    h.conn.synchronize(1).unwrap();
    assert_eq!(h.conn.pending_callbacks(), 0);
}

#[test]
fn closing_cancels_pending_callbacks_and_releases_host_objects() {
    let h = harness(
        MemoryBackend::new().with_held_completions(),
        ConnectionConfig::default(),
    );
    let (device, queue) = device_and_queue(&h.conn, 1);
    let _buffer = device.create_buffer(&staging(4)).unwrap();
    let done = queue.on_submitted_work_done().unwrap();
    h.conn.synchronize(1).unwrap();

    h.conn.close();
    assert_eq!(done.wait().unwrap(), CallbackOutcome::Cancelled);
    assert!(matches!(
        h.conn.synchronize(1),
        Err(ClientError::Disconnected(_))
    ));

    let report = h.host.join().unwrap().unwrap();
    assert_eq!(report.end, SessionEnd::PeerClosed);
    assert_eq!(report.released_on_teardown, 3);
    assert_eq!(h.backend.live_objects(), 0);
}

#[test]
fn blocking_inside_a_callback_is_refused_but_posting_is_fine() {
    let h = default_harness();
    let (_device, queue) = device_and_queue(&h.conn, 1);

    let (tx, rx) = mpsc::channel();
    let conn = h.conn.clone();
    queue
        .on_submitted_work_done_with(move |outcome| {
            let blocked = conn.synchronize(1);
            let posted = conn.post(1, Command::Gpu(GpuOp::Synchronize));
            let _ = tx.send((outcome, blocked, posted));
        })
        .unwrap();

    let (outcome, blocked, posted) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(outcome, CallbackOutcome::Completed);
    assert!(matches!(blocked, Err(ClientError::ReentrantRequest)));
    assert!(posted.is_ok());
    h.conn.synchronize(1).unwrap();
}

#[test]
fn identifiers_are_shared_across_streams() {
    let h = default_harness();
    let (device, queue) = device_and_queue(&h.conn, 1);
    let buffer = device.create_buffer(&staging(4)).unwrap();
    h.conn.synchronize(1).unwrap();

    h.conn
        .post(
            2,
            Command::Object {
                target: queue.id(),
                op: ObjectOp::Queue(QueueOp::WriteBuffer {
                    buffer: buffer.id(),
                    offset: 0,
                    data: vec![4u8; 4].into(),
                }),
            },
        )
        .unwrap();
    h.conn.synchronize(2).unwrap();

    assert_eq!(&buffer.read(0, 4).unwrap()[..], &[4, 4, 4, 4]);
}

#[test]
fn render_pass_records_through_proxies() {
    let h = default_harness();
    let (device, queue) = device_and_queue(&h.conn, 1);
    let occlusion = device
        .create_query_set(&QuerySetDescriptor {
            label: None,
            ty: QueryType::Occlusion,
            count: 4,
        })
        .unwrap();
    let pipeline = device
        .create_render_pipeline(&RenderPipelineDescriptor::default())
        .unwrap();
    let encoder = device
        .create_command_encoder(&CommandEncoderDescriptor::default())
        .unwrap();
    let pass = encoder
        .begin_render_pass(&RenderPassDescriptor {
            occlusion_query_set: Some(occlusion.id()),
            ..RenderPassDescriptor::default()
        })
        .unwrap();

    pass.set_pipeline(&pipeline).unwrap();
    pass.push_debug_group("frame").unwrap();
    pass.set_viewport(0.0, 0.0, 64.0, 64.0, 0.0, 1.0).unwrap();
    pass.begin_occlusion_query(0).unwrap();
    pass.draw(3, 1, 0, 0).unwrap();
    pass.end_occlusion_query().unwrap();
    pass.pop_debug_group().unwrap();
    pass.end_pass().unwrap();
    let commands = encoder.finish(None).unwrap();
    queue.submit(&[&commands]).unwrap();

    assert!(faults(&h.conn, 1).is_empty());
    assert_eq!(h.backend.calls("encode_render_pass"), 8);
    assert_eq!(h.backend.calls("submit"), 1);
}

#[test]
fn labels_reach_the_backend() {
    let h = default_harness();
    let (device, _queue) = device_and_queue(&h.conn, 1);
    let buffer = device.create_buffer(&staging(4)).unwrap();
    buffer.set_label("vertices").unwrap();
    h.conn.synchronize(1).unwrap();

    let handle = h.backend.handles_of(gpuremote_wire::ObjectKind::Buffer)[0];
    assert_eq!(h.backend.label_of(handle).as_deref(), Some("vertices"));
}

#[test]
fn connects_over_the_host_socket() {
    let path = std::env::temp_dir().join(format!(
        "gpuremote-client-{}-{}.sock",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    let backend = Arc::new(MemoryBackend::new());
    let listener = HostListener::bind(&path, backend.clone()).unwrap();
    let host = std::thread::spawn(move || listener.accept().unwrap().run());

    let conn = Connection::connect(&path, ConnectionConfig::default().with_streams(2)).unwrap();
    assert_eq!(conn.session_id(), "session-1");
    assert_eq!(conn.streams(), 2);

    let (_device, queue) = device_and_queue(&conn, 2);
    let done = queue.on_submitted_work_done().unwrap();
    assert_eq!(done.wait().unwrap(), CallbackOutcome::Completed);

    conn.shutdown(Some("done")).unwrap();
    let report = host.join().unwrap();
    assert_eq!(report.end, SessionEnd::ShutdownRequested);
    assert_eq!(report.streams, 2);
}
