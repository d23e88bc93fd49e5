//! Integration tests for the full download pipeline.
//!
//! These tests verify end-to-end behavior: CSV text -> validation -> frames ->
//! chunked transfer -> device verification, checking that the device ends up
//! holding exactly the samples in the file.

use lut_transfer_core::{
    device::{DeviceConfig, SimulatedDevice},
    error::{Error, TransferError, ValidationError},
    frame::{encode_table_set, parse_frame},
    ingest::{ingest_table, read_table_file},
    session::{Request, ResponseStatus, Session},
    table::TableInstance,
    transfer::{run_transfer, Phase, TransferOptions},
};

/// Records requests and forwards them to an inner session.
struct Recorder<S> {
    inner: S,
    requests: Vec<Request>,
}

impl<S: Session> Session for Recorder<S> {
    fn exchange(&mut self, request: &Request) -> lut_transfer_core::Result<ResponseStatus> {
        self.requests.push(request.clone());
        self.inner.exchange(request)
    }
}

fn two_instance_csv(rows: usize) -> String {
    let mut text = String::from("Table Instance;1;2\n");
    for i in 0..rows {
        text.push_str(&format!(";{};{}\n", i as f32 * 0.1, 1.0 - i as f32 * 0.1));
    }
    text
}

/// Header `Table Instance;1;2` with 10 samples each: two 52-byte frames,
/// one chunk per instance, one verification.
#[test]
fn test_two_instances_end_to_end() {
    let tables = ingest_table(&two_instance_csv(10)).expect("validation failed");
    assert_eq!(tables.len(), 2);
    for (_, column) in tables.iter() {
        assert_eq!(column.len(), 10);
    }

    let frames = encode_table_set(tables);
    for (_, frame) in frames.iter() {
        assert_eq!(frame.len(), 52);
    }

    let mut session = Recorder {
        inner: SimulatedDevice::new(DeviceConfig::perfect(42)),
        requests: Vec::new(),
    };
    let mut progress = Vec::new();
    let metrics = run_transfer(frames, &mut session, &TransferOptions::default(), |p| {
        progress.push(p)
    })
    .expect("transfer failed");

    assert_eq!(session.requests.len(), 3);
    assert!(matches!(
        session.requests[0],
        Request::Download { offset: 0, instance, .. } if instance.id() == 1
    ));
    assert!(matches!(
        session.requests[1],
        Request::Download { offset: 0, instance, .. } if instance.id() == 2
    ));
    assert_eq!(session.requests[2], Request::Verify);

    assert_eq!(progress, vec![50, 95, 100]);
    assert_eq!(metrics.progress, 100);
    assert!(metrics.is_complete());

    let device = &session.inner;
    let first = device.table(TableInstance::new(1).unwrap()).unwrap();
    assert_eq!(first[0], 0.0);
    assert_eq!(first.len(), 10);
}

/// The generator's output format, with spaces around every cell.
#[test]
fn test_generated_file_format() {
    let mut text = String::from("Table Instance ; 1\n");
    let samples: Vec<f32> = (0..300).map(|i| (i as f32 / 300.0).powi(2)).collect();
    for sample in &samples {
        text.push_str(&format!("; {}\n", sample));
    }

    let frames = encode_table_set(ingest_table(&text).unwrap());
    let frame = frames.get(TableInstance::new(1).unwrap()).unwrap();
    assert_eq!(parse_frame(frame.as_bytes()).unwrap().samples, samples);

    let mut device = SimulatedDevice::new(DeviceConfig::default_with_seed(3));
    run_transfer(frames, &mut device, &TransferOptions::default(), |_| {}).unwrap();

    assert_eq!(device.table(TableInstance::new(1).unwrap()), Some(samples.as_slice()));
}

/// All four instances, with the header in non-ascending order.
#[test]
fn test_four_instances_sent_in_ascending_order() {
    let mut text = String::from("Table Instance;4;2;3;1\n");
    for i in 0..70 {
        text.push_str(&format!(";{};{};{};{}\n", i, i * 2, i * 3, i * 4));
    }

    let frames = encode_table_set(ingest_table(&text).unwrap());
    let mut session = Recorder {
        inner: SimulatedDevice::new(DeviceConfig::perfect(9)),
        requests: Vec::new(),
    };
    run_transfer(frames, &mut session, &TransferOptions::default(), |_| {}).unwrap();

    // 12 + 4 * 70 = 292 bytes -> two chunks per instance
    let sent: Vec<(u8, u32)> = session
        .requests
        .iter()
        .filter_map(|r| match r {
            Request::Download { instance, offset, .. } => Some((instance.id(), *offset)),
            Request::Verify => None,
        })
        .collect();
    assert_eq!(
        sent,
        vec![(1, 0), (1, 256), (2, 0), (2, 256), (3, 0), (3, 256), (4, 0), (4, 256)]
    );

    let fourth = session.inner.table(TableInstance::new(4).unwrap()).unwrap();
    assert_eq!(fourth[5], 5.0);
    let first = session.inner.table(TableInstance::new(1).unwrap()).unwrap();
    assert_eq!(first[5], 20.0);
}

/// A device that always times out stops the transfer after one request.
#[test]
fn test_timeout_stops_transfer() {
    let frames = encode_table_set(ingest_table(&two_instance_csv(200)).unwrap());
    let config = DeviceConfig {
        timeout_rate: 1.0,
        ..DeviceConfig::perfect(1)
    };
    let mut device = SimulatedDevice::new(config);

    let result = run_transfer(frames, &mut device, &TransferOptions::default(), |_| {});
    assert!(matches!(
        result,
        Err(Error::Transfer(TransferError::CommunicationTimeout {
            during: Phase::SendChunk
        }))
    ));
    assert_eq!(device.stats().requests, 1);
    assert!(device.table(TableInstance::new(1).unwrap()).is_none());
}

/// Invalid files never reach the device.
#[test]
fn test_validation_failure_before_transfer() {
    let result = ingest_table("Table Instance;1;1\n;1;1\n;2;2\n");
    assert!(matches!(
        result,
        Err(Error::Validation(ValidationError::DuplicateInstance { instance: 1 }))
    ));
}

/// A table file on disk downloads the same as its text.
#[test]
fn test_table_file_download() {
    let path = std::env::temp_dir().join(format!("lut-transfer-{}.csv", std::process::id()));
    std::fs::write(&path, two_instance_csv(80)).unwrap();
    let from_file = read_table_file(&path);
    std::fs::remove_file(&path).unwrap();

    let tables = from_file.unwrap();
    assert_eq!(tables, ingest_table(&two_instance_csv(80)).unwrap());

    let mut device = SimulatedDevice::new(DeviceConfig::perfect(5));
    run_transfer(encode_table_set(tables), &mut device, &TransferOptions::default(), |_| {}).unwrap();

    let second = device.table(TableInstance::new(2).unwrap()).unwrap();
    assert_eq!(second.len(), 80);
    assert_eq!(second[0], 1.0);
}
