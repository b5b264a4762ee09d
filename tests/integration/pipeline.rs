//! Multi-stage pipelines mixing backends through erased resources

use conduit::telemetry::performance::{record_transfer, record_wait, PerformanceSpan};
use conduit::telemetry::{self, perf_span, timed_block};
use conduit::{Backend, Event, Host, ManagedBuffer, Platform, Resource, Threads};

#[test]
fn test_staged_pipeline_across_streams() {
    telemetry::init_test_tracing();
    let _span = PerformanceSpan::new("staged_pipeline", None);

    let stages: Vec<Resource> = (0..4).map(|g| Threads::new(g * 4).unwrap().into()).collect();
    let mut buffers: Vec<ManagedBuffer<u8>> = stages
        .iter()
        .map(|stage| ManagedBuffer::new(stage.clone(), 8192).unwrap())
        .collect();

    buffers[0].fill_bytes(0x42).unwrap();

    // Each copy runs on the source stage and orders the next stage after it
    for i in 1..stages.len() {
        let (done, rest) = buffers.split_at_mut(i);
        done[i - 1].copy_to(&mut rest[0]).unwrap();
    }
    let ready: Event = stages[3].get_event().unwrap();

    // Host waits on a foreign event by blocking
    let (waited, duration_us) = timed_block!("host_wait", { Host::new().wait_on(&ready) });
    waited.unwrap();
    record_wait("host", "foreign_event", duration_us);
    assert!(ready.check().unwrap());
    assert_eq!(buffers[3].to_vec().unwrap(), vec![0x42u8; 8192]);
}

#[test]
fn test_default_resources_cover_enabled_platforms() {
    telemetry::init_test_tracing();
    for platform in [Platform::Host, Platform::Threads, Platform::Cuda] {
        let expected = match platform {
            Platform::Cuda => cuda_present(),
            other => other.is_enabled(),
        };
        assert_eq!(Resource::get_default(platform).is_ok(), expected, "{}", platform);
    }
}

#[cfg(feature = "cuda")]
fn cuda_present() -> bool {
    conduit::Cuda::is_available()
}

#[cfg(not(feature = "cuda"))]
fn cuda_present() -> bool {
    false
}

#[test]
fn test_host_stage_feeds_threads_stage() {
    telemetry::init_test_tracing();
    let host: Resource = Host::new().into();
    let threads: Resource = Threads::new(7).unwrap().into();

    let _span = perf_span!("host_to_threads", elements = 256);
    let mut input = ManagedBuffer::<f32>::new(host.clone(), 256).unwrap();
    input
        .copy_from_slice(&(0..256).map(|i| i as f32).collect::<Vec<_>>())
        .unwrap();

    // Host events are complete, so this is a no-op dependency
    threads.wait_on(&host.get_event().unwrap()).unwrap();

    let mut output = ManagedBuffer::<f32>::new(threads.clone(), 256).unwrap();
    let (copied, duration_us) = timed_block!("h2d", { input.copy_to(&mut output) });
    copied.unwrap();
    record_transfer(output.size_bytes(), "H2D", duration_us);
    assert_eq!(output.to_vec().unwrap()[255], 255.0);
}
