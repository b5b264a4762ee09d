//! Many host threads sharing the stream pool

use conduit::telemetry::timed_block;
use conduit::{Backend, BackendEvent, Threads, POOL_SIZE};
use rayon::prelude::*;
use std::slice;

#[test]
fn test_parallel_round_robin_users() {
    conduit::telemetry::init_test_tracing();

    let (results, duration_us) = timed_block!("parallel_users", {
        (0..64usize)
            .into_par_iter()
            .map(|i| {
                let resource = Threads::round_robin()?;
                let value = (i % 251) as u8;
                let ptr = resource.allocate::<u8>(4096)?;
                unsafe { resource.memset(ptr, value, 4096)? };
                resource.get_event()?.wait()?;
                let ok = unsafe { slice::from_raw_parts(ptr, 4096) }.iter().all(|&b| b == value);
                unsafe { resource.free(ptr)? };
                Ok::<_, conduit::ResourceError>((resource.get_stream().index(), ok))
            })
            .collect::<Result<Vec<_>, _>>()
    });

    let results = results.unwrap();
    assert!(results.iter().all(|&(index, ok)| ok && index < POOL_SIZE));
    tracing::debug!(duration_us, "parallel users finished");
}

#[test]
fn test_shared_stream_keeps_enqueue_order_per_thread() {
    conduit::telemetry::init_test_tracing();
    let resource = Threads::new(9).unwrap();
    let ptr = resource.allocate::<u8>(1).unwrap();

    // Fill values in sequence; the last enqueued fill wins
    for value in 0..=200u8 {
        unsafe { resource.memset(ptr, value, 1).unwrap() };
    }
    resource.wait().unwrap();
    assert_eq!(unsafe { *ptr }, 200);
    unsafe { resource.free(ptr).unwrap() };
}
