#![no_main]

use libfuzzer_sys::fuzz_target;
use vbsel_core::EventSource;

fuzz_target!(|data: &[u8]| {
    let mut source = vbsel_io::JsonlEventSource::from_reader(data);
    // Stop at the first error; every accepted event must be pt-ordered.
    while let Ok(Some(event)) = source.next_event() {
        assert!(event.unsorted_collection().is_none());
    }
});
