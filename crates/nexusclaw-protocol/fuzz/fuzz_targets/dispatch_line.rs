#![no_main]

use libfuzzer_sys::fuzz_target;
use nexusclaw_backend::InMemoryBackend;
use nexusclaw_protocol::Dispatcher;

fuzz_target!(|data: &str| {
    let mut dispatcher = Dispatcher::new(InMemoryBackend::new());
    let _ = dispatcher.handle_line(data);
});
