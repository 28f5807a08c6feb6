#![no_main]
use guardstack::{ChecksumKind, DiagnosticSink, GuardedStack, StackConfig, StackError};
use libfuzzer_sys::fuzz_target;

// Arbitrary raw writes into a diagnostic stack: whatever lands, push, pop,
// validate and destroy must return rather than panic, and a write over a
// guard slot must be reported as such.
fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }
    let config = StackConfig::diagnostic()
        .with_checksum(Some(ChecksumKind::Djb2))
        .with_sink(DiagnosticSink::Silent);
    let Ok(mut stack) = GuardedStack::construct_with(usize::from(data[0] % 8) + 1, config) else {
        return;
    };
    for &b in &data[1..] {
        let _ = stack.push(i32::from(b));
    }

    for chunk in data.chunks_exact(3) {
        let len = stack.fault_injector().allocation_len();
        if len == 0 {
            break;
        }
        let index = usize::from(chunk[0]) % len;
        let before = stack.dump().slots[index].value;
        let value = i32::from(chunk[1]) - i32::from(chunk[2]);
        if value == before {
            continue;
        }
        stack.fault_injector().write_raw(index, value);
        if index == 0 || index == len - 1 {
            assert_eq!(stack.validate(), Err(StackError::GuardCorrupted));
        }
        let _ = stack.pop();
        let _ = stack.push(value);
        break;
    }

    stack.destroy();
});
