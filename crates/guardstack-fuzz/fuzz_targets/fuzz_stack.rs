#![no_main]
use guardstack::{DiagnosticSink, GuardedStack, InstrumentationLevel, StackConfig, StackError};
use libfuzzer_sys::fuzz_target;

// Byte 0 picks the level and initial capacity; each following 5-byte chunk is
// one op (tag + little-endian i32 payload), checked against a Vec model.
fuzz_target!(|data: &[u8]| {
    let Some((&head, ops)) = data.split_first() else {
        return;
    };
    let level = match head % 3 {
        0 => InstrumentationLevel::Diagnostic,
        1 => InstrumentationLevel::Production,
        _ => InstrumentationLevel::Minimal,
    };
    let initial = usize::from(head >> 2).max(1);
    let config = StackConfig::new(level)
        .with_sink(DiagnosticSink::Silent)
        .with_capacity_limit(1 << 16);
    let Ok(mut stack) = GuardedStack::construct_with(initial, config) else {
        return;
    };
    let mut model: Vec<i32> = Vec::new();

    for chunk in ops.chunks_exact(5) {
        let value = i32::from_le_bytes([chunk[1], chunk[2], chunk[3], chunk[4]]);
        match chunk[0] % 4 {
            0 | 1 => match stack.push(value) {
                Ok(()) => model.push(value),
                Err(err) => assert_eq!(err, StackError::AllocationFailed),
            },
            2 => {
                let expected = model.pop().ok_or(StackError::Underflow);
                assert_eq!(stack.pop(), expected);
            }
            _ => assert_eq!(stack.validate(), Ok(())),
        }
        assert_eq!(stack.size(), model.len());
        assert!(stack.size() <= stack.capacity());
        assert!(stack.capacity() >= initial);
    }

    stack.destroy();
    assert_eq!(stack.pop(), Err(StackError::NullBuffer));
});
