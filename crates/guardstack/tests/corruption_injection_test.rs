use guardstack::{
    ChecksumKind, DiagnosticSink, DumpFormat, GUARD_BEGIN, GUARD_END, GuardedStack, LogEntry,
    LogLevel, MemorySink, SharedWriter, SlotKind, StackConfig, StackError,
};

fn diagnostic() -> (StackConfig, MemorySink) {
    let (sink, memory) = DiagnosticSink::memory();
    let config = StackConfig::diagnostic()
        .with_checksum(Some(ChecksumKind::Djb2))
        .with_sink(sink)
        .with_log_threshold(LogLevel::Trace);
    (config, memory)
}

#[test]
fn write_past_logical_end_is_guard_corruption() {
    let (config, memory) = diagnostic();
    let mut stack = GuardedStack::construct_with(1, config).unwrap();
    stack.push(1).unwrap();

    // The classic off-by-one: write slot `capacity`.
    assert!(stack.fault_injector().write_past_end(1234));

    assert_eq!(stack.pop(), Err(StackError::GuardCorrupted));
    assert_eq!(stack.size(), 1);

    let dumps = memory.dumps();
    assert_eq!(dumps.len(), 1);
    let dump = &dumps[0];
    assert_eq!(dump.error, Some(StackError::GuardCorrupted));
    assert_eq!(dump.operation, "pop");
    assert!(dump.guards.is_some_and(|g| !g.intact && g.end_slot == Some(1234)));
    assert!(dump.site.is_some_and(|s| s.file.ends_with("corruption_injection_test.rs")));
}

#[test]
fn write_before_begin_is_guard_corruption() {
    let (config, _memory) = diagnostic();
    let mut stack = GuardedStack::construct_with(4, config).unwrap();
    assert!(stack.fault_injector().write_before_begin(0));
    assert_eq!(stack.push(5), Err(StackError::GuardCorrupted));
    assert_eq!(stack.size(), 0);
}

#[test]
fn struct_sentinel_overwrite_is_guard_corruption() {
    let (config, _memory) = diagnostic();
    let mut stack = GuardedStack::construct_with(4, config).unwrap();
    stack.fault_injector().set_guard_fields(GUARD_BEGIN, GUARD_END ^ 1);
    assert_eq!(stack.push(5), Err(StackError::GuardCorrupted));
}

#[test]
fn byte_flip_in_live_slot_is_checksum_mismatch() {
    let (config, memory) = diagnostic();
    let mut stack = GuardedStack::construct_with(4, config).unwrap();
    stack.push(100).unwrap();
    stack.push(200).unwrap();

    assert!(stack.fault_injector().flip_byte(0, 2));

    assert_eq!(stack.push(300), Err(StackError::ChecksumMismatch));
    assert_eq!(stack.pop(), Err(StackError::ChecksumMismatch));
    assert_eq!(stack.size(), 2);

    let dumps = memory.dumps();
    assert_eq!(dumps.len(), 2);
    assert!(dumps[0].checksum.is_some_and(|c| !c.matches));
    assert!(dumps.iter().all(|d| d.guards.is_some_and(|g| g.intact)));
}

#[test]
fn checksum_disabled_misses_in_bounds_flip() {
    let (config, _memory) = diagnostic();
    let mut stack = GuardedStack::construct_with(4, config.with_checksum(None)).unwrap();
    stack.push(100).unwrap();
    assert!(stack.fault_injector().flip_byte(0, 0));
    assert_eq!(stack.pop(), Ok(100 ^ 0xFF));
}

#[test]
fn size_overwrite_is_reported() {
    let (config, memory) = diagnostic();
    let mut stack = GuardedStack::construct_with(2, config).unwrap();
    stack.fault_injector().set_size(7);
    assert_eq!(stack.pop(), Err(StackError::SizeExceedsCapacity));
    let dumps = memory.dumps();
    assert!(dumps[0].size_violation);
}

#[test]
fn production_has_no_slot_to_corrupt_past_the_end() {
    let (sink, memory) = DiagnosticSink::memory();
    let mut stack = GuardedStack::construct_with(2, StackConfig::production().with_sink(sink)).unwrap();
    stack.push(1).unwrap();
    stack.push(2).unwrap();
    assert!(!stack.fault_injector().write_past_end(1234));
    assert_eq!(stack.pop(), Ok(2));
    assert!(memory.dumps().is_empty());
}

#[test]
fn production_still_catches_size_violation_without_dumping() {
    let (sink, memory) = DiagnosticSink::memory();
    let mut stack = GuardedStack::construct_with(2, StackConfig::production().with_sink(sink)).unwrap();
    stack.fault_injector().set_size(3);
    assert_eq!(stack.push(1), Err(StackError::SizeExceedsCapacity));
    assert!(memory.dumps().is_empty());
    let logs = memory.logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].event, "validation_failed");
    assert_eq!(logs[0].error.as_deref(), Some("size_exceeds_capacity"));
}

#[test]
fn minimal_skips_validation_but_never_panics() {
    let (sink, memory) = DiagnosticSink::memory();
    let mut stack = GuardedStack::construct_with(2, StackConfig::minimal().with_sink(sink)).unwrap();
    stack.push(1).unwrap();
    stack.fault_injector().set_size(9);
    assert_eq!(stack.push(2), Err(StackError::SizeExceedsCapacity));
    assert_eq!(stack.pop(), Err(StackError::SizeExceedsCapacity));

    let logs = memory.logs();
    assert_eq!(logs.len(), 2);
    for (entry, operation) in logs.iter().zip(["push", "pop"]) {
        assert_eq!(entry.event, "validation_failed");
        assert_eq!(entry.error.as_deref(), Some("size_exceeds_capacity"));
        assert_eq!(entry.operation.as_deref(), Some(operation));
        assert_eq!(entry.level, LogLevel::Error);
    }
    assert!(memory.dumps().is_empty());
}

#[test]
fn destroying_a_corrupted_stack_dumps_then_releases() {
    let (config, memory) = diagnostic();
    let mut stack = GuardedStack::construct_with(2, config).unwrap();
    stack.fault_injector().write_past_end(0);
    stack.destroy();
    assert!(stack.is_destroyed());
    assert_eq!(memory.dumps().len(), 1);
    assert_eq!(memory.dumps()[0].operation, "destroy");
    stack.destroy();
    assert_eq!(memory.dumps().len(), 1);
    assert_eq!(stack.pop(), Err(StackError::NullBuffer));
}

#[test]
fn underflow_dump_shows_all_slots_poisoned() {
    let (config, memory) = diagnostic();
    let mut stack = GuardedStack::construct_with(2, config).unwrap();
    stack.push(1).unwrap();
    stack.pop().unwrap();
    assert_eq!(stack.pop(), Err(StackError::Underflow));
    let dump = &memory.dumps()[0];
    assert_eq!(dump.error_text, "boundary exceed");
    assert_eq!(dump.slots_of(SlotKind::Poisoned).count(), 2);
    assert_eq!(dump.slots_of(SlotKind::Live).count(), 0);
}

#[test]
fn lifecycle_events_are_logged_in_order() {
    let (config, memory) = diagnostic();
    let mut stack = GuardedStack::construct_with(1, config).unwrap();
    stack.push(1).unwrap();
    stack.push(2).unwrap();
    stack.pop().unwrap();
    stack.pop().unwrap();
    let _ = stack.pop();
    stack.destroy();
    assert_eq!(
        memory.events(),
        vec![
            "stack_constructed",
            "stack_grown",
            "stack_shrunk",
            "underflow",
            "stack_destroyed",
        ]
    );
    let grown = &memory.logs()[1];
    assert_eq!(grown.mode.as_deref(), Some("diagnostic"));
    assert_eq!(grown.details, Some(serde_json::json!({ "from": 1, "to": 2 })));
}

#[test]
fn log_threshold_filters_debug_events() {
    let (sink, memory) = DiagnosticSink::memory();
    let config = StackConfig::diagnostic().with_sink(sink).with_log_threshold(LogLevel::Warn);
    let mut stack = GuardedStack::construct_with(1, config.with_capacity_limit(1)).unwrap();
    stack.push(1).unwrap();
    assert_eq!(stack.push(2), Err(StackError::AllocationFailed));
    assert_eq!(memory.events(), vec!["allocation_failed"]);
}

#[test]
fn writer_sink_receives_json_dumps() {
    #[derive(Clone, Default)]
    struct Capture(std::sync::Arc<parking_lot::Mutex<Vec<u8>>>);

    impl std::io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    let capture = Capture::default();
    let config = StackConfig::diagnostic()
        .with_sink(DiagnosticSink::Writer(SharedWriter::new(capture.clone())))
        .with_dump_format(DumpFormat::Json)
        .with_log_threshold(LogLevel::Error);
    let mut stack = GuardedStack::construct_with(1, config).unwrap();
    stack.fault_injector().write_past_end(7);
    assert_eq!(stack.push(1), Err(StackError::GuardCorrupted));

    let text = String::from_utf8(capture.0.lock().clone()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    let dump: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(dump["error"], "guard_corrupted");
    let log = LogEntry::from_jsonl(lines[1]).unwrap();
    assert_eq!(log.event, "validation_failed");
    assert_eq!(log.level, LogLevel::Error);
}
