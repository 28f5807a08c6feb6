//! Scripted stack sessions.
//!
//! Each [`Scenario`] constructs its own stacks against an in-memory sink,
//! drives them through a fixed sequence, and compares every result with the
//! expected one. The first divergence ends the session and becomes the
//! outcome's `failure`.

use std::fmt;

use serde::Serialize;

use guardstack::{
    CallSite, ChecksumKind, DiagnosticInfo, DiagnosticSink, Element, GuardedStack,
    InstrumentationLevel, LogLevel, MemorySink, POISON, SinkRecord, StackConfig, StackError,
};

/// A scripted stack session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scenario {
    /// construct(1), push 1, push 2, pop, pop, pop on empty.
    Demo,
    Lifo,
    EmptyPop,
    ConstructZero,
    NullHandle,
    Growth,
    Shrink,
    AllocationFailure,
    /// One slot written past the end of the buffer, then a pop.
    StrayWrite,
    GuardUnderrun,
    ChecksumFlip,
    SizeOverwrite,
    UseAfterDestroy,
    DoubleDestroy,
}

impl Scenario {
    pub const ALL: [Self; 14] = [
        Self::Demo,
        Self::Lifo,
        Self::EmptyPop,
        Self::ConstructZero,
        Self::NullHandle,
        Self::Growth,
        Self::Shrink,
        Self::AllocationFailure,
        Self::StrayWrite,
        Self::GuardUnderrun,
        Self::ChecksumFlip,
        Self::SizeOverwrite,
        Self::UseAfterDestroy,
        Self::DoubleDestroy,
    ];

    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Demo => "demo",
            Self::Lifo => "lifo",
            Self::EmptyPop => "empty_pop",
            Self::ConstructZero => "construct_zero",
            Self::NullHandle => "null_handle",
            Self::Growth => "growth",
            Self::Shrink => "shrink",
            Self::AllocationFailure => "alloc_failure",
            Self::StrayWrite => "stray_write",
            Self::GuardUnderrun => "guard_underrun",
            Self::ChecksumFlip => "checksum_flip",
            Self::SizeOverwrite => "size_overwrite",
            Self::UseAfterDestroy => "use_after_destroy",
            Self::DoubleDestroy => "double_destroy",
        }
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Demo => "grow from capacity 1, drain, then underflow",
            Self::Lifo => "values come back in reverse push order",
            Self::EmptyPop => "pop on empty reports underflow and changes nothing",
            Self::ConstructZero => "zero initial capacity is rejected",
            Self::NullHandle => "validating a missing stack reports a null stack",
            Self::Growth => "a full stack doubles on push and keeps its values",
            Self::Shrink => "sparse stack halves down to its initial capacity",
            Self::AllocationFailure => "failed growth leaves the stack untouched",
            Self::StrayWrite => "write one slot past the end, next pop sees the guard",
            Self::GuardUnderrun => "write one slot before the start, next push sees the guard",
            Self::ChecksumFlip => "flip a byte inside a live slot, next pop sees the checksum",
            Self::SizeOverwrite => "size forced above capacity is refused",
            Self::UseAfterDestroy => "push and pop after destroy report a null buffer",
            Self::DoubleDestroy => "destroying twice is harmless",
        }
    }

    /// Look up a scenario by [`id`](Self::id) (case-insensitive).
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|scenario| scenario.id().eq_ignore_ascii_case(id.trim()))
    }

    /// Whether the level carries the detector the scenario exercises.
    #[must_use]
    pub const fn applies_to(self, level: InstrumentationLevel) -> bool {
        match self {
            Self::StrayWrite | Self::GuardUnderrun | Self::ChecksumFlip => {
                level.guards_enabled()
            }
            Self::SizeOverwrite => level.validation_enabled(),
            _ => true,
        }
    }

    /// Run the session under `level`.
    #[must_use]
    pub fn run(self, level: InstrumentationLevel, checksum: ChecksumKind) -> ScenarioOutcome {
        let mut session = Session::new(self, level, checksum);
        let mut result = match self {
            Self::Demo => demo(&mut session),
            Self::Lifo => lifo(&mut session),
            Self::EmptyPop => empty_pop(&mut session),
            Self::ConstructZero => construct_zero(&mut session),
            Self::NullHandle => null_handle(&mut session),
            Self::Growth => growth(&mut session),
            Self::Shrink => shrink(&mut session),
            Self::AllocationFailure => allocation_failure(&mut session),
            Self::StrayWrite => stray_write(&mut session),
            Self::GuardUnderrun => guard_underrun(&mut session),
            Self::ChecksumFlip => checksum_flip(&mut session),
            Self::SizeOverwrite => size_overwrite(&mut session),
            Self::UseAfterDestroy => use_after_destroy(&mut session),
            Self::DoubleDestroy => double_destroy(&mut session),
        };

        let dumps = session.memory.dumps().len();
        if result.is_ok() && !level.dumps_enabled() && dumps != 0 {
            result = Err(format!("{dumps} dump(s) emitted at level {}", level.as_str()));
        }
        session.finish(result)
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Result of one scenario under one level.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioOutcome {
    pub scenario: &'static str,
    pub mode: &'static str,
    pub passed: bool,
    /// `step -> result` lines, in execution order.
    pub transcript: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    pub dumps: usize,
    /// Log events the stacks emitted.
    pub events: Vec<String>,
    /// Everything the stacks sent to their sink.
    #[serde(skip)]
    pub records: Vec<SinkRecord>,
}

type Step = Result<(), String>;

struct Session {
    scenario: Scenario,
    level: InstrumentationLevel,
    checksum: ChecksumKind,
    sink: DiagnosticSink,
    memory: MemorySink,
    transcript: Vec<String>,
}

impl Session {
    fn new(scenario: Scenario, level: InstrumentationLevel, checksum: ChecksumKind) -> Self {
        let (sink, memory) = DiagnosticSink::memory();
        Self {
            scenario,
            level,
            checksum,
            sink,
            memory,
            transcript: Vec::new(),
        }
    }

    fn config(&self) -> StackConfig {
        StackConfig::new(self.level)
            .with_checksum(Some(self.checksum))
            .with_sink(self.sink.clone())
            .with_log_threshold(LogLevel::Debug)
    }

    #[track_caller]
    fn construct(&mut self, capacity: usize) -> Result<GuardedStack, String> {
        let config = self.config();
        self.construct_with(capacity, config)
    }

    #[track_caller]
    fn construct_with(
        &mut self,
        capacity: usize,
        config: StackConfig,
    ) -> Result<GuardedStack, String> {
        let info = DiagnosticInfo::named(
            CallSite::caller(),
            module_path!(),
            self.scenario.id(),
        );
        match GuardedStack::construct_named(capacity, config, info) {
            Ok(stack) => {
                self.transcript.push(format!("construct({capacity}) -> ok"));
                Ok(stack)
            }
            Err(err) => self.fail(format!("construct({capacity}) -> {}", err.code())),
        }
    }

    fn check<T: PartialEq + fmt::Debug>(
        &mut self,
        step: impl Into<String>,
        actual: guardstack::Result<T>,
        expected: guardstack::Result<T>,
    ) -> Step {
        let line = format!("{} -> {}", step.into(), render(&actual));
        if actual == expected {
            self.transcript.push(line);
            Ok(())
        } else {
            self.fail(format!("{line} (expected {})", render(&expected)))
        }
    }

    fn ensure(&mut self, step: impl Into<String>, holds: bool) -> Step {
        let step = step.into();
        if holds {
            self.transcript.push(format!("{step} -> ok"));
            Ok(())
        } else {
            self.fail(format!("{step} -> does not hold"))
        }
    }

    fn shape(&mut self, stack: &GuardedStack, size: usize, capacity: usize) -> Step {
        self.check(
            "shape",
            Ok((stack.size(), stack.capacity())),
            Ok((size, capacity)),
        )
    }

    fn push_all(
        &mut self,
        stack: &mut GuardedStack,
        values: impl IntoIterator<Item = Element>,
    ) -> Step {
        let mut count = 0_usize;
        for value in values {
            if let Err(err) = stack.push(value) {
                return self.fail(format!("push({value}) -> {} after {count} pushes", err.code()));
            }
            count += 1;
        }
        self.transcript.push(format!("push x{count} -> ok"));
        Ok(())
    }

    fn pop_expect(
        &mut self,
        stack: &mut GuardedStack,
        expected: impl IntoIterator<Item = Element>,
    ) -> Step {
        let mut count = 0_usize;
        for value in expected {
            let actual = stack.pop();
            if actual != Ok(value) {
                return self.fail(format!(
                    "pop() -> {} after {count} pops (expected {value})",
                    render(&actual)
                ));
            }
            count += 1;
        }
        self.transcript.push(format!("pop x{count} -> ok"));
        Ok(())
    }

    /// Diagnostic levels must have dumped `err`; other levels must not dump at all.
    fn expect_dump(&mut self, err: StackError) -> Step {
        let dumped = self
            .memory
            .dumps()
            .iter()
            .any(|dump| dump.error == Some(err));
        if self.level.dumps_enabled() {
            self.ensure(format!("dump({})", err.code()), dumped)
        } else {
            Ok(())
        }
    }

    fn fail<T>(&mut self, line: String) -> Result<T, String> {
        self.transcript.push(line.clone());
        Err(line)
    }

    fn finish(self, result: Step) -> ScenarioOutcome {
        ScenarioOutcome {
            scenario: self.scenario.id(),
            mode: self.level.as_str(),
            passed: result.is_ok(),
            transcript: self.transcript,
            failure: result.err(),
            dumps: self.memory.dumps().len(),
            events: self.memory.events(),
            records: self.memory.records(),
        }
    }
}

fn render<T: fmt::Debug>(result: &guardstack::Result<T>) -> String {
    match result {
        Ok(value) => format!("{value:?}"),
        Err(err) => err.code().to_string(),
    }
}

fn demo(s: &mut Session) -> Step {
    let mut stk = s.construct(1)?;
    s.check("push(1)", stk.push(1), Ok(()))?;
    s.shape(&stk, 1, 1)?;
    s.check("push(2)", stk.push(2), Ok(()))?;
    s.shape(&stk, 2, 2)?;
    s.check("pop()", stk.pop(), Ok(2))?;
    s.check("pop()", stk.pop(), Ok(1))?;
    s.check("pop()", stk.pop(), Err(StackError::Underflow))?;
    s.expect_dump(StackError::Underflow)?;
    stk.destroy();
    Ok(())
}

fn lifo(s: &mut Session) -> Step {
    let mut stk = s.construct(3)?;
    for value in [0, -1, Element::MAX, Element::MIN, POISON] {
        s.check(format!("push({value})"), stk.push(value), Ok(()))?;
        s.check("pop()", stk.pop(), Ok(value))?;
    }
    s.push_all(&mut stk, 0..64)?;
    s.pop_expect(&mut stk, (0..64).rev())?;
    s.shape(&stk, 0, 3)?;
    stk.destroy();
    Ok(())
}

fn empty_pop(s: &mut Session) -> Step {
    let mut stk = s.construct(4)?;
    let checksum = stk.checksum();
    s.check("pop()", stk.pop(), Err(StackError::Underflow))?;
    s.shape(&stk, 0, 4)?;
    s.ensure("checksum unchanged", stk.checksum() == checksum)?;
    s.expect_dump(StackError::Underflow)?;
    s.check("push(9)", stk.push(9), Ok(()))?;
    s.check("pop()", stk.pop(), Ok(9))?;
    stk.destroy();
    Ok(())
}

fn construct_zero(s: &mut Session) -> Step {
    let config = s.config();
    let outcome = GuardedStack::construct_with(0, config).map(|_| ());
    s.check("construct(0)", outcome, Err(StackError::NullStack))?;
    s.expect_dump(StackError::NullStack)
}

fn null_handle(s: &mut Session) -> Step {
    s.check("validate(none)", guardstack::validate(None), Err(StackError::NullStack))?;
    let mut stk = s.construct(2)?;
    s.check("validate(stk)", guardstack::validate(Some(&stk)), Ok(()))?;
    stk.destroy();
    Ok(())
}

fn growth(s: &mut Session) -> Step {
    let mut stk = s.construct(4)?;
    s.push_all(&mut stk, 0..4)?;
    s.shape(&stk, 4, 4)?;
    s.check("push(4)", stk.push(4), Ok(()))?;
    s.ensure("capacity doubled", stk.capacity() >= 8)?;
    s.pop_expect(&mut stk, (0..5).rev())?;
    stk.destroy();
    Ok(())
}

fn shrink(s: &mut Session) -> Step {
    let mut stk = s.construct(1)?;
    s.push_all(&mut stk, (0..20).map(|v| v * 3))?;
    s.shape(&stk, 20, 32)?;
    // 10 of 32 is above the threshold, 9 of 32 is not.
    s.pop_expect(&mut stk, (10..20).rev().map(|v| v * 3))?;
    s.shape(&stk, 10, 32)?;
    s.check("pop()", stk.pop(), Ok(27))?;
    s.shape(&stk, 9, 16)?;
    s.pop_expect(&mut stk, (0..9).rev().map(|v| v * 3))?;
    s.shape(&stk, 0, 1)?;
    stk.destroy();
    Ok(())
}

fn allocation_failure(s: &mut Session) -> Step {
    let config = s.config().with_capacity_limit(4);
    let mut stk = s.construct_with(2, config)?;
    s.push_all(&mut stk, [10, 20, 30, 40])?;
    s.check("push(50)", stk.push(50), Err(StackError::AllocationFailed))?;
    s.shape(&stk, 4, 4)?;
    s.check("validate", stk.validate(), Ok(()))?;
    s.expect_dump(StackError::AllocationFailed)?;
    s.pop_expect(&mut stk, [40, 30, 20, 10])?;
    stk.destroy();
    Ok(())
}

fn stray_write(s: &mut Session) -> Step {
    let mut stk = s.construct(1)?;
    s.check("push(1)", stk.push(1), Ok(()))?;
    let hit = stk.fault_injector().write_past_end(1234);
    s.ensure("write_past_end(1234)", hit)?;
    s.check("pop()", stk.pop(), Err(StackError::GuardCorrupted))?;
    s.shape(&stk, 1, 1)?;
    s.expect_dump(StackError::GuardCorrupted)?;
    stk.destroy();
    s.ensure("destroyed", stk.is_destroyed())
}

fn guard_underrun(s: &mut Session) -> Step {
    let mut stk = s.construct(4)?;
    let hit = stk.fault_injector().write_before_begin(0);
    s.ensure("write_before_begin(0)", hit)?;
    s.check("push(5)", stk.push(5), Err(StackError::GuardCorrupted))?;
    s.shape(&stk, 0, 4)?;
    s.expect_dump(StackError::GuardCorrupted)?;
    stk.destroy();
    Ok(())
}

fn checksum_flip(s: &mut Session) -> Step {
    let mut stk = s.construct(4)?;
    s.push_all(&mut stk, [100, 200])?;
    let hit = stk.fault_injector().flip_byte(1, 0);
    s.ensure("flip_byte(1, 0)", hit)?;
    s.check("pop()", stk.pop(), Err(StackError::ChecksumMismatch))?;
    s.check("push(300)", stk.push(300), Err(StackError::ChecksumMismatch))?;
    s.shape(&stk, 2, 4)?;
    s.expect_dump(StackError::ChecksumMismatch)?;
    stk.destroy();
    Ok(())
}

fn size_overwrite(s: &mut Session) -> Step {
    let mut stk = s.construct(2)?;
    s.check("push(1)", stk.push(1), Ok(()))?;
    stk.fault_injector().set_size(7);
    s.check("push(2)", stk.push(2), Err(StackError::SizeExceedsCapacity))?;
    s.check("pop()", stk.pop(), Err(StackError::SizeExceedsCapacity))?;
    s.expect_dump(StackError::SizeExceedsCapacity)?;
    stk.destroy();
    s.ensure("destroyed", stk.is_destroyed())
}

fn use_after_destroy(s: &mut Session) -> Step {
    let mut stk = s.construct(2)?;
    s.check("push(1)", stk.push(1), Ok(()))?;
    stk.destroy();
    s.check("push(2)", stk.push(2), Err(StackError::NullBuffer))?;
    s.check("pop()", stk.pop(), Err(StackError::NullBuffer))?;
    s.check("validate", stk.validate(), Err(StackError::NullBuffer))?;
    s.expect_dump(StackError::NullBuffer)
}

fn double_destroy(s: &mut Session) -> Step {
    let mut stk = s.construct(2)?;
    s.check("push(1)", stk.push(1), Ok(()))?;
    stk.destroy();
    stk.destroy();
    s.ensure("destroyed", stk.is_destroyed())?;
    s.shape(&stk, 0, 0)?;
    let dumps = s.memory.dumps().len();
    s.ensure("no dumps", dumps == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEVELS: [InstrumentationLevel; 3] = [
        InstrumentationLevel::Diagnostic,
        InstrumentationLevel::Production,
        InstrumentationLevel::Minimal,
    ];

    #[test]
    fn ids_are_unique_and_resolvable() {
        for scenario in Scenario::ALL {
            assert_eq!(Scenario::from_id(scenario.id()), Some(scenario));
        }
        assert_eq!(Scenario::from_id(" STRAY_WRITE "), Some(Scenario::StrayWrite));
        assert_eq!(Scenario::from_id("nope"), None);
    }

    #[test]
    fn every_applicable_scenario_passes() {
        for level in LEVELS {
            for scenario in Scenario::ALL.into_iter().filter(|s| s.applies_to(level)) {
                let outcome = scenario.run(level, ChecksumKind::Djb2);
                assert!(
                    outcome.passed,
                    "{scenario} @ {}: {:?}\n{}",
                    level.as_str(),
                    outcome.failure,
                    outcome.transcript.join("\n")
                );
            }
        }
    }

    #[test]
    fn detector_scenarios_are_diagnostic_only() {
        assert!(Scenario::StrayWrite.applies_to(InstrumentationLevel::Diagnostic));
        assert!(!Scenario::StrayWrite.applies_to(InstrumentationLevel::Production));
        assert!(Scenario::SizeOverwrite.applies_to(InstrumentationLevel::Production));
        assert!(!Scenario::SizeOverwrite.applies_to(InstrumentationLevel::Minimal));
    }

    #[test]
    fn stray_write_transcript_and_records() {
        let outcome = Scenario::StrayWrite.run(InstrumentationLevel::Diagnostic, ChecksumKind::Djb2);
        assert!(outcome.passed);
        assert!(outcome.transcript.contains(&"pop() -> guard_corrupted".to_string()));
        // Once for the failed pop, once more when destroy finds the guard still broken.
        assert_eq!(outcome.dumps, 2);
        assert!(outcome.events.iter().any(|e| e == "validation_failed"));
        assert!(outcome.records.len() >= outcome.dumps + outcome.events.len());
    }

    #[test]
    fn failure_is_reported_not_panicked() {
        // Forced mismatch: a guard scenario has nothing to detect in production.
        let outcome =
            Scenario::StrayWrite.run(InstrumentationLevel::Production, ChecksumKind::Djb2);
        assert!(!outcome.passed);
        assert_eq!(
            outcome.failure.as_deref(),
            Some("write_past_end(1234) -> does not hold")
        );
    }
}
