//! Diagnostic dump of a stack's full state.
//!
//! A dump is advisory: it is built on the failure path (or on request) and
//! never feeds back into control flow.

use std::fmt;

use serde::Serialize;

use crate::callsite::{CallSite, DiagnosticInfo};
use crate::config::ChecksumKind;
use crate::error::StackError;
use crate::stack::{Element, GUARD_BEGIN, GUARD_END, GuardedStack, POISON};

/// Classification of one slot of the allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    /// Leading or trailing guard slot.
    Guard,
    /// Live element.
    Live,
    /// Live element that still holds the poison marker.
    LivePoisoned,
    /// Reserved slot holding the poison marker.
    Poisoned,
    /// Reserved slot that should hold poison but does not.
    Dirty,
    /// Reserved slot in a build without poisoning.
    Reserved,
}

/// One slot of the allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlotEntry {
    /// Index into the raw allocation (guards included).
    pub raw_index: usize,
    /// Logical element index; `None` for guard slots.
    pub index: Option<usize>,
    pub value: Element,
    pub kind: SlotKind,
}

/// Sentinel state, struct-held and allocation-embedded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GuardReport {
    pub begin_field: Element,
    pub end_field: Element,
    pub begin_slot: Option<Element>,
    pub end_slot: Option<Element>,
    pub intact: bool,
}

/// Stored and recomputed checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChecksumReport {
    pub kind: ChecksumKind,
    pub stored: Option<u64>,
    pub computed: u64,
    pub matches: bool,
}

/// Structured report of a stack's state.
#[derive(Debug, Clone, Serialize)]
pub struct StackDump {
    pub message: String,
    pub error: Option<StackError>,
    /// Text form of `error` (`"none"` when absent).
    pub error_text: String,
    pub operation: &'static str,
    /// Call site of the operation that produced the dump.
    pub site: Option<CallSite>,
    /// Where the stack was constructed.
    pub origin: DiagnosticInfo,
    pub mode: &'static str,
    pub capacity: usize,
    pub size: usize,
    pub size_violation: bool,
    pub buffer_present: bool,
    pub guards: Option<GuardReport>,
    pub checksum: Option<ChecksumReport>,
    pub slots: Vec<SlotEntry>,
}

impl StackDump {
    /// Snapshot `stack`.
    #[must_use]
    pub fn capture(
        stack: &GuardedStack,
        error: Option<StackError>,
        message: &str,
        operation: &'static str,
        site: Option<CallSite>,
    ) -> Self {
        let level = stack.config.level();
        let buffer = stack.buffer.as_deref();

        let guards = level.guards_enabled().then(|| {
            let begin_slot = buffer.and_then(|b| b.first().copied());
            let end_slot = buffer.and_then(|b| b.last().copied());
            GuardReport {
                begin_field: stack.guard_begin,
                end_field: stack.guard_end,
                begin_slot,
                end_slot,
                intact: stack.guard_begin == GUARD_BEGIN
                    && stack.guard_end == GUARD_END
                    && begin_slot == Some(GUARD_BEGIN)
                    && end_slot == Some(GUARD_END),
            }
        });

        let checksum = match (stack.config.checksum(), buffer) {
            (Some(kind), Some(buffer)) => {
                let computed = kind.digest_slots(buffer);
                Some(ChecksumReport {
                    kind,
                    stored: stack.checksum,
                    computed,
                    matches: stack.checksum == Some(computed),
                })
            }
            _ => None,
        };

        let slots = buffer
            .map(|buffer| {
                classify_slots(
                    buffer,
                    stack.size,
                    level.guards_enabled(),
                    level.poison_enabled(),
                )
            })
            .unwrap_or_default();

        Self {
            message: message.to_string(),
            error,
            error_text: error.map_or_else(|| "none".to_string(), |err| err.to_string()),
            operation,
            site,
            origin: stack.info,
            mode: level.as_str(),
            capacity: stack.capacity,
            size: stack.size,
            size_violation: stack.size > stack.capacity,
            buffer_present: buffer.is_some(),
            guards,
            checksum,
            slots,
        }
    }

    /// Slots of the given kind.
    pub fn slots_of(&self, kind: SlotKind) -> impl Iterator<Item = &SlotEntry> {
        self.slots.iter().filter(move |slot| slot.kind == kind)
    }

    /// Serialize to a single JSON line.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

fn classify_slots(buffer: &[Element], size: usize, guards: bool, poison: bool) -> Vec<SlotEntry> {
    let offset = usize::from(guards);
    let last = buffer.len().saturating_sub(1);
    buffer
        .iter()
        .enumerate()
        .map(|(raw_index, &value)| {
            if guards && (raw_index == 0 || raw_index == last) {
                return SlotEntry {
                    raw_index,
                    index: None,
                    value,
                    kind: SlotKind::Guard,
                };
            }
            let index = raw_index - offset;
            let kind = match (index < size, poison, value == POISON) {
                (true, true, true) => SlotKind::LivePoisoned,
                (true, _, _) => SlotKind::Live,
                (false, true, true) => SlotKind::Poisoned,
                (false, true, false) => SlotKind::Dirty,
                (false, false, _) => SlotKind::Reserved,
            };
            SlotEntry {
                raw_index,
                index: Some(index),
                value,
                kind,
            }
        })
        .collect()
}

const RULE: &str = "================================";

fn bad(flag: bool) -> &'static str {
    if flag { " (BAD)" } else { "" }
}

impl fmt::Display for StackDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{RULE}")?;
        writeln!(f, "what: {}", self.message)?;
        match self.site {
            Some(site) => writeln!(f, "from: {site} {}()", self.operation)?,
            None => writeln!(f, "from: {}()", self.operation)?,
        }
        writeln!(f)?;
        writeln!(f, "stack ({})", self.error_text)?;
        writeln!(f, "{{")?;
        writeln!(f, "  init: {}", self.origin)?;
        writeln!(f, "  mode: {}", self.mode)?;
        writeln!(f, "  capacity: {}", self.capacity)?;
        writeln!(f, "  size: {}{}", self.size, bad(self.size_violation))?;

        if let Some(guards) = &self.guards {
            writeln!(
                f,
                "  guards: begin={:08x}/{} end={:08x}/{}{}",
                guards.begin_field,
                hex_or_none(guards.begin_slot),
                guards.end_field,
                hex_or_none(guards.end_slot),
                bad(!guards.intact),
            )?;
        }
        if let Some(checksum) = &self.checksum {
            writeln!(
                f,
                "  checksum: {} stored={} computed={:016x}{}",
                checksum.kind.as_str(),
                checksum
                    .stored
                    .map_or_else(|| "none".to_string(), |v| format!("{v:016x}")),
                checksum.computed,
                bad(!checksum.matches),
            )?;
        }

        if !self.buffer_present {
            writeln!(f, "  buffer [NULL]")?;
        } else {
            writeln!(f, "  buffer")?;
            writeln!(f, "  {{")?;
            for slot in &self.slots {
                match (slot.kind, slot.index) {
                    (SlotKind::Guard, _) | (_, None) => {
                        writeln!(f, "    [#] = {:08x} [GUARD]", slot.value)?;
                    }
                    (SlotKind::Live, Some(i)) => writeln!(f, "   *[{i}] = {}", slot.value)?,
                    (SlotKind::LivePoisoned, Some(i)) => {
                        writeln!(f, "   *[{i}] = {} [POISON] (BAD)", slot.value)?;
                    }
                    (SlotKind::Poisoned, Some(i)) => {
                        writeln!(f, "    [{i}] = {} [POISON]", slot.value)?;
                    }
                    (SlotKind::Dirty, Some(i)) => {
                        writeln!(f, "    [{i}] = {} [DIRTY] (BAD)", slot.value)?;
                    }
                    (SlotKind::Reserved, Some(i)) => writeln!(f, "    [{i}] = {}", slot.value)?,
                }
            }
            writeln!(f, "  }}")?;
        }
        writeln!(f, "}}")?;
        write!(f, "{RULE}")
    }
}

fn hex_or_none(value: Option<Element>) -> String {
    value.map_or_else(|| "none".to_string(), |v| format!("{v:08x}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StackConfig;
    use crate::sink::DiagnosticSink;

    fn diagnostic_stack(capacity: usize) -> GuardedStack {
        let config = StackConfig::diagnostic()
            .with_checksum(Some(ChecksumKind::Djb2))
            .with_sink(DiagnosticSink::Silent);
        GuardedStack::construct_with(capacity, config).unwrap()
    }

    #[test]
    fn requested_dump_classifies_slots() {
        let mut stack = diagnostic_stack(4);
        stack.push(10).unwrap();
        stack.push(20).unwrap();
        let dump = stack.dump();

        assert_eq!(dump.error, None);
        assert_eq!(dump.error_text, "none");
        assert_eq!(dump.slots.len(), 6);
        assert_eq!(dump.slots_of(SlotKind::Guard).count(), 2);
        let live: Vec<Element> = dump.slots_of(SlotKind::Live).map(|s| s.value).collect();
        assert_eq!(live, vec![10, 20]);
        assert_eq!(dump.slots_of(SlotKind::Poisoned).count(), 2);
        assert!(dump.guards.is_some_and(|g| g.intact));
        assert!(dump.checksum.is_some_and(|c| c.matches));
        assert!(!dump.size_violation);
    }

    #[test]
    fn dirty_reserved_slot_is_flagged() {
        let mut stack = diagnostic_stack(4);
        stack.push(1).unwrap();
        if let Some(buffer) = stack.buffer.as_mut() {
            buffer[3] = 42;
        }
        let dump = stack.dump();
        let dirty: Vec<&SlotEntry> = dump.slots_of(SlotKind::Dirty).collect();
        assert_eq!(dirty.len(), 1);
        assert_eq!(dirty[0].index, Some(2));
        assert!(dump.checksum.is_some_and(|c| !c.matches));
    }

    #[test]
    fn text_rendering_marks_failures() {
        let mut stack = diagnostic_stack(2);
        stack.push(5).unwrap();
        stack.guard_begin = 0;
        stack.size = 3;
        let dump = StackDump::capture(
            &stack,
            Some(StackError::GuardCorrupted),
            "guard sentinel overwritten",
            "push",
            None,
        );
        let text = dump.to_string();
        assert!(text.contains("what: guard sentinel overwritten"));
        assert!(text.contains("stack (canary value changed)"));
        assert!(text.contains("size: 3 (BAD)"));
        assert!(text.contains("guards: begin=00000000/8badf00d"));
        assert!(text.contains("*[0] = 5"));
        assert!(text.contains("[GUARD]"));
    }

    #[test]
    fn destroyed_stack_dumps_null_buffer() {
        let mut stack = diagnostic_stack(2);
        stack.destroy();
        let dump = stack.dump();
        assert!(!dump.buffer_present);
        assert!(dump.slots.is_empty());
        assert!(dump.to_string().contains("buffer [NULL]"));
    }

    #[test]
    fn json_rendering_parses() {
        let stack = diagnostic_stack(1);
        let json = stack.dump().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["mode"], "diagnostic");
        assert_eq!(value["capacity"], 1);
        assert_eq!(value["slots"][0]["kind"], "guard");
        assert_eq!(value["slots"][1]["kind"], "poisoned");
    }
}
