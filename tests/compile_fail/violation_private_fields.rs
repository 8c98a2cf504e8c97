// Rationale: violation records are append-only; fields stay private so callers
// cannot rewrite a recorded violation after the fact.
use exam_proctor::Violation;

fn main() {
    let violation: Violation = unsafe { std::mem::MaybeUninit::zeroed().assume_init() };
    let _kind = violation.kind;
}
