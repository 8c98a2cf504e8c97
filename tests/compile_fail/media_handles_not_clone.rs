// Rationale: the session is the sole owner of device grants; a cloned handle
// would let tracks outlive release().
use exam_proctor::MediaHandles;

fn assert_clone<T: Clone>() {}

fn main() {
    assert_clone::<MediaHandles>();
}
