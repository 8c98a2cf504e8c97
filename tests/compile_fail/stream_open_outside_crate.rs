// Rationale: device grants are only issued through MediaHandles::acquire, so
// the per-track constructors stay crate-private.
use exam_proctor::media::VideoStream;

fn main() {
    let _stream = VideoStream::open("stub://camera0");
}
