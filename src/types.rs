/// Subject (patient) identifier.
/// Examples: `1`, `2`, `3`
pub type SubjectId = u32;
/// Electrode (channel) index within a recording.
/// Examples: `0`, `15`
pub type Electrode = u32;
/// Acquisition-ordered segment number, starting at 1.
/// Example: `143` in `1_143_0.3.wav`
pub type SegmentNumber = u32;
/// First segment number of a six-segment hour bucket.
/// Examples: `1`, `7`, `139`
pub type HourBucket = u32;
/// Recording identifier: the file name up to its first `.`.
/// Example: `1_143_0` for `1_143_0.3.wav` or `1_143_0.mat`
pub type RecordingId = String;
/// File name (or manifest-relative path) written into a manifest row.
/// Examples: `1_143_0.3.wav`, `../test_1/1_12.3.wav`
pub type FileName = String;
