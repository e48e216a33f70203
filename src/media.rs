// author: kodeholic (powered by Claude)

pub mod relay;
pub mod sink;
pub mod track;

pub use relay::{run_track_relay, RelayExit, RelayReport};
pub use sink::{PacketSink, SinkCounters, TransportSink};
pub use track::{TrackRegistry, TrackSnapshot, TrackStats};
