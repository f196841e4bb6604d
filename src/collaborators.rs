//! Capability traits for the collaborators spec.md §1 and §6 describe only
//! as external interfaces the core consumes: progress reporting, run
//! metadata, checkpoint file naming, and the plot-log stream. None of these
//! types perform file I/O — that's left to whatever the host crate wires in;
//! the `Noop*` implementations are what [`crate::simulator::Simulator`] uses
//! when a collaborator isn't supplied.

/// `start`/`update`/`end` over the course of one run (spec.md §4.6).
pub trait ProgressReporter {
    fn start(&mut self, _max_time: f64) {}
    fn update(&mut self, _time: f64) {}
    fn end(&mut self) {}
}

#[derive(Debug, Default)]
pub struct NoopProgress;
impl ProgressReporter for NoopProgress {}

/// Mirrors `de_sim`'s `RunMetadata` (ip address, start time, run duration).
#[derive(Debug, Default, Clone)]
pub struct RunMetadata {
    pub ip_address: Option<String>,
    pub start_time: Option<f64>,
    pub run_time: Option<f64>,
}

impl RunMetadata {
    pub fn record_ip_address(&mut self, ip: impl Into<String>) {
        self.ip_address = Some(ip.into());
    }
    pub fn record_start(&mut self, time: f64) {
        self.start_time = Some(time);
    }
    pub fn record_run_time(&mut self, duration_secs: f64) {
        self.run_time = Some(duration_secs);
    }
}

/// Mirrors `de_sim`'s `AuthorMetadata`.
#[derive(Debug, Default, Clone)]
pub struct AuthorMetadata {
    pub name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub organization: Option<String>,
}

/// Called by the simulator just before the main loop and once after, to
/// stamp start time and run duration (spec.md §4.6).
pub trait MetadataCollector {
    fn record_start(&mut self, _run: &mut RunMetadata) {}
    fn record_run_time(&mut self, _run: &mut RunMetadata, _duration_secs: f64) {}
}

#[derive(Debug, Default)]
pub struct NoopMetadata;
impl MetadataCollector for NoopMetadata {}

/// Checkpoint file-naming contract (spec.md §6): files are named
/// `<time>.<ext>` where `<time>` is formatted to a configured decimal
/// precision, and `parse(name) == time` within floating-point equivalence
/// must hold.
pub trait CheckpointStore {
    fn filename_for(&self, time: f64, precision: usize) -> String {
        format!("{:.*}", precision, time)
    }

    /// Round-trip check matching `de_sim/checkpoint.py`'s
    /// `get_filename`/`math.isclose` guarantee.
    fn round_trips(&self, time: f64, precision: usize) -> bool {
        let name = self.filename_for(time, precision);
        match name.parse::<f64>() {
            Ok(parsed) => (parsed - time).abs() <= 10f64.powi(-(precision as i32)),
            Err(_) => false,
        }
    }

    fn list_checkpoints(&self) -> Vec<f64> {
        Vec::new()
    }
}

#[derive(Debug, Default)]
pub struct NoopCheckpoints;
impl CheckpointStore for NoopCheckpoints {}

/// The plot-log stream named alongside the debug log in spec.md §4.6; kept
/// distinct from `log::debug!` because its output is a structured
/// trajectory export, not diagnostics.
pub trait PlotLog {
    fn log_line(&mut self, _line: &str) {}
}

#[derive(Debug, Default)]
pub struct NoopPlotLog;
impl PlotLog for NoopPlotLog {}

#[cfg(test)]
mod tests {
    use super::*;

    struct PrecisionCheckpoints;
    impl CheckpointStore for PrecisionCheckpoints {}

    #[test]
    fn checkpoint_filename_round_trips() {
        let store = PrecisionCheckpoints;
        assert!(store.round_trips(12.345, 3));
        assert_eq!(store.filename_for(12.345, 3), "12.345");
    }

    #[test]
    fn run_metadata_records_fields() {
        let mut meta = RunMetadata::default();
        meta.record_start(0.0);
        meta.record_run_time(1.5);
        assert_eq!(meta.run_time, Some(1.5));
    }
}
