use std::path::PathBuf;

use crate::error::{DesimError, Result};

/// The validated parameter bundle consumed by [`crate::simulator::Simulator`]
/// (spec.md §6, §4.6 C7).
pub struct SimulationConfig {
    pub max_time: f64,
    pub time_init: f64,
    pub random_seed: Option<u64>,
    pub stop_condition: Option<Box<dyn Fn(f64) -> bool>>,
    pub output_dir: Option<PathBuf>,
    pub progress: bool,
    pub profile: bool,
    pub object_memory_change_interval: u64,
}

impl SimulationConfig {
    pub fn new(max_time: f64) -> Self {
        Self {
            max_time,
            time_init: 0.0,
            random_seed: None,
            stop_condition: None,
            output_dir: None,
            progress: false,
            profile: false,
            object_memory_change_interval: 0,
        }
    }

    pub fn time_init(mut self, time_init: f64) -> Self {
        self.time_init = time_init;
        self
    }

    pub fn random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    pub fn stop_condition<F>(mut self, f: F) -> Self
    where
        F: Fn(f64) -> bool + 'static,
    {
        self.stop_condition = Some(Box::new(f));
        self
    }

    pub fn output_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn progress(mut self, enabled: bool) -> Self {
        self.progress = enabled;
        self
    }

    pub fn profile(mut self, enabled: bool) -> Self {
        self.profile = enabled;
        self
    }

    pub fn object_memory_change_interval(mut self, interval: u64) -> Self {
        self.object_memory_change_interval = interval;
        self
    }

    /// `max_time > time_init`; `output_dir`, if given, must already exist
    /// (spec.md §6).
    pub fn validate(&self) -> Result<()> {
        if self.max_time.is_nan() || self.time_init.is_nan() {
            return Err(DesimError::NaNTime);
        }
        if !(self.max_time > self.time_init) {
            return Err(DesimError::ConfigError(format!(
                "max_time ({}) must be greater than time_init ({})",
                self.max_time, self.time_init
            )));
        }
        if let Some(dir) = &self.output_dir {
            if !dir.is_dir() {
                return Err(DesimError::ConfigError(format!(
                    "output_dir '{}' is not an existing directory",
                    dir.display()
                )));
            }
        }
        Ok(())
    }
}
