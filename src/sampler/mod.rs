use std::path::PathBuf;

use crate::artifact::{libmap, samples};
use crate::config::Config;
use crate::error::{DataError, DataResult, SamplerError};
use crate::ffi::syscall::{ignore_handler, install_handler, restore_default_handler};
use crate::map::MemoryMap;
use crate::table::CounterTable;

mod cycles;
mod handler;
mod timer;


use timer::TimerSource;

/// Sampler lifecycle states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Uninitialized,
    Initialized,
    Running,
    Stopped,
}

/// The per-process sampling runtime.
///
/// Owns the counter table, the memory-map snapshot and the interrupt
/// source; the signal handler reaches the table through process-wide
/// atomics published at [`start`](Self::start).
///
/// Lifecycle: `Uninitialized → init → Initialized → start → Running
/// → stop → Stopped → finalize → Uninitialized`; `finalize` is
/// accepted from any state and is idempotent.
pub struct Sampler {
    state: State,
    config: Config,
    table: Option<Box<CounterTable>>,
    map: Option<MemoryMap>,
    timer: Option<TimerSource>,
}

impl Sampler {
    pub fn new() -> Self {
        Sampler {
            state: State::Uninitialized,
            config: Config::default(),
            table: None,
            map: None,
            timer: None,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Snapshots the memory map, allocates the counter table and opens
    /// the interrupt source.
    pub fn init(&mut self, config: Config) -> Result<(), SamplerError> {
        if self.state != State::Uninitialized {
            return Err(SamplerError::StateError {
                op: "init",
                state: self.state,
            });
        }
        let map = MemoryMap::snapshot().map_err(SamplerError::InitFailure)?;
        let timer = TimerSource::open(config.timer_method, config.frequency_hz)?;
        tracing::debug!(
            frequency_hz = config.frequency_hz,
            source = timer.describe(),
            "sampler initialized"
        );
        self.table = Some(Box::new(CounterTable::with_default_capacity()));
        self.map = Some(map);
        self.timer = Some(timer);
        self.config = config;
        self.state = State::Initialized;
        Ok(())
    }

    /// Installs the signal handler and arms the interrupt source.
    pub fn start(&mut self) -> Result<(), SamplerError> {
        if !matches!(self.state, State::Initialized | State::Stopped) {
            return Err(SamplerError::StateError {
                op: "start",
                state: self.state,
            });
        }
        let (Some(table), Some(timer)) = (self.table.as_mut(), self.timer.as_mut()) else {
            return Err(SamplerError::StateError {
                op: "start",
                state: self.state,
            });
        };
        handler::publish(
            &mut **table as *mut CounterTable,
            self.config.max_stack_depth,
            self.config.enable_unwinding,
        );
        install_handler(libc::SIGPROF, handler::on_sample).map_err(SamplerError::InitFailure)?;
        timer.arm()?;
        self.state = State::Running;
        Ok(())
    }

    /// Disarms the interrupt source; sampling can be resumed with
    /// [`start`](Self::start).
    pub fn stop(&mut self) -> Result<(), SamplerError> {
        if self.state != State::Running {
            return Err(SamplerError::StateError {
                op: "stop",
                state: self.state,
            });
        }
        if let Some(timer) = self.timer.as_mut() {
            timer.disarm()?;
        }
        self.state = State::Stopped;
        Ok(())
    }

    /// Samples recorded so far.
    pub fn sample_count(&self) -> u64 {
        self.table.as_ref().map_or(0, |t| t.total())
    }

    /// Samples dropped because the table was full.
    pub fn dropped_count(&self) -> u64 {
        self.table.as_ref().map_or(0, |t| t.dropped())
    }

    pub fn table(&self) -> Option<&CounterTable> {
        self.table.as_deref()
    }

    pub fn memory_map(&self) -> Option<&MemoryMap> {
        self.map.as_ref()
    }

    /// Writes the per-rank artifacts and returns their paths.
    pub fn write_output(&self, rank: i32) -> DataResult<(PathBuf, PathBuf)> {
        let (Some(table), Some(map)) = (self.table.as_deref(), self.map.as_ref()) else {
            return Err(DataError::Integrity(
                "sampler holds no sample table".to_owned(),
            ));
        };
        let dir = &self.config.output_dir;
        std::fs::create_dir_all(dir).map_err(|source| DataError::FileOpen {
            path: dir.clone(),
            source,
        })?;

        let stem = format!("{}_rank_{rank}", self.config.output_stem);
        let sample_path = dir.join(format!("{stem}.bin"));
        let libmap_path = dir.join(format!("{stem}.libmap"));
        let text_path = dir.join(format!("{stem}.txt"));

        samples::write_sample_table(
            &sample_path,
            table,
            self.config.max_stack_depth as u32,
            self.config.compress_output,
        )?;
        libmap::write_memory_map(&libmap_path, map, rank as u32)?;
        samples::write_text_sidecar(&text_path, table)?;

        Ok((sample_path, libmap_path))
    }

    /// Tears the sampler down from any state: disarms the interrupt,
    /// restores the default signal disposition, writes the artifacts and
    /// releases every resource. Idempotent; on a write error the
    /// teardown still completes and the error is returned.
    pub fn finalize(&mut self, rank: i32) -> DataResult<()> {
        if let Some(mut timer) = self.timer.take() {
            if self.state == State::Running {
                if let Err(err) = timer.disarm() {
                    tracing::warn!(error = %err, "failed to disarm interrupt source");
                }
            }
            drop(timer);
            // A tick generated just before the disarm may still be in
            // flight; ignore it rather than let SIG_DFL terminate us.
            let _ = ignore_handler(libc::SIGPROF);
            let _ = restore_default_handler(libc::SIGPROF);
        }
        handler::unpublish();

        let mut result = Ok(());
        if self.table.is_some() {
            if rank < 0 {
                tracing::warn!("rank was never identified, artifacts use rank -1");
            }
            match self.write_output(rank) {
                Ok((sample_path, _)) => {
                    eprintln!(
                        "perflow: rank {rank}: {} samples collected, {} dropped -> {}",
                        self.sample_count(),
                        self.dropped_count(),
                        sample_path.display()
                    );
                }
                Err(err) => result = Err(err),
            }
        }

        self.map = None;
        self.table = None;
        self.state = State::Uninitialized;
        result
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new()
    }
}
