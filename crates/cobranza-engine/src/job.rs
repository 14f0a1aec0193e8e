//! One worker thread, and one host instance, per job.

use std::any::Any;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use cobranza_host::HostFactory;

use crate::assemble::{self, ExportJob, GeneratedDocument};
use crate::config::Config;
use crate::pipeline::{CopyOptions, CopyOutcome, CopyPipeline};
use crate::progress::{Progress, ProgressSink};
use crate::{Error, Result};

static NEXT_JOB: AtomicU64 = AtomicU64::new(1);

/// Handle to a running job. Dropping it detaches the worker; the job still runs to the end.
pub struct JobHandle<T> {
    name: String,
    handle: JoinHandle<Result<T>>,
}

impl<T> JobHandle<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the job and return its result.
    pub fn join(self) -> Result<T> {
        self.handle
            .join()
            .map_err(|payload| Error::WorkerPanicked(panic_message(payload.as_ref())))?
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[derive(Clone)]
pub struct JobRunner {
    factory: Arc<dyn HostFactory>,
    config: Arc<Config>,
}

impl JobRunner {
    pub fn new(factory: Arc<dyn HostFactory>, config: Arc<Config>) -> Self {
        Self { factory, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn spawn<T, F>(&self, kind: &str, work: F) -> Result<JobHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce(&dyn HostFactory, &Config) -> Result<T> + Send + 'static,
    {
        let name = format!("cobranza-{kind}-{}", NEXT_JOB.fetch_add(1, Ordering::Relaxed));
        let factory = Arc::clone(&self.factory);
        let config = Arc::clone(&self.config);
        let thread_name = name.clone();
        let handle = thread::Builder::new().name(name.clone()).spawn(move || {
            log::debug!("[job] {thread_name} started");
            let result = work(factory.as_ref(), config.as_ref());
            match &result {
                Ok(_) => log::debug!("[job] {thread_name} finished"),
                Err(err) => log::warn!("[job] {thread_name} failed: {err}"),
            }
            result
        })?;
        Ok(JobHandle { name, handle })
    }

    pub fn spawn_copy(
        &self,
        source: PathBuf,
        master: PathBuf,
        options: CopyOptions,
        sink: Option<Arc<dyn ProgressSink>>,
    ) -> Result<JobHandle<CopyOutcome>> {
        self.spawn("copy", move |factory, config| {
            let progress = Progress::new(sink.as_deref());
            CopyPipeline::new(factory, config).run(&source, &master, &options, &progress)
        })
    }

    pub fn spawn_export(
        &self,
        job: ExportJob,
        sink: Option<Arc<dyn ProgressSink>>,
    ) -> Result<JobHandle<Vec<GeneratedDocument>>> {
        self.spawn("export", move |factory, config| {
            let progress = Progress::new(sink.as_deref());
            assemble::export(factory, config, &job, &progress)
        })
    }
}
