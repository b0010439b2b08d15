use tracing::{debug, error};

use crate::error::Result;
use crate::progress::{Progress, ProgressListener, ProgressSource};

type Task<'a> = Box<dyn FnOnce() -> Result<()> + 'a>;

/// Ordered list of resource loads with join semantics.
///
/// Tasks start in registration order. The queue completes only after every
/// task reported success; the first failure stops the remaining tasks and is
/// returned once.
#[derive(Default)]
pub struct ResourceQueue<'a> {
    tasks: Vec<(String, Task<'a>)>,
}

impl<'a> ResourceQueue<'a> {
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    pub fn add(&mut self, label: impl Into<String>, task: impl FnOnce() -> Result<()> + 'a) {
        self.tasks.push((label.into(), Box::new(task)));
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn run(self, progress: &dyn ProgressListener) -> Result<()> {
        let total = self.tasks.len() as u32;
        for (index, (label, task)) in self.tasks.into_iter().enumerate() {
            debug!("Loading {}", label);
            if let Err(e) = task() {
                error!("Failed to load {}: {}", label, e);
                return Err(e);
            }
            progress.report(
                Progress::new(ProgressSource::Default, index as u32 + 1, total).with_label(label),
            );
        }
        Ok(())
    }
}
