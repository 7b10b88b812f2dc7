// Copyright 2025 OPPO.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::IodineResult;
use log::{error, info};
use std::fmt::Display;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// A unit of periodic work. A failed run is logged and the next run happens on schedule.
pub trait LoopTask: Send + 'static {
    type Error: Display;

    fn run(&self) -> Result<(), Self::Error>;

    fn terminate(&self) -> bool;
}

/// Runs a [`LoopTask`] on a dedicated thread every `interval`, starting one interval
/// after `start`.
pub struct ScheduledExecutor {
    name: String,
    interval: Duration,
}

impl ScheduledExecutor {
    const POLL_STEP: Duration = Duration::from_millis(100);

    pub fn new(name: impl Into<String>, interval_ms: u64) -> Self {
        Self {
            name: name.into(),
            interval: Duration::from_millis(interval_ms.max(1)),
        }
    }

    pub fn start<T: LoopTask>(self, task: T) -> IodineResult<JoinHandle<()>> {
        let name = self.name.clone();
        let handle = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                info!("Scheduled task {} started, interval {:?}", name, self.interval);
                loop {
                    if !self.wait(&task) {
                        break;
                    }

                    if let Err(e) = task.run() {
                        error!("Scheduled task {} failed: {}", name, e);
                    }
                }
                info!("Scheduled task {} stopped", name);
            })?;

        Ok(handle)
    }

    // Returns false once the task asks to terminate.
    fn wait<T: LoopTask>(&self, task: &T) -> bool {
        let deadline = Instant::now() + self.interval;
        loop {
            if task.terminate() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep(Self::POLL_STEP.min(deadline - now));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountTask {
        runs: Arc<AtomicUsize>,
        stop: Arc<AtomicBool>,
    }

    impl LoopTask for CountTask {
        type Error = String;

        fn run(&self) -> Result<(), String> {
            let n = self.runs.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Err("first run fails".to_string())
            } else {
                Ok(())
            }
        }

        fn terminate(&self) -> bool {
            self.stop.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn keeps_running_after_failure_and_stops() {
        let runs = Arc::new(AtomicUsize::new(0));
        let stop = Arc::new(AtomicBool::new(false));
        let task = CountTask {
            runs: runs.clone(),
            stop: stop.clone(),
        };

        let handle = ScheduledExecutor::new("count", 10).start(task).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while runs.load(Ordering::SeqCst) < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        stop.store(true, Ordering::SeqCst);
        handle.join().unwrap();

        assert!(runs.load(Ordering::SeqCst) >= 3);
    }
}
