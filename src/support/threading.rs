//-
// Copyright (c) 2024, The Bucketmail Authors
//
// This file is part of Bucketmail.
//
// Bucketmail is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// Bucketmail is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for
// more details.
//
// You should have received a copy of the GNU General Public License along
// with Bucketmail. If not, see <http://www.gnu.org/licenses/>.

//! Bounded worker pools for fanning blob fetches out over threads.
//!
//! Fetches are I/O bound and usually few, so work starts on the calling
//! thread and only spreads out to helper threads once it has been running
//! long enough for that to pay off. Helper threads live only as long as the
//! call that spawned them.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use lazy_static::lazy_static;

use super::system_config::FetchConfig;

lazy_static! {
    static ref MAX_THREADS: usize = std::env::var("BUCKETMAIL_MAX_THREADS")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|&v| v > 0)
        .unwrap_or_else(|| num_cpus::get() * 4);
}

#[derive(Clone, Copy, Debug)]
pub struct ScatterGather {
    /// The number of items handled between checks of the clock.
    pub batch_size: usize,
    /// How long the operation may run at its current width before it is
    /// allowed to double the number of threads working on it.
    pub escalate: Duration,
    /// The maximum number of inputs queued for the helper threads.
    pub buffer_size: usize,
}

impl Default for ScatterGather {
    fn default() -> Self {
        ScatterGather::from(&FetchConfig::default())
    }
}

impl From<&FetchConfig> for ScatterGather {
    fn from(config: &FetchConfig) -> Self {
        ScatterGather {
            batch_size: config.batch_size.max(1),
            escalate: Duration::from_millis(config.escalate_ms),
            buffer_size: config.buffer_size.max(1),
        }
    }
}

impl ScatterGather {
    /// Map every element of `inputs` through `mapper`, possibly on several
    /// threads, and hand each output to `reduce`.
    ///
    /// `reduce` is never called concurrently with itself, but outputs reach it
    /// in no particular order once more than one thread is involved, so
    /// inputs should carry whatever they need to be put back in place.
    ///
    /// All spawned threads have exited by the time this returns.
    pub fn run<I: IntoIterator, O>(
        self,
        inputs: I,
        mapper: impl Fn(I::Item) -> O + Send + Sync,
        mut reduce: impl FnMut(O) + Send,
    ) where
        I::Item: Send,
    {
        let max_threads = *MAX_THREADS;
        let mut inputs = inputs.into_iter();
        let mut period_start = Instant::now();

        // Start out on this thread alone
        'single: loop {
            for _ in 0..self.batch_size {
                match inputs.next() {
                    Some(input) => reduce(mapper(input)),
                    None => return,
                }
            }

            if max_threads > 1 && period_start.elapsed() > self.escalate {
                break 'single;
            }
        }

        period_start = Instant::now();
        let reduce = Mutex::new(reduce);
        let (send, recv) = crossbeam::channel::bounded(self.buffer_size);
        let mut threads = 0;
        let mut wanted_threads = 2.min(max_threads);

        let result = crossbeam::scope(|s| {
            loop {
                while threads < wanted_threads {
                    let recv = recv.clone();
                    let mapper = &mapper;
                    let reduce = &reduce;
                    s.spawn(move |_| {
                        for input in recv.iter() {
                            let output = mapper(input);
                            if let Ok(mut reduce) = reduce.lock() {
                                (*reduce)(output);
                            }
                        }
                    });
                    threads += 1;
                }

                for _ in 0..self.batch_size {
                    match inputs.next() {
                        // Only fails if every receiver is gone, i.e. all the
                        // workers panicked, which the scope reports anyway.
                        Some(input) => {
                            if send.send(input).is_err() {
                                return;
                            }
                        },
                        None => {
                            // Closes the channel so the workers wind down
                            drop(send);
                            return;
                        },
                    }
                }

                if period_start.elapsed() > self.escalate {
                    wanted_threads =
                        wanted_threads.saturating_mul(2).min(max_threads);
                    period_start = Instant::now();
                }
            }
        });

        if let Err(panic) = result {
            std::panic::resume_unwind(panic);
        }
    }
}
