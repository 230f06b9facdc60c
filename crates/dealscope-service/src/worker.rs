//! Thread pool that answers JSON-lines requests.
//!
//! Each worker owns an inbox channel; requests are handed out round-robin
//! and every worker sends its responses to one shared outbox. Workers share
//! no state, so adding workers scales throughput without coordination.

use std::{
    io::{self, BufRead, Write},
    num::NonZeroUsize,
    panic,
    sync::mpsc::{self, Receiver, Sender},
    thread::{self, JoinHandle},
};

use crate::{dispatch, protocol::Response};

#[derive(Debug)]
pub struct WorkerPool {
    inboxes: Vec<Sender<String>>,
    handles: Vec<JoinHandle<()>>,
    next: usize,
}

#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("worker {worker} has stopped")]
pub struct WorkerStopped {
    pub worker: usize,
}

impl WorkerPool {
    /// Starts `workers` threads and returns the pool with its response stream.
    ///
    /// The stream ends once the pool is shut down and every accepted
    /// request has been answered.
    pub fn spawn(workers: NonZeroUsize) -> io::Result<(Self, Receiver<Response>)> {
        let (outbox, responses) = mpsc::channel();
        let mut inboxes = Vec::with_capacity(workers.get());
        let mut handles = Vec::with_capacity(workers.get());
        for worker in 0..workers.get() {
            let (inbox, requests) = mpsc::channel::<String>();
            let outbox = outbox.clone();
            let handle = thread::Builder::new()
                .name(format!("dealscope-worker-{worker}"))
                .spawn(move || {
                    for line in requests {
                        if outbox.send(dispatch::handle_line(&line)).is_err() {
                            break;
                        }
                    }
                })?;
            inboxes.push(inbox);
            handles.push(handle);
        }
        Ok((
            Self {
                inboxes,
                handles,
                next: 0,
            },
            responses,
        ))
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        self.inboxes.len()
    }

    /// Queues one raw request line on the next worker.
    pub fn submit(&mut self, line: String) -> Result<(), WorkerStopped> {
        let worker = self.next;
        self.next = (self.next + 1) % self.inboxes.len();
        self.inboxes[worker]
            .send(line)
            .map_err(|_| WorkerStopped { worker })
    }

    /// Closes the inboxes and waits for queued requests to drain.
    pub fn shutdown(self) {
        drop(self.inboxes);
        for (worker, handle) in self.handles.into_iter().enumerate() {
            if handle.join().is_err() {
                tracing::warn!(worker, "worker thread panicked");
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServeSummary {
    pub requests: usize,
    pub failures: usize,
}

/// Answers every non-blank line of `input` on `output`, one JSON response per line.
///
/// Responses are written as they complete, so their order may differ from
/// the request order; callers correlate them by `id`.
pub fn serve_lines<R, W>(input: R, output: W, workers: NonZeroUsize) -> io::Result<ServeSummary>
where
    R: BufRead,
    W: Write + Send,
{
    let (mut pool, responses) = WorkerPool::spawn(workers)?;
    thread::scope(|s| {
        let writer = s.spawn(move || write_responses(responses, output));

        let read = read_requests(input, &mut pool);
        pool.shutdown();
        let written = writer
            .join()
            .unwrap_or_else(|payload| panic::resume_unwind(payload));

        let requests = read?;
        let summary = written?;
        debug_assert_eq!(requests, summary.requests);
        tracing::debug!(requests, failures = summary.failures, "input drained");
        Ok(summary)
    })
}

fn read_requests<R>(input: R, pool: &mut WorkerPool) -> io::Result<usize>
where
    R: BufRead,
{
    let mut count = 0;
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        pool.submit(line).map_err(io::Error::other)?;
        count += 1;
    }
    Ok(count)
}

fn write_responses<W>(responses: Receiver<Response>, mut output: W) -> io::Result<ServeSummary>
where
    W: Write,
{
    let mut summary = ServeSummary::default();
    for response in responses {
        summary.requests += 1;
        if !response.success {
            summary.failures += 1;
        }
        serde_json::to_writer(&mut output, &response)?;
        writeln!(output)?;
        output.flush()?;
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use serde_json::{Value, json};

    use super::*;

    fn workers(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn serve(input: &str, n: usize) -> (ServeSummary, Vec<Response>) {
        let mut output = vec![];
        let summary = serve_lines(Cursor::new(input), &mut output, workers(n)).unwrap();
        let responses = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        (summary, responses)
    }

    #[test]
    fn test_one_response_per_request() {
        let input = (0..12)
            .map(|i| {
                json!({
                    "action": "fit_regression",
                    "id": i,
                    "data": {
                        "X": [[1.0], [2.0], [3.0], [4.0]],
                        "y": [2.0, 4.0, 6.0, f64::from(i)],
                        "variableNames": ["a"],
                    },
                })
                .to_string()
            })
            .collect::<Vec<_>>()
            .join("\n");
        let (summary, responses) = serve(&input, 3);
        assert_eq!(summary.requests, 12);

        let mut ids = responses
            .iter()
            .map(|r| r.id.as_u64().unwrap())
            .collect::<Vec<_>>();
        ids.sort_unstable();
        assert_eq!(ids, (0..12).collect::<Vec<_>>());
    }

    #[test]
    fn test_failures_are_counted_and_blank_lines_skipped() {
        let input = "\n{\"action\": \"nope\", \"id\": \"a\"}\n   \nnot json\n";
        let (summary, responses) = serve(input, 2);
        assert_eq!(
            summary,
            ServeSummary {
                requests: 2,
                failures: 2,
            }
        );
        assert!(responses.iter().all(|r| !r.success));
        assert!(responses.iter().any(|r| r.id == json!("a")));
        assert!(responses.iter().any(|r| r.id == Value::Null));
    }

    #[test]
    fn test_round_robin() {
        let (mut pool, responses) = WorkerPool::spawn(workers(2)).unwrap();
        assert_eq!(pool.workers(), 2);
        for i in 0..4 {
            pool.submit(format!(r#"{{"action": "nope", "id": {i}}}"#))
                .unwrap();
        }
        assert_eq!(pool.next, 0);
        pool.shutdown();
        assert_eq!(responses.iter().count(), 4);
    }

    #[test]
    fn test_empty_input() {
        let (summary, responses) = serve("", 1);
        assert_eq!(summary, ServeSummary::default());
        assert!(responses.is_empty());
    }
}
