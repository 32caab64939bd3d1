// SPDX-License-Identifier: MPL-2.0
//! Ordered progress events from a running job to its caller.
//!
//! A [`ProgressChannel`] wraps an unbounded Tokio sender, so events keep
//! their emission order. Percentages are clamped to be non-decreasing
//! within a job and restart at 0 when a new job begins.
//!
//! The channel is generic over the message type so progress can share one
//! ordered stream with other messages (see `worker::protocol::Outbound`).

use crate::domain::processing::{JobId, ProgressPercent};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// One progress update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Job the update belongs to.
    pub job: JobId,
    /// Completion, never lower than the previous event of the same job.
    pub percent: ProgressPercent,
    /// Human-readable status.
    pub status: String,
}

/// Sending half of a progress stream.
#[derive(Debug)]
pub struct ProgressChannel<T = ProgressEvent> {
    tx: UnboundedSender<T>,
    job: JobId,
    current: ProgressPercent,
}

/// Creates a progress channel and its receiver.
#[must_use]
pub fn channel<T: From<ProgressEvent>>() -> (ProgressChannel<T>, UnboundedReceiver<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ProgressChannel::new(tx), rx)
}

impl<T: From<ProgressEvent>> ProgressChannel<T> {
    /// Wraps an existing sender.
    #[must_use]
    pub fn new(tx: UnboundedSender<T>) -> Self {
        Self {
            tx,
            job: JobId(0),
            current: ProgressPercent::ZERO,
        }
    }

    /// Starts reporting for `job`. Switching jobs resets the percentage to 0;
    /// beginning the current job again keeps it.
    pub fn begin(&mut self, job: JobId) {
        if self.job != job {
            self.job = job;
            self.current = ProgressPercent::ZERO;
        }
    }

    /// Job currently reported on.
    #[must_use]
    pub fn job(&self) -> JobId {
        self.job
    }

    /// Last emitted percentage of the current job.
    #[must_use]
    pub fn current(&self) -> ProgressPercent {
        self.current
    }

    /// Emits an event. A percentage below the previous one is raised to it.
    ///
    /// Returns the percentage actually sent. A dropped receiver is ignored.
    pub fn emit(&mut self, percent: u8, status: impl Into<String>) -> ProgressPercent {
        let percent = ProgressPercent::new(percent).max(self.current);
        self.current = percent;
        let event = ProgressEvent {
            job: self.job,
            percent,
            status: status.into(),
        };
        if self.tx.send(T::from(event)).is_err() {
            tracing::trace!(job = %self.job, "progress receiver dropped");
        }
        percent
    }

    /// Emits the terminal 100% event.
    pub fn complete(&mut self, status: impl Into<String>) {
        self.emit(ProgressPercent::COMPLETE.value(), status);
    }

    /// Sends a non-progress message on the same ordered stream.
    ///
    /// Returns `false` if the receiver is gone.
    pub fn send(&self, message: T) -> bool {
        self.tx.send(message).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut UnboundedReceiver<ProgressEvent>) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn percent_never_decreases_within_a_job() {
        let (mut progress, mut rx) = channel::<ProgressEvent>();
        progress.begin(JobId(1));
        progress.emit(40, "a");
        progress.emit(20, "b");
        progress.complete("done");

        let percents: Vec<u8> = drain(&mut rx).iter().map(|e| e.percent.value()).collect();
        assert_eq!(percents, vec![40, 40, 100]);
    }

    #[test]
    fn new_job_resets_to_zero() {
        let (mut progress, mut rx) = channel::<ProgressEvent>();
        progress.begin(JobId(1));
        progress.complete("done");
        progress.begin(JobId(2));
        progress.emit(5, "decoding");

        let events = drain(&mut rx);
        assert_eq!(events[1].job, JobId(2));
        assert_eq!(events[1].percent.value(), 5);
    }

    #[test]
    fn beginning_same_job_keeps_progress() {
        let (mut progress, _rx) = channel::<ProgressEvent>();
        progress.begin(JobId(3));
        progress.emit(30, "x");
        progress.begin(JobId(3));
        assert_eq!(progress.current().value(), 30);
    }

    #[test]
    fn dropped_receiver_is_ignored() {
        let (mut progress, rx) = channel::<ProgressEvent>();
        drop(rx);
        assert_eq!(progress.emit(10, "x").value(), 10);
    }
}
