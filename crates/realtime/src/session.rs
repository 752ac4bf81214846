//! Step-by-step progress of one simulated processing run.

use chatdeck_core::{
    now_iso8601, ProcessingCompletion, ProcessingSnapshot, ProcessingStep, StepStatus, StepUpdate,
};

/// Result of advancing a session by one tick.
#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    /// Step `current_step` just completed.
    Step(StepUpdate),
    /// Every step has been reported.
    Completed(ProcessingCompletion),
}

/// Walks the steps strictly in order, one per call to [`advance`].
///
/// [`advance`]: ProcessingSession::advance
#[derive(Debug, Clone)]
pub struct ProcessingSession {
    message_id: String,
    start_time: String,
    steps: Vec<ProcessingStep>,
    current_step: usize,
    finished: bool,
}

impl ProcessingSession {
    pub fn new(message_id: impl Into<String>, steps: Vec<ProcessingStep>) -> Self {
        Self {
            message_id: message_id.into(),
            start_time: now_iso8601(),
            steps,
            current_step: 0,
            finished: false,
        }
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn has_steps(&self) -> bool {
        !self.steps.is_empty()
    }

    /// Payload of the `processing_started` event.
    pub fn snapshot(&self) -> ProcessingSnapshot {
        ProcessingSnapshot {
            message_id: self.message_id.clone(),
            start_time: self.start_time.clone(),
            steps: self.steps.clone(),
            current_step: self.current_step,
        }
    }

    /// Report the next step, or the completion once steps are exhausted.
    /// Returns `None` after completion has been reported.
    pub fn advance(&mut self) -> Option<Advance> {
        if self.finished {
            return None;
        }

        match self.steps.get(self.current_step) {
            Some(step) => {
                let update = StepUpdate {
                    message_id: self.message_id.clone(),
                    current_step: self.current_step,
                    step_name: step.name.clone(),
                    step_status: StepStatus::Completed,
                    timestamp: now_iso8601(),
                };
                self.current_step += 1;
                Some(Advance::Step(update))
            }
            None => {
                self.finished = true;
                Some(Advance::Completed(ProcessingCompletion {
                    message_id: self.message_id.clone(),
                    completion_time: now_iso8601(),
                    steps: self.steps.clone(),
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_then_completion_in_order() {
        let mut session = ProcessingSession::new("msg_1", vec!["a".into(), "b".into()]);
        assert_eq!(session.snapshot().current_step, 0);

        let names: Vec<(usize, String)> = std::iter::from_fn(|| match session.advance() {
            Some(Advance::Step(update)) => Some((update.current_step, update.step_name)),
            _ => None,
        })
        .collect();
        assert_eq!(names, vec![(0, "a".to_string()), (1, "b".to_string())]);

        // from_fn stopped on the completion.
        assert_eq!(session.current_step(), 2);
        assert!(session.advance().is_none());
    }

    #[test]
    fn completion_echoes_steps() {
        let mut session = ProcessingSession::new("msg_2", vec!["only".into()]);
        session.advance();
        match session.advance() {
            Some(Advance::Completed(done)) => {
                assert_eq!(done.message_id, "msg_2");
                assert_eq!(done.steps.len(), 1);
                assert_eq!(done.steps[0].name, "only");
            }
            other => panic!("expected completion, got {:?}", other),
        }
    }

    #[test]
    fn empty_session_has_no_steps() {
        let session = ProcessingSession::new("msg_3", Vec::new());
        assert!(!session.has_steps());
        assert_eq!(session.message_id(), "msg_3");
    }
}
