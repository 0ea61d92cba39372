// src/services/attempt.rs

//! Answer lifecycle per (question, user): NoAttempt -> Drafting -> Submitted.
//!
//! Every transition for one key runs under that key's lock, so two requests
//! from the same user on the same question never interleave inside this
//! process. The ledger's own guards (single draft, submit-if-unchanged)
//! catch races with other processes.

use std::{collections::HashMap, sync::Arc};

use crate::{
    config::POINTS_PER_CORRECT_ANSWER,
    error::AppError,
    models::{
        attempt::{Attempt, AttemptSummary, DraftField, MarkAction, NewAttempt, SubmitOutcome},
        option::QuestionOption,
    },
    services::award::{AwardQueue, PointAward},
    store::{AttemptLedger, OptionStore, StoreError},
    utils::locks::KeyedLocks,
};

pub struct AttemptService {
    ledger: Arc<dyn AttemptLedger>,
    options: Arc<dyn OptionStore>,
    awards: AwardQueue,
    locks: KeyedLocks<(i64, i64)>,
}

impl AttemptService {
    pub fn new(ledger: Arc<dyn AttemptLedger>, options: Arc<dyn OptionStore>, awards: AwardQueue) -> Self {
        Self {
            ledger,
            options,
            awards,
            locks: KeyedLocks::new(),
        }
    }

    /// Selects `option_id`, creating the draft on first use and updating it
    /// in place afterwards.
    pub async fn answer(&self, question_id: i64, user_id: i64, option_id: i64) -> Result<Attempt, AppError> {
        self.option_for(question_id, option_id).await?;

        let _guard = self.locks.lock((question_id, user_id)).await;

        let (mut draft, created) = self
            .ensure_draft(NewAttempt {
                question_id,
                user_id,
                question_option_id: Some(option_id),
                is_marked: false,
            })
            .await?;

        if !created {
            draft.question_option_id = Some(option_id);
            draft = self.ledger.update_draft(&draft, &[DraftField::SelectedOption]).await?;
        }

        tracing::debug!(question_id, user_id, option_id, attempt_id = draft.id, "Answer recorded");
        Ok(draft)
    }

    /// Drops the selection on the current draft. The mark is kept.
    pub async fn clear_answer(&self, question_id: i64, user_id: i64) -> Result<Attempt, AppError> {
        let _guard = self.locks.lock((question_id, user_id)).await;

        let mut draft = self.ledger.latest_draft(question_id, user_id).await?;
        draft.question_option_id = None;
        draft.is_correct = false;

        let cleared = self
            .ledger
            .update_draft(&draft, &[DraftField::SelectedOption, DraftField::Correctness])
            .await?;

        Ok(cleared)
    }

    /// Flags the question for review. Marking a question that was never
    /// answered still starts a (selection-less) draft.
    pub async fn mark(&self, question_id: i64, user_id: i64) -> Result<Attempt, AppError> {
        let _guard = self.locks.lock((question_id, user_id)).await;

        let (mut draft, created) = self
            .ensure_draft(NewAttempt {
                question_id,
                user_id,
                question_option_id: None,
                is_marked: true,
            })
            .await?;

        if !created && !draft.is_marked {
            draft.is_marked = true;
            draft = self.ledger.update_draft(&draft, &[DraftField::Marked]).await?;
        }

        Ok(draft)
    }

    /// `Add` behaves like `mark`. `Remove` clears the flag on the current
    /// draft and does nothing when there is no draft.
    pub async fn add_remove_mark(
        &self,
        question_id: i64,
        user_id: i64,
        action: MarkAction,
    ) -> Result<Option<Attempt>, AppError> {
        if action == MarkAction::Add {
            return self.mark(question_id, user_id).await.map(Some);
        }

        let _guard = self.locks.lock((question_id, user_id)).await;

        let Some(mut draft) = self.current_draft(question_id, user_id).await? else {
            return Ok(None);
        };

        if draft.is_marked {
            draft.is_marked = false;
            draft = self.ledger.update_draft(&draft, &[DraftField::Marked]).await?;
        }

        Ok(Some(draft))
    }

    /// Finalizes the current draft and scores it.
    ///
    /// The award for a correct answer is queued after the submission is
    /// stored; a failing award never undoes the submission.
    pub async fn submit(&self, question_id: i64, user_id: i64) -> Result<SubmitOutcome, AppError> {
        let _guard = self.locks.lock((question_id, user_id)).await;

        let draft = self
            .current_draft(question_id, user_id)
            .await?
            .ok_or_else(empty_answer)?;
        let option_id = draft.question_option_id.ok_or_else(empty_answer)?;

        let option = self.option_for(question_id, option_id).await?;

        let submitted = self
            .ledger
            .submit_draft(draft.id, option_id, option.is_correct_answer)
            .await?;

        if submitted.is_correct {
            self.awards.enqueue(PointAward {
                attempt_id: submitted.id,
                user_id,
                points: POINTS_PER_CORRECT_ANSWER,
            });
        }

        // The submission is already stored; a failed lookup only hides the
        // correct answer from the response.
        let true_answer_id = match self.options.correct_option(question_id).await {
            Ok(correct) => correct.map(|o| o.id),
            Err(e) => {
                tracing::warn!(question_id, "Failed to load correct option: {}", e);
                None
            }
        };

        tracing::info!(
            question_id,
            user_id,
            attempt_id = submitted.id,
            is_correct = submitted.is_correct,
            "Answer submitted"
        );

        Ok(SubmitOutcome {
            attempt_value: submitted.is_correct,
            answer_id: option.id,
            true_answer_id,
            true_answer_streak: 0,
        })
    }

    /// What the user has done so far: the latest submitted row, or the
    /// current draft when nothing was submitted yet.
    pub async fn get_latest_answer(&self, question_id: i64, user_id: i64) -> Result<Attempt, AppError> {
        match self.ledger.latest_submitted(question_id, user_id).await {
            Ok(attempt) => Ok(attempt),
            Err(e) if e.is_not_found() => Ok(self.ledger.latest_draft(question_id, user_id).await?),
            Err(e) => Err(e.into()),
        }
    }

    /// Batch form of `get_latest_answer`, keyed by question ID. Questions
    /// without any history are absent from the map.
    pub async fn get_latest_answers(
        &self,
        question_ids: &[i64],
        user_id: i64,
    ) -> Result<HashMap<i64, Attempt>, AppError> {
        let mut ids = question_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let attempts = self.ledger.latest_submitted_bulk(&ids, user_id).await?;

        Ok(attempts.into_iter().map(|a| (a.question_id, a)).collect())
    }

    pub async fn get_marks(&self, question_ids: &[i64], user_id: i64) -> Result<Vec<i64>, AppError> {
        Ok(self.ledger.marked_questions(question_ids, user_id).await?)
    }

    pub async fn attempt_summary(&self, user_id: i64) -> Result<AttemptSummary, AppError> {
        Ok(AttemptSummary {
            total: self.ledger.total_by_user(user_id).await?,
            total_true: self.ledger.total_by_user_and_correctness(user_id, true).await?,
            total_false: self.ledger.total_by_user_and_correctness(user_id, false).await?,
        })
    }

    async fn current_draft(&self, question_id: i64, user_id: i64) -> Result<Option<Attempt>, AppError> {
        match self.ledger.latest_draft(question_id, user_id).await {
            Ok(draft) => Ok(Some(draft)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Returns the current draft, creating it from `new` when there is none.
    /// The flag is `true` when the draft was created by this call.
    async fn ensure_draft(&self, new: NewAttempt) -> Result<(Attempt, bool), AppError> {
        if let Some(draft) = self.current_draft(new.question_id, new.user_id).await? {
            return Ok((draft, false));
        }

        let (question_id, user_id) = (new.question_id, new.user_id);
        match self.ledger.create(new).await {
            Ok(created) => Ok((created, true)),
            // Another instance created the draft in between; use theirs.
            Err(StoreError::Conflict(_)) => {
                let draft = self.ledger.latest_draft(question_id, user_id).await?;
                Ok((draft, false))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Loads an option and checks that it belongs to the question.
    async fn option_for(&self, question_id: i64, option_id: i64) -> Result<QuestionOption, AppError> {
        let option = match self.options.get(option_id).await {
            Ok(option) => option,
            Err(e) if e.is_not_found() => return Err(invalid_option()),
            Err(e) => return Err(e.into()),
        };

        if option.question_id != question_id {
            return Err(invalid_option());
        }

        Ok(option)
    }
}

fn empty_answer() -> AppError {
    AppError::BadRequest("empty answer".to_string())
}

fn invalid_option() -> AppError {
    AppError::BadRequest("invalid option reference".to_string())
}
