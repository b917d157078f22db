//! FSRS scheduler
//!
//! A pure implementation of the spaced-repetition model used for every
//! reviewable item. Intervals are deliberately short for medical study:
//! successful reviews are capped at 30 days and the interval multiplier
//! depends on the grade (0.5 hard, 0.9 good, 1.1 easy).
//!
//! Nothing here touches storage; [`FsrsScheduler::review`] returns the
//! updated card and the log describing the card before the review.

use crate::config::{ReviewConfig, FSRS_WEIGHT_COUNT};
use crate::models::{CardState, FsrsCard, Grade, ReviewContentType, ReviewLog};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Longest interval a successful review can schedule, in days
const MAX_SUCCESS_INTERVAL: i64 = 30;

/// Floor applied when a `Hard` review shrinks an established card
const HARD_STABILITY_FLOOR: f64 = 0.5;

/// Repeated lapses never push stability below this
const MIN_STABILITY: f64 = 0.01;

/// Scheduler parameters
#[derive(Debug, Clone, PartialEq)]
pub struct FsrsParameters {
    pub request_retention: f64,
    pub maximum_interval: u32,
    pub w: [f64; FSRS_WEIGHT_COUNT],
}

impl Default for FsrsParameters {
    fn default() -> Self {
        Self::from_config(&ReviewConfig::default())
    }
}

impl FsrsParameters {
    /// Build from configuration; a weight list of the wrong length falls
    /// back to the defaults.
    pub fn from_config(config: &ReviewConfig) -> Self {
        let mut w = [
            8.0, 1.25, 3.5, 0.1, 6.0, 0.3, 0.8, 0.02, 1.2, 0.1, 0.8, 1.5, 0.08, 0.25, 1.8, 0.2, 2.0,
        ];
        if config.weights.len() == FSRS_WEIGHT_COUNT {
            w.copy_from_slice(&config.weights);
        } else {
            tracing::warn!(
                "Expected {} FSRS weights, got {}; using defaults",
                FSRS_WEIGHT_COUNT,
                config.weights.len()
            );
        }
        Self {
            request_retention: config.request_retention,
            maximum_interval: config.maximum_interval,
            w,
        }
    }
}

/// Outcome of reviewing a card with one grade
#[derive(Debug, Clone, Serialize)]
pub struct SchedulingInfo {
    pub card: FsrsCard,
    pub log: ReviewLog,
}

/// Outcomes for all four grades, used for interval previews
#[derive(Debug, Clone, Serialize)]
pub struct SchedulingCards {
    pub again: SchedulingInfo,
    pub hard: SchedulingInfo,
    pub good: SchedulingInfo,
    pub easy: SchedulingInfo,
}

/// Legacy SM-2 state imported from older decks
#[derive(Debug, Clone, Copy)]
pub struct Sm2State {
    pub interval_days: i64,
    pub ease_factor: f64,
    pub repetitions: i64,
    pub lapses: i64,
    pub last_reviewed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct FsrsScheduler {
    params: FsrsParameters,
}

impl FsrsScheduler {
    pub fn new(params: FsrsParameters) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &FsrsParameters {
        &self.params
    }

    /// Fresh card, due immediately
    pub fn new_card(
        &self,
        user_id: i64,
        content_type: ReviewContentType,
        content_id: i64,
        now: DateTime<Utc>,
    ) -> FsrsCard {
        FsrsCard {
            id: 0,
            user_id,
            content_type,
            content_id,
            deck_id: None,
            subject: None,
            due: now,
            stability: self.params.w[0],
            difficulty: self.params.w[4],
            elapsed_days: 0,
            scheduled_days: 0,
            reps: 0,
            lapses: 0,
            state: CardState::New,
            last_review: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply one review
    pub fn review(&self, card: &FsrsCard, grade: Grade, now: DateTime<Utc>, review_time_ms: i64) -> SchedulingInfo {
        let elapsed_days = elapsed_days(card, now);
        let mut next = card.clone();

        match grade {
            Grade::Again => {
                next.stability = self.stability_after_failure(card);
                next.difficulty = (card.difficulty + self.params.w[6]).min(10.0);
                next.scheduled_days = 0;
                next.due = now;
                next.lapses = card.lapses + 1;
                next.state = CardState::Relearning;
            }
            Grade::Hard | Grade::Good | Grade::Easy => {
                next.stability = self.stability_after_success(card, elapsed_days, grade);
                next.difficulty = self.difficulty_after_success(card, grade);
                let interval = self.interval(next.stability, grade);
                next.scheduled_days = interval;
                next.due = now + Duration::days(interval);
                next.reps = card.reps + 1;
                next.state = if card.state == CardState::New {
                    CardState::Learning
                } else {
                    CardState::Review
                };
            }
        }

        next.elapsed_days = elapsed_days;
        next.last_review = Some(now);
        next.updated_at = now;

        let log = ReviewLog {
            id: 0,
            card_id: card.id,
            grade,
            state: card.state,
            due: card.due,
            stability: card.stability,
            difficulty: card.difficulty,
            elapsed_days,
            last_elapsed_days: card.elapsed_days,
            scheduled_days: card.scheduled_days,
            review_time_ms: review_time_ms.max(0),
            reviewed_at: now,
        };

        SchedulingInfo { card: next, log }
    }

    /// Preview every grade
    pub fn schedule(&self, card: &FsrsCard, now: DateTime<Utc>) -> SchedulingCards {
        SchedulingCards {
            again: self.review(card, Grade::Again, now, 0),
            hard: self.review(card, Grade::Hard, now, 0),
            good: self.review(card, Grade::Good, now, 0),
            easy: self.review(card, Grade::Easy, now, 0),
        }
    }

    /// Convert an SM-2 card.
    ///
    /// Stability is 80% of the old interval, difficulty is derived from
    /// the ease factor.
    pub fn from_sm2(
        &self,
        user_id: i64,
        content_type: ReviewContentType,
        content_id: i64,
        sm2: Sm2State,
        now: DateTime<Utc>,
    ) -> FsrsCard {
        let mut card = self.new_card(user_id, content_type, content_id, now);
        card.stability = (sm2.interval_days as f64 * 0.8).max(0.1);
        card.difficulty = (11.0 - sm2.ease_factor * 2.0).clamp(1.0, 10.0);
        card.scheduled_days = sm2.interval_days;
        card.reps = sm2.repetitions;
        card.lapses = sm2.lapses;
        card.state = if sm2.repetitions == 0 {
            CardState::New
        } else {
            CardState::Review
        };
        if let Some(last) = sm2.last_reviewed_at {
            card.due = last + Duration::days(sm2.interval_days);
            card.elapsed_days = days_between(last, now);
            card.last_review = Some(last);
        }
        card
    }

    fn stability_after_failure(&self, card: &FsrsCard) -> f64 {
        let w = &self.params.w;
        let stability = w[11]
            * card.difficulty.powf(-w[12])
            * ((card.stability + 1.0).powf(w[13]) - 1.0)
            * (-w[14] * (card.reps as f64 + 1.0)).exp();
        stability.max(MIN_STABILITY)
    }

    fn stability_after_success(&self, card: &FsrsCard, elapsed_days: i64, grade: Grade) -> f64 {
        let w = &self.params.w;
        if card.state == CardState::New {
            return w[grade.index()];
        }
        if grade == Grade::Hard && card.reps > 0 {
            return (card.stability * 0.6).max(HARD_STABILITY_FLOOR);
        }

        let s = card.stability;
        let r = retrievability(s, elapsed_days as f64);
        s * (1.0 + w[8].exp() * (11.0 - card.difficulty) * s.powf(-w[9]) * (((1.0 - r) * w[10]).exp() - 1.0))
    }

    fn difficulty_after_success(&self, card: &FsrsCard, grade: Grade) -> f64 {
        let w = &self.params.w;
        let offset = grade.value() as f64 - 3.0;
        if card.state == CardState::New {
            w[4] - (offset * w[5]).exp() + 1.0
        } else {
            (card.difficulty - w[6] * offset).clamp(1.0, 10.0)
        }
    }

    fn interval(&self, stability: f64, grade: Grade) -> i64 {
        let factor = match grade {
            Grade::Hard => 0.5,
            Grade::Good => 0.9,
            _ => 1.1,
        };
        let cap = MAX_SUCCESS_INTERVAL.min(self.params.maximum_interval.max(1) as i64);
        ((stability * factor).round() as i64).clamp(1, cap)
    }
}

/// Probability of recall after `elapsed` days at stability `stability`
pub fn retrievability(stability: f64, elapsed: f64) -> f64 {
    if stability <= 0.0 {
        return 0.0;
    }
    (-elapsed / stability).exp()
}

/// Whole days since the last review (or creation), rounded up
fn elapsed_days(card: &FsrsCard, now: DateTime<Utc>) -> i64 {
    days_between(card.last_review.unwrap_or(card.created_at), now)
}

fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    let millis = (to - from).num_milliseconds().abs();
    (millis as f64 / 86_400_000.0).ceil() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 1, 12, 0, 0).unwrap()
    }

    fn scheduler() -> FsrsScheduler {
        FsrsScheduler::default()
    }

    fn fresh() -> FsrsCard {
        let mut card = scheduler().new_card(1, ReviewContentType::Flashcard, 10, now());
        card.id = 5;
        card
    }

    #[test]
    fn test_new_card_defaults() {
        let card = fresh();
        assert_eq!(card.stability, 8.0);
        assert_eq!(card.difficulty, 6.0);
        assert_eq!(card.state, CardState::New);
        assert_eq!(card.due, now());
        assert_eq!(card.reps, 0);
    }

    #[test]
    fn test_good_on_new_card() {
        let info = scheduler().review(&fresh(), Grade::Good, now(), 1500);

        assert_eq!(info.card.stability, 3.5);
        assert!((info.card.difficulty - 6.0).abs() < 1e-9);
        assert_eq!(info.card.scheduled_days, 3);
        assert_eq!(info.card.due, now() + Duration::days(3));
        assert_eq!(info.card.state, CardState::Learning);
        assert_eq!(info.card.reps, 1);
        assert_eq!(info.log.state, CardState::New);
        assert_eq!(info.log.review_time_ms, 1500);
        assert_eq!(info.log.card_id, 5);
    }

    #[test]
    fn test_easy_on_new_card_uses_first_weight_slot() {
        // w[grade - 1]: Easy reads w3
        let info = scheduler().review(&fresh(), Grade::Easy, now(), 0);
        assert_eq!(info.card.stability, 0.1);
        assert_eq!(info.card.scheduled_days, 1);
    }

    #[test]
    fn test_again_resets_to_now() {
        let mut card = fresh();
        card.state = CardState::Review;
        card.reps = 3;
        card.stability = 20.0;
        card.last_review = Some(now() - Duration::days(10));

        let info = scheduler().review(&card, Grade::Again, now(), 0);

        assert_eq!(info.card.due, now());
        assert_eq!(info.card.scheduled_days, 0);
        assert_eq!(info.card.lapses, 1);
        assert_eq!(info.card.reps, 3);
        assert_eq!(info.card.state, CardState::Relearning);
        assert!((info.card.difficulty - 6.8).abs() < 1e-9);
        assert!(info.card.stability < card.stability);
        assert_eq!(info.card.elapsed_days, 10);
    }

    #[test]
    fn test_hard_shrinks_established_card() {
        let mut card = fresh();
        card.state = CardState::Review;
        card.reps = 2;
        card.stability = 10.0;
        card.last_review = Some(now() - Duration::days(4));

        let info = scheduler().review(&card, Grade::Hard, now(), 0);

        assert!((info.card.stability - 6.0).abs() < 1e-9);
        assert_eq!(info.card.scheduled_days, 3);
        assert_eq!(info.card.state, CardState::Review);
    }

    #[test]
    fn test_success_interval_capped_at_thirty_days() {
        let mut card = fresh();
        card.state = CardState::Review;
        card.reps = 5;
        card.stability = 200.0;
        card.difficulty = 2.0;
        card.last_review = Some(now() - Duration::days(60));

        let info = scheduler().review(&card, Grade::Easy, now(), 0);
        assert_eq!(info.card.scheduled_days, 30);
    }

    #[test]
    fn test_elapsed_days_round_up() {
        let mut card = fresh();
        card.last_review = Some(now() - Duration::hours(25));
        let info = scheduler().review(&card, Grade::Good, now(), 0);
        assert_eq!(info.card.elapsed_days, 2);
        assert_eq!(info.log.last_elapsed_days, 0);
    }

    #[test]
    fn test_schedule_previews_every_grade() {
        let cards = scheduler().schedule(&fresh(), now());
        assert_eq!(cards.again.log.grade, Grade::Again);
        assert_eq!(cards.hard.card.stability, 1.25);
        assert_eq!(cards.good.card.stability, 3.5);
        assert_eq!(cards.easy.log.grade, Grade::Easy);
    }

    #[test]
    fn test_from_sm2() {
        let last = now() - Duration::days(2);
        let card = scheduler().from_sm2(
            1,
            ReviewContentType::Flashcard,
            3,
            Sm2State {
                interval_days: 10,
                ease_factor: 2.5,
                repetitions: 4,
                lapses: 1,
                last_reviewed_at: Some(last),
            },
            now(),
        );

        assert_eq!(card.stability, 8.0);
        assert_eq!(card.difficulty, 6.0);
        assert_eq!(card.state, CardState::Review);
        assert_eq!(card.due, last + Duration::days(10));
        assert_eq!(card.elapsed_days, 2);

        let unseen = scheduler().from_sm2(
            1,
            ReviewContentType::Flashcard,
            4,
            Sm2State {
                interval_days: 0,
                ease_factor: 5.0,
                repetitions: 0,
                lapses: 0,
                last_reviewed_at: None,
            },
            now(),
        );
        assert_eq!(unseen.stability, 0.1);
        assert_eq!(unseen.difficulty, 1.0);
        assert_eq!(unseen.state, CardState::New);
    }

    #[test]
    fn test_retrievability() {
        assert_eq!(retrievability(5.0, 0.0), 1.0);
        assert!((retrievability(5.0, 5.0) - (-1.0f64).exp()).abs() < 1e-12);
        assert_eq!(retrievability(0.0, 1.0), 0.0);
    }

    #[test]
    fn test_parameters_fall_back_on_bad_weights() {
        let config = ReviewConfig {
            weights: vec![1.0; 3],
            ..ReviewConfig::default()
        };
        assert_eq!(FsrsParameters::from_config(&config).w, FsrsParameters::default().w);
    }

    fn grade_strategy() -> impl Strategy<Value = Grade> {
        prop_oneof![
            Just(Grade::Again),
            Just(Grade::Hard),
            Just(Grade::Good),
            Just(Grade::Easy),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Any review sequence keeps the card inside the model's bounds
        #[test]
        fn prop_review_sequences_stay_bounded(
            grades in proptest::collection::vec(grade_strategy(), 1..25),
            gaps in proptest::collection::vec(0i64..2000, 25),
        ) {
            let scheduler = scheduler();
            let mut card = fresh();
            let mut clock = now();

            for (grade, gap) in grades.into_iter().zip(gaps) {
                clock += Duration::minutes(gap * 30);
                let before = card.clone();
                let info = scheduler.review(&card, grade, clock, 0);
                card = info.card;

                prop_assert!(card.stability > 0.0);
                prop_assert!(card.difficulty >= 1.0 && card.difficulty <= 10.0);
                prop_assert!(card.due >= clock);
                prop_assert_eq!(card.last_review, Some(clock));
                if grade == Grade::Again {
                    prop_assert_eq!(card.scheduled_days, 0);
                    prop_assert_eq!(card.lapses, before.lapses + 1);
                    prop_assert_eq!(card.reps, before.reps);
                } else {
                    prop_assert!((1..=30).contains(&card.scheduled_days));
                    prop_assert_eq!(card.reps, before.reps + 1);
                    prop_assert_ne!(card.state, CardState::New);
                }
                prop_assert_eq!(info.log.state, before.state);
                prop_assert_eq!(info.log.stability, before.stability);
            }
        }

        #[test]
        fn prop_retrievability_decays(stability in 0.1f64..100.0, a in 0.0f64..365.0, b in 0.0f64..365.0) {
            let (near, far) = if a <= b { (a, b) } else { (b, a) };
            let r_near = retrievability(stability, near);
            let r_far = retrievability(stability, far);
            prop_assert!(r_far <= r_near);
            prop_assert!(r_near <= 1.0 && r_far >= 0.0);
        }
    }
}
