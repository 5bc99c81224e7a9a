use crate::types::{FsrsLearningState, FsrsState};

/// A review grade, as presented by the review UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rating {
    Again = 1,
    Hard = 2,
    Good = 3,
    Easy = 4,
}

impl Rating {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Rating::Again),
            2 => Some(Rating::Hard),
            3 => Some(Rating::Good),
            4 => Some(Rating::Easy),
            _ => None,
        }
    }

    fn index(self) -> usize {
        self as usize - 1
    }
}

/// FSRS-6 weight vector (py-fsrs 6.x published defaults). Indices follow the
/// upstream `w0..w18` naming; see `apply_rating` for how each is used.
#[derive(Debug, Clone)]
pub struct FsrsParameters {
    pub weights: [f64; 19],
}

impl Default for FsrsParameters {
    fn default() -> Self {
        Self {
            weights: [
                0.4072, 1.1829, 3.1262, 15.4722, 7.2102, 0.5316, 1.0651, 0.0234, 1.616, 0.1544, 1.0824, 1.9813,
                0.0953, 0.2975, 2.2042, 0.2407, 2.9466, 0.5034, 0.6567,
            ],
        }
    }
}

/// `DECAY`/`FACTOR` define the power-law forgetting curve: `R(t, S) = (1 +
/// FACTOR * t / S) ^ DECAY` is calibrated so `R(S, S) = 0.9`.
const DECAY: f64 = -0.5;

fn factor() -> f64 {
    0.9f64.powf(1.0 / DECAY) - 1.0
}

/// Minimum scheduled interval for a learning/relearning step, in days.
const MIN_LEARNING_STEP_DAYS: f64 = 1.0 / 1440.0 * 10.0; // 10 minutes

fn retrievability(elapsed_days: f64, stability: f64) -> f64 {
    if stability <= 0.0 {
        return 0.0;
    }
    (1.0 + factor() * elapsed_days / stability).powf(DECAY)
}

fn initial_stability(params: &FsrsParameters, rating: Rating) -> f64 {
    params.weights[rating.index()].max(0.1)
}

fn initial_difficulty(params: &FsrsParameters, rating: Rating) -> f64 {
    let w = &params.weights;
    (w[4] - (w[5] * (rating.index() as f64)).exp() + 1.0).clamp(1.0, 10.0)
}

fn next_difficulty(params: &FsrsParameters, difficulty: f64, rating: Rating) -> f64 {
    let w = &params.weights;
    let delta = w[6] * (rating as i32 as f64 - 3.0);
    let reverted = difficulty - delta;
    let easy_anchor = initial_difficulty(params, Rating::Easy);
    (w[7] * easy_anchor + (1.0 - w[7]) * reverted).clamp(1.0, 10.0)
}

/// Stability after a successful recall (Hard, Good, or Easy) while in the
/// `review` state.
fn next_stability_recall(params: &FsrsParameters, stability: f64, difficulty: f64, retrievability: f64, rating: Rating) -> f64 {
    let w = &params.weights;
    let hard_penalty = if rating == Rating::Hard { w[15] } else { 1.0 };
    let easy_bonus = if rating == Rating::Easy { w[16] } else { 1.0 };

    let growth = w[8].exp()
        * (11.0 - difficulty)
        * stability.powf(-w[9])
        * (((1.0 - retrievability) * w[10]).exp() - 1.0)
        * hard_penalty
        * easy_bonus;

    (stability * (1.0 + growth)).max(0.1)
}

/// Stability after a lapse (Again) while in the `review` state.
fn next_stability_lapse(params: &FsrsParameters, stability: f64, difficulty: f64, retrievability: f64) -> f64 {
    let w = &params.weights;
    let s = w[11] * difficulty.powf(-w[12]) * (((stability + 1.0).powf(w[13])) - 1.0) * (((1.0 - retrievability) * w[14]).exp());
    s.max(0.1)
}

/// Same-day (short-term) stability adjustment, used while a card is still in
/// `learning`/`relearning` and has not yet accrued a full day of elapsed
/// time since its last review.
fn short_term_stability(params: &FsrsParameters, stability: f64, rating: Rating) -> f64 {
    let w = &params.weights;
    (stability * ((w[17] * (rating as i32 as f64 - 3.0 + w[18])).exp())).max(0.1)
}

/// Converts a stability into a scheduled interval (days) for the configured
/// desired retention.
fn interval_for_stability(stability: f64, desired_retention: f64) -> f64 {
    let days = (stability / factor()) * (desired_retention.powf(1.0 / DECAY) - 1.0);
    days.max(MIN_LEARNING_STEP_DAYS)
}

/// Applies one rating to the current FSRS state, returning the next state.
/// `elapsed_days` is the time since the item's last review (0 for a first
/// review); the caller computes it from `ReviewItem.last_reviewed`, since
/// this state alone doesn't carry a review timestamp. Pure function: no I/O,
/// fully deterministic, serde-roundtrippable since `FsrsState` itself
/// derives `Serialize`/`Deserialize`.
pub fn apply_rating(state: FsrsState, rating: Rating, elapsed_days: f64, desired_retention: f64, params: &FsrsParameters) -> FsrsState {
    let is_first_review = state.reps == 0;

    let (stability, difficulty) = if is_first_review {
        (initial_stability(params, rating), initial_difficulty(params, rating))
    } else {
        let r = retrievability(elapsed_days, state.stability);
        let difficulty = next_difficulty(params, state.difficulty, rating);
        let stability = if rating == Rating::Again {
            next_stability_lapse(params, state.stability, state.difficulty, r)
        } else if elapsed_days < 1.0 {
            short_term_stability(params, state.stability, rating)
        } else {
            next_stability_recall(params, state.stability, state.difficulty, r, rating)
        };
        (stability, difficulty)
    };

    let next_learning_state = match (state.state, rating) {
        (FsrsLearningState::New, Rating::Again) => FsrsLearningState::Learning,
        (FsrsLearningState::New, _) => FsrsLearningState::Review,
        (FsrsLearningState::Learning, Rating::Again) => FsrsLearningState::Learning,
        (FsrsLearningState::Learning, _) => FsrsLearningState::Review,
        (FsrsLearningState::Review, Rating::Again) => FsrsLearningState::Relearning,
        (FsrsLearningState::Review, _) => FsrsLearningState::Review,
        (FsrsLearningState::Relearning, Rating::Again) => FsrsLearningState::Relearning,
        (FsrsLearningState::Relearning, _) => FsrsLearningState::Review,
    };

    let scheduled_days = if matches!(next_learning_state, FsrsLearningState::Learning | FsrsLearningState::Relearning) {
        // Short sub-day steps while still learning/relearning, floored so a
        // lapse from `review` always schedules sooner than a successful
        // review would have.
        (interval_for_stability(stability, desired_retention) * 0.2).min(state.scheduled_days.max(MIN_LEARNING_STEP_DAYS) * 0.5)
    } else {
        interval_for_stability(stability, desired_retention)
    };

    let lapses = if rating == Rating::Again && state.state == FsrsLearningState::Review {
        state.lapses + 1
    } else {
        state.lapses
    };

    FsrsState {
        stability,
        difficulty,
        elapsed_days,
        scheduled_days,
        reps: state.reps + 1,
        lapses,
        state: next_learning_state,
        last_review: None, // caller stamps `last_reviewed` on `ReviewItem`, not mirrored here
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_state() -> FsrsState {
        FsrsState {
            stability: 0.0,
            difficulty: 0.0,
            elapsed_days: 0.0,
            scheduled_days: 0.0,
            reps: 0,
            lapses: 0,
            state: FsrsLearningState::New,
            last_review: None,
        }
    }

    #[test]
    fn rating_from_u8_round_trips_the_four_valid_grades() {
        assert_eq!(Rating::from_u8(1), Some(Rating::Again));
        assert_eq!(Rating::from_u8(4), Some(Rating::Easy));
        assert_eq!(Rating::from_u8(5), None);
    }

    #[test]
    fn first_good_review_graduates_straight_to_review_state() {
        let params = FsrsParameters::default();
        let next = apply_rating(new_state(), Rating::Good, 0.0, 0.9, &params);
        assert_eq!(next.state, FsrsLearningState::Review);
        assert!(next.stability > 0.0);
        assert!(next.scheduled_days > 0.0);
    }

    #[test]
    fn easy_produces_a_longer_interval_than_good_on_first_review() {
        let params = FsrsParameters::default();
        let good = apply_rating(new_state(), Rating::Good, 0.0, 0.9, &params);
        let easy = apply_rating(new_state(), Rating::Easy, 0.0, 0.9, &params);
        assert!(easy.scheduled_days > good.scheduled_days);
    }

    #[test]
    fn lapse_in_review_state_increments_lapses_and_moves_to_relearning() {
        let params = FsrsParameters::default();
        let after_good = apply_rating(new_state(), Rating::Good, 0.0, 0.9, &params);
        let after_lapse = apply_rating(after_good.clone(), Rating::Again, after_good.scheduled_days, 0.9, &params);

        assert_eq!(after_lapse.lapses, 1);
        assert_eq!(after_lapse.state, FsrsLearningState::Relearning);
        assert!(after_lapse.scheduled_days < after_good.scheduled_days);
    }

    #[test]
    fn repeated_easy_ratings_grow_stability() {
        let params = FsrsParameters::default();
        let mut state = apply_rating(new_state(), Rating::Easy, 0.0, 0.9, &params);
        for _ in 0..3 {
            let elapsed = state.scheduled_days;
            state = apply_rating(state, Rating::Easy, elapsed, 0.9, &params);
        }
        assert!(state.stability > initial_stability(&params, Rating::Easy));
    }
}
