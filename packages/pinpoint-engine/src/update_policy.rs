//! Update policies: the decision function between a candidate update and the
//! engine's current authoritative one.
//!
//! A policy is total: it always returns the chosen update (either the
//! candidate or the retained current one), so callers simply store the
//! return value.

use std::sync::Mutex;

use chrono::TimeDelta;
use pinpoint_types::{Heading, Position, Update, Velocity};

/// Heuristics for choosing between updates of the same kind. Implementations
/// may be called from several provider threads concurrently.
pub trait UpdatePolicy: Send + Sync {
    fn verify_position(&self, update: Update<Position>) -> Update<Position>;
    fn verify_heading(&self, update: Update<Heading>) -> Update<Heading>;
    fn verify_velocity(&self, update: Update<Velocity>) -> Update<Velocity>;
}

/// Chooses the best update within a time bracket.
///
/// A candidate more than `timeout` newer than the current best always wins;
/// one more than `timeout` older always loses. Inside the bracket, position
/// updates win on better-or-equal horizontal accuracy; heading and velocity
/// keep the current update.
pub struct TimeBasedUpdatePolicy {
    timeout: TimeDelta,
    last_position: Mutex<Option<Update<Position>>>,
    last_heading: Mutex<Option<Update<Heading>>>,
    last_velocity: Mutex<Option<Update<Velocity>>>,
}

impl TimeBasedUpdatePolicy {
    pub fn new(timeout: TimeDelta) -> Self {
        Self {
            timeout,
            last_position: Mutex::new(None),
            last_heading: Mutex::new(None),
            last_velocity: Mutex::new(None),
        }
    }

    pub fn default_timeout() -> TimeDelta {
        TimeDelta::minutes(2)
    }
}

impl Default for TimeBasedUpdatePolicy {
    fn default() -> Self {
        Self::new(Self::default_timeout())
    }
}

fn significantly_newer<T, U>(current: &Update<T>, candidate: &Update<U>, timeout: TimeDelta) -> bool {
    candidate.when > current.when + timeout
}

fn significantly_older<T, U>(current: &Update<T>, candidate: &Update<U>, timeout: TimeDelta) -> bool {
    candidate.when + timeout < current.when
}

impl UpdatePolicy for TimeBasedUpdatePolicy {
    fn verify_position(&self, update: Update<Position>) -> Update<Position> {
        let mut last = self.last_position.lock().unwrap();
        let accept = match &*last {
            None => true,
            Some(current) if significantly_newer(current, &update, self.timeout) => true,
            Some(current) if significantly_older(current, &update, self.timeout) => false,
            Some(current) => {
                // Inside the bracket accuracy decides, ties in favor of the
                // candidate. Without both accuracies the current one stays.
                match (
                    current.value.accuracy.horizontal,
                    update.value.accuracy.horizontal,
                ) {
                    (Some(current_acc), Some(candidate_acc)) => current_acc >= candidate_acc,
                    _ => false,
                }
            }
        };

        if accept {
            *last = Some(update);
            update
        } else {
            last.unwrap()
        }
    }

    fn verify_heading(&self, update: Update<Heading>) -> Update<Heading> {
        let mut last = self.last_heading.lock().unwrap();
        let accept = match &*last {
            None => true,
            Some(current) => significantly_newer(current, &update, self.timeout),
        };

        if accept {
            *last = Some(update);
            update
        } else {
            last.unwrap()
        }
    }

    fn verify_velocity(&self, update: Update<Velocity>) -> Update<Velocity> {
        let mut last = self.last_velocity.lock().unwrap();
        let accept = match &*last {
            None => true,
            Some(current) => significantly_newer(current, &update, self.timeout),
        };

        if accept {
            *last = Some(update);
            update
        } else {
            last.unwrap()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pinpoint_types::{Degrees, Meters, MetersPerSecond};

    fn position(horizontal_accuracy: Option<f64>) -> Position {
        let mut pos = Position::new(Degrees(9.0), Degrees(53.0)).unwrap();
        if let Some(acc) = horizontal_accuracy {
            pos = pos.with_horizontal_accuracy(Meters(acc));
        }
        pos
    }

    #[test]
    fn the_first_update_is_always_accepted() {
        let policy = TimeBasedUpdatePolicy::default();
        let update = Update::now(position(None));
        assert_eq!(policy.verify_position(update), update);
    }

    #[test]
    fn strictly_increasing_timestamps_beyond_the_timeout_are_all_accepted() {
        let policy = TimeBasedUpdatePolicy::default();
        let start = Utc::now();

        for step in 0..5 {
            let update = Update::new(
                position(None),
                start + TimeDelta::minutes(3) * step,
            );
            assert_eq!(policy.verify_position(update), update, "step {step}");
        }
    }

    #[test]
    fn updates_older_than_the_bracket_are_never_accepted() {
        let policy = TimeBasedUpdatePolicy::default();
        let now = Utc::now();

        let current = Update::new(position(None), now);
        policy.verify_position(current);

        let stale = Update::new(position(Some(1.0)), now - TimeDelta::minutes(3));
        assert_eq!(policy.verify_position(stale), current);
    }

    #[test]
    fn inside_the_bracket_better_accuracy_wins() {
        let policy = TimeBasedUpdatePolicy::default();
        let now = Utc::now();

        let coarse = Update::new(position(Some(50.0)), now);
        policy.verify_position(coarse);

        // Slightly older but tighter: accepted.
        let fine = Update::new(position(Some(10.0)), now - TimeDelta::seconds(3));
        assert_eq!(policy.verify_position(fine), fine);

        // Slightly newer but looser: rejected.
        let loose = Update::new(position(Some(500.0)), now + TimeDelta::seconds(3));
        assert_eq!(policy.verify_position(loose), fine);
    }

    #[test]
    fn equal_accuracy_ties_go_to_the_candidate() {
        let policy = TimeBasedUpdatePolicy::default();
        let now = Utc::now();

        policy.verify_position(Update::new(position(Some(50.0)), now));
        let tie = Update::new(position(Some(50.0)), now + TimeDelta::seconds(1));
        assert_eq!(policy.verify_position(tie), tie);
    }

    #[test]
    fn heading_and_velocity_keep_the_current_update_inside_the_bracket() {
        let policy = TimeBasedUpdatePolicy::default();
        let now = Utc::now();

        let heading = Update::new(Heading::new(Degrees(120.0)), now);
        assert_eq!(policy.verify_heading(heading), heading);
        let near = Update::new(Heading::new(Degrees(240.0)), now + TimeDelta::seconds(30));
        assert_eq!(policy.verify_heading(near), heading);
        let later = Update::new(Heading::new(Degrees(240.0)), now + TimeDelta::minutes(3));
        assert_eq!(policy.verify_heading(later), later);

        let velocity = Update::new(Velocity::new(MetersPerSecond(5.0)).unwrap(), now);
        assert_eq!(policy.verify_velocity(velocity), velocity);
        let near = Update::new(
            Velocity::new(MetersPerSecond(9.0)).unwrap(),
            now + TimeDelta::seconds(30),
        );
        assert_eq!(policy.verify_velocity(near), velocity);
    }
}
